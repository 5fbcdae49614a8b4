use std::sync::OnceLock;
use tera::Tera;

static TERA: OnceLock<Tera> = OnceLock::new();

/// Templates are parsed once on first use; a broken template directory
/// degrades to empty rendering instead of taking the process down.
pub fn get_tera() -> &'static Tera {
    TERA.get_or_init(|| match Tera::new("templates/**/*.html") {
        Ok(tera) => tera,
        Err(e) => {
            tracing::error!(error = %e, "failed to load templates, pages will render empty");
            Tera::default()
        }
    })
}
