mod api;
mod pages;

pub use api::{download_pdf, estado, healthz};
pub use pages::{
    admin_anular, admin_auditar, admin_generar, admin_generar_alumno, admin_restaurar, admin_sync,
    index, ingresar, verificar, verificar_folio,
};
