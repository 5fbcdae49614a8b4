use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("template not found, probed: {0}")]
    TemplateNotFound(String),

    #[error("page size mismatch: template {template:?} pt vs overlay {overlay:?} pt")]
    PageSizeMismatch {
        template: (f32, f32),
        overlay: (f32, f32),
    },

    #[error("publish failed: {0}")]
    PublishError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("malformed pdf: {0}")]
    MalformedPdf(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("qr encoding error: {0}")]
    Qr(#[from] qrcode::types::QrError),

    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
