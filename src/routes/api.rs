use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

use crate::db;
use crate::state::AppState;
use crate::storage::Locator;

pub async fn healthz() -> &'static str {
    "ok"
}

/// Machine-readable verification: the (folio, status, locator, digest)
/// contract external parties recompute digests against.
pub async fn estado(
    State(state): State<Arc<AppState>>,
    Path(folio): Path<String>,
) -> impl IntoResponse {
    match db::get_verification(state.pool.as_ref(), &folio).await {
        Ok(Some(record)) => {
            let documento = match record.status {
                db::DiplomaStatus::Valid => Some(
                    Locator {
                        kind: record.storage_kind,
                        value: record.locator.clone(),
                    }
                    .public_href(),
                ),
                db::DiplomaStatus::Void => None,
            };
            axum::Json(serde_json::json!({
                "status": "ok",
                "folio": record.folio,
                "estado": record.status,
                "alumno": record.student,
                "curso": record.course,
                "escuela": record.school,
                "grado": record.grade,
                "fecha_emision": record.issued_on,
                "documento": documento,
                "sha256": record.digest_sha256.trim(),
            }))
            .into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({
                "status": "not_found",
                "message": format!("No se encontró el diploma con folio: {}", folio),
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "estado lookup failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                axum::Json(serde_json::json!({
                    "status": "error",
                    "message": "No se pudo consultar el registro. Intenta de nuevo.",
                })),
            )
                .into_response()
        }
    }
}

/// Serve locally published diplomas. Remote locators never hit this route;
/// their public URL points straight at the bucket.
pub async fn download_pdf(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> impl IntoResponse {
    if filename.is_empty() || filename.contains("..") || filename.contains('/') {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = state.config.output_dir.join(&filename);
    match std::fs::read(&path) {
        Ok(content) => {
            let mime = mime_guess::from_path(&filename)
                .first_raw()
                .unwrap_or("application/octet-stream");
            axum::response::Response::builder()
                .header("Content-Type", mime)
                .header(
                    "Content-Disposition",
                    format!("inline; filename=\"{}\"", filename),
                )
                .body(axum::body::Body::from(content))
                .unwrap()
                .into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}
