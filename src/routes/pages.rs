use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use tera::Context;

use crate::db;
use crate::diplomas;
use crate::error::Error;
use crate::state::AppState;
use crate::storage::Locator;

const COLOR_OK: &str = "var(--ok)";
const COLOR_BAD: &str = "var(--bad)";

pub async fn index(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut ctx = Context::new();
    ctx.insert("now", &Utc::now().year());
    render("index.html", &ctx)
}

#[derive(Deserialize)]
pub struct VerifyParams {
    folio: Option<String>,
}

/// Form target: `/verificar?folio=...`.
pub async fn verificar(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match params.folio {
        Some(folio) if !folio.trim().is_empty() => {
            lookup_folio(&state, folio.trim()).await
        }
        _ => mensaje(
            StatusCode::BAD_REQUEST,
            "Verificación de diploma",
            "Debes ingresar un número de folio.",
            COLOR_BAD,
        ),
    }
}

/// QR target: `/verificar/{folio}`.
pub async fn verificar_folio(
    State(state): State<Arc<AppState>>,
    Path(folio): Path<String>,
) -> Response {
    lookup_folio(&state, &folio).await
}

async fn lookup_folio(state: &AppState, folio: &str) -> Response {
    if !folio_wellformed(folio) {
        return mensaje(
            StatusCode::NOT_FOUND,
            "Folio no encontrado",
            &format!("No se encontró el diploma con folio: {}", folio),
            COLOR_BAD,
        );
    }

    match db::get_verification(state.pool.as_ref(), folio).await {
        Ok(Some(record)) => {
            let doc_url = document_href(&record);
            let mut ctx = Context::new();
            ctx.insert("diploma", &record);
            ctx.insert("doc_url", &doc_url);
            ctx.insert("now", &Utc::now().year());
            render("verificacion.html", &ctx).into_response()
        }
        Ok(None) => mensaje(
            StatusCode::NOT_FOUND,
            "Folio no encontrado",
            &format!("No se encontró el diploma con folio: {}", folio),
            COLOR_BAD,
        ),
        Err(e) => {
            tracing::error!(error = %e, "verification lookup failed");
            mensaje(
                StatusCode::SERVICE_UNAVAILABLE,
                "Error en la verificación",
                "No se pudo consultar el registro. Intenta de nuevo.",
                COLOR_BAD,
            )
        }
    }
}

#[derive(Deserialize)]
pub struct PortalParams {
    id: Option<String>,
}

/// Student portal: list of a student's diplomas by national ID.
pub async fn ingresar(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PortalParams>,
) -> Response {
    let mut ctx = Context::new();
    ctx.insert("now", &Utc::now().year());

    let Some(national_id) = params.id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    else {
        ctx.insert("diplomas", &Vec::<serde_json::Value>::new());
        ctx.insert("id", "");
        return render("portal.html", &ctx).into_response();
    };

    match db::list_for_national_id(state.pool.as_ref(), national_id).await {
        Ok(records) => {
            let rows: Vec<serde_json::Value> = records
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "folio": r.folio,
                        "curso": r.course,
                        "estado": r.status,
                        "fecha_emision": r.issued_on,
                        "doc_url": document_href(r),
                    })
                })
                .collect();
            ctx.insert("diplomas", &rows);
            ctx.insert("id", national_id);
            render("portal.html", &ctx).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "portal lookup failed");
            mensaje(
                StatusCode::SERVICE_UNAVAILABLE,
                "Error",
                "No se pudo consultar el registro. Intenta de nuevo.",
                COLOR_BAD,
            )
        }
    }
}

#[derive(Deserialize)]
pub struct AdminParams {
    token: Option<String>,
}

/// Fire-and-forget batch generation. The request returns immediately;
/// completion is observed by re-querying the ledger.
pub async fn admin_generar(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminParams>,
) -> Response {
    if let Err(e) = check_admin(&state, &params) {
        return error_page(&e);
    }

    let pool = state.pool.clone();
    let config = state.config.clone();
    let storage = state.storage.clone();
    tokio::spawn(async move {
        if let Err(e) = diplomas::generate_pending(pool.as_ref(), &config, &storage).await {
            tracing::error!(error = %e, "background diploma generation failed");
        }
    });

    mensaje(
        StatusCode::OK,
        "Generación de diplomas",
        "Generación iniciada. Consulta el portal en unos momentos.",
        COLOR_OK,
    )
}

/// Generate for a single student, inline, and report the issued folio.
pub async fn admin_generar_alumno(
    State(state): State<Arc<AppState>>,
    Path(student_id): Path<i64>,
    Query(params): Query<AdminParams>,
) -> Response {
    if let Err(e) = check_admin(&state, &params) {
        return error_page(&e);
    }

    match diplomas::generate_for_student(
        state.pool.as_ref(),
        &state.config,
        &state.storage,
        student_id,
    )
    .await
    {
        Ok(issued) => mensaje(
            StatusCode::OK,
            "Diploma emitido",
            &format!(
                "Diploma de {} emitido con folio {} ({}).",
                issued.student, issued.folio, issued.locator.value
            ),
            COLOR_OK,
        ),
        Err(e) => {
            tracing::error!(student_id, error = %e, "single-student generation failed");
            error_page(&e)
        }
    }
}

pub async fn admin_sync(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminParams>,
) -> Response {
    if let Err(e) = check_admin(&state, &params) {
        return error_page(&e);
    }

    match diplomas::push_local_to_remote(state.pool.as_ref(), &state.storage).await {
        Ok(report) => mensaje(
            StatusCode::OK,
            "Sincronización completada",
            &format!(
                "{} diplomas: {} subidos, {} ya remotos, {} con error.",
                report.total, report.uploaded, report.skipped, report.failed
            ),
            if report.failed == 0 { COLOR_OK } else { COLOR_BAD },
        ),
        Err(e) => mensaje(
            StatusCode::SERVICE_UNAVAILABLE,
            "Error en sincronización",
            &e.to_string(),
            COLOR_BAD,
        ),
    }
}

pub async fn admin_auditar(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminParams>,
) -> Response {
    if let Err(e) = check_admin(&state, &params) {
        return error_page(&e);
    }

    match diplomas::audit_documents(state.pool.as_ref()).await {
        Ok(report) => {
            let detalles: Vec<String> = report
                .findings
                .iter()
                .map(|f| format!("diploma {} (folio {}): {}", f.diploma_id, f.folio, f.issue))
                .collect();
            let mut ctx = Context::new();
            ctx.insert("titulo", "Auditoría de documentos");
            ctx.insert(
                "mensaje",
                &format!(
                    "{} documentos revisados, {} hallazgos.",
                    report.checked,
                    report.findings.len()
                ),
            );
            ctx.insert("color", if report.clean() { COLOR_OK } else { COLOR_BAD });
            ctx.insert("detalles", &detalles);
            ctx.insert("now", &Utc::now().year());
            render("mensaje.html", &ctx).into_response()
        }
        Err(e) => mensaje(
            StatusCode::SERVICE_UNAVAILABLE,
            "Error en auditoría",
            &e.to_string(),
            COLOR_BAD,
        ),
    }
}

pub async fn admin_anular(
    State(state): State<Arc<AppState>>,
    Path(folio): Path<String>,
    Query(params): Query<AdminParams>,
) -> Response {
    if let Err(e) = check_admin(&state, &params) {
        return error_page(&e);
    }
    set_status(&state, &folio, db::DiplomaStatus::Void, "anulado").await
}

pub async fn admin_restaurar(
    State(state): State<Arc<AppState>>,
    Path(folio): Path<String>,
    Query(params): Query<AdminParams>,
) -> Response {
    if let Err(e) = check_admin(&state, &params) {
        return error_page(&e);
    }
    set_status(&state, &folio, db::DiplomaStatus::Valid, "restaurado").await
}

async fn set_status(
    state: &AppState,
    folio: &str,
    status: db::DiplomaStatus,
    verb: &str,
) -> Response {
    let pool = state.pool.as_ref();
    match db::get_diploma_by_folio(pool, folio).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return mensaje(
                StatusCode::NOT_FOUND,
                "Folio no encontrado",
                &format!("No se encontró el diploma con folio: {}", folio),
                COLOR_BAD,
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "status lookup failed");
            return mensaje(
                StatusCode::SERVICE_UNAVAILABLE,
                "Error",
                "No se pudo consultar el registro. Intenta de nuevo.",
                COLOR_BAD,
            );
        }
    }

    // Zero affected rows on an existing folio means it was already in the
    // requested state.
    match db::set_status(pool, folio, status).await {
        Ok(0) => mensaje(
            StatusCode::OK,
            "Sin cambios",
            &format!("El diploma {} ya estaba {}.", folio, verb),
            COLOR_OK,
        ),
        Ok(_) => mensaje(
            StatusCode::OK,
            "Estado actualizado",
            &format!("Diploma {} {}.", folio, verb),
            COLOR_OK,
        ),
        Err(e) => {
            tracing::error!(error = %e, folio = %folio, "status transition failed");
            mensaje(
                StatusCode::SERVICE_UNAVAILABLE,
                "Error",
                "No se pudo actualizar el registro. Intenta de nuevo.",
                COLOR_BAD,
            )
        }
    }
}

/// Admin gate: the static token has to match before any ledger access.
fn check_admin(state: &AppState, params: &AdminParams) -> Result<(), Error> {
    match params.token.as_deref() {
        Some(token) if token == state.config.admin_token => Ok(()),
        _ => Err(Error::Unauthorized),
    }
}

fn error_page(e: &Error) -> Response {
    match e {
        Error::Unauthorized => mensaje(
            StatusCode::UNAUTHORIZED,
            "No autorizado",
            "Token de administrador inválido.",
            COLOR_BAD,
        ),
        Error::NotFound(detail) => mensaje(
            StatusCode::NOT_FOUND,
            "No encontrado",
            detail,
            COLOR_BAD,
        ),
        Error::TemplateNotFound(_) | Error::PageSizeMismatch { .. } => mensaje(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Error de configuración",
            &e.to_string(),
            COLOR_BAD,
        ),
        _ => mensaje(
            StatusCode::SERVICE_UNAVAILABLE,
            "Error",
            &e.to_string(),
            COLOR_BAD,
        ),
    }
}

/// A VOID diploma keeps its metadata visible but loses the document link.
fn document_href(record: &db::VerificationRecord) -> Option<String> {
    if record.status != db::DiplomaStatus::Valid {
        return None;
    }
    Some(
        Locator {
            kind: record.storage_kind,
            value: record.locator.clone(),
        }
        .public_href(),
    )
}

/// Folios are opaque tokens, but junk and path tricks stop here before
/// the ledger is queried.
fn folio_wellformed(folio: &str) -> bool {
    static FOLIO_RE: OnceLock<Regex> = OnceLock::new();
    FOLIO_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{3,63}$").unwrap())
        .is_match(folio)
}

fn mensaje(status: StatusCode, titulo: &str, texto: &str, color: &str) -> Response {
    let mut ctx = Context::new();
    ctx.insert("titulo", titulo);
    ctx.insert("mensaje", texto);
    ctx.insert("color", color);
    ctx.insert("now", &Utc::now().year());
    (status, render("mensaje.html", &ctx)).into_response()
}

fn render(name: &str, ctx: &Context) -> Html<String> {
    let tera = crate::templates::get_tera();
    let rendered = tera
        .render(name, ctx)
        .unwrap_or_else(|e| {
            tracing::error!(template = name, error = %e, "template render failed");
            format!("Template error: {}", name)
        });
    Html(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folio_filter_accepts_uuids_and_rejects_junk() {
        assert!(folio_wellformed("3f0e8a12-9c1d-4a2b-8e3f-1234567890ab"));
        assert!(folio_wellformed("FOLIO-TEST-001"));
        assert!(!folio_wellformed(""));
        assert!(!folio_wellformed("../../etc/passwd"));
        assert!(!folio_wellformed("a b c"));
        assert!(!folio_wellformed(&"x".repeat(65)));
    }

    #[test]
    fn void_diplomas_lose_their_document_link() {
        use crate::storage::StorageKind;
        let mut record = db::VerificationRecord {
            folio: "f".into(),
            status: db::DiplomaStatus::Valid,
            issued_on: chrono::NaiveDate::from_ymd_opt(2025, 10, 3).unwrap(),
            locator: "/srv/out/DIPLOMA_1_f.pdf".into(),
            storage_kind: StorageKind::Local,
            digest_sha256: "0".repeat(64),
            student: "Ana Torres".into(),
            national_id: "TOAA040506MDFLRS08".into(),
            course: "Computación Básica".into(),
            school: "-".into(),
            grade: "-".into(),
        };
        assert_eq!(document_href(&record), Some("/pdfs/DIPLOMA_1_f.pdf".into()));

        record.status = db::DiplomaStatus::Void;
        assert_eq!(document_href(&record), None);
    }
}
