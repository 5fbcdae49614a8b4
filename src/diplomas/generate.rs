//! Generation: one linear pass per pending enrollment. Render the overlay,
//! merge it with the template, hash, publish, then record in the ledger.
//! A student's failure is logged and skipped; the batch always continues.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::db::{self, PendingDiploma};
use crate::error::{Error, Result};
use crate::hash;
use crate::pdf::overlay::{render_overlay, OverlayLayout, OverlayValues};
use crate::pdf::{merge::merge_overlay, Template};
use crate::storage::{Locator, Storage};

#[derive(Debug)]
pub struct IssuedDiploma {
    pub student_id: i64,
    pub student: String,
    pub folio: String,
    pub locator: Locator,
    pub digest: String,
}

#[derive(Debug, Default)]
pub struct GenerationReport {
    pub issued: Vec<IssuedDiploma>,
    /// (student_id, error) per abandoned attempt.
    pub failed: Vec<(i64, String)>,
}

/// Canonical published name for one diploma document.
pub fn document_name(student_id: i64, folio: &str) -> String {
    format!("DIPLOMA_{}_{}.pdf", student_id, folio)
}

/// Generate diplomas for every enrollment that lacks one. Sequential by
/// design: one student at a time bounds storage-backend load and keeps
/// failure attribution per student.
pub async fn generate_pending(
    pool: &PgPool,
    config: &Config,
    storage: &Storage,
) -> Result<GenerationReport> {
    let pending = db::pending_diplomas(pool).await?;
    tracing::info!(pending = pending.len(), "diploma generation started");

    let mut report = GenerationReport::default();
    if pending.is_empty() {
        return Ok(report);
    }

    // The template is shared by every attempt; failing to load it fails
    // the batch before the first student.
    let template = Template::open(&config.template_pdf)?;

    for entry in &pending {
        match issue_one(pool, config, storage, &template, entry).await {
            Ok(issued) => {
                tracing::info!(
                    student_id = issued.student_id,
                    folio = %issued.folio,
                    digest = %&issued.digest[..12],
                    "diploma issued"
                );
                report.issued.push(issued);
            }
            Err(e) => {
                tracing::error!(
                    student_id = entry.student_id,
                    national_id = %entry.national_id,
                    error = %e,
                    "diploma generation failed, continuing batch"
                );
                report.failed.push((entry.student_id, e.to_string()));
            }
        }
    }

    tracing::info!(
        issued = report.issued.len(),
        failed = report.failed.len(),
        "diploma generation finished"
    );
    Ok(report)
}

/// Generate for a single student's first pending enrollment.
pub async fn generate_for_student(
    pool: &PgPool,
    config: &Config,
    storage: &Storage,
    student_id: i64,
) -> Result<IssuedDiploma> {
    if db::get_student(pool, student_id).await?.is_none() {
        return Err(Error::NotFound(format!("student {} not found", student_id)));
    }
    let pending = db::pending_for_student(pool, student_id)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!("student {} has no pending enrollment", student_id))
        })?;

    let template = Template::open(&config.template_pdf)?;
    issue_one(pool, config, storage, &template, &pending).await
}

async fn issue_one(
    pool: &PgPool,
    config: &Config,
    storage: &Storage,
    template: &Template,
    pending: &PendingDiploma,
) -> Result<IssuedDiploma> {
    let folio = Uuid::new_v4().to_string();
    let verify_url = config.verification_url(&folio);
    let issued_on = Utc::now().date_naive();

    let values = OverlayValues {
        student_name: &pending.student,
        folio: &folio,
        verify_url: &verify_url,
        issued_on,
        issuer: pending.instructor.as_deref(),
    };
    let overlay = render_overlay(template.page_size, &values, &OverlayLayout::default())?;
    let merged = merge_overlay(&template.bytes, &overlay)?;
    let digest = hash::sha256_hex(&merged);

    let name = document_name(pending.student_id, &folio);
    let locator = storage.publish(&merged, &name).await?;

    // Ledger write is last; nothing is recorded unless every prior step
    // succeeded.
    db::insert_diploma(pool, pending, &folio, issued_on, &locator, &digest).await?;

    Ok(IssuedDiploma {
        student_id: pending.student_id,
        student: pending.student.clone(),
        folio,
        locator,
        digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_name_is_stable() {
        assert_eq!(
            document_name(7, "0a1b2c3d-e4f5-6789-abcd-ef0123456789"),
            "DIPLOMA_7_0a1b2c3d-e4f5-6789-abcd-ef0123456789.pdf"
        );
    }
}
