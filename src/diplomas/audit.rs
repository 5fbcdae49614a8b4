//! Audit: compare every ledger digest against a freshly computed digest of
//! the document the locator actually resolves to. Findings are reported,
//! not repaired; repair is regeneration or sync, decided by an operator.

use std::time::Duration;

use sqlx::PgPool;

use crate::db;
use crate::error::Result;
use crate::hash;
use crate::storage::StorageKind;

#[derive(Debug)]
pub enum AuditIssue {
    /// Locator points at nothing.
    MissingDocument(String),
    /// Remote backend answered, but not with the document.
    UnreachableDocument(String),
    /// Document bytes no longer hash to the ledger digest.
    IntegrityDrift { stored: String, actual: String },
}

impl std::fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditIssue::MissingDocument(detail) => write!(f, "documento faltante: {}", detail),
            AuditIssue::UnreachableDocument(detail) => {
                write!(f, "documento inaccesible: {}", detail)
            }
            AuditIssue::IntegrityDrift { stored, actual } => write!(
                f,
                "hash distinto: registrado {}… recalculado {}…",
                &stored[..12.min(stored.len())],
                &actual[..12.min(actual.len())]
            ),
        }
    }
}

#[derive(Debug)]
pub struct AuditFinding {
    pub diploma_id: i64,
    pub folio: String,
    pub locator: String,
    pub issue: AuditIssue,
}

#[derive(Debug, Default)]
pub struct AuditReport {
    pub checked: usize,
    pub findings: Vec<AuditFinding>,
}

impl AuditReport {
    pub fn clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Walk the whole ledger and verify each document still matches its
/// recorded digest.
pub async fn audit_documents(pool: &PgPool) -> Result<AuditReport> {
    let rows = db::audit_rows(pool).await?;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default();

    let mut report = AuditReport {
        checked: rows.len(),
        ..AuditReport::default()
    };

    for row in rows {
        let bytes = match fetch_document(&client, row.storage_kind, &row.locator).await {
            Ok(bytes) => bytes,
            Err(issue) => {
                tracing::warn!(diploma_id = row.diploma_id, folio = %row.folio, issue = %issue, "audit finding");
                report.findings.push(AuditFinding {
                    diploma_id: row.diploma_id,
                    folio: row.folio,
                    locator: row.locator,
                    issue,
                });
                continue;
            }
        };

        let actual = hash::sha256_hex(&bytes);
        let stored = row.digest_sha256.trim().to_ascii_lowercase();
        if actual != stored {
            tracing::warn!(
                diploma_id = row.diploma_id,
                folio = %row.folio,
                "audit finding: digest drift"
            );
            report.findings.push(AuditFinding {
                diploma_id: row.diploma_id,
                folio: row.folio,
                locator: row.locator,
                issue: AuditIssue::IntegrityDrift { stored, actual },
            });
        }
    }

    tracing::info!(
        checked = report.checked,
        findings = report.findings.len(),
        "audit finished"
    );
    Ok(report)
}

async fn fetch_document(
    client: &reqwest::Client,
    kind: StorageKind,
    locator: &str,
) -> std::result::Result<Vec<u8>, AuditIssue> {
    match kind {
        StorageKind::Local => std::fs::read(locator)
            .map_err(|e| AuditIssue::MissingDocument(format!("{}: {}", locator, e))),
        StorageKind::Remote => {
            let resp = client
                .get(locator)
                .send()
                .await
                .map_err(|e| AuditIssue::UnreachableDocument(e.to_string()))?;
            if !resp.status().is_success() {
                return Err(AuditIssue::UnreachableDocument(format!(
                    "HTTP {}",
                    resp.status().as_u16()
                )));
            }
            resp.bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| AuditIssue::UnreachableDocument(e.to_string()))
        }
    }
}
