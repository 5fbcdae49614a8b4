//! Remote sync: push ledger rows whose documents only exist on local disk
//! up to the object-storage bucket, then point their locators at it.

use sqlx::PgPool;

use crate::db;
use crate::error::{Error, Result};
use crate::storage::{Storage, StorageKind};

use super::document_name;

#[derive(Debug, Default)]
pub struct SyncReport {
    pub total: usize,
    pub uploaded: u32,
    pub skipped: u32,
    pub failed: u32,
}

/// Upload every LOCAL row's document to the remote bucket under its
/// canonical name and update the ledger locator. Rows already remote are
/// skipped; per-row failures are logged and counted, never fatal.
pub async fn push_local_to_remote(pool: &PgPool, storage: &Storage) -> Result<SyncReport> {
    let remote = storage
        .remote_store()
        .ok_or_else(|| Error::PublishError("no remote storage backend configured".into()))?;

    let rows = db::sync_rows(pool).await?;
    let mut report = SyncReport {
        total: rows.len(),
        ..SyncReport::default()
    };

    for row in rows {
        if row.storage_kind == StorageKind::Remote {
            report.skipped += 1;
            continue;
        }

        let bytes = match std::fs::read(&row.locator) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    diploma_id = row.diploma_id,
                    locator = %row.locator,
                    error = %e,
                    "local document unreadable, skipping sync"
                );
                report.failed += 1;
                continue;
            }
        };

        let name = document_name(row.student_id, &row.folio);
        match remote.publish(&bytes, &name).await {
            Ok(locator) => {
                db::update_locator(pool, row.diploma_id, &locator).await?;
                tracing::info!(diploma_id = row.diploma_id, url = %locator.value, "synced to remote");
                report.uploaded += 1;
            }
            Err(e) => {
                tracing::warn!(diploma_id = row.diploma_id, error = %e, "remote upload failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        total = report.total,
        uploaded = report.uploaded,
        skipped = report.skipped,
        failed = report.failed,
        "remote sync finished"
    );
    Ok(report)
}
