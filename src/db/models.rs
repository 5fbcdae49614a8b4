use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::storage::StorageKind;

/// Diploma lifecycle. Rows are created VALID; void and restore flip
/// between the two states, nothing else exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "diploma_status")]
pub enum DiplomaStatus {
    #[sqlx(rename = "VALID")]
    #[serde(rename = "VALID")]
    Valid,
    #[sqlx(rename = "VOID")]
    #[serde(rename = "VOID")]
    Void,
}

impl DiplomaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiplomaStatus::Valid => "VALID",
            DiplomaStatus::Void => "VOID",
        }
    }
}

impl std::fmt::Display for DiplomaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, FromRow, Serialize)]
pub struct Student {
    pub student_id: i64,
    pub name: String,
    pub national_id: String,
    pub school_id: Option<i64>,
    pub grade_id: Option<i64>,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize)]
pub struct Diploma {
    pub diploma_id: i64,
    pub student_id: i64,
    pub course_id: Option<i64>,
    pub folio: String,
    pub status: DiplomaStatus,
    pub issued_on: NaiveDate,
    pub locator: String,
    pub storage_kind: StorageKind,
    pub digest_sha256: String,
    pub created_at: DateTime<Utc>,
}

/// One enrollment still owed a diploma, with everything the overlay needs
/// already joined in.
#[derive(Debug, Clone, FromRow)]
pub struct PendingDiploma {
    pub student_id: i64,
    pub student: String,
    pub national_id: String,
    pub school: String,
    pub grade: String,
    pub course_id: i64,
    pub course: String,
    pub instructor: Option<String>,
}

/// The display tuple verification resolves a folio to. Missing optional
/// relations arrive as the `-` placeholder straight from SQL.
#[derive(Debug, FromRow, Serialize)]
pub struct VerificationRecord {
    pub folio: String,
    pub status: DiplomaStatus,
    pub issued_on: NaiveDate,
    pub locator: String,
    pub storage_kind: StorageKind,
    pub digest_sha256: String,
    pub student: String,
    pub national_id: String,
    pub course: String,
    pub school: String,
    pub grade: String,
}

/// Ledger slice the remote-sync pass operates on.
#[derive(Debug, FromRow)]
pub struct SyncRow {
    pub diploma_id: i64,
    pub student_id: i64,
    pub folio: String,
    pub locator: String,
    pub storage_kind: StorageKind,
}

/// Ledger slice the audit pass recomputes digests for.
#[derive(Debug, FromRow)]
pub struct AuditRow {
    pub diploma_id: i64,
    pub folio: String,
    pub locator: String,
    pub storage_kind: StorageKind,
    pub digest_sha256: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_matches_ledger_values() {
        assert_eq!(DiplomaStatus::Valid.to_string(), "VALID");
        assert_eq!(DiplomaStatus::Void.to_string(), "VOID");
    }

    #[test]
    fn status_serializes_as_ledger_value() {
        assert_eq!(
            serde_json::to_string(&DiplomaStatus::Void).unwrap(),
            "\"VOID\""
        );
    }
}
