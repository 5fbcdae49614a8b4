//! The diploma pipeline: generation of pending diplomas, remote-storage
//! sync, and the ledger-vs-storage audit.

mod audit;
mod generate;
mod sync;

pub use audit::{audit_documents, AuditFinding, AuditIssue, AuditReport};
pub use generate::{
    document_name, generate_for_student, generate_pending, GenerationReport, IssuedDiploma,
};
pub use sync::{push_local_to_remote, SyncReport};
