mod models;

pub use models::*;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use crate::storage::Locator;

pub type DbPool = Arc<PgPool>;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(Arc::new(pool))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const VERIFICATION_SELECT: &str = r#"
    SELECT d.folio, d.status, d.issued_on, d.locator, d.storage_kind, d.digest_sha256,
           s.name AS student, s.national_id,
           COALESCE(c.name, '-') AS course,
           COALESCE(sc.name, '-') AS school,
           COALESCE(g.name, '-') AS grade
    FROM diploma d
    JOIN student s ON s.student_id = d.student_id
    LEFT JOIN course c ON c.course_id = d.course_id
    LEFT JOIN school sc ON sc.school_id = s.school_id
    LEFT JOIN grade g ON g.grade_id = s.grade_id
"#;

pub async fn get_student(pool: &PgPool, student_id: i64) -> Result<Option<Student>, sqlx::Error> {
    sqlx::query_as::<_, Student>("SELECT * FROM student WHERE student_id = $1")
        .bind(student_id)
        .fetch_optional(pool)
        .await
}

/// Enrollments with no VALID diploma for the same (student, course), in
/// stable iteration order. One row per enrollment, not per student.
pub async fn pending_diplomas(pool: &PgPool) -> Result<Vec<PendingDiploma>, sqlx::Error> {
    sqlx::query_as::<_, PendingDiploma>(&format!("{} {}", PENDING_SELECT, PENDING_ORDER))
        .fetch_all(pool)
        .await
}

/// First pending enrollment for one student, if any.
pub async fn pending_for_student(
    pool: &PgPool,
    student_id: i64,
) -> Result<Option<PendingDiploma>, sqlx::Error> {
    sqlx::query_as::<_, PendingDiploma>(&format!(
        "{} AND s.student_id = $1 {} LIMIT 1",
        PENDING_SELECT, PENDING_ORDER
    ))
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

const PENDING_SELECT: &str = r#"
    SELECT s.student_id, s.name AS student, s.national_id,
           COALESCE(sc.name, '-') AS school,
           COALESCE(g.name, '-') AS grade,
           e.course_id, c.name AS course,
           i.name AS instructor
    FROM enrollment e
    JOIN student s ON s.student_id = e.student_id
    JOIN course c ON c.course_id = e.course_id
    LEFT JOIN school sc ON sc.school_id = s.school_id
    LEFT JOIN grade g ON g.grade_id = s.grade_id
    LEFT JOIN instructor i ON i.instructor_id = c.instructor_id
    WHERE NOT EXISTS (
        SELECT 1 FROM diploma d
        WHERE d.student_id = e.student_id
          AND d.course_id = e.course_id
          AND d.status = 'VALID'
    )
"#;

const PENDING_ORDER: &str = "ORDER BY s.student_id, e.course_id";

/// One row per successful generation. A single statement, so each
/// student's insert commits on its own and a later failure in the batch
/// cannot take earlier rows down with it.
pub async fn insert_diploma(
    pool: &PgPool,
    pending: &PendingDiploma,
    folio: &str,
    issued_on: chrono::NaiveDate,
    locator: &Locator,
    digest: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO diploma
            (student_id, course_id, folio, status, issued_on, locator, storage_kind, digest_sha256)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(pending.student_id)
    .bind(pending.course_id)
    .bind(folio)
    .bind(DiplomaStatus::Valid)
    .bind(issued_on)
    .bind(&locator.value)
    .bind(locator.kind)
    .bind(digest)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_verification(
    pool: &PgPool,
    folio: &str,
) -> Result<Option<VerificationRecord>, sqlx::Error> {
    sqlx::query_as::<_, VerificationRecord>(&format!("{} WHERE d.folio = $1", VERIFICATION_SELECT))
        .bind(folio)
        .fetch_optional(pool)
        .await
}

/// All of a student's diplomas, most recent first.
pub async fn list_for_national_id(
    pool: &PgPool,
    national_id: &str,
) -> Result<Vec<VerificationRecord>, sqlx::Error> {
    sqlx::query_as::<_, VerificationRecord>(&format!(
        "{} WHERE s.national_id = $1 ORDER BY d.created_at DESC",
        VERIFICATION_SELECT
    ))
    .bind(national_id)
    .fetch_all(pool)
    .await
}

pub async fn get_diploma_by_folio(
    pool: &PgPool,
    folio: &str,
) -> Result<Option<Diploma>, sqlx::Error> {
    sqlx::query_as::<_, Diploma>("SELECT * FROM diploma WHERE folio = $1")
        .bind(folio)
        .fetch_optional(pool)
        .await
}

/// Flip a diploma to `status`. Idempotent: re-applying the current status
/// matches no row and reports zero affected, which callers use to tell
/// "already in that state" apart from a real transition.
pub async fn set_status(
    pool: &PgPool,
    folio: &str,
    status: DiplomaStatus,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE diploma SET status = $2 WHERE folio = $1 AND status <> $2")
        .bind(folio)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn sync_rows(pool: &PgPool) -> Result<Vec<SyncRow>, sqlx::Error> {
    sqlx::query_as::<_, SyncRow>(
        "SELECT diploma_id, student_id, folio, locator, storage_kind FROM diploma ORDER BY diploma_id",
    )
    .fetch_all(pool)
    .await
}

pub async fn update_locator(
    pool: &PgPool,
    diploma_id: i64,
    locator: &Locator,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE diploma SET locator = $2, storage_kind = $3 WHERE diploma_id = $1")
        .bind(diploma_id)
        .bind(&locator.value)
        .bind(locator.kind)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn audit_rows(pool: &PgPool) -> Result<Vec<AuditRow>, sqlx::Error> {
    sqlx::query_as::<_, AuditRow>(
        "SELECT diploma_id, folio, locator, storage_kind, digest_sha256 FROM diploma ORDER BY diploma_id",
    )
    .fetch_all(pool)
    .await
}
