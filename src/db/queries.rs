use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

use crate::models::attempt::{AttemptStatus, VerificationAttempt};

const ATTEMPT_COLUMNS: &str = "id, receipt_id, user_id, username, email, expected_name, \
     face_image_url, photo_id_image_url, photo_id_key, status, error, \
     submission_retries, created_at, updated_at, submitted_at";

fn attempt_from_row(row: &PgRow) -> Result<VerificationAttempt, sqlx::Error> {
    let status_str: String = row.try_get("status")?;
    let status = AttemptStatus::from_str(&status_str).map_err(|e| sqlx::Error::ColumnDecode {
        index: "status".to_string(),
        source: Box::new(e),
    })?;

    Ok(VerificationAttempt {
        id: row.try_get("id")?,
        receipt_id: row.try_get("receipt_id")?,
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        expected_name: row.try_get("expected_name")?,
        face_image_url: row.try_get("face_image_url")?,
        photo_id_image_url: row.try_get("photo_id_image_url")?,
        photo_id_key: row.try_get("photo_id_key")?,
        status,
        error: row.try_get("error")?,
        submission_retries: row.try_get("submission_retries")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        submitted_at: row.try_get("submitted_at")?,
    })
}

/// Fields needed to insert a new attempt. Everything else defaults in SQL.
pub struct NewAttempt<'a> {
    pub user_id: &'a str,
    pub username: &'a str,
    pub email: &'a str,
    pub expected_name: &'a str,
    pub face_image_url: &'a str,
    pub photo_id_image_url: &'a str,
    pub photo_id_key: &'a str,
}

/// Insert a new verification attempt in `created` status.
pub async fn create_attempt(
    pool: &PgPool,
    new: &NewAttempt<'_>,
) -> Result<VerificationAttempt, sqlx::Error> {
    let sql = format!(
        r#"
        INSERT INTO verification_attempts
            (user_id, username, email, expected_name, face_image_url,
             photo_id_image_url, photo_id_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {ATTEMPT_COLUMNS}
        "#
    );
    let row = sqlx::query(&sql)
        .bind(new.user_id)
        .bind(new.username)
        .bind(new.email)
        .bind(new.expected_name)
        .bind(new.face_image_url)
        .bind(new.photo_id_image_url)
        .bind(new.photo_id_key)
        .fetch_one(pool)
        .await?;

    attempt_from_row(&row)
}

/// Look up an attempt by its vendor-facing receipt id.
pub async fn get_attempt_by_receipt(
    pool: &PgPool,
    receipt_id: Uuid,
) -> Result<Option<VerificationAttempt>, sqlx::Error> {
    let sql = format!(
        r#"
        SELECT {ATTEMPT_COLUMNS}
        FROM verification_attempts
        WHERE receipt_id = $1
        "#
    );
    let row = sqlx::query(&sql)
        .bind(receipt_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(attempt_from_row).transpose()
}

/// Record a successful vendor submission.
pub async fn mark_submitted(pool: &PgPool, attempt_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE verification_attempts
        SET status = 'submitted',
            error = NULL,
            submitted_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(attempt_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Park the attempt for external re-submission, optionally preserving the
/// vendor's response body as diagnostic detail.
pub async fn mark_must_retry(
    pool: &PgPool,
    attempt_id: Uuid,
    detail: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE verification_attempts
        SET status = 'must_retry',
            error = $1,
            updated_at = NOW()
        WHERE id = $2
        "#,
    )
    .bind(detail)
    .bind(attempt_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Bump the operator-visible retry counter; returns the new value.
pub async fn increment_submission_retries(
    pool: &PgPool,
    attempt_id: Uuid,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE verification_attempts
        SET submission_retries = submission_retries + 1,
            updated_at = NOW()
        WHERE id = $1
        RETURNING submission_retries
        "#,
    )
    .bind(attempt_id)
    .fetch_one(pool)
    .await?;

    row.try_get("submission_retries")
}
