use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::queries::{self, NewAttempt};
use crate::models::api::{AttemptStatusResponse, CreateAttemptRequest, CreateAttemptResponse};
use crate::services::queue::QueuedSubmission;

/// POST /api/v1/attempts — create a verification attempt and queue its
/// vendor submission.
pub async fn create_attempt(
    State(state): State<AppState>,
    Json(request): Json<CreateAttemptRequest>,
) -> Result<(StatusCode, Json<CreateAttemptResponse>), StatusCode> {
    if let Err(report) = request.validate() {
        tracing::debug!(error = %report, "Rejecting invalid attempt request");
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    // A copy source must exist up front; if it vanishes before the worker
    // runs, the attempt gets parked as must_retry.
    if let Some(copy_receipt) = request.copy_id_photo_from {
        let source = queries::get_attempt_by_receipt(&state.db, copy_receipt)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to look up copy source attempt");
                StatusCode::INTERNAL_SERVER_ERROR
            })?;
        if source.is_none() {
            return Err(StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    let attempt = queries::create_attempt(
        &state.db,
        &NewAttempt {
            user_id: &request.user_id,
            username: &request.username,
            email: &request.email,
            expected_name: &request.expected_name,
            face_image_url: &request.face_image_url,
            photo_id_image_url: &request.photo_id_image_url,
            photo_id_key: &request.photo_id_key,
        },
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to create verification attempt");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let job = QueuedSubmission {
        receipt_id: attempt.receipt_id,
        copy_id_photo_from: request.copy_id_photo_from,
        retries: 0,
    };
    state.queue.enqueue_submission(&job).await.map_err(|e| {
        tracing::error!(
            receipt_id = %attempt.receipt_id,
            error = %e,
            "Failed to enqueue verification submission"
        );
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    metrics::counter!("verification_attempts_created").increment(1);
    tracing::info!(
        receipt_id = %attempt.receipt_id,
        username = %attempt.username,
        "Created verification attempt and queued submission"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateAttemptResponse {
            receipt_id: attempt.receipt_id,
            status: attempt.status.to_string(),
        }),
    ))
}

/// GET /api/v1/attempts/{receipt_id} — attempt status and diagnostics.
pub async fn get_attempt_status(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> Result<Json<AttemptStatusResponse>, StatusCode> {
    let attempt = queries::get_attempt_by_receipt(&state.db, receipt_id)
        .await
        .map_err(|e| {
            tracing::error!(receipt_id = %receipt_id, error = %e, "Failed to load attempt");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(AttemptStatusResponse {
        receipt_id: attempt.receipt_id,
        status: attempt.status.to_string(),
        error: attempt.error,
        submission_retries: attempt.submission_retries,
    }))
}
