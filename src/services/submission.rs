use sqlx::PgPool;
use std::time::Duration;

use crate::db::queries;
use crate::models::attempt::{VendorRequestParams, VerificationAttempt};
use crate::services::queue::{JobQueue, QueueError, QueuedSubmission};
use crate::services::vendor::{VendorClient, VendorResponse};

/// Retry policy for vendor submissions.
#[derive(Debug, Clone)]
pub struct SubmissionSettings {
    pub vendor_params: VendorRequestParams,
    /// Retries allowed after the initial attempt; total attempts = max + 1.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// What a completed vendor round trip means for the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Submitted,
    /// Vendor rejected the submission; the response body is kept as detail.
    /// Rejections are terminal for this job and do not consume retries.
    MustRetry { detail: String },
}

impl SubmissionOutcome {
    pub fn from_response(response: &VendorResponse) -> Self {
        if response.is_success() {
            Self::Submitted
        } else {
            Self::MustRetry {
                detail: response.body.clone(),
            }
        }
    }
}

/// What to do after a transient failure on attempt index `retries`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStep {
    Reschedule { next_retries: u32 },
    GiveUp,
}

impl RetryStep {
    pub fn next(retries: u32, max_retries: u32) -> Self {
        if retries < max_retries {
            Self::Reschedule {
                next_retries: retries + 1,
            }
        } else {
            Self::GiveUp
        }
    }
}

/// Errors that escape to the worker loop. Vendor transport failures never
/// appear here; they are converted into a reschedule or a status mutation.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Run one dequeued submission job end to end: load the attempt, build and
/// POST the signed request, record the outcome, and on transient failure
/// either schedule a delayed retry or park the attempt as `must_retry`.
pub async fn run_submission(
    db: &PgPool,
    queue: &JobQueue,
    vendor: &VendorClient,
    settings: &SubmissionSettings,
    job: &QueuedSubmission,
) -> Result<(), SubmissionError> {
    let Some(attempt) = queries::get_attempt_by_receipt(db, job.receipt_id).await? else {
        // Dangling receipt id; retrying cannot produce the row.
        tracing::error!(
            receipt_id = %job.receipt_id,
            "No verification attempt found for queued submission, dropping job"
        );
        return Ok(());
    };

    let copy_source = match job.copy_id_photo_from {
        Some(copy_receipt) => {
            let Some(source) = queries::get_attempt_by_receipt(db, copy_receipt).await? else {
                // Substituting the current attempt's own ID photo would defeat
                // re-verification; park the attempt for external handling.
                let detail = format!("ID photo source attempt {copy_receipt} no longer exists");
                queries::mark_must_retry(db, attempt.id, Some(&detail)).await?;
                tracing::error!(
                    receipt_id = %attempt.receipt_id,
                    copied_from_receipt_id = %copy_receipt,
                    "Prior attempt for ID photo reuse not found, marked must_retry"
                );
                return Ok(());
            };
            tracing::info!(
                username = %attempt.username,
                receipt_id = %attempt.receipt_id,
                copied_from_receipt_id = %source.receipt_id,
                "Verification attempt reuses ID photo data from a prior receipt"
            );
            Some(source)
        }
        None => None,
    };

    // Payload construction failures take the same retry path as network
    // errors; only a completed HTTP round trip reaches the outcome handler.
    let round_trip = match attempt.vendor_request(copy_source.as_ref(), &settings.vendor_params) {
        Ok(request) => vendor.submit(&request).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    match round_trip {
        Ok(response) => {
            record_outcome(db, &attempt, &response).await?;
        }
        Err(err) => {
            handle_transient_failure(db, queue, settings, job, &attempt, &err).await?;
        }
    }

    Ok(())
}

/// Recovery for a run that failed before recording any outcome, for example
/// because the database dropped mid-flight. Consumes the retry budget like a
/// transient vendor failure; once exhausted the attempt is parked. The caller
/// keeps the payload on the processing list when recovery itself fails.
pub async fn recover_failed_run(
    db: &PgPool,
    queue: &JobQueue,
    settings: &SubmissionSettings,
    job: &QueuedSubmission,
) -> Result<(), SubmissionError> {
    match RetryStep::next(job.retries, settings.max_retries) {
        RetryStep::Reschedule { next_retries } => {
            let retry_job = QueuedSubmission {
                receipt_id: job.receipt_id,
                copy_id_photo_from: job.copy_id_photo_from,
                retries: next_retries,
            };
            queue
                .schedule_submission_retry(&retry_job, settings.retry_delay)
                .await?;
            metrics::counter!("verification_submission_retries_scheduled").increment(1);
        }
        RetryStep::GiveUp => {
            let Some(attempt) = queries::get_attempt_by_receipt(db, job.receipt_id).await? else {
                tracing::error!(
                    receipt_id = %job.receipt_id,
                    "No verification attempt found while abandoning failed submission"
                );
                return Ok(());
            };
            queries::mark_must_retry(db, attempt.id, None).await?;
            metrics::counter!("verification_submissions_exhausted").increment(1);
            tracing::error!(
                username = %attempt.username,
                "Vendor submission failed for user, setting status to must_retry"
            );
        }
    }
    Ok(())
}

async fn record_outcome(
    db: &PgPool,
    attempt: &VerificationAttempt,
    response: &VendorResponse,
) -> Result<(), SubmissionError> {
    match SubmissionOutcome::from_response(response) {
        SubmissionOutcome::Submitted => {
            queries::mark_submitted(db, attempt.id).await?;
            metrics::counter!("verification_submissions_submitted").increment(1);
            tracing::info!(
                username = %attempt.username,
                receipt_id = %attempt.receipt_id,
                "Sent verification request to vendor"
            );
        }
        SubmissionOutcome::MustRetry { detail } => {
            queries::mark_must_retry(db, attempt.id, Some(&detail)).await?;
            metrics::counter!("verification_submissions_rejected").increment(1);
            tracing::warn!(
                username = %attempt.username,
                receipt_id = %attempt.receipt_id,
                vendor_status = response.status,
                "Vendor rejected verification submission, marked must_retry"
            );
        }
    }
    Ok(())
}

async fn handle_transient_failure(
    db: &PgPool,
    queue: &JobQueue,
    settings: &SubmissionSettings,
    job: &QueuedSubmission,
    attempt: &VerificationAttempt,
    error: &str,
) -> Result<(), SubmissionError> {
    tracing::error!(
        username = %attempt.username,
        receipt_id = %attempt.receipt_id,
        error = %error,
        attempt_index = job.retries,
        max_retries = settings.max_retries,
        "Retrying verification submission to vendor"
    );
    queries::increment_submission_retries(db, attempt.id).await?;

    match RetryStep::next(job.retries, settings.max_retries) {
        RetryStep::Reschedule { next_retries } => {
            let retry_job = QueuedSubmission {
                receipt_id: job.receipt_id,
                copy_id_photo_from: job.copy_id_photo_from,
                retries: next_retries,
            };
            queue
                .schedule_submission_retry(&retry_job, settings.retry_delay)
                .await?;
            metrics::counter!("verification_submission_retries_scheduled").increment(1);
        }
        RetryStep::GiveUp => {
            queries::mark_must_retry(db, attempt.id, None).await?;
            metrics::counter!("verification_submissions_exhausted").increment(1);
            tracing::error!(
                username = %attempt.username,
                "Vendor submission failed for user, setting status to must_retry"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_response_means_submitted() {
        let response = VendorResponse {
            status: 200,
            body: "OK".to_string(),
        };
        assert_eq!(
            SubmissionOutcome::from_response(&response),
            SubmissionOutcome::Submitted
        );
    }

    #[test]
    fn test_rejection_keeps_body_as_detail() {
        let response = VendorResponse {
            status: 400,
            body: "missing PhotoID".to_string(),
        };
        assert_eq!(
            SubmissionOutcome::from_response(&response),
            SubmissionOutcome::MustRetry {
                detail: "missing PhotoID".to_string()
            }
        );
    }

    #[test]
    fn test_all_2xx_statuses_are_success() {
        for status in [200, 201, 204, 299] {
            let response = VendorResponse {
                status,
                body: String::new(),
            };
            assert_eq!(
                SubmissionOutcome::from_response(&response),
                SubmissionOutcome::Submitted
            );
        }
        for status in [199, 301, 400, 500, 503] {
            let response = VendorResponse {
                status,
                body: String::new(),
            };
            assert!(matches!(
                SubmissionOutcome::from_response(&response),
                SubmissionOutcome::MustRetry { .. }
            ));
        }
    }

    #[test]
    fn test_retry_budget_allows_max_plus_one_attempts() {
        // max_retries = 3: attempt indices 0..=2 reschedule, index 3 gives up,
        // so four attempts run in total.
        let max = 3;
        assert_eq!(RetryStep::next(0, max), RetryStep::Reschedule { next_retries: 1 });
        assert_eq!(RetryStep::next(1, max), RetryStep::Reschedule { next_retries: 2 });
        assert_eq!(RetryStep::next(2, max), RetryStep::Reschedule { next_retries: 3 });
        assert_eq!(RetryStep::next(3, max), RetryStep::GiveUp);
    }

    #[test]
    fn test_zero_max_retries_gives_single_attempt() {
        assert_eq!(RetryStep::next(0, 0), RetryStep::GiveUp);
    }
}
