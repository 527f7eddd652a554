use photo_verify::{
    app_state::AppState,
    config::AppConfig,
    db,
    models::attempt::VendorRequestParams,
    services::{
        mailer::StatusMailer,
        queue::JobQueue,
        submission::{self, SubmissionSettings},
        vendor::VendorClient,
    },
};
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL_MS: u64 = 1000; // 1 second

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting photo verification worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Initialize services
    tracing::info!("Initializing services");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");

    if config.vendor_accept_invalid_certs {
        tracing::warn!("TLS certificate validation for vendor calls is DISABLED");
    }
    let vendor = VendorClient::new(&config.vendor_api_url, config.vendor_accept_invalid_certs)
        .expect("Failed to initialize vendor client");

    let mailer = StatusMailer::from_config(&config).expect("Failed to initialize SMTP mailer");

    let submission = SubmissionSettings {
        vendor_params: VendorRequestParams {
            access_key: config.vendor_access_key.clone(),
            secret_key: config.vendor_secret_key.clone(),
            callback_url: config.vendor_callback_url.clone(),
        },
        max_retries: config.submission_max_retries,
        retry_delay: Duration::from_secs(config.submission_retry_delay_secs),
    };

    let state = AppState::new(db_pool, queue, vendor, mailer, submission);

    tracing::info!(
        max_retries = state.submission.max_retries,
        retry_delay_secs = state.submission.retry_delay.as_secs(),
        "Worker ready, starting job processing loop"
    );

    // Main processing loop: make due retries visible, then drain both queues.
    loop {
        if let Err(e) = state.queue.promote_due_retries().await {
            tracing::error!(error = %e, "Failed to promote scheduled retries");
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
            continue;
        }

        let worked_submission = match process_next_submission(&state).await {
            Ok(worked) => worked,
            Err(e) => {
                tracing::error!(error = %e, "Error processing submission job");
                false
            }
        };

        let worked_email = match process_next_status_email(&state).await {
            Ok(worked) => worked,
            Err(e) => {
                tracing::error!(error = %e, "Error processing status email job");
                false
            }
        };

        if !worked_submission && !worked_email {
            tracing::trace!("No jobs available, sleeping");
            sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }
}

/// Process the next vendor submission from the queue.
/// Returns Ok(true) if a job was processed, Ok(false) if no job available.
async fn process_next_submission(state: &AppState) -> Result<bool, Box<dyn std::error::Error>> {
    let job = match state.queue.dequeue_submission().await? {
        Some(j) => j,
        None => return Ok(false),
    };

    tracing::info!(
        receipt_id = %job.receipt_id,
        attempt_index = job.retries,
        "Processing verification submission"
    );

    let result = submission::run_submission(
        &state.db,
        &state.queue,
        &state.vendor,
        &state.submission,
        &job,
    )
    .await;

    if let Err(e) = result {
        tracing::error!(
            receipt_id = %job.receipt_id,
            error = %e,
            "Submission run failed before reaching an outcome, recovering"
        );
        submission::recover_failed_run(&state.db, &state.queue, &state.submission, &job).await?;
    }

    // The payload leaves the processing list only once an outcome is recorded
    // or a retry is scheduled; if recovery failed too, it stays there.
    state.queue.complete_submission(&job).await?;

    Ok(true)
}

/// Process the next status notification email. Never fails the job itself;
/// the mailer swallows delivery errors.
async fn process_next_status_email(state: &AppState) -> Result<bool, Box<dyn std::error::Error>> {
    let job = match state.queue.dequeue_status_email().await? {
        Some(j) => j,
        None => return Ok(false),
    };

    tracing::info!(email = %job.email, template = %job.template, "Sending status email");
    state.mailer.send_status_email(&job).await;
    state.queue.complete_status_email(&job).await?;

    Ok(true)
}
