mod app_state;
mod config;
mod db;
mod models;
mod routes;
mod services;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use app_state::AppState;
use config::AppConfig;
use models::attempt::VendorRequestParams;
use services::{
    mailer::StatusMailer, queue::JobQueue, submission::SubmissionSettings, vendor::VendorClient,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing photo-verify API server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "verification_attempts_created",
        "Verification attempts created and queued for vendor submission"
    );
    metrics::describe_counter!(
        "verification_submissions_submitted",
        "Submissions the vendor accepted"
    );
    metrics::describe_counter!(
        "verification_submissions_rejected",
        "Submissions the vendor rejected (marked must_retry with detail)"
    );
    metrics::describe_counter!(
        "verification_submission_retries_scheduled",
        "Delayed submission retries scheduled after transient failures"
    );
    metrics::describe_counter!(
        "verification_submissions_exhausted",
        "Submissions abandoned after the retry budget ran out"
    );
    metrics::describe_counter!("status_emails_sent", "Status notification emails delivered");
    metrics::describe_counter!(
        "status_emails_failed",
        "Status notification emails that failed to send"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize Redis job queue
    tracing::info!("Connecting to Redis job queue");
    let queue = JobQueue::new(&config.redis_url).expect("Failed to initialize job queue");

    // Initialize vendor client
    if config.vendor_accept_invalid_certs {
        tracing::warn!("TLS certificate validation for vendor calls is DISABLED");
    }
    let vendor = VendorClient::new(&config.vendor_api_url, config.vendor_accept_invalid_certs)
        .expect("Failed to initialize vendor client");

    // Initialize SMTP mailer
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

    // Create shared application state
    let state = AppState::new(db_pool, queue, vendor, mailer, submission);

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/attempts", post(routes::attempts::create_attempt))
        .route(
            "/api/v1/attempts/{receipt_id}",
            get(routes::attempts::get_attempt_status),
        )
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit, JSON only

    tracing::info!("Starting photo-verify on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
