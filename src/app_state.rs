use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{
    mailer::StatusMailer, queue::JobQueue, submission::SubmissionSettings, vendor::VendorClient,
};

/// Shared application state for the API server and the worker.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<JobQueue>,
    pub vendor: Arc<VendorClient>,
    pub mailer: Arc<StatusMailer>,
    pub submission: SubmissionSettings,
}

impl AppState {
    pub fn new(
        db: PgPool,
        queue: JobQueue,
        vendor: VendorClient,
        mailer: StatusMailer,
        submission: SubmissionSettings,
    ) -> Self {
        Self {
            db,
            queue: Arc::new(queue),
            vendor: Arc::new(vendor),
            mailer: Arc::new(mailer),
            submission,
        }
    }
}
