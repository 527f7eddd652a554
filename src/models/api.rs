use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to create a verification attempt and queue its vendor submission.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAttemptRequest {
    #[garde(length(min = 1, max = 64))]
    pub user_id: String,

    #[garde(length(min = 1, max = 150))]
    pub username: String,

    #[garde(email)]
    pub email: String,

    /// Name as it appears on the photo ID.
    #[garde(length(min = 1, max = 256))]
    pub expected_name: String,

    #[garde(url)]
    pub face_image_url: String,

    #[garde(url)]
    pub photo_id_image_url: String,

    #[garde(length(min = 1, max = 512))]
    pub photo_id_key: String,

    /// Receipt id of a prior attempt whose ID-photo data should be resent
    /// (re-verification with a fresh face photo).
    #[garde(skip)]
    pub copy_id_photo_from: Option<Uuid>,
}

/// Response after creating an attempt.
#[derive(Debug, Serialize)]
pub struct CreateAttemptResponse {
    pub receipt_id: Uuid,
    pub status: String,
}

/// Response for querying attempt status.
#[derive(Debug, Serialize)]
pub struct AttemptStatusResponse {
    pub receipt_id: Uuid,
    pub status: String,
    pub error: Option<String>,
    pub submission_retries: i32,
}
