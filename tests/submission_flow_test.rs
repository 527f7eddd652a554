use chrono::Utc;
use photo_verify::models::attempt::{
    AttemptStatus, VendorRequestParams, VerificationAttempt,
};
use photo_verify::services::submission::{RetryStep, SubmissionOutcome};
use photo_verify::services::vendor::VendorClient;
use uuid::Uuid;
use wiremock::matchers::{header_exists, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn attempt(receipt_id: Uuid) -> VerificationAttempt {
    VerificationAttempt {
        id: Uuid::new_v4(),
        receipt_id,
        user_id: "7".to_string(),
        username: "flowtest".to_string(),
        email: "flowtest@example.com".to_string(),
        expected_name: "Flow Test".to_string(),
        face_image_url: "https://photos.example.com/face/flow.jpg".to_string(),
        photo_id_image_url: "https://photos.example.com/id/flow.jpg".to_string(),
        photo_id_key: "flow-key".to_string(),
        status: AttemptStatus::Created,
        error: None,
        submission_retries: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        submitted_at: None,
    }
}

fn params() -> VendorRequestParams {
    VendorRequestParams {
        access_key: "flow-access".to_string(),
        secret_key: "flow-secret".to_string(),
        callback_url: "https://verify.example.com/results".to_string(),
    }
}

/// Vendor accepts: the signed request goes out once and the outcome is
/// `Submitted` with no retry scheduled.
#[tokio::test]
async fn accepted_submission_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header_exists("Authorization"))
        .and(header_exists("Date"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let client = VendorClient::new(&server.uri(), false).unwrap();
    let request = attempt(Uuid::new_v4()).vendor_request(None, &params()).unwrap();
    let response = client.submit(&request).await.unwrap();

    assert_eq!(
        SubmissionOutcome::from_response(&response),
        SubmissionOutcome::Submitted
    );
}

/// Vendor rejects every call: the outcome is `MustRetry` carrying the
/// response body, and the rejection does not consume the retry budget.
#[tokio::test]
async fn rejected_submission_keeps_detail_and_skips_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string("PhotoID unreadable"))
        .expect(1)
        .mount(&server)
        .await;

    let client = VendorClient::new(&server.uri(), false).unwrap();
    let request = attempt(Uuid::new_v4()).vendor_request(None, &params()).unwrap();
    let response = client.submit(&request).await.unwrap();

    assert_eq!(
        SubmissionOutcome::from_response(&response),
        SubmissionOutcome::MustRetry {
            detail: "PhotoID unreadable".to_string()
        }
    );
}

/// Connection errors walk the retry ladder: with max_retries = 3 the job
/// reschedules three times and gives up on the fourth attempt.
#[tokio::test]
async fn connection_errors_exhaust_the_retry_budget() {
    // Nothing listens here.
    let client = VendorClient::new("http://127.0.0.1:1/submit", false).unwrap();
    let request = attempt(Uuid::new_v4()).vendor_request(None, &params()).unwrap();

    let max_retries = 3;
    let mut attempts = 0u32;
    let mut retries = 0u32;
    loop {
        attempts += 1;
        assert!(client.submit(&request).await.is_err());

        match RetryStep::next(retries, max_retries) {
            RetryStep::Reschedule { next_retries } => retries = next_retries,
            RetryStep::GiveUp => break,
        }
    }

    assert_eq!(attempts, max_retries + 1);
}

/// Re-verification reuses the prior attempt's ID photo on the wire.
#[tokio::test]
async fn reverification_sends_prior_id_photo() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let current = attempt(Uuid::new_v4());
    let mut prior = attempt(Uuid::new_v4());
    prior.photo_id_image_url = "https://photos.example.com/id/original.jpg".to_string();
    prior.photo_id_key = "original-key".to_string();

    let request = current.vendor_request(Some(&prior), &params()).unwrap();
    let client = VendorClient::new(&server.uri(), false).unwrap();
    client.submit(&request).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["PhotoID"], "https://photos.example.com/id/original.jpg");
    assert_eq!(body["PhotoIDKey"], "original-key");
    assert_eq!(body["UserPhoto"], current.face_image_url);
    assert_eq!(body["ReceiptID"], current.receipt_id.to_string());
}
