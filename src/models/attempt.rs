use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Lifecycle status of a photo verification attempt.
///
/// This service drives `created -> submitted` and `created -> must_retry`;
/// `approved` and `denied` are advanced by the external reconciliation path
/// once the vendor reports back, and are terminal here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttemptStatus {
    Created,
    Submitted,
    MustRetry,
    Approved,
    Denied,
}

/// A persisted identity-photo verification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationAttempt {
    pub id: Uuid,
    /// Identifier the vendor knows this attempt by.
    pub receipt_id: Uuid,
    pub user_id: String,
    pub username: String,
    pub email: String,
    /// Name the vendor should expect on the photo ID.
    pub expected_name: String,
    /// Location of the stored face photo for this attempt.
    pub face_image_url: String,
    /// Location of the stored ID photo for this attempt.
    pub photo_id_image_url: String,
    /// Opaque decryption key reference for the ID photo, forwarded to the vendor.
    pub photo_id_key: String,
    pub status: AttemptStatus,
    pub error: Option<String>,
    pub submission_retries: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Credentials and routing needed to address the vendor.
#[derive(Debug, Clone)]
pub struct VendorRequestParams {
    pub access_key: String,
    pub secret_key: String,
    pub callback_url: String,
}

/// A fully assembled, signed vendor submission.
#[derive(Debug, Clone)]
pub struct VendorRequest {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl VerificationAttempt {
    /// Assemble the signed vendor request for this attempt.
    ///
    /// When `copy_id_photo_from` is given, the ID-photo fields come from that
    /// prior attempt: re-verification sends a new face photo together with the
    /// previously submitted photo ID data.
    pub fn vendor_request(
        &self,
        copy_id_photo_from: Option<&VerificationAttempt>,
        params: &VendorRequestParams,
    ) -> Result<VendorRequest, serde_json::Error> {
        let id_photo_source = copy_id_photo_from.unwrap_or(self);

        let body_value = serde_json::json!({
            "ExpectedName": self.expected_name,
            "PhotoID": id_photo_source.photo_id_image_url,
            "PhotoIDKey": id_photo_source.photo_id_key,
            "ReceiptID": self.receipt_id.to_string(),
            "SendResponseTo": params.callback_url,
            "UserPhoto": self.face_image_url,
        });
        let body = canonical_json(&body_value)?;

        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let signature = sign_request(&params.secret_key, &date, &body);

        let headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Date".to_string(), date),
            (
                "Authorization".to_string(),
                format!("SSI {}:{}", params.access_key, signature),
            ),
        ];

        Ok(VendorRequest {
            headers,
            body: body.into_bytes(),
        })
    }
}

/// Serialize a JSON value the way the vendor expects: sorted keys, two-space
/// indentation, non-ASCII characters escaped to `\uXXXX`.
///
/// serde_json's default object map is a BTreeMap, so key order is already
/// deterministic; only the ASCII escaping needs doing by hand.
pub fn canonical_json(value: &serde_json::Value) -> Result<String, serde_json::Error> {
    let pretty = serde_json::to_string_pretty(value)?;
    Ok(escape_non_ascii(&pretty))
}

fn escape_non_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_ascii() {
            out.push(ch);
        } else {
            // Supplementary-plane characters become surrogate pairs.
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// HMAC-SHA256 over the method, date, and body, base64-encoded.
fn sign_request(secret_key: &str, date: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(b"POST\n");
    mac.update(date.as_bytes());
    mac.update(b"\n");
    mac.update(body.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}
