use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::models::attempt::VendorRequest;

/// Response from a completed vendor round trip. Any status counts as
/// "completed" here; only transport failures surface as errors.
#[derive(Debug, Clone)]
pub struct VendorResponse {
    pub status: u16,
    pub body: String,
}

impl VendorResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for the identity verification vendor.
pub struct VendorClient {
    http: Client,
    api_url: String,
}

impl VendorClient {
    /// Build the client. `accept_invalid_certs` exists for parity with legacy
    /// deployments that pinned nothing and verified nothing; leave it off.
    pub fn new(api_url: &str, accept_invalid_certs: bool) -> Result<Self, VendorError> {
        let http = Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(VendorError::Http)?;

        Ok(Self {
            http,
            api_url: api_url.to_string(),
        })
    }

    /// POST a signed submission to the vendor and read back the full body.
    pub async fn submit(&self, request: &VendorRequest) -> Result<VendorResponse, VendorError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| VendorError::InvalidHeader(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| VendorError::InvalidHeader(e.to_string()))?;
            headers.insert(name, value);
        }

        let response = self
            .http
            .post(&self.api_url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(VendorError::Http)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(VendorError::Http)?;

        Ok(VendorResponse { status, body })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VendorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid request header: {0}")]
    InvalidHeader(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn signed_request() -> VendorRequest {
        VendorRequest {
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Date".to_string(), "Mon, 01 Jan 2024 00:00:00 GMT".to_string()),
                ("Authorization".to_string(), "SSI key:c2ln".to_string()),
            ],
            body: b"{\n  \"ReceiptID\": \"r-1\"\n}".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_submit_carries_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("Authorization", "SSI key:c2ln"))
            .and(header("Content-Type", "application/json"))
            .and(body_string_contains("ReceiptID"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .expect(1)
            .mount(&server)
            .await;

        let client = VendorClient::new(&server.uri(), false).unwrap();
        let response = client.submit(&signed_request()).await.unwrap();

        assert!(response.is_success());
        assert_eq!(response.body, "OK");
    }

    #[tokio::test]
    async fn test_rejection_is_a_completed_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad submission"))
            .mount(&server)
            .await;

        let client = VendorClient::new(&server.uri(), false).unwrap();
        let response = client.submit(&signed_request()).await.unwrap();

        assert!(!response.is_success());
        assert_eq!(response.status, 400);
        assert_eq!(response.body, "bad submission");
    }

    #[tokio::test]
    async fn test_connection_failure_is_an_error() {
        // Nothing listens on this port.
        let client = VendorClient::new("http://127.0.0.1:1/submit", false).unwrap();
        let result = client.submit(&signed_request()).await;
        assert!(matches!(result, Err(VendorError::Http(_))));
    }
}
