use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Optional for worker processes.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for job queue
    pub redis_url: String,

    /// Verification vendor endpoint for photo submissions
    pub vendor_api_url: String,

    /// Vendor API access key (goes into the Authorization header)
    pub vendor_access_key: String,

    /// Vendor API secret key (HMAC signing key)
    pub vendor_secret_key: String,

    /// Callback URL the vendor posts verification results to
    pub vendor_callback_url: String,

    /// Skip TLS certificate validation on vendor calls. The legacy system
    /// ran with verification disabled; default here is the safe setting.
    #[serde(default)]
    pub vendor_accept_invalid_certs: bool,

    /// Delay between submission retry attempts, in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub submission_retry_delay_secs: u64,

    /// Maximum number of submission retries after the initial attempt
    #[serde(default = "default_max_retries")]
    pub submission_max_retries: u32,

    /// SMTP server hostname
    pub smtp_host: String,

    /// SMTP server port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// SMTP username (optional, unauthenticated relay if absent)
    pub smtp_username: Option<String>,

    /// SMTP password
    pub smtp_password: Option<String>,

    /// System default "from" address for status emails
    pub default_from_email: String,

    /// Per-deployment override of the "from" address
    pub email_from_override: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_retry_delay_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_smtp_port() -> u16 {
    587
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Effective "from" address: deployment override, else system default.
    pub fn from_email(&self) -> &str {
        self.email_from_override
            .as_deref()
            .unwrap_or(&self.default_from_email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            bind_addr: default_bind_addr(),
            database_url: String::new(),
            redis_url: String::new(),
            vendor_api_url: String::new(),
            vendor_access_key: String::new(),
            vendor_secret_key: String::new(),
            vendor_callback_url: String::new(),
            vendor_accept_invalid_certs: false,
            submission_retry_delay_secs: 30,
            submission_max_retries: 3,
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            default_from_email: "no-reply@example.com".to_string(),
            email_from_override: None,
        }
    }

    #[test]
    fn test_from_email_prefers_override() {
        let mut config = base_config();
        config.email_from_override = Some("verify@deployment.example.com".to_string());
        assert_eq!(config.from_email(), "verify@deployment.example.com");
    }

    #[test]
    fn test_from_email_falls_back_to_default() {
        let config = base_config();
        assert_eq!(config.from_email(), "no-reply@example.com");
    }
}
