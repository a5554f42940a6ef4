//! Transport configuration for the interview backend client.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;

/// Base URL used when none is configured.
pub const DEFAULT_API_BASE: &str = "http://localhost:8000";

/// Environment variable overriding the backend base URL.
pub const API_URL_ENV: &str = "INTERVIEW_API_URL";

/// Environment variable holding the request timeout in seconds.
pub const API_TIMEOUT_ENV: &str = "INTERVIEW_API_TIMEOUT_SECS";

/// A secret string type for sensitive data like access tokens.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// HTTP transport options shared by every request the client makes.
///
/// The timeout applies to whole requests, so it is NOT applied to the
/// streaming answer endpoint; streamed reads run until the server closes
/// or the caller cancels.
///
/// # Example
/// ```rust
/// use interview_client::options::TransportOptions;
/// use std::time::Duration;
///
/// let options = TransportOptions::new("https://interview.example.com")
///     .with_timeout(Duration::from_secs(30))
///     .with_header("X-Client".to_string(), "cli".to_string());
/// assert_eq!(options.base_url, "https://interview.example.com");
/// ```
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Base URL for API endpoints, without trailing slash
    pub base_url: String,

    /// Request timeout for non-streaming calls
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl TransportOptions {
    /// Create new transport options pointing at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: None,
            proxy: None,
            extra_headers: None,
        }
    }

    /// Read options from `INTERVIEW_API_URL` and `INTERVIEW_API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let mut options = Self::new(base_url);

        if let Ok(raw) = std::env::var(API_TIMEOUT_ENV) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ClientError::Config(format!("{API_TIMEOUT_ENV} must be an integer, got {raw:?}")))?;
            options.timeout = Some(Duration::from_secs(secs));
        }

        Ok(options)
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set extra headers.
    pub fn with_extra_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.extra_headers = Some(headers);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Join an API path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_string_is_redacted() {
        let secret = SecretString::from("token-123");
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(secret.expose_secret(), "token-123");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let options = TransportOptions::new("http://localhost:8000/");
        assert_eq!(options.url("/jobs/"), "http://localhost:8000/jobs/");
    }

    #[test]
    fn test_with_header_accumulates() {
        let options = TransportOptions::default()
            .with_header("A".to_string(), "1".to_string())
            .with_header("B".to_string(), "2".to_string());
        assert_eq!(options.extra_headers.unwrap().len(), 2);
    }
}
