use reqwest::Client;
use std::time::Duration;

/// Configuration options for HTTP client creation
#[derive(Debug, Clone, Default)]
pub struct HttpClientConfig {
    /// Whole-request timeout (defaults to reqwest's default if None)
    pub timeout: Option<Duration>,
    /// Connect timeout, applied separately so unreachable hosts fail fast
    pub connect_timeout: Option<Duration>,
}

impl HttpClientConfig {
    /// Create config with custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            connect_timeout: Some(Duration::from_secs(10).min(timeout)),
        }
    }
}

/// Common HTTP client builder shared by the embedding and chat providers
pub fn build_http_client(config: &HttpClientConfig) -> Result<Client, reqwest::Error> {
    let mut client_builder = Client::builder();

    if let Some(timeout) = config.timeout {
        client_builder = client_builder.timeout(timeout);
    }
    if let Some(connect_timeout) = config.connect_timeout {
        client_builder = client_builder.connect_timeout(connect_timeout);
    }

    client_builder.build()
}

/// Join a base URL and an API path without doubling slashes
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("http://localhost:11434/", "/api/embeddings"),
            "http://localhost:11434/api/embeddings"
        );
        assert_eq!(
            endpoint_url("http://localhost:11434", "api/chat"),
            "http://localhost:11434/api/chat"
        );
    }

    #[test]
    fn test_with_timeout_caps_connect_timeout() {
        let config = HttpClientConfig::with_timeout(Duration::from_secs(3));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(3)));
        assert!(build_http_client(&config).is_ok());
    }
}
