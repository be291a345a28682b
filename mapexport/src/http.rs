//! HTTP client abstraction for testability

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::FetchError;

/// Default timeout for a single request in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Buffer size for streaming response bodies to disk (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Trait for HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait HttpClient: Send + Sync {
    /// Performs an HTTP GET request and returns the whole body.
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Performs an HTTP GET request and writes the body to `dest`.
    ///
    /// Parent directories are created as needed. Returns the number of
    /// bytes written; an empty body is written but reported as
    /// [`FetchError::Empty`].
    fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let body = self.get(url)?;
        create_parent(dest)?;
        fs::write(dest, &body).map_err(|e| FetchError::Write {
            path: dest.to_path_buf(),
            source: e,
        })?;
        if body.is_empty() {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }
        Ok(body.len() as u64)
    }
}

fn create_parent(dest: &Path) -> Result<(), FetchError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| FetchError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(timeout_secs.max(1));
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Http {
                url: String::new(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, timeout })
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let response = self.client.get(parsed).send().map_err(|e| self.map_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    fn map_error(&self, url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.send(url)?
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| self.map_error(url, e))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let mut response = self.send(url)?;

        create_parent(dest)?;
        let file = File::create(dest).map_err(|e| FetchError::Write {
            path: dest.to_path_buf(),
            source: e,
        })?;

        // Stream to file
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut written = 0u64;

        loop {
            let bytes_read = response.read(&mut buffer).map_err(|e| FetchError::Http {
                url: url.to_string(),
                reason: format!("read error: {}", e),
            })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| FetchError::Write {
                    path: dest.to_path_buf(),
                    source: e,
                })?;

            written += bytes_read as u64;
        }

        writer.flush().map_err(|e| FetchError::Write {
            path: dest.to_path_buf(),
            source: e,
        })?;

        if written == 0 {
            return Err(FetchError::Empty {
                url: url.to_string(),
            });
        }

        Ok(written)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// In-memory HTTP origin for testing.
    ///
    /// Unknown URLs answer 404. Every requested URL is recorded.
    #[derive(Default)]
    pub struct MockHttpClient {
        responses: Mutex<HashMap<String, Vec<u8>>>,
        requests: Mutex<Vec<String>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
            self.responses.lock().insert(url.into(), body.into());
        }

        pub fn remove(&self, url: &str) {
            self.responses.lock().remove(url);
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().clone()
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requests.lock().push(url.to_string());
            self.responses
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    #[test]
    fn test_mock_client_success() {
        let mock = MockHttpClient::new();
        mock.insert("http://example.com/a", vec![1, 2, 3, 4]);

        let result = mock.get("http://example.com/a");
        assert_eq!(result.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(mock.requests(), vec!["http://example.com/a".to_string()]);
    }

    #[test]
    fn test_mock_client_missing_is_404() {
        let mock = MockHttpClient::new();
        let result = mock.get("http://example.com/missing");
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }

    #[test]
    fn test_default_download_creates_parents() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("a/b/c.png");
        let mock = MockHttpClient::new();
        mock.insert("http://example.com/c.png", vec![9; 10]);

        let written = mock.download("http://example.com/c.png", &dest).unwrap();

        assert_eq!(written, 10);
        assert_eq!(fs::read(&dest).unwrap(), vec![9; 10]);
    }

    #[test]
    fn test_default_download_flags_empty_body() {
        let temp = tempfile::TempDir::new().unwrap();
        let dest = temp.path().join("empty.png");
        let mock = MockHttpClient::new();
        mock.insert("http://example.com/empty.png", Vec::new());

        let result = mock.download("http://example.com/empty.png", &dest);
        assert!(matches!(result, Err(FetchError::Empty { .. })));
    }

    #[test]
    fn test_reqwest_client_rejects_malformed_url() {
        let client = ReqwestClient::with_timeout(1).unwrap();
        let result = client.get("not a url");
        assert!(matches!(result, Err(FetchError::InvalidUrl { .. })));
    }

    #[test]
    fn test_reqwest_client_timeout() {
        let client = ReqwestClient::with_timeout(5).unwrap();
        assert_eq!(client.timeout(), Duration::from_secs(5));
    }
}
