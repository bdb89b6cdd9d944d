//! Anonymous HTTP access to public objects.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use crate::error::HttpError;

const DEFAULT_S3_HOST: &str = "s3.amazonaws.com";

/// Public URL of `key` in `bucket`, virtual-hosted style.
///
/// Custom endpoints keep their host but are always addressed over `https`.
pub fn public_url(bucket: &str, key: &str, endpoint: Option<&str>) -> String {
    let key = key.trim_start_matches('/');
    let host = endpoint
        .map(|e| {
            e.trim()
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
        })
        .filter(|h| !h.is_empty())
        .unwrap_or(DEFAULT_S3_HOST);
    format!("https://{}.{}/{}", bucket, host, key)
}

/// Anonymous GET of public objects.
pub trait PublicHttp: Send + Sync {
    fn get_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, HttpError>;

    /// Download `url` into `dest`, returning the number of bytes written.
    fn get_to_file(&self, url: &str, dest: &Path, timeout: Duration) -> Result<u64, HttpError> {
        let body = self.get_bytes(url, timeout)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &body)?;
        Ok(body.len() as u64)
    }
}

/// [`PublicHttp`] over a shared `ureq` agent.
#[derive(Clone)]
pub struct UreqPublicHttp {
    agent: ureq::Agent,
}

impl UreqPublicHttp {
    const CONNECT_TIMEOUT_SECS: u64 = 10;

    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(Self::CONNECT_TIMEOUT_SECS))
                .build(),
        }
    }

    fn call(&self, url: &str, timeout: Duration) -> Result<ureq::Response, HttpError> {
        self.agent
            .get(url)
            .timeout(timeout)
            .call()
            .map_err(|e| match e {
                ureq::Error::Status(code, _) => HttpError::Status(code),
                ureq::Error::Transport(t) => HttpError::Transport(t.to_string()),
            })
    }
}

impl Default for UreqPublicHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl PublicHttp for UreqPublicHttp {
    fn get_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, HttpError> {
        let response = self.call(url, timeout)?;
        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body)?;
        Ok(body)
    }

    fn get_to_file(&self, url: &str, dest: &Path, timeout: Duration) -> Result<u64, HttpError> {
        let response = self.call(url, timeout)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(dest)?;
        let written = std::io::copy(&mut response.into_reader(), &mut file)?;
        Ok(written)
    }
}
