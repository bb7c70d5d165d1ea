use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;

use crate::stores::{DownloadedBytes, StoreError};

/// HTTP policy for image downloads. Timeout and retry decisions live here,
/// outside the pipeline itself.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Blocking HTTP downloader for remote images. Host media stores delegate
/// their `download` to this.
pub struct HttpDownloader {
    client: Client,
    settings: FetchSettings,
}

impl HttpDownloader {
    pub fn new(settings: FetchSettings) -> Result<Self, StoreError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| StoreError::Download(err.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn download(&self, url: &str) -> Result<DownloadedBytes, StoreError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| StoreError::Download(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Download(format!("{url}: http {status}")));
        }
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            if !is_image_content_type(content_type) {
                return Err(StoreError::Download(format!(
                    "{url}: unexpected content type {content_type}"
                )));
            }
        }
        if let Some(length) = response.content_length() {
            if length > self.settings.max_bytes {
                return Err(StoreError::Download(format!(
                    "{url}: {length} bytes exceeds the {} byte limit",
                    self.settings.max_bytes
                )));
            }
        }

        let bytes = response
            .bytes()
            .map_err(|err| StoreError::Download(err.to_string()))?;
        if bytes.len() as u64 > self.settings.max_bytes {
            return Err(StoreError::Download(format!(
                "{url}: body exceeds the {} byte limit",
                self.settings.max_bytes
            )));
        }
        Ok(bytes.to_vec())
    }
}

fn is_image_content_type(content_type: &str) -> bool {
    let ct = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    ct.starts_with("image/") || ct.eq_ignore_ascii_case("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::is_image_content_type;

    #[test]
    fn image_content_types_pass() {
        assert!(is_image_content_type("image/jpeg"));
        assert!(is_image_content_type("image/png; charset=binary"));
        assert!(is_image_content_type("application/octet-stream"));
        assert!(!is_image_content_type("text/html; charset=utf-8"));
    }
}
