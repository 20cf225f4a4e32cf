use std::time::Duration;

use futures_util::StreamExt;
use jobsync_core::{Page, User};
use jobsync_logging::sync_debug;
use reqwest::header::COOKIE;
use reqwest::StatusCode;
use url::Url;

use crate::{FailureKind, FetchError};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    /// Sent verbatim as the `Cookie` header on every request.
    pub session_cookie: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            session_cookie: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Authoritative paginated job listing.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, page_index: u32, page_size: u32) -> Result<Page, FetchError>;
}

/// Current session profile; `Ok(None)` when nobody is signed in.
#[async_trait::async_trait]
pub trait UserFetcher: Send + Sync {
    async fn fetch_current_user(&self) -> Result<Option<User>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct HttpApiClient {
    settings: ClientSettings,
    client: reqwest::Client,
}

impl HttpApiClient {
    pub fn new(settings: ClientSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, FetchError> {
        let mut request = self.client.get(url);
        if let Some(cookie) = &self.settings.session_cookie {
            request = request.header(COOKIE, cookie);
        }
        request.send().await.map_err(map_reqwest_error)
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpApiClient {
    async fn fetch_page(&self, page_index: u32, page_size: u32) -> Result<Page, FetchError> {
        let offset = u64::from(page_index.saturating_sub(1)) * u64::from(page_size);
        let mut url = endpoint(&self.settings.base_url, "files")?;
        url.query_pairs_mut()
            .append_pair("limit", &page_size.to_string())
            .append_pair("offset", &offset.to_string());

        let response = self.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = read_body(response, self.settings.max_bytes).await?;
        let page: Page = serde_json::from_slice(&body)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        sync_debug!(
            "api: page {} returned {} of {} jobs",
            page_index,
            page.items.len(),
            page.total
        );
        Ok(page)
    }
}

#[async_trait::async_trait]
impl UserFetcher for HttpApiClient {
    async fn fetch_current_user(&self) -> Result<Option<User>, FetchError> {
        let url = endpoint(&self.settings.base_url, "me")?;
        let response = self.get(url).await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let body = read_body(response, self.settings.max_bytes).await?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
    }
}

/// Appends `path` to the base URL, keeping any path prefix the base carries.
pub(crate) fn endpoint(base_url: &str, path: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(base_url)
        .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| FetchError::new(FailureKind::InvalidUrl, "base url cannot carry a path"))?
        .pop_if_empty()
        .extend(path.split('/').filter(|segment| !segment.is_empty()));
    Ok(url)
}

async fn read_body(response: reqwest::Response, max_bytes: u64) -> Result<Vec<u8>, FetchError> {
    if let Some(content_len) = response.content_length() {
        if content_len > max_bytes {
            return Err(FetchError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(content_len),
                },
                "response too large",
            ));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        let next_len = bytes.len() as u64 + chunk.len() as u64;
        if next_len > max_bytes {
            return Err(FetchError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(next_len),
                },
                "response too large",
            ));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
