//! Remote playcast source.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONNECTION};
use reqwest::StatusCode;

use pc_core::config::UpstreamConfig;
use pc_core::{Error, FragmentKey, Result, SyncRecord};

/// A single-shot fetch against the upstream feed.
///
/// Implementations classify failures: transport problems are
/// [`Error::TransientFetch`], well-formed refusals are
/// [`Error::UpstreamRejection`]. Retrying is the caller's business.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// `GET {base}/sync`
    async fn fetch_sync(&self) -> Result<SyncRecord>;

    /// `GET {base}/{number}/{type}`
    async fn fetch_fragment(&self, key: FragmentKey) -> Result<Bytes>;
}

/// reqwest-backed upstream.
pub struct HttpUpstream {
    http: reqwest::Client,
    base_url: String,
}

impl HttpUpstream {
    /// Build a client for `base_url`. A zero timeout disables the limit.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        // One request per connection.
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if !timeout.is_zero() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        Self::new(
            config.base_url(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, path: &str) -> Result<(String, Bytes)> {
        let url = format!("{}/{path}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::transient(&url, e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            let reason = status.canonical_reason().unwrap_or("unexpected status");
            return Err(Error::rejected(url, status.as_u16(), reason));
        }

        let body = resp.bytes().await.map_err(|e| Error::transient(&url, e))?;
        Ok((url, body))
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch_sync(&self) -> Result<SyncRecord> {
        let (_, body) = self.get("sync").await?;
        SyncRecord::from_json(&body)
    }

    async fn fetch_fragment(&self, key: FragmentKey) -> Result<Bytes> {
        let (url, body) = self.get(&key.to_string()).await?;
        if body.is_empty() {
            // Announced but not filled yet.
            return Err(Error::rejected(url, StatusCode::OK.as_u16(), "empty payload"));
        }
        Ok(body)
    }
}
