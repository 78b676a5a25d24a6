//! HTTP [`PageFetcher`] backed by `reqwest`.
//!
//! Sends browser-like headers (User-Agent, Accept, Accept-Language,
//! Referer); the distribution pages serve a reduced page to unknown
//! clients. Any transport error or non-2xx status is a failure.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};

use crate::config::FetchConfig;
use crate::traits::PageFetcher;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .context("fetch.accept_language is not a valid header value")?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&config.referer)
                .context("fetch.referer is not a valid header value")?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            bail!("GET {} returned HTTP {}", url, status);
        }

        resp.text()
            .await
            .with_context(|| format!("Failed to read body from {}", url))
    }
}
