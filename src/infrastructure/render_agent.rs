//! Render/fetch agent
//!
//! The pipeline only needs two capabilities from whatever renders pages: open a
//! locator, and wait until the current page shows a given element. One agent is
//! one session; the pipeline owns it exclusively for a run.
//!
//! `HttpRenderAgent` is the stock implementation: plain HTTP with request pacing.
//! Waiting re-fetches the current page until the element appears or the timeout
//! runs out.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed};
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::Html;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::infrastructure::config::{FetchConfig, FetchMode};
use crate::infrastructure::parsing::error::compile_selector;

/// Markup of one loaded page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub locator: String,
    pub html: String,
}

impl RenderedPage {
    pub fn new(locator: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            html: html.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Timed out after {timeout_ms} ms loading {locator}")]
    Timeout { locator: String, timeout_ms: u128 },

    #[error("Timed out after {timeout_ms} ms waiting for '{selector}' on {locator}")]
    WaitTimeout {
        locator: String,
        selector: String,
        timeout_ms: u128,
    },

    #[error("HTTP {status} for {locator}")]
    HttpStatus { locator: String, status: u16 },

    #[error("Request to {locator} failed: {message}")]
    Transport { locator: String, message: String },

    #[error("Invalid wait condition '{selector}': {reason}")]
    InvalidCondition { selector: String, reason: String },

    #[error("No page is open in this session")]
    NoPageOpen,
}

impl FetchError {
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::WaitTimeout { .. })
    }
}

/// One page-rendering session
#[async_trait]
pub trait RenderAgent: Send {
    /// Load a locator; it becomes the session's current page.
    async fn open(&mut self, locator: &str) -> Result<RenderedPage, FetchError>;

    /// Block until the current page contains `selector`, or time out.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<RenderedPage, FetchError>;

    /// Open a locator and wait for its ready marker.
    async fn open_and_wait(
        &mut self,
        locator: &str,
        selector: &str,
        timeout: Duration,
    ) -> Result<RenderedPage, FetchError> {
        self.open(locator).await?;
        self.wait_for(selector, timeout).await
    }
}

/// Whether `html` contains an element matching `selector`.
pub fn page_contains(html: &str, selector: &str) -> Result<bool, FetchError> {
    let compiled = compile_selector(selector).map_err(|e| FetchError::InvalidCondition {
        selector: e.selector,
        reason: e.reason,
    })?;
    Ok(Html::parse_document(html).select(&compiled).next().is_some())
}

/// HTTP-backed render agent with request pacing
pub struct HttpRenderAgent {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: FetchConfig,
    current: Option<RenderedPage>,
}

impl HttpRenderAgent {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to create HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("Rate limit must be greater than 0")?,
        );

        if config.mode == FetchMode::Visible {
            info!("HTTP agent has no window to show; visible mode runs like headless");
        }

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config: config.clone(),
            current: None,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    async fn fetch(&self, locator: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;
        debug!("Fetching URL: {}", locator);

        let timeout = self.config.timeout();
        let request = async {
            let response = self
                .client
                .get(locator)
                .send()
                .await
                .map_err(|e| transport_error(locator, timeout, &e))?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    locator: locator.to_string(),
                    status: status.as_u16(),
                });
            }
            response.text().await.map_err(|e| transport_error(locator, timeout, &e))
        };

        tokio::time::timeout(timeout, request)
            .await
            .map_err(|_| FetchError::Timeout {
                locator: locator.to_string(),
                timeout_ms: timeout.as_millis(),
            })?
    }
}

fn transport_error(locator: &str, timeout: Duration, e: &reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            locator: locator.to_string(),
            timeout_ms: timeout.as_millis(),
        }
    } else {
        FetchError::Transport {
            locator: locator.to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl RenderAgent for HttpRenderAgent {
    async fn open(&mut self, locator: &str) -> Result<RenderedPage, FetchError> {
        let html = self.fetch(locator).await?;
        debug!("Loaded {} ({} bytes)", locator, html.len());
        let page = RenderedPage::new(locator, html);
        self.current = Some(page.clone());
        Ok(page)
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<RenderedPage, FetchError> {
        let deadline = Instant::now() + timeout;
        loop {
            let page = self.current.as_ref().ok_or(FetchError::NoPageOpen)?;
            if page_contains(&page.html, selector)? {
                return Ok(page.clone());
            }
            let locator = page.locator.clone();

            let now = Instant::now();
            if now >= deadline {
                return Err(FetchError::WaitTimeout {
                    locator,
                    selector: selector.to_string(),
                    timeout_ms: timeout.as_millis(),
                });
            }

            tokio::time::sleep(self.config.poll_interval().min(deadline - now)).await;
            debug!("'{}' not present yet on {}, reloading", selector, locator);
            let html = self.fetch(&locator).await?;
            self.current = Some(RenderedPage::new(locator, html));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_creation() {
        let agent = HttpRenderAgent::new(&FetchConfig::default());
        assert!(agent.is_ok());
    }

    #[test]
    fn zero_rate_limit_is_refused() {
        let config = FetchConfig {
            max_requests_per_second: 0,
            ..FetchConfig::default()
        };
        assert!(HttpRenderAgent::new(&config).is_err());
    }

    #[test]
    fn page_contains_checks_selector() {
        let html = "<div class='dkDataSheet'><table></table></div>";
        assert!(page_contains(html, ".dkDataSheet").unwrap());
        assert!(!page_contains(html, ".schnellzugriff-links").unwrap());
        assert!(matches!(
            page_contains(html, "div >"),
            Err(FetchError::InvalidCondition { .. })
        ));
    }

    #[tokio::test]
    async fn silent_server_times_out_with_configured_bound() -> anyhow::Result<()> {
        // Accepts connections but never answers
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let locator = format!("http://{}/Kamera/Schnellzugriff.aspx", listener.local_addr()?);

        let config = FetchConfig {
            timeout_secs: 1,
            ..FetchConfig::default()
        };
        let mut agent = HttpRenderAgent::new(&config)?;
        let err = agent.open(&locator).await.unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(
            err,
            FetchError::Timeout {
                locator,
                timeout_ms: 1000
            }
        );
        drop(listener);
        Ok(())
    }

    #[tokio::test]
    async fn wait_without_open_page_fails() {
        let mut agent = HttpRenderAgent::new(&FetchConfig::default()).unwrap();
        let err = agent.wait_for(".dkDataSheet", Duration::from_millis(10)).await.unwrap_err();
        assert_eq!(err, FetchError::NoPageOpen);
    }
}
