// src/crawl/fetch.rs
// =============================================================================
// Downloading pages.
//
// The crawler only talks to the PageFetcher trait, so tests can serve pages
// from memory. HttpFetcher is the real thing, built on reqwest:
// - one Client per run (connection pooling across sites)
// - browser-like User-Agent (many sites block obvious bots)
// - invalid TLS certificates accepted (small business sites often have them)
// - redirects capped; past the cap we stop and keep the last URL seen
// - 500/502/503/504 answers, timeouts and refused connections are retried
//   twice with a short exponential backoff
//
// A non-2xx answer is not an error here: fetch() hands back the status and
// the crawler decides what a 404 means.
// =============================================================================

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use url::Url;

use crate::config::CrawlSettings;
use crate::error::{HarvestError, Result};

// Retries after the first attempt
const MAX_RETRIES: usize = 2;
const RETRY_BACKOFF_BASE: Duration = Duration::from_millis(200);

/// A downloaded page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Where the request ended up after redirects
    pub final_url: Url,
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GETs a page and returns its body whatever the status code
    async fn fetch(&self, url: &Url) -> Result<FetchedPage>;

    /// Follows redirects from `url` and returns where they lead
    async fn final_url(&self, url: &Url) -> Result<Url>;
}

pub struct HttpFetcher {
    client: Client,
    resolve_timeout: Duration,
    warm_up_timeout: Duration,
    warm_up: bool,
}

impl HttpFetcher {
    pub fn new(settings: &CrawlSettings) -> Result<Self> {
        let max_redirects = settings.max_redirects;

        // Policy::limited() turns the overflow into an error; we want the
        // last URL reached instead, so stop() rather than error()
        let redirect_policy = Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.stop()
            } else {
                attempt.follow()
            }
        });

        let client = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout())
            .danger_accept_invalid_certs(true)
            .redirect(redirect_policy)
            .build()?;

        Ok(Self {
            client,
            resolve_timeout: settings.resolve_timeout(),
            warm_up_timeout: settings.warm_up_timeout(),
            warm_up: settings.warm_up,
        })
    }

    // Sends the request `build` makes, again on a transient failure. The
    // last answer is returned as-is, so a site stuck on 503 still yields a page.
    async fn send_with_retry<F>(&self, url: &Url, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder + Send,
    {
        let mut attempt = 0;
        loop {
            match build().send().await {
                Ok(response) if attempt < MAX_RETRIES && should_retry(response.status()) => {
                    tracing::debug!(
                        target: "crawl_task",
                        "{} answered {}, retrying",
                        url,
                        response.status()
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if attempt < MAX_RETRIES && is_retryable_error(&e) => {
                    tracing::debug!(target: "crawl_task", "Request to {} failed ({}), retrying", url, e);
                }
                Err(e) => return Err(HarvestError::from_request(url.as_str(), e)),
            }
            tokio::time::sleep(retry_backoff(attempt)).await;
            attempt += 1;
        }
    }
}

fn should_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

// 200ms, 400ms, 800ms...
fn retry_backoff(attempt: usize) -> Duration {
    RETRY_BACKOFF_BASE * (1u32 << attempt.min(5))
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
        let response = self
            .send_with_retry(url, || self.client.get(url.clone()))
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| HarvestError::from_request(url.as_str(), e))?;

        Ok(FetchedPage {
            final_url,
            status,
            body,
        })
    }

    async fn final_url(&self, url: &Url) -> Result<Url> {
        let response = self
            .send_with_retry(url, || {
                self.client.head(url.clone()).timeout(self.resolve_timeout)
            })
            .await?;
        let resolved = response.url().clone();

        if self.warm_up {
            // some sites set cookies or wake a cold backend on the first GET
            if let Err(e) = self
                .client
                .get(resolved.clone())
                .timeout(self.warm_up_timeout)
                .send()
                .await
            {
                tracing::debug!(target: "crawl_task", "Warm-up GET for {} failed: {}", resolved, e);
            }
        }

        Ok(resolved)
    }
}
