// src/crawl/mod.rs
// =============================================================================
// This module handles crawling one website for email addresses.
//
// Features:
// - Seed normalization ("acme.com" -> "https://acme.com") and redirect resolution
// - Breadth-first crawling starting from the resolved URL
// - Same-domain restriction (never leaves the seed's host)
// - Depth, page and queue limits
// - Polite crawling with delays between requests
// - Stops between pages when the run is cancelled
//
// Pages within one site are fetched strictly one after another; sites are
// crawled concurrently by the orchestrator (harvest.rs).
// =============================================================================

mod fetch;
mod normalize;
mod queue;

pub use fetch::{FetchedPage, HttpFetcher, PageFetcher};
pub use normalize::{normalize, parse_seed, resolve};
pub use queue::{crawl_site, CrawlLimits};

/// In-memory fetcher used by the crawl and harvest tests
#[cfg(test)]
pub(crate) mod fake {
    use super::{FetchedPage, PageFetcher};
    use crate::error::{HarvestError, Result};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use tokio_util::sync::CancellationToken;
    use url::Url;

    #[derive(Default)]
    pub(crate) struct StaticFetcher {
        pages: HashMap<String, (u16, String)>,
        redirects: HashMap<String, String>,
        moved: HashMap<String, String>,
        unreachable_hosts: HashSet<String>,
        panic_hosts: HashSet<String>,
        cancel_on: Option<(String, CancellationToken)>,
        fetched: Mutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn page(self, url: &str, body: &str) -> Self {
            self.page_with_status(url, 200, body)
        }

        pub fn page_with_status(mut self, url: &str, status: u16, body: &str) -> Self {
            self.pages
                .insert(url.to_string(), (status, body.to_string()));
            self
        }

        pub fn redirect(mut self, from: &str, to: &str) -> Self {
            self.redirects.insert(from.to_string(), to.to_string());
            self
        }

        /// Fetching `from` follows a redirect and serves the page at `to`
        pub fn moved(mut self, from: &str, to: &str) -> Self {
            self.moved.insert(from.to_string(), to.to_string());
            self
        }

        /// Every request to this host times out
        pub fn unreachable(mut self, host: &str) -> Self {
            self.unreachable_hosts.insert(host.to_string());
            self
        }

        /// Fetching any page on this host panics the calling task
        pub fn panic_on(mut self, host: &str) -> Self {
            self.panic_hosts.insert(host.to_string());
            self
        }

        /// Cancels `token` while serving `url`
        pub fn cancel_on(mut self, url: &str, token: CancellationToken) -> Self {
            self.cancel_on = Some((url.to_string(), token));
            self
        }

        pub fn fetched(&self) -> Vec<String> {
            self.fetched.lock().clone()
        }

        fn host_of(url: &Url) -> String {
            url.host_str().unwrap_or_default().to_string()
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &Url) -> Result<FetchedPage> {
            let host = Self::host_of(url);
            if self.panic_hosts.contains(&host) {
                panic!("fetcher exploded on {}", url);
            }
            self.fetched.lock().push(url.to_string());

            if self.unreachable_hosts.contains(&host) {
                return Err(HarvestError::Timeout(url.to_string()));
            }
            if let Some((trigger, token)) = &self.cancel_on {
                if trigger == url.as_str() {
                    token.cancel();
                }
            }

            let final_url = match self.moved.get(url.as_str()) {
                Some(target) => Url::parse(target).expect("fake redirect target is a valid URL"),
                None => url.clone(),
            };
            let (status, body) = self
                .pages
                .get(final_url.as_str())
                .cloned()
                .unwrap_or((404, String::new()));
            Ok(FetchedPage {
                final_url,
                status,
                body,
            })
        }

        async fn final_url(&self, url: &Url) -> Result<Url> {
            if self.unreachable_hosts.contains(&Self::host_of(url)) {
                return Err(HarvestError::Timeout(url.to_string()));
            }
            match self.redirects.get(url.as_str()) {
                Some(target) => Url::parse(target).map_err(|e| HarvestError::InvalidUrl {
                    url: target.clone(),
                    reason: e.to_string(),
                }),
                None => Ok(url.clone()),
            }
        }
    }
}
