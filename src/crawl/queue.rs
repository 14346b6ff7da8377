// src/crawl/queue.rs
// =============================================================================
// This module implements the per-site crawl with a breadth-first approach.
//
// How it works:
// 1. Start with the resolved seed URL in a queue (depth 0)
// 2. Fetch the page HTML
// 3. Run the email extractor over it
// 4. If we're not at max depth, add same-domain links to the queue
// 5. Repeat until the queue is empty, the page budget is spent, or the run
//    is cancelled
// 6. Drop garbage addresses from everything found
//
// Politeness:
// - Adds delay between requests to avoid overwhelming servers
// - Only crawls the seed's host
// - Caps both the number of pages fetched and the size of the queue
//
// A failed page (timeout, 404, ...) doesn't stop the crawl, and the body of
// an error page is still scanned. A seed that can't be reached at all makes
// the whole site an error, since nothing else can be reached.
// =============================================================================

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::fetch::PageFetcher;
use crate::error::HarvestError;
use crate::extract::{extract_with_stats, ExtractionStats, FilterRules};
use crate::progress::{Progress, ProgressEvent};
use crate::report::{SiteResult, SiteStatus};

static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("static selector is valid"));

/// Bounds on how far one site crawl may go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    /// Link hops from the seed (0 = seed page only)
    pub depth: usize,
    pub max_pages: usize,
    pub max_queue: usize,
    pub delay: Duration,
}

// Represents a page in the crawl queue
#[derive(Debug, Clone)]
struct CrawlItem {
    url: Url,
    depth: usize, // How many link hops from the seed
}

// Everything one crawl owns. Nothing here is shared with other sites.
struct CrawlState {
    frontier: VecDeque<CrawlItem>,
    visited: HashSet<String>,
    raw_emails: BTreeSet<String>,
    stats: ExtractionStats,
    pages_crawled: usize,
    pages_failed: usize,
    seed_error: Option<String>,
    interrupted: bool,
}

impl CrawlState {
    fn new(start: &Url) -> Self {
        let mut visited = HashSet::new();
        visited.insert(start.to_string());
        let mut frontier = VecDeque::new();
        frontier.push_back(CrawlItem {
            url: start.clone(),
            depth: 0,
        });

        Self {
            frontier,
            visited,
            raw_emails: BTreeSet::new(),
            stats: ExtractionStats::default(),
            pages_crawled: 0,
            pages_failed: 0,
            seed_error: None,
            interrupted: false,
        }
    }

    fn pages_processed(&self) -> usize {
        self.pages_crawled + self.pages_failed
    }

    // Queues a link unless it was seen before or the queue is full
    fn enqueue(&mut self, url: Url, depth: usize, max_queue: usize) {
        if self.visited.contains(url.as_str()) {
            return;
        }
        if self.frontier.len() >= max_queue {
            tracing::debug!(target: "crawl_task", "Queue full, dropping {}", url);
            return;
        }
        self.visited.insert(url.to_string());
        self.frontier.push_back(CrawlItem { url, depth });
    }
}

/// Crawls one site starting at `start` and collects the emails it finds
///
/// `seed` is only used for reporting; `start` is the URL after redirect
/// resolution and its host bounds the crawl.
pub async fn crawl_site(
    fetcher: &dyn PageFetcher,
    seed: &str,
    start: &Url,
    limits: &CrawlLimits,
    rules: &FilterRules,
    cancel: &CancellationToken,
    progress: &Progress,
) -> SiteResult {
    let Some(base_host) = start.host_str().map(str::to_string) else {
        return SiteResult::error(seed, start.as_str(), "URL has no host");
    };

    let mut state = CrawlState::new(start);

    while state.pages_processed() < limits.max_pages {
        if cancel.is_cancelled() {
            state.interrupted = true;
            break;
        }
        let Some(item) = state.frontier.pop_front() else {
            break;
        };

        tracing::debug!(target: "crawl_task", "Crawling [depth {}]: {}", item.depth, item.url);

        match fetcher.fetch(&item.url).await {
            // A same-site link that redirected to another host is not ours to read
            Ok(page) if item.depth > 0 && !is_same_host(&page.final_url, &base_host) => {
                state.pages_crawled += 1;
                tracing::debug!(
                    target: "crawl_task",
                    "{} left the site for {}, skipping it",
                    item.url,
                    page.final_url
                );
            }
            Ok(page) => {
                if page.is_success() {
                    state.pages_crawled += 1;
                } else {
                    // Error pages still carry footers and contact boxes
                    state.pages_failed += 1;
                    let status = HarvestError::HttpStatus {
                        url: item.url.to_string(),
                        status: page.status,
                    };
                    tracing::debug!(target: "crawl_task", "{}, scanning the body anyway", status);
                }

                let (emails, stats) = extract_with_stats(&page.body);
                state.raw_emails.extend(emails);
                state.stats.merge(&stats);

                // If we haven't reached max depth, queue this page's links
                if item.depth < limits.depth {
                    for link in extract_same_domain_links(&page.body, &page.final_url, &base_host) {
                        state.enqueue(link, item.depth + 1, limits.max_queue);
                    }
                }
            }
            Err(error) => record_failure(&mut state, &item, error),
        }

        progress.emit(ProgressEvent::PageCrawled {
            seed: seed.to_string(),
            url: item.url.to_string(),
            depth: item.depth,
            emails_found: state.raw_emails.len(),
            queue_len: state.frontier.len(),
        });

        let more_to_do =
            !state.frontier.is_empty() && state.pages_processed() < limits.max_pages;
        if more_to_do && !limits.delay.is_zero() {
            // Polite crawling, but wake up at once if the run is cancelled
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(limits.delay) => {}
            }
        }
    }

    finish(seed, start, state, rules)
}

fn record_failure(state: &mut CrawlState, item: &CrawlItem, error: HarvestError) {
    state.pages_failed += 1;
    if item.depth == 0 && state.pages_processed() == 1 {
        tracing::warn!(target: "crawl_task", "Seed page failed: {}", error);
        state.seed_error = Some(error.to_string());
    } else {
        tracing::debug!(target: "crawl_task", "Failed to fetch {}: {}", item.url, error);
    }
}

fn finish(seed: &str, start: &Url, state: CrawlState, rules: &FilterRules) -> SiteResult {
    let clean_emails = rules.clean(&state.raw_emails);

    let status = if state.seed_error.is_some() {
        SiteStatus::Error
    } else if clean_emails.is_empty() {
        SiteStatus::NoEmails
    } else {
        SiteStatus::Success
    };

    SiteResult {
        seed_url: seed.to_string(),
        resolved_url: start.to_string(),
        raw_emails: state.raw_emails,
        clean_emails,
        pages_crawled: state.pages_crawled,
        pages_failed: state.pages_failed,
        status,
        error: state.seed_error,
        interrupted: state.interrupted,
        extraction: state.stats,
    }
}

// Extracts links from HTML that stay on the crawl's host
//
// Parameters:
//   html: The HTML content to parse
//   page_url: The URL of the current page (for resolving relative links)
//   base_host: The host we're restricting crawling to
//
// Returns: absolute http(s) URLs without fragments, in document order
fn extract_same_domain_links(html: &str, page_url: &Url, base_host: &str) -> Vec<Url> {
    let document = Html::parse_document(html);

    document
        .select(&LINK_SELECTOR)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(page_url, href))
        .filter(|url| is_same_host(url, base_host))
        .collect()
}

fn is_same_host(url: &Url, base_host: &str) -> bool {
    url.host_str()
        .map(|host| host.eq_ignore_ascii_case(base_host))
        .unwrap_or(false)
}

// Resolves a link (possibly relative) to an absolute crawlable URL
fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();

    // Skip anchors and special protocols
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("javascript:")
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    // /contact and /contact#team are the same page
    url.set_fragment(None);
    Some(url)
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why mark URLs visited when queueing instead of when fetching?
//    - A page linked from ten other pages would otherwise sit in the queue
//      ten times
//    - Marking early keeps the queue small and the visit count exact
//
// 2. What is tokio::select!?
//    - Waits on several futures and runs the branch of whichever finishes first
//    - Here: the politeness sleep vs. the cancellation signal
//    - The loser is dropped, so a cancelled run doesn't wait out the delay
//
// 3. Why is CrawlState a struct instead of a few local variables?
//    - Each spawned site task owns one, so there is no shared mutable state
//      between sites and no locks are needed
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::fake::StaticFetcher;
    use pretty_assertions::assert_eq;

    fn limits(depth: usize, max_pages: usize) -> CrawlLimits {
        CrawlLimits {
            depth,
            max_pages,
            max_queue: 500,
            delay: Duration::ZERO,
        }
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    async fn crawl(fetcher: &StaticFetcher, start: &str, limits: CrawlLimits) -> SiteResult {
        crawl_site(
            fetcher,
            start,
            &url(start),
            &limits,
            &FilterRules::default(),
            &CancellationToken::new(),
            &Progress::disabled(),
        )
        .await
    }

    #[test]
    fn test_resolve_absolute_link() {
        let base = url("https://example.com/page");
        assert_eq!(
            resolve_link(&base, "https://other.com"),
            Some(url("https://other.com/"))
        );
    }

    #[test]
    fn test_resolve_relative_link() {
        let base = url("https://example.com/page");
        assert_eq!(
            resolve_link(&base, "/docs#intro"),
            Some(url("https://example.com/docs"))
        );
    }

    #[test]
    fn test_skip_anchor_and_special_schemes() {
        let base = url("https://example.com/page");
        assert_eq!(resolve_link(&base, "#section"), None);
        assert_eq!(resolve_link(&base, "mailto:test@example.com"), None);
        assert_eq!(resolve_link(&base, "MAILTO:test@example.com"), None);
        assert_eq!(resolve_link(&base, "tel:+123"), None);
        assert_eq!(resolve_link(&base, "javascript:void(0)"), None);
        assert_eq!(resolve_link(&base, "ftp://example.com/file"), None);
    }

    #[test]
    fn test_same_domain_links_only() {
        let html = r#"
            <a href="/about">About</a>
            <a href="https://EXAMPLE.com/team">Team</a>
            <a href="https://other.com/">Elsewhere</a>
            <a href="https://sub.example.com/">Subdomain</a>
        "#;
        let links = extract_same_domain_links(html, &url("https://example.com/"), "example.com");
        assert_eq!(
            links,
            vec![url("https://example.com/about"), url("https://example.com/team")]
        );
    }

    #[tokio::test]
    async fn test_crawl_collects_and_cleans() {
        let fetcher = StaticFetcher::default()
            .page(
                "https://acme.com/",
                r#"<a href="/contact">Contact</a><p>info: noreply@acme.com</p>"#,
            )
            .page(
                "https://acme.com/contact",
                r#"<a href="mailto:jane@acme.com">Jane</a>"#,
            );

        let result = crawl(&fetcher, "https://acme.com/", limits(1, 30)).await;
        assert_eq!(result.status, SiteStatus::Success);
        assert_eq!(result.pages_crawled, 2);
        assert!(result.raw_emails.contains("noreply@acme.com"));
        assert_eq!(
            result.clean_emails.into_iter().collect::<Vec<_>>(),
            vec!["jane@acme.com".to_string()]
        );
    }

    #[tokio::test]
    async fn test_depth_zero_fetches_seed_only() {
        let fetcher = StaticFetcher::default()
            .page("https://acme.com/", r#"<a href="/contact">Contact</a>"#)
            .page("https://acme.com/contact", "jane@acme.com");

        let result = crawl(&fetcher, "https://acme.com/", limits(0, 30)).await;
        assert_eq!(fetcher.fetched(), vec!["https://acme.com/".to_string()]);
        assert_eq!(result.status, SiteStatus::NoEmails);
    }

    #[tokio::test]
    async fn test_cycle_terminates_within_budget() {
        // every page links to every other page, forever
        let page = r#"<a href="/a">a</a><a href="/b">b</a><a href="/c">c</a><a href="/">home</a>"#;
        let fetcher = StaticFetcher::default()
            .page("https://loop.io/", page)
            .page("https://loop.io/a", page)
            .page("https://loop.io/b", page)
            .page("https://loop.io/c", page);

        let result = crawl(&fetcher, "https://loop.io/", limits(50, 3)).await;
        assert_eq!(fetcher.fetched().len(), 3);
        assert_eq!(result.pages_processed(), 3);

        // with a big budget each page is still fetched exactly once
        let fetcher = StaticFetcher::default()
            .page("https://loop.io/", page)
            .page("https://loop.io/a", page)
            .page("https://loop.io/b", page)
            .page("https://loop.io/c", page);
        crawl(&fetcher, "https://loop.io/", limits(50, 100)).await;
        assert_eq!(
            fetcher.fetched(),
            vec![
                "https://loop.io/".to_string(),
                "https://loop.io/a".to_string(),
                "https://loop.io/b".to_string(),
                "https://loop.io/c".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_never_leaves_the_host() {
        let fetcher = StaticFetcher::default()
            .page(
                "https://acme.com/",
                r#"<a href="https://evil.com/">x</a><a href="/ok">ok</a>"#,
            )
            .page("https://acme.com/ok", "")
            .page("https://evil.com/", "boss@evil.com");

        let result = crawl(&fetcher, "https://acme.com/", limits(3, 30)).await;
        assert!(fetcher
            .fetched()
            .iter()
            .all(|u| url(u).host_str() == Some("acme.com")));
        assert!(result.raw_emails.is_empty());
    }

    #[tokio::test]
    async fn test_queue_cap() {
        let links: String = (0..20)
            .map(|i| format!(r#"<a href="/p{}">p</a>"#, i))
            .collect();
        let fetcher = StaticFetcher::default().page("https://acme.com/", &links);
        let limits = CrawlLimits {
            max_queue: 5,
            ..limits(1, 100)
        };

        let result = crawl(&fetcher, "https://acme.com/", limits).await;
        // seed + 5 queued pages, the other 15 links were dropped
        assert_eq!(fetcher.fetched().len(), 6);
        // the queued pages are unknown to the fake and come back 404
        assert_eq!(result.pages_failed, 5);
    }

    #[tokio::test]
    async fn test_seed_failure_is_site_error() {
        let fetcher = StaticFetcher::default().unreachable("down.io");
        let result = crawl(&fetcher, "https://down.io/", limits(1, 30)).await;
        assert_eq!(result.status, SiteStatus::Error);
        assert!(result.error.unwrap().contains("timed out"));
        assert_eq!(result.pages_failed, 1);

        // reachable but answering 404 is not a site error
        let fetcher = StaticFetcher::default().page_with_status("https://gone.io/", 404, "");
        let result = crawl(&fetcher, "https://gone.io/", limits(1, 30)).await;
        assert_eq!(result.status, SiteStatus::NoEmails);
        assert!(result.error.is_none());
        assert_eq!(result.pages_failed, 1);
    }

    #[tokio::test]
    async fn test_error_page_body_is_scanned() {
        let fetcher = StaticFetcher::default()
            .page_with_status(
                "https://walled.io/",
                403,
                r#"Access denied. Write to jane@walled.io <a href="/contact">contact</a>"#,
            )
            .page("https://walled.io/contact", "joe@walled.io");

        let result = crawl(&fetcher, "https://walled.io/", limits(1, 30)).await;
        assert_eq!(result.status, SiteStatus::Success);
        assert!(result.error.is_none());
        assert_eq!(result.pages_failed, 1);
        assert_eq!(result.pages_crawled, 1);
        assert_eq!(
            result.clean_emails.into_iter().collect::<Vec<_>>(),
            vec!["jane@walled.io".to_string(), "joe@walled.io".to_string()]
        );
    }

    #[tokio::test]
    async fn test_redirect_off_site_is_not_scanned() {
        let fetcher = StaticFetcher::default()
            .page(
                "https://acme.com/",
                r#"<a href="/partners">Partners</a> jane@acme.com"#,
            )
            .moved("https://acme.com/partners", "https://other.com/")
            .page(
                "https://other.com/",
                r#"boss@other.com <a href="https://acme.com/secret">x</a>"#,
            );

        let result = crawl(&fetcher, "https://acme.com/", limits(2, 30)).await;
        assert_eq!(
            fetcher.fetched(),
            vec![
                "https://acme.com/".to_string(),
                "https://acme.com/partners".to_string()
            ]
        );
        assert!(!result.raw_emails.contains("boss@other.com"));
        assert_eq!(
            result.clean_emails.into_iter().collect::<Vec<_>>(),
            vec!["jane@acme.com".to_string()]
        );
        assert_eq!(result.pages_crawled, 2);
    }

    #[tokio::test]
    async fn test_failed_inner_page_is_not_fatal() {
        let fetcher = StaticFetcher::default().page(
            "https://acme.com/",
            r#"<a href="/missing">x</a> jane@acme.com"#,
        );
        let result = crawl(&fetcher, "https://acme.com/", limits(1, 30)).await;
        assert_eq!(result.status, SiteStatus::Success);
        assert_eq!(result.pages_crawled, 1);
        assert_eq!(result.pages_failed, 1);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_cancel_mid_crawl_keeps_processed_pages() {
        let cancel = CancellationToken::new();
        let page = r#"<a href="/a">a</a><a href="/b">b</a> jane@acme.com"#;
        let fetcher = StaticFetcher::default()
            .page("https://acme.com/", page)
            .page("https://acme.com/a", "joe@acme.com")
            .page("https://acme.com/b", "sue@acme.com")
            .cancel_on("https://acme.com/a", cancel.clone());

        let result = crawl_site(
            &fetcher,
            "https://acme.com/",
            &url("https://acme.com/"),
            &limits(1, 30),
            &FilterRules::default(),
            &cancel,
            &Progress::disabled(),
        )
        .await;

        assert!(result.interrupted);
        assert_eq!(result.pages_crawled, 2);
        assert_eq!(fetcher.fetched().len(), 2);
        assert!(result.clean_emails.contains("joe@acme.com"));
        assert!(!result.clean_emails.contains("sue@acme.com"));
    }

    #[tokio::test]
    async fn test_page_events() {
        let fetcher = StaticFetcher::default().page("https://acme.com/", "jane@acme.com");
        let (progress, mut receiver) = Progress::channel();
        crawl_site(
            &fetcher,
            "acme.com",
            &url("https://acme.com/"),
            &limits(1, 30),
            &FilterRules::default(),
            &CancellationToken::new(),
            &progress,
        )
        .await;

        assert_eq!(
            receiver.recv().await,
            Some(ProgressEvent::PageCrawled {
                seed: "acme.com".to_string(),
                url: "https://acme.com/".to_string(),
                depth: 0,
                emails_found: 1,
                queue_len: 0,
            })
        );
    }
}
