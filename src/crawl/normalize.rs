// src/crawl/normalize.rs
// =============================================================================
// Turning user input into a crawlable URL.
//
// Users type "acme.com", " https://acme.com/ ", "HTTP://acme.com"... The
// normalizer only trims and adds a scheme; it never fails. Garbage input is
// caught later when the URL is parsed.
//
// The resolver then follows redirects once (acme.com -> www.acme.com) so the
// crawl's same-domain filter compares against the host that actually serves
// the site.
// =============================================================================

use url::Url;

use super::fetch::PageFetcher;
use crate::error::{HarvestError, Result};

/// Trims the input and makes sure it has an http(s) scheme
///
/// Returns None for empty input.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(trimmed.to_string())
    } else {
        Some(format!("https://{}", trimmed))
    }
}

/// Parses a normalized seed, rejecting URLs that can't be crawled
pub fn parse_seed(seed: &str) -> Result<Url> {
    let invalid = |reason: String| HarvestError::InvalidUrl {
        url: seed.to_string(),
        reason,
    };

    let url = Url::parse(seed).map_err(|e| invalid(e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(invalid("URL has no host".to_string())),
    }
}

/// Follows redirects to the final URL, or returns the input on any failure
pub async fn resolve(fetcher: &dyn PageFetcher, url: &Url) -> Url {
    match fetcher.final_url(url).await {
        Ok(resolved) => {
            if resolved != *url {
                tracing::debug!(target: "crawl_task", "{} resolved to {}", url, resolved);
            }
            resolved
        }
        Err(e) => {
            tracing::debug!(target: "crawl_task", "Could not resolve {}: {}", url, e);
            url.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::fake::StaticFetcher;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("acme.com"), Some("https://acme.com".to_string()));
        assert_eq!(
            normalize("  http://acme.com/about  "),
            Some("http://acme.com/about".to_string())
        );
        assert_eq!(
            normalize("HTTPS://Acme.com"),
            Some("HTTPS://Acme.com".to_string())
        );
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn test_normalize_never_fails_on_junk() {
        assert_eq!(normalize("not a url"), Some("https://not a url".to_string()));
        assert!(parse_seed("https://not a url").is_err());
    }

    #[test]
    fn test_parse_seed() {
        assert!(parse_seed("https://acme.com").is_ok());
        assert!(matches!(
            parse_seed("ftp://acme.com"),
            Err(HarvestError::InvalidUrl { .. })
        ));
        assert!(parse_seed("https://").is_err());
    }

    #[tokio::test]
    async fn test_resolve_follows_redirect() {
        let fetcher = StaticFetcher::default()
            .redirect("https://acme.com/", "https://www.acme.com/");
        let url = Url::parse("https://acme.com").unwrap();
        assert_eq!(
            resolve(&fetcher, &url).await.as_str(),
            "https://www.acme.com/"
        );
    }

    #[tokio::test]
    async fn test_resolve_falls_back_to_input() {
        let fetcher = StaticFetcher::default().unreachable("acme.com");
        let url = Url::parse("https://acme.com/contact").unwrap();
        assert_eq!(resolve(&fetcher, &url).await, url);
    }
}
