// src/config.rs
// =============================================================================
// Run settings: crawl limits, verification knobs and garbage-filter rules.
//
// Settings come from three layers, later ones winning:
// 1. Built-in defaults (Default impls below)
// 2. An optional TOML file passed with --config
// 3. Command-line flags (applied in main.rs)
//
// Example file:
//
//   [crawl]
//   depth = 1
//   max_pages = 30
//   delay_ms = 200
//
//   [verify]
//   mode = "mx"
//   smtp_sender = "probe@mydomain.com"
//
//   [filter]
//   excluded_keyword_fragments = ["support@", "sales@"]
//
// Every section and every key is optional.
// =============================================================================

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::crawl::CrawlLimits;
use crate::extract::FilterRules;
use crate::verify::VerificationMode;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// All settings for one harvest run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub crawl: CrawlSettings,
    pub verify: VerifySettings,
    pub filter: FilterRules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    /// How many link hops to follow from the seed (0 = seed page only)
    pub depth: usize,
    /// Upper bound on pages fetched per site
    pub max_pages: usize,
    /// Politeness delay between two fetches of the same site
    pub delay_ms: u64,
    /// Upper bound on queued-but-not-fetched URLs per site
    pub max_queue: usize,
    /// Number of sites crawled at the same time
    pub workers: usize,
    pub request_timeout_secs: u64,
    pub resolve_timeout_secs: u64,
    pub warm_up_timeout_secs: u64,
    pub max_redirects: usize,
    /// Issue a throwaway GET after redirect resolution
    pub warm_up: bool,
    pub user_agent: String,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            depth: 1,
            max_pages: 30,
            delay_ms: 200,
            max_queue: 500,
            workers: 12,
            request_timeout_secs: 10,
            resolve_timeout_secs: 8,
            warm_up_timeout_secs: 6,
            max_redirects: 5,
            warm_up: true,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

impl CrawlSettings {
    pub fn limits(&self) -> CrawlLimits {
        CrawlLimits {
            depth: self.depth,
            max_pages: self.max_pages,
            max_queue: self.max_queue,
            delay: Duration::from_millis(self.delay_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    pub fn warm_up_timeout(&self) -> Duration {
        Duration::from_secs(self.warm_up_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifySettings {
    pub mode: VerificationMode,
    /// Pool size for MX-only verification (cheap lookups)
    pub mx_workers: usize,
    /// Pool size for SMTP probing, kept low to avoid anti-abuse blocks
    pub smtp_workers: usize,
    pub dns_timeout_secs: u64,
    pub smtp_timeout_secs: u64,
    /// Envelope sender used in MAIL FROM
    pub smtp_sender: String,
    /// Name announced in EHLO
    pub helo_name: String,
    /// Entries kept per verification cache (domains and emails separately)
    pub cache_capacity: usize,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            mode: VerificationMode::None,
            mx_workers: 10,
            smtp_workers: 4,
            dns_timeout_secs: 5,
            smtp_timeout_secs: 6,
            smtp_sender: "verify@example.com".to_string(),
            helo_name: "localhost".to_string(),
            cache_capacity: 4096,
        }
    }
}

impl VerifySettings {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout_secs)
    }

    /// Worker count for the given mode
    pub fn workers_for(&self, mode: VerificationMode) -> usize {
        match mode {
            VerificationMode::Smtp => self.smtp_workers,
            _ => self.mx_workers,
        }
    }
}

impl Settings {
    /// Loads settings from an optional TOML file, falling back to defaults
    pub fn load(path: Option<&str>) -> Result<Self> {
        let settings = match path {
            Some(path) => Self::from_file(Path::new(path))?,
            None => Settings::default(),
        };
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        tracing::debug!("Reading config file: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse TOML configuration from {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        Ok(settings)
    }

    /// Rejects values that would make a run meaningless or hang
    pub fn validate(&self) -> Result<()> {
        if self.crawl.max_pages == 0 {
            bail!("crawl.max_pages must be at least 1");
        }
        if self.crawl.workers == 0 {
            bail!("crawl.workers must be at least 1");
        }
        if self.crawl.max_queue == 0 {
            bail!("crawl.max_queue must be at least 1");
        }
        if self.verify.mx_workers == 0 || self.verify.smtp_workers == 0 {
            bail!("verify worker counts must be at least 1");
        }
        if self.verify.cache_capacity == 0 {
            bail!("verify.cache_capacity must be at least 1");
        }
        if !self.verify.smtp_sender.contains('@') {
            bail!(
                "verify.smtp_sender '{}' is not an email address",
                self.verify.smtp_sender
            );
        }
        if self.filter.hex_garbage_min_length == 0 {
            bail!("filter.hex_garbage_min_length must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.crawl.depth, 1);
        assert_eq!(settings.crawl.max_pages, 30);
        assert_eq!(settings.verify.mode, VerificationMode::None);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = r#"
            [crawl]
            max_pages = 5

            [verify]
            mode = "smtp"
        "#;
        let settings = Settings::from_toml(toml).unwrap();
        assert_eq!(settings.crawl.max_pages, 5);
        assert_eq!(settings.crawl.depth, 1);
        assert_eq!(settings.verify.mode, VerificationMode::Smtp);
        assert_eq!(settings.verify.smtp_workers, 4);
        assert!(settings
            .filter
            .excluded_keyword_fragments
            .contains("noreply@"));
    }

    #[test]
    fn test_filter_rules_from_toml() {
        let toml = r#"
            [filter]
            excluded_keyword_fragments = ["sales@", "team@"]
            hex_garbage_min_length = 12
        "#;
        let settings = Settings::from_toml(toml).unwrap();
        assert!(settings.filter.excluded_keyword_fragments.contains("sales@"));
        assert!(!settings.filter.excluded_keyword_fragments.contains("noreply@"));
        assert_eq!(settings.filter.hex_garbage_min_length, 12);
        // untouched keys keep their defaults
        assert!(settings.filter.skip_domain_suffixes.contains(".png"));
    }

    #[test]
    fn test_validate_rejects_zero_pages() {
        let mut settings = Settings::default();
        settings.crawl.max_pages = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_sender() {
        let mut settings = Settings::default();
        settings.verify.smtp_sender = "nobody".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_workers_for_mode() {
        let settings = VerifySettings::default();
        assert_eq!(settings.workers_for(VerificationMode::Mx), 10);
        assert_eq!(settings.workers_for(VerificationMode::Smtp), 4);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let toml = r#"
            [verify]
            mode = "carrier-pigeon"
        "#;
        assert!(Settings::from_toml(toml).is_err());
    }
}
