// src/extract/filter.rs
// =============================================================================
// The garbage classifier.
//
// The raw regex scan finds plenty of strings that are shaped like an email
// address but are useless to anyone building a contact list:
// - image file names with a density suffix:  logo@2x.png
// - error-tracker event IDs:                 3f9a0c7e1b2d4a5f@o12345.ingest.sentry.io
// - role accounts nobody reads:              noreply@acme.com
// - template placeholders:                   you@yourdomain.com
//
// The rules are plain data (FilterRules) so they can be tuned from the
// [filter] section of the config file. All checks are independent; the
// order below only decides which reason gets reported first.
// =============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::patterns::is_structurally_valid;

/// Why a candidate was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GarbageReason {
    /// Whitespace or not local@domain.tld
    Malformed,
    /// Not exactly one '@'
    BadSplit,
    /// Domain ends like a file name (.png, .pdf, ...)
    FileSuffix(String),
    /// Local part is one long hex string (machine-generated ID)
    HexIdentifier,
    /// Domain contains a known noisy fragment
    NoiseDomain(String),
    /// Address contains an excluded keyword (role accounts)
    ExcludedKeyword(String),
}

/// Configurable rule set for the classifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    pub excluded_keyword_fragments: BTreeSet<String>,
    pub excluded_domain_fragments: BTreeSet<String>,
    pub skip_domain_suffixes: BTreeSet<String>,
    pub hex_garbage_min_length: usize,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            excluded_keyword_fragments: to_set(&[
                "support@",
                "press@",
                "privacy@",
                "no-reply@",
                "noreply@",
                "unsubscribe@",
            ]),
            excluded_domain_fragments: to_set(&[
                "sentry",
                "wixpress",
                "sentry-next",
                "amazonaws",
                "localhost",
                "invalid",
                "example",
                "2x.png",
                "yourdomain",
            ]),
            skip_domain_suffixes: to_set(&[
                ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".bmp", ".pdf",
            ]),
            hex_garbage_min_length: 16,
        }
    }
}

fn to_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl FilterRules {
    /// Returns true if the address is noise and should be dropped
    pub fn is_garbage(&self, email: &str) -> bool {
        self.classify(email).is_some()
    }

    /// Returns the first reason the address is rejected, or None if it's kept
    pub fn classify(&self, email: &str) -> Option<GarbageReason> {
        if email.is_empty() || email.chars().any(char::is_whitespace) {
            return Some(GarbageReason::Malformed);
        }
        let email = email.to_lowercase();

        if !is_structurally_valid(&email) {
            return Some(GarbageReason::Malformed);
        }

        let (local, domain) = match email.split_once('@') {
            Some((local, domain)) if !domain.contains('@') => (local, domain),
            _ => return Some(GarbageReason::BadSplit),
        };

        if let Some(suffix) = self
            .skip_domain_suffixes
            .iter()
            .find(|suffix| domain.ends_with(suffix.to_lowercase().as_str()))
        {
            return Some(GarbageReason::FileSuffix(suffix.clone()));
        }

        if is_hex_identifier(local, self.hex_garbage_min_length) {
            return Some(GarbageReason::HexIdentifier);
        }

        if let Some(fragment) = self
            .excluded_domain_fragments
            .iter()
            .find(|fragment| domain.contains(fragment.to_lowercase().as_str()))
        {
            return Some(GarbageReason::NoiseDomain(fragment.clone()));
        }

        if let Some(keyword) = self
            .excluded_keyword_fragments
            .iter()
            .find(|keyword| email.contains(keyword.to_lowercase().as_str()))
        {
            return Some(GarbageReason::ExcludedKeyword(keyword.clone()));
        }

        None
    }

    /// Keeps only the addresses that are not garbage
    pub fn clean<'a, I>(&self, emails: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        emails
            .into_iter()
            .filter(|email| !self.is_garbage(email))
            .cloned()
            .collect()
    }
}

// The whole local part must be hex; a long digit run inside a real name
// ("jane.1234567890123456") doesn't count
fn is_hex_identifier(local: &str, min_length: usize) -> bool {
    local.len() >= min_length && local.chars().all(|c| c.is_ascii_hexdigit())
}
