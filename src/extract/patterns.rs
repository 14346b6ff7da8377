// src/extract/patterns.rs
// =============================================================================
// Email regexes.
//
// SCAN_PATTERN is unanchored and is run over arbitrary text to find
// candidates. It happily matches fragments (an address glued to the end of a
// URL, "logo@2x.png"), which is fine: the filter throws those away later.
//
// STRICT_PATTERN is anchored and is used to decide whether a whole string is
// shaped like an address. TLD must be letters only, at least 2 of them.
// =============================================================================

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

pub(crate) static SCAN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").expect("valid email scan regex")
});

static STRICT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("valid strict email regex")
});

/// Returns true if the whole string has the local@domain.tld shape
pub fn is_structurally_valid(email: &str) -> bool {
    STRICT_PATTERN.is_match(email)
}

/// Runs the scan regex over `text` and adds every match, lowercased
pub(crate) fn scan_into(text: &str, found: &mut BTreeSet<String>) {
    for m in SCAN_PATTERN.find_iter(text) {
        found.insert(m.as_str().to_lowercase());
    }
}
