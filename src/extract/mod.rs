// src/extract/mod.rs
// =============================================================================
// This module turns page HTML into email addresses.
//
// Submodules:
// - patterns: the email regexes shared by extraction and filtering
// - html: pulls candidate addresses out of an HTML document (7 methods)
// - filter: decides which candidates are noise (tracking IDs, role
//   accounts, image file names that happen to contain an '@')
// =============================================================================

mod filter;
mod html;
mod patterns;

pub use filter::{FilterRules, GarbageReason};
pub use html::{extract_emails, extract_with_stats, ExtractionMethod, ExtractionStats};
pub use patterns::is_structurally_valid;
