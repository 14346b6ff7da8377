//! # email-harvester
//!
//! Crawls websites for contact email addresses, filters out the junk and
//! optionally verifies what's left against DNS (MX) or the mail servers
//! themselves (SMTP RCPT TO).
//!
//! The `email-harvester` binary is a thin CLI over [`Harvester`] and
//! [`Verifier`]; everything else lives here so it can be used and tested
//! on its own.

pub mod config;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod harvest;
pub mod progress;
pub mod report;
pub mod verify;

pub use crate::config::Settings;
pub use crate::error::{HarvestError, Result};
pub use crate::harvest::Harvester;
pub use crate::report::{HarvestReport, SiteResult, SiteStatus};
pub use crate::verify::{VerificationMode, VerificationStatus, Verifier};
