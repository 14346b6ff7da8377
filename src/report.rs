// src/report.rs
// =============================================================================
// The results of a harvest run, and their CSV projection.
//
// Shape:
//   HarvestReport
//   ├── sites: one SiteResult per seed URL (input order)
//   ├── unique_emails: union of every site's clean emails
//   ├── verification: email -> status
//   └── summary: counts + elapsed time
//
// The CSV export is one row per (site, clean email) pair with the columns
// website,email,verified. Everything here derives Serialize so --json can
// dump the whole report as-is.
// =============================================================================

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io;

use crate::extract::ExtractionStats;
use crate::verify::{VerificationMode, VerificationStatus};

/// Outcome of crawling one site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    /// At least one clean email found
    Success,
    /// Crawl worked, nothing useful on the pages
    NoEmails,
    /// Seed malformed or unreachable, or the crawl task itself failed
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteResult {
    /// The URL as given (after scheme defaulting)
    pub seed_url: String,
    /// Where the seed ended up after redirects
    pub resolved_url: String,
    pub raw_emails: BTreeSet<String>,
    pub clean_emails: BTreeSet<String>,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub status: SiteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The crawl stopped early because the run was cancelled
    pub interrupted: bool,
    pub extraction: ExtractionStats,
}

impl SiteResult {
    /// A result for a site that could not be crawled at all
    pub fn error(seed_url: &str, resolved_url: &str, message: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.to_string(),
            resolved_url: resolved_url.to_string(),
            raw_emails: BTreeSet::new(),
            clean_emails: BTreeSet::new(),
            pages_crawled: 0,
            pages_failed: 0,
            status: SiteStatus::Error,
            error: Some(message.into()),
            interrupted: false,
            extraction: ExtractionStats::default(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == SiteStatus::Error
    }

    /// Pages fetched or attempted
    pub fn pages_processed(&self) -> usize {
        self.pages_crawled + self.pages_failed
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: VerificationMode,
    pub sites: usize,
    pub sites_with_emails: usize,
    pub sites_failed: usize,
    pub unique_emails: usize,
    pub valid_emails: usize,
    pub elapsed_ms: u64,
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarvestReport {
    pub sites: Vec<SiteResult>,
    pub unique_emails: BTreeSet<String>,
    pub verification: BTreeMap<String, VerificationStatus>,
    pub summary: RunSummary,
}

/// One line of the CSV export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub website: String,
    pub email: String,
    pub verified: VerificationStatus,
}

impl HarvestReport {
    /// Verification status for an email, Skipped if it was never verified
    pub fn status_of(&self, email: &str) -> VerificationStatus {
        self.verification
            .get(email)
            .copied()
            .unwrap_or(VerificationStatus::Skipped)
    }

    /// Flattens the report into (website, email, status) rows
    pub fn rows(&self) -> Vec<ReportRow> {
        self.sites
            .iter()
            .flat_map(|site| {
                site.clean_emails.iter().map(move |email| ReportRow {
                    website: site.resolved_url.clone(),
                    email: email.clone(),
                    verified: self.status_of(email),
                })
            })
            .collect()
    }

    /// Writes the CSV export (header + one row per site/email pair)
    pub fn write_csv<W: io::Write>(&self, writer: W) -> csv::Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let rows = self.rows();
        if rows.is_empty() {
            // serialize() only emits the header together with the first row
            csv_writer.write_record(["website", "email", "verified"])?;
        }
        for row in rows {
            csv_writer.serialize(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
