// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Two subcommands:
//   scan    crawl websites and collect (optionally verify) email addresses
//   verify  run the verification engine on addresses you already have
//
// Every scan flag is optional: unset flags fall back to the --config file,
// and from there to the built-in defaults. Most flags can also come from
// EMAIL_HARVESTER_* environment variables.
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use email_harvester::VerificationMode;

#[derive(Parser, Debug)]
#[command(
    name = "email-harvester",
    version,
    about = "Crawl websites for contact emails and verify them",
    long_about = "email-harvester crawls each website you give it (staying on the same domain), \
                  extracts email addresses from the pages, filters out obvious junk, and can \
                  check the results against DNS (MX) or the mail servers themselves (SMTP)."
)]
pub struct Cli {
    /// Show debug logs on stderr (RUST_LOG overrides this)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl websites and collect email addresses
    ///
    /// Example: email-harvester scan acme.com beta.io --depth 2 --verify mx
    Scan(ScanArgs),

    /// Verify email addresses without crawling
    ///
    /// Example: email-harvester verify jane@acme.com --mode smtp
    Verify(VerifyArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Website URLs or bare domains (https:// is added when missing)
    #[arg(required_unless_present = "input")]
    pub urls: Vec<String>,

    /// Read additional URLs from a file, one per line
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// Link hops to follow from each seed (0 = seed page only)
    #[arg(long, env = "EMAIL_HARVESTER_DEPTH")]
    pub depth: Option<usize>,

    /// Maximum pages fetched per site
    #[arg(long, env = "EMAIL_HARVESTER_MAX_PAGES")]
    pub max_pages: Option<usize>,

    /// Delay between two page fetches on the same site, in milliseconds
    #[arg(long, env = "EMAIL_HARVESTER_DELAY_MS")]
    pub delay_ms: Option<u64>,

    /// Verification mode for the collected emails
    #[arg(long, value_enum, env = "EMAIL_HARVESTER_VERIFY")]
    pub verify: Option<VerificationMode>,

    /// Number of sites crawled concurrently
    #[arg(long, env = "EMAIL_HARVESTER_CRAWL_WORKERS")]
    pub crawl_workers: Option<usize>,

    /// Number of emails verified concurrently
    #[arg(long, env = "EMAIL_HARVESTER_VERIFY_WORKERS")]
    pub verify_workers: Option<usize>,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "EMAIL_HARVESTER_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Output the full report as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Also write website,email,verified rows to this CSV file
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, env = "EMAIL_HARVESTER_CONFIG")]
    pub config: Option<String>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Email addresses to check
    #[arg(required = true)]
    pub emails: Vec<String>,

    /// How hard to check
    #[arg(long, value_enum, default_value_t = VerificationMode::Mx)]
    pub mode: VerificationMode,

    /// Output results in JSON format instead of a table
    #[arg(long)]
    pub json: bool,

    /// TOML configuration file
    #[arg(long, env = "EMAIL_HARVESTER_CONFIG")]
    pub config: Option<String>,
}
