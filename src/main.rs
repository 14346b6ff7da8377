// src/main.rs
// =============================================================================
// This is the entry point of the email-harvester CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap and set up logging
// 2. Load settings (defaults <- --config file <- flags) and validate them
// 3. Dispatch to the subcommand handler (scan or verify)
// 4. Print results as a table or JSON, optionally write CSV
// 5. Exit with a proper code:
//      0 = emails found (scan) / every address valid (verify)
//      1 = nothing found (scan) / some address not valid (verify)
//      2 = error
//
// Logs go to stderr so stdout stays clean for --json output.
// Ctrl-C stops the run gracefully: in-flight pages and checks finish and the
// partial report is still printed.
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ScanArgs, VerifyArgs};
use email_harvester::crawl::HttpFetcher;
use email_harvester::progress::{Progress, ProgressEvent};
use email_harvester::{
    HarvestReport, Harvester, Settings, VerificationMode, VerificationStatus, Verifier,
};

// Our own log targets at debug, everyone else's (reqwest, hyper...) at info
const VERBOSE_FILTER: &str =
    "info,harvest=debug,crawl_task=debug,extract=debug,verify_task=debug,smtp_task=debug";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { VERBOSE_FILTER } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight work...");
            ctrl_c_token.cancel();
        }
    });

    match cli.command {
        Commands::Scan(args) => handle_scan(args, &cancel).await,
        Commands::Verify(args) => handle_verify(args, &cancel).await,
    }
}

// Handles the 'scan' subcommand
async fn handle_scan(args: ScanArgs, cancel: &CancellationToken) -> Result<i32> {
    let mut settings = Settings::load(args.config.as_deref())?;
    apply_scan_overrides(&mut settings, &args);
    settings.validate().context("Invalid settings")?;

    let mut inputs = args.urls.clone();
    if let Some(path) = &args.input {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read URL list: {}", path.display()))?;
        inputs.extend(content.lines().map(str::to_string));
    }

    let mode = settings.verify.mode;
    tracing::info!(
        "Scanning {} input(s), depth {}, max {} page(s) per site, verification: {}",
        inputs.len(),
        settings.crawl.depth,
        settings.crawl.max_pages,
        mode
    );

    let fetcher = HttpFetcher::new(&settings.crawl).context("Failed to create HTTP client")?;
    let verifier = Verifier::from_settings(&settings.verify);
    let harvester = Harvester::new(Arc::new(fetcher), Arc::new(verifier), Arc::new(settings));

    let (progress, logger) = spawn_progress_logger();
    let report = harvester.run(&inputs, mode, cancel, &progress).await;
    drop(progress);
    let _ = logger.await;

    print_results(&report, args.json)?;

    if let Some(path) = &args.csv {
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        report
            .write_csv(file)
            .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        tracing::info!("Wrote {} row(s) to {}", report.rows().len(), path.display());
    }

    if report.unique_emails.is_empty() {
        Ok(1) // Exit code 1 = nothing found
    } else {
        Ok(0)
    }
}

// Flags win over the config file; unset flags leave it alone
fn apply_scan_overrides(settings: &mut Settings, args: &ScanArgs) {
    if let Some(depth) = args.depth {
        settings.crawl.depth = depth;
    }
    if let Some(max_pages) = args.max_pages {
        settings.crawl.max_pages = max_pages;
    }
    if let Some(delay_ms) = args.delay_ms {
        settings.crawl.delay_ms = delay_ms;
    }
    if let Some(workers) = args.crawl_workers {
        settings.crawl.workers = workers;
    }
    if let Some(timeout) = args.timeout {
        settings.crawl.request_timeout_secs = timeout;
    }
    if let Some(mode) = args.verify {
        settings.verify.mode = mode;
    }
    if let Some(workers) = args.verify_workers {
        settings.verify.mx_workers = workers;
        settings.verify.smtp_workers = workers;
    }
}

// Handles the 'verify' subcommand
async fn handle_verify(args: VerifyArgs, cancel: &CancellationToken) -> Result<i32> {
    let settings = Settings::load(args.config.as_deref())?;
    settings.validate().context("Invalid settings")?;

    let emails: BTreeSet<String> = args
        .emails
        .iter()
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect();

    let verifier = Verifier::from_settings(&settings.verify);
    let results = verifier
        .verify_all(
            &emails,
            args.mode,
            settings.verify.workers_for(args.mode),
            cancel,
            &Progress::disabled(),
        )
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_verification_table(&results);
    }

    let all_valid = results
        .values()
        .all(|status| *status == VerificationStatus::Valid);
    if all_valid {
        Ok(0)
    } else {
        Ok(1) // Exit code 1 = some address is not valid
    }
}

// Turns progress events into log lines on a background task
fn spawn_progress_logger() -> (Progress, tokio::task::JoinHandle<()>) {
    let (progress, mut events) = Progress::channel();
    let logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });
    (progress, logger)
}

fn log_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::SiteStarted { seed } => {
            tracing::info!(target: "harvest", "Scanning website: {}", seed);
        }
        ProgressEvent::PageCrawled {
            url,
            depth,
            emails_found,
            queue_len,
            ..
        } => {
            tracing::debug!(
                target: "harvest",
                "[depth {}] {} ({} email(s) so far, {} queued)",
                depth,
                url,
                emails_found,
                queue_len
            );
        }
        ProgressEvent::SiteFinished {
            seed,
            status,
            clean_emails,
            pages_crawled,
        } => {
            tracing::info!(
                target: "harvest",
                "Finished {}: {:?}, {} email(s) from {} page(s)",
                seed,
                status,
                clean_emails,
                pages_crawled
            );
        }
        ProgressEvent::VerificationStarted { total } => {
            tracing::info!(target: "harvest", "Verifying {} unique email(s)...", total);
        }
        ProgressEvent::EmailVerified { email, status } => {
            tracing::debug!(target: "harvest", "{}: {}", email, status);
        }
        ProgressEvent::Finished {
            unique_emails,
            valid_emails,
        } => {
            tracing::info!(
                target: "harvest",
                "Done: {} unique email(s), {} valid",
                unique_emails,
                valid_emails
            );
        }
    }
}

// Prints the report either as a table or JSON
fn print_results(report: &HarvestReport, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(report)?;
        println!("{}", json_output);
    } else {
        print_table(report);
    }
    Ok(())
}

// Prints the report as a human-readable table, one block per site
fn print_table(report: &HarvestReport) {
    for site in &report.sites {
        println!();
        println!("🌐 {}", site.resolved_url);
        if let Some(error) = &site.error {
            println!("   ❌ {}", error);
            continue;
        }
        if site.clean_emails.is_empty() {
            println!("   (no emails found in {} page(s))", site.pages_crawled);
            continue;
        }

        println!("   {:<50} {:<15}", "EMAIL", "VERIFIED");
        println!("   {}", "=".repeat(65));
        for email in &site.clean_emails {
            println!("   {:<50} {:<15}", truncate(email, 50), report.status_of(email));
        }
    }

    println!();

    let summary = &report.summary;
    println!("📊 Summary:");
    println!("   🌐 Sites: {}", summary.sites);
    println!("   ✅ With emails: {}", summary.sites_with_emails);
    println!("   ❌ Failed: {}", summary.sites_failed);
    println!("   📧 Unique emails: {}", summary.unique_emails);
    if summary.mode != VerificationMode::None {
        println!("   ✔️  Valid ({}): {}", summary.mode, summary.valid_emails);
    }
    println!("   ⏱️  Elapsed: {:.1}s", summary.elapsed_ms as f64 / 1000.0);
    if summary.cancelled {
        println!("   ⚠️  Interrupted, results are partial");
    }
}

fn print_verification_table(results: &BTreeMap<String, VerificationStatus>) {
    println!("{:<50} {:<15}", "EMAIL", "STATUS");
    println!("{}", "=".repeat(65));
    for (email, status) in results {
        println!("{:<50} {:<15}", truncate(email, 50), status);
    }
}

// Shortens long values so table columns stay aligned
fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let kept: String = value.chars().take(width - 3).collect();
        format!("{}...", kept)
    } else {
        value.to_string()
    }
}
