// src/harvest.rs
// =============================================================================
// The orchestrator: seeds in, HarvestReport out.
//
// Phases:
// 1. Crawl. Each seed gets its own spawned task (normalize -> resolve ->
//    crawl). At most `crawl.workers` tasks run at once. A task that panics
//    becomes an Error result for its site; the other sites keep going.
// 2. Merge. Results are collected on this task only, put back in input
//    order and their clean emails unioned.
// 3. Verify. The union goes through the verification engine on its own
//    bounded pool.
//
// Cancellation: no new site starts and no new email is verified once the
// token fires. Work already in flight finishes and is kept in the report.
// =============================================================================

use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::crawl::{crawl_site, normalize, parse_seed, resolve, PageFetcher};
use crate::error::HarvestError;
use crate::progress::{Progress, ProgressEvent};
use crate::report::{HarvestReport, RunSummary, SiteResult};
use crate::verify::{VerificationMode, VerificationStatus, Verifier};

pub struct Harvester {
    fetcher: Arc<dyn PageFetcher>,
    verifier: Arc<Verifier>,
    settings: Arc<Settings>,
}

impl Harvester {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        verifier: Arc<Verifier>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            fetcher,
            verifier,
            settings,
        }
    }

    /// Crawls every input, verifies what was found and builds the report
    pub async fn run(
        &self,
        inputs: &[String],
        mode: VerificationMode,
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> HarvestReport {
        let started = Instant::now();

        let seeds: Vec<String> = inputs.iter().filter_map(|raw| normalize(raw)).collect();
        tracing::info!(target: "harvest", "Harvesting {} site(s)", seeds.len());

        let sites = self.crawl_all(seeds, cancel, progress).await;

        let unique_emails: BTreeSet<String> = sites
            .iter()
            .flat_map(|site| site.clean_emails.iter().cloned())
            .collect();
        tracing::info!(
            target: "harvest",
            "Crawl finished: {} site(s), {} unique email(s)",
            sites.len(),
            unique_emails.len()
        );

        let verification = self
            .verifier
            .verify_all(
                &unique_emails,
                mode,
                self.settings.verify.workers_for(mode),
                cancel,
                progress,
            )
            .await;

        let valid_emails = verification
            .values()
            .filter(|status| **status == VerificationStatus::Valid)
            .count();
        progress.emit(ProgressEvent::Finished {
            unique_emails: unique_emails.len(),
            valid_emails,
        });

        let summary = RunSummary {
            mode,
            sites: sites.len(),
            sites_with_emails: sites.iter().filter(|s| !s.clean_emails.is_empty()).count(),
            sites_failed: sites.iter().filter(|s| s.is_error()).count(),
            unique_emails: unique_emails.len(),
            valid_emails,
            elapsed_ms: started.elapsed().as_millis() as u64,
            cancelled: cancel.is_cancelled(),
        };

        HarvestReport {
            sites,
            unique_emails,
            verification,
            summary,
        }
    }

    async fn crawl_all(
        &self,
        seeds: Vec<String>,
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> Vec<SiteResult> {
        let workers = self.settings.crawl.workers.max(1);
        let mut tasks = FuturesUnordered::new();
        let mut results: Vec<(usize, SiteResult)> = Vec::with_capacity(seeds.len());

        for (index, seed) in seeds.into_iter().enumerate() {
            while tasks.len() >= workers {
                if let Some(finished) = tasks.next().await {
                    results.push(finished);
                }
            }
            if cancel.is_cancelled() {
                tracing::info!(target: "harvest", "Cancelled, not starting {}", seed);
                break;
            }

            let fetcher = Arc::clone(&self.fetcher);
            let settings = Arc::clone(&self.settings);
            let cancel = cancel.clone();
            let task_progress = progress.clone();
            let task_seed = seed.clone();
            let handle = tokio::spawn(async move {
                harvest_site(fetcher.as_ref(), &settings, &task_seed, &cancel, &task_progress).await
            });

            let progress = progress.clone();
            tasks.push(async move {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(target: "harvest", "Crawl task for {} failed: {}", seed, e);
                        let error = HarvestError::TaskFailed(e.to_string());
                        SiteResult::error(&seed, &seed, error.to_string())
                    }
                };
                if !is_empty_interruption(&result) {
                    progress.emit(ProgressEvent::SiteFinished {
                        seed: result.seed_url.clone(),
                        status: result.status,
                        clean_emails: result.clean_emails.len(),
                        pages_crawled: result.pages_crawled,
                    });
                }
                (index, result)
            });
        }

        while let Some(finished) = tasks.next().await {
            results.push(finished);
        }

        results.sort_by_key(|(index, _)| *index);
        results
            .into_iter()
            .map(|(_, site)| site)
            .filter(|site| !is_empty_interruption(site))
            .collect()
    }
}

// A site cancelled before its first page has nothing to report
fn is_empty_interruption(site: &SiteResult) -> bool {
    site.interrupted && site.pages_processed() == 0
}

// One site, start to finish. Runs inside its own spawned task.
async fn harvest_site(
    fetcher: &dyn PageFetcher,
    settings: &Settings,
    seed: &str,
    cancel: &CancellationToken,
    progress: &Progress,
) -> SiteResult {
    progress.emit(ProgressEvent::SiteStarted {
        seed: seed.to_string(),
    });

    let start = match parse_seed(seed) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(target: "harvest", "{}", e);
            return SiteResult::error(seed, seed, e.to_string());
        }
    };

    let resolved = resolve(fetcher, &start).await;
    let result = crawl_site(
        fetcher,
        seed,
        &resolved,
        &settings.crawl.limits(),
        &settings.filter,
        cancel,
        progress,
    )
    .await;

    tracing::info!(
        target: "harvest",
        "{}: {} page(s), {} clean email(s)",
        seed,
        result.pages_crawled,
        result.clean_emails.len()
    );
    result
}
