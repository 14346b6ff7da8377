// src/verify/mod.rs
// =============================================================================
// The verification engine.
//
// Two modes, cheapest first:
// - mx:   does the domain publish MX records? (one DNS query per domain)
// - smtp: MX first, then ask each MX host whether it would accept mail for
//         the address (RCPT TO). Slow, often blocked, best effort.
//
// Both return the same VerificationStatus enum:
//   Skipped     verification was off (or the run was cancelled first)
//   Valid       MX exists / RCPT accepted
//   Invalid     no MX / RCPT rejected / not an address
//   Unknown     SMTP gave no verdict on any MX host
//   DnsMissing  no DNS capability on this machine
//
// Submodules:
// - dns: MxLookup trait + trust-dns implementation
// - smtp: SmtpProbe trait + lettre implementation
// - cache: LRU memo shared by concurrent verify tasks
// =============================================================================

mod cache;
mod dns;
mod smtp;

pub use cache::VerificationCache;
pub use dns::{MxLookup, SystemMxLookup};
pub use smtp::{classify_reply, LettreProbe, SmtpProbe};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::VerifySettings;
use crate::extract::is_structurally_valid;
use crate::progress::{Progress, ProgressEvent};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// Don't verify
    #[default]
    None,
    /// MX record lookup only (fast)
    Mx,
    /// MX lookup + SMTP RCPT TO probe (slow, may be blocked)
    Smtp,
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            VerificationMode::None => "none",
            VerificationMode::Mx => "mx",
            VerificationMode::Smtp => "smtp",
        };
        f.pad(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VerificationStatus {
    Skipped,
    Valid,
    Invalid,
    Unknown,
    #[serde(rename = "DNS missing")]
    DnsMissing,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            VerificationStatus::Skipped => "Skipped",
            VerificationStatus::Valid => "Valid",
            VerificationStatus::Invalid => "Invalid",
            VerificationStatus::Unknown => "Unknown",
            VerificationStatus::DnsMissing => "DNS missing",
        };
        f.pad(text)
    }
}

pub struct Verifier {
    /// None when the machine has no usable DNS configuration
    dns: Option<Arc<dyn MxLookup>>,
    smtp: Arc<dyn SmtpProbe>,
    cache: Arc<VerificationCache>,
}

impl Verifier {
    pub fn new(
        dns: Option<Arc<dyn MxLookup>>,
        smtp: Arc<dyn SmtpProbe>,
        cache: Arc<VerificationCache>,
    ) -> Self {
        Self { dns, smtp, cache }
    }

    /// Builds the real engine: system DNS resolver + lettre SMTP probe
    pub fn from_settings(settings: &VerifySettings) -> Self {
        let dns: Option<Arc<dyn MxLookup>> =
            match SystemMxLookup::from_system_conf(settings.dns_timeout()) {
                Ok(lookup) => Some(Arc::new(lookup)),
                Err(e) => {
                    tracing::warn!(target: "verify_task", "DNS unavailable, verification disabled: {}", e);
                    None
                }
            };
        let smtp = Arc::new(LettreProbe::new(
            settings.smtp_sender.clone(),
            settings.helo_name.clone(),
            settings.smtp_timeout(),
        ));
        let cache = Arc::new(VerificationCache::new(settings.cache_capacity));
        Self::new(dns, smtp, cache)
    }

    pub fn dns_available(&self) -> bool {
        self.dns.is_some()
    }

    /// Verifies a single address
    pub async fn verify(&self, email: &str, mode: VerificationMode) -> VerificationStatus {
        if mode == VerificationMode::None {
            return VerificationStatus::Skipped;
        }
        let Some(dns) = &self.dns else {
            return VerificationStatus::DnsMissing;
        };

        let email = email.trim().to_lowercase();
        if !is_structurally_valid(&email) {
            return VerificationStatus::Invalid;
        }
        let Some((_, domain)) = email.split_once('@') else {
            return VerificationStatus::Invalid;
        };

        if let Some(status) = self.cache.status(&email, mode) {
            tracing::trace!(target: "verify_task", "Cache hit for <{}> ({})", email, mode);
            return status;
        }

        let hosts = self.mx_hosts(dns.as_ref(), domain).await;
        let status = if hosts.is_empty() {
            VerificationStatus::Invalid
        } else if mode == VerificationMode::Mx {
            VerificationStatus::Valid
        } else {
            self.probe_hosts(&email, &hosts).await
        };

        self.cache.store_status(&email, mode, status);
        status
    }

    async fn mx_hosts(&self, dns: &dyn MxLookup, domain: &str) -> Arc<Vec<String>> {
        if let Some(hosts) = self.cache.mx_hosts(domain) {
            return hosts;
        }

        let hosts = match dns.lookup_mx(domain).await {
            Ok(hosts) => hosts,
            Err(e) => {
                // NXDOMAIN, SERVFAIL and timeouts all count as "no mail service"
                tracing::debug!(target: "verify_task", "{}", e);
                Vec::new()
            }
        };
        let hosts = Arc::new(hosts);
        self.cache.store_mx_hosts(domain, Arc::clone(&hosts));
        hosts
    }

    async fn probe_hosts(&self, email: &str, hosts: &[String]) -> VerificationStatus {
        for host in hosts {
            match self.smtp.probe(host, email).await {
                Ok(code) => match classify_reply(code) {
                    Some(status) => {
                        tracing::info!(target: "verify_task", "<{}> via {}: {} ({})", email, host, status, code);
                        return status;
                    }
                    None => {
                        tracing::debug!(target: "verify_task", "<{}> via {}: inconclusive reply {}", email, host, code);
                    }
                },
                Err(e) => {
                    tracing::debug!(target: "verify_task", "<{}>: {}", email, e);
                }
            }
        }
        VerificationStatus::Unknown
    }

    /// Verifies many addresses on a bounded worker pool
    ///
    /// Addresses that haven't started when `cancel` fires come back Skipped.
    pub async fn verify_all(
        &self,
        emails: &BTreeSet<String>,
        mode: VerificationMode,
        workers: usize,
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> BTreeMap<String, VerificationStatus> {
        if mode != VerificationMode::None && !emails.is_empty() {
            progress.emit(ProgressEvent::VerificationStarted {
                total: emails.len(),
            });
        }

        let checks = emails.iter().map(|email| async move {
            let status = if cancel.is_cancelled() {
                VerificationStatus::Skipped
            } else {
                self.verify(email, mode).await
            };
            (email.clone(), status)
        });

        let results: Vec<(String, VerificationStatus)> = stream::iter(checks)
            .buffer_unordered(workers.max(1))
            .inspect(|(email, status)| {
                if mode != VerificationMode::None {
                    progress.emit(ProgressEvent::EmailVerified {
                        email: email.clone(),
                        status: *status,
                    });
                }
            })
            .collect()
            .await;

        results.into_iter().collect()
    }
}
