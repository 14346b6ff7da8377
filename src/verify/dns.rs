// src/verify/dns.rs
// =============================================================================
// MX lookups.
//
// The MxLookup trait is the seam between the verifier and DNS so tests can
// swap in a fixed table. SystemMxLookup is the real implementation on top of
// trust-dns-resolver, configured from the host's resolv.conf.
//
// If the system resolver configuration can't be read, there is no DNS
// capability at all; the verifier then reports "DNS missing" for everything
// instead of failing the run.
// =============================================================================

use async_trait::async_trait;
use std::time::Duration;
use trust_dns_resolver::system_conf::read_system_conf;
use trust_dns_resolver::TokioAsyncResolver;

use crate::error::{HarvestError, Result};

#[async_trait]
pub trait MxLookup: Send + Sync {
    /// Mail exchange hostnames for `domain`, most preferred first
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>>;
}

pub struct SystemMxLookup {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl SystemMxLookup {
    /// Builds a resolver from the system configuration
    pub fn from_system_conf(timeout: Duration) -> Result<Self> {
        let (config, mut opts) = read_system_conf().map_err(|e| HarvestError::Dns {
            domain: "<system>".to_string(),
            reason: format!("cannot read resolver configuration: {}", e),
        })?;
        opts.timeout = timeout;
        opts.attempts = 1;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout,
        })
    }
}

#[async_trait]
impl MxLookup for SystemMxLookup {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>> {
        let dns_error = |reason: String| HarvestError::Dns {
            domain: domain.to_string(),
            reason,
        };

        // the resolver has its own timeout, this one bounds the whole lookup
        // including retries over multiple nameservers
        let lookup = tokio::time::timeout(self.timeout, self.resolver.mx_lookup(domain))
            .await
            .map_err(|_| dns_error("timed out".to_string()))?
            .map_err(|e| dns_error(e.to_string()))?;

        let mut records: Vec<(u16, String)> = lookup
            .iter()
            .map(|mx| {
                (
                    mx.preference(),
                    mx.exchange().to_utf8().trim_end_matches('.').to_string(),
                )
            })
            .filter(|(_, host)| !host.is_empty())
            .collect();
        records.sort();

        Ok(records.into_iter().map(|(_, host)| host).collect())
    }
}
