// src/verify/cache.rs
// =============================================================================
// Bounded memo for verification results.
//
// Many scraped addresses share a domain, so MX answers are cached per domain
// and finished statuses per (email, mode). Both maps are LRU with a fixed
// capacity. The cache is shared by every verify task; each map sits behind its
// own mutex and locks are never held across an await.
//
// Two tasks missing on the same key at the same time both do the lookup and
// both store the (identical) answer. That's wasted work, not a bug.
// =============================================================================

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

use super::{VerificationMode, VerificationStatus};

pub struct VerificationCache {
    domains: Mutex<LruCache<String, Arc<Vec<String>>>>,
    emails: Mutex<LruCache<(String, VerificationMode), VerificationStatus>>,
}

impl VerificationCache {
    /// Creates a cache holding up to `capacity` domains and `capacity` emails
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            domains: Mutex::new(LruCache::new(capacity)),
            emails: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cached MX hosts for a domain (empty list = no MX)
    pub fn mx_hosts(&self, domain: &str) -> Option<Arc<Vec<String>>> {
        self.domains.lock().get(domain).cloned()
    }

    pub fn store_mx_hosts(&self, domain: &str, hosts: Arc<Vec<String>>) {
        self.domains.lock().put(domain.to_string(), hosts);
    }

    pub fn status(&self, email: &str, mode: VerificationMode) -> Option<VerificationStatus> {
        self.emails.lock().get(&(email.to_string(), mode)).copied()
    }

    pub fn store_status(&self, email: &str, mode: VerificationMode, status: VerificationStatus) {
        self.emails.lock().put((email.to_string(), mode), status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_keyed_by_mode() {
        let cache = VerificationCache::new(8);
        cache.store_status("jane@acme.com", VerificationMode::Mx, VerificationStatus::Valid);
        assert_eq!(
            cache.status("jane@acme.com", VerificationMode::Mx),
            Some(VerificationStatus::Valid)
        );
        assert_eq!(cache.status("jane@acme.com", VerificationMode::Smtp), None);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = VerificationCache::new(2);
        cache.store_mx_hosts("a.com", Arc::new(vec!["mx.a.com".to_string()]));
        cache.store_mx_hosts("b.com", Arc::new(vec![]));
        // touch a.com so b.com becomes the least recently used
        assert!(cache.mx_hosts("a.com").is_some());
        cache.store_mx_hosts("c.com", Arc::new(vec![]));

        assert!(cache.mx_hosts("a.com").is_some());
        assert!(cache.mx_hosts("b.com").is_none());
        assert!(cache.mx_hosts("c.com").is_some());
    }

    #[test]
    fn test_zero_capacity_still_works() {
        let cache = VerificationCache::new(0);
        cache.store_mx_hosts("a.com", Arc::new(vec![]));
        assert!(cache.mx_hosts("a.com").is_some());
    }
}
