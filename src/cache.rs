//! Last-fetched inventory per scope.
//!
//! The cache does no I/O. The main loop asks [`ResourceCache::begin_refresh`]
//! whether a scope needs fetching, runs the fetch in the background, and
//! hands the result back through [`ResourceCache::complete_refresh`] together
//! with the ticket it was given. Results carrying any other ticket are
//! dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::azure::ClientError;
use crate::model::{Resource, Scope};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

pub type Ticket = u64;

/// What the renderer sees for one scope.
#[derive(Debug, Clone)]
pub struct CacheView {
    /// Empty until the first successful refresh.
    pub resources: Arc<[Resource]>,
    pub loaded: bool,
    pub stale: bool,
    pub refreshing: bool,
    /// Error of the latest attempt, cleared by the next success.
    pub error: Option<ClientError>,
}

#[derive(Debug, Default)]
struct Entry {
    resources: Option<Arc<[Resource]>>,
    last_success: Option<Instant>,
    last_error: Option<ClientError>,
    invalidated: bool,
    in_flight: Option<Ticket>,
    retry_at: Option<Instant>,
    failures: u32,
}

impl Entry {
    fn is_stale(&self, ttl: Duration, now: Instant) -> bool {
        self.last_success
            .is_some_and(|at| now.saturating_duration_since(at) > ttl)
    }

    fn needs_refresh(&self, ttl: Duration, now: Instant) -> bool {
        if self.invalidated {
            return true;
        }
        match &self.last_error {
            // Retried only after an explicit invalidate.
            Some(ClientError::NotFound(_) | ClientError::Rejected { .. } | ClientError::Auth(_)) => {
                false
            }
            Some(ClientError::Transient { .. }) => true,
            None => self.resources.is_none() || self.is_stale(ttl, now),
        }
    }
}

#[derive(Debug)]
pub struct ResourceCache {
    ttl: Duration,
    entries: HashMap<Scope, Entry>,
    next_ticket: Ticket,
}

impl ResourceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            next_ticket: 1,
        }
    }

    pub fn get(&self, scope: &Scope, now: Instant) -> Option<CacheView> {
        let entry = self.entries.get(scope)?;
        Some(CacheView {
            resources: entry
                .resources
                .clone()
                .unwrap_or_else(|| Arc::from(Vec::new())),
            loaded: entry.resources.is_some(),
            stale: entry.is_stale(self.ttl, now),
            refreshing: entry.in_flight.is_some(),
            error: entry.last_error.clone(),
        })
    }

    /// True iff more than the TTL has passed since the last successful refresh.
    #[cfg(test)]
    fn is_stale(&self, scope: &Scope, now: Instant) -> bool {
        self.entries
            .get(scope)
            .is_some_and(|e| e.is_stale(self.ttl, now))
    }

    /// Schedule a refresh on the next pass. Cached data stays visible.
    pub fn invalidate(&mut self, scope: &Scope) {
        let entry = self.entries.entry(scope.clone()).or_default();
        entry.invalidated = true;
        entry.retry_at = None;
        debug!(%scope, "Invalidated cache entry");
    }

    /// Hand out a ticket if `scope` should be fetched now.
    pub fn begin_refresh(&mut self, scope: &Scope, now: Instant) -> Option<Ticket> {
        let entry = self.entries.entry(scope.clone()).or_default();
        if entry.in_flight.is_some() {
            return None;
        }
        if entry.retry_at.is_some_and(|at| now < at) {
            return None;
        }
        if !entry.needs_refresh(self.ttl, now) {
            return None;
        }

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        entry.in_flight = Some(ticket);
        entry.invalidated = false;
        debug!(%scope, ticket, "Refresh started");
        Some(ticket)
    }

    /// Apply a fetch result. Returns false when the ticket was not the one
    /// in flight and the result was dropped.
    pub fn complete_refresh(
        &mut self,
        scope: &Scope,
        ticket: Ticket,
        result: Result<Vec<Resource>, ClientError>,
        now: Instant,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(scope) else {
            debug!(%scope, ticket, "Dropping refresh for unknown scope");
            return false;
        };
        if entry.in_flight != Some(ticket) {
            debug!(%scope, ticket, "Dropping superseded refresh");
            return false;
        }
        entry.in_flight = None;

        match result {
            Ok(resources) => {
                debug!(%scope, count = resources.len(), "Refresh succeeded");
                entry.resources = Some(Arc::from(resources));
                entry.last_success = Some(now);
                entry.last_error = None;
                entry.retry_at = None;
                entry.failures = 0;
            }
            Err(error) => {
                if error.is_retryable() {
                    let delay = retry_backoff(entry.failures);
                    entry.failures = entry.failures.saturating_add(1);
                    entry.retry_at = Some(now + delay);
                    warn!(%scope, %error, retry_in_secs = delay.as_secs(), "Refresh failed");
                } else if error.is_expected() {
                    warn!(%scope, %error, "Refresh failed");
                } else {
                    tracing::error!(%scope, %error, "Refresh failed");
                }
                entry.last_error = Some(error);
            }
        }
        true
    }

    /// Forget the in-flight refresh of `scope`; its result will be dropped.
    pub fn abandon(&mut self, scope: &Scope) {
        if let Some(entry) = self.entries.get_mut(scope)
            && let Some(ticket) = entry.in_flight.take()
        {
            // Fetch again when the scope is shown next.
            entry.invalidated = true;
            debug!(%scope, ticket, "Abandoned refresh");
        }
    }
}

/// 1s, 2s, 4s, ... capped at a minute.
fn retry_backoff(failures: u32) -> Duration {
    INITIAL_BACKOFF
        .saturating_mul(1_u32 << failures.min(6))
        .min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceStatus;
    use crate::model::fixtures::vm;

    const TTL: Duration = Duration::from_secs(60);

    fn scope() -> Scope {
        Scope::resource_group("sub-1", "rg-1")
    }

    fn loaded(now: Instant) -> ResourceCache {
        let mut cache = ResourceCache::new(TTL);
        let ticket = cache.begin_refresh(&scope(), now).unwrap();
        cache.complete_refresh(&scope(), ticket, Ok(vec![vm("vm-1", ResourceStatus::Running)]), now);
        cache
    }

    #[test]
    fn test_first_access_needs_refresh() {
        let now = Instant::now();
        let mut cache = ResourceCache::new(TTL);
        assert!(cache.get(&scope(), now).is_none());

        let ticket = cache.begin_refresh(&scope(), now);
        assert!(ticket.is_some());
        // Only one fetch in flight per scope.
        assert!(cache.begin_refresh(&scope(), now).is_none());

        let view = cache.get(&scope(), now).unwrap();
        assert!(view.refreshing);
        assert!(!view.loaded);
        assert!(!view.stale);
    }

    #[test]
    fn test_staleness_follows_ttl() {
        let t0 = Instant::now();
        let mut cache = loaded(t0);

        assert!(!cache.is_stale(&scope(), t0 + TTL));
        assert!(cache.is_stale(&scope(), t0 + TTL + Duration::from_millis(1)));
        assert!(cache.begin_refresh(&scope(), t0 + TTL).is_none());

        let later = t0 + TTL * 2;
        let ticket = cache.begin_refresh(&scope(), later).unwrap();
        let view = cache.get(&scope(), later).unwrap();
        assert!(view.stale && view.refreshing);
        assert_eq!(view.resources.len(), 1);

        cache.complete_refresh(&scope(), ticket, Ok(vec![]), later);
        assert!(!cache.is_stale(&scope(), later));
    }

    #[test]
    fn test_invalidate_keeps_data_and_staleness() {
        let t0 = Instant::now();
        let mut cache = loaded(t0);
        cache.invalidate(&scope());

        let view = cache.get(&scope(), t0).unwrap();
        assert_eq!(view.resources.len(), 1);
        assert!(!view.stale);
        assert!(cache.begin_refresh(&scope(), t0).is_some());
    }

    #[test]
    fn test_superseded_result_is_dropped() {
        let t0 = Instant::now();
        let mut cache = ResourceCache::new(TTL);
        let first = cache.begin_refresh(&scope(), t0).unwrap();
        cache.abandon(&scope());
        let second = cache.begin_refresh(&scope(), t0).unwrap();
        assert_ne!(first, second);

        assert!(!cache.complete_refresh(&scope(), first, Ok(vec![vm("old", ResourceStatus::Running)]), t0));
        assert!(cache.complete_refresh(&scope(), second, Ok(vec![]), t0));
        assert!(cache.get(&scope(), t0).unwrap().resources.is_empty());
    }

    #[test]
    fn test_transient_failure_keeps_snapshot_and_backs_off() {
        let t0 = Instant::now();
        let mut cache = loaded(t0);
        cache.invalidate(&scope());

        let ticket = cache.begin_refresh(&scope(), t0).unwrap();
        cache.complete_refresh(&scope(), ticket, Err(ClientError::transient("timeout")), t0);

        let view = cache.get(&scope(), t0).unwrap();
        assert_eq!(view.resources.len(), 1);
        assert!(view.error.as_ref().is_some_and(ClientError::is_retryable));

        assert!(cache.begin_refresh(&scope(), t0 + Duration::from_millis(500)).is_none());
        let ticket = cache.begin_refresh(&scope(), t0 + INITIAL_BACKOFF).unwrap();
        let t1 = t0 + INITIAL_BACKOFF;
        cache.complete_refresh(&scope(), ticket, Err(ClientError::transient("timeout")), t1);
        assert!(cache.begin_refresh(&scope(), t1 + Duration::from_secs(1)).is_none());
        assert!(cache.begin_refresh(&scope(), t1 + Duration::from_secs(2)).is_some());
    }

    #[test]
    fn test_not_found_waits_for_invalidate() {
        let t0 = Instant::now();
        let mut cache = ResourceCache::new(TTL);
        let ticket = cache.begin_refresh(&scope(), t0).unwrap();
        cache.complete_refresh(&scope(), ticket, Err(ClientError::NotFound("rg-1".into())), t0);

        assert!(cache.begin_refresh(&scope(), t0 + TTL * 10).is_none());
        cache.invalidate(&scope());
        assert!(cache.begin_refresh(&scope(), t0).is_some());
    }

    #[test]
    fn test_success_clears_error() {
        let t0 = Instant::now();
        let mut cache = ResourceCache::new(TTL);
        let ticket = cache.begin_refresh(&scope(), t0).unwrap();
        cache.complete_refresh(&scope(), ticket, Err(ClientError::transient("reset")), t0);
        let ticket = cache.begin_refresh(&scope(), t0 + MAX_BACKOFF).unwrap();
        cache.complete_refresh(&scope(), ticket, Ok(vec![]), t0 + MAX_BACKOFF);

        let view = cache.get(&scope(), t0 + MAX_BACKOFF).unwrap();
        assert!(view.error.is_none());
        assert!(view.loaded);
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(retry_backoff(0), Duration::from_secs(1));
        assert_eq!(retry_backoff(3), Duration::from_secs(8));
        assert_eq!(retry_backoff(10), MAX_BACKOFF);
    }
}
