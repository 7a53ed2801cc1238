//! The path cache: per-`(src, dst)` entries of candidate paths, refreshed
//! from the control plane on a schedule, plus the SCMP handler chain that
//! reacts to link-down notifications by marking cached paths broken.

use crate::addr::IsdAsn;
use crate::error::{Error, Result};
use crate::hdr::ScmpMessage;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::Path;

/// Tuning parameters for [`PathCache`]'s refresh schedule.
#[derive(Debug, Clone, Copy)]
pub struct PathCacheOptions {
    /// Paths expiring within this long are dropped from `store` rather than
    /// cached, since they would be stale before anything could use them.
    pub min_accepted_lifetime: Duration,
    /// A refresh is scheduled this long before the earliest remaining
    /// path's expiry.
    pub refresh_at_remaining: Duration,
    /// Upper bound on how long an entry goes without a refresh, even if no
    /// path is close to expiring.
    pub refresh_interval: Duration,
}

impl Default for PathCacheOptions {
    fn default() -> Self {
        PathCacheOptions {
            min_accepted_lifetime: Duration::from_secs(5 * 60),
            refresh_at_remaining: Duration::from_secs(10 * 60),
            refresh_interval: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    paths: Vec<Arc<Path>>,
    next_refresh: Option<Instant>,
    refresh_pending: bool,
}

/// Outcome of a query callback invoked by [`PathCache::lookup`] to refresh
/// an entry's paths.
pub type QueryResult = Result<()>;

/// A single-threaded path cache keyed by `(src, dst)` ISD-ASN pairs. See
/// [`SharedPathCache`] for a thread-safe wrapper.
#[derive(Debug)]
pub struct PathCache {
    options: PathCacheOptions,
    entries: HashMap<(IsdAsn, IsdAsn), Entry>,
}

impl PathCache {
    /// Builds an empty cache with the given refresh parameters.
    pub fn new(options: PathCacheOptions) -> Self {
        PathCache {
            options,
            entries: HashMap::new(),
        }
    }

    /// Looks up cached paths for `(src, dst)`, invoking `query_fn` to
    /// refresh the entry if a refresh is due and none is already in
    /// flight. `query_fn` is expected to call [`PathCache::store`] on
    /// success, or return [`Error::Pending`] if the refresh is
    /// asynchronous and still outstanding.
    pub fn lookup(
        &mut self,
        src: IsdAsn,
        dst: IsdAsn,
        query_fn: impl FnOnce(&mut PathCache, IsdAsn, IsdAsn) -> QueryResult,
    ) -> Result<Vec<Arc<Path>>> {
        let now = Instant::now();
        let needs_refresh = {
            let entry = self.entries.entry((src, dst)).or_default();
            !entry.refresh_pending && entry.next_refresh.map_or(true, |t| now >= t)
        };

        let mut pending = false;
        if needs_refresh {
            self.entries.get_mut(&(src, dst)).unwrap().refresh_pending = true;
            match query_fn(self, src, dst) {
                Ok(()) => {}
                Err(Error::Pending) => pending = true,
                Err(e) => {
                    if let Some(entry) = self.entries.get_mut(&(src, dst)) {
                        entry.refresh_pending = false;
                    }
                    return Err(e);
                }
            }
        }

        let entry = self.entries.entry((src, dst)).or_default();
        let live: Vec<Arc<Path>> = entry
            .paths
            .iter()
            .filter(|p| !p.is_expired(now) && now < p.expiry())
            .cloned()
            .collect();
        if live.is_empty() && pending {
            return Err(Error::Pending);
        }
        Ok(live)
    }

    /// Like [`PathCache::lookup`], but delivers each live path to `recv`
    /// instead of collecting a `Vec`, for callers on a hot path that want
    /// to avoid the allocation.
    pub fn lookup_with(
        &mut self,
        src: IsdAsn,
        dst: IsdAsn,
        query_fn: impl FnOnce(&mut PathCache, IsdAsn, IsdAsn) -> QueryResult,
        mut recv: impl FnMut(&Arc<Path>),
    ) -> Result<()> {
        let paths = self.lookup(src, dst, query_fn)?;
        for p in &paths {
            recv(p);
        }
        Ok(())
    }

    /// Returns whatever is already cached for `(src, dst)` without
    /// triggering a refresh.
    pub fn lookup_cached(&self, src: IsdAsn, dst: IsdAsn) -> Vec<Arc<Path>> {
        let now = Instant::now();
        self.entries
            .get(&(src, dst))
            .map(|e| e.paths.iter().filter(|p| now < p.expiry()).cloned().collect())
            .unwrap_or_default()
    }

    /// Replaces the cached paths for `(src, dst)`: drops any path expiring
    /// within `min_accepted_lifetime`, recomputes the entry's next refresh
    /// time, and clears `refresh_pending`.
    pub fn store(&mut self, src: IsdAsn, dst: IsdAsn, paths: Vec<Arc<Path>>) {
        let now = Instant::now();
        let cutoff = now + self.options.min_accepted_lifetime;
        let retained: Vec<Arc<Path>> = paths.into_iter().filter(|p| p.expiry() > cutoff).collect();

        let earliest_expiry = retained.iter().map(|p| p.expiry()).min();
        let next_refresh = Some(match earliest_expiry {
            Some(expiry) => expiry
                .checked_sub(self.options.refresh_at_remaining)
                .unwrap_or(now)
                .min(now + self.options.refresh_interval),
            None => now + self.options.refresh_interval,
        });

        let entry = self.entries.entry((src, dst)).or_default();
        entry.paths = retained;
        entry.next_refresh = next_refresh;
        entry.refresh_pending = false;
    }

    /// Drops every cached entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops the cached entry for `(src, dst)`, if any.
    pub fn clear_entry(&mut self, src: IsdAsn, dst: IsdAsn) {
        self.entries.remove(&(src, dst));
    }

    /// Marks every cached path (across all entries) whose interface list
    /// contains `iface` as either ingress or egress on an AS matching
    /// `sender` as broken. Used for `ScmpMessage::ExtIfDown`.
    fn mark_broken_ext_if_down(&self, sender: IsdAsn, iface: u16) {
        for (&(src, dst), entry) in &self.entries {
            if src != sender && dst != sender {
                continue;
            }
            for path in &entry.paths {
                if path.raw().hops().iter().any(|&(i, e)| i == iface || e == iface) {
                    path.mark_broken();
                }
            }
        }
    }

    /// Marks every cached path carrying the exact `(ingress, egress)` hop
    /// on an AS matching `sender` as broken. Used for
    /// `ScmpMessage::IntConnDown`.
    fn mark_broken_int_conn_down(&self, sender: IsdAsn, ingress: u16, egress: u16) {
        for (&(src, dst), entry) in &self.entries {
            if src != sender && dst != sender {
                continue;
            }
            for path in &entry.paths {
                if path.raw().hops().contains(&(ingress, egress)) {
                    path.mark_broken();
                }
            }
        }
    }
}

impl crate::socket::ScmpHandler for PathCache {
    fn handle_callback(&mut self, msg: &ScmpMessage) -> bool {
        match msg {
            ScmpMessage::ExtIfDown { sender, iface } => self.mark_broken_ext_if_down(*sender, *iface),
            ScmpMessage::IntConnDown { sender, ingress, egress } => {
                self.mark_broken_int_conn_down(*sender, *ingress, *egress)
            }
            _ => {}
        }
        true
    }
}

/// A thread-safe wrapper around [`PathCache`]. Every operation takes the
/// lock for its own duration; the decide-refresh step inside `lookup` runs
/// under the same exclusive guard as the rest of the call so two
/// concurrent lookups can never both fire the query callback.
#[derive(Debug)]
pub struct SharedPathCache {
    inner: RwLock<PathCache>,
}

impl SharedPathCache {
    /// Builds an empty thread-safe cache.
    pub fn new(options: PathCacheOptions) -> Self {
        SharedPathCache {
            inner: RwLock::new(PathCache::new(options)),
        }
    }

    /// See [`PathCache::lookup`].
    pub fn lookup(
        &self,
        src: IsdAsn,
        dst: IsdAsn,
        query_fn: impl FnOnce(&mut PathCache, IsdAsn, IsdAsn) -> QueryResult,
    ) -> Result<Vec<Arc<Path>>> {
        self.inner.write().unwrap().lookup(src, dst, query_fn)
    }

    /// See [`PathCache::lookup_cached`].
    pub fn lookup_cached(&self, src: IsdAsn, dst: IsdAsn) -> Vec<Arc<Path>> {
        self.inner.read().unwrap().lookup_cached(src, dst)
    }

    /// See [`PathCache::store`].
    pub fn store(&self, src: IsdAsn, dst: IsdAsn, paths: Vec<Arc<Path>>) {
        self.inner.write().unwrap().store(src, dst, paths)
    }

    /// See [`PathCache::clear`].
    pub fn clear(&self) {
        self.inner.write().unwrap().clear()
    }

    /// See [`PathCache::clear_entry`].
    pub fn clear_entry(&self, src: IsdAsn, dst: IsdAsn) {
        self.inner.write().unwrap().clear_entry(src, dst)
    }
}

impl crate::socket::ScmpHandler for SharedPathCache {
    fn handle_callback(&mut self, msg: &ScmpMessage) -> bool {
        self.inner.write().unwrap().handle_callback(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::{Asn, Endpoint, IPAddress, Isd};
    use crate::path::RawPath;
    use crate::socket::ScmpHandler;

    fn ia(asn: u64) -> IsdAsn {
        IsdAsn::new(Isd(1), Asn(asn))
    }

    fn next_hop() -> Endpoint {
        Endpoint::new(crate::addr::Address::new(ia(1), IPAddress::unspecified_v4()), 31000)
    }

    fn path(expiry: Instant) -> Arc<Path> {
        Arc::new(Path::new(RawPath::empty(ia(1)), expiry, 1500, next_hop()))
    }

    #[test]
    fn store_drops_paths_below_min_accepted_lifetime() {
        let mut cache = PathCache::new(PathCacheOptions::default());
        let now = Instant::now();
        let short_lived = path(now + Duration::from_secs(1));
        cache.store(ia(1), ia(2), vec![short_lived]);
        assert!(cache.lookup_cached(ia(1), ia(2)).is_empty());
    }

    #[test]
    fn lookup_triggers_query_only_when_refresh_is_due() {
        let mut cache = PathCache::new(PathCacheOptions::default());
        let now = Instant::now();
        cache.store(ia(1), ia(2), vec![path(now + Duration::from_secs(3600))]);

        let mut calls = 0;
        let result = cache
            .lookup(ia(1), ia(2), |_, _, _| {
                calls += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(calls, 0);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn lookup_returns_pending_when_entry_empty_and_query_pending() {
        let mut cache = PathCache::new(PathCacheOptions::default());
        let err = cache.lookup(ia(1), ia(2), |_, _, _| Err(Error::Pending)).unwrap_err();
        assert_eq!(err, Error::Pending);
    }

    #[test]
    fn refresh_pending_is_cleared_on_query_failure() {
        let mut cache = PathCache::new(PathCacheOptions::default());
        let err = cache
            .lookup(ia(1), ia(2), |_, _, _| Err(Error::InvalidArgument("x".into())))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        // A subsequent lookup must be able to trigger another query: the
        // pending flag must not have been left set by the failed attempt.
        let mut calls = 0;
        cache
            .lookup(ia(1), ia(2), |_, _, _| {
                calls += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn ext_if_down_marks_matching_paths_broken() {
        let mut cache = PathCache::new(PathCacheOptions::default());
        let now = Instant::now();
        let p = path(now + Duration::from_secs(3600));
        cache.store(ia(1), ia(2), vec![p.clone()]);

        cache.handle_callback(&ScmpMessage::ExtIfDown { sender: ia(1), iface: 7 });
        // An empty path has no hop fields, so no interface matches; it
        // must be left untouched.
        assert!(!p.is_broken());
    }

    #[test]
    fn shared_cache_marks_broken_through_the_lock() {
        let mut shared = SharedPathCache::new(PathCacheOptions::default());
        let now = Instant::now();
        shared.store(ia(1), ia(2), vec![path(now + Duration::from_secs(3600))]);
        assert!(shared.handle_callback(&ScmpMessage::IntConnDown {
            sender: ia(1),
            ingress: 1,
            egress: 2,
        }));
    }
}
