//! In-memory query cache with request de-duplication, path-prefix
//! invalidation, and epoch-guarded entry writes.
//!
//! Entries hold raw JSON snapshots broadcast over `watch` channels; the
//! typed layer on top deserializes at the edge. The fetch task is the
//! only writer of entry data - mutations mark entries stale and let the
//! refetch overwrite them.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::key::QueryKey;
use crate::error::ApiError;

/// Future produced by a registered fetcher.
pub type FetchFuture = BoxFuture<'static, Result<Value, ApiError>>;

/// Fetch closure stored per entry. Re-run on refetch and invalidation.
pub type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStatus {
  /// Entry exists but nothing has been fetched yet
  Idle,
  /// A request is in flight
  Pending,
  Success,
  Error,
}

/// One observable state of a cache entry.
#[derive(Clone, Debug)]
pub struct QuerySnapshot {
  pub status: QueryStatus,
  pub data: Option<Arc<Value>>,
  pub error: Option<Arc<ApiError>>,
  /// Wall-clock time of the last successful fetch.
  pub fetched_at: Option<DateTime<Utc>>,
}

impl QuerySnapshot {
  pub fn idle() -> Self {
    Self {
      status: QueryStatus::Idle,
      data: None,
      error: None,
      fetched_at: None,
    }
  }

  /// Loading with nothing to show yet. A background refetch that still
  /// has previous data does not count.
  pub fn is_loading(&self) -> bool {
    self.status == QueryStatus::Pending && self.data.is_none()
  }

  /// Any request in flight, background refetches included.
  pub fn is_fetching(&self) -> bool {
    self.status == QueryStatus::Pending
  }
}

struct Entry {
  key: QueryKey,
  tx: watch::Sender<QuerySnapshot>,
  fetcher: Fetcher,
  refetch_on_focus: bool,
  /// Bumped on invalidation/refetch; a resolving request writes its
  /// result only if the epoch it started under is still current.
  epoch: u64,
  in_flight: bool,
  stale: bool,
  fetched: Option<Instant>,
  last_touched: Instant,
}

/// Request-deduplicating, key-addressed cache shared by every resource
/// operation. Cheap to clone; clones share the same entries.
///
/// Constructed once at application start and handed to the factory -
/// there is no global instance, so tests get a fresh cache each.
#[derive(Clone)]
pub struct QueryCache {
  shared: Arc<Shared>,
}

struct Shared {
  entries: Mutex<HashMap<String, Entry>>,
  stale_time: Duration,
  gc_time: Duration,
}

impl QueryCache {
  pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
    Self {
      shared: Arc::new(Shared {
        entries: Mutex::new(HashMap::new()),
        stale_time,
        gc_time,
      }),
    }
  }

  pub fn from_config(config: &crate::config::Config) -> Self {
    Self::new(config.stale_time(), config.gc_time())
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
    // A panicked fetch task cannot corrupt the map; recover the guard.
    self
      .shared
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  /// Subscribe to the entry for `key`, creating it if needed and
  /// starting a fetch when the entry is new, errored, or stale.
  ///
  /// Concurrent subscribers to one key share a single in-flight request
  /// and a single entry. Returns the cache hash and a receiver that
  /// observes every snapshot transition.
  pub fn subscribe(
    &self,
    key: QueryKey,
    fetcher: Fetcher,
    refetch_on_focus: bool,
  ) -> (String, watch::Receiver<QuerySnapshot>) {
    let hash = key.cache_hash();
    let now = Instant::now();

    let mut entries = self.lock();
    self.gc_locked(&mut entries);

    let entry = entries.entry(hash.clone()).or_insert_with(|| {
      let (tx, _) = watch::channel(QuerySnapshot::idle());
      Entry {
        key,
        tx,
        fetcher: Arc::clone(&fetcher),
        refetch_on_focus,
        epoch: 0,
        in_flight: false,
        stale: false,
        fetched: None,
        last_touched: now,
      }
    });

    // Latest subscriber's closure wins; any subscriber opting into
    // focus refetch opts the entry in.
    entry.fetcher = fetcher;
    entry.refetch_on_focus |= refetch_on_focus;
    entry.last_touched = now;

    let rx = entry.tx.subscribe();

    let status = entry.tx.borrow().status;
    let needs_fetch = !entry.in_flight
      && (status == QueryStatus::Idle
        || status == QueryStatus::Error
        || Self::entry_is_stale(entry, self.shared.stale_time));

    if needs_fetch {
      self.start_fetch_locked(&hash, entry);
    }

    (hash, rx)
  }

  /// Mark every entry whose path starts with `prefix` stale. Observed
  /// entries refetch immediately; unobserved ones refetch on their next
  /// subscription. Any in-flight response is superseded.
  pub fn invalidate_prefix(&self, prefix: &str) {
    tracing::debug!(prefix, "invalidating cache entries");

    let mut entries = self.lock();
    let hashes: Vec<String> = entries
      .iter()
      .filter(|(_, e)| e.key.path.starts_with(prefix))
      .map(|(h, _)| h.clone())
      .collect();

    for hash in hashes {
      if let Some(entry) = entries.get_mut(&hash) {
        entry.stale = true;
        entry.epoch += 1;
        if entry.tx.receiver_count() > 0 {
          self.start_fetch_locked(&hash, entry);
        }
      }
    }
  }

  /// Force a refetch of a single entry, superseding any in-flight
  /// request for it.
  pub fn refetch(&self, hash: &str) {
    let mut entries = self.lock();
    if let Some(entry) = entries.get_mut(hash) {
      entry.epoch += 1;
      self.start_fetch_locked(hash, entry);
    }
  }

  /// The window regained focus: refetch stale entries that are
  /// currently observed and opted into focus refetch.
  pub fn notify_focus(&self) {
    let mut entries = self.lock();
    let hashes: Vec<String> = entries
      .iter()
      .filter(|(_, e)| {
        e.refetch_on_focus
          && e.tx.receiver_count() > 0
          && !e.in_flight
          && Self::entry_is_stale(e, self.shared.stale_time)
      })
      .map(|(h, _)| h.clone())
      .collect();

    for hash in hashes {
      if let Some(entry) = entries.get_mut(&hash) {
        entry.epoch += 1;
        self.start_fetch_locked(&hash, entry);
      }
    }
  }

  /// Latest snapshot for an entry, if it exists.
  pub fn snapshot(&self, hash: &str) -> Option<QuerySnapshot> {
    self.lock().get(hash).map(|e| e.tx.borrow().clone())
  }

  /// Evict unobserved entries that have idled past the GC window.
  pub fn gc(&self) {
    let mut entries = self.lock();
    self.gc_locked(&mut entries);
  }

  pub fn len(&self) -> usize {
    self.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.lock().is_empty()
  }

  fn gc_locked(&self, entries: &mut HashMap<String, Entry>) {
    let gc_time = self.shared.gc_time;
    entries.retain(|_, e| {
      e.tx.receiver_count() > 0 || e.in_flight || e.last_touched.elapsed() < gc_time
    });
  }

  fn entry_is_stale(entry: &Entry, stale_time: Duration) -> bool {
    entry.stale
      || entry
        .fetched
        .map(|t| t.elapsed() >= stale_time)
        .unwrap_or(false)
  }

  /// Spawn the fetch task for an entry. The caller holds the map lock;
  /// nothing here awaits.
  fn start_fetch_locked(&self, hash: &str, entry: &mut Entry) {
    entry.in_flight = true;
    entry.stale = false;

    let prev = entry.tx.borrow().clone();
    entry.tx.send_replace(QuerySnapshot {
      status: QueryStatus::Pending,
      data: prev.data,
      error: None,
      fetched_at: prev.fetched_at,
    });

    let epoch = entry.epoch;
    let fetcher = Arc::clone(&entry.fetcher);
    let shared = Arc::clone(&self.shared);
    let hash = hash.to_string();

    tokio::spawn(async move {
      let result = fetcher().await;

      let mut entries = shared.entries.lock().unwrap_or_else(PoisonError::into_inner);
      let entry = match entries.get_mut(&hash) {
        Some(entry) => entry,
        None => return, // evicted while in flight
      };

      if entry.epoch != epoch {
        tracing::debug!(path = %entry.key.path, "discarding superseded response");
        return;
      }

      entry.in_flight = false;
      match result {
        Ok(value) => {
          entry.fetched = Some(Instant::now());
          entry.tx.send_replace(QuerySnapshot {
            status: QueryStatus::Success,
            data: Some(Arc::new(value)),
            error: None,
            fetched_at: Some(Utc::now()),
          });
        }
        Err(err) => {
          tracing::warn!(path = %entry.key.path, error = %err, "query fetch failed");
          let prev = entry.tx.borrow().clone();
          entry.tx.send_replace(QuerySnapshot {
            status: QueryStatus::Error,
            data: prev.data,
            error: Some(Arc::new(err)),
            fetched_at: prev.fetched_at,
          });
        }
      }
    });
  }
}
