//! Typed fetch operation bound to a cache entry.

use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;

use crate::cache::{QueryCache, QuerySnapshot, QueryStatus};
use crate::error::ApiError;

/// Options recognized by [`ResourceClient::fetch`](crate::ResourceClient::fetch).
#[derive(Clone, Debug, Default)]
pub struct FetchOptions {
  /// Overrides the default enablement (derived from a non-empty path).
  /// A disabled query never fetches and reports `data=None`,
  /// `is_loading=false`.
  pub enabled: Option<bool>,
  /// Retry once after a network error. Off by default - the standing
  /// convention is no automatic retry.
  pub retry: bool,
  /// Refetch when the window regains focus, if the entry is stale.
  pub refetch_on_focus: bool,
}

/// Live view of one cache entry, typed at the edge.
///
/// Dropping the query detaches it from the cache - no state transition
/// will reach an unmounted consumer, and the entry becomes eligible for
/// garbage collection once unobserved.
pub struct FetchQuery<T> {
  rx: watch::Receiver<QuerySnapshot>,
  handle: Option<(QueryCache, String)>,
  // Keeps the disabled channel open so borrows stay valid.
  _keep_alive: Option<watch::Sender<QuerySnapshot>>,
  _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> FetchQuery<T> {
  pub(crate) fn observed(
    rx: watch::Receiver<QuerySnapshot>,
    cache: QueryCache,
    hash: String,
  ) -> Self {
    Self {
      rx,
      handle: Some((cache, hash)),
      _keep_alive: None,
      _marker: PhantomData,
    }
  }

  /// A query that will never fetch (empty path or `enabled: false`).
  pub(crate) fn disabled() -> Self {
    let (tx, rx) = watch::channel(QuerySnapshot::idle());
    Self {
      rx,
      handle: None,
      _keep_alive: Some(tx),
      _marker: PhantomData,
    }
  }

  pub fn is_enabled(&self) -> bool {
    self.handle.is_some()
  }

  /// Raw snapshot of the underlying entry.
  pub fn snapshot(&self) -> QuerySnapshot {
    self.rx.borrow().clone()
  }

  /// Deserialized data, if the entry holds any.
  pub fn data(&self) -> Option<T> {
    let snapshot = self.rx.borrow();
    let value = snapshot.data.as_ref()?;
    match serde_json::from_value((**value).clone()) {
      Ok(data) => Some(data),
      Err(err) => {
        tracing::warn!(error = %err, "cached payload does not match requested type");
        None
      }
    }
  }

  /// Loading with nothing to show yet.
  pub fn is_loading(&self) -> bool {
    self.rx.borrow().is_loading()
  }

  /// Any request in flight, background refetches included.
  pub fn is_fetching(&self) -> bool {
    self.rx.borrow().is_fetching()
  }

  pub fn error(&self) -> Option<Arc<ApiError>> {
    self.rx.borrow().error.clone()
  }

  /// Wait for the next snapshot transition. Returns `false` when the
  /// entry has gone away (cache dropped).
  pub async fn changed(&mut self) -> bool {
    self.rx.changed().await.is_ok()
  }

  /// Wait until the entry reaches a terminal state and return the
  /// typed payload or the error that stopped it.
  pub async fn ready(&mut self) -> Result<T, Arc<ApiError>> {
    if self.handle.is_none() {
      return Err(Arc::new(ApiError::Validation(
        "query is disabled".to_string(),
      )));
    }

    loop {
      {
        let snapshot = self.rx.borrow_and_update().clone();
        match snapshot.status {
          QueryStatus::Success => {
            if let Some(value) = snapshot.data {
              return serde_json::from_value((*value).clone())
                .map_err(|e| Arc::new(ApiError::from(e)));
            }
          }
          QueryStatus::Error => {
            if let Some(err) = snapshot.error {
              return Err(err);
            }
          }
          QueryStatus::Idle | QueryStatus::Pending => {}
        }
      }

      if self.rx.changed().await.is_err() {
        return Err(Arc::new(ApiError::Network {
          message: "query cancelled".to_string(),
        }));
      }
    }
  }

  /// Force a refetch, superseding any in-flight request. No-op for
  /// disabled queries.
  pub fn refetch(&self) {
    if let Some((cache, hash)) = &self.handle {
      cache.refetch(hash);
    }
  }
}
