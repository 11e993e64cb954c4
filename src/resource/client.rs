//! The resource operation factory.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::watch;

use super::fetch::{FetchOptions, FetchQuery};
use super::mutation::{CreateOp, DeleteOp, InvalidateKeys, UpdateOp};
use crate::cache::{Fetcher, Params, QueryCache, QueryKey};
use crate::error::Result;
use crate::http::{HttpClient, SessionState};

/// Turns resource paths into bound operations: fetch with query params,
/// create/update/delete with cache invalidation. One instance is shared
/// by every page; clones share the adapter and the cache.
#[derive(Clone)]
pub struct ResourceClient {
  http: HttpClient,
  cache: QueryCache,
}

impl ResourceClient {
  pub fn new(http: HttpClient, cache: QueryCache) -> Self {
    Self { http, cache }
  }

  pub fn http(&self) -> &HttpClient {
    &self.http
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  /// Observe session transitions (forced logout on 401).
  pub fn session(&self) -> watch::Receiver<SessionState> {
    self.http.session()
  }

  /// Bind a GET to `path` + `params` and subscribe to its cache entry.
  ///
  /// An empty `path` is the disabled sentinel: no request is issued
  /// regardless of `options.enabled`, and the query reports
  /// `data=None, is_loading=false`.
  pub fn fetch<T: DeserializeOwned>(
    &self,
    path: &str,
    params: Params,
    options: FetchOptions,
  ) -> FetchQuery<T> {
    let enabled = options.enabled.unwrap_or(!path.is_empty());
    if path.is_empty() || !enabled {
      return FetchQuery::disabled();
    }

    let key = QueryKey::new(path, params.clone());

    let http = self.http.clone();
    let fetch_path = path.to_string();
    let retry = options.retry;
    let fetcher: Fetcher = Arc::new(move || {
      let http = http.clone();
      let path = fetch_path.clone();
      let params = params.clone();
      Box::pin(async move {
        let first = http.get_json(&path, &params).await;
        match first {
          Err(ref err) if retry && err.is_network() => {
            tracing::debug!(path = %path, "retrying once after network error");
            http.get_json(&path, &params).await
          }
          other => other,
        }
      })
    });

    let (hash, rx) = self.cache.subscribe(key, fetcher, options.refetch_on_focus);
    FetchQuery::observed(rx, self.cache.clone(), hash)
  }

  /// Bind a create (POST) to `path`, invalidating `keys` on success.
  pub fn create(&self, path: &str, keys: impl Into<InvalidateKeys>) -> CreateOp {
    CreateOp {
      http: self.http.clone(),
      cache: self.cache.clone(),
      path: path.to_string(),
      keys: keys.into(),
    }
  }

  /// Bind an update (PUT) to `path`, invalidating `keys` on success.
  pub fn update(&self, path: &str, keys: impl Into<InvalidateKeys>) -> UpdateOp {
    UpdateOp {
      http: self.http.clone(),
      cache: self.cache.clone(),
      path: path.to_string(),
      keys: keys.into(),
      id_required: false,
    }
  }

  /// Bind a delete to `path`, invalidating `keys` on success.
  pub fn delete(&self, path: &str, keys: impl Into<InvalidateKeys>) -> DeleteOp {
    DeleteOp {
      http: self.http.clone(),
      cache: self.cache.clone(),
      path: path.to_string(),
      keys: keys.into(),
      id_required: false,
    }
  }

  /// Fetch a CSV export as text, bypassing the cache. The caller
  /// persists it (the download trigger is a shell concern).
  pub async fn export_csv(&self, path: &str, params: Params) -> Result<String> {
    self.http.get_text(path, &params).await
  }

  /// The window regained focus: refetch stale observed queries that
  /// opted in via `refetch_on_focus`.
  pub fn notify_focus(&self) {
    self.cache.notify_focus();
  }
}
