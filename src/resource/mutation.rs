//! Create/Update/Delete operations bound to a path and invalidation keys.
//!
//! Each operation is an awaited call returning a `Result`; on success the
//! invalidation keys are applied, in order, before the result is handed
//! back. There is no callback layering and no way for an error to go
//! unobserved - failures come back through the `Result` and are logged.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::cache::QueryCache;
use crate::error::{ApiError, Result};
use crate::http::{HttpClient, MultipartField};

/// Identifier appended to a resource path for item-level mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceId {
  Int(i64),
  Str(String),
}

impl fmt::Display for ResourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ResourceId::Int(i) => write!(f, "{}", i),
      ResourceId::Str(s) => f.write_str(s),
    }
  }
}

impl From<i64> for ResourceId {
  fn from(v: i64) -> Self {
    ResourceId::Int(v)
  }
}

impl From<u32> for ResourceId {
  fn from(v: u32) -> Self {
    ResourceId::Int(v as i64)
  }
}

impl From<&str> for ResourceId {
  fn from(v: &str) -> Self {
    ResourceId::Str(v.to_string())
  }
}

impl From<String> for ResourceId {
  fn from(v: String) -> Self {
    ResourceId::Str(v)
  }
}

/// Mutation payload. The encoding decision is a compile-time match:
/// `Json` goes out JSON-encoded, `Multipart` goes out as a multipart
/// form (file uploads).
#[derive(Clone, Debug)]
pub enum MutationBody {
  Json(Value),
  Multipart(Vec<MultipartField>),
}

impl MutationBody {
  /// JSON body from any serializable value.
  pub fn json<T: Serialize>(value: &T) -> Result<Self> {
    Ok(MutationBody::Json(serde_json::to_value(value)?))
  }

  pub fn multipart(fields: Vec<MultipartField>) -> Self {
    MutationBody::Multipart(fields)
  }

  pub fn is_multipart(&self) -> bool {
    matches!(self, MutationBody::Multipart(_))
  }
}

/// Update input: optional id, optional body, extra fields merged into
/// JSON bodies (extra wins on collision; ignored for multipart).
#[derive(Debug, Default)]
pub struct UpdateRequest {
  pub id: Option<ResourceId>,
  pub body: Option<MutationBody>,
  pub extra: Map<String, Value>,
}

impl UpdateRequest {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn id(mut self, id: impl Into<ResourceId>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn body(mut self, body: MutationBody) -> Self {
    self.body = Some(body);
    self
  }

  pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
    self.extra.insert(key.into(), value);
    self
  }
}

/// Delete input: optional id, optional payload.
#[derive(Debug, Default)]
pub struct DeleteRequest {
  pub id: Option<ResourceId>,
  pub body: Option<MutationBody>,
}

impl DeleteRequest {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn id(mut self, id: impl Into<ResourceId>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn body(mut self, body: MutationBody) -> Self {
    self.body = Some(body);
    self
  }
}

/// Ordered set of path prefixes a successful mutation marks stale.
#[derive(Clone, Debug, Default)]
pub struct InvalidateKeys(Vec<String>);

impl InvalidateKeys {
  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl From<&str> for InvalidateKeys {
  fn from(v: &str) -> Self {
    InvalidateKeys(vec![v.to_string()])
  }
}

impl From<String> for InvalidateKeys {
  fn from(v: String) -> Self {
    InvalidateKeys(vec![v])
  }
}

impl From<Vec<String>> for InvalidateKeys {
  fn from(v: Vec<String>) -> Self {
    InvalidateKeys(v)
  }
}

impl From<Vec<&str>> for InvalidateKeys {
  fn from(v: Vec<&str>) -> Self {
    InvalidateKeys(v.into_iter().map(String::from).collect())
  }
}

impl<const N: usize> From<[&str; N]> for InvalidateKeys {
  fn from(v: [&str; N]) -> Self {
    InvalidateKeys(v.iter().map(|s| s.to_string()).collect())
  }
}

/// POST to a collection path.
///
/// Concurrent sends are independent - unlike fetches there is no
/// de-duplication, callers may deliberately fire overlapping creates.
pub struct CreateOp {
  pub(crate) http: HttpClient,
  pub(crate) cache: QueryCache,
  pub(crate) path: String,
  pub(crate) keys: InvalidateKeys,
}

impl CreateOp {
  pub async fn send(&self, body: MutationBody) -> Result<Value> {
    let result = dispatch(&self.http, Method::POST, &self.path, Some(body)).await;
    settle(result, &self.cache, &self.keys, &self.path, "create")
  }

  pub async fn send_as<T: DeserializeOwned>(&self, body: MutationBody) -> Result<T> {
    Ok(serde_json::from_value(self.send(body).await?)?)
  }
}

/// PUT to `path` or `path + id + "/"` (trailing slash required by the
/// backend routing convention).
pub struct UpdateOp {
  pub(crate) http: HttpClient,
  pub(crate) cache: QueryCache,
  pub(crate) path: String,
  pub(crate) keys: InvalidateKeys,
  pub(crate) id_required: bool,
}

impl UpdateOp {
  /// Fail with a validation error, before any network I/O, when the
  /// request carries no id.
  pub fn require_id(mut self) -> Self {
    self.id_required = true;
    self
  }

  pub async fn send(&self, request: UpdateRequest) -> Result<Value> {
    let result = self.dispatch_update(request).await;
    settle(result, &self.cache, &self.keys, &self.path, "update")
  }

  pub async fn send_as<T: DeserializeOwned>(&self, request: UpdateRequest) -> Result<T> {
    Ok(serde_json::from_value(self.send(request).await?)?)
  }

  async fn dispatch_update(&self, request: UpdateRequest) -> Result<Value> {
    let url = target_url(&self.path, request.id.as_ref(), self.id_required)?;
    let body = effective_body(request.body, request.extra)?;
    dispatch(&self.http, Method::PUT, &url, body).await
  }
}

/// DELETE to `path` or `path + id + "/"`.
///
/// A body, if present, is sent as the DELETE payload. Not every HTTP
/// intermediary forwards DELETE bodies; that is a known limitation of
/// the backend contract, not something this layer papers over.
pub struct DeleteOp {
  pub(crate) http: HttpClient,
  pub(crate) cache: QueryCache,
  pub(crate) path: String,
  pub(crate) keys: InvalidateKeys,
  pub(crate) id_required: bool,
}

impl DeleteOp {
  pub fn require_id(mut self) -> Self {
    self.id_required = true;
    self
  }

  pub async fn send(&self, request: DeleteRequest) -> Result<Value> {
    let result = self.dispatch_delete(request).await;
    settle(result, &self.cache, &self.keys, &self.path, "delete")
  }

  pub async fn send_as<T: DeserializeOwned>(&self, request: DeleteRequest) -> Result<T> {
    Ok(serde_json::from_value(self.send(request).await?)?)
  }

  async fn dispatch_delete(&self, request: DeleteRequest) -> Result<Value> {
    let url = target_url(&self.path, request.id.as_ref(), self.id_required)?;
    dispatch(&self.http, Method::DELETE, &url, request.body).await
  }
}

/// `path` when no id, else `path + id + "/"`.
fn target_url(path: &str, id: Option<&ResourceId>, id_required: bool) -> Result<String> {
  match id {
    Some(id) => Ok(format!("{}{}/", path, id)),
    None if id_required => Err(ApiError::Validation(format!(
      "mutation on {} requires an id",
      path
    ))),
    None => Ok(path.to_string()),
  }
}

/// Merge rule: extra fields fold into JSON object bodies, extra wins on
/// key collision. Multipart payloads are sent as-is.
fn effective_body(
  body: Option<MutationBody>,
  extra: Map<String, Value>,
) -> Result<Option<MutationBody>> {
  match (body, extra.is_empty()) {
    (Some(MutationBody::Multipart(fields)), _) => Ok(Some(MutationBody::Multipart(fields))),
    (Some(MutationBody::Json(value)), true) => Ok(Some(MutationBody::Json(value))),
    (Some(MutationBody::Json(value)), false) => match value {
      Value::Object(mut object) => {
        for (key, val) in extra {
          object.insert(key, val);
        }
        Ok(Some(MutationBody::Json(Value::Object(object))))
      }
      _ => Err(ApiError::Validation(
        "extra fields require a JSON object body".to_string(),
      )),
    },
    (None, false) => Ok(Some(MutationBody::Json(Value::Object(extra)))),
    (None, true) => Ok(None),
  }
}

async fn dispatch(
  http: &HttpClient,
  method: Method,
  url: &str,
  body: Option<MutationBody>,
) -> Result<Value> {
  match body {
    Some(MutationBody::Multipart(fields)) => http.send_multipart(method, url, &fields).await,
    Some(MutationBody::Json(value)) => http.send_json(method, url, Some(&value)).await,
    None => http.send_json(method, url, None).await,
  }
}

/// Invalidate in the order given, then hand the result back. Errors
/// invalidate nothing and are logged so they can never vanish silently.
fn settle(
  result: Result<Value>,
  cache: &QueryCache,
  keys: &InvalidateKeys,
  path: &str,
  op: &str,
) -> Result<Value> {
  match result {
    Ok(value) => {
      for key in keys.iter() {
        cache.invalidate_prefix(key);
      }
      Ok(value)
    }
    Err(err) => {
      tracing::warn!(path, op, error = %err, "mutation failed");
      Err(err)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn target_url_appends_id_with_trailing_slash() {
    let url = target_url("/faculties/manage/", Some(&ResourceId::Int(7)), false).unwrap();
    assert_eq!(url, "/faculties/manage/7/");

    let url = target_url("/galleries/manage/", Some(&"a1b2".into()), false).unwrap();
    assert_eq!(url, "/galleries/manage/a1b2/");
  }

  #[test]
  fn target_url_without_id_is_the_path() {
    let url = target_url("/settings/", None, false).unwrap();
    assert_eq!(url, "/settings/");
  }

  #[test]
  fn missing_required_id_fails_before_network() {
    let err = target_url("/faculties/manage/", None, true).expect_err("id is required");
    assert!(err.is_validation());
  }

  #[test]
  fn extra_fields_win_on_collision() {
    let body = MutationBody::Json(json!({ "status": true, "name": "x" }));
    let mut extra = Map::new();
    extra.insert("status".to_string(), json!(false));

    let merged = effective_body(Some(body), extra).unwrap();
    match merged {
      Some(MutationBody::Json(value)) => {
        assert_eq!(value, json!({ "status": false, "name": "x" }));
      }
      other => panic!("expected JSON body, got {:?}", other),
    }
  }

  #[test]
  fn multipart_body_ignores_extra_fields() {
    let body = MutationBody::Multipart(vec![MultipartField::text("title", "hello")]);
    let mut extra = Map::new();
    extra.insert("status".to_string(), json!(false));

    let merged = effective_body(Some(body), extra).unwrap();
    assert!(matches!(merged, Some(MutationBody::Multipart(ref f)) if f.len() == 1));
  }

  #[test]
  fn extra_fields_alone_become_the_body() {
    let mut extra = Map::new();
    extra.insert("status".to_string(), json!(true));

    let merged = effective_body(None, extra).unwrap();
    match merged {
      Some(MutationBody::Json(value)) => assert_eq!(value, json!({ "status": true })),
      other => panic!("expected JSON body, got {:?}", other),
    }
  }

  #[test]
  fn extra_fields_on_scalar_body_are_rejected() {
    let mut extra = Map::new();
    extra.insert("status".to_string(), json!(true));

    let err = effective_body(Some(MutationBody::Json(json!(42))), extra)
      .expect_err("scalar bodies cannot merge");
    assert!(err.is_validation());
  }

  #[test]
  fn invalidate_keys_accept_single_and_multiple() {
    let single: InvalidateKeys = "/faculties/list/".into();
    assert_eq!(single.iter().collect::<Vec<_>>(), vec!["/faculties/list/"]);

    let multiple: InvalidateKeys = ["/faculties/list/", "/faculties/stats/"].into();
    assert_eq!(multiple.iter().count(), 2);
  }
}
