//! Query descriptors and their cache keys.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// A primitive query-string value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamValue {
  Str(String),
  Int(i64),
  Bool(bool),
}

impl fmt::Display for ParamValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParamValue::Str(s) => f.write_str(s),
      ParamValue::Int(i) => write!(f, "{}", i),
      ParamValue::Bool(b) => write!(f, "{}", b),
    }
  }
}

impl From<&str> for ParamValue {
  fn from(v: &str) -> Self {
    ParamValue::Str(v.to_string())
  }
}

impl From<String> for ParamValue {
  fn from(v: String) -> Self {
    ParamValue::Str(v)
  }
}

impl From<i64> for ParamValue {
  fn from(v: i64) -> Self {
    ParamValue::Int(v)
  }
}

impl From<u32> for ParamValue {
  fn from(v: u32) -> Self {
    ParamValue::Int(v as i64)
  }
}

impl From<bool> for ParamValue {
  fn from(v: bool) -> Self {
    ParamValue::Bool(v)
  }
}

/// Flat query-parameter mapping. The BTreeMap makes the serialized form
/// independent of insertion order, which is what keeps equivalent
/// descriptors on one cache entry.
pub type Params = BTreeMap<String, ParamValue>;

/// Build a param map from key/value pairs.
pub fn params<V: Into<ParamValue>>(pairs: impl IntoIterator<Item = (&'static str, V)>) -> Params {
  pairs
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.into()))
    .collect()
}

/// A resource path plus its query parameters. Two keys with the same
/// path and the same param set are the same cache entry, whatever order
/// the params were supplied in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryKey {
  pub path: String,
  pub params: Params,
}

impl QueryKey {
  pub fn new(path: impl Into<String>, params: Params) -> Self {
    Self {
      path: path.into(),
      params,
    }
  }

  /// Canonical text form, e.g. `/faculties/list/?page=1&search=ab`.
  pub fn canonical(&self) -> String {
    if self.params.is_empty() {
      return self.path.clone();
    }

    let query: Vec<String> = self
      .params
      .iter()
      .map(|(k, v)| format!("{}={}", k, v))
      .collect();

    format!("{}?{}", self.path, query.join("&"))
  }

  /// SHA256 hash of the canonical form, for stable fixed-length keys.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.canonical().as_bytes());
    hex::encode(hasher.finalize())
  }
}
