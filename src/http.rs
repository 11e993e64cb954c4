//! HTTP client adapter.
//!
//! Wraps `reqwest` with the API base URL, attaches the bearer token from
//! the [`TokenStore`] before every request, and turns a 401 into a
//! cleared token plus a session-expired broadcast. The original error
//! still propagates to the caller; the shell decides how to navigate.

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

use crate::auth::TokenStore;
use crate::cache::Params;
use crate::config::Config;
use crate::error::{ApiError, Result};

/// Session lifecycle observed by the shell. `Expired` carries the
/// client-side path to navigate to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
  Active,
  Expired { login_path: String },
}

/// One part of a multipart upload.
#[derive(Clone, Debug)]
pub struct MultipartField {
  pub name: String,
  pub value: MultipartValue,
}

#[derive(Clone, Debug)]
pub enum MultipartValue {
  Text(String),
  File {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
  },
}

impl MultipartField {
  pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      value: MultipartValue::Text(value.into()),
    }
  }

  pub fn file(
    name: impl Into<String>,
    filename: impl Into<String>,
    content_type: impl Into<String>,
    bytes: Vec<u8>,
  ) -> Self {
    Self {
      name: name.into(),
      value: MultipartValue::File {
        filename: filename.into(),
        content_type: content_type.into(),
        bytes,
      },
    }
  }
}

/// HTTP adapter shared by every resource operation. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
  client: reqwest::Client,
  base: Url,
  tokens: Arc<dyn TokenStore>,
  session: Arc<watch::Sender<SessionState>>,
  login_path: String,
}

impl HttpClient {
  pub fn new(config: &Config, tokens: Arc<dyn TokenStore>) -> Result<Self> {
    // A trailing slash makes Url::join append resource paths instead of
    // replacing the last segment.
    let mut base_url = config.api.base_url.clone();
    if !base_url.ends_with('/') {
      base_url.push('/');
    }

    let base = Url::parse(&base_url)
      .map_err(|e| ApiError::Config(format!("Invalid base URL {}: {}", base_url, e)))?;

    let (session, _) = watch::channel(SessionState::Active);

    Ok(Self {
      client: reqwest::Client::new(),
      base,
      tokens,
      session: Arc::new(session),
      login_path: config.api.login_path.clone(),
    })
  }

  /// Observe session transitions (401 flips the state to `Expired`).
  pub fn session(&self) -> watch::Receiver<SessionState> {
    self.session.subscribe()
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  /// GET a JSON document.
  pub async fn get_json(&self, path: &str, params: &Params) -> Result<Value> {
    let url = self.url(path, params)?;
    let response = self.execute(self.client.get(url)).await?;
    Self::into_json(response).await
  }

  /// GET a plain-text document (CSV exports).
  pub async fn get_text(&self, path: &str, params: &Params) -> Result<String> {
    let url = self.url(path, params)?;
    let response = self.execute(self.client.get(url)).await?;
    response.text().await.map_err(ApiError::from_reqwest)
  }

  /// Send a JSON-encoded mutation. `body: None` sends no payload.
  pub async fn send_json(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
    let url = self.url(path, &Params::new())?;
    let mut builder = self.client.request(method, url);
    if let Some(body) = body {
      builder = builder.json(body);
    }
    let response = self.execute(builder).await?;
    Self::into_json(response).await
  }

  /// Send a multipart-encoded mutation (file uploads).
  pub async fn send_multipart(
    &self,
    method: Method,
    path: &str,
    fields: &[MultipartField],
  ) -> Result<Value> {
    let url = self.url(path, &Params::new())?;
    let form = Self::build_form(fields)?;
    let builder = self.client.request(method, url).multipart(form);
    let response = self.execute(builder).await?;
    Self::into_json(response).await
  }

  fn url(&self, path: &str, params: &Params) -> Result<Url> {
    let mut url = self
      .base
      .join(path.trim_start_matches('/'))
      .map_err(|e| ApiError::Validation(format!("Invalid resource path {}: {}", path, e)))?;

    if !params.is_empty() {
      let mut pairs = url.query_pairs_mut();
      for (key, value) in params {
        pairs.append_pair(key, &value.to_string());
      }
    }

    Ok(url)
  }

  fn build_form(fields: &[MultipartField]) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();

    for field in fields {
      form = match &field.value {
        MultipartValue::Text(text) => form.text(field.name.clone(), text.clone()),
        MultipartValue::File {
          filename,
          content_type,
          bytes,
        } => {
          let part = reqwest::multipart::Part::bytes(bytes.clone())
            .file_name(filename.clone())
            .mime_str(content_type)
            .map_err(|e| {
              ApiError::Validation(format!("Invalid content type {}: {}", content_type, e))
            })?;
          form.part(field.name.clone(), part)
        }
      };
    }

    Ok(form)
  }

  /// Attach the bearer token, send, and classify the outcome.
  async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
    let builder = match self.tokens.get()? {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    };

    let response = builder.send().await.map_err(ApiError::from_reqwest)?;
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
      self.expire_session();
    }

    if !status.is_success() {
      let message = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
      let text = response.text().await.unwrap_or_default();
      let body = if text.is_empty() {
        None
      } else {
        serde_json::from_str(&text).ok()
      };

      return Err(ApiError::Http {
        status: status.as_u16(),
        message,
        body,
      });
    }

    Ok(response)
  }

  /// 401 received: the stored token is dead. Clear it and tell the
  /// shell to navigate to the login path. The error itself still
  /// propagates - callers must not assume recovery.
  fn expire_session(&self) {
    tracing::warn!("session expired (401), clearing stored token");

    if let Err(err) = self.tokens.clear() {
      tracing::warn!(error = %err, "failed to clear stored token");
    }

    self.session.send_replace(SessionState::Expired {
      login_path: self.login_path.clone(),
    });
  }

  async fn into_json(response: Response) -> Result<Value> {
    let text = response.text().await.map_err(ApiError::from_reqwest)?;
    if text.is_empty() {
      return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::MemoryTokenStore;
  use crate::cache::{params, ParamValue};

  fn test_config(base_url: &str) -> Config {
    serde_yaml::from_str(&format!("api:\n  base_url: {}\n", base_url))
      .expect("test config parses")
  }

  #[tokio::test]
  async fn attaches_bearer_token_when_present() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/faculties/list/")
      .match_header("authorization", "Bearer tok-123")
      .with_body(r#"{"results": []}"#)
      .create_async()
      .await;

    let tokens = Arc::new(MemoryTokenStore::with_token("tok-123"));
    let http = HttpClient::new(&test_config(&server.url()), tokens).unwrap();

    http.get_json("/faculties/list/", &Params::new()).await.unwrap();
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn proceeds_unauthenticated_without_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/faculties/list/")
      .match_header("authorization", mockito::Matcher::Missing)
      .with_body(r#"{"results": []}"#)
      .create_async()
      .await;

    let http = HttpClient::new(&test_config(&server.url()), Arc::new(MemoryTokenStore::new())).unwrap();

    http.get_json("/faculties/list/", &Params::new()).await.unwrap();
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn unauthorized_clears_token_and_expires_session() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/faculties/list/")
      .with_status(401)
      .create_async()
      .await;

    let tokens = Arc::new(MemoryTokenStore::with_token("stale-token"));
    let http = HttpClient::new(&test_config(&server.url()), tokens.clone()).unwrap();
    let session = http.session();

    let err = http
      .get_json("/faculties/list/", &Params::new())
      .await
      .expect_err("401 must propagate");

    assert_eq!(err.status(), Some(401));
    assert_eq!(tokens.get().unwrap(), None);
    assert_eq!(
      *session.borrow(),
      SessionState::Expired {
        login_path: "/login".to_string()
      }
    );
  }

  #[tokio::test]
  async fn server_errors_carry_status_and_body() {
    let mut server = mockito::Server::new_async().await;
    server
      .mock("GET", "/courses/list/")
      .with_status(422)
      .with_body(r#"{"detail": "bad filter"}"#)
      .create_async()
      .await;

    let http = HttpClient::new(&test_config(&server.url()), Arc::new(MemoryTokenStore::new())).unwrap();

    let err = http
      .get_json("/courses/list/", &Params::new())
      .await
      .expect_err("422 must propagate");

    match err {
      ApiError::Http { status, body, .. } => {
        assert_eq!(status, 422);
        assert_eq!(body.unwrap()["detail"], "bad filter");
      }
      other => panic!("expected Http error, got {:?}", other),
    }
  }

  #[tokio::test]
  async fn query_params_are_appended() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/students/list/")
      .match_query(mockito::Matcher::AllOf(vec![
        mockito::Matcher::UrlEncoded("page".into(), "2".into()),
        mockito::Matcher::UrlEncoded("search".into(), "ana".into()),
      ]))
      .with_body("[]")
      .create_async()
      .await;

    let http = HttpClient::new(&test_config(&server.url()), Arc::new(MemoryTokenStore::new())).unwrap();

    let page_params = params([
      ("page", ParamValue::Int(2)),
      ("search", ParamValue::Str("ana".into())),
    ]);
    http.get_json("/students/list/", &page_params).await.unwrap();
    mock.assert_async().await;
  }
}
