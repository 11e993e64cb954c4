//! Data-access core for the Backdesk admin console.
//!
//! Everything an admin screen needs to talk to the REST backend lives
//! here: an HTTP adapter that carries the bearer token and handles
//! session expiry, a resource operation factory producing typed
//! fetch/create/update/delete operations, the query cache those
//! operations share, and the listing-page state machinery (debounced
//! search, pagination, page windows).
//!
//! # Example
//!
//! ```ignore
//! let config = Config::load(None)?;
//! let tokens = Arc::new(FileTokenStore::open()?);
//! let http = HttpClient::new(&config, tokens)?;
//! let client = ResourceClient::new(http, QueryCache::from_config(&config));
//!
//! // A listing page binds its state to a fetch operation:
//! let mut list = ListState::new(&config.list);
//! let mut query = client.fetch::<FacultyPage>(
//!     "/faculties/list/",
//!     list.query_params(),
//!     FetchOptions::default(),
//! );
//!
//! // A form page mutates and lets invalidation refresh the list:
//! client
//!     .create("/faculties/create/", "/faculties/list/")
//!     .send(MutationBody::json(&new_faculty)?)
//!     .await?;
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod list;
pub mod resource;

pub use auth::{FileTokenStore, MemoryTokenStore, TokenStore, TOKEN_KEY};
pub use cache::{params, ParamValue, Params, QueryCache, QueryKey, QuerySnapshot, QueryStatus};
pub use config::{ApiConfig, CacheConfig, Config, ListConfig, BASE_URL_ENV};
pub use error::{ApiError, Result};
pub use http::{HttpClient, MultipartField, MultipartValue, SessionState};
pub use list::{DebouncedInput, ListPhase, ListState, PageItem, Pager};
pub use resource::{
  CreateOp, DeleteOp, DeleteRequest, FetchOptions, FetchQuery, InvalidateKeys, MutationBody,
  ResourceClient, ResourceId, UpdateOp, UpdateRequest,
};
