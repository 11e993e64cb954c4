//! Query cache layer: descriptor-keyed entries with request
//! de-duplication and path-prefix invalidation.
//!
//! - Entries are keyed by [`QueryKey`] (path + order-independent params)
//! - Concurrent observers of one key share one in-flight request
//! - Mutations invalidate by path prefix; observed entries refetch
//! - Unobserved entries are garbage-collected after idling

mod key;
mod store;

pub use key::{params, ParamValue, Params, QueryKey};
pub use store::{FetchFuture, Fetcher, QueryCache, QuerySnapshot, QueryStatus};
