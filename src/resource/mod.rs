//! Resource operation factory: typed fetch/create/update/delete bound
//! to REST paths, wired to the query cache for invalidation.

mod client;
mod fetch;
mod mutation;

pub use client::ResourceClient;
pub use fetch::{FetchOptions, FetchQuery};
pub use mutation::{
  CreateOp, DeleteOp, DeleteRequest, InvalidateKeys, MutationBody, ResourceId, UpdateOp,
  UpdateRequest,
};
