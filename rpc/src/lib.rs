//! Read-only query API over the tally cache.
//!
//! Every endpoint is a plain lookup against the published cache
//! snapshot — no business logic lives here. Unknown keys return empty
//! JSON objects rather than errors, and the API keeps serving the last
//! successfully published snapshot while the sync engine is degraded.

pub mod server;

pub use server::RpcServer;
