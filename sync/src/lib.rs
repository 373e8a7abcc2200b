//! Incremental synchronization engine for the tally DAO-vote cache.
//!
//! The engine polls the chain gateway on a fixed period, discovers DAOs
//! and proposals, incrementally fetches voting transactions, computes
//! tallies, and republishes a consistent read-optimized snapshot:
//! - Discovers new entities behind monotonic cursors that never rewind
//! - Bounds concurrency against the rate-limited upstream
//! - Resumes multi-thousand-item collection scans from checkpoints
//! - Classifies proposals through a forward-only lifecycle
//! - Freezes finalized results after computing them exactly once
//! - Accumulates external validator voting rounds across cycles

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod priority;
pub mod rounds;
pub mod scanner;
pub mod task_loop;

pub use batch::{BatchExecutor, BatchOutcome, RetryPolicy};
pub use cache::{Cache, ProposalView, ServiceStatus, Snapshot};
pub use config::SyncConfig;
pub use error::SyncError;
pub use fetcher::Fetcher;
pub use logging::{init_logging, LogFormat};
pub use metrics::CacheMetrics;
pub use notify::Notifier;
pub use rounds::RoundTracker;
pub use scanner::NftScanner;
pub use task_loop::TaskLoop;
