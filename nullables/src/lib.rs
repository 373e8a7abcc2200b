//! Nullable infrastructure for deterministic testing.
//!
//! The sync engine's external dependencies — clock, chain gateway,
//! durable storage — are all behind traits. This crate provides
//! test-friendly implementations that return scripted values, can be
//! mutated programmatically mid-test, and never touch the filesystem or
//! network. Swap them in wherever a test needs a deterministic world.

pub mod chain;
pub mod clock;
pub mod store;

pub use chain::NullChain;
pub use clock::NullClock;
pub use store::NullStore;
