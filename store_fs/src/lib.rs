//! Filesystem storage backend for the tally cache.
//!
//! Implements the `tally-store` traits with one JSON file per record
//! under a single data directory:
//!
//! ```text
//! <root>/daos.json                 — the whole DAO catalog
//! <root>/proposals/<address>.json  — one file per ended proposal
//! <root>/checkpoints/<key>.json    — in-flight scan checkpoints
//! ```
//!
//! Writes are atomic at the whole-file level: content goes to a
//! temporary file in the same directory, then a rename replaces the
//! target. The directory tree is created on first startup.

mod fs_store;

pub use fs_store::FsStore;
