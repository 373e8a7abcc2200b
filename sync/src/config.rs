//! Sync engine configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::batch::RetryPolicy;
use crate::SyncError;

/// Configuration for the cache service.
///
/// Can be loaded from a TOML file via [`SyncConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default so
/// a partial file works.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the chain indexing gateway.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Data directory for durable storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Seconds between sync cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Port for the read-only query API.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Registry page size for DAO discovery.
    #[serde(default = "default_dao_page_size")]
    pub dao_page_size: u32,

    /// Concurrent DAO state/metadata fetches per wave.
    #[serde(default = "default_dao_detail_batch")]
    pub dao_detail_batch_size: usize,

    /// Page size for per-DAO proposal discovery.
    #[serde(default = "default_proposal_page_size")]
    pub proposal_page_size: u32,

    /// Concurrent proposal metadata fetches per wave.
    #[serde(default = "default_proposal_metadata_batch")]
    pub proposal_metadata_batch_size: usize,

    /// Concurrent tally refreshes per wave.
    #[serde(default = "default_tally_batch")]
    pub tally_batch_size: usize,

    /// NFT items resolved per scan batch (also the checkpoint granularity).
    #[serde(default = "default_nft_item_batch")]
    pub nft_item_batch_size: usize,

    /// Hard ceiling on scan size, in batches. Larger collections are not
    /// scanned at all.
    #[serde(default = "default_max_scan_batches")]
    pub max_scan_batches: u64,

    /// Attempts per upstream item before it counts as failed.
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,

    /// Base backoff delay in milliseconds (doubles per attempt).
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_delay_ms: u64,

    /// Backoff cap in milliseconds.
    #[serde(default = "default_retry_max_ms")]
    pub retry_max_delay_ms: u64,

    /// URL of the plain-text DAO priority list; `None` disables ordering
    /// overrides.
    #[serde(default)]
    pub priority_list_url: Option<String>,

    /// Webhook URL for operational alerts; `None` disables notifications.
    #[serde(default)]
    pub notify_url: Option<String>,

    /// Environment tag prefixed to every alert message.
    #[serde(default = "default_env_name")]
    pub env_name: String,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_gateway_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./tally_data")
}

fn default_poll_interval() -> u64 {
    60
}

fn default_rpc_port() -> u16 {
    3000
}

fn default_dao_page_size() -> u32 {
    100
}

fn default_dao_detail_batch() -> usize {
    35
}

fn default_proposal_page_size() -> u32 {
    100
}

fn default_proposal_metadata_batch() -> usize {
    35
}

fn default_tally_batch() -> usize {
    50
}

fn default_nft_item_batch() -> usize {
    35
}

fn default_max_scan_batches() -> u64 {
    500
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    250
}

fn default_retry_max_ms() -> u64 {
    5_000
}

fn default_env_name() -> String {
    "dev".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SyncConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| tally_store::StoreError::Backend(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SyncError> {
        toml::from_str(s).map_err(|e| tally_store::StoreError::Serialization(e.to_string()).into())
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("SyncConfig is always serializable to TOML")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// The retry policy applied uniformly by every batch executor.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            data_dir: default_data_dir(),
            poll_interval_secs: default_poll_interval(),
            rpc_port: default_rpc_port(),
            dao_page_size: default_dao_page_size(),
            dao_detail_batch_size: default_dao_detail_batch(),
            proposal_page_size: default_proposal_page_size(),
            proposal_metadata_batch_size: default_proposal_metadata_batch(),
            tally_batch_size: default_tally_batch(),
            nft_item_batch_size: default_nft_item_batch(),
            max_scan_batches: default_max_scan_batches(),
            retry_max_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_ms(),
            retry_max_delay_ms: default_retry_max_ms(),
            priority_list_url: None,
            notify_url: None,
            env_name: default_env_name(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
