//! Prometheus metrics for the cache service.
//!
//! The [`CacheMetrics`] struct owns a dedicated [`Registry`] that the
//! query API's `/metrics` endpoint encodes into the Prometheus text
//! exposition format.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

/// Central collection of all sync-level Prometheus metrics.
pub struct CacheMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Sync cycles that completed and published a snapshot.
    pub cycles_completed: IntCounter,
    /// Sync cycles aborted by an unexpected error.
    pub cycles_failed: IntCounter,
    /// DAOs discovered since process start.
    pub daos_discovered: IntCounter,
    /// Proposals discovered since process start.
    pub proposals_discovered: IntCounter,
    /// Tally refreshes that fetched and recomputed voting data.
    pub tallies_refreshed: IntCounter,
    /// Completed NFT scan batches (checkpoint writes).
    pub scan_batches: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// DAOs currently in the published catalog.
    pub dao_count: IntGauge,
    /// Proposals currently in the published snapshot.
    pub proposal_count: IntGauge,
    /// Proposals currently classified active.
    pub active_count: IntGauge,
    /// Proposals currently classified ended.
    pub ended_count: IntGauge,
}

impl CacheMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let cycles_completed = register_int_counter_with_registry!(
            Opts::new("tally_cycles_completed_total", "Completed sync cycles"),
            registry
        )
        .expect("failed to register cycles_completed counter");

        let cycles_failed = register_int_counter_with_registry!(
            Opts::new("tally_cycles_failed_total", "Failed sync cycles"),
            registry
        )
        .expect("failed to register cycles_failed counter");

        let daos_discovered = register_int_counter_with_registry!(
            Opts::new("tally_daos_discovered_total", "DAOs discovered"),
            registry
        )
        .expect("failed to register daos_discovered counter");

        let proposals_discovered = register_int_counter_with_registry!(
            Opts::new("tally_proposals_discovered_total", "Proposals discovered"),
            registry
        )
        .expect("failed to register proposals_discovered counter");

        let tallies_refreshed = register_int_counter_with_registry!(
            Opts::new("tally_tallies_refreshed_total", "Voting data refreshes"),
            registry
        )
        .expect("failed to register tallies_refreshed counter");

        let scan_batches = register_int_counter_with_registry!(
            Opts::new("tally_scan_batches_total", "Completed NFT scan batches"),
            registry
        )
        .expect("failed to register scan_batches counter");

        let dao_count = register_int_gauge_with_registry!(
            Opts::new("tally_dao_count", "DAOs in the published catalog"),
            registry
        )
        .expect("failed to register dao_count gauge");

        let proposal_count = register_int_gauge_with_registry!(
            Opts::new("tally_proposal_count", "Proposals in the published snapshot"),
            registry
        )
        .expect("failed to register proposal_count gauge");

        let active_count = register_int_gauge_with_registry!(
            Opts::new("tally_active_proposals", "Currently active proposals"),
            registry
        )
        .expect("failed to register active_count gauge");

        let ended_count = register_int_gauge_with_registry!(
            Opts::new("tally_ended_proposals", "Currently ended proposals"),
            registry
        )
        .expect("failed to register ended_count gauge");

        Self {
            registry,
            cycles_completed,
            cycles_failed,
            daos_discovered,
            proposals_discovered,
            tallies_refreshed,
            scan_batches,
            dao_count,
            proposal_count,
            active_count,
            ended_count,
        }
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = CacheMetrics::new();
        assert_eq!(metrics.cycles_completed.get(), 0);
        metrics.cycles_completed.inc();
        assert_eq!(metrics.cycles_completed.get(), 1);
    }

    #[test]
    fn registry_gathers_all_families() {
        let metrics = CacheMetrics::new();
        metrics.dao_count.set(3);
        let families = metrics.registry.gather();
        assert!(families.iter().any(|f| f.get_name() == "tally_dao_count"));
    }
}
