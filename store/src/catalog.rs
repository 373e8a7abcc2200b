//! DAO catalog storage trait.

use crate::StoreError;
use tally_types::DaoCatalog;

/// Persistence for the DAO catalog (one record for the whole catalog).
///
/// Written only when discovery actually added DAOs; read once at startup
/// to pre-warm the cache.
pub trait CatalogStore {
    /// Overwrite the stored catalog atomically.
    fn save_catalog(&self, catalog: &DaoCatalog) -> Result<(), StoreError>;

    /// Load the stored catalog; `None` on first startup.
    fn load_catalog(&self) -> Result<Option<DaoCatalog>, StoreError>;
}
