//! DAO records and the ordered DAO catalog.

use crate::address::Address;
use serde::{Deserialize, Serialize};

/// Free-form descriptive metadata published by a DAO on chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    /// DAOs can ask to be hidden from public listings.
    #[serde(default)]
    pub hide: bool,
}

/// Where a DAO's metadata lives and what it said last time we read it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoMetadata {
    pub metadata_address: Address,
    pub args: MetadataArgs,
}

/// The two privileged roles a DAO contract exposes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoRoles {
    pub owner: Address,
    pub proposal_owner: Address,
}

/// A discovered DAO. Never deleted; metadata and roles are overwritten in
/// place when the chain state drifts, and the proposal list only grows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dao {
    pub address: Address,
    /// Numeric id assigned by the upstream registry; used for stable ordering.
    pub dao_id: u64,
    pub metadata: DaoMetadata,
    pub roles: DaoRoles,
    /// Discovery cursor for this DAO's proposal list. Non-decreasing.
    pub next_proposal_cursor: u64,
    /// Known proposal addresses, newest batches appended last, each batch
    /// internally ordered by descending on-chain proposal id.
    pub proposals: Vec<Address>,
}

/// The ordered catalog of all discovered DAOs.
///
/// In memory the catalog keeps an explicit order: priority-listed DAOs
/// first, then the rest by ascending `dao_id`. On disk it is a plain map
/// keyed by address; order is rebuilt from `dao_id` at load time and the
/// priority overlay is reapplied on the next sync cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoCatalog {
    /// Registry discovery cursor. Monotonically non-decreasing; advances
    /// only after a whole discovery batch has been fetched and inserted.
    pub next_dao_id: u64,
    #[serde(with = "dao_map")]
    daos: Vec<Dao>,
}

impl DaoCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.daos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daos.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.get(address).is_some()
    }

    pub fn get(&self, address: &Address) -> Option<&Dao> {
        self.daos.iter().find(|d| &d.address == address)
    }

    pub fn get_mut(&mut self, address: &Address) -> Option<&mut Dao> {
        self.daos.iter_mut().find(|d| &d.address == address)
    }

    /// Insert a DAO, replacing any existing record at the same address.
    pub fn insert(&mut self, dao: Dao) {
        match self.get_mut(&dao.address) {
            Some(existing) => *existing = dao,
            None => self.daos.push(dao),
        }
    }

    /// All DAOs in catalog order.
    pub fn daos(&self) -> &[Dao] {
        &self.daos
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Dao> {
        self.daos.iter_mut()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.daos.iter().map(|d| d.address.clone()).collect()
    }

    /// Advance the registry cursor. The cursor never moves backward.
    pub fn advance_cursor(&mut self, to: u64) {
        self.next_dao_id = self.next_dao_id.max(to);
    }

    /// Sort the catalog by ascending registry id.
    pub fn sort_by_dao_id(&mut self) {
        self.daos.sort_by_key(|d| d.dao_id);
    }

    /// Reorder so that addresses named in `priority` come first (in list
    /// order), with all remaining DAOs after them in their current
    /// relative order. Unknown priority entries are ignored.
    pub fn apply_priority(&mut self, priority: &[Address]) {
        if priority.is_empty() {
            return;
        }
        let mut front = Vec::new();
        for wanted in priority {
            if let Some(pos) = self.daos.iter().position(|d| &d.address == wanted) {
                front.push(self.daos.remove(pos));
            }
        }
        front.append(&mut self.daos);
        self.daos = front;
    }
}

/// On-disk representation of the DAO list: an object keyed by address.
mod dao_map {
    use super::Dao;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(daos: &[Dao], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(daos.len()))?;
        for dao in daos {
            map.serialize_entry(dao.address.as_str(), dao)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Dao>, D::Error> {
        let map: BTreeMap<String, Dao> = Deserialize::deserialize(deserializer)?;
        let mut daos: Vec<Dao> = map.into_values().collect();
        daos.sort_by_key(|d| d.dao_id);
        Ok(daos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dao(addr: &str, id: u64) -> Dao {
        Dao {
            address: Address::new(addr),
            dao_id: id,
            metadata: DaoMetadata {
                metadata_address: Address::new(format!("meta-{addr}")),
                args: MetadataArgs::default(),
            },
            roles: DaoRoles {
                owner: Address::new("owner"),
                proposal_owner: Address::new("powner"),
            },
            next_proposal_cursor: 0,
            proposals: Vec::new(),
        }
    }

    #[test]
    fn insert_replaces_existing_address() {
        let mut catalog = DaoCatalog::new();
        catalog.insert(dao("a", 0));
        let mut updated = dao("a", 0);
        updated.next_proposal_cursor = 7;
        catalog.insert(updated);
        assert_eq!(catalog.len(), 1);
        assert_eq!(
            catalog.get(&Address::new("a")).unwrap().next_proposal_cursor,
            7
        );
    }

    #[test]
    fn cursor_never_rewinds() {
        let mut catalog = DaoCatalog::new();
        catalog.advance_cursor(10);
        catalog.advance_cursor(4);
        assert_eq!(catalog.next_dao_id, 10);
    }

    #[test]
    fn priority_order_listed_first_rest_keep_order() {
        let mut catalog = DaoCatalog::new();
        for (addr, id) in [("a", 0), ("b", 1), ("c", 2), ("d", 3)] {
            catalog.insert(dao(addr, id));
        }
        catalog.apply_priority(&[Address::new("c"), Address::new("missing"), Address::new("a")]);
        let order: Vec<&str> = catalog.daos().iter().map(|d| d.address.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn serde_flattens_daos_to_object_keyed_by_address() {
        let mut catalog = DaoCatalog::new();
        catalog.insert(dao("b", 1));
        catalog.insert(dao("a", 0));
        catalog.advance_cursor(2);

        let json = serde_json::to_value(&catalog).unwrap();
        assert!(json["daos"]["a"].is_object());
        assert!(json["daos"]["b"].is_object());

        let back: DaoCatalog = serde_json::from_value(json).unwrap();
        assert_eq!(back.next_dao_id, 2);
        // Order is rebuilt by ascending dao id at load.
        let order: Vec<&str> = back.daos().iter().map(|d| d.address.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }
}
