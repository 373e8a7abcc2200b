//! File-per-record JSON store.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tally_store::{CatalogStore, CheckpointStore, ProposalStore, StoreError};
use tally_types::{Address, DaoCatalog, Proposal, ScanCheckpoint};

const CATALOG_FILE: &str = "daos.json";
const PROPOSALS_DIR: &str = "proposals";
const CHECKPOINTS_DIR: &str = "checkpoints";

/// Filesystem-backed implementation of all storage traits.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) the data directory layout at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(root.join(PROPOSALS_DIR)).map_err(io_err)?;
        fs::create_dir_all(root.join(CHECKPOINTS_DIR)).map_err(io_err)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn proposal_path(&self, address: &Address) -> PathBuf {
        self.root
            .join(PROPOSALS_DIR)
            .join(format!("{}.json", safe_file_name(address.as_str())))
    }

    fn checkpoint_path(&self, key: &str) -> PathBuf {
        self.root
            .join(CHECKPOINTS_DIR)
            .join(format!("{}.json", safe_file_name(key)))
    }

    /// Serialize `value` to `path` via a temp file + rename so readers
    /// never observe a partially written record.
    fn write_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Serialization(format!("{}: {e}", path.display())))
    }
}

impl CatalogStore for FsStore {
    fn save_catalog(&self, catalog: &DaoCatalog) -> Result<(), StoreError> {
        self.write_atomic(&self.root.join(CATALOG_FILE), catalog)
    }

    fn load_catalog(&self) -> Result<Option<DaoCatalog>, StoreError> {
        self.read_json(&self.root.join(CATALOG_FILE))
    }
}

impl ProposalStore for FsStore {
    fn save_proposal(&self, proposal: &Proposal) -> Result<(), StoreError> {
        self.write_atomic(&self.proposal_path(&proposal.address), proposal)
    }

    fn load_proposal(&self, address: &Address) -> Result<Option<Proposal>, StoreError> {
        self.read_json(&self.proposal_path(address))
    }

    fn load_all_proposals(&self) -> Result<Vec<Proposal>, StoreError> {
        let dir = self.root.join(PROPOSALS_DIR);
        let mut proposals = Vec::new();
        for entry in fs::read_dir(&dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_json::<Proposal>(&path)? {
                Some(proposal) => proposals.push(proposal),
                None => tracing::warn!(path = %path.display(), "proposal file vanished mid-scan"),
            }
        }
        Ok(proposals)
    }
}

impl CheckpointStore for FsStore {
    fn save_checkpoint(&self, key: &str, checkpoint: &ScanCheckpoint) -> Result<(), StoreError> {
        self.write_atomic(&self.checkpoint_path(key), checkpoint)
    }

    fn load_checkpoint(&self, key: &str) -> Result<Option<ScanCheckpoint>, StoreError> {
        self.read_json(&self.checkpoint_path(key))
    }

    fn delete_checkpoint(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.checkpoint_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(e)),
        }
    }
}

fn io_err(e: std::io::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Addresses are opaque strings; anything outside a conservative set is
/// percent-escaped so a key can never traverse out of the data directory.
fn safe_file_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            out.push(c);
        } else {
            out.push('%');
            out.push_str(&format!("{:02X}", c as u32));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tally_types::{
        Ballot, Dao, DaoMetadata, DaoRoles, MetadataArgs, ProposalMetadata, TallyResult,
        Timestamp, TxHistory, TxRecord, VoteChoice, VotingData, Weight,
    };

    fn store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsStore::open(dir.path()).expect("open");
        (dir, store)
    }

    fn sample_proposal() -> Proposal {
        let mut voting_power = BTreeMap::new();
        voting_power.insert(
            Address::new("voter-1"),
            Weight::new(1_152_921_504_606_846_800),
        );
        let mut votes = BTreeMap::new();
        votes.insert(
            Address::new("voter-1"),
            Ballot {
                choice: VoteChoice::Yes,
                timestamp: Timestamp::new(150),
            },
        );
        Proposal {
            dao_address: Address::new("EQDao"),
            address: Address::new("EQProp/with+odd=chars"),
            metadata: ProposalMetadata {
                id: 9,
                start_time: Timestamp::new(100),
                end_time: Timestamp::new(200),
                snapshot_block: 31337,
                voting_power_strategies: Vec::new(),
            },
            voting_data: Some(VotingData {
                tx_data: TxHistory {
                    transactions: vec![TxRecord {
                        voter: Address::new("voter-1"),
                        logical_time: 42,
                        timestamp: Timestamp::new(150),
                        body: "yes".into(),
                    }],
                    cursor: Some(42),
                },
                voting_power,
                votes,
                result: TallyResult {
                    yes: Weight::new(1_152_921_504_606_846_800),
                    no: Weight::ZERO,
                    abstain: Weight::ZERO,
                    total_weight: Weight::new(1_152_921_504_606_846_800),
                },
            }),
            fetch_error: None,
        }
    }

    #[test]
    fn proposal_round_trip_preserves_big_numbers() {
        let (_dir, store) = store();
        let proposal = sample_proposal();
        store.save_proposal(&proposal).unwrap();

        let loaded = store.load_proposal(&proposal.address).unwrap().unwrap();
        assert_eq!(loaded, proposal);
        // The on-disk form carries the tagged BigInt encoding.
        let raw = fs::read_to_string(store.proposal_path(&proposal.address)).unwrap();
        assert!(raw.contains("\"BigInt\""));
        assert!(raw.contains("1152921504606846800"));
    }

    #[test]
    fn load_all_returns_every_saved_proposal() {
        let (_dir, store) = store();
        let mut a = sample_proposal();
        a.address = Address::new("prop-a");
        let mut b = sample_proposal();
        b.address = Address::new("prop-b");
        store.save_proposal(&a).unwrap();
        store.save_proposal(&b).unwrap();

        let mut all = store.load_all_proposals().unwrap();
        all.sort_by(|x, y| x.address.cmp(&y.address));
        assert_eq!(all, vec![a, b]);
    }

    #[test]
    fn missing_records_are_none_not_errors() {
        let (_dir, store) = store();
        assert!(store.load_catalog().unwrap().is_none());
        assert!(store
            .load_proposal(&Address::new("nothing"))
            .unwrap()
            .is_none());
        assert!(store.load_checkpoint("nothing").unwrap().is_none());
        store.delete_checkpoint("nothing").unwrap();
    }

    #[test]
    fn catalog_round_trip() {
        let (_dir, store) = store();
        let mut catalog = DaoCatalog::new();
        catalog.insert(Dao {
            address: Address::new("EQDao"),
            dao_id: 0,
            metadata: DaoMetadata {
                metadata_address: Address::new("EQMeta"),
                args: MetadataArgs {
                    name: Some("Example DAO".into()),
                    ..MetadataArgs::default()
                },
            },
            roles: DaoRoles {
                owner: Address::new("EQOwner"),
                proposal_owner: Address::new("EQPropOwner"),
            },
            next_proposal_cursor: 3,
            proposals: vec![Address::new("p1"), Address::new("p0")],
        });
        catalog.advance_cursor(1);
        store.save_catalog(&catalog).unwrap();

        let loaded = store.load_catalog().unwrap().unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn checkpoint_lifecycle() {
        let (_dir, store) = store();
        let mut checkpoint = ScanCheckpoint::default();
        checkpoint.next_batch = 4;
        checkpoint
            .holders
            .entry(Address::new("holder"))
            .or_default()
            .push(11);

        store.save_checkpoint("EQProp", &checkpoint).unwrap();
        assert_eq!(store.load_checkpoint("EQProp").unwrap().unwrap(), checkpoint);

        // Overwrite replaces the whole record.
        checkpoint.next_batch = 5;
        store.save_checkpoint("EQProp", &checkpoint).unwrap();
        assert_eq!(
            store.load_checkpoint("EQProp").unwrap().unwrap().next_batch,
            5
        );

        store.delete_checkpoint("EQProp").unwrap();
        assert!(store.load_checkpoint("EQProp").unwrap().is_none());
    }

    #[test]
    fn file_names_are_escaped() {
        assert_eq!(safe_file_name("a-b_c.9"), "a-b_c.9");
        assert_eq!(safe_file_name("a/b"), "a%2Fb");
        assert_eq!(safe_file_name(".."), "..");
        // Escaping is stable: the same key always maps to the same file.
        assert_eq!(safe_file_name("x+y=z"), safe_file_name("x+y=z"));
    }
}
