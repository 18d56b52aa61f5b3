use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Identifier of the replica whose dump a record came from.
pub type ReplicaId = u32;

/// Single transfer carried by a block. Fields absent from the dump are
/// explicit optionals rather than implicit empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
	#[serde(default)]
	pub from: Option<String>,
	#[serde(default)]
	pub to: Option<String>,
	#[serde(default)]
	pub value: f64,
	/// Milliseconds since the Unix epoch, 0 when the dump carries none.
	#[serde(default)]
	pub timestamp: i64,
}

impl Transaction {
	/// A transfer with neither sender nor receiver is padding and is
	/// skipped in the rendered detail rows.
	pub fn is_visible(&self) -> bool {
		let filled = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.is_empty());
		filled(&self.from) || filled(&self.to)
	}
}

/// Normalized in-memory representation of one ledger block, independent
/// of the JSON dump it was parsed from. An empty `hash` marks the
/// genesis block of its source chain.
#[derive(Debug, Clone)]
pub struct BlockRecord {
	pub source: ReplicaId,
	pub height: u64,
	pub hash: String,
	pub parent_hash: String,
	pub view: i64,
	pub transactions: Vec<Transaction>,
	pub committed: bool,
}

impl BlockRecord {
	pub fn tx_count(&self) -> usize {
		self.transactions.len()
	}
}

/// Identity of a logical block. Real blocks are keyed by their hash;
/// genesis blocks carry no hash and get a structural marker instead,
/// tagged so that a committed root and a received-only root at the same
/// height never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockKey {
	Hash(String),
	Genesis { height: u64, received: bool },
}

impl BlockKey {
	pub fn from_record(record: &BlockRecord) -> Self {
		if record.hash.is_empty() {
			BlockKey::Genesis {
				height: record.height,
				received: !record.committed,
			}
		} else {
			BlockKey::Hash(record.hash.clone())
		}
	}

	/// Key of the parent block, or `None` for a true root. A missing
	/// parent hash above height zero resolves to the committed genesis
	/// marker of the level below, for both committed and received
	/// records.
	pub fn parent_of(record: &BlockRecord) -> Option<Self> {
		if !record.parent_hash.is_empty() {
			Some(BlockKey::Hash(record.parent_hash.clone()))
		} else if record.height > 0 {
			Some(BlockKey::Genesis {
				height: record.height - 1,
				received: false,
			})
		} else {
			None
		}
	}

	/// Abbreviated form for diagnostics.
	pub fn short(&self) -> String {
		match self {
			BlockKey::Hash(hash) => hash.chars().take(12).collect(),
			BlockKey::Genesis {
				height,
				received: false,
			} => format!("genesis_{height}"),
			BlockKey::Genesis {
				height,
				received: true,
			} => format!("genesis_received_{height}"),
		}
	}
}

impl Display for BlockKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.short())
	}
}

/// One logical block after deduplication: the first record observed for
/// its key plus the merged set of replicas that reported it. Once a key
/// has been seen committed it stays committed, a later received record
/// for the same key cannot demote it.
#[derive(Debug, Clone)]
pub struct UniqueBlock {
	pub record: BlockRecord,
	pub sources: Vec<ReplicaId>,
	pub committed: bool,
}

impl UniqueBlock {
	pub fn new(record: BlockRecord) -> Self {
		let committed = record.committed;
		let sources = vec![record.source];
		Self {
			record,
			sources,
			committed,
		}
	}

	pub fn add_source(&mut self, source: ReplicaId) {
		if let Err(slot) = self.sources.binary_search(&source) {
			self.sources.insert(slot, source);
		}
	}
}

pub mod tracing_level_format {
	use serde::{self, Deserialize, Deserializer, Serializer};
	use std::str::FromStr;
	use tracing::Level;

	pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&level.to_string())
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		Level::from_str(&value).map_err(serde::de::Error::custom)
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use test_case::test_case;

	pub(crate) fn record(
		source: ReplicaId,
		height: u64,
		hash: &str,
		parent_hash: &str,
		committed: bool,
	) -> BlockRecord {
		BlockRecord {
			source,
			height,
			hash: hash.to_string(),
			parent_hash: parent_hash.to_string(),
			view: height as i64,
			transactions: vec![],
			committed,
		}
	}

	#[test]
	fn hashed_records_are_keyed_by_hash() {
		let key = BlockKey::from_record(&record(0, 3, "abc123", "def456", true));
		assert_eq!(key, BlockKey::Hash("abc123".to_string()));
	}

	#[test_case(true, false; "committed genesis")]
	#[test_case(false, true; "received genesis")]
	fn genesis_records_are_keyed_by_height_and_tag(committed: bool, received: bool) {
		let key = BlockKey::from_record(&record(0, 0, "", "", committed));
		assert_eq!(
			key,
			BlockKey::Genesis {
				height: 0,
				received
			}
		);
	}

	#[test]
	fn parent_falls_back_to_committed_genesis_marker() {
		let parent = BlockKey::parent_of(&record(0, 1, "abc", "", false));
		assert_eq!(
			parent,
			Some(BlockKey::Genesis {
				height: 0,
				received: false
			})
		);
		assert_eq!(BlockKey::parent_of(&record(0, 0, "", "", true)), None);
	}

	#[test]
	fn merged_sources_stay_sorted_and_unique() {
		let mut block = UniqueBlock::new(record(2, 1, "abc", "", true));
		block.add_source(0);
		block.add_source(2);
		block.add_source(1);
		assert_eq!(block.sources, vec![0, 1, 2]);
	}

	#[test]
	fn abbreviated_keys() {
		let key = BlockKey::Hash("0123456789abcdef".to_string());
		assert_eq!(key.short(), "0123456789ab");
		let genesis = BlockKey::Genesis {
			height: 4,
			received: true,
		};
		assert_eq!(genesis.short(), "genesis_received_4");
	}

	#[test]
	fn transaction_visibility_ignores_empty_endpoints() {
		let mut tx = Transaction::default();
		assert!(!tx.is_visible());
		tx.from = Some(String::new());
		assert!(!tx.is_visible());
		tx.to = Some("wallet".to_string());
		assert!(tx.is_visible());
	}
}
