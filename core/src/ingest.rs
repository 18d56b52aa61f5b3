use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::DumpError;
use crate::types::{BlockRecord, ReplicaId, Transaction};

const COMMITTED_PREFIX: &str = "committedBlocks_";
const RECEIVED_PREFIX: &str = "receivedBlocks_";
const DUMP_SUFFIX: &str = ".json";

/// On-disk shape of one replica dump: `{"blocks": [...]}` with the
/// parent hash under the `prehash` key.
#[derive(Debug, Deserialize)]
struct DumpDocument {
	blocks: Vec<DumpBlock>,
}

#[derive(Debug, Deserialize)]
struct DumpBlock {
	height: u64,
	hash: String,
	prehash: String,
	view: i64,
	#[serde(default)]
	transactions: Vec<Transaction>,
}

/// Parses one dump file into normalized block records, preserving the
/// on-disk block and transaction order.
pub fn load_dump(
	path: &Path,
	source: ReplicaId,
	committed: bool,
) -> Result<Vec<BlockRecord>, DumpError> {
	let raw = fs::read_to_string(path).map_err(|error| match error.kind() {
		io::ErrorKind::NotFound => DumpError::Missing(path.to_path_buf()),
		_ => DumpError::Io {
			path: path.to_path_buf(),
			source: error,
		},
	})?;
	let document: DumpDocument =
		serde_json::from_str(&raw).map_err(|source| DumpError::Malformed {
			path: path.to_path_buf(),
			source,
		})?;

	Ok(document
		.blocks
		.into_iter()
		.map(|block| BlockRecord {
			source,
			height: block.height,
			hash: block.hash,
			parent_hash: block.prehash,
			view: block.view,
			transactions: block.transactions,
			committed,
		})
		.collect())
}

/// Scans `dir` for `committedBlocks_<id>.json` dumps and returns them
/// sorted by replica id. Files whose id part does not parse are skipped
/// with a warning.
pub fn discover_committed(dir: &Path) -> Result<Vec<(ReplicaId, PathBuf)>, DumpError> {
	let entries = fs::read_dir(dir).map_err(|source| DumpError::Io {
		path: dir.to_path_buf(),
		source,
	})?;

	let mut dumps = Vec::new();
	for entry in entries {
		let entry = entry.map_err(|source| DumpError::Io {
			path: dir.to_path_buf(),
			source,
		})?;
		let file_name = entry.file_name();
		let Some(name) = file_name.to_str() else {
			continue;
		};
		let Some(id_part) = name
			.strip_prefix(COMMITTED_PREFIX)
			.and_then(|rest| rest.strip_suffix(DUMP_SUFFIX))
		else {
			continue;
		};
		match id_part.parse::<ReplicaId>() {
			Ok(replica) => dumps.push((replica, entry.path())),
			Err(_) => warn!("Skipping dump with invalid replica id: {name}"),
		}
	}

	dumps.sort_by_key(|(replica, _)| *replica);
	Ok(dumps)
}

pub fn committed_path(dir: &Path, replica: ReplicaId) -> PathBuf {
	dir.join(format!("{COMMITTED_PREFIX}{replica}{DUMP_SUFFIX}"))
}

pub fn received_path(dir: &Path, replica: ReplicaId) -> PathBuf {
	dir.join(format!("{RECEIVED_PREFIX}{replica}{DUMP_SUFFIX}"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	fn write_dump(dir: &Path, name: &str, contents: &str) -> PathBuf {
		let path = dir.join(name);
		fs::write(&path, contents).unwrap();
		path
	}

	const SAMPLE: &str = r#"{
		"blocks": [
			{"height": 0, "hash": "", "prehash": "", "view": 0, "transactions": []},
			{"height": 1, "hash": "a1", "prehash": "", "view": 3, "transactions": [
				{"to": "wallet", "value": 10, "timestamp": 1700000000000}
			]}
		]
	}"#;

	#[test]
	fn loads_records_in_dump_order() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_dump(dir.path(), "committedBlocks_0.json", SAMPLE);

		let records = load_dump(&path, 0, true).unwrap();
		assert_eq!(records.len(), 2);
		assert_eq!(records[0].height, 0);
		assert!(records[0].hash.is_empty());
		assert_eq!(records[1].parent_hash, "");
		assert_eq!(records[1].view, 3);
		assert!(records[1].committed);

		let tx = &records[1].transactions[0];
		assert_eq!(tx.from, None);
		assert_eq!(tx.to.as_deref(), Some("wallet"));
		assert_eq!(tx.value, 10.0);
	}

	#[test]
	fn missing_file_maps_to_missing_variant() {
		let dir = tempfile::tempdir().unwrap();
		let result = load_dump(&dir.path().join("committedBlocks_9.json"), 9, true);
		assert!(matches!(result, Err(DumpError::Missing(_))));
	}

	#[test]
	fn malformed_document_maps_to_malformed_variant() {
		let dir = tempfile::tempdir().unwrap();
		let path = write_dump(dir.path(), "committedBlocks_0.json", "{\"blocks\": [{}]}");
		let result = load_dump(&path, 0, true);
		assert!(matches!(result, Err(DumpError::Malformed { .. })));
	}

	#[test]
	fn discovery_filters_and_sorts_by_replica_id() {
		let dir = tempfile::tempdir().unwrap();
		write_dump(dir.path(), "committedBlocks_2.json", SAMPLE);
		write_dump(dir.path(), "committedBlocks_0.json", SAMPLE);
		write_dump(dir.path(), "committedBlocks_x.json", SAMPLE);
		write_dump(dir.path(), "receivedBlocks_1.json", SAMPLE);

		let dumps = discover_committed(dir.path()).unwrap();
		let replicas: Vec<_> = dumps.iter().map(|(replica, _)| *replica).collect();
		assert_eq!(replicas, vec![0, 2]);
	}

	#[test]
	fn fixed_paths_follow_the_dump_naming_scheme() {
		let dir = Path::new("etc/output");
		assert_eq!(
			committed_path(dir, 2),
			Path::new("etc/output/committedBlocks_2.json")
		);
		assert_eq!(
			received_path(dir, 2),
			Path::new("etc/output/receivedBlocks_2.json")
		);
	}
}
