use indexmap::IndexMap;
use tracing::debug;

use crate::types::{BlockKey, BlockRecord, UniqueBlock};

/// Adjacency map from a parent key to its children, in first-seen order
/// across the whole merge pass.
pub type ChildrenMap = IndexMap<BlockKey, Vec<BlockKey>>;

/// Canonical DAG of every logical block reported by the ingested
/// sources. Built once, read-only afterwards.
#[derive(Debug, Default)]
pub struct BlockTree {
	pub blocks: IndexMap<BlockKey, UniqueBlock>,
	pub children: ChildrenMap,
	pub max_height: u64,
}

impl BlockTree {
	/// Merges the given record sequences in caller priority order:
	/// ascending replica id for a cluster scan, committed before
	/// received for a single-node scan. Records resolving to a known
	/// key are merged into the existing block instead of duplicated.
	pub fn build<I>(sources: I) -> Self
	where
		I: IntoIterator<Item = Vec<BlockRecord>>,
	{
		let mut tree = BlockTree::default();
		for records in sources {
			for record in records {
				tree.insert(record);
			}
		}
		tree
	}

	fn insert(&mut self, record: BlockRecord) {
		let key = BlockKey::from_record(&record);
		self.max_height = self.max_height.max(record.height);

		if let Some(existing) = self.blocks.get_mut(&key) {
			existing.add_source(record.source);
			if record.committed {
				existing.committed = true;
			}
			debug!("Merged duplicate block {key} from replica {}", record.source);
			return;
		}

		let parent = BlockKey::parent_of(&record);
		self.blocks.insert(key.clone(), UniqueBlock::new(record));
		if let Some(parent) = parent {
			let children = self.children.entry(parent).or_default();
			// Idempotent: a child is listed at most once under its parent.
			if !children.contains(&key) {
				children.push(key);
			}
		}
	}

	/// Parents with two or more children, in first-seen order.
	pub fn fork_points(&self) -> Vec<&BlockKey> {
		self.children
			.iter()
			.filter(|(_, children)| children.len() > 1)
			.map(|(parent, _)| parent)
			.collect()
	}

	pub fn has_fork(&self) -> bool {
		self.children.values().any(|children| children.len() > 1)
	}

	pub fn committed_count(&self) -> usize {
		self.blocks.values().filter(|b| b.committed).count()
	}

	pub fn received_only_count(&self) -> usize {
		self.blocks.len() - self.committed_count()
	}

	/// Block keys grouped by height, insertion-ordered within a level,
	/// up to `cap` when one is given. Index equals height; levels with
	/// no blocks stay empty. Blocks above the cap remain in `blocks`
	/// for statistics but take no part in layout or rendering.
	pub fn blocks_by_height(&self, cap: Option<u64>) -> Vec<Vec<BlockKey>> {
		let top = cap.map_or(self.max_height, |cap| cap.min(self.max_height));
		let mut levels = vec![Vec::new(); top as usize + 1];
		for (key, block) in &self.blocks {
			if block.record.height <= top {
				levels[block.record.height as usize].push(key.clone());
			}
		}
		levels
	}

	pub fn get(&self, key: &BlockKey) -> Option<&UniqueBlock> {
		self.blocks.get(key)
	}
}
