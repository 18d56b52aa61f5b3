use indexmap::IndexMap;

use crate::tree::BlockTree;
use crate::types::BlockKey;

/// Write-once table mapping each laid-out block to its horizontal slot.
pub type ColumnTable = IndexMap<BlockKey, usize>;

/// Tie-break applied to the blocks of one height level before columns
/// are handed out. The order decides which sibling of a fork inherits
/// the parent's column and therefore which branch reads as the main
/// chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
	/// Cluster scan: group siblings by raw parent hash, then by key.
	ByParent,
	/// Single-node scan: committed blocks before received ones, so the
	/// committed chain claims the leftmost columns.
	CommittedFirst,
}

/// Assigns each block a column in a single height-ascending pass. Owns
/// its memo table and monotonically increasing column counter; a column
/// is handed out exactly once and never reassigned.
pub struct ColumnAssigner<'a> {
	tree: &'a BlockTree,
	columns: ColumnTable,
	next_column: usize,
}

impl<'a> ColumnAssigner<'a> {
	pub fn new(tree: &'a BlockTree) -> Self {
		Self {
			tree,
			columns: ColumnTable::new(),
			next_column: 0,
		}
	}

	/// Consumes the assigner and returns the finished column table
	/// covering every block in `levels`.
	pub fn assign(mut self, levels: &[Vec<BlockKey>], order: SortOrder) -> ColumnTable {
		for level in levels {
			let mut keys = level.clone();
			self.sort_level(&mut keys, order);
			for key in &keys {
				self.column_for(key);
			}
		}
		self.columns
	}

	fn sort_level(&self, keys: &mut [BlockKey], order: SortOrder) {
		match order {
			SortOrder::ByParent => keys.sort_by(|a, b| {
				let parent = |key: &BlockKey| {
					self.tree
						.get(key)
						.map(|block| block.record.parent_hash.clone())
						.unwrap_or_default()
				};
				(parent(a), a).cmp(&(parent(b), b))
			}),
			SortOrder::CommittedFirst => keys.sort_by(|a, b| {
				let received = |key: &BlockKey| {
					self.tree.get(key).is_none_or(|block| !block.committed)
				};
				(received(a), a).cmp(&(received(b), b))
			}),
		}
	}

	fn column_for(&mut self, key: &BlockKey) -> usize {
		if let Some(&column) = self.columns.get(key) {
			return column;
		}

		let parent = self
			.tree
			.get(key)
			.and_then(|block| BlockKey::parent_of(&block.record));
		let parent_column = parent
			.as_ref()
			.and_then(|parent| self.columns.get(parent).copied());

		let column = match (parent, parent_column) {
			(Some(parent), Some(parent_column)) => {
				let siblings = self.tree.children.get(&parent).map(Vec::as_slice);
				// The head of the children list continues the parent's
				// line; every later sibling forks into a fresh column.
				if siblings.is_some_and(|s| s.first() != Some(key)) {
					self.fresh_column()
				} else {
					parent_column
				}
			},
			// True root, or a parent outside the laid-out range.
			_ => self.fresh_column(),
		};

		self.columns.insert(key.clone(), column);
		column
	}

	fn fresh_column(&mut self) -> usize {
		let column = self.next_column;
		self.next_column += 1;
		column
	}
}
