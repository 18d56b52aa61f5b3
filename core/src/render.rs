use std::collections::HashSet;

use chrono::{Local, TimeZone};
use owo_colors::{OwoColorize, Style};

use crate::layout::ColumnTable;
use crate::tree::BlockTree;
use crate::types::{BlockKey, Transaction, UniqueBlock};

/// Whether rendered lines embed ANSI escape sequences. The persisted
/// analysis file is always written from stripped lines, so `Colored`
/// only affects what the console sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
	Colored,
	Plain,
}

/// Which scan produced the tree. Controls the block summary field and
/// the transaction detail format, the grid itself is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
	/// Multi-replica scan: summaries list the replicas that reported
	/// each block.
	Cluster,
	/// Single-replica scan: summaries carry the committed/received
	/// status and detail rows carry transaction timestamps.
	Node,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
	pub color: ColorMode,
	pub variant: Variant,
}

/// Fixed-width character grid under construction. Cells hold styled
/// strings so a colored glyph still occupies one visual column.
struct Canvas {
	cells: Vec<String>,
}

impl Canvas {
	fn new(width: usize) -> Self {
		Self {
			cells: vec![" ".to_string(); width],
		}
	}

	fn put(&mut self, index: usize, cell: String) {
		if index >= self.cells.len() {
			self.cells.resize(index + 1, " ".to_string());
		}
		self.cells[index] = cell;
	}

	fn into_line(self) -> String {
		self.cells.concat()
	}
}

/// Turns a finished column table plus adjacency map into the ordered
/// text lines of the tree diagram, one row group per height level.
pub struct Renderer<'a> {
	tree: &'a BlockTree,
	columns: &'a ColumnTable,
	options: RenderOptions,
}

impl<'a> Renderer<'a> {
	pub fn new(tree: &'a BlockTree, columns: &'a ColumnTable, options: RenderOptions) -> Self {
		Self {
			tree,
			columns,
			options,
		}
	}

	/// Renders `levels` (as produced by [`BlockTree::blocks_by_height`])
	/// in ascending height order. Per level: fork connector rows, two
	/// continuation rows, then one block row per block followed by its
	/// transaction detail rows.
	pub fn render(&self, levels: &[Vec<BlockKey>]) -> Vec<String> {
		let mut lines = Vec::new();

		for (height, level) in levels.iter().enumerate() {
			if level.is_empty() {
				continue;
			}

			let mut keys: Vec<&BlockKey> = level.iter().collect();
			keys.sort_by_key(|key| self.column(key));
			let max_col = keys.iter().map(|key| self.column(key)).max().unwrap_or(0);

			// First block occupying each column at this height; its
			// status styles the column's continuation pipes.
			let mut occupants: Vec<Option<&UniqueBlock>> = vec![None; max_col + 1];
			for key in &keys {
				let column = self.column(key);
				if occupants[column].is_none() {
					occupants[column] = self.tree.get(key);
				}
			}

			if height > 0 {
				let prev: HashSet<&BlockKey> = levels[height - 1].iter().collect();
				self.fork_rows(&keys, &prev, max_col, &mut lines);

				let pipes = self.pipe_row(&occupants).into_line();
				lines.push(pipes.clone());
				lines.push(pipes);
			}

			for key in &keys {
				self.block_rows(key, &occupants, &mut lines);
			}
		}

		lines
	}

	fn column(&self, key: &BlockKey) -> usize {
		self.columns.get(key).copied().unwrap_or(0)
	}

	fn width(max_col: usize) -> usize {
		max_col * 2 + 1
	}

	/// One connector row per non-first sibling of a fork whose parent
	/// sits at the previous height: a pipe at the parent's cell and a
	/// diagonal next to the child's cell, on the parent's side. The
	/// rule holds for any number of siblings since each later sibling
	/// owns a distinct fresh column.
	fn fork_rows(
		&self,
		keys: &[&BlockKey],
		prev: &HashSet<&BlockKey>,
		max_col: usize,
		lines: &mut Vec<String>,
	) {
		for key in keys {
			let Some(block) = self.tree.get(key) else {
				continue;
			};
			let Some(parent) = BlockKey::parent_of(&block.record) else {
				continue;
			};
			if !prev.contains(&parent) {
				continue;
			}
			let siblings = self.tree.children.get(&parent).map(Vec::as_slice);
			let Some(siblings) = siblings.filter(|s| s.len() > 1) else {
				continue;
			};
			if siblings.first() == Some(*key) {
				continue;
			}

			let parent_column = self.column(&parent);
			let column = self.column(key);
			// A missing parent block defaults to the committed style.
			let parent_committed = self.tree.get(&parent).map_or(true, |b| b.committed);

			let mut canvas = Canvas::new(Self::width(max_col));
			canvas.put(parent_column * 2, self.paint("|", self.status_style(parent_committed)));
			let diagonal_style = self.status_style(block.committed);
			if column > parent_column {
				canvas.put(column * 2 - 1, self.paint("\\", diagonal_style));
			} else {
				canvas.put(column * 2 + 1, self.paint("/", diagonal_style));
			}
			lines.push(canvas.into_line());
		}
	}

	fn pipe_row(&self, occupants: &[Option<&UniqueBlock>]) -> Canvas {
		let mut canvas = Canvas::new(Self::width(occupants.len().saturating_sub(1)));
		for (column, occupant) in occupants.iter().enumerate() {
			if let Some(block) = occupant {
				canvas.put(column * 2, self.paint("|", self.status_style(block.committed)));
			}
		}
		canvas
	}

	fn block_rows(&self, key: &BlockKey, occupants: &[Option<&UniqueBlock>], lines: &mut Vec<String>) {
		let Some(block) = self.tree.get(key) else {
			return;
		};
		let column = self.column(key);

		let mut canvas = Canvas::new(Self::width(occupants.len().saturating_sub(1)));
		for (other_column, occupant) in occupants.iter().enumerate() {
			if let Some(other) = occupant {
				if other_column != column {
					canvas.put(
						other_column * 2,
						self.paint("|", self.status_style(other.committed)),
					);
				}
			}
		}
		canvas.put(
			column * 2,
			self.paint("*", self.status_style(block.committed).bold()),
		);
		lines.push(format!("{}  {}", canvas.into_line(), self.summary(block)));

		for tx in block.record.transactions.iter().filter(|tx| tx.is_visible()) {
			let continuation = self.pipe_row(occupants).into_line();
			lines.push(format!("{}  {}", continuation, self.tx_detail(tx)));
		}
	}

	fn summary(&self, block: &UniqueBlock) -> String {
		let record = &block.record;
		let hash_label = if record.hash.is_empty() {
			"Genesis".to_string()
		} else {
			let short: String = record.hash.chars().take(12).collect();
			format!("{short}...")
		};
		let status_style = self.status_style(block.committed);

		let height = self.paint(&format!("Height {}", record.height), Style::new().bright_cyan());
		let txs = self.paint(
			&format!("TXs: {}", record.tx_count()),
			Style::new().bright_magenta(),
		);
		let hash = self.paint(&hash_label, status_style);

		match self.options.variant {
			Variant::Cluster => {
				let nodes = block
					.sources
					.iter()
					.map(ToString::to_string)
					.collect::<Vec<_>>()
					.join(",");
				let nodes = self.paint(&format!("Nodes [{nodes}]"), Style::new().bright_blue());
				format!("{height} | {nodes} | Hash: {hash} | {txs}")
			},
			Variant::Node => {
				let replica = self.paint(
					&format!("Replica {}", record.source),
					Style::new().bright_blue(),
				);
				let status = self.paint(
					if block.committed { "COMMITTED" } else { "RECEIVED" },
					status_style.bold(),
				);
				format!("{height} | {replica} | [{status}] | Hash: {hash} | {txs}")
			},
		}
	}

	fn tx_detail(&self, tx: &Transaction) -> String {
		let endpoint = |field: &Option<String>, fallback: &str| -> String {
			match field.as_deref() {
				Some(addr) if !addr.is_empty() => addr.chars().take(8).collect(),
				_ => fallback.to_string(),
			}
		};
		let from = self.paint(&endpoint(&tx.from, "Coinbase"), Style::new().bright_black());
		let to = self.paint(&endpoint(&tx.to, "Unknown"), Style::new().bright_black());
		let arrow = self.paint("→", Style::new().bright_white());
		let value = self.paint(&tx.value.to_string(), Style::new().bright_cyan());

		match self.options.variant {
			Variant::Cluster => format!("    {from} {arrow} {to}: {value}"),
			Variant::Node => {
				let time = self.paint(&format_timestamp(tx.timestamp), Style::new().bright_magenta());
				format!("    {from} {arrow} {to}: {value} | {time}")
			},
		}
	}

	fn status_style(&self, committed: bool) -> Style {
		if committed {
			Style::new().bright_green()
		} else {
			Style::new().bright_yellow()
		}
	}

	fn paint(&self, text: &str, style: Style) -> String {
		match self.options.color {
			ColorMode::Colored => text.style(style).to_string(),
			ColorMode::Plain => text.to_string(),
		}
	}
}

fn format_timestamp(millis: i64) -> String {
	if millis <= 0 {
		return "N/A".to_string();
	}
	Local
		.timestamp_millis_opt(millis)
		.single()
		.map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
		.unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::layout::{ColumnAssigner, SortOrder};
	use crate::types::tests::record;
	use crate::types::BlockRecord;

	fn rendered(
		sources: Vec<Vec<BlockRecord>>,
		order: SortOrder,
		options: RenderOptions,
	) -> Vec<String> {
		let tree = BlockTree::build(sources);
		let levels = tree.blocks_by_height(None);
		let columns = ColumnAssigner::new(&tree).assign(&levels, order);
		Renderer::new(&tree, &columns, options).render(&levels)
	}

	const PLAIN_NODE: RenderOptions = RenderOptions {
		color: ColorMode::Plain,
		variant: Variant::Node,
	};
	const PLAIN_CLUSTER: RenderOptions = RenderOptions {
		color: ColorMode::Plain,
		variant: Variant::Cluster,
	};

	fn forked_node_sources() -> Vec<Vec<BlockRecord>> {
		let committed = vec![
			record(7, 0, "", "", true),
			record(7, 1, "a1", "", true),
			record(7, 2, "a2", "a1", true),
		];
		let received = vec![record(7, 2, "b2", "a1", false)];
		vec![committed, received]
	}

	#[test]
	fn node_fork_renders_connector_then_spacers_then_blocks() {
		let lines = rendered(forked_node_sources(), SortOrder::CommittedFirst, PLAIN_NODE);

		assert_eq!(
			lines,
			vec![
				"*  Height 0 | Replica 7 | [COMMITTED] | Hash: Genesis | TXs: 0",
				"|",
				"|",
				"*  Height 1 | Replica 7 | [COMMITTED] | Hash: a1... | TXs: 0",
				"|\\ ",
				"| |",
				"| |",
				"* |  Height 2 | Replica 7 | [COMMITTED] | Hash: a2... | TXs: 0",
				"| *  Height 2 | Replica 7 | [RECEIVED] | Hash: b2... | TXs: 0",
			]
		);
	}

	#[test]
	fn linear_cluster_chain_renders_single_column() {
		let chain = vec![
			record(0, 0, "", "", true),
			record(0, 1, "a1", "", true),
		];
		let other = vec![
			record(1, 0, "", "", true),
			record(1, 1, "a1", "", true),
		];
		let lines = rendered(vec![chain, other], SortOrder::ByParent, PLAIN_CLUSTER);

		assert_eq!(
			lines,
			vec![
				"*  Height 0 | Nodes [0,1] | Hash: Genesis | TXs: 0",
				"|",
				"|",
				"*  Height 1 | Nodes [0,1] | Hash: a1... | TXs: 0",
			]
		);
	}

	#[test]
	fn three_way_fork_emits_one_connector_row_per_extra_sibling() {
		let records = vec![
			record(0, 0, "", "", true),
			record(0, 1, "a1", "", true),
			record(0, 2, "a2", "a1", true),
			record(0, 2, "b2", "a1", true),
			record(0, 2, "c2", "a1", true),
		];
		let lines = rendered(vec![records], SortOrder::ByParent, PLAIN_CLUSTER);

		assert_eq!(lines[4], "|\\   ");
		assert_eq!(lines[5], "|  \\ ");
		assert_eq!(lines[6], "| | |");
		assert_eq!(lines[7], "| | |");
		assert!(lines[8].starts_with("* | |  "));
		assert!(lines[9].starts_with("| * |  "));
		assert!(lines[10].starts_with("| | *  "));
	}

	#[test]
	fn transaction_detail_rows_follow_their_block() {
		let mut block = record(3, 0, "", "", true);
		block.transactions = vec![
			Transaction {
				from: Some("sender-address".to_string()),
				to: Some("receiver".to_string()),
				value: 25.0,
				timestamp: 0,
			},
			// Padding entry without endpoints, must not produce a row.
			Transaction::default(),
		];
		let lines = rendered(vec![vec![block]], SortOrder::CommittedFirst, PLAIN_NODE);

		assert_eq!(
			lines,
			vec![
				"*  Height 0 | Replica 3 | [COMMITTED] | Hash: Genesis | TXs: 2",
				"|      sender-a → receiver: 25 | N/A",
			]
		);
	}

	#[test]
	fn cluster_detail_rows_omit_timestamps() {
		let mut block = record(0, 0, "", "", true);
		block.transactions = vec![Transaction {
			from: None,
			to: Some("wallet-9".to_string()),
			value: 3.5,
			timestamp: 12,
		}];
		let lines = rendered(vec![vec![block]], SortOrder::ByParent, PLAIN_CLUSTER);

		assert_eq!(lines[1], "|      Coinbase → wallet-9: 3.5");
	}

	#[test]
	fn colored_output_strips_back_to_plain() {
		let colored = rendered(
			forked_node_sources(),
			SortOrder::CommittedFirst,
			RenderOptions {
				color: ColorMode::Colored,
				variant: Variant::Node,
			},
		);
		let plain = rendered(forked_node_sources(), SortOrder::CommittedFirst, PLAIN_NODE);

		assert!(colored.iter().any(|line| line.contains('\u{1b}')));
		let stripped: Vec<String> = colored
			.iter()
			.map(|line| strip_ansi_escapes::strip_str(line))
			.collect();
		assert_eq!(stripped, plain);
	}

	#[test]
	fn capped_rendering_stops_at_the_cap() {
		let records = vec![
			record(0, 0, "", "", true),
			record(0, 1, "a1", "", true),
			record(0, 2, "a2", "a1", true),
		];
		let tree = BlockTree::build(vec![records]);
		let levels = tree.blocks_by_height(Some(1));
		let columns = ColumnAssigner::new(&tree).assign(&levels, SortOrder::ByParent);
		let lines = Renderer::new(&tree, &columns, PLAIN_CLUSTER).render(&levels);

		assert_eq!(lines.len(), 4);
		assert!(lines.iter().all(|line| !line.contains("a2")));
	}
}
