use std::fs;
use std::path::Path;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use forktrace_core::{
	ingest,
	layout::{ColumnAssigner, SortOrder},
	render::{ColorMode, RenderOptions, Renderer, Variant},
	tree::BlockTree,
	utils::{default_subscriber, install_panic_hooks, json_subscriber},
};
use tracing::{error, info, warn};

mod config;

fn main() -> Result<()> {
	let opts = config::CliOpts::parse();
	let config = config::load(&opts)?;

	if config.log_format_json {
		tracing::subscriber::set_global_default(json_subscriber(config.log_level))?;
	} else {
		tracing::subscriber::set_global_default(default_subscriber(config.log_level))?;
	}

	install_panic_hooks()?;

	let version = clap::crate_version!();
	let replica = config.replica;
	info!("Running forktrace node scan v{version} for replica {replica}");

	let dump_dir = Path::new(&config.dump_dir);
	let committed_path = ingest::committed_path(dump_dir, replica);
	let committed = ingest::load_dump(&committed_path, replica, true)
		.map_err(|error| eyre!("No committed blocks loaded: {error}"))?;
	if committed.is_empty() {
		return Err(eyre!(
			"Committed dump {} holds no blocks",
			committed_path.display()
		));
	}
	info!("Committed blocks: {}", committed.len());

	let received_path = ingest::received_path(dump_dir, replica);
	let received = match ingest::load_dump(&received_path, replica, false) {
		Ok(records) => {
			info!("Received blocks: {}", records.len());
			records
		},
		Err(error) => {
			warn!("No received blocks loaded: {error}");
			Vec::new()
		},
	};

	// Committed records first so their keys win every merge.
	let tree = BlockTree::build(vec![committed, received]);
	info!(
		"Built block tree: {} unique blocks ({} committed, {} received-only), max height {}",
		tree.blocks.len(),
		tree.committed_count(),
		tree.received_only_count(),
		tree.max_height
	);
	info!(
		"Fork detected: {}",
		if tree.has_fork() { "YES" } else { "NO" }
	);

	let levels = tree.blocks_by_height(Some(config.max_display_height));
	let columns = ColumnAssigner::new(&tree).assign(&levels, SortOrder::CommittedFirst);
	let color = if config.color {
		ColorMode::Colored
	} else {
		ColorMode::Plain
	};
	let options = RenderOptions {
		color,
		variant: Variant::Node,
	};
	let lines = Renderer::new(&tree, &columns, options).render(&levels);

	println!("\n{}", lines.join("\n"));

	let result_path = dump_dir.join(format!("fork_analysis_node_{replica}.txt"));
	let plain = lines
		.iter()
		.map(|line| strip_ansi_escapes::strip_str(line))
		.collect::<Vec<_>>()
		.join("\n");
	match fs::write(&result_path, plain) {
		Ok(()) => info!("Analysis saved to {}", result_path.display()),
		Err(error) => error!(
			"Failed to save analysis to {}: {error}",
			result_path.display()
		),
	}

	Ok(())
}
