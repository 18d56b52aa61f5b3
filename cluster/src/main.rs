use std::fs;
use std::path::Path;
use std::process::ExitCode;

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

fn main() -> Result<ExitCode> {
	let opts = config::CliOpts::parse();
	let config = config::load(&opts)?;

	if config.log_format_json {
		tracing::subscriber::set_global_default(json_subscriber(config.log_level))?;
	} else {
		tracing::subscriber::set_global_default(default_subscriber(config.log_level))?;
	}

	install_panic_hooks()?;

	let version = clap::crate_version!();
	info!("Running forktrace cluster scan v{version}");

	let dump_dir = Path::new(&config.dump_dir);
	let dumps = ingest::discover_committed(dump_dir)?;
	if dumps.is_empty() {
		return Err(eyre!(
			"No committedBlocks_*.json files found in {}",
			config.dump_dir
		));
	}
	info!("Found {} replica dump(s) in {}", dumps.len(), config.dump_dir);

	let mut sources = Vec::new();
	for (replica, path) in dumps {
		match ingest::load_dump(&path, replica, true) {
			Ok(records) if !records.is_empty() => {
				let max_height = records.iter().map(|record| record.height).max().unwrap_or(0);
				info!(
					"Replica {replica}: {} blocks loaded (max height: {max_height})",
					records.len()
				);
				sources.push(records);
			},
			Ok(_) => warn!("Replica {replica}: dump {} holds no blocks", path.display()),
			Err(error) => warn!("Skipping replica {replica}: {error}"),
		}
	}
	if sources.is_empty() {
		return Err(eyre!("No usable block dumps loaded"));
	}

	let tree = BlockTree::build(sources);
	info!(
		"Built block tree: {} unique blocks, max height {}",
		tree.blocks.len(),
		tree.max_height
	);

	let levels = tree.blocks_by_height(config.max_display_height);
	let columns = ColumnAssigner::new(&tree).assign(&levels, SortOrder::ByParent);
	let color = if config.color {
		ColorMode::Colored
	} else {
		ColorMode::Plain
	};
	let options = RenderOptions {
		color,
		variant: Variant::Cluster,
	};
	let lines = Renderer::new(&tree, &columns, options).render(&levels);

	println!("\n{}", lines.join("\n"));

	let result_path = dump_dir.join(&config.result_file);
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

	let fork_points = tree.fork_points();
	if fork_points.is_empty() {
		info!("No fork detected");
		Ok(ExitCode::SUCCESS)
	} else {
		let points: Vec<String> = fork_points.iter().map(|key| key.short()).collect();
		warn!("Fork detected at: {}", points.join(", "));
		Ok(ExitCode::FAILURE)
	}
}
