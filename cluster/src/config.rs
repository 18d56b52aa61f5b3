use std::fs;

use clap::{command, Parser};
use color_eyre::Result;
use forktrace_core::types::tracing_level_format;
use serde::{Deserialize, Serialize};
use tracing::Level;

#[derive(Parser)]
#[command(version)]
pub struct CliOpts {
	/// Sets path to the yaml configuration file.
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<String>,
	/// Directory scanned for committedBlocks_<id>.json dumps.
	#[arg(short, long, value_name = "DIR")]
	pub dump_dir: Option<String>,
	/// Maximum block height included in the diagram.
	#[arg(long)]
	pub max_height: Option<u64>,
	/// Embeds ANSI colors in console output.
	#[arg(long)]
	pub color: bool,
	/// Sets verbosity level.
	#[arg(long)]
	pub verbosity: Option<Level>,
	/// Sets logs format to JSON.
	#[arg(long)]
	pub logs_json: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
	/// Directory holding the per-replica block dumps.
	pub dump_dir: String,
	/// Name of the color-stripped analysis file written into the dump
	/// directory.
	pub result_file: String,
	/// Maximum block height included in the diagram, no cap when unset.
	pub max_display_height: Option<u64>,
	/// Embed ANSI colors in console output.
	pub color: bool,
	/// Log level.
	#[serde(with = "tracing_level_format")]
	pub log_level: Level,
	/// Log format: JSON for `true`, plain text for `false`.
	pub log_format_json: bool,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			dump_dir: "etc/output".to_string(),
			result_file: "blockchain_analysis.txt".to_string(),
			max_display_height: None,
			color: false,
			log_level: Level::INFO,
			log_format_json: false,
		}
	}
}

pub fn load(opts: &CliOpts) -> Result<Config> {
	let mut config: Config = match &opts.config {
		Some(path) => {
			fs::metadata(path)?;
			confy::load_path(path)?
		},
		None => Config::default(),
	};

	config.log_level = opts.verbosity.unwrap_or(config.log_level);
	config.log_format_json = opts.logs_json || config.log_format_json;
	config.color = opts.color || config.color;
	if let Some(dump_dir) = &opts.dump_dir {
		config.dump_dir = dump_dir.clone();
	}
	if let Some(max_height) = opts.max_height {
		config.max_display_height = Some(max_height);
	}

	Ok(config)
}
