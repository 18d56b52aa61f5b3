use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn one dump file into block records. None of these are
/// fatal for a scan, the offending source is skipped and processing
/// continues with the remaining ones.
#[derive(Debug, Error)]
pub enum DumpError {
	#[error("Dump file {0} not found")]
	Missing(PathBuf),
	#[error("Failed to read {path}")]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("Malformed dump {path}: {source}")]
	Malformed {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
}
