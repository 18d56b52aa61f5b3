//! Reconstructs the block-lineage tree of a replicated ledger from
//! per-replica dump files and renders it as a column-based ASCII
//! diagram, so an operator can confirm at a glance whether the replicas
//! converged on one chain or diverged into forks.
//!
//! The pipeline is strictly forward and synchronous: block records flow
//! into [`tree::BlockTree`], the resulting adjacency map into
//! [`layout::ColumnAssigner`], and the finished column table into
//! [`render::Renderer`], which produces the final text lines.

pub mod error;
pub mod ingest;
pub mod layout;
pub mod render;
pub mod tree;
pub mod types;
pub mod utils;
