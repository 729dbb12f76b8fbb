//! Content module - posts, metadata and the content root scanner

pub mod loader;
mod post;

pub use loader::{scan, scan_entries, ExclusionReason, ScanOutcome};
pub use post::{Post, PostMetadata};
