//! Content loader - scans the content root into posts
//!
//! Each immediate subdirectory of the root is a candidate post. A directory
//! that fails validation is excluded from the listing instead of failing the
//! whole scan, so one malformed post never hides the others.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::{Post, PostMetadata};
use crate::error::{Error, Result};

/// Why a post directory was left out of the listing
#[derive(Error, Debug)]
pub enum ExclusionReason {
    #[error("no markdown file found")]
    NoMarkdown,

    #[error("multiple markdown files found: {}", .0.join(", "))]
    MultipleMarkdown(Vec<String>),

    #[error("multiple json files found: {}", .0.join(", "))]
    MultipleMetadata(Vec<String>),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(#[from] serde_json::Error),

    #[error("directory name is not valid UTF-8")]
    InvalidName,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of scanning a single post directory
#[derive(Debug)]
pub enum ScanOutcome {
    Included(Post),
    Excluded {
        slug: String,
        reason: ExclusionReason,
    },
}

impl ScanOutcome {
    /// Slug of the directory this outcome belongs to
    pub fn slug(&self) -> &str {
        match self {
            ScanOutcome::Included(post) => &post.slug,
            ScanOutcome::Excluded { slug, .. } => slug,
        }
    }
}

/// Scan the content root and return the valid posts, newest first
pub fn scan(root: &Path) -> Result<Vec<Post>> {
    let mut posts: Vec<Post> = scan_entries(root)?
        .into_iter()
        .filter_map(|outcome| match outcome {
            ScanOutcome::Included(post) => Some(post),
            ScanOutcome::Excluded { slug, reason } => {
                tracing::warn!("Skipping post {:?}: {}", slug, reason);
                None
            }
        })
        .collect();

    posts.sort_by(compare_posts);

    Ok(posts)
}

/// Scan the content root and report an outcome for every subdirectory, in slug order
pub fn scan_entries(root: &Path) -> Result<Vec<ScanOutcome>> {
    let read_root = |source| Error::ReadRoot {
        path: root.to_path_buf(),
        source,
    };

    let mut outcomes = Vec::new();

    for entry in fs::read_dir(root).map_err(read_root)? {
        let entry = entry.map_err(read_root)?;
        // Symlinked directories count as posts, like they do for the asset server
        if !entry.path().is_dir() {
            continue;
        }

        let name = entry.file_name();
        let outcome = match name.to_str() {
            Some(slug) => match load_post(&entry.path(), slug) {
                Ok(post) => ScanOutcome::Included(post),
                Err(reason) => ScanOutcome::Excluded {
                    slug: slug.to_string(),
                    reason,
                },
            },
            None => ScanOutcome::Excluded {
                slug: name.to_string_lossy().into_owned(),
                reason: ExclusionReason::InvalidName,
            },
        };
        outcomes.push(outcome);
    }

    outcomes.sort_by(|a, b| a.slug().cmp(b.slug()));

    Ok(outcomes)
}

/// Newest date first; equal dates fall back to slug order
pub fn compare_posts(a: &Post, b: &Post) -> Ordering {
    b.metadata
        .date
        .cmp(&a.metadata.date)
        .then_with(|| a.slug.cmp(&b.slug))
}

/// Load a single post from its directory
fn load_post(dir: &Path, slug: &str) -> std::result::Result<Post, ExclusionReason> {
    let mut markdown = Vec::new();
    let mut metadata = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }

        // Suffix match, so a file named just ".md" still counts as markdown
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(".md") {
            markdown.push(entry.path());
        } else if name.ends_with(".json") {
            metadata.push(entry.path());
        }
    }

    let file_names = |paths: &[std::path::PathBuf]| {
        let mut names: Vec<String> = paths
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    };

    let markdown_path = match markdown.as_slice() {
        [] => return Err(ExclusionReason::NoMarkdown),
        [single] => single,
        many => return Err(ExclusionReason::MultipleMarkdown(file_names(many))),
    };

    let metadata = match metadata.as_slice() {
        [] => PostMetadata::default(),
        [single] => PostMetadata::from_json(&fs::read(single)?)?,
        many => return Err(ExclusionReason::MultipleMetadata(file_names(many))),
    };

    // Invalid UTF-8 is replaced rather than dropping the post
    let content = String::from_utf8_lossy(&fs::read(markdown_path)?).into_owned();

    Ok(Post::new(slug, content, metadata))
}
