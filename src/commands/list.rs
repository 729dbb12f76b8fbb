//! List posts found under the content root

use anyhow::Result;
use std::fmt::Write;

use crate::content::loader::compare_posts;
use crate::content::{scan_entries, ScanOutcome};
use crate::BlogServe;

/// Print valid posts, newest first, followed by excluded directories
pub fn run(app: &BlogServe) -> Result<()> {
    let outcomes = scan_entries(&app.config.root)?;
    print!("{}", render(outcomes)?);
    Ok(())
}

/// Render scan outcomes as a human readable listing
pub fn render(outcomes: Vec<ScanOutcome>) -> Result<String> {
    let mut posts = Vec::new();
    let mut excluded = Vec::new();
    for outcome in outcomes {
        match outcome {
            ScanOutcome::Included(post) => posts.push(post),
            ScanOutcome::Excluded { slug, reason } => excluded.push((slug, reason)),
        }
    }
    posts.sort_by(compare_posts);

    let mut out = String::new();
    writeln!(out, "Posts ({}):", posts.len())?;
    for post in &posts {
        let date = if post.metadata.date.is_empty() {
            "----------"
        } else {
            &post.metadata.date
        };
        writeln!(out, "  {} - {} [{}]", date, post.metadata.title, post.slug)?;
    }

    if !excluded.is_empty() {
        writeln!(out, "Excluded ({}):", excluded.len())?;
        for (slug, reason) in &excluded {
            writeln!(out, "  {}: {}", slug, reason)?;
        }
    }

    Ok(out)
}
