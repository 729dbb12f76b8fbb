//! Post and metadata models

use serde::{Deserialize, Deserializer, Serialize};

/// Structured attributes of a post, parsed from its optional JSON file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostMetadata {
    /// Post title
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,

    /// Publication date, compared lexicographically (ISO dates sort correctly)
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,

    /// Post tags, in authored order
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    /// Short description
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
}

impl PostMetadata {
    /// Parse metadata from the raw bytes of a JSON file
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// A blog post, one per subdirectory of the content root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Slug (the post's directory name)
    pub slug: String,

    /// Raw markdown content
    pub content: String,

    /// Parsed metadata, zero-valued when the post has no JSON file
    pub metadata: PostMetadata,
}

impl Post {
    /// Create a post from its slug, markdown content and metadata
    pub fn new(slug: impl Into<String>, content: impl Into<String>, metadata: PostMetadata) -> Self {
        Self {
            slug: slug.into(),
            content: content.into(),
            metadata,
        }
    }
}

/// Treat an explicit JSON `null` like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
