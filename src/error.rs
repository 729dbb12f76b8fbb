//! Error types shared by the content scanner, the watcher and the server

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to callers of the core components
#[derive(Error, Debug)]
pub enum Error {
    /// The content root itself could not be listed
    #[error("failed to read content root {}: {source}", path.display())]
    ReadRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The filesystem watcher could not be created or could not register a path
    #[error("failed to watch {}: {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// The content root could not be enumerated for watch registration
    #[error("failed to enumerate {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The HTTP listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
