//! blogserve: serves markdown posts as JSON with live reload
//!
//! Posts live one per directory under a content root. The server rescans the
//! root on every listing request and pushes a reload event to every connected
//! client whenever something under the root changes.

pub mod commands;
pub mod config;
pub mod content;
pub mod error;
pub mod reload;
pub mod server;
pub mod watch;

pub use error::{Error, Result};

use tokio_util::sync::CancellationToken;

/// The blogserve application, created once at startup
pub struct BlogServe {
    /// Server configuration
    pub config: config::ServerConfig,
    /// Fan-out for reload notifications
    pub broadcaster: reload::ReloadBroadcaster,
    /// Cancelled on shutdown
    pub shutdown: CancellationToken,
}

impl BlogServe {
    /// Create a new application from its configuration
    pub fn new(config: config::ServerConfig) -> Self {
        Self {
            config,
            broadcaster: reload::ReloadBroadcaster::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Watch the content root and serve until shutdown
    pub async fn serve(&self) -> anyhow::Result<()> {
        commands::serve::run(self).await
    }

    /// Print the posts found under the content root
    pub fn list(&self) -> anyhow::Result<()> {
        commands::list::run(self)
    }
}
