//! Serve posts with live reload

use anyhow::Result;

use crate::reload;
use crate::server;
use crate::watch::ChangeWatcher;
use crate::BlogServe;

/// Start watching the content root and serve until Ctrl+C
pub async fn run(app: &BlogServe) -> Result<()> {
    // Watch setup failures are fatal, before anything is served
    let watcher = ChangeWatcher::new(&app.config.root)?;
    tracing::info!("Live reload enabled. Watching {:?} for changes...", watcher.root());
    if let Some(window) = app.config.debounce {
        tracing::info!("Debouncing changes within {:?}", window);
    }
    tokio::spawn(reload::relay(
        watcher.into_stream(),
        app.broadcaster.clone(),
        app.config.debounce,
    ));

    let shutdown = app.shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down...");
                shutdown.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    server::start(&app.config, app.broadcaster.clone(), app.shutdown.clone()).await
}
