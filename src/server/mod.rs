//! HTTP server: post listing, live reload stream and static files

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::content;
use crate::error::Error;
use crate::reload::ReloadBroadcaster;

/// Server state, built once at startup and shared by all handlers
pub struct ServerState {
    /// Content root, scanned on every listing request
    pub root: PathBuf,
    pub broadcaster: ReloadBroadcaster,
    /// Fires on shutdown; parent of every reload stream's cancellation token
    pub shutdown: CancellationToken,
}

/// Build the application router
pub fn router(state: Arc<ServerState>, frontend_dir: &Path) -> Router {
    let api = Router::new()
        .route("/posts", get(posts_handler))
        .route("/reload", get(reload_handler))
        .layer(CorsLayer::new().allow_origin(Any));

    let assets = ServeDir::new(&state.root);
    let frontend =
        ServeDir::new(frontend_dir).fallback(ServeFile::new(frontend_dir.join("index.html")));

    Router::new()
        .nest("/api", api)
        .nest_service("/data", assets)
        .fallback_service(frontend)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Start the server and run until `shutdown` fires
pub async fn start(
    config: &ServerConfig,
    broadcaster: ReloadBroadcaster,
    shutdown: CancellationToken,
) -> Result<()> {
    let state = Arc::new(ServerState {
        root: config.root.clone(),
        broadcaster,
        shutdown: shutdown.clone(),
    });
    let app = router(state, &config.frontend_dir);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind {
            addr: addr.to_string(),
            source,
        })?;

    tracing::info!("Server listening on {}", config.url());
    println!("Server running at {}", config.url());
    println!("Press Ctrl+C to stop.");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// GET /api/posts - all valid posts as JSON, rescanned on every request
async fn posts_handler(State(state): State<Arc<ServerState>>) -> Response {
    let root = state.root.clone();
    match tokio::task::spawn_blocking(move || content::scan(&root)).await {
        Ok(Ok(posts)) => Json(posts).into_response(),
        Ok(Err(e)) => {
            tracing::error!("Failed to scan directory for posts: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            tracing::error!("Scan task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /api/reload - server-sent events, one `reload` message per change
async fn reload_handler(
    State(state): State<Arc<ServerState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state
        .broadcaster
        .subscribe(state.shutdown.child_token())
        .map(|event| Ok(Event::default().id(event.seq.to_string()).data("reload")));

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(root: &Path, frontend: &Path) -> (Router, Arc<ServerState>) {
        let state = Arc::new(ServerState {
            root: root.to_path_buf(),
            broadcaster: ReloadBroadcaster::new(),
            shutdown: CancellationToken::new(),
        });
        (router(Arc::clone(&state), frontend), state)
    }

    fn write_post(root: &Path, slug: &str, files: &[(&str, &str)]) {
        let dir = root.join(slug);
        fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            fs::write(dir.join(name), content).unwrap();
        }
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_list_posts() {
        let tmp = TempDir::new().unwrap();
        write_post(
            tmp.path(),
            "post-a",
            &[("a.md", "A"), ("meta.json", r#"{"title": "Title A", "date": "2024-01-01"}"#)],
        );
        write_post(tmp.path(), "post-b", &[("b.md", "B")]);
        write_post(tmp.path(), "broken", &[("a.md", ""), ("b.md", "")]);
        let (app, _) = app(tmp.path(), tmp.path());

        let response = app.oneshot(get("/api/posts")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let posts: Vec<content::Post> = serde_json::from_str(&body_string(response).await).unwrap();
        let slugs: Vec<_> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["post-a", "post-b"]);
        assert_eq!(posts[0].metadata.title, "Title A");
        assert_eq!(posts[1].content, "B");
    }

    /// Log sink shared between the test and the fmt layer
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_requests_are_logged_by_default() {
        let tmp = TempDir::new().unwrap();
        let (app, _) = app(tmp.path(), tmp.path());

        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(
                crate::config::DEFAULT_LOG_FILTER,
            ))
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let response = app.oneshot(get("/api/posts")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let log = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(log.contains("GET"), "{}", log);
        assert!(log.contains("/api/posts"), "{}", log);
        assert!(log.contains("latency"), "{}", log);
    }

    #[tokio::test]
    async fn test_list_posts_empty_root() {
        let tmp = TempDir::new().unwrap();
        let (app, _) = app(tmp.path(), tmp.path());

        let response = app.oneshot(get("/api/posts")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "[]");
    }

    #[tokio::test]
    async fn test_list_posts_unreadable_root() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("missing");
        let (app, _) = app(&missing, tmp.path());

        let response = app.oneshot(get("/api/posts")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_string(response).await.contains("missing"));
    }

    #[tokio::test]
    async fn test_api_allows_any_origin() {
        let tmp = TempDir::new().unwrap();
        let (app, _) = app(tmp.path(), tmp.path());

        let request = Request::builder()
            .uri("/api/posts")
            .header(header::ORIGIN, "http://localhost:5173")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_reload_stream_delivers_events() {
        let tmp = TempDir::new().unwrap();
        let (app, state) = app(tmp.path(), tmp.path());

        let response = app.oneshot(get("/api/reload")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(state.broadcaster.subscriber_count(), 1);

        assert_eq!(state.broadcaster.notify(), 1);
        let mut body = response.into_body().into_data_stream();
        let chunk = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(chunk.to_vec()).unwrap();
        assert!(text.contains("data: reload"));
        assert!(text.contains("id: 1"));

        drop(body);
        assert_eq!(state.broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_closes_reload_streams() {
        let tmp = TempDir::new().unwrap();
        let (app, state) = app(tmp.path(), tmp.path());

        let response = app.oneshot(get("/api/reload")).await.unwrap();
        let mut body = response.into_body().into_data_stream();

        state.shutdown.cancel();
        let next = tokio::time::timeout(Duration::from_secs(5), body.next())
            .await
            .unwrap();
        assert!(next.is_none());
        assert_eq!(state.broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_post_assets_are_served() {
        let tmp = TempDir::new().unwrap();
        write_post(tmp.path(), "post", &[("post.md", "# Post"), ("cover.txt", "cover")]);
        let (app, _) = app(tmp.path(), tmp.path());

        let response = app.oneshot(get("/data/post/cover.txt")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "cover");
    }

    #[tokio::test]
    async fn test_frontend_fallback_serves_index() {
        let content = TempDir::new().unwrap();
        let frontend = TempDir::new().unwrap();
        fs::write(frontend.path().join("index.html"), "<html>app</html>").unwrap();
        fs::write(frontend.path().join("app.js"), "console.log(1)").unwrap();
        let (app, _) = app(content.path(), frontend.path());

        let response = app.clone().oneshot(get("/app.js")).await.unwrap();
        assert_eq!(body_string(response).await, "console.log(1)");

        let response = app.oneshot(get("/posts/hello")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<html>app</html>");
    }
}
