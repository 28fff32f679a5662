//! HTTP service started by `cfgm serve`.

use crate::settings::ServerConfig;
use anyhow::Context;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the router: `/health`, `/` and static files under `/docs`.
pub fn build_router(config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest_service("/docs", ServeDir::new(&config.docs))
        .layer(TraceLayer::new_for_http())
}

async fn root() -> Json<Value> {
    Json(json!({"message": "Hello, World!"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Socket address for a configured listen address; `:port` binds all
/// interfaces.
pub fn listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// A running server.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!("Server task failed: {}", e);
        }
    }
}

/// Bind and start serving in the background.
pub async fn start_server(config: &ServerConfig) -> anyhow::Result<ServerHandle> {
    let app = build_router(config);
    let listener = tokio::net::TcpListener::bind(listen_addr(&config.addr))
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    let addr = listener.local_addr()?;

    info!("Server listening on http://{}", addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Server shutting down");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(ServerHandle {
        addr,
        shutdown_tx,
        task,
    })
}

/// Serve until Ctrl-C, then shut down within `server.timeout`.
pub async fn run(config: &ServerConfig) -> anyhow::Result<()> {
    let handle = start_server(config).await?;
    info!(docs = %config.docs, timeout = ?config.timeout, idletime = ?config.idletime, "Server started");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    if tokio::time::timeout(config.timeout, handle.shutdown()).await.is_err() {
        warn!("Server did not stop within {:?}", config.timeout);
    } else {
        info!("Server stopped gracefully");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn config(docs: &TempDir) -> ServerConfig {
        ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            docs: docs.path().display().to_string(),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_listen_addr() {
        assert_eq!(listen_addr(":40117"), "0.0.0.0:40117");
        assert_eq!(listen_addr("127.0.0.1:8080"), "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_health_and_root() {
        let docs = TempDir::new().unwrap();
        let handle = start_server(&config(&docs)).await.unwrap();

        let health = get(handle.addr, "/health").await;
        assert!(health.starts_with("HTTP/1.1 200"), "{health}");
        assert!(health.contains(r#"{"status":"ok"}"#), "{health}");

        let root = get(handle.addr, "/").await;
        assert!(root.contains(r#"{"message":"Hello, World!"}"#), "{root}");

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_docs_are_served() {
        let docs = TempDir::new().unwrap();
        std::fs::write(docs.path().join("guide.html"), "<h1>guide</h1>").unwrap();
        let handle = start_server(&config(&docs)).await.unwrap();

        let page = get(handle.addr, "/docs/guide.html").await;
        assert!(page.starts_with("HTTP/1.1 200"), "{page}");
        assert!(page.contains("<h1>guide</h1>"));

        let missing = get(handle.addr, "/docs/missing.html").await;
        assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");

        handle.shutdown().await;
    }
}
