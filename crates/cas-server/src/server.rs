use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use cas_index::{KeyIndex, NamedObjects, SledBackend};
use cas_store::ContentStore;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tower::ServiceExt;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// The object store server: an opened store and index plus the router
/// serving them.
pub struct CasServer {
    config: ServerConfig,
    state: AppState,
}

impl CasServer {
    /// Open the content store and key index named by `config`.
    pub async fn open(config: ServerConfig) -> ServerResult<Self> {
        let store = ContentStore::open(&config.store_dir).await?;
        let index_path = config.index_path();
        let backend = tokio::task::spawn_blocking(move || SledBackend::open(index_path))
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))??;
        let named = NamedObjects::new(store.clone(), KeyIndex::new(Arc::new(backend)));
        let state = AppState {
            store,
            named,
            allow_empty_body: config.allow_empty_body,
        };
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Bind the configured address and serve until the process exits.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve_on(listener).await
    }

    /// Serve connections accepted from `listener`.
    pub async fn serve_on(self, listener: TcpListener) -> ServerResult<()> {
        let local: SocketAddr = listener.local_addr()?;
        let header_timeout = Duration::from_secs(self.config.request_header_timeout_secs);
        let app = self.router();
        info!(addr = %local, store = %self.config.store_dir.display(), "cas server listening");

        loop {
            let (stream, peer) = accept_retrying(|| listener.accept(), ACCEPT_BACKOFF).await;
            let app = app.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| app.clone().oneshot(req));
                let conn = http1::Builder::new()
                    .timer(TokioTimer::new())
                    .header_read_timeout(header_timeout)
                    .serve_connection(TokioIo::new(stream), service);
                if let Err(e) = conn.await {
                    debug!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Call `accept` until it yields a connection, pausing `backoff` after each
/// failure so a persistent error does not spin.
async fn accept_retrying<T, F, Fut>(mut accept: F, backoff: Duration) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(conn) => return conn,
            Err(e) => {
                error!(error = %e, "accept failed; backing off");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_store_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            store_dir: dir.path().join("store"),
            ..ServerConfig::default()
        };
        let server = CasServer::open(config).await.unwrap();
        assert!(server.config().store_dir.join("tmp").is_dir());
        assert!(server.config().index_path().exists());
        let _router = server.router();
    }

    #[tokio::test]
    async fn accept_errors_back_off() {
        let backoff = Duration::from_millis(40);
        let mut calls = 0;
        let started = tokio::time::Instant::now();
        let got = accept_retrying(
            || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt <= 3 {
                        Err(io::Error::other("too many open files"))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            backoff,
        )
        .await;

        assert_eq!(got, 4);
        assert!(started.elapsed() >= backoff * 3);
    }

    #[tokio::test]
    async fn serves_over_tcp() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            store_dir: dir.path().to_path_buf(),
            ..ServerConfig::default()
        };
        let server = CasServer::open(config).await.unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(server.serve_on(listener));

        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut conn = tokio::net::TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"GET /healthz HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut reply = String::new();
        conn.read_to_string(&mut reply).await.unwrap();
        assert!(reply.starts_with("HTTP/1.1 200 OK"));
        assert!(reply.ends_with("ok\n"));

        task.abort();
    }
}
