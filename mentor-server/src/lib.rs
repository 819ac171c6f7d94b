//! HTTP API for the issue mentor
//!
//! Routes:
//! - `POST /api/mentor` - one-shot hint for an issue and the developer's code
//! - `POST /api/chat/send` - persisted mentor chat, scoped by session cookie
//! - `GET /api/chat/history` - stored chat for an issue
//! - `POST /api/file-finder` - predict which file to open first
//!
//! The binary wires everything from `config::Settings`; embedders can build
//! an `AppState` themselves and call [`router`] or [`start_server_on`].

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use mentor_core::MentorService;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub mod error;
pub mod routes;
pub mod services;
pub mod session;

pub use services::{Services, build_services};

#[derive(Clone)]
pub struct AppState {
    pub mentor: Arc<MentorService>,
    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/mentor", post(routes::mentor_hint))
        .route("/api/chat/send", post(routes::chat_send))
        .route("/api/chat/history", get(routes::chat_history))
        .route("/api/file-finder", post(routes::file_finder))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle to a running server that can be used to stop it
pub struct ServerHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
    addr: SocketAddr,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for in-flight requests to finish
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            error!("server task failed: {}", e);
        }
    }
}

/// Start the API on the specified host and port
///
/// Use port 0 to get a random available port.
pub async fn start_server_on(host: &str, port: u16, state: AppState) -> anyhow::Result<ServerHandle> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    info!("Starting mentor server on {}", local_addr);

    let app = router(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
            info!("Shutting down mentor server");
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("server error: {}", e);
        }
    });

    Ok(ServerHandle {
        shutdown_tx,
        task,
        addr: local_addr,
    })
}
