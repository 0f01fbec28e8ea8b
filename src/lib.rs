//! studiod - AI image studio server daemon
//!
//! A small HTTP service behind a browser image studio: forwards prompts to a
//! hosted image model and keeps the user's saved-image library.

pub mod api;
pub mod config;
pub mod gemini;
pub mod library;
pub mod storage;
pub mod styles;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub use config::Config;
use gemini::GeminiClient;
use library::LibraryStore;
use storage::{Database, SqliteStorage};
use styles::StyleRegistry;

/// The studiod server instance
pub struct Server {
    config: Config,
    state: api::AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a new server instance
    pub async fn new(config: Config) -> Result<Self> {
        let db = Arc::new(Database::new(config.database.as_deref()).await?);
        let storage = Arc::new(SqliteStorage::new(db.pool().clone()));
        let library = Arc::new(LibraryStore::open(storage).await);

        let state = api::AppState {
            db,
            library,
            styles: Arc::new(StyleRegistry::new()),
            model: Arc::new(GeminiClient::new(&config.model)),
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            state,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the shared application state
    pub fn state(&self) -> &api::AppState {
        &self.state
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("studiod listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("studiod shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
