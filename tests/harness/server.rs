//! TestServer - True end-to-end test harness
//!
//! Spawns the actual studiod binary on a random port with on-disk SQLite
//! database. Uses a temporary directory for each test instance to ensure
//! isolation while exercising the complete server binary including CLI
//! parsing.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tempfile::TempDir;

/// Test harness that spawns the actual studiod binary on a random port
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    child: Child,
    /// Temp directory for the database (cleaned up on drop); None when the
    /// caller owns the database path
    _temp_dir: Option<TempDir>,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestServer {
    /// Start a new test server instance with a fresh database
    pub async fn start() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("test.db");
        Self::spawn(db_path, Some(temp_dir)).await
    }

    /// Start a test server against an existing database path (restart
    /// scenarios)
    pub async fn start_with_db(db_path: &Path) -> Result<Self> {
        Self::spawn(db_path.to_path_buf(), None).await
    }

    async fn spawn(db_path: PathBuf, temp_dir: Option<TempDir>) -> Result<Self> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let binary_path = find_binary_path()?;

        // Spawn the server process; strip any ambient API key so generation
        // endpoints behave the same on every machine
        let child = Command::new(&binary_path)
            .arg("--bind")
            .arg(addr.to_string())
            .arg("--database")
            .arg(db_path.to_string_lossy().as_ref())
            .env_remove("GEMINI_API_KEY")
            .env_remove("STUDIOD_MODEL__API_KEY")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                anyhow::anyhow!("Failed to spawn studiod binary at {:?}: {}", binary_path, e)
            })?;

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 5 seconds to handle resource contention)
        let mut ready = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 5 seconds");
        }

        Ok(Self {
            addr,
            client,
            child,
            _temp_dir: temp_dir,
            db_path,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body
    pub async fn post<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// Make a POST request with a raw body (import files)
    pub async fn post_bytes(&self, path: &str, body: Vec<u8>) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .body(body)
            .send()
            .await?)
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .delete(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }
}

/// Find the studiod binary path
fn find_binary_path() -> Result<PathBuf> {
    let candidates = [
        // Debug build (most common for tests)
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target/debug/studiod"),
        // Release build
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("target/release/studiod"),
        // Workspace root debug
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../target/debug/studiod"),
        // Workspace root release
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../target/release/studiod"),
    ];

    for path in &candidates {
        if path.exists() {
            return Ok(path.clone());
        }
    }

    anyhow::bail!(
        "Could not find studiod binary. Run 'cargo build' first. Searched: {:?}",
        candidates
    )
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
