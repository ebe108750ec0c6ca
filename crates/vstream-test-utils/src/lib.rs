//! Shared test utilities for the event-stream integration suite, grounded
//! on `rt-test-utils::MockWsServer`'s spawn-a-real-server-and-hand-back-the-
//! address shape.

use std::net::SocketAddr;

use vstream_server::{RunningServer, ServerConfig};
use vstream_store::BackendKind;

/// A server running against a throwaway temp directory, plus the directory
/// itself (kept alive so it isn't cleaned up underneath the server).
pub struct TestServer {
    _dir: tempfile::TempDir,
    inner: RunningServer,
}

impl TestServer {
    /// Starts a server on a random port with a fresh on-disk store.
    pub async fn start(backend: BackendKind) -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let config = ServerConfig {
            port: 0,
            backend,
            out: dir.path().to_path_buf(),
            verbose: false,
        };
        let inner = vstream_server::spawn(config).await?;
        Ok(Self { _dir: dir, inner })
    }

    pub fn addr(&self) -> SocketAddr {
        self.inner.addr
    }

    /// Connects a fresh client to this server.
    pub async fn connect(&self) -> Result<vstream_client::Client, vstream_client::ClientError> {
        vstream_client::Client::connect(self.addr()).await
    }

    /// Signals graceful shutdown and waits for the server task to exit.
    pub async fn shutdown(self) -> std::io::Result<()> {
        self.inner.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_starts_and_reports_a_real_port() {
        let server = TestServer::start(BackendKind::Sled).await.unwrap();
        assert_ne!(server.addr().port(), 0);
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn client_can_connect_and_ping() {
        let server = TestServer::start(BackendKind::Sled).await.unwrap();
        let mut client = server.connect().await.unwrap();
        client.ping().await.unwrap();
        server.shutdown().await.unwrap();
    }
}
