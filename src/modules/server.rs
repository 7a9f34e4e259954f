//! Ingestion server
//!
//! Accepts connections one at a time: each connection carries exactly one
//! request, which is read, handled and answered before the next connection is
//! accepted. The read timeout also bounds writing the response, so a stalled
//! client cannot hold the loop.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;

use super::config::ServerConfig;
use super::enhanced_error::{network_ops, EnhancedError};
use super::error::IngestError;
use super::http_request::{read_request, RequestLimits};
use super::http_version::HttpVersion;
use super::ingest_handler::IngestHandler;
use super::storage::{file_storage, DirImageStore, FileUserLog, ImageStore, UserLog};

/// Serial HTTP server around an ingestion handler
pub struct Server<L, I> {
    listener: TcpListener,
    handler: IngestHandler<L, I>,
    limits: RequestLimits,
    read_timeout: Duration,
}

impl Server<FileUserLog, DirImageStore> {
    /// Bind the configured address with filesystem storage under `data_dir`
    pub async fn bind(config: &ServerConfig) -> Result<Self, EnhancedError> {
        let listener = network_ops::bind_tcp_listener(&config.listen_address()).await?;
        let (user_log, images) = file_storage(&config.data_dir);
        Ok(Self::from_parts(listener, IngestHandler::new(user_log, images), config))
    }
}

impl<L: UserLog, I: ImageStore> Server<L, I> {
    pub fn from_parts(listener: TcpListener, handler: IngestHandler<L, I>, config: &ServerConfig) -> Self {
        Self {
            listener,
            handler,
            limits: config.limits,
            read_timeout: config.read_timeout,
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until Ctrl+C or SIGTERM
    pub async fn run(self) {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` completes. A request in flight is finished first.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.serve_connection(stream, peer).await,
                    Err(e) => {
                        // Usually descriptor exhaustion; back off instead of spinning
                        warn!("Failed to accept connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }

        info!("Server stopped");
    }

    async fn serve_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);

        let read = tokio::time::timeout(self.read_timeout, read_request(&mut reader, &self.limits)).await;

        let (response, version) = match read {
            Err(_) => {
                debug!("Timed out reading request from {}", peer);
                return;
            }
            Ok(Err(IngestError::Connection(e))) => {
                debug!("Dropped connection from {}: {}", peer, e);
                return;
            }
            Ok(Err(e)) => {
                warn!("Bad request from {}: {}", peer, e);
                (e.to_response(), HttpVersion::Http11)
            }
            Ok(Ok(request)) => {
                let response = self.handler.handle(&request);
                info!(
                    "{} \"{} {} {}\" {}",
                    peer, request.line.method, request.line.target, request.line.version, response.status_code
                );
                (response, request.line.version)
            }
        };

        let encoded = response.encode(&version);
        let write = async {
            writer.write_all(&encoded).await?;
            writer.shutdown().await
        };
        match tokio::time::timeout(self.read_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Failed to write response to {}: {}", peer, e),
            Err(_) => debug!("Timed out writing response to {}", peer),
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::{IMAGES_DIR, USER_LOG_FILE};
    use std::fs;
    use std::path::Path;
    use tokio::io::AsyncReadExt;

    const PNG_B64: &str = "iVBORw0KGgo=";

    async fn test_server(data_dir: &Path, configure: impl FnOnce(&mut ServerConfig)) -> Server<FileUserLog, DirImageStore> {
        let mut config = ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            data_dir: data_dir.to_path_buf(),
            ..ServerConfig::default()
        };
        configure(&mut config);
        Server::bind(&config).await.unwrap()
    }

    /// Send raw bytes and read until the server closes the connection
    async fn exchange(addr: SocketAddr, raw: &[u8]) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(raw).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        let status = response
            .split(' ')
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap_or(0);
        (status, response)
    }

    fn post(body: &str) -> Vec<u8> {
        format!(
            "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    fn get() -> Vec<u8> {
        b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n".to_vec()
    }

    fn submission(label: &str, id: &str) -> String {
        serde_json::json!({ "label": label, "id": id, "img": PNG_B64 }).to_string()
    }

    fn image_count(data_dir: &Path) -> usize {
        fs::read_dir(data_dir.join(IMAGES_DIR)).map(|d| d.count()).unwrap_or(0)
    }

    fn log_lines(data_dir: &Path) -> Vec<String> {
        fs::read_to_string(data_dir.join(USER_LOG_FILE))
            .map(|c| c.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_submit_then_list() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(dir.path(), |_| {}).await;
        let addr = server.local_addr().unwrap();

        let client = async {
            let (status, response) = exchange(addr, &post(&submission("3", "alice"))).await;
            assert_eq!(status, 200);
            assert!(response.contains("Content-Type: text/html\r\n"));
            assert!(response.ends_with("\r\n\r\n"));

            let (status, response) = exchange(addr, &get()).await;
            assert_eq!(status, 200);
            assert!(response.ends_with("<html><body><h1>Current Users:</h1>alice</body></html>"));
        };

        tokio::select! {
            _ = server.run_until(std::future::pending()) => unreachable!(),
            _ = client => {}
        }

        assert_eq!(log_lines(dir.path()), vec!["alice"]);
        assert_eq!(image_count(dir.path()), 1);
        let entry = fs::read_dir(dir.path().join(IMAGES_DIR)).unwrap().next().unwrap().unwrap();
        let name = entry.file_name().to_string_lossy().to_string();
        assert!(name.starts_with("3_alice_") && name.ends_with(".png"));
        assert_eq!(&fs::read(entry.path()).unwrap()[..4], b"\x89PNG");
    }

    #[tokio::test]
    async fn test_same_id_twice() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(dir.path(), |_| {}).await;
        let addr = server.local_addr().unwrap();

        let client = async {
            for _ in 0..2 {
                let (status, _) = exchange(addr, &post(&submission("3", "alice"))).await;
                assert_eq!(status, 200);
            }
        };

        tokio::select! {
            _ = server.run_until(std::future::pending()) => unreachable!(),
            _ = client => {}
        }

        assert_eq!(log_lines(dir.path()), vec!["alice", "alice"]);
        assert_eq!(image_count(dir.path()), 2);
    }

    #[tokio::test]
    async fn test_bad_requests_do_not_stop_the_server() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(dir.path(), |_| {}).await;
        let addr = server.local_addr().unwrap();

        let client = async {
            let (status, first) = exchange(addr, &post("definitely not json")).await;
            assert_eq!(status, 400);
            let (status, second) = exchange(addr, &post("definitely not json")).await;
            assert_eq!(status, 400);
            assert_eq!(first, second);

            let (status, _) = exchange(addr, &post(r#"{"label": "3", "id": "alice"}"#)).await;
            assert_eq!(status, 400);

            let (status, _) = exchange(addr, b"GARBAGE\r\n\r\n").await;
            assert_eq!(status, 400);

            let (status, response) = exchange(addr, &get()).await;
            assert_eq!(status, 200);
            assert!(response.ends_with("<html><body><h1>Current Users:</h1></body></html>"));
        };

        tokio::select! {
            _ = server.run_until(std::future::pending()) => unreachable!(),
            _ = client => {}
        }

        assert!(!dir.path().join(USER_LOG_FILE).exists());
        assert_eq!(image_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(dir.path(), |config| config.limits.max_body_bytes = 16).await;
        let addr = server.local_addr().unwrap();

        let client = async {
            // Only the head is sent; the server answers before reading a body
            let (status, _) = exchange(addr, b"POST / HTTP/1.1\r\nContent-Length: 4096\r\n\r\n").await;
            assert_eq!(status, 413);
        };

        tokio::select! {
            _ = server.run_until(std::future::pending()) => unreachable!(),
            _ = client => {}
        }

        assert!(log_lines(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_stalled_client_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(dir.path(), |config| config.read_timeout = Duration::from_secs(1)).await;
        let addr = server.local_addr().unwrap();

        let client = async {
            let _idle = TcpStream::connect(addr).await.unwrap();
            let (status, _) = exchange(addr, &get()).await;
            assert_eq!(status, 200);
        };

        tokio::select! {
            _ = server.run_until(std::future::pending()) => unreachable!(),
            _ = client => {}
        }
    }

    #[tokio::test]
    async fn test_client_that_never_reads_times_out() {
        let dir = tempfile::tempdir().unwrap();
        // A listing far larger than the socket buffers
        let line = format!("{}\n", "u".repeat(63));
        fs::write(dir.path().join(USER_LOG_FILE), line.repeat(512 * 1024)).unwrap();
        let server = test_server(dir.path(), |config| config.read_timeout = Duration::from_secs(1)).await;
        let addr = server.local_addr().unwrap();

        let client = async {
            let mut stalled = TcpStream::connect(addr).await.unwrap();
            stalled.write_all(&get()).await.unwrap();

            let (status, _) = exchange(addr, &post(&submission("3", "alice"))).await;
            assert_eq!(status, 200);
            drop(stalled);
        };

        tokio::select! {
            _ = server.run_until(std::future::pending()) => unreachable!(),
            result = tokio::time::timeout(Duration::from_secs(30), client) => result.unwrap(),
        }

        assert_eq!(log_lines(dir.path()).last().map(String::as_str), Some("alice"));
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported_and_leaves_log_alone() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the image directory belongs
        fs::write(dir.path().join(IMAGES_DIR), b"").unwrap();
        let server = test_server(dir.path(), |_| {}).await;
        let addr = server.local_addr().unwrap();

        let client = async {
            let (status, response) = exchange(addr, &post(&submission("3", "alice"))).await;
            assert_eq!(status, 500);
            assert!(!response.contains(IMAGES_DIR));

            let (status, _) = exchange(addr, &get()).await;
            assert_eq!(status, 200);
        };

        tokio::select! {
            _ = server.run_until(std::future::pending()) => unreachable!(),
            _ = client => {}
        }

        assert!(!dir.path().join(USER_LOG_FILE).exists());
        assert!(dir.path().join(IMAGES_DIR).is_file());
    }

    #[tokio::test]
    async fn test_long_id_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(dir.path(), |_| {}).await;
        let addr = server.local_addr().unwrap();
        let id = "a".repeat(300);

        let client = async {
            let (status, _) = exchange(addr, &post(&submission("3", &id))).await;
            assert_eq!(status, 200);
        };

        tokio::select! {
            _ = server.run_until(std::future::pending()) => unreachable!(),
            _ = client => {}
        }

        assert_eq!(log_lines(dir.path()), vec![id.clone()]);
        assert_eq!(image_count(dir.path()), 1);
    }

    #[tokio::test]
    async fn test_http10_response_has_no_connection_header() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(dir.path(), |_| {}).await;
        let addr = server.local_addr().unwrap();

        let client = async {
            let (status, response) = exchange(addr, b"GET / HTTP/1.0\r\n\r\n").await;
            assert_eq!(status, 200);
            assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
            assert!(!response.contains("Connection:"));
        };

        tokio::select! {
            _ = server.run_until(std::future::pending()) => unreachable!(),
            _ = client => {}
        }
    }

    #[tokio::test]
    async fn test_shutdown_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let server = test_server(dir.path(), |_| {}).await;

        tokio::time::timeout(Duration::from_secs(5), server.run_until(async {}))
            .await
            .unwrap();
    }
}
