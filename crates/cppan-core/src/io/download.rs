//! Checksummed downloads
//!
//! Bodies are streamed to disk while a SHA-256 is computed over the received
//! bytes, so the caller can verify integrity without reading the file twice.

use std::path::Path;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Moves bytes from a URL into a local file.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download `url` into `dest` and return the hex SHA-256 of the body.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<String, DownloadError>;
}

/// [`Transport`] over a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<String, DownloadError> {
        debug!("GET {url}");
        let response = self.client.get(url).send().await?.error_for_status()?;

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
        }

        file.flush().await?;
        Ok(hex::encode(hasher.finalize()))
    }
}

/// SHA-256 of a byte slice, lowercase hex.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_streams_and_hashes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/client/cppan.zip")
            .with_status(200)
            .with_body("client bytes")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("download");
        let transport = HttpTransport::new(Client::new());
        let url = format!("{}/client/cppan.zip", server.url());

        let hash = transport.fetch(&url, &dest).await.unwrap();

        mock.assert_async().await;
        assert_eq!(std::fs::read(&dest).unwrap(), b"client bytes");
        assert_eq!(hash, sha256_bytes(b"client bytes"));
    }

    #[tokio::test]
    async fn test_fetch_fails_on_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let transport = HttpTransport::new(Client::new());
        let url = format!("{}/missing", server.url());

        let err = transport.fetch(&url, &dir.path().join("x")).await.unwrap_err();
        assert!(matches!(err, DownloadError::Http(_)));
        assert!(!dir.path().join("x").exists());
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
