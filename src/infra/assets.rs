//! Asset sources for the renderer: a local directory or a remote base URL.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, Url};

use crate::application::render::{AssetError, AssetSource};

/// Reads assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, AssetError> {
        let relative = Path::new(name);
        let plain = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !plain {
            return Err(AssetError::NotFound {
                name: name.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl AssetSource for FsAssetSource {
    async fn fetch(&self, name: &str) -> Result<Bytes, AssetError> {
        let path = self.resolve(name)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(AssetError::NotFound {
                name: name.to_string(),
            }),
            Err(err) => Err(AssetError::Fetch {
                name: name.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

/// Fetches assets relative to a base URL.
#[derive(Debug, Clone)]
pub struct HttpAssetSource {
    client: Client,
    base: Url,
}

impl HttpAssetSource {
    /// `timeout` bounds each fetch as a whole, so a stalled server fails the render
    /// instead of holding the cycle.
    pub fn new(base: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("missive/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base })
    }
}

#[async_trait]
impl AssetSource for HttpAssetSource {
    async fn fetch(&self, name: &str) -> Result<Bytes, AssetError> {
        let fetch_error = |reason: String| AssetError::Fetch {
            name: name.to_string(),
            reason,
        };

        let url = self
            .base
            .join(name)
            .map_err(|err| fetch_error(err.to_string()))?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| fetch_error(err.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(AssetError::NotFound {
                name: name.to_string(),
            }),
            status if !status.is_success() => Err(fetch_error(format!("HTTP {status}"))),
            _ => response
                .bytes()
                .await
                .map_err(|err| fetch_error(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_source_reads_files_under_its_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("logo.jpg"), b"jpeg").expect("write");
        let source = FsAssetSource::new(dir.path().to_path_buf());

        let bytes = source.fetch("logo.jpg").await.expect("asset");
        assert_eq!(bytes.as_ref(), b"jpeg");

        let missing = source.fetch("stamp.jpg").await.expect_err("missing");
        assert!(matches!(missing, AssetError::NotFound { .. }));
    }

    #[tokio::test]
    async fn fs_source_refuses_to_leave_its_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = FsAssetSource::new(dir.path().to_path_buf());

        for name in ["../secret", "/etc/passwd", ""] {
            let err = source.fetch(name).await.expect_err("rejected");
            assert!(matches!(err, AssetError::NotFound { .. }), "{name}");
        }
    }

    #[tokio::test]
    async fn http_source_gives_up_on_a_silent_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let address = listener.local_addr().expect("address");
        // accept connections and never answer
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let base = Url::parse(&format!("http://{address}/assets/")).expect("url");
        let source = HttpAssetSource::new(base, Duration::from_millis(200)).expect("client");
        let started = std::time::Instant::now();
        let err = tokio::time::timeout(Duration::from_secs(5), source.fetch("logo.jpg"))
            .await
            .expect("fetch returns on its own")
            .expect_err("timed out");

        assert!(matches!(err, AssetError::Fetch { .. }), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }
}
