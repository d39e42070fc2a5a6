//! Local persistence for generated media.
//!
//! Files land in `{root}/video_{task_id}.{ext}` and are served under
//! `{public_prefix}/video_{task_id}.{ext}`. Writes go to a `.part` file that is
//! renamed once complete, so a half-written clip is never served.
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use futures::{Stream, StreamExt};
use hyper::body::Bytes;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};
use crate::task::TaskId;

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Media handed to the store.
pub enum ArtifactSource {
    RawBytes(Bytes),
    Stream(ByteStream),
    /// Hosted file that must be downloaded first.
    RemoteUrl(String),
}

impl fmt::Debug for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactSource::RawBytes(b) => write!(f, "RawBytes({} bytes)", b.len()),
            ArtifactSource::Stream(_) => f.write_str("Stream(..)"),
            ArtifactSource::RemoteUrl(url) => write!(f, "RemoteUrl({})", url),
        }
    }
}

#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    public_prefix: String,
    extension: String,
    client: Client,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>, public_prefix: impl Into<String>, client: Client) -> Self {
        ArtifactStore {
            root: root.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
            extension: "mp4".to_string(),
            client,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_name(&self, task_id: &TaskId) -> String {
        format!("video_{}.{}", task_id, self.extension)
    }

    pub fn path_for(&self, task_id: &TaskId) -> PathBuf {
        self.root.join(self.file_name(task_id))
    }

    pub fn handle_for(&self, task_id: &TaskId) -> String {
        format!("{}/{}", self.public_prefix, self.file_name(task_id))
    }

    /// Create the media directory if it does not exist yet.
    pub async fn ensure_root(&self) -> AppResult<()> {
        fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Write `source` for `task_id` and return its public handle.
    pub async fn persist(&self, source: ArtifactSource, task_id: &TaskId) -> AppResult<String> {
        self.ensure_root().await?;
        let target = self.path_for(task_id);
        let partial = target.with_extension(format!("{}.part", self.extension));

        let written = match source {
            ArtifactSource::RawBytes(bytes) => self.write_bytes(&partial, &bytes).await,
            ArtifactSource::Stream(stream) => self.write_stream(&partial, stream).await,
            ArtifactSource::RemoteUrl(url) => self.download(&partial, &url).await,
        };
        let written = match written {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        fs::rename(&partial, &target).await?;
        tracing::info!(task_id = %task_id, "saved {} ({} bytes)", target.display(), written);
        Ok(self.handle_for(task_id))
    }

    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> AppResult<u64> {
        fs::write(path, bytes).await?;
        Ok(bytes.len() as u64)
    }

    async fn write_stream(&self, path: &Path, mut stream: ByteStream) -> AppResult<u64> {
        let mut file = fs::File::create(path).await?;
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    async fn download(&self, path: &Path, url: &str) -> AppResult<u64> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Artifact(format!("unsupported URL '{}'", url)));
        }
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Artifact(format!(
                "download of {} failed with status {}",
                url,
                response.status()
            )));
        }
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| io::Error::new(io::ErrorKind::Other, e)));
        self.write_stream(path, Box::pin(stream)).await
    }
}
