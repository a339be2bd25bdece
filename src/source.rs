//! Where the dashboard fetches `metadata.json` and partition fragments from.

use crate::error::FetchError;
use crate::partition::METADATA_FILE;
use crate::types::{IndexEntry, PartitionKey, Record};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

pub trait PartitionSource: Send + Sync {
    fn fetch_metadata(&self) -> impl Future<Output = Result<Vec<IndexEntry>, FetchError>> + Send;

    fn fetch_partition(
        &self,
        key: PartitionKey,
    ) -> impl Future<Output = Result<Vec<Record>, FetchError>> + Send;
}

/// Plain `GET {base_url}/data/{file}`.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, file: &str) -> Result<T, FetchError> {
        let url = format!("{}/data/{}", self.base_url, file);
        debug!(%url, "fetching");
        let transport = |source| FetchError::Transport {
            resource: file.to_string(),
            source,
        };
        let response = self.client.get(&url).send().await.map_err(transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(file.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                resource: file.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(transport)?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            resource: file.to_string(),
            source,
        })
    }
}

impl PartitionSource for HttpSource {
    fn fetch_metadata(&self) -> impl Future<Output = Result<Vec<IndexEntry>, FetchError>> + Send {
        self.get_json(METADATA_FILE)
    }

    fn fetch_partition(
        &self,
        key: PartitionKey,
    ) -> impl Future<Output = Result<Vec<Record>, FetchError>> + Send {
        async move { self.get_json(&key.file_name()).await }
    }
}

/// Reads fragments straight from the data directory.
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<T, FetchError> {
        let path = self.dir.join(file);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FetchError::NotFound(file.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|source| FetchError::Decode {
            resource: file.to_string(),
            source,
        })
    }
}

impl PartitionSource for DirSource {
    fn fetch_metadata(&self) -> impl Future<Output = Result<Vec<IndexEntry>, FetchError>> + Send {
        self.read_json(METADATA_FILE)
    }

    fn fetch_partition(
        &self,
        key: PartitionKey,
    ) -> impl Future<Output = Result<Vec<Record>, FetchError>> + Send {
        async move { self.read_json(&key.file_name()).await }
    }
}
