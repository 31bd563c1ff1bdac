use bytes::Bytes;
use tracing::trace;

use super::chunk::ChunkSource;
use crate::data::ChunkAddress;

/// [`ChunkSource`] backed by a plain HTTP object store.
///
/// Chunk `{region, bucket, id, index}` is fetched with
/// `GET {base_url}/{region}/{bucket}/{id}/{index}`. Any non-success status is
/// an error, so the fetcher retries it like a network failure.
#[derive(Debug, Clone)]
pub struct HttpChunkSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChunkSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn url(&self, address: &ChunkAddress) -> String {
        format!("{}/{}", self.base_url, address)
    }
}

impl ChunkSource for HttpChunkSource {
    type Error = reqwest::Error;

    async fn fetch(&self, address: &ChunkAddress) -> Result<Bytes, Self::Error> {
        let url = self.url(address);
        trace!(%url, "GET chunk");
        let response = self.client.get(&url).send().await?.error_for_status()?;
        response.bytes().await
    }
}
