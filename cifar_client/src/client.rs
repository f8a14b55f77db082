use crate::encoder::{text_chunks, ImageChunker};
use cifar_proto::{classification_client::ClassificationClient as GrpcClient, Label};
use std::{io, path::Path};
use thiserror::Error;
use tokio::time::{sleep, timeout, Duration};
use tonic::{
    transport::{Channel, Endpoint, Error},
    Status,
};
use tracing::instrument;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid remote address: {0}")]
    InvalidRemote(#[from] Error),
    #[error("Maximum connection retries exceeded.")]
    MaxRetriesExceeded,
    #[error("Failed to read image: {0}")]
    Io(#[from] io::Error),
    #[error("gRPC request failed: {0}")]
    GrpcRequestFailed(#[from] Status),
    #[error("Server returned unknown label value {0}")]
    UnknownLabel(i32),
}

/// Backoff used while establishing the channel. Calls are never retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(1),
        }
    }
}

/// Accepts `host:port` as well as a full URI.
pub fn remote_uri(remote: &str) -> String {
    if remote.contains("://") {
        remote.to_string()
    } else {
        format!("http://{}", remote)
    }
}

pub struct ClassificationClient {
    client: GrpcClient<Channel>,
}

impl ClassificationClient {
    pub async fn connect(remote: &str, retry: RetryConfig) -> Result<Self, ClientError> {
        let endpoint = Endpoint::from_shared(remote_uri(remote))?;
        let client = Self::get_client(endpoint, &retry).await?;

        Ok(Self { client })
    }

    async fn get_client(
        endpoint: Endpoint,
        retry: &RetryConfig,
    ) -> Result<GrpcClient<Channel>, ClientError> {
        let mut retry_delay = retry.initial_delay;
        let mut retry_count = 0;

        while retry_count < retry.max_retries {
            match timeout(retry.connect_timeout, endpoint.connect()).await {
                Ok(Ok(channel)) => return Ok(GrpcClient::new(channel)),
                Ok(Err(e)) => {
                    tracing::error!("Failed to connect to {}: {:?}", endpoint.uri(), e);
                }
                Err(_) => {
                    tracing::error!("Connection to {} timed out", endpoint.uri());
                }
            }

            retry_count += 1;
            let jitter = rand::random::<f32>() * 0.2 + 0.9;
            sleep(retry_delay.mul_f32(jitter)).await;
            retry_delay = (retry_delay * 2).min(retry.max_delay);
        }

        Err(ClientError::MaxRetriesExceeded)
    }

    /// Streams `text` in `TextChunk`s and returns the server's character count.
    #[instrument(skip(self, text))]
    pub async fn get_text_result(&mut self, text: &str) -> Result<i32, ClientError> {
        let chunks: Vec<_> = text_chunks(text).collect();
        tracing::debug!("Sending {} bytes in {} text chunks", text.len(), chunks.len());

        let response = self.client.get_text_result(tokio_stream::iter(chunks)).await?;
        Ok(response.into_inner().result)
    }

    /// Streams the image at `path` and returns the predicted label.
    ///
    /// The whole file is chunked before the call starts, so a read error never
    /// leaves a truncated image on the server side.
    #[instrument(skip(self, path))]
    pub async fn get_result(&mut self, path: impl AsRef<Path>) -> Result<Label, ClientError> {
        let path = path.as_ref();
        let chunks = ImageChunker::open(path)?.collect::<io::Result<Vec<_>>>()?;
        tracing::debug!("Sending {} in {} image chunks", path.display(), chunks.len());

        let response = self.client.get_result(tokio_stream::iter(chunks)).await?;
        let value = response.into_inner().result;

        Label::try_from(value).map_err(|_| ClientError::UnknownLabel(value))
    }
}
