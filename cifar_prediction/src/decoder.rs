use crate::error::ClassificationError;
use cifar_proto::{Chunk, ImageChunk, TextChunk};
use futures::{Stream, TryStreamExt};
use tonic::Status;

/// Concatenates the chunk payloads of `stream` in arrival order.
///
/// A transport error ends reassembly and is returned as is; no partial
/// payload is handed out.
pub async fn reassemble<C, S>(mut stream: S) -> Result<Vec<u8>, Status>
where
    C: Chunk,
    S: Stream<Item = Result<C, Status>> + Unpin,
{
    let mut payload = Vec::new();
    let mut chunks = 0usize;

    while let Some(chunk) = stream.try_next().await? {
        payload.extend_from_slice(&chunk.into_bytes());
        chunks += 1;
    }

    tracing::debug!("Reassembled {} bytes from {} chunks", payload.len(), chunks);
    Ok(payload)
}

pub async fn decode_text<S>(stream: S) -> Result<String, ClassificationError>
where
    S: Stream<Item = Result<TextChunk, Status>> + Unpin,
{
    let payload = reassemble(stream).await?;
    Ok(String::from_utf8(payload)?)
}

pub async fn decode_image<S>(stream: S) -> Result<Vec<u8>, ClassificationError>
where
    S: Stream<Item = Result<ImageChunk, Status>> + Unpin,
{
    Ok(reassemble(stream).await?)
}
