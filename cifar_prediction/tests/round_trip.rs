use cifar_client::{chunks_of, text_chunks, ImageChunker};
use cifar_prediction::{decode_image, decode_text, reassemble};
use cifar_proto::{Chunk, ImageChunk, TextChunk, IMAGE_CHUNK_SIZE, TEXT_CHUNK_SIZE};
use futures::stream;
use std::io::Cursor;
use tonic::Status;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

fn as_stream<C: Chunk>(chunks: Vec<C>) -> impl futures::Stream<Item = Result<C, Status>> + Unpin {
    stream::iter(chunks.into_iter().map(Ok))
}

#[tokio::test]
async fn test_text_round_trip_across_boundaries() {
    for len in [0, 1, TEXT_CHUNK_SIZE - 1, TEXT_CHUNK_SIZE, TEXT_CHUNK_SIZE + 1, 10, 64, 67] {
        let text: String = "abcdefghij".chars().cycle().take(len).collect();
        let chunks: Vec<TextChunk> = text_chunks(&text).collect();

        assert!(chunks.iter().all(|c| !c.text.is_empty()));
        assert_eq!(chunks.len(), len.div_ceil(TEXT_CHUNK_SIZE));
        assert_eq!(decode_text(as_stream(chunks)).await.unwrap(), text);
    }
}

#[tokio::test]
async fn test_multibyte_text_round_trip() {
    let text = "\u{e9}t\u{e9} \u{1f600} \u{4e2d}\u{6587} caf\u{e9}";
    let chunks: Vec<TextChunk> = text_chunks(text).collect();

    assert_eq!(decode_text(as_stream(chunks)).await.unwrap(), text);
}

#[tokio::test]
async fn test_image_round_trip_across_boundaries() {
    for len in [
        0,
        1,
        IMAGE_CHUNK_SIZE - 1,
        IMAGE_CHUNK_SIZE,
        IMAGE_CHUNK_SIZE + 1,
        2 * IMAGE_CHUNK_SIZE,
        10_000,
    ] {
        let bytes = payload(len);
        let chunks = ImageChunker::new(Cursor::new(bytes.clone()))
            .collect::<std::io::Result<Vec<_>>>()
            .unwrap();

        assert!(chunks.iter().all(|c| !c.image.is_empty()));
        assert_eq!(chunks.len(), len.div_ceil(IMAGE_CHUNK_SIZE));
        assert_eq!(decode_image(as_stream(chunks)).await.unwrap(), bytes);
    }
}

#[tokio::test]
async fn test_generic_chunking_round_trip() {
    let bytes = payload(3 * IMAGE_CHUNK_SIZE + 17);
    let chunks: Vec<ImageChunk> = chunks_of(&bytes).collect();

    assert_eq!(reassemble(as_stream(chunks)).await.unwrap(), bytes);
}
