mod client;
mod encoder;
mod images;

pub use client::{remote_uri, ClassificationClient, ClientError, RetryConfig};
pub use encoder::{chunks_of, text_chunks, ImageChunker};
pub use images::{classify_dir, image_paths};
