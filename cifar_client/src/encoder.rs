use cifar_proto::{Chunk, ImageChunk, TextChunk};
use std::{
    fs::File,
    io::{self, Read},
    path::Path,
};

/// Splits `payload` into consecutive windows of `C::SIZE` bytes.
///
/// Only the last chunk may be shorter and an empty payload yields no chunk.
pub fn chunks_of<C: Chunk>(payload: &[u8]) -> impl Iterator<Item = C> + '_ {
    payload
        .chunks(C::SIZE)
        .map(|window| C::from_bytes(window.to_vec()))
}

pub fn text_chunks(text: &str) -> impl Iterator<Item = TextChunk> + '_ {
    chunks_of(text.as_bytes())
}

/// Reads an image in `ImageChunk::SIZE` windows until a zero-length read.
///
/// Every window is filled unless the end of the input is reached, so only the
/// last chunk can be short. Iteration stops after the first I/O error.
pub struct ImageChunker<R> {
    reader: R,
    done: bool,
}

impl ImageChunker<File> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read> ImageChunker<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }
}

impl<R: Read> Iterator for ImageChunker<R> {
    type Item = io::Result<ImageChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut window = Vec::with_capacity(ImageChunk::SIZE);
        match (&mut self.reader)
            .take(ImageChunk::SIZE as u64)
            .read_to_end(&mut window)
        {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => Some(Ok(ImageChunk::from_bytes(window))),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
