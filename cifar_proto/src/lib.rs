tonic::include_proto!("cifar");

pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("cifar");

/// Bytes per `TextChunk` sent by the client.
pub const TEXT_CHUNK_SIZE: usize = 8;
/// Bytes per `ImageChunk` read from disk by the client.
pub const IMAGE_CHUNK_SIZE: usize = 4096;

/// Index order of the CIFAR-10 classes as produced by the classifier.
pub const LABELS: [Label; 10] = [
    Label::Airplane,
    Label::Automobile,
    Label::Bird,
    Label::Cat,
    Label::Deer,
    Label::Dog,
    Label::Frog,
    Label::Horse,
    Label::Ship,
    Label::Truck,
];

impl Label {
    /// Checked lookup of a classifier output index.
    pub fn from_index(index: usize) -> Option<Label> {
        LABELS.get(index).copied()
    }
}

/// A bounded byte fragment of a streamed payload.
pub trait Chunk: Send + 'static {
    /// Maximum number of payload bytes carried by one chunk.
    const SIZE: usize;

    fn from_bytes(bytes: Vec<u8>) -> Self;

    fn into_bytes(self) -> Vec<u8>;
}

impl Chunk for TextChunk {
    const SIZE: usize = TEXT_CHUNK_SIZE;

    fn from_bytes(bytes: Vec<u8>) -> Self {
        TextChunk { text: bytes }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.text
    }
}

impl Chunk for ImageChunk {
    const SIZE: usize = IMAGE_CHUNK_SIZE;

    fn from_bytes(bytes: Vec<u8>) -> Self {
        ImageChunk { image: bytes }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_table_matches_proto_values() {
        for (index, label) in LABELS.iter().enumerate() {
            assert_eq!(*label as i32, index as i32);
            assert_eq!(Label::try_from(index as i32).ok(), Some(*label));
        }
    }

    #[test]
    fn test_from_index() {
        assert_eq!(Label::from_index(3), Some(Label::Cat));
        assert_eq!(Label::from_index(9).map(|l| l.as_str_name()), Some("TRUCK"));
        assert_eq!(Label::from_index(10), None);
        assert_eq!(Label::from_index(42), None);
    }
}
