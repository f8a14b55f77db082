use std::string::FromUtf8Error;
use thiserror::Error;
use tonic::Status;

#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("Invalid UTF-8 text payload: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),
    #[error("Text length {0} does not fit in an int32 result")]
    TextTooLong(usize),
    #[error("Unknown class index {0}")]
    UnknownClassIndex(usize),
    #[error("Classifier failed: {0}")]
    Classifier(String),
    #[error(transparent)]
    Transport(#[from] Status),
}

impl From<ClassificationError> for Status {
    fn from(err: ClassificationError) -> Self {
        match err {
            ClassificationError::Transport(status) => status,
            other => Status::aborted(other.to_string()),
        }
    }
}
