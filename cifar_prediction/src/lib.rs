mod connection;
mod decoder;
mod error;
mod inference_service;
mod model_service;
mod ort_service;
mod server;
mod worker_pool;

pub mod config;

pub use decoder::{decode_image, decode_text, reassemble};
pub use error::ClassificationError;
pub use inference_service::InferenceService;
pub use model_service::ModelService;
pub use ort_service::OrtModelService;
pub use server::{start_server, GrpcServer};
