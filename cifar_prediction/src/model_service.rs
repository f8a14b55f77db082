use tonic::{async_trait, Status};

/// The classifier behind `GetResult`: encoded image bytes in, class index out.
#[async_trait]
pub trait ModelService: Send + Sync + Clone + 'static {
    async fn classify(&self, image: Vec<u8>) -> Result<usize, Status>;
}
