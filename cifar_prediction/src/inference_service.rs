use crate::{
    decoder::{decode_image, decode_text},
    error::ClassificationError,
    model_service::ModelService,
    worker_pool::WorkerPool,
};
use cifar_proto::{
    classification_server::Classification, ImageChunk, ImageResult, Label, TextChunk, TextResult,
};
use futures::Stream;
use std::sync::Arc;
use tonic::{async_trait, Request, Response, Status, Streaming};

#[derive(Debug, Clone)]
pub struct InferenceService<M: ModelService> {
    model_service: Arc<M>,
    workers: WorkerPool,
}

impl<M: ModelService> InferenceService<M> {
    pub fn new(model_service: M, max_workers: usize) -> Self {
        let workers = WorkerPool::new(max_workers);
        tracing::info!("Processing up to {} call(s) at once", workers.size());

        Self {
            model_service: Arc::new(model_service),
            workers,
        }
    }

    /// Reassembles a text stream and answers with its length in characters.
    pub async fn text_result<S>(&self, chunks: S) -> Result<TextResult, ClassificationError>
    where
        S: Stream<Item = Result<TextChunk, Status>> + Unpin,
    {
        let text = decode_text(chunks).await?;
        tracing::debug!("Request text: {}", text);

        let length = text.chars().count();
        let result = i32::try_from(length).map_err(|_| ClassificationError::TextTooLong(length))?;

        Ok(TextResult { result })
    }

    /// Reassembles an image stream and classifies it.
    pub async fn image_result<S>(&self, chunks: S) -> Result<ImageResult, ClassificationError>
    where
        S: Stream<Item = Result<ImageChunk, Status>> + Unpin,
    {
        let image = decode_image(chunks).await?;
        tracing::debug!("Request image of {} bytes", image.len());

        let index = self
            .model_service
            .classify(image)
            .await
            .map_err(|status| ClassificationError::Classifier(status.message().to_string()))?;
        let label = Label::from_index(index).ok_or(ClassificationError::UnknownClassIndex(index))?;

        tracing::info!("Predicted class {} ({})", index, label.as_str_name());
        Ok(ImageResult {
            result: label as i32,
        })
    }
}

#[async_trait]
impl<M: ModelService> Classification for InferenceService<M> {
    async fn get_text_result(
        &self,
        request: Request<Streaming<TextChunk>>,
    ) -> Result<Response<TextResult>, Status> {
        tracing::debug!("{} worker(s) idle", self.workers.available());
        let _permit = self.workers.acquire().await?;
        tracing::info!("Request text");

        match self.text_result(request.into_inner()).await {
            Ok(result) => Ok(Response::new(result)),
            Err(err) => {
                tracing::error!("GetTextResult failed: {}", err);
                Err(err.into())
            }
        }
    }

    async fn get_result(
        &self,
        request: Request<Streaming<ImageChunk>>,
    ) -> Result<Response<ImageResult>, Status> {
        tracing::debug!("{} worker(s) idle", self.workers.available());
        let _permit = self.workers.acquire().await?;
        tracing::info!("Request image");

        match self.image_result(request.into_inner()).await {
            Ok(result) => Ok(Response::new(result)),
            Err(err) => {
                tracing::error!("GetResult failed: {}", err);
                Err(err.into())
            }
        }
    }
}
