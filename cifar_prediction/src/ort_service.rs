use crate::{
    config::{ModelConfig, Validatable},
    model_service::ModelService,
};
use image::{imageops::FilterType, GenericImageView};
use ndarray::{Array, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};
use tonic::{async_trait, Status};

/// Decodes an encoded image into a `[1, 3, size, size]` tensor scaled to `[0, 1]`.
///
/// The shorter side is scaled to `size` and the longer one center-cropped, so
/// the aspect ratio is kept.
fn transform_image(image_data: &[u8], size: u32) -> Result<Array<f32, Ix4>, String> {
    let image_reader = image::ImageReader::new(std::io::Cursor::new(image_data))
        .with_guessed_format()
        .map_err(|e| format!("Error decoding image: {}", e))?;

    let original_img = image_reader
        .decode()
        .map_err(|e| format!("Error decoding image: {}", e))?;

    let img = original_img.resize_to_fill(size, size, FilterType::CatmullRom);

    let side = size as usize;
    let mut input = Array::zeros((1, 3, side, side));
    for pixel in img.pixels() {
        let x = pixel.0 as _;
        let y = pixel.1 as _;
        let [r, g, b, _] = pixel.2 .0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    Ok(input)
}

fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(index, _)| index)
}

#[derive(Clone)]
pub struct OrtModelService {
    sessions: Arc<Vec<Arc<Mutex<Session>>>>,
    counter: Arc<AtomicUsize>,
    input_size: u32,
    output_name: Arc<str>,
}

impl OrtModelService {
    pub fn new(model_config: &ModelConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let num_instances = model_config.num_instances.max(1);
        let sessions = (0..num_instances)
            .map(|_| {
                let session = Session::builder()?
                    .with_optimization_level(GraphOptimizationLevel::Level3)?
                    .commit_from_file(model_config.get_path())?;
                Ok(Arc::new(Mutex::new(session)))
            })
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!(
            "Created {} ONNX sessions from {:?}",
            num_instances,
            model_config.get_path()
        );

        Ok(Self {
            sessions: Arc::new(sessions),
            counter: Arc::new(AtomicUsize::new(0)),
            input_size: model_config.input_size,
            output_name: Arc::from(model_config.output_name.as_str()),
        })
    }

    /// Runs one forward pass and returns the scores of the first batch row.
    pub fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, Status> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| Status::internal(format!("session mutex poisoned: {}", e)))?;

        tracing::debug!("Handling request with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())
            .map_err(|e| Status::internal(format!("failed to build tensor: {}", e)))?;

        let outputs = session
            .run(ort::inputs![tensor_ref])
            .map_err(|e| Status::internal(format!("inference failed: {}", e)))?;

        let (_shape, data) = outputs[&*self.output_name]
            .try_extract_tensor::<f32>()
            .map_err(|e| Status::internal(format!("failed to extract tensor: {}", e)))?;

        Ok(data.to_vec())
    }

    fn classify_blocking(&self, image: &[u8]) -> Result<usize, Status> {
        let input = transform_image(image, self.input_size)
            .map_err(|err| Status::invalid_argument(format!("Image transformation error: {}", err)))?;

        let scores = self.run_inference(&input)?;
        let index =
            argmax(&scores).ok_or_else(|| Status::internal("model returned no class scores"))?;

        tracing::debug!("Class scores {:?}, argmax {}", scores, index);
        Ok(index)
    }
}

#[async_trait]
impl ModelService for OrtModelService {
    async fn classify(&self, image: Vec<u8>) -> Result<usize, Status> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.classify_blocking(&image))
            .await
            .map_err(|e| Status::internal(format!("inference task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    #[test]
    fn test_transform_image() {
        let img = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_pixel(100, 60, Rgb([255, 0, 0]));
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();

        let input = transform_image(&cursor.into_inner(), 32).unwrap();

        assert_eq!(input.shape(), &[1, 3, 32, 32]);
        assert!((input[[0, 0, 16, 16]] - 1.0).abs() < 1e-2);
        assert!(input[[0, 1, 16, 16]].abs() < 1e-2);
        assert!(input[[0, 2, 16, 16]].abs() < 1e-2);
    }

    #[test]
    fn test_transform_image_crops_center_of_wide_image() {
        let img = ImageBuffer::from_fn(192, 64, |x, _| match x / 64 {
            0 => Rgb([255u8, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        });
        let mut cursor = Cursor::new(Vec::new());
        img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();

        let input = transform_image(&cursor.into_inner(), 32).unwrap();

        assert_eq!(input.shape(), &[1, 3, 32, 32]);
        for x in [4, 16, 28] {
            assert!(input[[0, 0, 16, x]] < 0.1, "red at x = {}", x);
            assert!(input[[0, 1, 16, x]] > 0.9, "green at x = {}", x);
            assert!(input[[0, 2, 16, x]] < 0.1, "blue at x = {}", x);
        }
    }

    #[test]
    fn test_transform_rejects_garbage() {
        let result = transform_image(&[0u8; 64], 32);

        assert!(result.is_err());
    }

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, -2.0, 3.5, 0.0]), Some(2));
        assert_eq!(argmax(&[]), None);
    }
}
