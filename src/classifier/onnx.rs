//! ONNX Runtime image classifier.
//!
//! Expects a single-input image classification model (for example a YOLO
//! `-cls` export) taking `[1, 3, H, W]` RGB in `[0, 1]` and producing one
//! score per class as its first output.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;

use super::{Classifier, rank, to_probabilities};
use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use crate::model::Prediction;

/// Classifier backed by an ONNX model and a labels file.
pub struct OnnxClassifier {
    /// `run()` needs `&mut`; requests share one session.
    session: Mutex<Session>,
    labels: Vec<String>,
    input_name: String,
    input_size: u32,
}

impl OnnxClassifier {
    /// Load the model and labels named by `config`.
    pub fn load(config: &ClassifierConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(Error::classifier(format!(
                "model not found: {}",
                config.model_path.display()
            )));
        }

        let labels = load_labels(&config.labels_path)?;

        let session = Session::builder()
            .and_then(|b| b.with_intra_threads(1))
            .and_then(|b| b.commit_from_file(&config.model_path))
            .map_err(|e| Error::classifier(format!("failed to load model: {}", e)))?;

        tracing::info!(
            model = %config.model_path.display(),
            classes = labels.len(),
            "Loaded classifier"
        );

        Ok(Self {
            session: Mutex::new(session),
            labels,
            input_name: config.input_name.clone(),
            input_size: config.input_size,
        })
    }

    fn scores(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let tensor = Tensor::from_array(input)
            .map_err(|e| Error::classifier(format!("tensor creation error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| Error::classifier(format!("inference error: {}", e)))?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| Error::classifier("model produced no output"))?;
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::classifier(format!("output extraction error: {}", e)))?;

        Ok(data.to_vec())
    }
}

impl Classifier for OnnxClassifier {
    fn predict(&self, image: &Path) -> Result<Vec<Prediction>> {
        let input = preprocess(image, self.input_size)?;
        let scores = self.scores(input)?;

        if scores.len() != self.labels.len() {
            return Err(Error::classifier(format!(
                "model returned {} scores for {} labels",
                scores.len(),
                self.labels.len()
            )));
        }

        Ok(rank(&self.labels, &to_probabilities(&scores)))
    }
}

/// Read one label per line; the line index is the class id.
fn load_labels(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::classifier(format!("cannot read labels {}: {}", path.display(), e))
    })?;

    let labels: Vec<String> = text
        .lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    if labels.is_empty() {
        return Err(Error::classifier(format!(
            "labels file is empty: {}",
            path.display()
        )));
    }
    Ok(labels)
}

/// Decode, resize and lay out an image as a `[1, 3, size, size]` tensor.
fn preprocess(path: &Path, size: u32) -> Result<Array4<f32>> {
    let image = image::open(path)
        .map_err(|e| Error::media(path, format!("cannot read image: {}", e)))?
        .resize_exact(size, size, FilterType::Triangle)
        .to_rgb8();

    let side = size as usize;
    Ok(Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    #[test]
    fn test_load_labels() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "edm\nlatin\npop\nr&b\nrap\nrock\n\n").unwrap();

        let labels = load_labels(&path).unwrap();
        assert_eq!(labels, ["edm", "latin", "pop", "r&b", "rap", "rock"]);
    }

    #[test]
    fn test_empty_labels_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "\n\n").unwrap();
        assert!(matches!(load_labels(&path), Err(Error::Classifier(_))));
    }

    #[test]
    fn test_preprocess_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("red.png");
        RgbImage::from_pixel(40, 30, Rgb([255, 0, 51])).save(&path).unwrap();

        let tensor = preprocess(&path, 8).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
        assert!((tensor[[0, 0, 3, 3]] - 1.0).abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 3, 3]], 0.0);
        assert!((tensor[[0, 2, 7, 0]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_missing_model() {
        let config = ClassifierConfig {
            model_path: PathBuf::from("/nonexistent/model.onnx"),
            ..ClassifierConfig::default()
        };
        assert!(matches!(
            OnnxClassifier::load(&config),
            Err(Error::Classifier(_))
        ));
    }
}
