//! Frame classifier.
//!
//! The model is a small TOML descriptor naming a label, a brightness threshold
//! and the minimum number of matching pixels. Detection reports the bounding
//! box of all pixels at or above the threshold. A classifier whose model
//! failed to load reports nothing.

use std::path::Path;

use serde::Deserialize;

use super::frame::{Frame, Region};
use super::CaptureError;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Model {
    #[serde(default = "Model::default_label")]
    pub label: String,
    pub threshold: u8,
    #[serde(default = "Model::default_min_pixels")]
    pub min_pixels: usize,
}

impl Model {
    fn default_label() -> String {
        "Human".to_string()
    }

    fn default_min_pixels() -> usize {
        64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub label: String,
    pub region: Region,
}

#[derive(Debug, Default)]
pub struct Classifier {
    model: Option<Model>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(model: Model) -> Self {
        Self { model: Some(model) }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Load the model descriptor at `path`, replacing any previous model.
    pub fn load(&mut self, path: &Path) -> Result<(), CaptureError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CaptureError::ModelLoad {
            path: path.to_path_buf(),
            reason: source.to_string(),
        })?;
        let model: Model = toml::from_str(&contents).map_err(|e| CaptureError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        self.model = Some(model);
        Ok(())
    }

    pub fn detect(&self, frame: &Frame) -> Vec<Detection> {
        let Some(model) = &self.model else {
            return Vec::new();
        };

        let mut count = 0usize;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        for y in 0..frame.height() {
            for x in 0..frame.width() {
                if frame.get(x, y).is_some_and(|p| p >= model.threshold) {
                    count += 1;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if count == 0 || count < model.min_pixels {
            return Vec::new();
        }

        vec![Detection {
            label: model.label.clone(),
            region: Region {
                x: min_x,
                y: min_y,
                width: max_x - min_x + 1,
                height: max_y - min_y + 1,
            },
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_block() -> Frame {
        let mut pixels = vec![10u8; 20 * 20];
        for y in 5..10 {
            for x in 8..12 {
                pixels[y * 20 + x] = 250;
            }
        }
        Frame::from_pixels(20, 20, pixels).unwrap()
    }

    #[test]
    fn test_unloaded_classifier_detects_nothing() {
        let classifier = Classifier::new();
        assert!(!classifier.is_loaded());
        assert!(classifier.detect(&frame_with_block()).is_empty());
    }

    #[test]
    fn test_detects_bright_block() {
        let classifier = Classifier::with_model(Model {
            label: "Human".to_string(),
            threshold: 200,
            min_pixels: 10,
        });
        let detections = classifier.detect(&frame_with_block());
        assert_eq!(
            detections,
            vec![Detection {
                label: "Human".to_string(),
                region: Region {
                    x: 8,
                    y: 5,
                    width: 4,
                    height: 5,
                },
            }]
        );
    }

    #[test]
    fn test_small_blobs_are_ignored() {
        let classifier = Classifier::with_model(Model {
            label: "Human".to_string(),
            threshold: 200,
            min_pixels: 100,
        });
        assert!(classifier.detect(&frame_with_block()).is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classifier.toml");
        std::fs::write(&path, "threshold = 128\n").unwrap();

        let mut classifier = Classifier::new();
        classifier.load(&path).unwrap();
        assert!(classifier.is_loaded());
    }

    #[test]
    fn test_load_failure_leaves_classifier_unloaded() {
        let mut classifier = Classifier::new();
        let err = classifier.load(Path::new("/nonexistent/classifier.toml")).unwrap_err();
        assert!(matches!(err, CaptureError::ModelLoad { .. }));
        assert!(!classifier.is_loaded());
    }
}
