use std::path::PathBuf;
use std::time::Duration;

/// A detection in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
    pub class_name: Option<String>,
}

impl Detection {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Class name, or the numeric id when the model carries no names.
    pub fn label(&self) -> String {
        self.class_name
            .clone()
            .unwrap_or_else(|| self.class_id.to_string())
    }

    /// Clip the box to a `width` x `height` frame.
    pub fn clipped(mut self, width: f32, height: f32) -> Self {
        self.x1 = self.x1.clamp(0.0, width);
        self.x2 = self.x2.clamp(0.0, width);
        self.y1 = self.y1.clamp(0.0, height);
        self.y2 = self.y2.clamp(0.0, height);
        self
    }
}

/// Per-frame stage timings in milliseconds. Absent stages read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Speed {
    pub preprocess: Option<f64>,
    pub inference: Option<f64>,
    pub postprocess: Option<f64>,
}

impl Speed {
    pub fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    pub fn preprocess_ms(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
    }

    pub fn inference_ms(&self) -> f64 {
        self.inference.unwrap_or(0.0)
    }

    pub fn postprocess_ms(&self) -> f64 {
        self.postprocess.unwrap_or(0.0)
    }
}

/// The result of processing one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameResult {
    /// 1-based index of the frame in the stream
    pub frame: usize,
    /// (height, width)
    pub shape: (u32, u32),
    pub detections: Vec<Detection>,
    pub save_dir: Option<PathBuf>,
    pub speed: Option<Speed>,
}

impl FrameResult {
    /// Detection counts per class, e.g. `2 cars, 1 truck`.
    pub fn summary(&self) -> String {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for det in &self.detections {
            let label = det.label();
            match counts.iter_mut().find(|(name, _)| *name == label) {
                Some((_, n)) => *n += 1,
                None => counts.push((label, 1)),
            }
        }

        if counts.is_empty() {
            return "(no detections)".to_string();
        }

        counts
            .into_iter()
            .map(|(name, n)| {
                if n > 1 {
                    format!("{} {}s", n, name)
                } else {
                    format!("{} {}", n, name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Totals collected while a stream runs.
#[derive(Debug, Clone, Default)]
pub struct ProcessingStats {
    pub processed_frames: usize,
    pub duration: Duration,
    pub preprocess_ms: f64,
    pub inference_ms: f64,
    pub postprocess_ms: f64,
}

impl ProcessingStats {
    pub fn record(&mut self, speed: &Speed) {
        self.processed_frames += 1;
        self.preprocess_ms += speed.preprocess_ms();
        self.inference_ms += speed.inference_ms();
        self.postprocess_ms += speed.postprocess_ms();
    }

    /// Average (preprocess, inference, postprocess) per frame.
    pub fn average(&self) -> Speed {
        if self.processed_frames == 0 {
            return Speed::new(0.0, 0.0, 0.0);
        }
        let n = self.processed_frames as f64;
        Speed::new(
            self.preprocess_ms / n,
            self.inference_ms / n,
            self.postprocess_ms / n,
        )
    }
}
