use super::VideoReader;
use crate::source::Source;
use anyhow::{anyhow, Result};
use opencv::{
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_HW_ACCELERATION,
        VIDEO_ACCELERATION_ANY,
    },
};

const FALLBACK_FPS: f64 = 30.0;

pub struct OpencvReader {
    capture: VideoCapture,
    source_fps: f64,
    total_frames: Option<usize>,
}

impl OpencvReader {
    pub fn open(source: &Source) -> Result<Self> {
        let mut capture = match source {
            Source::Device(index) => VideoCapture::new(*index, CAP_ANY)?,
            Source::File(path) => {
                let path_str = path
                    .to_str()
                    .ok_or_else(|| anyhow!("Source path is not valid UTF-8: {:?}", path))?;
                VideoCapture::from_file(path_str, CAP_ANY)?
            }
        };
        if !capture.is_opened()? {
            return Err(anyhow!("Failed to open video source: {}", source));
        }

        // Try to enable hardware acceleration (VideoToolbox on macOS, VA-API on Linux, etc.)
        match capture.set(CAP_PROP_HW_ACCELERATION, VIDEO_ACCELERATION_ANY as f64) {
            Ok(true) => tracing::debug!("Hardware acceleration enabled"),
            _ => tracing::debug!("Hardware acceleration not available"),
        }

        let mut fps = capture.get(CAP_PROP_FPS)?;
        if !fps.is_finite() || fps <= 0.0 {
            tracing::warn!(
                "OpencvReader: Failed to get FPS from metadata, falling back to {}",
                FALLBACK_FPS
            );
            fps = FALLBACK_FPS;
        }

        let total_frames = if source.is_device() {
            None
        } else {
            let raw_count = capture.get(CAP_PROP_FRAME_COUNT)?;
            (raw_count > 0.0).then_some(raw_count as usize)
        };

        tracing::info!(
            "OpencvReader: opened {}, fps={:.2}, frames={}",
            source,
            fps,
            total_frames
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        Ok(Self {
            capture,
            source_fps: fps,
            total_frames,
        })
    }
}

impl VideoReader for OpencvReader {
    fn frame_count(&self) -> Option<usize> {
        self.total_frames
    }

    fn source_fps(&self) -> f64 {
        self.source_fps
    }

    fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        let success = self.capture.read(&mut frame)?;
        if !success || frame.empty() {
            return Ok(None);
        }
        Ok(Some(frame))
    }
}
