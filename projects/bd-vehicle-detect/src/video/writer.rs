use anyhow::{anyhow, Result};
use opencv::core::{Mat, Size};
use opencv::prelude::*;
use opencv::videoio::VideoWriter;
use std::path::{Path, PathBuf};

/// Container suffix and codec for annotated video on this platform.
pub fn video_format() -> (&'static str, [char; 4]) {
    if cfg!(target_os = "macos") {
        ("mp4", ['a', 'v', 'c', '1'])
    } else if cfg!(target_os = "windows") {
        ("avi", ['W', 'M', 'V', '2'])
    } else {
        ("avi", ['M', 'J', 'P', 'G'])
    }
}

/// Output path of the annotated video for a source stem.
pub fn annotated_video_path(run_dir: &Path, stem: &str) -> PathBuf {
    let (suffix, _) = video_format();
    run_dir.join(format!("{}.{}", stem, suffix))
}

/// Writes annotated frames to a video file. The underlying writer is opened
/// on the first frame, since the frame size is only known then.
pub struct AnnotatedVideoWriter {
    path: PathBuf,
    fps: f64,
    writer: Option<VideoWriter>,
}

impl AnnotatedVideoWriter {
    pub fn new(path: PathBuf, fps: f64) -> Self {
        Self {
            path,
            fps,
            writer: None,
        }
    }

    pub fn write(&mut self, frame: &Mat) -> Result<()> {
        if self.writer.is_none() {
            self.writer = Some(self.open(frame.size()?)?);
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.write(frame)?;
        }
        Ok(())
    }

    fn open(&self, size: Size) -> Result<VideoWriter> {
        let (_, [c1, c2, c3, c4]) = video_format();
        let fourcc = VideoWriter::fourcc(c1, c2, c3, c4)?;
        let path_str = self
            .path
            .to_str()
            .ok_or_else(|| anyhow!("Video path is not valid UTF-8: {:?}", self.path))?;

        let writer = VideoWriter::new(path_str, fourcc, self.fps, size, true)?;
        if !writer.is_opened()? {
            return Err(anyhow!("Failed to open video writer at {}", path_str));
        }
        tracing::debug!(
            "Writing {}x{} @ {:.2} fps to {}",
            size.width,
            size.height,
            self.fps,
            path_str
        );
        Ok(writer)
    }

    pub fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.release()?;
        }
        Ok(())
    }
}

impl Drop for AnnotatedVideoWriter {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!("Failed to finalize {}: {}", self.path.display(), e);
        }
    }
}
