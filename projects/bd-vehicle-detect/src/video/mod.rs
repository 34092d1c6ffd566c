pub mod display;
pub mod opencv_reader;
pub mod writer;

use anyhow::Result;
use opencv::core::Mat;

pub trait VideoReader {
    /// Total frames, when the container reports it (files only).
    fn frame_count(&self) -> Option<usize>;
    fn source_fps(&self) -> f64;
    /// Next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Mat>>;
}
