use crate::pipeline::types::Detection;
use crate::run_context::increment_file_path;
use anyhow::{anyhow, Result};
use opencv::core::{self, Mat, Rect};
use opencv::imgcodecs;
use opencv::prelude::*;
use std::path::{Path, PathBuf};

const CROP_GAIN: f32 = 1.02;
const CROP_PAD: f32 = 10.0;

/// The region saved for a detection: the box grown by `CROP_GAIN` plus
/// `CROP_PAD` pixels around its centre, clipped to the frame.
pub fn crop_rect(d: &Detection, width: i32, height: i32) -> Option<Rect> {
    let cx = (d.x1 + d.x2) / 2.0;
    let cy = (d.y1 + d.y2) / 2.0;
    let w = d.width() * CROP_GAIN + CROP_PAD;
    let h = d.height() * CROP_GAIN + CROP_PAD;

    let x1 = ((cx - w / 2.0) as i32).clamp(0, width);
    let y1 = ((cy - h / 2.0) as i32).clamp(0, height);
    let x2 = ((cx + w / 2.0) as i32).clamp(0, width);
    let y2 = ((cy + h / 2.0) as i32).clamp(0, height);

    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
}

/// Copy a detection's crop out of the (unannotated) frame.
pub fn crop_detection(frame: &Mat, d: &Detection) -> Result<Mat> {
    let size = frame.size()?;
    let roi = crop_rect(d, size.width, size.height)
        .ok_or_else(|| anyhow!("Empty crop for detection {:?}", d))?;

    let cropped = Mat::roi(frame, roi)?;
    let mut out = Mat::default();
    cropped.copy_to(&mut out)?;
    Ok(out)
}

/// Save a detection's crop to `crops/<class>/<file_stem>.jpg` under `run_dir`,
/// never overwriting an earlier crop. Returns the written path.
pub fn save_crop(frame: &Mat, d: &Detection, run_dir: &Path, file_stem: &str) -> Result<PathBuf> {
    let crop = crop_detection(frame, d)?;
    let target = run_dir
        .join("crops")
        .join(d.label())
        .join(format!("{}.jpg", file_stem));
    let path = increment_file_path(&target)?;

    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("Crop path is not valid UTF-8: {:?}", path))?;
    if !imgcodecs::imwrite(path_str, &crop, &core::Vector::new())? {
        return Err(anyhow!("Failed to write crop image {}", path_str));
    }
    Ok(path)
}
