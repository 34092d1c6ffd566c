use crate::pipeline::types::{Detection, Speed};
use anyhow::{anyhow, bail, Context, Result};
use image::{DynamicImage, ImageBuffer, Rgb};
use opencv::core::Mat;
use opencv::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;
use usls::models::YOLO;
use usls::{Config, Image};

/// Printed on stderr when the detection backend cannot be loaded.
pub const BACKEND_HINT: &str = "Failed to load the YOLO detection backend. \
Export the checkpoint to ONNX with: yolo export model=<weights>.pt format=onnx \
(ONNX Runtime binaries are fetched by the `ort-download-binaries` feature at build time)";

/// Detector settings forwarded from the command line.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub model: String,
    pub device: String,
    pub conf: f32,
    pub imgsz: u32,
}

/// A wrapper around the USLS YOLO model that handles BGR-to-RGB conversion
/// and times each stage of a forward pass.
pub struct ObjectDetector {
    model: YOLO,
    min_conf: f32,
}

impl ObjectDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let model_path = resolve_model_path(&config.model)?;
        let model_file = model_path
            .to_str()
            .ok_or_else(|| anyhow!("Model path is not valid UTF-8: {:?}", model_path))?;
        let imgsz = config.imgsz as usize;

        let usls_config = Config::yolo_detect()
            .with_model_file(model_file)
            .with_model_device(
                config
                    .device
                    .parse()
                    .map_err(|e| anyhow!("Invalid device '{}': {}", config.device, e))?,
            )
            .with_model_ixx(0, 2, imgsz.into())
            .with_model_ixx(0, 3, imgsz.into())
            .with_class_confs(&[config.conf])
            .commit()?;

        let model = YOLO::new(usls_config)
            .with_context(|| format!("Failed to load model {}", model_path.display()))?;

        tracing::info!(
            "Loaded {} on {} (imgsz={}, conf={})",
            model_path.display(),
            config.device,
            config.imgsz,
            config.conf
        );

        Ok(Self {
            model,
            min_conf: config.conf,
        })
    }

    /// Run detection on an OpenCV Mat (BGR).
    pub fn detect(&mut self, frame: &Mat) -> Result<(Vec<Detection>, Speed)> {
        let t0 = Instant::now();
        let size = frame.size()?;
        let image = Image::from(mat_to_dynamic_image(frame)?);
        let preprocess = elapsed_ms(t0);

        let t1 = Instant::now();
        let results = self.model.forward(&[image])?;
        let inference = elapsed_ms(t1);

        let t2 = Instant::now();
        let detections = results
            .into_iter()
            .next()
            .map(|y| {
                y.hbbs
                    .into_iter()
                    .map(|hbb| Detection {
                        x1: hbb.xmin(),
                        y1: hbb.ymin(),
                        x2: hbb.xmin() + hbb.width(),
                        y2: hbb.ymin() + hbb.height(),
                        confidence: hbb.confidence().unwrap_or(0.0),
                        class_id: hbb.id().unwrap_or(0),
                        class_name: hbb.name().map(|s| s.to_string()),
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let detections = postprocess(
            detections,
            self.min_conf,
            size.width as f32,
            size.height as f32,
        );
        let postprocess = elapsed_ms(t2);

        Ok((detections, Speed::new(preprocess, inference, postprocess)))
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Drop low-confidence and degenerate boxes, clip the rest to the frame.
fn postprocess(detections: Vec<Detection>, min_conf: f32, width: f32, height: f32) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.confidence >= min_conf)
        .map(|d| d.clipped(width, height))
        .filter(|d| d.width() > 0.0 && d.height() > 0.0)
        .collect()
}

/// The runtime executes ONNX graphs: a `.pt` checkpoint resolves to its
/// sibling `.onnx` export.
pub fn resolve_model_path(model: &str) -> Result<PathBuf> {
    let path = Path::new(model);
    let is_torch = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("pt"))
        .unwrap_or(false);

    if !is_torch {
        return Ok(path.to_path_buf());
    }

    let onnx = path.with_extension("onnx");
    if onnx.exists() {
        tracing::info!("Using ONNX export {} for {}", onnx.display(), model);
        return Ok(onnx);
    }

    bail!(
        "{} is a PyTorch checkpoint and no ONNX export was found at {}. \
         Export it with: yolo export model={} format=onnx",
        model,
        onnx.display(),
        model
    )
}

/// Convert an OpenCV Mat (BGR) to an image::DynamicImage (RGB)
pub fn mat_to_dynamic_image(mat: &Mat) -> Result<DynamicImage> {
    let mut rgb_mat = Mat::default();
    opencv::imgproc::cvt_color_def(mat, &mut rgb_mat, opencv::imgproc::COLOR_BGR2RGB)?;

    let size = rgb_mat.size()?;
    let width = size.width as u32;
    let height = size.height as u32;

    if !rgb_mat.is_continuous() {
        return Err(anyhow!("Mat is not continuous"));
    }

    let buffer = rgb_mat.data_bytes()?.to_vec();

    let img_buffer = ImageBuffer::<Rgb<u8>, _>::from_vec(width, height, buffer)
        .ok_or_else(|| anyhow!("Failed to create ImageBuffer from Mat data"))?;

    Ok(DynamicImage::ImageRgb8(img_buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC3};

    fn det(conf: f32, x1: f32, x2: f32) -> Detection {
        Detection {
            x1,
            y1: 10.0,
            x2,
            y2: 50.0,
            confidence: conf,
            class_id: 2,
            class_name: Some("car".to_string()),
        }
    }

    #[test]
    fn test_postprocess_filters_and_clips() {
        let kept = postprocess(
            vec![
                det(0.9, -10.0, 40.0),
                det(0.1, 0.0, 40.0),
                det(0.8, 200.0, 250.0),
            ],
            0.25,
            100.0,
            100.0,
        );
        // low confidence dropped, fully outside box collapses and is dropped
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].x1, 0.0);
        assert_eq!(kept[0].x2, 40.0);
    }

    #[test]
    fn test_resolve_model_path_passthrough() {
        let path = resolve_model_path("weights/best.onnx").unwrap();
        assert_eq!(path, PathBuf::from("weights/best.onnx"));
    }

    #[test]
    fn test_resolve_model_path_pt() {
        let tmp = tempfile::tempdir().unwrap();
        let pt = tmp.path().join("BD_Vehicle_YOLO11.pt");
        let pt_str = pt.to_str().unwrap();

        let err = resolve_model_path(pt_str).unwrap_err();
        assert!(err.to_string().contains("yolo export"));

        std::fs::write(pt.with_extension("onnx"), b"onnx").unwrap();
        assert_eq!(resolve_model_path(pt_str).unwrap(), pt.with_extension("onnx"));
    }

    #[test]
    fn test_mat_to_dynamic_image_swaps_channels() {
        // Pure blue in BGR
        let mat = Mat::new_rows_cols_with_default(4, 6, CV_8UC3, Scalar::new(255.0, 0.0, 0.0, 0.0))
            .unwrap();
        let img = mat_to_dynamic_image(&mat).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (6, 4));
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 255]);
    }
}
