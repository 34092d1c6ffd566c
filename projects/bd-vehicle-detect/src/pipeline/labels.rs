// YOLO label files: one `class xc yc w h` line per detection, normalised to
// the frame size.

use crate::pipeline::types::Detection;
use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Format like C's `%g` (6 significant digits, trailing zeros removed).
pub fn format_g(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return if value.is_finite() {
            "0".to_string()
        } else {
            value.to_string()
        };
    }

    let exp = value.abs().log10().floor() as i32;
    if !(-4..6).contains(&exp) {
        let formatted = format!("{:.5e}", value);
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
        let mantissa = trim_zeros(mantissa);
        let exponent: i32 = exponent.parse().unwrap_or(0);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exponent.abs());
    }

    let decimals = (5 - exp).max(0) as usize;
    trim_zeros(&format!("{:.*}", decimals, value))
}

fn trim_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// One label line for a detection in a `width` x `height` frame.
pub fn label_line(d: &Detection, width: f32, height: f32) -> String {
    let xc = ((d.x1 + d.x2) / 2.0 / width) as f64;
    let yc = ((d.y1 + d.y2) / 2.0 / height) as f64;
    let w = (d.width() / width) as f64;
    let h = (d.height() / height) as f64;
    [d.class_id as f64, xc, yc, w, h]
        .iter()
        .map(|v| format_g(*v))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Append the frame's detections to `path`. Nothing is written for a frame
/// without detections.
pub fn write_labels(path: &Path, detections: &[Detection], width: f32, height: f32) -> Result<()> {
    if detections.is_empty() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open label file {:?}", path))?;
    for d in detections {
        writeln!(file, "{}", label_line(d, width, height))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_g() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(2.0), "2");
        assert_eq!(format_g(0.5), "0.5");
        assert_eq!(format_g(0.123456789), "0.123457");
        assert_eq!(format_g(0.99999999), "1");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
    }

    #[test]
    fn test_label_line() {
        let d = Detection {
            x1: 100.0,
            y1: 50.0,
            x2: 300.0,
            y2: 150.0,
            confidence: 0.8,
            class_id: 3,
            class_name: None,
        };
        assert_eq!(label_line(&d, 400.0, 200.0), "3 0.5 0.5 0.5 0.5");
    }

    #[test]
    fn test_write_labels_appends_and_skips_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("labels").join("clip_1.txt");

        write_labels(&path, &[], 100.0, 100.0).unwrap();
        assert!(!path.exists());

        let d = Detection {
            x1: 0.0,
            y1: 0.0,
            x2: 50.0,
            y2: 100.0,
            confidence: 0.9,
            class_id: 0,
            class_name: Some("car".to_string()),
        };
        write_labels(&path, &[d.clone()], 100.0, 100.0).unwrap();
        write_labels(&path, &[d], 100.0, 100.0).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "0 0.25 0.5 0.5 1\n0 0.25 0.5 0.5 1\n");
    }
}
