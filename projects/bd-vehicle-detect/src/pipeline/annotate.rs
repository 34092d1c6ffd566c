use crate::pipeline::types::Detection;
use anyhow::Result;
use opencv::core::{Mat, Point, Rect, Scalar};
use opencv::imgproc::{self, FILLED, FONT_HERSHEY_SIMPLEX, LINE_AA};
use opencv::prelude::*;

/// YOLO class palette (RGB hex).
const PALETTE: [&str; 20] = [
    "042AFF", "0BDBEB", "F3F3F3", "00DFB7", "111F68", "FF6FDD", "FF444F", "CCED00", "00F344",
    "BD00FF", "00B4FF", "DD00BA", "00FFFF", "26C000", "01FFB3", "7D24FF", "7B0068", "FF1B6C",
    "FC6D2F", "A2FF0B",
];

/// RGB colour for a class id.
pub fn class_color(class_id: usize) -> (u8, u8, u8) {
    let hex = PALETTE[class_id % PALETTE.len()];
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
    (channel(0), channel(2), channel(4))
}

fn bgr((r, g, b): (u8, u8, u8)) -> Scalar {
    Scalar::new(b as f64, g as f64, r as f64, 0.0)
}

/// Black text on light boxes, white otherwise.
fn text_color((r, g, b): (u8, u8, u8)) -> Scalar {
    let luminance = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    if luminance > 160.0 {
        Scalar::new(0.0, 0.0, 0.0, 0.0)
    } else {
        Scalar::new(255.0, 255.0, 255.0, 0.0)
    }
}

/// Line width scaled to the frame size, at least 2 px.
pub fn line_width(width: i32, height: i32) -> i32 {
    (((width + height) as f64 / 2.0 * 0.003).round() as i32).max(2)
}

/// Draw boxes and `name conf` labels on a copy of `frame`.
pub fn annotate(frame: &Mat, detections: &[Detection]) -> Result<Mat> {
    let mut canvas = frame.clone();
    let size = canvas.size()?;
    let lw = line_width(size.width, size.height);
    let font_scale = lw as f64 / 3.0;
    let font_thickness = (lw - 1).max(1);

    for d in detections {
        let color = class_color(d.class_id);
        let rect = Rect::new(
            d.x1 as i32,
            d.y1 as i32,
            d.width().round() as i32,
            d.height().round() as i32,
        );
        imgproc::rectangle(&mut canvas, rect, bgr(color), lw, LINE_AA, 0)?;

        let label = format!("{} {:.2}", d.label(), d.confidence);
        let mut baseline = 0;
        let text_size = imgproc::get_text_size(
            &label,
            FONT_HERSHEY_SIMPLEX,
            font_scale,
            font_thickness,
            &mut baseline,
        )?;

        // Label sits above the box unless that would leave the frame.
        let outside = rect.y - text_size.height >= 3;
        let top = if outside {
            rect.y - text_size.height - 3
        } else {
            rect.y
        };
        let background = Rect::new(rect.x, top, text_size.width, text_size.height + 3);
        imgproc::rectangle(&mut canvas, background, bgr(color), FILLED, LINE_AA, 0)?;

        let origin = if outside {
            Point::new(rect.x, rect.y - 2)
        } else {
            Point::new(rect.x, rect.y + text_size.height + 2)
        };
        imgproc::put_text(
            &mut canvas,
            &label,
            origin,
            FONT_HERSHEY_SIMPLEX,
            font_scale,
            text_color(color),
            font_thickness,
            LINE_AA,
            false,
        )?;
    }

    Ok(canvas)
}
