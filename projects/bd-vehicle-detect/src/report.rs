use crate::pipeline::types::{FrameResult, Speed};
use anyhow::Result;
use std::path::PathBuf;

pub const NO_SAVE_DIR_MESSAGE: &str =
    "Processing finished, but no save directory was reported. Check your inputs and arguments.";

pub fn speed_line(speed: &Speed) -> String {
    format!(
        "Speed ms/frame - pre: {:.1}, inf: {:.1}, post: {:.1}",
        speed.preprocess_ms(),
        speed.inference_ms(),
        speed.postprocess_ms()
    )
}

pub fn final_line(save_dir: Option<&PathBuf>) -> String {
    match save_dir {
        Some(dir) => format!("Results saved to: {}", dir.display()),
        None => NO_SAVE_DIR_MESSAGE.to_string(),
    }
}

/// Drain the result sequence, emitting one speed line per frame that carries
/// timing. Returns the last reported save directory; the first error stops
/// the drain and is returned as-is.
pub fn drain<I, F>(results: I, mut emit: F) -> Result<Option<PathBuf>>
where
    I: IntoIterator<Item = Result<FrameResult>>,
    F: FnMut(&str),
{
    let mut last_save_dir = None;
    for result in results {
        let result = result?;
        if result.save_dir.is_some() {
            last_save_dir = result.save_dir;
        }
        if let Some(speed) = &result.speed {
            emit(&speed_line(speed));
        }
    }
    Ok(last_save_dir)
}

/// `drain` followed by the final summary line.
pub fn consume<I, F>(results: I, mut emit: F) -> Result<Option<PathBuf>>
where
    I: IntoIterator<Item = Result<FrameResult>>,
    F: FnMut(&str),
{
    let last_save_dir = drain(results, &mut emit)?;
    emit(&final_line(last_save_dir.as_ref()));
    Ok(last_save_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn frame(save_dir: Option<&str>, speed: Option<Speed>) -> Result<FrameResult> {
        Ok(FrameResult {
            save_dir: save_dir.map(PathBuf::from),
            speed,
            ..Default::default()
        })
    }

    fn run(results: Vec<Result<FrameResult>>) -> (Result<Option<PathBuf>>, Vec<String>) {
        let mut lines = Vec::new();
        let out = consume(results, |line| lines.push(line.to_string()));
        (out, lines)
    }

    #[test]
    fn test_per_frame_lines_and_final_dir() {
        let (out, lines) = run(vec![
            frame(Some("runs/detect/predict"), Some(Speed::new(1.24, 10.0, 0.5))),
            frame(Some("runs/detect/predict"), Some(Speed::new(2.0, 11.04, 0.76))),
        ]);
        assert_eq!(out.unwrap(), Some(PathBuf::from("runs/detect/predict")));
        assert_eq!(
            lines,
            vec![
                "Speed ms/frame - pre: 1.2, inf: 10.0, post: 0.5",
                "Speed ms/frame - pre: 2.0, inf: 11.0, post: 0.8",
                "Results saved to: runs/detect/predict",
            ]
        );
    }

    #[test]
    fn test_zero_frames_prints_fallback() {
        let (out, lines) = run(vec![]);
        assert_eq!(out.unwrap(), None);
        assert_eq!(lines, vec![NO_SAVE_DIR_MESSAGE]);
    }

    #[test]
    fn test_missing_speed_is_skipped() {
        let (_, lines) = run(vec![frame(Some("out"), None)]);
        assert_eq!(lines, vec!["Results saved to: out"]);
    }

    #[test]
    fn test_missing_speed_fields_default_to_zero() {
        let partial = Speed {
            inference: Some(9.0),
            ..Default::default()
        };
        let (_, lines) = run(vec![frame(Some("out"), Some(partial))]);
        assert_eq!(lines[0], "Speed ms/frame - pre: 0.0, inf: 9.0, post: 0.0");
    }

    #[test]
    fn test_error_stops_without_saved_line() {
        let (out, lines) = run(vec![
            frame(Some("out"), Some(Speed::new(1.0, 1.0, 1.0))),
            Err(anyhow!("decode failed")),
            frame(Some("out"), Some(Speed::new(1.0, 1.0, 1.0))),
        ]);
        assert!(out.is_err());
        assert_eq!(lines.len(), 1);
        assert!(lines.iter().all(|l| !l.starts_with("Results saved to")));
    }

    #[test]
    fn test_last_reported_dir_wins() {
        let (out, _) = run(vec![frame(Some("a"), None), frame(None, None), frame(Some("b"), None)]);
        assert_eq!(out.unwrap(), Some(PathBuf::from("b")));
    }
}
