/// Normalise a `--device` value into the form `usls::Device` parses.
///
/// `None` picks the platform default (CoreML on macOS, CPU elsewhere).
/// A bare index or index list (`0`, `0,1`) means the first CUDA device listed.
pub fn normalize_device(device: Option<&str>) -> String {
    let raw = match device.map(str::trim) {
        Some(d) if !d.is_empty() => d.to_lowercase(),
        _ => return default_device().to_string(),
    };

    let first = raw.split(',').next().unwrap_or_default().trim();
    if !first.is_empty() && first.bytes().all(|b| b.is_ascii_digit()) {
        return format!("cuda:{}", first);
    }

    match raw.as_str() {
        "cuda" | "gpu" => "cuda:0".to_string(),
        "mps" => "coreml".to_string(),
        _ => raw,
    }
}

#[cfg(target_os = "macos")]
fn default_device() -> &'static str {
    "coreml"
}

#[cfg(not(target_os = "macos"))]
fn default_device() -> &'static str {
    "cpu"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto() {
        assert_eq!(normalize_device(None), default_device());
        assert_eq!(normalize_device(Some("  ")), default_device());
    }

    #[test]
    fn test_cuda_forms() {
        assert_eq!(normalize_device(Some("cuda")), "cuda:0");
        assert_eq!(normalize_device(Some("CUDA:1")), "cuda:1");
        assert_eq!(normalize_device(Some("0")), "cuda:0");
        assert_eq!(normalize_device(Some("2,3")), "cuda:2");
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(normalize_device(Some("cpu")), "cpu");
        assert_eq!(normalize_device(Some("mps")), "coreml");
        assert_eq!(normalize_device(Some("tensorrt:0")), "tensorrt:0");
    }
}
