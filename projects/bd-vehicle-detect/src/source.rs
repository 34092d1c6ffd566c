use std::fmt;
use std::path::PathBuf;

/// Where frames come from: a capture device index or a video file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Device(i32),
    File(PathBuf),
}

impl Source {
    /// A string made only of ASCII digits selects a capture device; anything
    /// else is treated as a file path.
    pub fn parse(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = raw.parse::<i32>() {
                return Source::Device(index);
            }
        }
        Source::File(PathBuf::from(raw))
    }

    /// File stem used to name the run's artifacts (`0` for device 0).
    pub fn stem(&self) -> String {
        match self {
            Source::Device(index) => index.to_string(),
            Source::File(path) => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("stream")
                .to_string(),
        }
    }

    pub fn is_device(&self) -> bool {
        matches!(self, Source::Device(_))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Device(index) => write!(f, "{}", index),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits_select_device() {
        assert_eq!(Source::parse("0"), Source::Device(0));
        assert_eq!(Source::parse("2"), Source::Device(2));
        assert_eq!(Source::parse("007"), Source::Device(7));
    }

    #[test]
    fn test_everything_else_is_a_path() {
        assert_eq!(Source::parse("0.mp4"), Source::File(PathBuf::from("0.mp4")));
        assert_eq!(Source::parse("-1"), Source::File(PathBuf::from("-1")));
        assert_eq!(Source::parse("1a"), Source::File(PathBuf::from("1a")));
        assert_eq!(Source::parse(" 1"), Source::File(PathBuf::from(" 1")));
        assert_eq!(Source::parse(""), Source::File(PathBuf::new()));
        // non-ASCII digits are not device indices
        assert_eq!(Source::parse("１"), Source::File(PathBuf::from("１")));
        // too large for a device index
        assert_eq!(
            Source::parse("99999999999"),
            Source::File(PathBuf::from("99999999999"))
        );
    }

    #[test]
    fn test_stem() {
        assert_eq!(Source::parse("0").stem(), "0");
        assert_eq!(Source::parse("videos/traffic.mp4").stem(), "traffic");
        assert_eq!(Source::parse("0").to_string(), "0");
    }
}
