use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Parameters of a run, persisted as `metadata.json` in the run directory.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunMetadata {
    pub source: String,
    pub model: String,
    pub device: String,
    pub conf: f32,
    pub imgsz: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub output_dir: PathBuf,
}

/// Ensure the project directory exists. Safe to call repeatedly.
pub fn prepare_project_dir(project: &Path) -> Result<()> {
    fs::create_dir_all(project)
        .with_context(|| format!("Failed to create project directory {:?}", project))
}

/// Pick the run directory: `<project>/<name>`, or the first free
/// `<project>/<name>N` (N = 2, 3, ...) when it exists and `exist_ok` is false.
pub fn resolve_run_dir(project: &Path, name: &str, exist_ok: bool) -> PathBuf {
    let base = project.join(name);
    if exist_ok || !base.exists() {
        return base;
    }
    (2..)
        .map(|n| project.join(format!("{}{}", name, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

/// Create the run directory and write its metadata.
pub fn create_run(
    project: &Path,
    name: &str,
    exist_ok: bool,
    mut metadata: RunMetadata,
) -> Result<RunMetadata> {
    let output_dir = resolve_run_dir(project, name, exist_ok);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create run directory {:?}", output_dir))?;

    let metadata_path = output_dir.join("metadata.json");
    let content = serde_json::to_string_pretty(&metadata)?;
    fs::write(metadata_path, content)?;

    metadata.output_dir = output_dir;
    tracing::info!("Run directory: {}", metadata.output_dir.display());
    Ok(metadata)
}

/// Return `path` if free, otherwise `<stem>2.<ext>`, `<stem>3.<ext>`, ...
/// Parent directories are created.
pub fn increment_file_path(path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid file name: {:?}", path))?;
    let ext = path.extension().and_then(|s| s.to_str());

    let candidate = (2..)
        .map(|n| {
            let file_name = match ext {
                Some(ext) => format!("{}{}.{}", stem, n, ext),
                None => format!("{}{}", stem, n),
            };
            path.with_file_name(file_name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.to_path_buf());
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> RunMetadata {
        RunMetadata {
            source: "test.mp4".to_string(),
            model: "model.onnx".to_string(),
            device: "cpu".to_string(),
            conf: 0.25,
            imgsz: 640,
            created_at: Utc::now(),
            output_dir: PathBuf::new(),
        }
    }

    #[test]
    fn test_prepare_project_dir_creates_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let project = tmp.path().join("runs").join("detect");
        prepare_project_dir(&project).unwrap();
        assert!(project.is_dir());
        // idempotent
        prepare_project_dir(&project).unwrap();
    }

    #[test]
    fn test_run_dir_increments() {
        let tmp = tempfile::tempdir().unwrap();
        let first = create_run(tmp.path(), "predict", false, metadata()).unwrap();
        assert_eq!(first.output_dir, tmp.path().join("predict"));
        assert!(first.output_dir.join("metadata.json").exists());

        let second = create_run(tmp.path(), "predict", false, metadata()).unwrap();
        assert_eq!(second.output_dir, tmp.path().join("predict2"));

        let third = create_run(tmp.path(), "predict", false, metadata()).unwrap();
        assert_eq!(third.output_dir, tmp.path().join("predict3"));
    }

    #[test]
    fn test_run_dir_exist_ok_reuses() {
        let tmp = tempfile::tempdir().unwrap();
        create_run(tmp.path(), "predict", false, metadata()).unwrap();
        let again = create_run(tmp.path(), "predict", true, metadata()).unwrap();
        assert_eq!(again.output_dir, tmp.path().join("predict"));
    }

    #[test]
    fn test_metadata_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let run = create_run(tmp.path(), "predict", false, metadata()).unwrap();
        let content = fs::read_to_string(run.output_dir.join("metadata.json")).unwrap();
        let loaded: RunMetadata = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.source, "test.mp4");
        assert_eq!(loaded.imgsz, 640);
    }

    #[test]
    fn test_increment_file_path() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("crops").join("car").join("clip_1.jpg");

        let first = increment_file_path(&path).unwrap();
        assert_eq!(first, path);
        assert!(path.parent().unwrap().is_dir());
        fs::write(&first, b"x").unwrap();

        let second = increment_file_path(&path).unwrap();
        assert_eq!(second, path.with_file_name("clip_12.jpg"));
        fs::write(&second, b"x").unwrap();

        let third = increment_file_path(&path).unwrap();
        assert_eq!(third, path.with_file_name("clip_13.jpg"));
    }
}
