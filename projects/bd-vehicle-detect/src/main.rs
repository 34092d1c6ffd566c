mod cli;
mod device;
mod pipeline;
mod report;
mod run_context;
mod source;
mod video;

use anyhow::Result;
use cli::Args;
use pipeline::detection::{DetectorConfig, ObjectDetector, BACKEND_HINT};
use pipeline::predictor::{opencv_opener, Detector, FrameStream, PredictOptions, ReaderOpener};
use source::Source;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the per-frame report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse_args();
    let device = device::normalize_device(args.device.as_deref());

    let detector = match ObjectDetector::new(&DetectorConfig {
        model: args.model.clone(),
        device: device.clone(),
        conf: args.conf,
        imgsz: args.imgsz,
    }) {
        Ok(detector) => detector,
        Err(e) => {
            eprintln!("{}", BACKEND_HINT);
            return Err(e);
        }
    };

    run(args, device, detector, opencv_opener(), |line| println!("{}", line))?;
    Ok(())
}

/// Create the project directory, then stream the run and report each frame
/// through `emit`. The project directory exists even when the stream fails.
fn run<D, F>(
    args: Args,
    device: String,
    detector: D,
    opener: ReaderOpener,
    mut emit: F,
) -> Result<Option<PathBuf>>
where
    D: Detector,
    F: FnMut(&str),
{
    let source = Source::parse(&args.source);
    let project = PathBuf::from(&args.project);
    run_context::prepare_project_dir(&project)?;

    let stream = FrameStream::with_reader(
        PredictOptions {
            source,
            model: args.model,
            device,
            conf: args.conf,
            imgsz: args.imgsz,
            project,
            name: args.name,
            exist_ok: args.exist_ok,
            save: true,
            show: args.show,
            save_txt: args.save_txt,
            save_crop: args.save_crop,
            progress: true,
        },
        detector,
        opener,
    );

    let pb = stream.progress().clone();
    report::consume(stream, |line| pb.suspend(|| emit(line)))
}
