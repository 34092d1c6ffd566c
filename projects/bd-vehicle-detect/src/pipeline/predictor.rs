// Prediction driver: turns the run options into a lazy stream of per-frame
// results. Nothing is opened or written until the stream is first advanced.

use crate::pipeline::annotate::annotate;
use crate::pipeline::crop::save_crop;
use crate::pipeline::detection::ObjectDetector;
use crate::pipeline::labels::write_labels;
use crate::pipeline::types::{Detection, FrameResult, ProcessingStats, Speed};
use crate::run_context::{create_run, RunMetadata};
use crate::source::Source;
use crate::video::display::FrameWindow;
use crate::video::opencv_reader::OpencvReader;
use crate::video::writer::{annotated_video_path, AnnotatedVideoWriter};
use crate::video::VideoReader;
use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use opencv::core::Mat;
use opencv::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

/// Options forwarded from the command line to the prediction stream.
#[derive(Debug, Clone)]
pub struct PredictOptions {
    pub source: Source,
    pub model: String,
    pub device: String,
    pub conf: f32,
    pub imgsz: u32,
    pub project: PathBuf,
    pub name: String,
    pub exist_ok: bool,
    pub save: bool,
    pub show: bool,
    pub save_txt: bool,
    pub save_crop: bool,
    pub progress: bool,
}

/// Anything that can turn a frame into detections.
pub trait Detector {
    fn detect(&mut self, frame: &Mat) -> Result<(Vec<Detection>, Speed)>;
}

impl Detector for ObjectDetector {
    fn detect(&mut self, frame: &Mat) -> Result<(Vec<Detection>, Speed)> {
        ObjectDetector::detect(self, frame)
    }
}

pub type ReaderOpener = Box<dyn FnOnce(&Source) -> Result<Box<dyn VideoReader>>>;

struct Session {
    reader: Box<dyn VideoReader>,
    run_dir: PathBuf,
    stem: String,
    writer: Option<AnnotatedVideoWriter>,
    window: Option<FrameWindow>,
    total_frames: Option<usize>,
    frame: usize,
    labels_written: usize,
    start_time: Instant,
}

enum State {
    Pending(ReaderOpener),
    Running(Box<Session>),
    Done,
}

/// Opens sources through OpenCV.
pub fn opencv_opener() -> ReaderOpener {
    Box::new(|source: &Source| -> Result<Box<dyn VideoReader>> {
        Ok(Box::new(OpencvReader::open(source)?))
    })
}

/// Lazy sequence of per-frame results.
pub struct FrameStream<D: Detector> {
    options: PredictOptions,
    detector: D,
    state: State,
    stats: ProcessingStats,
    pb: ProgressBar,
}

impl<D: Detector> FrameStream<D> {
    pub fn with_reader(options: PredictOptions, detector: D, opener: ReaderOpener) -> Self {
        let pb = if options.progress {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        Self {
            options,
            detector,
            state: State::Pending(opener),
            stats: ProcessingStats::default(),
            pb,
        }
    }

    /// Progress bar drawn while the stream runs; print through
    /// `ProgressBar::suspend` to keep output readable.
    pub fn progress(&self) -> &ProgressBar {
        &self.pb
    }

    fn start(&mut self, opener: ReaderOpener) -> Result<Session> {
        let options = &self.options;
        let reader = opener(&options.source)
            .with_context(|| format!("Failed to open source {}", options.source))?;
        let total_frames = reader.frame_count();

        let metadata = RunMetadata {
            source: options.source.to_string(),
            model: options.model.clone(),
            device: options.device.clone(),
            conf: options.conf,
            imgsz: options.imgsz,
            created_at: Utc::now(),
            output_dir: PathBuf::new(),
        };
        let run = create_run(&options.project, &options.name, options.exist_ok, metadata)?;

        let stem = options.source.stem();
        let writer = options.save.then(|| {
            AnnotatedVideoWriter::new(
                annotated_video_path(&run.output_dir, &stem),
                reader.source_fps(),
            )
        });
        let window = options
            .show
            .then(|| FrameWindow::new(options.source.to_string()));

        match total_frames {
            Some(n) => {
                self.pb.set_length(n as u64);
                if let Ok(style) = ProgressStyle::default_bar().template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow} fps, {eta})",
                ) {
                    self.pb.set_style(style.progress_chars("#>-"));
                }
            }
            None => {
                if let Ok(style) =
                    ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} frames ({per_sec:.1.yellow} fps)")
                {
                    self.pb.set_style(style);
                }
            }
        }

        Ok(Session {
            reader,
            run_dir: run.output_dir,
            stem,
            writer,
            window,
            total_frames,
            frame: 0,
            labels_written: 0,
            start_time: Instant::now(),
        })
    }

    fn step(&mut self, session: &mut Session) -> Result<Option<FrameResult>> {
        let frame = match session.reader.next_frame()? {
            Some(frame) => frame,
            None => return Ok(None),
        };
        session.frame += 1;

        let size = frame.size()?;
        let (width, height) = (size.width as f32, size.height as f32);
        let (detections, speed) = self.detector.detect(&frame)?;

        let file_stem = format!("{}_{}", session.stem, session.frame);
        if self.options.save || self.options.show {
            let annotated = annotate(&frame, &detections)?;
            if let Some(writer) = session.writer.as_mut() {
                writer.write(&annotated)?;
            }
            if let Some(window) = session.window.as_mut() {
                window.show(&annotated)?;
            }
        }
        if self.options.save_txt && !detections.is_empty() {
            let path = session
                .run_dir
                .join("labels")
                .join(format!("{}.txt", file_stem));
            write_labels(&path, &detections, width, height)?;
            session.labels_written += 1;
        }
        if self.options.save_crop {
            for d in &detections {
                save_crop(&frame, d, &session.run_dir, &file_stem)?;
            }
        }

        self.stats.record(&speed);
        self.pb.inc(1);

        let result = FrameResult {
            frame: session.frame,
            shape: (size.height as u32, size.width as u32),
            detections,
            save_dir: Some(session.run_dir.clone()),
            speed: Some(speed),
        };

        tracing::info!(
            "{} (frame {}/{}) {}: {}x{} {}, {:.1}ms",
            if self.options.source.is_device() { "stream" } else { "video 1/1" },
            result.frame,
            session
                .total_frames
                .map(|n| n.to_string())
                .unwrap_or_else(|| "?".to_string()),
            self.options.source,
            result.shape.0,
            result.shape.1,
            result.summary(),
            result.speed.as_ref().map(Speed::inference_ms).unwrap_or(0.0)
        );

        Ok(Some(result))
    }

    fn finish(&mut self, mut session: Box<Session>) -> Result<()> {
        if let Some(writer) = session.writer.as_mut() {
            writer.finish()?;
        }
        self.stats.duration = session.start_time.elapsed();
        self.pb.finish_and_clear();

        let avg = self.stats.average();
        tracing::info!(
            "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess per image at imgsz {} ({} frames in {:.1}s)",
            avg.preprocess_ms(),
            avg.inference_ms(),
            avg.postprocess_ms(),
            self.options.imgsz,
            self.stats.processed_frames,
            self.stats.duration.as_secs_f64()
        );
        if self.options.save_txt {
            tracing::info!(
                "{} label files saved to {}",
                session.labels_written,
                session.run_dir.join("labels").display()
            );
        }
        Ok(())
    }
}

impl<D: Detector> Iterator for FrameStream<D> {
    type Item = Result<FrameResult>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut session = match std::mem::replace(&mut self.state, State::Done) {
            State::Done => return None,
            State::Running(session) => session,
            State::Pending(opener) => match self.start(opener) {
                Ok(session) => Box::new(session),
                Err(e) => {
                    self.pb.abandon();
                    return Some(Err(e));
                }
            },
        };

        match self.step(&mut session) {
            Ok(Some(result)) => {
                self.state = State::Running(session);
                Some(Ok(result))
            }
            Ok(None) => self.finish(session).err().map(Err),
            Err(e) => {
                self.pb.abandon();
                Some(Err(e))
            }
        }
    }
}
