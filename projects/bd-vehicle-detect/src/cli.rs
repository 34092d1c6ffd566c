use clap::Parser;

/// Vehicle detection on a video using a YOLO model.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to input video (e.g., test.mp4). For webcam use '0'
    pub source: String,

    /// Path to YOLO model weights (.pt resolves to a sibling .onnx export)
    #[arg(long, env = "BD_VEHICLE_MODEL", default_value = "BD_Vehicle_YOLO11.pt")]
    pub model: String,

    /// Confidence threshold (0-1)
    #[arg(long, default_value_t = 0.25)]
    pub conf: f32,

    /// Compute device, e.g., 'cpu', 'cuda', 'cuda:0'. Default: auto
    #[arg(long, env = "BD_VEHICLE_DEVICE")]
    pub device: Option<String>,

    /// Project directory to save results
    #[arg(long, default_value = "runs/detect")]
    pub project: String,

    /// Experiment name (subfolder in project)
    #[arg(long, default_value = "predict")]
    pub name: String,

    /// Allow existing project/name without incrementing
    #[arg(long)]
    pub exist_ok: bool,

    /// Show annotated frames in a window during processing
    #[arg(long)]
    pub show: bool,

    /// Save detections as YOLO label text files
    #[arg(long)]
    pub save_txt: bool,

    /// Save cropped detections as images
    #[arg(long)]
    pub save_crop: bool,

    /// Inference image size
    #[arg(long, default_value_t = 640)]
    pub imgsz: u32,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
