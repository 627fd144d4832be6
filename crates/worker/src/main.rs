use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use persondet_core::detection::domain::roi_advisor::RoiAdvisor;
use persondet_core::detection::infrastructure::model_sessions::ModelSessionManager;
use persondet_core::detection::infrastructure::onnx_engine::OnnxEngineLoader;
use persondet_core::detection::infrastructure::suppressor_factory::create_suppressor;
use persondet_core::detection::infrastructure::yolo_decoder::YoloDecoder;
use persondet_core::pipeline::detect_frame_use_case::DetectFrameUseCase;
use persondet_core::pipeline::worker_logger::StderrWorkerLogger;
use persondet_core::protocol::channel::{
    InterruptAction, InterruptState, Shutdown, WorkerChannel,
};
use persondet_core::shared::constants::DEFAULT_CONFIDENCE;

/// Person detection worker. Reads length-prefixed MessagePack frames and
/// commands on stdin and writes detection results to stdout.
#[derive(Parser)]
#[command(name = "person-detector")]
struct Cli {
    /// Primary ONNX model (usually 640x640).
    #[arg(long)]
    model: PathBuf,

    /// Secondary ONNX model for ROI attention; enables multi-model mode.
    #[arg(long = "model-320", alias = "secondary-model")]
    model_320: Option<PathBuf>,

    /// Person confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f64,
}

fn main() {
    init_logger();

    let code = match run() {
        Ok(Shutdown::EndOfStream | Shutdown::Interrupted) => 0,
        Ok(Shutdown::ChannelBroken) => 1,
        Err(e) => {
            log::error!("Failed to initialize detector: {e}");
            1
        }
    };
    log::info!("Worker shutting down");
    process::exit(code);
}

/// Diagnostics go to stderr; stdout carries protocol bytes only.
fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                buf.timestamp_micros(),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn run() -> Result<Shutdown, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let sessions = ModelSessionManager::new(
        Box::new(OnnxEngineLoader),
        &cli.model,
        cli.model_320.as_deref(),
    )?;
    let mode = if sessions.multi_model_enabled() {
        "MULTI-MODEL"
    } else {
        "SINGLE-MODEL"
    };

    let use_case = DetectFrameUseCase::new(
        sessions,
        YoloDecoder::new(cli.confidence),
        create_suppressor(),
        RoiAdvisor::default(),
        Box::new(StderrWorkerLogger::new()),
    );

    let interrupt = Arc::new(InterruptState::default());
    let state = Arc::clone(&interrupt);
    ctrlc::set_handler(move || {
        // An idle worker is parked in a blocking read the signal does not wake.
        if state.request() == InterruptAction::ExitNow {
            log::info!("Worker interrupted");
            log::info!("Worker shutting down");
            process::exit(0);
        }
    })?;

    log::info!(
        "Person detector worker ready ({mode} MODE, confidence {}). Waiting for frames and commands on stdin...",
        cli.confidence
    );

    let mut channel = WorkerChannel::new(
        io::stdin().lock(),
        io::stdout().lock(),
        use_case,
        interrupt,
    );
    Ok(channel.serve())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if !cli.model.is_file() {
        return Err(format!("Model file not found: {}", cli.model.display()).into());
    }
    if let Some(path) = &cli.model_320 {
        if !path.is_file() {
            return Err(format!("Secondary model file not found: {}", path.display()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("person-detector").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["--model", "yolo11n.onnx"]);
        assert_eq!(cli.model, PathBuf::from("yolo11n.onnx"));
        assert!(cli.model_320.is_none());
        assert!((cli.confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_secondary_model_alias() {
        let cli = parse(&["--model", "a.onnx", "--secondary-model", "b.onnx"]);
        assert_eq!(cli.model_320, Some(PathBuf::from("b.onnx")));
        let cli = parse(&["--model", "a.onnx", "--model-320", "c.onnx"]);
        assert_eq!(cli.model_320, Some(PathBuf::from("c.onnx")));
    }

    #[test]
    fn test_model_is_required() {
        assert!(Cli::try_parse_from(["person-detector"]).is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_confidence() {
        let cli = parse(&["--model", "a.onnx", "--confidence", "1.5"]);
        let err = validate(&cli).unwrap_err();
        assert!(err.to_string().contains("Confidence"));
    }

    #[test]
    fn test_validate_rejects_missing_model() {
        let cli = parse(&["--model", "/nonexistent/yolo11n.onnx"]);
        let err = validate(&cli).unwrap_err();
        assert!(err.to_string().contains("Model file not found"));
    }
}
