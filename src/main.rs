use clap::Parser;
use image::ImageReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use defectscan::{DebugConfig, DetectorConfig, Frame, FrameGate, FrameOutcome, FrameProcessor, ResultKind, ResultSink};

#[derive(Parser)]
#[command(name = "defectscan")]
#[command(about = "Mark small circular defects in a stream of camera frames")]
struct Cli {
    /// Image files or directories of frames, replayed in name order
    #[arg(value_name = "INPUT", required_unless_present = "write_default_config")]
    inputs: Vec<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write annotated frames to this directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Save debug outputs to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Process at most this many frames per second
    #[arg(long, value_name = "N")]
    fps: Option<f64>,

    /// Override the lower bound of the accepted contour area
    #[arg(long)]
    min_area: Option<f64>,

    /// Override the upper bound of the accepted contour area
    #[arg(long)]
    max_area: Option<f64>,

    /// Write the default configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    write_default_config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Prints the secondary results next to each frame summary
struct PrintSink;

impl ResultSink for PrintSink {
    fn on_result(&self, kind: ResultKind, payload: &[f32]) {
        if kind == ResultKind::OuterLabels && !payload.is_empty() {
            let labels: Vec<String> = payload.iter().map(|v| format!("{:.0}", v)).collect();
            println!("    labels: {}", labels.join(", "));
        }
    }
}

fn collect_frames(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            entries.sort();
            frames.extend(entries);
        } else {
            frames.push(input.clone());
        }
    }
    Ok(frames)
}

fn load_frame(path: &Path) -> anyhow::Result<Frame> {
    let img = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode {}: {}", path.display(), e))?;
    Ok(Frame::new(img.to_rgb8()))
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    if let Some(path) = &args.write_default_config {
        DetectorConfig::default().save(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => DetectorConfig::load(path)?,
        None => DetectorConfig::default(),
    };
    if let Some(min) = args.min_area {
        config.geometry.min_area = min;
    }
    if let Some(max) = args.max_area {
        config.geometry.max_area = max;
    }
    config.validate()?;
    log::info!(
        "Area band [{}, {}], color band [{}, {}]",
        config.geometry.min_area,
        config.geometry.max_area,
        config.color.min_average,
        config.color.max_average
    );

    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)?;
    }

    let (processor, display) = FrameProcessor::new(&config);
    let mut processor = processor.with_sink(Box::new(PrintSink));
    if let Some(fps) = args.fps.filter(|f| *f > 0.0) {
        processor = processor.with_gate(FrameGate::new(Duration::from_secs_f64(1.0 / fps)));
    }
    if let Some(debug_dir) = args.debug_out {
        processor = processor.with_debug(DebugConfig::new(debug_dir)?);
    }

    let frames = collect_frames(&args.inputs)?;
    if args.verbose {
        println!("Replaying {} frames\n", frames.len());
    }

    let mut published = 0usize;
    for path in &frames {
        let frame = match load_frame(path) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("{}", e);
                continue;
            }
        };

        match processor.submit(frame, Instant::now()) {
            FrameOutcome::Published {
                sequence,
                outer,
                nested,
            } => {
                published += 1;
                println!(
                    "{}: {} defects, {} nested markers",
                    path.display(),
                    outer,
                    nested
                );
                if let (Some(dir), Some(annotated)) = (&args.output, display.latest()) {
                    let name = format!("{:05}_annotated.png", sequence);
                    annotated
                        .image
                        .save(dir.join(name))
                        .map_err(|e| anyhow::anyhow!("Failed to save annotated frame: {}", e))?;
                }
            }
            other => log::debug!("{}: {:?}", path.display(), other),
        }
    }

    println!("\n=== Defect Scan Results ===");
    println!("Frames processed: {} of {}", published, frames.len());
    if let Some(scale) = display.scale() {
        log::debug!("Display scale {:.3} x {:.3}", scale.scale_x, scale.scale_y);
    }

    Ok(())
}
