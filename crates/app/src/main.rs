mod canvas;
mod synth;

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use spectrum_visualiser_core::{
    create_visualizer, Canvas, Color, FrameInput, FrameOutcome, Paint, Point, QualityLevel,
    StyleKind, VisualiserConfig, VisualiserError,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::canvas::PixelCanvas;
use crate::synth::SyntheticSpectrum;

/// Raw bins produced by the synthetic source, before resampling.
const SOURCE_BINS: usize = 512;

fn main() -> spectrum_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => run_render(&args).map(|summary| summary.log()),
        Commands::Styles => {
            for kind in StyleKind::all() {
                println!("{kind}");
            }
            Ok(())
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct RenderSummary {
    drawn: usize,
    culled: usize,
    invalid: usize,
    failed: usize,
    elapsed: Duration,
}

impl RenderSummary {
    fn record(&mut self, outcome: FrameOutcome) {
        match outcome {
            FrameOutcome::Drawn => self.drawn += 1,
            FrameOutcome::Culled => self.culled += 1,
            FrameOutcome::Invalid => self.invalid += 1,
            FrameOutcome::Failed => self.failed += 1,
        }
    }

    fn frames(&self) -> usize {
        self.drawn + self.culled + self.invalid + self.failed
    }

    fn log(&self) {
        let per_frame_us = self.elapsed.as_micros() as u64 / self.frames().max(1) as u64;
        info!(
            drawn = self.drawn,
            culled = self.culled,
            invalid = self.invalid,
            failed = self.failed,
            per_frame_us,
            "render finished"
        );
    }
}

fn load_config(args: &RenderArgs) -> spectrum_visualiser_core::Result<VisualiserConfig> {
    let mut config = match &args.config {
        Some(path) => VisualiserConfig::load(path)?,
        None => VisualiserConfig::default(),
    };
    if let Some(quality) = args.quality {
        config.quality = quality;
    }
    if args.overlay {
        config.overlay = true;
    }
    if args.seed.is_some() {
        config.style.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

fn run_render(args: &RenderArgs) -> spectrum_visualiser_core::Result<RenderSummary> {
    let config = load_config(args)?;
    if args.output.is_some() && args.frames == 0 {
        return Err(VisualiserError::msg("--output needs at least one frame"));
    }
    info!(style = %args.style, quality = %config.quality, frames = args.frames, "rendering");

    let mut renderer = create_visualizer(args.style);
    renderer.configure(&config)?;
    renderer.initialize()?;

    let mut canvas = PixelCanvas::new(args.width, args.height);
    let mut source = SyntheticSpectrum::new(SOURCE_BINS);
    let paint = Paint::fill(Color::rgb(60, 190, 255));
    let step = Duration::from_secs_f32(1.0 / args.fps.max(1) as f32);
    let start = Instant::now();
    let mut summary = RenderSummary::default();

    for frame in 0..args.frames {
        let offset = step * frame as u32;
        let spectrum = source.frame(offset.as_secs_f32());
        let input = FrameInput::new(spectrum, &paint)
            .with_bars(args.bar_width, args.bar_spacing, args.bars)
            .at(start + offset);

        canvas.clear(Color::BLACK);
        let mut overlay = |canvas: &mut dyn Canvas| {
            let label = frame.to_string();
            canvas.draw_text(&label, Point::new(4.0, 14.0), 12.0, &Paint::fill(Color::WHITE));
        };
        let overlay: Option<&mut dyn FnMut(&mut dyn Canvas)> = if config.overlay {
            Some(&mut overlay)
        } else {
            None
        };

        let outcome = renderer.render(&mut canvas, &input, overlay)?;
        debug!(frame, ?outcome, "frame rendered");
        summary.record(outcome);
    }
    summary.elapsed = start.elapsed();
    renderer.dispose();

    if let Some(path) = &args.output {
        let file = File::create(path)?;
        canvas.write_ppm(BufWriter::new(file))?;
        info!(path = %path.display(), "wrote last frame");
    }
    Ok(summary)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Spectrum-driven visualiser renderers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a synthetic spectrum through one style, offline.
    Render(RenderArgs),
    /// List the available styles.
    Styles,
}

#[derive(Args, Debug, Clone)]
struct RenderArgs {
    /// Style to draw, e.g. `bars` or `circular-wave`.
    #[arg(short, long, default_value = "bars")]
    style: StyleKind,
    #[arg(short, long, default_value_t = 120)]
    frames: usize,
    #[arg(long, default_value_t = 640)]
    width: usize,
    #[arg(long, default_value_t = 360)]
    height: usize,
    #[arg(long, default_value_t = 60)]
    fps: u32,
    #[arg(long, default_value_t = 48)]
    bars: usize,
    #[arg(long, default_value_t = 10.0)]
    bar_width: f32,
    #[arg(long, default_value_t = 3.0)]
    bar_spacing: f32,
    /// Overrides the quality from the config file.
    #[arg(short, long)]
    quality: Option<QualityLevel>,
    /// Draw a frame counter on top and use overlay smoothing.
    #[arg(long)]
    overlay: bool,
    /// Fixed RNG seed for reproducible particles.
    #[arg(long)]
    seed: Option<u64>,
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Where to write the final frame as a PPM image.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(style: &str) -> RenderArgs {
        let cli = Cli::parse_from([
            "spectrum-visualiser",
            "render",
            "--style",
            style,
            "--frames",
            "30",
            "--width",
            "160",
            "--height",
            "90",
            "--seed",
            "5",
        ]);
        match cli.command {
            Commands::Render(args) => args,
            Commands::Styles => unreachable!(),
        }
    }

    #[test]
    fn cli_parses_style_and_quality() {
        let cli = Cli::parse_from([
            "spectrum-visualiser",
            "render",
            "-s",
            "circular_wave",
            "-q",
            "low",
        ]);
        let Commands::Render(args) = cli.command else {
            panic!("expected render");
        };
        assert_eq!(args.style, StyleKind::CircularWave);
        assert_eq!(args.quality, Some(QualityLevel::Low));
        assert!(Cli::try_parse_from(["spectrum-visualiser", "render", "-s", "spiral"]).is_err());
    }

    #[test]
    fn every_style_renders_the_synthetic_signal() {
        for kind in StyleKind::all() {
            let summary = run_render(&args(kind.label())).unwrap();
            assert_eq!(summary.frames(), 30, "{kind}");
            assert_eq!(summary.invalid + summary.failed, 0, "{kind}");
            assert!(summary.drawn > 0, "{kind} never drew");
        }
    }

    #[test]
    fn output_without_frames_is_rejected() {
        let mut args = args("dots");
        args.frames = 0;
        args.output = Some(std::env::temp_dir().join("spectrum-visualiser-empty.ppm"));

        let err = run_render(&args).unwrap_err();
        assert!(matches!(err, VisualiserError::Message(_)));
        assert!(!args.output.unwrap().exists());
    }

    #[test]
    fn writes_the_last_frame() {
        let name = format!("spectrum-visualiser-{}.ppm", std::process::id());
        let path = std::env::temp_dir().join(name);
        let mut args = args("bars");
        args.output = Some(path.clone());
        run_render(&args).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"P6\n160 90\n255\n"));
        std::fs::remove_file(path).unwrap();
    }
}
