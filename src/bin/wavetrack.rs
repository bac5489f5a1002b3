//! wavetrack CLI — track floating markers in decoded video frames and
//! export calibrated waveform measurements.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{info, warn};

use wavetrack_rs::pipeline::{
    Homography, HomographyRectifier, ImageSequenceSource, MarkerSetupBuilder, Pipeline,
    PipelineConfig, PresetRegions, ScaleSource, draw_overlay, plot_elevations, save_measurements,
};
use wavetrack_rs::tracker::{BankConfig, NccParams, Rect, TrackerKind};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "wavetrack")]
#[command(
    about = "Track floating markers across video frames and convert their motion into waveform measurements in meters"
)]
#[command(version)]
struct Cli {
    /// Directory of sequentially named frame images (the decoded video).
    #[arg(long)]
    frames: PathBuf,

    /// Number of markers to track.
    #[arg(long)]
    markers: usize,

    /// Initial marker region, repeated once per marker.
    #[arg(long = "region", value_name = "X,Y,W,H")]
    regions: Vec<String>,

    /// Global pixels-per-meter scale.
    #[arg(long, conflicts_with = "ref_pairs")]
    ppm: Option<f64>,

    /// Reference point pair spanning one meter on a marker, repeated once
    /// per marker; enables per-marker calibration.
    #[arg(long = "ref-pair", value_name = "X1,Y1,X2,Y2")]
    ref_pairs: Vec<String>,

    /// Output path for the measurement array.
    #[arg(long, default_value = "wave_measurements.bin")]
    out: PathBuf,

    /// Output path for the per-marker elevation plot.
    #[arg(long, default_value = "position_graphs.png")]
    plot: PathBuf,

    /// Write per-frame tracking overlays into this directory.
    #[arg(long, value_name = "DIR")]
    overlay_dir: Option<PathBuf>,

    /// Row-major 3x3 homography mapping rectified pixels to source pixels;
    /// rectifies every frame before tracking.
    #[arg(long, value_name = "H00,H01,..,H22", requires = "rect_size")]
    homography: Option<String>,

    /// Pixel size of rectified frames.
    #[arg(long, value_name = "W,H", requires = "homography")]
    rect_size: Option<String>,

    /// Search window radius in pixels.
    #[arg(long, default_value = "24")]
    search_radius: i32,

    /// Minimum correlation score to accept a match.
    #[arg(long, default_value = "0.5")]
    min_score: f32,

    /// Smooth tracking with a constant-velocity motion model.
    #[arg(long)]
    filtered: bool,
}

fn parse_numbers(what: &str, raw: &str, expected: usize) -> CliResult<Vec<f64>> {
    let values: Vec<f64> = raw
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid {} '{}': {}", what, raw, e))?;
    if values.len() != expected {
        return Err(format!(
            "invalid {} '{}': expected {} comma-separated values, got {}",
            what,
            raw,
            expected,
            values.len()
        )
        .into());
    }
    Ok(values)
}

fn run(cli: Cli) -> CliResult<()> {
    let source = ImageSequenceSource::open(&cli.frames)?;

    let mut builder = MarkerSetupBuilder::new();
    for raw in &cli.regions {
        let v = parse_numbers("region", raw, 4)?;
        builder = builder.region(Rect::new(v[0] as f32, v[1] as f32, v[2] as f32, v[3] as f32));
    }
    for raw in &cli.ref_pairs {
        let v = parse_numbers("reference pair", raw, 4)?;
        builder = builder.reference_pair((v[0], v[1]), (v[2], v[3]));
    }
    let setup = builder.build(cli.markers)?;

    let scale = match cli.ppm {
        Some(ppm) => ScaleSource::Ppm(ppm),
        None if setup.reference_points.is_some() => ScaleSource::FromReferencePoints,
        None => return Err("either --ppm or one --ref-pair per marker is required".into()),
    };
    let config = PipelineConfig {
        bank: BankConfig {
            kind: if cli.filtered {
                TrackerKind::Filtered
            } else {
                TrackerKind::Correlation
            },
            ncc: NccParams {
                search_radius: cli.search_radius,
                min_score: cli.min_score,
            },
        },
        scale,
    };

    let mut pipeline = Pipeline::new(source, PresetRegions::new(setup), config);

    if let Some(raw) = &cli.homography {
        let h = parse_numbers("homography", raw, 9)?;
        let size = parse_numbers("rectified size", cli.rect_size.as_deref().unwrap_or(""), 2)?;
        let homography = Homography::from_array([
            [h[0], h[1], h[2]],
            [h[3], h[4], h[5]],
            [h[6], h[7], h[8]],
        ]);
        pipeline = pipeline.with_rectifier(HomographyRectifier::new(
            homography,
            size[0] as usize,
            size[1] as usize,
        ));
    }

    if let Some(dir) = cli.overlay_dir.clone() {
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("cannot create overlay directory {}: {}", dir.display(), e))?;
        pipeline = pipeline.with_frame_callback(move |frame, observations| {
            let path = dir.join(format!("overlay_{:05}.png", frame.index));
            if let Err(e) = draw_overlay(frame, observations).save(&path) {
                warn!("overlay write failed for {}: {}", path.display(), e);
            }
        });
    }

    let output = pipeline.run()?;
    info!(
        "processed {} frames, {} markers{}",
        output.frames_processed,
        output.waveform.num_markers(),
        if output.cancelled { " (cancelled)" } else { "" }
    );

    // Output failures are reported but never discard the computed result.
    if let Err(e) = save_measurements(&output.waveform, &cli.out) {
        warn!("could not save measurements: {}", e);
    } else {
        info!("measurements written to {}", cli.out.display());
    }
    if let Err(e) = plot_elevations(&output.waveform, &cli.plot) {
        warn!("could not render plot: {}", e);
    } else {
        info!("plot written to {}", cli.plot.display());
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
