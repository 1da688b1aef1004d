//! mvtrack CLI — marker tracking between two images and robust model fitting.

use clap::{Args, Parser, Subcommand, ValueEnum};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use mvtrack::multiview::{euclidean_2d_robust, homography_2d_robust, similarity_2d_robust};
use mvtrack::{
    AutoTrack, AutoTrackOptions, InMemoryFrameAccessor, Marker, RansacConfig, Region,
    TrackRegionResult, TrackerMode,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "mvtrack")]
#[command(about = "Track markers between frames and fit robust 2D models to correspondences")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track one marker from a reference image into a second image.
    Track(CliTrackArgs),

    /// Fit a 2D model to correspondences with RANSAC.
    Fit(CliFitArgs),
}

#[derive(Debug, Clone, Args)]
struct CliTrackArgs {
    /// Reference image containing the marker.
    #[arg(long)]
    image1: PathBuf,

    /// Image to track the marker into.
    #[arg(long)]
    image2: PathBuf,

    /// Marker centre x in the reference image (pixels).
    #[arg(long)]
    x: f64,

    /// Marker centre y in the reference image (pixels).
    #[arg(long)]
    y: f64,

    /// Half side of the square marker patch (pixels).
    #[arg(long, default_value = "5.0")]
    half_size: f64,

    /// Predicted centre in the second image as "x,y" (defaults to the
    /// reference centre).
    #[arg(long)]
    predict: Option<String>,

    /// JSON file with tracking options; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Alignment strategy.
    #[arg(long, value_enum)]
    mode: Option<TrackerModeArg>,

    /// Half side of the square search window around each marker (pixels).
    #[arg(long)]
    search_half_size: Option<f64>,

    /// Minimum normalized cross-correlation of an accepted match.
    #[arg(long)]
    min_correlation: Option<f64>,

    /// Pyramid levels for gradient refinement.
    #[arg(long)]
    pyramid_levels: Option<usize>,

    /// Output JSON path (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TrackerModeArg {
    Brute,
    Gradient,
    Hybrid,
}

impl From<TrackerModeArg> for TrackerMode {
    fn from(m: TrackerModeArg) -> Self {
        match m {
            TrackerModeArg::Brute => TrackerMode::Brute,
            TrackerModeArg::Gradient => TrackerMode::Gradient,
            TrackerModeArg::Hybrid => TrackerMode::Hybrid,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct CliFitArgs {
    /// JSON file `{"x1": [[x, y], ...], "x2": [[x, y], ...]}`.
    #[arg(long)]
    input: PathBuf,

    /// Model to fit.
    #[arg(long, value_enum, default_value_t = ModelArg::Homography)]
    model: ModelArg,

    /// Inlier threshold in pixels.
    #[arg(long, default_value = "1.0")]
    max_error: f64,

    /// Maximum RANSAC iterations.
    #[arg(long, default_value = "4096")]
    max_iterations: usize,

    /// RANSAC confidence in (0, 1).
    #[arg(long, default_value = "0.99")]
    confidence: f64,

    /// Sampling seed.
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Output JSON path (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelArg {
    Homography,
    Euclidean,
    Similarity,
}

#[derive(Debug, Deserialize)]
struct Correspondences {
    x1: Vec<[f64; 2]>,
    x2: Vec<[f64; 2]>,
}

#[derive(Debug, Serialize)]
struct TrackOutput {
    marker: Marker,
    result: TrackRegionResult,
}

#[derive(Debug, Serialize)]
struct FitOutput {
    model: &'static str,
    /// Row-major 3x3 matrix.
    matrix: [[f64; 3]; 3],
    inliers: Vec<usize>,
    num_correspondences: usize,
    score: f64,
    iterations: usize,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track(args) => run_track(&args),
        Commands::Fit(args) => run_fit(&args),
    }
}

fn write_output(out: Option<&Path>, json: &str) -> CliResult<()> {
    match out {
        Some(path) => {
            std::fs::write(path, json)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn parse_point(s: &str) -> CliResult<[f64; 2]> {
    let mut parts = s.split(',').map(|p| p.trim().parse::<f64>());
    match (parts.next(), parts.next(), parts.next()) {
        (Some(x), Some(y), None) => Ok([x?, y?]),
        _ => Err(format!("expected \"x,y\", got {:?}", s).into()),
    }
}

fn load_track_options(args: &CliTrackArgs) -> CliResult<AutoTrackOptions> {
    let mut options = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str::<AutoTrackOptions>(&text)?
        }
        None => AutoTrackOptions::default(),
    };
    if let Some(mode) = args.mode {
        options.track_region.mode = mode.into();
    }
    if let Some(half) = args.search_half_size {
        options.search_region = Region::square(half);
    }
    if let Some(c) = args.min_correlation {
        options.track_region.minimum_correlation = c;
    }
    if let Some(levels) = args.pyramid_levels {
        options.track_region.pyramid_levels = levels;
    }
    Ok(options)
}

fn run_track(args: &CliTrackArgs) -> CliResult<()> {
    let options = load_track_options(args)?;

    tracing::info!("Loading images: {} -> {}", args.image1.display(), args.image2.display());
    let img1 = image::open(&args.image1)?;
    let img2 = image::open(&args.image2)?;
    tracing::info!(
        "Image sizes: {}x{} and {}x{}",
        img1.width(),
        img1.height(),
        img2.width(),
        img2.height()
    );

    let accessor = InMemoryFrameAccessor::new()
        .with_frame(0, 0, img1)
        .with_frame(0, 1, img2);
    let auto = AutoTrack::with_options(accessor, options);

    let reference = Marker::new(0, 0, 0, [args.x, args.y], args.half_size);
    let mut tracked = reference.predicted_in(1);
    if let Some(p) = &args.predict {
        let p = parse_point(p)?;
        let d = [p[0] - reference.center[0], p[1] - reference.center[1]];
        tracked.center = p;
        tracked.patch = reference.patch.translated(d);
    }

    let result = auto.track_marker_to_frame(&reference, &mut tracked)?;
    tracing::info!(
        "Tracked ({:.3}, {:.3}) -> ({:.3}, {:.3}), correlation {:.4}",
        reference.center[0],
        reference.center[1],
        tracked.center[0],
        tracked.center[1],
        result.correlation
    );

    let json = serde_json::to_string_pretty(&TrackOutput {
        marker: tracked,
        result,
    })?;
    write_output(args.out.as_deref(), &json)
}

fn matrix_rows(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    let mut rows = [[0.0; 3]; 3];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, v) in row.iter_mut().enumerate() {
            *v = m[(r, c)];
        }
    }
    rows
}

fn run_fit(args: &CliFitArgs) -> CliResult<()> {
    let text = std::fs::read_to_string(&args.input)?;
    let corr: Correspondences = serde_json::from_str(&text)?;
    tracing::info!(
        "Loaded {} correspondences from {}",
        corr.x1.len(),
        args.input.display()
    );

    let config = RansacConfig {
        max_iterations: args.max_iterations,
        confidence: args.confidence,
        seed: args.seed,
    };
    let (name, est) = match args.model {
        ModelArg::Homography => (
            "homography",
            homography_2d_robust(&corr.x1, &corr.x2, args.max_error, &config)?,
        ),
        ModelArg::Euclidean => (
            "euclidean",
            euclidean_2d_robust(&corr.x1, &corr.x2, args.max_error, &config)?,
        ),
        ModelArg::Similarity => (
            "similarity",
            similarity_2d_robust(&corr.x1, &corr.x2, args.max_error, &config)?,
        ),
    };
    tracing::info!(
        "{} fit: {}/{} inliers after {} iterations",
        name,
        est.inliers.len(),
        corr.x1.len(),
        est.iterations
    );

    let json = serde_json::to_string_pretty(&FitOutput {
        model: name,
        matrix: matrix_rows(&est.model),
        inliers: est.inliers,
        num_correspondences: corr.x1.len(),
        score: est.score,
        iterations: est.iterations,
    })?;
    write_output(args.out.as_deref(), &json)
}
