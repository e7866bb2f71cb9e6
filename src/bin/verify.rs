use clap::Parser;
use serde::Serialize;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use omr_sheet_reader::marker::DetectedMarker;
use omr_sheet_reader::rectify::Correspondence;
use omr_sheet_reader::{GraderConfig, Template, check_alignment};

#[derive(Parser, Debug)]
#[command(
    name = "omr_verify",
    about = "Detect markers, rectify a sheet and draw the template over it",
    version
)]
struct Cli {
    /// Layout template JSON
    #[arg(short = 't', long = "template")]
    template: PathBuf,

    /// Sheet image
    #[arg(short = 'i', long = "image")]
    image: PathBuf,

    /// Grader configuration JSON
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Alignment overlay PNG
    #[arg(short = 'o', long = "out", default_value = "verify_warp.png")]
    out: PathBuf,

    /// Detections JSON; printed to stdout when omitted
    #[arg(long = "json")]
    json: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    markers: &'a [DetectedMarker],
    correspondences: &'a [Correspondence],
    inliers: &'a [usize],
    rms_px: f64,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();

    let template = Template::load(&cli.template)?;
    let config = match &cli.config {
        Some(path) => GraderConfig::load(path)?,
        None => GraderConfig::default(),
    };
    let img = image::open(&cli.image)?;

    let check = check_alignment(&img, &template, &config).inspect_err(|e| {
        tracing::error!(image = %cli.image.display(), "{e}");
    })?;
    let alignment = &check.alignment;

    check.overlay.save(&cli.out)?;
    tracing::info!(
        out = %cli.out.display(),
        markers = check.markers.len(),
        inliers = alignment.inliers.len(),
        rms_px = format_args!("{:.2}", alignment.rms_px),
        "alignment overlay written"
    );

    let report = Report {
        markers: &check.markers,
        correspondences: &alignment.correspondences,
        inliers: &alignment.inliers,
        rms_px: alignment.rms_px,
    };
    let json = serde_json::to_string_pretty(&report)?;
    match &cli.json {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}
