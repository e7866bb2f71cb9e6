use clap::{ArgGroup, Parser};
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use omr_sheet_reader::{GradedSheet, Grader, GraderConfig, KeySource, Template};

type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(
    name = "omr_grade",
    about = "Grade photographed answer sheets against a layout template and answer key",
    version,
    group(
        ArgGroup::new("input")
            .required(true)
            .args(["image", "dir"])
    )
)]
struct Cli {
    /// Layout template JSON
    #[arg(short = 't', long = "template")]
    template: PathBuf,

    /// Answer key JSON (single key or exam-code keyed book)
    #[arg(short = 'k', long = "key")]
    key: PathBuf,

    /// Grader configuration JSON; defaults apply to anything omitted
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// A single sheet image
    #[arg(short = 'i', long = "image")]
    image: Option<PathBuf>,

    /// Directory of sheet images
    #[arg(short = 'd', long = "dir")]
    dir: Option<PathBuf>,

    /// Where annotated images and result JSON are written
    #[arg(short = 'o', long = "out-dir", default_value = "graded")]
    out_dir: PathBuf,

    /// Sheets graded concurrently
    #[arg(short = 'j', long = "jobs", default_value_t = 4)]
    jobs: usize,
}

fn is_image_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        return false;
    };
    matches!(
        ext.to_ascii_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "bmp" | "gif" | "tif" | "tiff" | "webp"
    )
}

fn collect_images(cli: &Cli) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if let Some(image) = &cli.image {
        return Ok(vec![image.clone()]);
    }
    let Some(dir) = &cli.dir else {
        return Ok(Vec::new());
    };
    if !dir.is_dir() {
        return Err(format!("Not a directory: {}", dir.display()).into());
    }
    let mut images: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image_file(p))
        .collect();
    images.sort();
    Ok(images)
}

fn output_paths(out_dir: &Path, image_path: &Path) -> (PathBuf, PathBuf) {
    let stem = image_path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("sheet");
    (
        out_dir.join(format!("{stem}_graded.png")),
        out_dir.join(format!("{stem}_result.json")),
    )
}

fn grade_file(grader: &Grader, image_path: &Path, out_dir: &Path) -> Result<GradedSheet, BoxError> {
    let img = image::open(image_path)?;
    let sheet = grader.grade(&img)?;

    let (png_path, json_path) = output_paths(out_dir, image_path);
    sheet.annotated.save(&png_path)?;
    fs::write(&json_path, serde_json::to_string_pretty(&sheet.result)?)?;
    Ok(sheet)
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();

    let template = Template::load(&cli.template)?;
    let keys = KeySource::load(&cli.key)?;
    let config = match &cli.config {
        Some(path) => GraderConfig::load(path)?,
        None => GraderConfig::default(),
    };
    let grader = Arc::new(Grader::new(template, keys, config)?);

    let images = collect_images(&cli)?;
    if images.is_empty() {
        tracing::warn!("no images to grade");
        return Ok(());
    }
    fs::create_dir_all(&cli.out_dir)?;

    let out_dir = Arc::new(cli.out_dir.clone());
    let outcomes = stream::iter(images)
        .map(|path| {
            let grader = Arc::clone(&grader);
            let out_dir = Arc::clone(&out_dir);
            async move {
                let task_path = path.clone();
                let joined =
                    tokio::task::spawn_blocking(move || grade_file(&grader, &task_path, &out_dir))
                        .await;
                (path, joined)
            }
        })
        .buffer_unordered(cli.jobs.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut failed = 0usize;
    for (path, joined) in outcomes {
        match joined {
            Ok(Ok(sheet)) => {
                let r = &sheet.result;
                tracing::info!(
                    image = %path.display(),
                    score = r.score,
                    total = r.total,
                    percentage = format_args!("{:.2}", r.percentage),
                    student = r.student_id.as_deref().unwrap_or("-"),
                    quiz = r.quiz_id.as_deref().unwrap_or("-"),
                    class = r.class_id.as_deref().unwrap_or("-"),
                    "graded"
                );
            }
            Ok(Err(e)) => {
                failed += 1;
                tracing::error!(image = %path.display(), "grading failed: {e}");
            }
            Err(e) => {
                failed += 1;
                tracing::error!(image = %path.display(), "grading task aborted: {e}");
            }
        }
    }

    if failed > 0 {
        tracing::warn!(failed, "some sheets were not graded");
    }
    Ok(())
}
