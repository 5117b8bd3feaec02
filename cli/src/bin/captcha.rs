use captcha_common::{FrameRange, utils::ensure_output_dir};
use clap::{Parser, Subcommand, ValueEnum};
use cli::{RenderJob, load_config, write_config};
use color_eyre::eyre::{Result, eyre};
use frames::DirectoryStore;
use prerender::{RenderOperation, Renderer};
use segmentation::{Pipeline, SegmentationConfig, ThroughputObserver, io::{RegionReport, load_frame}};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OperationKind {
    LetterDetection,
    Threshold,
    Difference,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment one image and print its glyph regions as JSON
    Segment {
        /// Path to the captcha image
        #[arg(short, long)]
        image: PathBuf,
        /// Write the report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Segmentation config (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write the normalized glyphs of one image as PNG files
    Normalize {
        /// Path to the captcha image
        #[arg(short, long)]
        image: PathBuf,
        /// Output directory for the glyphs
        #[arg(short, long)]
        output: PathBuf,
        /// Segmentation config (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run one render operation over a range of frames
    Render {
        /// Data directory holding the input folder
        #[arg(short, long)]
        data: PathBuf,
        /// First frame number
        #[arg(long, default_value = "1")]
        start: u32,
        /// Last frame number (inclusive)
        #[arg(long)]
        end: u32,
        #[arg(long, value_enum, default_value = "letter-detection")]
        operation: OperationKind,
        /// Cut-off for the threshold operation
        #[arg(long, default_value = "128")]
        threshold: u8,
        /// Frame distance for the difference operation
        #[arg(long, default_value = "1")]
        step: u32,
        /// Extension of the written images
        #[arg(long, default_value = "jpg")]
        extension: String,
        /// Segmentation config (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run every step of a render job file
    Process {
        /// Path to the job file (.toml or .json)
        #[arg(short, long)]
        job: PathBuf,
    },
    /// Write the default segmentation config
    InitConfig {
        /// Destination (.toml or .json)
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the JSON schema of render job files
    Schema,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Segment { image, output, config } => {
            segment(image, output.as_deref(), config.as_deref())?;
        }
        Commands::Normalize { image, output, config } => {
            normalize(image, output, config.as_deref())?;
        }
        Commands::Render {
            data,
            start,
            end,
            operation,
            threshold,
            step,
            extension,
            config,
        } => {
            let operation = match operation {
                OperationKind::LetterDetection => RenderOperation::LetterDetection,
                OperationKind::Threshold => RenderOperation::Threshold { threshold: *threshold },
                OperationKind::Difference => RenderOperation::Difference { step: *step },
            };
            let config = load_config(config.as_deref())?;
            let store = DirectoryStore::new(data).with_extension(extension);
            render(&config, store, &operation, FrameRange::new(*start, *end)?)?;
        }
        Commands::Process { job } => {
            process_job(job)?;
        }
        Commands::InitConfig { output } => {
            write_config(&SegmentationConfig::default(), output)?;
            info!("Default configuration written to {:?}", output);
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&RenderJob::schema())?);
        }
    }

    Ok(())
}

fn segment(image_path: &Path, output: Option<&Path>, config: Option<&Path>) -> Result<()> {
    let pipeline = Pipeline::from_config(&load_config(config)?)?;
    let image = load_frame(image_path)?;
    let trace = pipeline.trace_named(&image_path.display().to_string(), &image)?;
    let report = RegionReport::from_trace(&trace);
    match output {
        Some(path) => {
            report.save_json(path)?;
            info!("Regions written to {:?}", path);
        }
        None => println!("{}", report.to_json()?),
    }
    Ok(())
}

fn normalize(image_path: &Path, output: &Path, config: Option<&Path>) -> Result<()> {
    let pipeline = Pipeline::from_config(&load_config(config)?)?;
    let image = load_frame(image_path)?;
    let glyphs = pipeline.glyphs_named(&image_path.display().to_string(), &image)?;

    ensure_output_dir(output)?;
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| eyre!("Image path has no file name: {:?}", image_path))?;
    for (i, glyph) in glyphs.iter().enumerate() {
        let path = output.join(format!("{}_{}.png", stem, i + 1));
        glyph.tensor.to_luma().save(&path)?;
        info!("{} -> {:?}", glyph.region, path);
    }
    Ok(())
}

fn render(config: &SegmentationConfig, store: DirectoryStore, operation: &RenderOperation, range: FrameRange) -> Result<()> {
    let observer = Arc::new(ThroughputObserver::default());
    let renderer = Renderer::directory(Pipeline::from_config(config)?, store).with_observer(observer.clone());
    let summary = renderer.execute(operation, range)?;
    info!("{}: {:?}", operation.description(), summary);
    if matches!(operation, RenderOperation::LetterDetection) {
        observer.finish();
    }
    Ok(())
}

fn process_job(job_path: &Path) -> Result<()> {
    let job = RenderJob::from_file(job_path)?;
    info!("Render job: {} frames from {}", job.frames.len(), job.data_dir);

    let observer = Arc::new(ThroughputObserver::default());
    let renderer = Renderer::directory(job.pipeline()?, job.store()).with_observer(observer.clone());
    for step in &job.steps {
        let Some(operation) = &step.operation else {
            warn!(
                "No operation found for step '{}': {}",
                step.name,
                step.description.clone().unwrap_or_default()
            );
            continue;
        };

        info!("Running step '{}' ({})", step.name, operation);
        let summary = renderer.execute(operation, job.frames)?;
        info!("Step '{}' done: {:?}", step.name, summary);
    }

    if observer.summary().frames > 0 {
        observer.finish();
    }
    info!("Render job completed");
    Ok(())
}
