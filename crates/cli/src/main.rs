mod settings;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;

use facescan_core::annotation::domain::annotation_style::AnnotationStyle;
use facescan_core::annotation::infrastructure::outline_annotator::OutlineAnnotator;
use facescan_core::detection::domain::detection_parameters::DetectionParameters;
use facescan_core::detection::infrastructure::cascade_loader;
use facescan_core::detection::infrastructure::haar_face_detector::HaarFaceDetector;
use facescan_core::pipeline::detect_faces_use_case::DetectFacesUseCase;
use facescan_core::shared::color::Color;
use facescan_core::shared::constants::{DOWNLOAD_FILE_NAME, IMAGE_EXTENSIONS};

use settings::Settings;

/// Haar cascade face detection for still images.
#[derive(Parser)]
#[command(name = "facescan")]
struct Cli {
    /// Input JPEG or PNG file, or `-` to read from stdin.
    input: String,

    /// Where to write the annotated PNG.
    #[arg(short, long, default_value = DOWNLOAD_FILE_NAME)]
    output: PathBuf,

    /// Window growth between pyramid levels (1.0 exclusive to 2.0).
    #[arg(long)]
    scale_factor: Option<f64>,

    /// Overlapping hits a face needs before it is reported (1-10).
    #[arg(long)]
    min_neighbors: Option<i32>,

    /// Outline colour as #RRGGBB.
    #[arg(long)]
    rect_color: Option<Color>,

    /// Outline thickness in pixels (1-10).
    #[arg(long)]
    thickness: Option<u32>,

    /// Smallest face searched, as WIDTH,HEIGHT.
    #[arg(long, value_parser = parse_size)]
    min_size: Option<(u32, u32)>,

    /// Haar cascade XML to use instead of the default frontal-face cascade.
    #[arg(long)]
    cascade: Option<PathBuf>,

    /// Download the default cascade into the cache if it is missing.
    #[arg(long)]
    fetch_cascade: bool,

    /// Print only the detected boxes as JSON.
    #[arg(long)]
    json: bool,

    /// Settings file to read defaults from.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = merge(Settings::load(cli.config.as_deref())?, &cli);
    validate(&cli, &settings)?;

    let bytes = read_input(&cli.input)?;

    let cascade_path = if let Some(path) = cli.cascade.clone() {
        Some(path)
    } else if cli.fetch_cascade {
        let path = cascade_loader::fetch_default(Some(Box::new(download_progress)))?;
        eprintln!();
        Some(path)
    } else {
        None
    };
    let cascade = cascade_loader::load(cascade_path.as_deref())?;

    let detector = HaarFaceDetector::new(Arc::new(cascade));
    let annotator = OutlineAnnotator::new(AnnotationStyle::new(
        settings.rect_color,
        settings.thickness,
    ))?;
    let use_case = DetectFacesUseCase::new(Box::new(detector), Box::new(annotator));

    let params = DetectionParameters::new(settings.scale_factor, settings.min_neighbors)
        .with_min_size(settings.min_size.0, settings.min_size.1);
    let report = use_case.execute(&bytes, &params)?;

    if cli.json {
        println!("{}", report.boxes_json()?);
    } else if report.is_empty() {
        println!("No faces detected. Try lowering scaleFactor or minNeighbors.");
    } else {
        println!("Detected {} face(s).", report.face_count());
        println!("{}", report.boxes_json()?);
    }

    report.download()?.write_to(&cli.output)?;
    log::info!("Saved annotated image to {}", cli.output.display());
    if !cli.json {
        println!("Saved {}", cli.output.display());
    }

    Ok(())
}

/// Command-line flags take precedence over the settings file.
fn merge(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(v) = cli.scale_factor {
        settings.scale_factor = v;
    }
    if let Some(v) = cli.min_neighbors {
        settings.min_neighbors = v;
    }
    if let Some(v) = cli.rect_color {
        settings.rect_color = v;
    }
    if let Some(v) = cli.thickness {
        settings.thickness = v;
    }
    if let Some(v) = cli.min_size {
        settings.min_size = v;
    }
    settings
}

fn validate(cli: &Cli, settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    if cli.input != "-" {
        let input = Path::new(&cli.input);
        if !input.exists() {
            return Err(format!("Input file not found: {}", input.display()).into());
        }
        if !is_image(input) {
            return Err(format!(
                "Input must be one of: {}, got {}",
                IMAGE_EXTENSIONS.join(", "),
                input.display()
            )
            .into());
        }
    }
    if !(settings.scale_factor > 1.0 && settings.scale_factor <= 2.0) {
        return Err(format!(
            "Scale factor must be greater than 1.0 and at most 2.0, got {}",
            settings.scale_factor
        )
        .into());
    }
    if !(1..=10).contains(&settings.min_neighbors) {
        return Err(format!(
            "Min neighbors must be between 1 and 10, got {}",
            settings.min_neighbors
        )
        .into());
    }
    if !(1..=10).contains(&settings.thickness) {
        return Err(format!(
            "Thickness must be between 1 and 10, got {}",
            settings.thickness
        )
        .into());
    }
    if settings.min_size.0 == 0 || settings.min_size.1 == 0 {
        return Err(format!(
            "Min size must be positive, got {}x{}",
            settings.min_size.0, settings.min_size.1
        )
        .into());
    }
    Ok(())
}

fn read_input(input: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if input == "-" {
        let mut bytes = Vec::new();
        std::io::stdin().read_to_end(&mut bytes)?;
        Ok(bytes)
    } else {
        Ok(std::fs::read(input)?)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(',')
        .ok_or_else(|| format!("expected WIDTH,HEIGHT, got '{value}'"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid size '{value}': {e}"))
    };
    Ok((parse(w)?, parse(h)?))
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face cascade... {pct}%");
    } else {
        eprint!("\rDownloading face cascade... {downloaded} bytes");
    }
}
