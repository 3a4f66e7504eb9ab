use clap::{ArgGroup, Parser, Subcommand, ValueHint};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod annotation;
mod error;
mod plot;
mod probe;
mod state;
mod stats;

use error::{PipelineError, Result};
use plot::{JsonReport, PlotSink, SvgChart};
use probe::ImageCodec;
use state::{AnalysisConfig, DatasetTable, ProbePolicy};

/// Image dataset size analysis
#[derive(Parser, Debug)]
#[command(
    name = "imgstat",
    version,
    about = "Analyze image sizes of a dataset described by an annotation file",
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    analyze: AnalyzeArgs,

    /// Debug-level logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Flags of the default analysis run
#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// Path to the annotation file (CSV)
    #[arg(long, required = true, value_hint = ValueHint::FilePath)]
    annotation: Option<PathBuf>,

    /// Maximum image height kept by the filter
    #[arg(long, alias = "max_height", required = true, allow_negative_numbers = true)]
    max_height: Option<i64>,

    /// Maximum image width kept by the filter
    #[arg(long, alias = "max_width", required = true, allow_negative_numbers = true)]
    max_width: Option<i64>,

    /// Number of area histogram bins [default: 20]
    #[arg(long, allow_negative_numbers = true)]
    bins: Option<i64>,

    /// Parallel image decoders [default: 1]
    #[arg(long, allow_negative_numbers = true)]
    workers: Option<i64>,

    /// Give up on an image after this many milliseconds
    #[arg(long, allow_negative_numbers = true)]
    decode_timeout_ms: Option<i64>,

    /// Probe every image even if its shape is already known
    #[arg(long)]
    reprobe: bool,

    /// Decode all pixels instead of headers only
    #[arg(long)]
    full_decode: bool,

    /// Where to write the area histogram SVG
    #[arg(long, value_hint = ValueHint::FilePath)]
    plot: Option<PathBuf>,

    /// Also write summary and histogram as JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,

    /// JSON file with analysis parameters; flags take precedence
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an annotation file for a folder of images
    Annotate {
        /// Folder containing .jpg/.jpeg/.png files
        #[arg(long, value_hint = ValueHint::DirPath)]
        images_dir: PathBuf,

        /// Annotation CSV to write
        #[arg(long, value_hint = ValueHint::FilePath)]
        output: PathBuf,

        /// Directory relative paths are computed against [default: current directory]
        #[arg(long, value_hint = ValueHint::DirPath)]
        base: Option<PathBuf>,

        /// Include images in subfolders
        #[arg(long)]
        recursive: bool,
    },

    /// Print the rows of an annotation file or the images of a folder
    #[command(group(ArgGroup::new("source").required(true).args(["annotation", "dir"])))]
    Iterate {
        #[arg(long, value_hint = ValueHint::FilePath)]
        annotation: Option<PathBuf>,

        #[arg(long, value_hint = ValueHint::DirPath)]
        dir: Option<PathBuf>,

        /// Include images in subfolders (with --dir)
        #[arg(long)]
        recursive: bool,

        /// Stop after this many entries
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show size and channels of one image, optionally plotting its histogram
    Inspect {
        #[arg(value_hint = ValueHint::FilePath)]
        image: PathBuf,

        /// Write a per-channel intensity histogram SVG here
        #[arg(long, value_hint = ValueHint::FilePath)]
        plot: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    // Logs go to stderr so stdout only carries the report
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run `future` on a fresh multi-threaded runtime.
/// Shutdown does not wait for blocking decodes abandoned after a timeout.
fn run_on_runtime<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Command::Annotate {
            images_dir,
            output,
            base,
            recursive,
        }) => run_annotate(&images_dir, &output, base, recursive),
        Some(Command::Iterate {
            annotation,
            dir,
            recursive,
            limit,
        }) => run_iterate(annotation.as_deref(), dir.as_deref(), recursive, limit).map(|_| ()),
        Some(Command::Inspect { image, plot }) => run_inspect(&image, plot.as_deref()),
        None => match run_on_runtime(run_analysis(cli.analyze)) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("❌ cannot start async runtime: {}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Merge `--config` and flags into one validated config
fn build_config(args: &AnalyzeArgs) -> Result<AnalysisConfig> {
    let mut cfg = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };

    if let Some(v) = args.max_height {
        cfg.max_height = v;
    }
    if let Some(v) = args.max_width {
        cfg.max_width = v;
    }
    if let Some(v) = args.bins {
        cfg.bin_count = v;
    }
    if let Some(v) = args.workers {
        cfg.workers = v;
    }
    if let Some(v) = args.decode_timeout_ms {
        cfg.decode_timeout_ms = Some(v);
    }
    if args.reprobe {
        cfg.probe_policy = ProbePolicy::Reprobe;
    }

    cfg.validate()?;
    Ok(cfg)
}

/// Default location for the histogram chart: ~/.cache/imgstat/area_histogram.svg on Linux
fn default_plot_path() -> PathBuf {
    match dirs::cache_dir().or_else(dirs::home_dir) {
        Some(mut path) => {
            path.push("imgstat");
            path.push("area_histogram.svg");
            path
        }
        None => PathBuf::from("area_histogram.svg"),
    }
}

/// The batch analysis: load → probe → summarize → filter → sort → histogram
async fn run_analysis(args: AnalyzeArgs) -> Result<()> {
    // Parameters are checked before any file is touched
    let cfg = build_config(&args)?;
    let annotation = args
        .annotation
        .clone()
        .ok_or_else(|| PipelineError::Config("--annotation is required".to_string()))?;

    debug!("effective config: {}", cfg.to_json()?);

    let manifest = annotation::load(&annotation)?;
    let mut table = DatasetTable::from_manifest(&manifest)?;
    if table.is_empty() {
        println!("⚠️  {} lists no images", annotation.display());
    }
    println!("🔍 Probing {} images from {}", table.len(), annotation.display());

    let codec = ImageCodec::new(args.full_decode);
    let report = if cfg.worker_count() > 1 || cfg.decode_timeout().is_some() {
        table
            .add_dimensions_concurrent(
                Arc::new(codec),
                cfg.probe_policy,
                cfg.worker_count(),
                cfg.decode_timeout(),
            )
            .await
    } else {
        table.add_dimensions(&codec, cfg.probe_policy)
    };
    if report.failed > 0 {
        println!("⚠️  {} of {} images could not be read", report.failed, report.probed);
    }

    let summary = stats::summarize(&table);
    println!("\n📊 Statistics for image dimensions:");
    println!("{}", summary);

    table.add_area();

    let filtered = table.filter(cfg.height_bound(), cfg.width_bound());
    println!(
        "\n✂️  Filtered data (height <= {}, width <= {}):",
        cfg.height_bound(),
        cfg.width_bound()
    );
    println!("{}", filtered);

    let sorted = table.sort_by_area();
    println!("\n📐 Data after sorting by area:");
    println!("{}", sorted);

    let hist = stats::histogram(&sorted, cfg.bins())?;

    let plot_path = args.plot.clone().unwrap_or_else(default_plot_path);
    let mut sinks: Vec<Box<dyn PlotSink>> = vec![Box::new(SvgChart::new(&plot_path))];
    if let Some(report_path) = &args.report {
        sinks.push(Box::new(JsonReport::new(report_path, Some(annotation.as_path()))));
    }
    for sink in sinks.iter_mut() {
        sink.summary(&summary)?;
        sink.area_histogram(&hist)?;
        sink.finish()?;
    }

    println!(
        "\n📈 Area histogram ({} bins, {} images) written to {}",
        hist.bins.len(),
        hist.total(),
        plot_path.display()
    );
    if let Some(report_path) = &args.report {
        println!("📝 JSON report written to {}", report_path.display());
    }

    Ok(())
}

fn run_annotate(
    images_dir: &Path,
    output: &Path,
    base: Option<PathBuf>,
    recursive: bool,
) -> Result<()> {
    // The library wants an explicit base; the CLI defaults it to the cwd
    let base = match base {
        Some(base) => base,
        None => std::env::current_dir().map_err(|e| PipelineError::io(".", e))?,
    };

    let manifest = annotation::generate(images_dir, &base, output, recursive)?;
    if manifest.is_empty() {
        println!("⚠️  No .jpg/.jpeg/.png files found in {}", images_dir.display());
    }
    println!(
        "✅ Annotation file created at {} ({} images)",
        output.display(),
        manifest.len()
    );
    Ok(())
}

/// Print manifest rows or folder images, returning how many were shown
fn run_iterate(
    annotation: Option<&Path>,
    dir: Option<&Path>,
    recursive: bool,
    limit: Option<usize>,
) -> Result<usize> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut shown = 0;

    if let Some(path) = annotation {
        let mut rows = annotation::ManifestRows::new(path)?;
        while shown < limit {
            let Some(entry) = rows.next() else { break };
            let entry = entry?;
            println!(
                "Absolute Path: {}, Relative Path: {}",
                entry.absolute_path, entry.relative_path
            );
            shown += 1;
        }
        // Release the handle when stopping at the limit
        rows.close();
    } else if let Some(dir) = dir {
        for path in annotation::scan::image_files(dir, recursive)?.into_iter().take(limit) {
            println!("Image Path: {}", path.display());
            shown += 1;
        }
    }
    Ok(shown)
}

fn run_inspect(image_path: &Path, plot: Option<&Path>) -> Result<()> {
    if !image_path.is_file() {
        return Err(PipelineError::NotFound(image_path.to_path_buf()));
    }

    let img = image::ImageReader::open(image_path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| PipelineError::io(image_path, e))?
        .decode()
        .map_err(|source| PipelineError::Unreadable {
            path: image_path.to_path_buf(),
            source,
        })?;

    println!(
        "Image size: {}x{} (width x height), channels: {}",
        img.width(),
        img.height(),
        img.color().channel_count()
    );

    if let Some(plot) = plot {
        let hist = stats::ChannelHistogram::from_image(&img);
        SvgChart::new(plot).channel_histogram(&hist)?;
        println!("📈 Channel histogram written to {}", plot.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_accepts_both_flag_spellings() {
        let cli = parse(&[
            "imgstat",
            "--annotation",
            "a.csv",
            "--max_height",
            "100",
            "--max-width",
            "50",
        ]);
        assert!(cli.command.is_none());
        assert_eq!(cli.analyze.max_height, Some(100));
        assert_eq!(cli.analyze.max_width, Some(50));
    }

    #[test]
    fn test_cli_requires_analysis_flags() {
        assert!(Cli::try_parse_from(["imgstat", "--annotation", "a.csv"]).is_err());
        // Subcommands do not need them
        let cli = parse(&["imgstat", "inspect", "cat.png"]);
        assert!(matches!(cli.command, Some(Command::Inspect { .. })));
    }

    #[test]
    fn test_negative_bound_is_config_error() {
        let cli = parse(&[
            "imgstat",
            "--annotation",
            "a.csv",
            "--max-height",
            "-1",
            "--max-width",
            "10",
        ]);
        assert!(matches!(build_config(&cli.analyze), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.json");
        let json = r#"{"max_height": 1, "max_width": 2, "bin_count": 7, "workers": 3}"#;
        std::fs::write(&path, json).unwrap();

        let cli = parse(&[
            "imgstat",
            "--annotation", "a.csv",
            "--max-height", "640",
            "--max-width", "480",
            "--config", path.to_str().unwrap(),
            "--reprobe",
        ]);
        let cfg = build_config(&cli.analyze).unwrap();

        assert_eq!(cfg.max_height, 640);
        assert_eq!(cfg.max_width, 480);
        assert_eq!(cfg.bin_count, 7);
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.probe_policy, ProbePolicy::Reprobe);
    }

    #[tokio::test]
    async fn test_analysis_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let images = dir.path().join("images");
        std::fs::create_dir(&images).unwrap();
        image::RgbImage::new(100, 100).save(images.join("a.png")).unwrap();
        image::RgbImage::new(100, 100).save(images.join("b.png")).unwrap();
        std::fs::write(images.join("c.jpg"), b"corrupt").unwrap();

        let annotation = dir.path().join("annotation.csv");
        run_annotate(&images, &annotation, Some(images.clone()), false).unwrap();

        let plot = dir.path().join("area.svg");
        let report = dir.path().join("report.json");
        let cli = parse(&[
            "imgstat",
            "--annotation", annotation.to_str().unwrap(),
            "--max-height", "100",
            "--max-width", "100",
            "--workers", "2",
            "--plot", plot.to_str().unwrap(),
            "--report", report.to_str().unwrap(),
        ]);
        run_analysis(cli.analyze).await.unwrap();

        assert!(plot.exists());
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(json["summary"]["height"]["count"], 2);
        let bins = json["area_histogram"]["bins"].as_array().unwrap();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0]["count"], 2);
        assert_eq!(bins[0]["lower"], 10000.0);
    }

    #[tokio::test]
    async fn test_analysis_missing_annotation() {
        let cli = parse(&[
            "imgstat",
            "--annotation", "/nonexistent/annotation.csv",
            "--max-height", "1",
            "--max-width", "1",
        ]);
        let result = run_analysis(cli.analyze).await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }

    #[test]
    fn test_inspect_rejects_missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            run_inspect(&dir.path().join("nope.png"), None),
            Err(PipelineError::NotFound(_))
        ));

        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"nope").unwrap();
        assert!(run_inspect(&bad, None).is_err());
    }

    #[test]
    fn test_inspect_writes_channel_plot() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("img.png");
        image::RgbImage::new(3, 2).save(&image_path).unwrap();
        let plot = dir.path().join("channels.svg");

        run_inspect(&image_path, Some(&plot)).unwrap();
        assert!(std::fs::read_to_string(&plot).unwrap().contains("Red channel"));
    }

    /// Decoder stuck far longer than any configured timeout
    struct StuckDecoder;

    impl probe::ShapeDecoder for StuckDecoder {
        fn decode_shape(
            &self,
            _path: &Path,
        ) -> std::result::Result<state::record::Shape, probe::DecodeFailure> {
            std::thread::sleep(std::time::Duration::from_secs(3));
            Err(probe::DecodeFailure::Task("stuck".to_string()))
        }
    }

    #[test]
    fn test_runtime_shutdown_skips_timed_out_decodes() {
        let start = std::time::Instant::now();
        let shapes = run_on_runtime(probe::probe_all(
            vec!["/stuck.png".to_string()],
            Arc::new(StuckDecoder),
            1,
            Some(std::time::Duration::from_millis(10)),
        ))
        .unwrap();

        assert_eq!(shapes, vec![None]);
        assert!(start.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn test_iterate_stops_at_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotation.csv");
        std::fs::write(&path, "a,b\n/1.png,1.png\n/2.png,2.png\n/3.png,3.png\n").unwrap();

        assert_eq!(run_iterate(Some(&path), None, false, Some(2)).unwrap(), 2);
        assert_eq!(run_iterate(Some(&path), None, false, None).unwrap(), 3);
    }
}
