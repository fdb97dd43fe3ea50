use anyhow::{anyhow, bail, Context};
use annocap::annotation::{AnnotationCanvas, AnnotationDocument};
use annocap::dom::{Document, NodeId};
use annocap::platform::{DeviceMetrics, NoopPlatform, PlatformApi, StaticDisplay};
use annocap::{CaptureConfig, CaptureOrchestrator, StrategyKind};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "annocap", version, about = "Capture an annotated document region into a PNG")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export the document region only
    Source(CommonArgs),
    /// Export the annotation layer only (transparent background)
    Annotation(CommonArgs),
    /// Export the region with the annotation layer flattened on top
    Merged(CommonArgs),
}

impl Command {
    fn args(&self) -> &CommonArgs {
        match self {
            Command::Source(a) | Command::Annotation(a) | Command::Merged(a) => a,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Command::Source(_) => "source",
            Command::Annotation(_) => "annotation",
            Command::Merged(_) => "merged",
        }
    }
}

#[derive(Args)]
struct CommonArgs {
    /// HTML file to capture
    #[arg(long)]
    html: Option<PathBuf>,
    /// URL to fetch and capture
    #[cfg(feature = "fetch")]
    #[arg(long)]
    url: Option<String>,
    /// Capture region: `#id` or a tag name
    #[arg(long, default_value = "body")]
    root: String,
    /// Annotation overlay element: `#id` or a tag name
    #[arg(long)]
    overlay: Option<String>,
    /// Annotation document (JSON)
    #[arg(long)]
    annotations: Option<PathBuf>,
    /// Preferred capture strategy (overrides the config file)
    #[arg(long, value_enum)]
    strategy: Option<StrategyKind>,
    /// Device pixel ratio
    #[arg(long, default_value_t = 1.0)]
    dpr: f32,
    /// Viewport width in CSS px
    #[arg(long, default_value_t = 1280)]
    width: u32,
    /// Viewport height in CSS px
    #[arg(long, default_value_t = 720)]
    height: u32,
    /// PNG served as the display-capture frame for the system-screen strategy
    #[arg(long)]
    screen_frame: Option<PathBuf>,
    /// Capture config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output PNG path
    #[arg(long, default_value = "capture.png")]
    out: PathBuf,
}

#[cfg(feature = "fetch")]
fn remote_url(args: &CommonArgs) -> Option<&str> {
    args.url.as_deref()
}

#[cfg(not(feature = "fetch"))]
fn remote_url(_args: &CommonArgs) -> Option<&str> {
    None
}

const FETCH_TIMEOUT_MS: u64 = 30_000;

#[cfg(feature = "fetch")]
fn fetch(url: &str, metrics: DeviceMetrics) -> anyhow::Result<Document> {
    annocap::loader::fetch_document(url, FETCH_TIMEOUT_MS, metrics).with_context(|| format!("fetching {}", url))
}

#[cfg(not(feature = "fetch"))]
fn fetch(url: &str, _metrics: DeviceMetrics) -> anyhow::Result<Document> {
    bail!("cannot fetch {} without the `fetch` feature", url)
}

fn load_document(args: &CommonArgs, metrics: DeviceMetrics) -> anyhow::Result<Document> {
    if let Some(path) = &args.html {
        return annocap::loader::load_file(path, metrics).context("loading HTML file");
    }
    match remote_url(args) {
        Some(url) => fetch(url, metrics),
        None => bail!("one of --html or --url is required"),
    }
}

fn resolve_target(doc: &Document, target: &str) -> anyhow::Result<NodeId> {
    let found = match target.strip_prefix('#') {
        Some(id) => doc.find_by_id(id),
        None => doc.elements_by_tag(doc.root(), target).into_iter().next(),
    };
    found.ok_or_else(|| anyhow!("no element matches {:?}", target))
}

fn platform(args: &CommonArgs, metrics: DeviceMetrics) -> anyhow::Result<Box<dyn PlatformApi>> {
    match &args.screen_frame {
        Some(path) => {
            let frame = image::open(path)
                .with_context(|| format!("reading screen frame {}", path.display()))?
                .to_rgba8();
            let display = Arc::new(StaticDisplay::new(frame));
            Ok(Box::new(annocap::platform::HostPlatform::new(metrics, display)))
        }
        None => Ok(Box::new(NoopPlatform::with_metrics(metrics))),
    }
}

fn write_png(data_url: &str, out: &Path) -> anyhow::Result<String> {
    let img = annocap::rendering::decode_data_url(data_url).context("decoding export")?;
    img.save_with_format(out, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", out.display()))?;
    Ok(annocap::rendering::digest(&img))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let command = &cli.command;
    let args = command.args();

    let mut config = match &args.config {
        Some(path) => CaptureConfig::from_json_file(path)?,
        None => CaptureConfig::default(),
    };
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }

    let metrics = DeviceMetrics::new(args.width, args.height, args.dpr);
    let mut doc = load_document(args, metrics)?;
    let root = resolve_target(&doc, &args.root)?;
    let overlay = args.overlay.as_deref().map(|o| resolve_target(&doc, o)).transpose()?;

    let annotations = match &args.annotations {
        Some(path) => AnnotationDocument::from_json_file(path)
            .with_context(|| format!("reading annotations {}", path.display()))?,
        None => AnnotationDocument::default(),
    };
    let region = annocap::CaptureRegion::measure(&doc, root)?;
    let mut canvas = AnnotationCanvas::with_document(annotations, region.content_width, region.content_height, args.dpr);

    let platform = platform(args, metrics)?;
    let mut orchestrator = CaptureOrchestrator::new(config, platform.as_ref())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("starting runtime")?;

    let (data_url, width, height) = runtime.block_on(async {
        match command {
            Command::Source(_) => orchestrator
                .export_source(&mut doc, root, overlay)
                .await
                .map(|r| (r.image_data, r.width, r.height)),
            Command::Annotation(_) => orchestrator
                .export_annotation(&doc, root, &mut canvas)
                .await
                .map(|r| (r.image_data, r.width, r.height)),
            Command::Merged(_) => orchestrator
                .export_merged(&mut doc, root, &mut canvas, overlay)
                .await
                .map(|r| (r.image_data, r.width, r.height)),
        }
    })?;

    let digest = write_png(&data_url, &args.out)?;
    let via = orchestrator
        .strategy_used()
        .map(|s| format!(" via {}", s))
        .unwrap_or_default();
    println!("{} export {}x{}{} -> {} (sha256 {})", command.name(), width, height, via, args.out.display(), digest);
    Ok(())
}
