use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::Parser;
use folioprint::platform::{DirectoryDownloads, LabelCell, LogNotifier};
use folioprint::{
    CaptureOptions, Capabilities, ExportConfig, ExportController, Host, NodeId, RasterImage, Rasterizer, RenderTree,
    ResumeProfile, SoftwareRasterizer,
};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "folioprint", version, about = "Export a saved resume preview to a paginated PDF")]
struct Args {
    /// HTML file containing the rendered preview
    input: PathBuf,

    /// Element id of the preview container
    #[arg(long, default_value = "resume-preview")]
    target_id: String,

    /// Saved resume data (JSON); the owner's name names the output file
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Owner name, overriding the profile's
    #[arg(long)]
    name: Option<String>,

    /// Directory the PDF is written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// JSON file overriding export settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also write the captured raster as PNG
    #[arg(long)]
    raster_png: Option<PathBuf>,
}

/// Passes captures through, saving a PNG copy of each.
struct PngDump {
    inner: SoftwareRasterizer,
    path: PathBuf,
}

#[async_trait]
impl Rasterizer for PngDump {
    async fn capture(&self, tree: &RenderTree, root: NodeId, options: &CaptureOptions) -> folioprint::Result<RasterImage> {
        let image = self.inner.capture(tree, root, options).await?;
        std::fs::write(&self.path, image.to_png()?)?;
        info!("raster written to {} ({})", self.path.display(), image.digest());
        Ok(image)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ExportConfig::from_json_file(path)?,
        None => ExportConfig::default(),
    };

    let mut profile = match &args.profile {
        Some(path) => ResumeProfile::from_json_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => ResumeProfile::default(),
    };
    if let Some(name) = args.name {
        profile.personal.name = name;
    }

    let html = std::fs::read_to_string(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let mut tree = RenderTree::parse_html(&html, config.viewport)?;
    let target = tree.find_by_id(&args.target_id);
    if target.is_none() {
        bail!("no element with id {:?} in {}", args.target_id, args.input.display());
    }

    let input = std::fs::canonicalize(&args.input)?;
    let base = Url::from_file_path(&input).ok();
    let software = match base {
        Some(base) => SoftwareRasterizer::with_base_url(base),
        None => SoftwareRasterizer::new(),
    };
    let rasterizer: Arc<dyn Rasterizer> = match args.raster_png {
        Some(path) => Arc::new(PngDump { inner: software, path }),
        None => Arc::new(software),
    };
    let capabilities = Capabilities::new(rasterizer, Arc::new(folioprint::pdf::LopdfAssembler::new()));

    let host = Host::new(
        Arc::new(LabelCell::new(&config.labels.idle)),
        Arc::new(LogNotifier::new()),
        Arc::new(DirectoryDownloads::new(&args.out_dir)),
    );
    let mut controller = ExportController::new(config, capabilities, host);
    if let Some(report) = controller.export(&mut tree, target, &profile).await? {
        println!(
            "{} ({} page(s), {} bytes, raster {}x{})",
            args.out_dir.join(&report.file_name).display(),
            report.page_count,
            report.byte_len,
            report.raster_width,
            report.raster_height
        );
    }
    Ok(())
}
