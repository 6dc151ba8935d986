use async_trait::async_trait;
use folioprint::export::{ExportState, FAILURE_MESSAGE};
use folioprint::paginate::{DocumentAssembler, DocumentBuilder, EncodedImage, ImagePlacement};
use folioprint::pdf::LopdfAssembler;
use folioprint::platform::{DownloadTarget, LabelCell, MemoryDownloads, RecordingNotifier, StatusIndicator};
use folioprint::{
    CaptureOptions, Capabilities, Error, ExportConfig, ExportController, Host, ImageCompression, NodeId, PageFormat,
    RasterImage, Rasterizer, RenderTree, ResumeProfile, SoftwareRasterizer, Viewport,
};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};

const PREVIEW: &str = r#"<html><head><style>
.section { padding: 12px; margin-bottom: 10px; line-height: 1.6 }
h1 { font-size: 28px }
</style></head><body>
<div id="resume-preview" style="max-height: 400px; overflow: auto; background: #fafafa">
<h1 style="color: #1f2937">Jane Q Doe</h1>
<div class="section"><h2>Experience</h2><p>Acme Corp, building print pipelines</p></div>
<div class="section" style="padding: 6px"><h2>Skills</h2><p>Rust, layout, rendering</p></div>
<div style="height: 3600px"></div>
</div></body></html>"#;

struct Fixture {
    tree: RenderTree,
    target: Option<NodeId>,
    status: Arc<LabelCell>,
    notifier: Arc<RecordingNotifier>,
    downloads: Arc<MemoryDownloads>,
}

impl Fixture {
    fn new() -> Self {
        let tree = RenderTree::parse_html(PREVIEW, Viewport { width: 800, height: 600 }).expect("parse");
        let target = tree.find_by_id("resume-preview");
        Fixture {
            tree,
            target,
            status: Arc::new(LabelCell::new("Download PDF")),
            notifier: Arc::new(RecordingNotifier::new()),
            downloads: Arc::new(MemoryDownloads::new()),
        }
    }

    fn controller(&self, rasterizer: Arc<dyn Rasterizer>) -> ExportController {
        self.controller_with(rasterizer, Arc::new(LopdfAssembler::new()), self.downloads.clone())
    }

    fn controller_with(
        &self,
        rasterizer: Arc<dyn Rasterizer>,
        documents: Arc<dyn DocumentAssembler>,
        downloads: Arc<dyn DownloadTarget>,
    ) -> ExportController {
        let host = Host::new(self.status.clone(), self.notifier.clone(), downloads);
        let config = ExportConfig {
            scale: 1.0,
            viewport: Viewport { width: 800, height: 600 },
            ..Default::default()
        };
        ExportController::new(config, Capabilities::new(rasterizer, documents), host)
    }

    fn inline_css(&self) -> Vec<String> {
        let root = self.target.expect("target");
        self.tree
            .elements_in(root)
            .into_iter()
            .map(|n| self.tree.inline_style(n).to_css_text())
            .collect()
    }
}

struct FailingRasterizer;

#[async_trait]
impl Rasterizer for FailingRasterizer {
    async fn capture(&self, _tree: &RenderTree, _root: NodeId, _options: &CaptureOptions) -> folioprint::Result<RasterImage> {
        Err(Error::RenderError("induced failure".into()))
    }
}

/// Accepts every page, then fails to produce the file.
struct UnfinishableAssembler;

struct UnfinishableBuilder {
    pages: usize,
}

impl DocumentAssembler for UnfinishableAssembler {
    fn create(&self, _format: PageFormat, _compress: bool) -> folioprint::Result<Box<dyn DocumentBuilder>> {
        Ok(Box::new(UnfinishableBuilder { pages: 0 }))
    }
}

impl DocumentBuilder for UnfinishableBuilder {
    fn add_image(&mut self, _image: &EncodedImage, _placement: ImagePlacement, _compression: ImageCompression) -> folioprint::Result<()> {
        Ok(())
    }

    fn add_page(&mut self) -> folioprint::Result<()> {
        self.pages += 1;
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages
    }

    fn finish(self: Box<Self>) -> folioprint::Result<Vec<u8>> {
        Err(Error::DocumentError("induced failure".into()))
    }
}

/// Rejects every offered file, counting the attempts.
#[derive(Default)]
struct RefusingDownloads {
    attempts: Mutex<Vec<String>>,
}

impl DownloadTarget for RefusingDownloads {
    fn offer(&self, file_name: &str, _bytes: &[u8]) -> folioprint::Result<()> {
        self.attempts.lock().unwrap().push(file_name.to_string());
        Err(Error::DownloadError("induced failure".into()))
    }
}

#[derive(Default)]
struct Observation {
    at: Option<Instant>,
    layout_current: bool,
    root_font_size: String,
    root_overflow: String,
    options: Option<CaptureOptions>,
}

/// Records what the tree looked like at capture time, then delegates.
struct ObservingRasterizer {
    inner: SoftwareRasterizer,
    seen: Mutex<Observation>,
}

#[async_trait]
impl Rasterizer for ObservingRasterizer {
    async fn capture(&self, tree: &RenderTree, root: NodeId, options: &CaptureOptions) -> folioprint::Result<RasterImage> {
        {
            let mut seen = self.seen.lock().unwrap();
            seen.at = Some(Instant::now());
            seen.layout_current = tree.is_layout_current();
            seen.root_font_size = tree.inline_style(root).get("font-size").to_string();
            seen.root_overflow = tree.inline_style(root).get("overflow").to_string();
            seen.options = Some(options.clone());
        }
        self.inner.capture(tree, root, options).await
    }
}

#[tokio::test(start_paused = true)]
async fn export_produces_paginated_pdf_and_restores_preview() {
    let mut fx = Fixture::new();
    let before = fx.inline_css();
    let mut controller = fx.controller(Arc::new(SoftwareRasterizer::new()));
    let target = fx.target;

    let report = controller
        .export(&mut fx.tree, target, &ResumeProfile::named("Jane Q Doe"))
        .await
        .expect("export")
        .expect("report");

    assert_eq!(report.file_name, "Jane_Q_Doe_resume.pdf");
    assert_eq!(report.raster_width, 800);
    let expected_pages = ((report.raster_height as f64 * 210.0 / 800.0) / 297.0).ceil() as usize;
    assert_eq!(report.page_count, expected_pages);
    assert!(report.page_count >= 3);

    let (name, bytes) = fx.downloads.last().expect("offered");
    assert_eq!(name, "Jane_Q_Doe_resume.pdf");
    assert_eq!(bytes.len(), report.byte_len);
    let pdf = lopdf::Document::load_mem(&bytes).expect("valid pdf");
    assert_eq!(pdf.get_pages().len(), report.page_count);

    assert_eq!(fx.inline_css(), before);
    assert_eq!(fx.status.history(), vec!["Download PDF", "Generating PDF...", "Download PDF"]);
    assert!(fx.notifier.messages().is_empty());
    assert_eq!(
        controller.transitions(),
        &[
            ExportState::Idle,
            ExportState::Rescaling,
            ExportState::Rasterizing,
            ExportState::Restoring,
            ExportState::Paginating,
            ExportState::Done,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn rasterizer_failure_preserves_ui() {
    let mut fx = Fixture::new();
    let before = fx.inline_css();
    let mut controller = fx.controller(Arc::new(FailingRasterizer));
    let target = fx.target;

    let err = controller
        .export(&mut fx.tree, target, &ResumeProfile::named("Jane"))
        .await
        .err()
        .expect("failure");
    assert!(matches!(err, Error::RenderError(_)));

    assert_eq!(fx.inline_css(), before);
    assert_eq!(fx.status.label(), "Download PDF");
    assert_eq!(fx.notifier.messages(), vec![FAILURE_MESSAGE]);
    assert!(fx.downloads.is_empty());
    assert_eq!(controller.state(), ExportState::Failed);
    assert!(!controller.transitions().contains(&ExportState::Paginating));
}

#[tokio::test(start_paused = true)]
async fn document_assembly_failure_preserves_ui() {
    let mut fx = Fixture::new();
    let before = fx.inline_css();
    let mut controller = fx.controller_with(
        Arc::new(SoftwareRasterizer::new()),
        Arc::new(UnfinishableAssembler),
        fx.downloads.clone(),
    );
    let target = fx.target;

    let err = controller
        .export(&mut fx.tree, target, &ResumeProfile::named("Jane"))
        .await
        .err()
        .expect("failure");
    assert!(matches!(err, Error::DocumentError(_)));

    assert_eq!(fx.inline_css(), before);
    assert_eq!(fx.status.label(), "Download PDF");
    assert_eq!(fx.notifier.messages(), vec![FAILURE_MESSAGE]);
    assert!(fx.downloads.is_empty());
    assert_eq!(controller.state(), ExportState::Failed);
    assert_eq!(
        controller.transitions(),
        &[
            ExportState::Idle,
            ExportState::Rescaling,
            ExportState::Rasterizing,
            ExportState::Restoring,
            ExportState::Paginating,
            ExportState::Failed,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn refused_download_preserves_ui() {
    let mut fx = Fixture::new();
    let before = fx.inline_css();
    let refusing = Arc::new(RefusingDownloads::default());
    let mut controller = fx.controller_with(
        Arc::new(SoftwareRasterizer::new()),
        Arc::new(LopdfAssembler::new()),
        refusing.clone(),
    );
    let target = fx.target;

    let err = controller
        .export(&mut fx.tree, target, &ResumeProfile::named("Jane"))
        .await
        .err()
        .expect("failure");
    assert!(matches!(err, Error::DownloadError(_)));

    assert_eq!(*refusing.attempts.lock().unwrap(), vec!["Jane_resume.pdf".to_string()]);
    assert_eq!(fx.inline_css(), before);
    assert_eq!(fx.status.label(), "Download PDF");
    assert_eq!(fx.status.history(), vec!["Download PDF", "Generating PDF...", "Download PDF"]);
    assert_eq!(fx.notifier.messages(), vec![FAILURE_MESSAGE]);
    assert!(fx.downloads.is_empty());
    assert_eq!(controller.state(), ExportState::Failed);
    assert!(controller.transitions().contains(&ExportState::Paginating));
}

#[tokio::test(start_paused = true)]
async fn capture_waits_for_settle_and_relayout() {
    let mut fx = Fixture::new();
    let observer = Arc::new(ObservingRasterizer {
        inner: SoftwareRasterizer::new(),
        seen: Mutex::new(Observation::default()),
    });
    let mut controller = fx.controller(observer.clone());
    let target = fx.target;

    let start = Instant::now();
    controller
        .export(&mut fx.tree, target, &ResumeProfile::default())
        .await
        .expect("export");

    let seen = observer.seen.lock().unwrap();
    let at = seen.at.expect("captured");
    assert!(at.duration_since(start) >= Duration::from_millis(200));
    assert!(seen.layout_current);
    assert_eq!(seen.root_font_size, "16px");
    assert_eq!(seen.root_overflow, "visible");

    let options = seen.options.as_ref().expect("options");
    assert_eq!(options.background, "#ffffff");
    assert!(options.allow_cross_origin);
    assert!(!options.logging);
    // Print mode lifts max-height, so the capture covers the full content.
    assert!(options.window_height.expect("height") > 3600.0);
    assert_eq!(fx.downloads.last().expect("offered").0, "resume.pdf");
}

#[tokio::test(start_paused = true)]
async fn export_is_repeatable() {
    let mut fx = Fixture::new();
    let before = fx.inline_css();
    let mut controller = fx.controller(Arc::new(SoftwareRasterizer::new()));
    let target = fx.target;

    let first = controller.export(&mut fx.tree, target, &ResumeProfile::default()).await.expect("first").expect("report");
    let second = controller.export(&mut fx.tree, target, &ResumeProfile::default()).await.expect("second").expect("report");
    assert_eq!(first.page_count, second.page_count);
    assert_eq!((first.raster_width, first.raster_height), (second.raster_width, second.raster_height));
    assert_eq!(fx.downloads.len(), 2);
    assert_eq!(controller.state(), ExportState::Done);
    assert_eq!(fx.inline_css(), before);
}

#[tokio::test(start_paused = true)]
async fn capabilities_not_ready_aborts_before_mutation() {
    let mut fx = Fixture::new();
    let before = fx.inline_css();
    let host = Host::new(fx.status.clone(), fx.notifier.clone(), fx.downloads.clone());
    let mut controller = ExportController::new(ExportConfig::default(), Capabilities::default(), host);
    let target = fx.target;

    let err = controller
        .export(&mut fx.tree, target, &ResumeProfile::default())
        .await
        .err()
        .expect("not ready");
    assert!(matches!(err, Error::NotReady(_)));
    assert_eq!(fx.inline_css(), before);
    assert_eq!(fx.status.history(), vec!["Download PDF"]);
    assert_eq!(
        fx.notifier.messages(),
        vec!["PDF libraries are loading... Please try again in a moment."]
    );
    assert!(fx.downloads.is_empty());

    controller.set_capabilities(Capabilities::software());
    let report = controller.export(&mut fx.tree, target, &ResumeProfile::default()).await.expect("export");
    assert!(report.is_some());
}

#[tokio::test(start_paused = true)]
async fn detached_target_is_a_silent_no_op() {
    let mut fx = Fixture::new();
    let target = fx.target.expect("target");
    fx.tree.remove_subtree(target);
    let mut controller = fx.controller(Arc::new(SoftwareRasterizer::new()));

    let outcome = controller
        .export(&mut fx.tree, Some(target), &ResumeProfile::default())
        .await
        .expect("no error");
    assert!(outcome.is_none());
    assert!(fx.notifier.messages().is_empty());
    assert_eq!(fx.status.history(), vec!["Download PDF"]);
    assert!(fx.downloads.is_empty());
}
