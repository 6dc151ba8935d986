//! The export controller: rescale, settle, rasterize, restore, paginate.
//!
//! One call to [`ExportController::export`] runs the whole pipeline as a
//! single sequential task. The preview's styles and the status label are
//! held by scoped guards, so both are back to their pre-export values before
//! the call returns, whichever step fails.

use crate::dom::{NodeId, RenderTree};
use crate::paginate::{DocumentAssembler, Paginator};
use crate::pdf::LopdfAssembler;
use crate::platform::{Host, StatusIndicator};
use crate::print::{PrintMode, PrintRescaler};
use crate::profile::ResumeProfile;
use crate::rendering::raster::{CaptureOptions, Rasterizer, SoftwareRasterizer};
use crate::{Error, ExportConfig, Result, StatusLabels};
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;

pub const NOT_READY_MESSAGE: &str = "PDF libraries are loading... Please try again in a moment.";
pub const FAILURE_MESSAGE: &str = "Failed to generate PDF. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportState {
    Idle,
    Rescaling,
    Rasterizing,
    Restoring,
    Paginating,
    Done,
    Failed,
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportState::Idle => "idle",
            ExportState::Rescaling => "rescaling",
            ExportState::Rasterizing => "rasterizing",
            ExportState::Restoring => "restoring",
            ExportState::Paginating => "paginating",
            ExportState::Done => "done",
            ExportState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The external collaborators an export needs. Either may be absent while
/// the host is still loading them.
#[derive(Clone, Default)]
pub struct Capabilities {
    pub rasterizer: Option<Arc<dyn Rasterizer>>,
    pub documents: Option<Arc<dyn DocumentAssembler>>,
}

impl Capabilities {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, documents: Arc<dyn DocumentAssembler>) -> Self {
        Capabilities {
            rasterizer: Some(rasterizer),
            documents: Some(documents),
        }
    }

    /// The built-in software rasterizer and lopdf writer.
    pub fn software() -> Self {
        Self::new(Arc::new(SoftwareRasterizer::new()), Arc::new(LopdfAssembler::new()))
    }

    pub fn is_ready(&self) -> bool {
        self.rasterizer.is_some() && self.documents.is_some()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("rasterizer", &self.rasterizer.is_some())
            .field("documents", &self.documents.is_some())
            .finish()
    }
}

/// Summary of a delivered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub file_name: String,
    pub page_count: usize,
    pub byte_len: usize,
    pub raster_width: u32,
    pub raster_height: u32,
}

/// Shows the busy label for its lifetime.
struct BusyLabel {
    status: Arc<dyn StatusIndicator>,
    idle: String,
}

impl BusyLabel {
    fn show(status: Arc<dyn StatusIndicator>, labels: &StatusLabels) -> Self {
        status.set_label(&labels.busy);
        BusyLabel {
            status,
            idle: labels.idle.clone(),
        }
    }
}

impl Drop for BusyLabel {
    fn drop(&mut self) {
        self.status.set_label(&self.idle);
    }
}

pub struct ExportController {
    config: ExportConfig,
    capabilities: Capabilities,
    host: Host,
    rescaler: PrintRescaler,
    paginator: Paginator,
    state: ExportState,
    transitions: Vec<ExportState>,
}

impl ExportController {
    pub fn new(config: ExportConfig, capabilities: Capabilities, host: Host) -> Self {
        let rescaler = PrintRescaler::new(config.print.clone());
        let paginator = Paginator::new(config.page_format, config.image_compression);
        ExportController {
            config,
            capabilities,
            host,
            rescaler,
            paginator,
            state: ExportState::Idle,
            transitions: vec![ExportState::Idle],
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// State reached by the most recent export.
    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Every state the most recent export passed through, starting at `Idle`.
    pub fn transitions(&self) -> &[ExportState] {
        &self.transitions
    }

    pub fn set_capabilities(&mut self, capabilities: Capabilities) {
        self.capabilities = capabilities;
    }

    fn enter(&mut self, state: ExportState) {
        debug!("export: {} -> {}", self.state, state);
        self.state = state;
        self.transitions.push(state);
    }

    /// Export the subtree at `target` and offer it as a PDF.
    ///
    /// Returns `Ok(None)` without doing anything when there is no target.
    /// Missing capabilities alert the user and fail with [`Error::NotReady`]
    /// before anything is touched. Any later failure alerts the user after
    /// styles and the status label have been restored.
    pub async fn export(
        &mut self,
        tree: &mut RenderTree,
        target: Option<NodeId>,
        profile: &ResumeProfile,
    ) -> Result<Option<ExportReport>> {
        self.state = ExportState::Idle;
        self.transitions = vec![ExportState::Idle];

        let (rasterizer, documents) = match (&self.capabilities.rasterizer, &self.capabilities.documents) {
            (Some(rasterizer), Some(documents)) => (rasterizer.clone(), documents.clone()),
            _ => {
                self.host.notifier.alert(NOT_READY_MESSAGE);
                return Err(Error::NotReady(format!("{:?}", self.capabilities)));
            }
        };
        let root = match target {
            Some(root) if tree.contains(root) => root,
            _ => {
                debug!("export skipped: no render target");
                return Ok(None);
            }
        };

        let file_name = profile.file_name();
        match self.run(tree, root, rasterizer.as_ref(), documents.as_ref(), &file_name).await {
            Ok(report) => {
                self.enter(ExportState::Done);
                info!(
                    "exported {} ({} page(s), {} bytes)",
                    report.file_name, report.page_count, report.byte_len
                );
                Ok(Some(report))
            }
            Err(e) => {
                self.enter(ExportState::Failed);
                error!("Error generating PDF: {}", e);
                self.host.notifier.alert(FAILURE_MESSAGE);
                Err(e)
            }
        }
    }

    async fn run(
        &mut self,
        tree: &mut RenderTree,
        root: NodeId,
        rasterizer: &dyn Rasterizer,
        documents: &dyn DocumentAssembler,
        file_name: &str,
    ) -> Result<ExportReport> {
        let _busy = BusyLabel::show(self.host.status.clone(), &self.config.labels);

        self.enter(ExportState::Rescaling);
        let mut mode = PrintMode::enter(tree, root, &self.rescaler);
        tokio::time::sleep(self.config.settle_delay()).await;
        mode.tree_mut().reflow();

        self.enter(ExportState::Rasterizing);
        let options = CaptureOptions::for_target(&self.config, mode.tree(), root)?;
        let image = rasterizer.capture(mode.tree(), root, &options).await?;
        debug!("captured {}x{} px", image.width(), image.height());

        self.enter(ExportState::Restoring);
        if let Some(outcome) = mode.release().filter(|o| !o.is_restored()) {
            warn!("preview styles not restored: {:?}", outcome);
        }

        self.enter(ExportState::Paginating);
        let document = self.paginator.build(&image, documents, self.config.compress)?;
        let saved = document.finalize(file_name, self.host.downloads.as_ref())?;

        Ok(ExportReport {
            file_name: saved.file_name,
            page_count: saved.page_count,
            byte_len: saved.byte_len,
            raster_width: image.width(),
            raster_height: image.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{LabelCell, MemoryDownloads, RecordingNotifier};
    use crate::Viewport;

    fn controller(capabilities: Capabilities) -> (ExportController, Arc<LabelCell>, Arc<RecordingNotifier>) {
        let status = Arc::new(LabelCell::new("Download PDF"));
        let notifier = Arc::new(RecordingNotifier::new());
        let host = Host::new(status.clone(), notifier.clone(), Arc::new(MemoryDownloads::new()));
        let config = ExportConfig {
            scale: 1.0,
            ..Default::default()
        };
        (ExportController::new(config, capabilities, host), status, notifier)
    }

    #[test]
    fn states_display_lowercase() {
        assert_eq!(ExportState::Rasterizing.to_string(), "rasterizing");
        assert_eq!(ExportState::Failed.to_string(), "failed");
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_touches_nothing() {
        let (mut controller, status, notifier) = controller(Capabilities {
            rasterizer: Some(Arc::new(SoftwareRasterizer::new())),
            documents: None,
        });
        let mut tree = RenderTree::parse_html("<div id=p style=\"max-height: 10px\">x</div>", Viewport::default())
            .expect("parse");
        let root = tree.find_by_id("p");
        let generation = tree.style_generation();

        let err = controller.export(&mut tree, root, &ResumeProfile::default()).await.err().expect("error");
        assert!(matches!(err, Error::NotReady(_)));
        assert_eq!(notifier.messages(), vec![NOT_READY_MESSAGE]);
        assert_eq!(status.history(), vec!["Download PDF"]);
        assert_eq!(tree.style_generation(), generation);
        assert_eq!(controller.transitions(), &[ExportState::Idle]);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_target_is_silent() {
        let (mut controller, status, notifier) = controller(Capabilities::software());
        let mut tree = RenderTree::parse_html("<p>x</p>", Viewport::default()).expect("parse");
        let target = tree.find_by_id("resume-preview");
        let outcome = controller
            .export(&mut tree, target, &ResumeProfile::default())
            .await
            .expect("export");
        assert!(outcome.is_none());
        assert!(notifier.messages().is_empty());
        assert_eq!(status.history().len(), 1);
        assert_eq!(controller.state(), ExportState::Idle);
    }
}
