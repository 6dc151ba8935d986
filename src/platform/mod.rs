//! Host surfaces the export pipeline talks to: a status label, user alerts
//! and file delivery.
//!
//! Each surface is a small trait with an in-memory implementation so the
//! pipeline can be driven headless and inspected in tests.

pub mod downloads;
pub mod notify;
pub mod status;

pub use downloads::{DirectoryDownloads, DownloadTarget, MemoryDownloads};
pub use notify::{LogNotifier, Notifier, RecordingNotifier};
pub use status::{LabelCell, StatusIndicator};

use std::sync::Arc;

/// The set of host surfaces handed to an export controller.
#[derive(Clone)]
pub struct Host {
    pub status: Arc<dyn StatusIndicator>,
    pub notifier: Arc<dyn Notifier>,
    pub downloads: Arc<dyn DownloadTarget>,
}

impl Host {
    pub fn new(status: Arc<dyn StatusIndicator>, notifier: Arc<dyn Notifier>, downloads: Arc<dyn DownloadTarget>) -> Self {
        Host { status, notifier, downloads }
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").field("label", &self.status.label()).finish_non_exhaustive()
    }
}
