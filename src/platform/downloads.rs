//! Delivery of finished files to the user.

use crate::{Error, Result};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait DownloadTarget: Send + Sync {
    /// Offer `bytes` to the user under `file_name`.
    fn offer(&self, file_name: &str, bytes: &[u8]) -> Result<()>;
}

/// Saves offered files into a directory.
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectoryDownloads { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a file offered as `file_name` is written to. Path separators in
    /// the name are replaced so a file never escapes the directory.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        let safe: String = file_name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        let safe = match safe.as_str() {
            "" | "." | ".." => "download".to_string(),
            _ => safe,
        };
        self.dir.join(safe)
    }
}

impl DownloadTarget for DirectoryDownloads {
    fn offer(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::DownloadError(format!("{}: {}", self.dir.display(), e)))?;
        let path = self.path_for(file_name);
        std::fs::write(&path, bytes).map_err(|e| Error::DownloadError(format!("{}: {}", path.display(), e)))?;
        info!("saved {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

/// Keeps offered files in memory.
#[derive(Debug, Default)]
pub struct MemoryDownloads {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn last(&self) -> Option<(String, Vec<u8>)> {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).last().cloned()
    }

    pub fn len(&self) -> usize {
        self.files.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DownloadTarget for MemoryDownloads {
    fn offer(&self, file_name: &str, bytes: &[u8]) -> Result<()> {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((file_name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_downloads_write_inside_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let downloads = DirectoryDownloads::new(dir.path().join("out"));
        downloads.offer("../Jane_resume.pdf", b"%PDF-").expect("offer");
        let written = dir.path().join("out").join(".._Jane_resume.pdf");
        assert_eq!(std::fs::read(written).expect("read"), b"%PDF-");
        assert_eq!(downloads.path_for(".."), dir.path().join("out").join("download"));
    }

    #[test]
    fn memory_downloads_keep_order() {
        let downloads = MemoryDownloads::new();
        assert!(downloads.is_empty());
        downloads.offer("a.pdf", b"1").expect("offer");
        downloads.offer("b.pdf", b"2").expect("offer");
        assert_eq!(downloads.len(), 2);
        assert_eq!(downloads.last(), Some(("b.pdf".to_string(), b"2".to_vec())));
    }
}
