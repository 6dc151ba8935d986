//! Status label surface (the export button's caption).

use log::debug;
use std::sync::Mutex;

pub trait StatusIndicator: Send + Sync {
    fn set_label(&self, label: &str);
    fn label(&self) -> String;
}

/// In-memory label that keeps every value it has shown.
pub struct LabelCell {
    inner: Mutex<LabelState>,
}

struct LabelState {
    current: String,
    history: Vec<String>,
}

impl LabelCell {
    pub fn new(initial: &str) -> Self {
        LabelCell {
            inner: Mutex::new(LabelState {
                current: initial.to_string(),
                history: vec![initial.to_string()],
            }),
        }
    }

    /// Every label shown so far, starting with the initial one.
    pub fn history(&self) -> Vec<String> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).history.clone()
    }
}

impl StatusIndicator for LabelCell {
    fn set_label(&self, label: &str) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        debug!("status label: {:?} -> {:?}", state.current, label);
        state.current = label.to_string();
        state.history.push(label.to_string());
    }

    fn label(&self) -> String {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).current.clone()
    }
}
