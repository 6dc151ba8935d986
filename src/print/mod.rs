//! Print mode: a temporary, reversible restyle of the preview subtree.
//!
//! [`PrintMode::enter`] captures a [`StyleSnapshot`] and then applies the
//! [`PrintRescaler`]. The captured styles are written back when the guard is
//! released or dropped, on every exit path of the code holding it.

pub mod rescale;
pub mod snapshot;

pub use rescale::{PrintProfile, PrintRescaler};
pub use snapshot::{NodeStyleRecord, RestoreOutcome, RootStyleRecord, StyleSnapshot};

use crate::dom::{NodeId, RenderTree};
use log::debug;

pub struct PrintMode<'t> {
    tree: &'t mut RenderTree,
    root: NodeId,
    snapshot: Option<StyleSnapshot>,
    relayout_on_restore: bool,
}

impl<'t> PrintMode<'t> {
    pub fn enter(tree: &'t mut RenderTree, root: NodeId, rescaler: &PrintRescaler) -> Self {
        let relayout_on_restore = tree.is_layout_current();
        let snapshot = StyleSnapshot::capture(tree, root);
        rescaler.apply(tree, root);
        debug!("entered print mode");
        PrintMode {
            tree,
            root,
            snapshot: Some(snapshot),
            relayout_on_restore,
        }
    }

    pub fn tree(&self) -> &RenderTree {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut RenderTree {
        self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn snapshot(&self) -> Option<&StyleSnapshot> {
        self.snapshot.as_ref()
    }

    /// Restore the captured styles now and report how it went. `None` if
    /// they were already restored.
    pub fn release(mut self) -> Option<RestoreOutcome> {
        self.restore()
    }

    fn restore(&mut self) -> Option<RestoreOutcome> {
        let snapshot = self.snapshot.take()?;
        let outcome = snapshot.restore(self.tree, self.root);
        // A tree that was laid out before print mode is left laid out.
        if outcome.is_restored() && self.relayout_on_restore {
            self.tree.reflow();
        }
        debug!("left print mode: {:?}", outcome);
        Some(outcome)
    }
}

impl Drop for PrintMode<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}
