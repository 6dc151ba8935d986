//! One-way rewrite of typography and spacing for print.

use crate::dom::{NodeId, RenderTree};
use crate::style::LineHeight;
use log::debug;
use serde::{Deserialize, Serialize};

/// Factors and fixed values applied while exporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintProfile {
    /// Multiplier for every element's computed font size.
    pub font_scale: f64,
    /// Multiplier for top padding and bottom margin.
    pub spacing_scale: f64,
    /// Replacement for any non-`normal` line height.
    pub line_height: String,
    /// Font size forced on the capture root.
    pub root_font_size: String,
}

impl Default for PrintProfile {
    fn default() -> Self {
        Self {
            font_scale: 0.8,
            spacing_scale: 0.7,
            line_height: "1.5".to_string(),
            root_font_size: "16px".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PrintRescaler {
    profile: PrintProfile,
}

impl PrintRescaler {
    pub fn new(profile: PrintProfile) -> Self {
        PrintRescaler { profile }
    }

    pub fn profile(&self) -> &PrintProfile {
        &self.profile
    }

    /// Rewrite inline styles under `root`. Returns the number of
    /// declarations changed.
    ///
    /// Each element reads its live computed style, so sizes inherited from an
    /// already rescaled ancestor are scaled again.
    pub fn apply(&self, tree: &mut RenderTree, root: NodeId) -> usize {
        let start = tree.style_generation();

        tree.set_inline(root, "max-height", "none");
        tree.set_inline(root, "overflow", "visible");
        tree.set_inline(root, "font-size", &self.profile.root_font_size);

        let descendants = tree.descendants(root);
        for &id in &descendants {
            let computed = tree.computed_style(id);
            if computed.font_size > 0.0 {
                tree.set_inline(id, "font-size", &px(computed.font_size * self.profile.font_scale));
            }
            if computed.line_height != LineHeight::Normal {
                tree.set_inline(id, "line-height", &self.profile.line_height);
            }
            if computed.padding.top > 0.0 {
                tree.set_inline(id, "padding", &px(computed.padding.top * self.profile.spacing_scale));
            }
            if computed.margin.bottom > 0.0 {
                tree.set_inline(id, "margin-bottom", &px(computed.margin.bottom * self.profile.spacing_scale));
            }
        }

        let changed = (tree.style_generation() - start) as usize;
        debug!("print styles applied to {} element(s), {} declaration(s) changed", descendants.len() + 1, changed);
        changed
    }
}

fn px(value: f64) -> String {
    format!("{}px", value)
}
