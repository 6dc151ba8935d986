//! Positional capture and restore of the inline styles print mode touches.
//!
//! Records carry no node identity. Restore walks the same traversal used by
//! capture and writes each value back by position, so the snapshot also keeps
//! a digest of the traversal's shape and refuses to restore onto a subtree
//! that no longer matches.

use crate::dom::{NodeId, RenderTree};
use log::{debug, warn};
use sha2::{Digest, Sha256};

/// Inline values of the root-only properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootStyleRecord {
    pub max_height: String,
    pub overflow: String,
    pub font_size: String,
}

/// Inline values of one descendant, `""` where the property was not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStyleRecord {
    pub font_size: String,
    pub line_height: String,
    pub padding: String,
    pub margin_bottom: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Root plus `nodes` descendants were written back.
    Restored { nodes: usize },
    /// The subtree changed shape since capture; nothing was written.
    StructureChanged { expected: usize, found: usize },
}

impl RestoreOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, RestoreOutcome::Restored { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSnapshot {
    root: RootStyleRecord,
    nodes: Vec<NodeStyleRecord>,
    structure: String,
}

impl StyleSnapshot {
    /// Record the current inline values under `root`. Read-only.
    pub fn capture(tree: &RenderTree, root: NodeId) -> Self {
        let inline = tree.inline_style(root);
        let root_record = RootStyleRecord {
            max_height: inline.get("max-height").to_string(),
            overflow: inline.get("overflow").to_string(),
            font_size: inline.get("font-size").to_string(),
        };
        let order = tree.descendants(root);
        let nodes = order
            .iter()
            .map(|&id| {
                let inline = tree.inline_style(id);
                NodeStyleRecord {
                    font_size: inline.get("font-size").to_string(),
                    line_height: inline.get("line-height").to_string(),
                    padding: inline.get("padding").to_string(),
                    margin_bottom: inline.get("margin-bottom").to_string(),
                }
            })
            .collect();
        let structure = structure_digest(tree, root, &order);
        debug!("captured styles for {} descendant(s)", order.len());
        StyleSnapshot { root: root_record, nodes, structure }
    }

    pub fn root(&self) -> &RootStyleRecord {
        &self.root
    }

    pub fn nodes(&self) -> &[NodeStyleRecord] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Hex SHA-256 over the tag names of the captured traversal.
    pub fn structure(&self) -> &str {
        &self.structure
    }

    /// Write every recorded value back verbatim, clearing properties that
    /// were absent at capture time.
    pub fn restore(&self, tree: &mut RenderTree, root: NodeId) -> RestoreOutcome {
        let order = if tree.contains(root) { tree.descendants(root) } else { Vec::new() };
        if !tree.contains(root)
            || order.len() != self.nodes.len()
            || structure_digest(tree, root, &order) != self.structure
        {
            warn!(
                "subtree changed since styles were captured ({} -> {} nodes); leaving styles untouched",
                self.nodes.len(),
                order.len()
            );
            return RestoreOutcome::StructureChanged {
                expected: self.nodes.len(),
                found: order.len(),
            };
        }

        tree.set_inline(root, "max-height", &self.root.max_height);
        tree.set_inline(root, "overflow", &self.root.overflow);
        tree.set_inline(root, "font-size", &self.root.font_size);
        for (id, record) in order.into_iter().zip(&self.nodes) {
            tree.set_inline(id, "font-size", &record.font_size);
            tree.set_inline(id, "line-height", &record.line_height);
            tree.set_inline(id, "padding", &record.padding);
            tree.set_inline(id, "margin-bottom", &record.margin_bottom);
        }
        RestoreOutcome::Restored { nodes: self.nodes.len() }
    }
}

fn structure_digest(tree: &RenderTree, root: NodeId, order: &[NodeId]) -> String {
    let mut hasher = Sha256::new();
    for id in std::iter::once(&root).chain(order) {
        hasher.update(tree.tag(*id).unwrap_or("#text").as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
