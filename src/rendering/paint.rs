//! Display list built from a settled layout

use crate::dom::NodeId;
use crate::rendering::layout::{BoxKind, LayoutTree, Rect};
use crate::style::Color;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        rect: Rect,
        color: Color,
        clip: Option<Rect>,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        font_size: f64,
        line_height: f64,
        color: Color,
        clip: Option<Rect>,
    },
    Image {
        rect: Rect,
        src: String,
        clip: Option<Rect>,
    },
}

impl PaintCommand {
    pub fn clip(&self) -> Option<Rect> {
        match self {
            PaintCommand::SolidRect { clip, .. }
            | PaintCommand::Text { clip, .. }
            | PaintCommand::Image { clip, .. } => *clip,
        }
    }
}

/// Paint commands for the subtree at `root`, in painting order.
///
/// The root's own clip is not applied: the capture region is chosen by the
/// rasterizer, so a root with `overflow: visible` paints its full content.
pub fn build_display_list(layout: &LayoutTree, root: NodeId) -> Result<Vec<PaintCommand>> {
    let root_idx = layout
        .index_of(root)
        .ok_or_else(|| Error::RenderError("capture target has no layout box".into()))?;

    let mut commands = Vec::new();
    let mut stack: Vec<(usize, Option<Rect>)> = vec![(root_idx, None)];
    while let Some((idx, clip)) = stack.pop() {
        let b = layout.box_at(idx);
        if let Some(color) = b.background {
            commands.push(PaintCommand::SolidRect { rect: b.rect, color, clip });
        }
        match &b.kind {
            BoxKind::Image { src } => {
                commands.push(PaintCommand::Image { rect: b.rect, src: src.clone(), clip });
            }
            BoxKind::Block => {
                for line in &b.lines {
                    commands.push(PaintCommand::Text {
                        x: line.x,
                        y: line.y,
                        text: line.text.clone(),
                        font_size: line.font_size,
                        line_height: line.line_height,
                        color: b.color,
                        clip,
                    });
                }
            }
        }
        let child_clip = if b.clips && idx != root_idx {
            Some(match clip {
                Some(c) => c.intersect(&b.rect),
                None => b.rect,
            })
        } else {
            clip
        };
        for child in b.children.iter().rev() {
            stack.push((*child, child_clip));
        }
    }
    Ok(commands)
}
