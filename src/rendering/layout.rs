//! Block layout for the render tree.
//!
//! Every block-level element gets a `LayoutBox`; text and inline elements are
//! flattened into wrapped lines of their nearest block ancestor. Glyph
//! advance is estimated from the font size, which is enough for a faithful
//! export of typographic scale changes.
//!
//! Flattened inline elements take the block's font size, line height and
//! colour. A `font-size` set on a `<span>` or `<strong>` (including the one
//! the print rescaler writes) is kept in the tree but does not reach the
//! raster; only block-level sizes do.

use crate::dom::{NodeId, NodeKind, RenderTree};
use crate::style::{Color, ComputedStyle, Display, Edges};
use crate::Viewport;
use std::collections::HashMap;

/// Average glyph advance relative to the font size.
pub const GLYPH_ADVANCE: f64 = 0.5;

/// Size used for images without explicit dimensions.
pub const DEFAULT_IMAGE_SIZE: f64 = 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        Rect {
            x,
            y,
            width: (self.right().min(other.right()) - x).max(0.0),
            height: (self.bottom().min(other.bottom()) - y).max(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxModel {
    pub margin: Edges,
    pub padding: Edges,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub font_size: f64,
    pub line_height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxKind {
    Block,
    Image { src: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub node: NodeId,
    pub kind: BoxKind,
    /// Border box.
    pub rect: Rect,
    pub box_model: BoxModel,
    /// Height of the laid-out content, ignoring `height`/`max-height`.
    pub content_height: f64,
    /// Whether descendants are clipped to this box.
    pub clips: bool,
    pub background: Option<Color>,
    pub color: Color,
    pub lines: Vec<TextLine>,
    pub children: Vec<usize>,
}

impl LayoutBox {
    pub fn content_width(&self) -> f64 {
        (self.rect.width - self.box_model.padding.horizontal()).max(0.0)
    }

    /// Full scrollable extent of the box, including overflowing content.
    pub fn scroll_size(&self) -> (f64, f64) {
        let content = self.content_height + self.box_model.padding.vertical();
        (self.rect.width, self.rect.height.max(content))
    }
}

/// Flat arena of boxes for one reflow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutTree {
    boxes: Vec<LayoutBox>,
    index: HashMap<NodeId, usize>,
}

impl LayoutTree {
    pub fn get(&self, node: NodeId) -> Option<&LayoutBox> {
        self.index.get(&node).map(|i| &self.boxes[*i])
    }

    pub fn box_at(&self, idx: usize) -> &LayoutBox {
        &self.boxes[idx]
    }

    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.index.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

struct LayoutContext<'a> {
    tree: &'a RenderTree,
    out: LayoutTree,
}

/// Lay out the document rooted at `tree.document()` for `viewport`.
pub fn layout_tree(tree: &RenderTree, viewport: Viewport) -> LayoutTree {
    let mut ctx = LayoutContext {
        tree,
        out: LayoutTree::default(),
    };
    let root = tree.document();
    let style = tree.computed_style(root);
    if style.display != Display::None {
        ctx.layout_block(root, &style, 0.0, 0.0, viewport.width as f64);
    }
    ctx.out
}

impl LayoutContext<'_> {
    /// Lays out `node` at (`x`, `y`) and returns (box index, outer height).
    fn layout_block(&mut self, node: NodeId, style: &ComputedStyle, x: f64, y: f64, avail_width: f64) -> (usize, f64) {
        let margin = style.margin;
        let padding = style.padding;
        let width = style
            .width
            .map(|w| w + padding.horizontal())
            .unwrap_or(avail_width - margin.horizontal())
            .max(0.0);
        let rect_x = x + margin.left;
        let rect_y = y + margin.top;
        let content_x = rect_x + padding.left;
        let content_y = rect_y + padding.top;
        let content_width = (width - padding.horizontal()).max(0.0);

        let idx = self.out.boxes.len();
        self.out.index.insert(node, idx);
        self.out.boxes.push(LayoutBox {
            node,
            kind: BoxKind::Block,
            rect: Rect { x: rect_x, y: rect_y, width, height: 0.0 },
            box_model: BoxModel { margin, padding },
            content_height: 0.0,
            clips: style.overflow.clips(),
            background: style.background,
            color: style.color,
            lines: Vec::new(),
            children: Vec::new(),
        });

        let mut cursor = content_y;
        let mut run = String::new();
        let mut lines = Vec::new();
        let mut children = Vec::new();

        for &child in self.tree.children(node) {
            match self.tree.kind(child) {
                NodeKind::Text(text) => push_words(&mut run, text),
                NodeKind::Element(element) => {
                    let child_style = self.tree.computed_style(child);
                    match child_style.display {
                        Display::None => continue,
                        Display::Inline if element.tag != "img" => {
                            push_words(&mut run, &self.tree.text_content(child));
                            continue;
                        }
                        _ => {}
                    }
                    cursor += flush_run(&mut run, style, content_x, cursor, content_width, &mut lines);
                    if element.tag == "img" {
                        let src = element.attr("src").unwrap_or_default().to_string();
                        let (child_idx, outer) = self.layout_image(child, &child_style, src, content_x, cursor, content_width);
                        children.push(child_idx);
                        cursor += outer;
                    } else {
                        let (child_idx, outer) = self.layout_block(child, &child_style, content_x, cursor, content_width);
                        children.push(child_idx);
                        cursor += outer;
                    }
                }
            }
        }
        cursor += flush_run(&mut run, style, content_x, cursor, content_width, &mut lines);

        let content_height = cursor - content_y;
        let mut height = style
            .height
            .map(|h| h + padding.vertical())
            .unwrap_or(content_height + padding.vertical());
        if let Some(max) = style.max_height {
            height = height.min(max + padding.vertical());
        }

        let b = &mut self.out.boxes[idx];
        b.rect.height = height;
        b.content_height = content_height;
        b.lines = lines;
        b.children = children;
        (idx, height + margin.vertical())
    }

    fn layout_image(&mut self, node: NodeId, style: &ComputedStyle, src: String, x: f64, y: f64, avail_width: f64) -> (usize, f64) {
        let margin = style.margin;
        let width = style.width.unwrap_or(DEFAULT_IMAGE_SIZE.min(avail_width));
        let height = style.height.unwrap_or(DEFAULT_IMAGE_SIZE);
        let idx = self.out.boxes.len();
        self.out.index.insert(node, idx);
        self.out.boxes.push(LayoutBox {
            node,
            kind: BoxKind::Image { src },
            rect: Rect { x: x + margin.left, y: y + margin.top, width, height },
            box_model: BoxModel { margin, padding: style.padding },
            content_height: height,
            clips: true,
            background: style.background,
            color: style.color,
            lines: Vec::new(),
            children: Vec::new(),
        });
        (idx, height + margin.vertical())
    }
}

fn push_words(run: &mut String, text: &str) {
    for word in text.split_whitespace() {
        if !run.is_empty() {
            run.push(' ');
        }
        run.push_str(word);
    }
}

/// Wrap the pending inline run into lines; returns the height consumed.
fn flush_run(run: &mut String, style: &ComputedStyle, x: f64, y: f64, width: f64, lines: &mut Vec<TextLine>) -> f64 {
    if run.is_empty() {
        return 0.0;
    }
    let advance = (style.font_size * GLYPH_ADVANCE).max(0.01);
    let chars_per_line = ((width / advance).floor() as usize).max(1);
    let line_height = style.line_height_px();

    let mut wrapped: Vec<String> = Vec::new();
    let mut cur = String::new();
    for word in run.split_whitespace() {
        if !cur.is_empty() && cur.chars().count() + word.chars().count() + 1 > chars_per_line {
            wrapped.push(std::mem::take(&mut cur));
        }
        if !cur.is_empty() {
            cur.push(' ');
        }
        cur.push_str(word);
    }
    if !cur.is_empty() {
        wrapped.push(cur);
    }
    run.clear();

    let count = wrapped.len();
    for (i, text) in wrapped.into_iter().enumerate() {
        lines.push(TextLine {
            x,
            y: y + i as f64 * line_height,
            text,
            font_size: style.font_size,
            line_height,
        });
    }
    count as f64 * line_height
}
