//! Render tree: the live, styled view-tree that an export borrows.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Elements carry an
//! [`InlineStyle`] (the equivalent of `element.style`), which is the only
//! state the print pipeline ever mutates. Layout is cached per style
//! generation so callers can tell whether a re-layout has happened since the
//! last mutation.

use crate::rendering::layout::{self, LayoutTree};
use crate::style::{self, ComputedStyle, Stylesheet};
use crate::{Error, Result, Viewport};
use scraper::{ElementRef, Html};

/// Index of a node inside a [`RenderTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl ElementData {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

/// Inline style declarations of one element, in insertion order.
///
/// Reads of an absent property yield `""` and writing `""` removes the
/// declaration, so a recorded value can always be written back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineStyle {
    decls: Vec<(String, String)>,
}

impl InlineStyle {
    /// Parse the text of a `style` attribute (`"a: b; c: d"`).
    pub fn parse(text: &str) -> Self {
        let mut style = InlineStyle::default();
        for (name, value) in style::parse_declarations(text) {
            style.set(&name, &value);
        }
        style
    }

    pub fn get(&self, property: &str) -> &str {
        self.decls
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(property))
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    /// Set a declaration. Returns true when the stored value changed.
    pub fn set(&mut self, property: &str, value: &str) -> bool {
        let value = value.trim();
        let pos = self
            .decls
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(property));
        match (pos, value.is_empty()) {
            (Some(i), true) => {
                self.decls.remove(i);
                true
            }
            (Some(i), false) => {
                if self.decls[i].1 == value {
                    return false;
                }
                self.decls[i].1 = value.to_string();
                true
            }
            (None, true) => false,
            (None, false) => {
                self.decls
                    .push((property.trim().to_ascii_lowercase(), value.to_string()));
                true
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.decls.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize back to `style` attribute text.
    pub fn to_css_text(&self) -> String {
        self.decls
            .iter()
            .map(|(k, v)| format!("{}: {};", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    inline: InlineStyle,
    detached: bool,
}

/// Arena-backed document tree with a tiny cascade and cached layout.
#[derive(Debug, Clone)]
pub struct RenderTree {
    nodes: Vec<Node>,
    document: NodeId,
    stylesheet: Stylesheet,
    viewport: Viewport,
    style_generation: u64,
    layout: Option<(u64, LayoutTree)>,
}

impl RenderTree {
    /// An empty document consisting of a bare `<html>` element.
    pub fn new_document(viewport: Viewport) -> Self {
        let html = Node {
            kind: NodeKind::Element(ElementData::new("html")),
            parent: None,
            children: Vec::new(),
            inline: InlineStyle::default(),
            detached: false,
        };
        Self {
            nodes: vec![html],
            document: NodeId(0),
            stylesheet: Stylesheet::default(),
            viewport,
            style_generation: 0,
            layout: None,
        }
    }

    /// Build a tree from an HTML document. `<style>` blocks feed the
    /// stylesheet; `style` attributes become inline styles.
    pub fn parse_html(html: &str, viewport: Viewport) -> Result<Self> {
        if html.trim().is_empty() {
            return Err(Error::ParseError("empty document".into()));
        }
        let document = Html::parse_document(html);
        let root = document.root_element();
        let mut tree = RenderTree::new_document(viewport);
        let doc_id = tree.document;
        tree.fill_element(doc_id, root);

        let mut css = String::new();
        // Depth-first traversal; children are created on discovery so their
        // order under the parent matches the source.
        let mut stack: Vec<(ElementRef, NodeId)> = vec![(root, doc_id)];
        while let Some((element, id)) = stack.pop() {
            if element.value().name().eq_ignore_ascii_case("style") {
                css.push_str(&element.text().collect::<String>());
                css.push('\n');
            }
            let mut pending = Vec::new();
            for child in element.children() {
                if let Some(child_el) = ElementRef::wrap(child) {
                    let child_id = tree.append_element(id, child_el.value().name());
                    tree.fill_element(child_id, child_el);
                    pending.push((child_el, child_id));
                } else if let Some(text) = child.value().as_text() {
                    let content: &str = text;
                    if !content.trim().is_empty() {
                        tree.append_text(id, content);
                    }
                }
            }
            // Reverse so siblings are visited (and `<style>` blocks collected) in source order.
            stack.extend(pending.into_iter().rev());
        }

        tree.add_stylesheet(&css);
        Ok(tree)
    }

    fn fill_element(&mut self, id: NodeId, element: ElementRef) {
        let attrs: Vec<(String, String)> = element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
            .collect();
        let inline = attrs
            .iter()
            .find(|(k, _)| k == "style")
            .map(|(_, v)| InlineStyle::parse(v))
            .unwrap_or_default();
        let node = &mut self.nodes[id.0];
        if let NodeKind::Element(data) = &mut node.kind {
            data.attrs = attrs;
        }
        node.inline = inline;
    }

    /// Append CSS rules to the document stylesheet.
    pub fn add_stylesheet(&mut self, css: &str) {
        self.stylesheet.extend(Stylesheet::parse(css));
        self.bump_generation();
    }

    pub fn stylesheet(&self) -> &Stylesheet {
        &self.stylesheet
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.bump_generation();
    }

    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.push_node(parent, NodeKind::Element(ElementData::new(tag)))
    }

    pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push_node(parent, NodeKind::Text(text.to_string()))
    }

    fn push_node(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
            inline: InlineStyle::default(),
            detached: false,
        });
        self.nodes[parent.0].children.push(id);
        self.bump_generation();
        id
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if name == "style" {
            self.nodes[id.0].inline = InlineStyle::parse(value);
        }
        if let NodeKind::Element(data) = &mut self.nodes[id.0].kind {
            match data.attrs.iter_mut().find(|(k, _)| *k == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => data.attrs.push((name, value.to_string())),
            }
        }
        self.bump_generation();
    }

    /// Detach `id` and everything below it from the tree.
    pub fn remove_subtree(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            self.nodes[n.0].detached = true;
            stack.extend(self.nodes[n.0].children.iter().copied());
        }
        self.bump_generation();
    }

    /// Whether `id` belongs to this tree and is still attached.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).map(|n| !n.detached).unwrap_or(false)
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Concatenated text of `id` and its descendants, in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            match &self.nodes[n.0].kind {
                NodeKind::Text(t) => out.push_str(t),
                NodeKind::Element(_) => {
                    stack.extend(self.nodes[n.0].children.iter().rev().copied());
                }
            }
        }
        out
    }

    /// Element descendants of `root` (excluding `root`) in document order.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[root.0].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            if let NodeKind::Element(_) = self.nodes[n.0].kind {
                out.push(n);
                stack.extend(self.nodes[n.0].children.iter().rev().copied());
            }
        }
        out
    }

    /// `root` followed by its element descendants.
    pub fn elements_in(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = vec![root];
        out.extend(self.descendants(root));
        out
    }

    pub fn find_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.elements_in(self.document)
            .into_iter()
            .find(|n| self.element(*n).and_then(|e| e.id()) == Some(element_id))
    }

    pub fn inline_style(&self, id: NodeId) -> &InlineStyle {
        &self.nodes[id.0].inline
    }

    /// Write one inline declaration; `""` clears it.
    pub fn set_inline(&mut self, id: NodeId, property: &str, value: &str) {
        if self.nodes[id.0].inline.set(property, value) {
            self.bump_generation();
        }
    }

    /// Resolved style of `id`, walking the ancestor chain for inheritance.
    pub fn computed_style(&self, id: NodeId) -> ComputedStyle {
        let mut chain = vec![id];
        let mut cur = self.nodes[id.0].parent;
        while let Some(p) = cur {
            chain.push(p);
            cur = self.nodes[p.0].parent;
        }
        let mut parent_style: Option<ComputedStyle> = None;
        for n in chain.into_iter().rev() {
            let computed = match self.element(n) {
                Some(element) => style::compute(
                    element,
                    &self.nodes[n.0].inline,
                    &self.stylesheet,
                    parent_style.as_ref(),
                ),
                None => parent_style.clone().unwrap_or_default(),
            };
            parent_style = Some(computed);
        }
        parent_style.unwrap_or_default()
    }

    pub fn style_generation(&self) -> u64 {
        self.style_generation
    }

    fn bump_generation(&mut self) {
        self.style_generation += 1;
    }

    /// Lay out the whole document for the current viewport.
    pub fn reflow(&mut self) {
        let laid_out = layout::layout_tree(self, self.viewport);
        self.layout = Some((self.style_generation, laid_out));
    }

    pub fn is_layout_current(&self) -> bool {
        matches!(&self.layout, Some((generation, _)) if *generation == self.style_generation)
    }

    /// The layout of the current styles; fails if styles changed since the
    /// last [`reflow`](Self::reflow).
    pub fn layout(&self) -> Result<&LayoutTree> {
        match &self.layout {
            Some((generation, laid_out)) if *generation == self.style_generation => Ok(laid_out),
            other => Err(Error::LayoutStale {
                current: self.style_generation,
                laid_out: other.as_ref().map(|(g, _)| *g),
            }),
        }
    }
}
