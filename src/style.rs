//! Minimal cascade for the render tree.
//!
//! Supports the properties the preview and the print pipeline care about:
//! typography (`font-size`, `line-height`, `color`), box spacing (`padding`,
//! `margin` and their longhands), sizing (`width`, `height`, `max-height`),
//! `overflow`, `display` and backgrounds. Selectors are limited to `*`, type,
//! `.class`, `#id` and compounds of those.

use crate::dom::{ElementData, InlineStyle};
use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};

/// Font size of the root element when nothing else is declared.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// Line height used when `line-height: normal`.
pub const NORMAL_LINE_HEIGHT: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0, 255]);
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const TRANSPARENT: Color = Color([0, 0, 0, 0]);

    pub fn is_opaque(&self) -> bool {
        self.0[3] == 255
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineHeight {
    Normal,
    /// Unitless multiplier of the element's font size.
    Number(f64),
    Px(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Display {
    Block,
    Inline,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    Visible,
    Hidden,
    Auto,
    Scroll,
}

impl Overflow {
    pub fn clips(&self) -> bool {
        !matches!(self, Overflow::Visible)
    }
}

/// Resolved values for one element. Lengths are CSS px.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    pub display: Display,
    pub font_size: f64,
    pub line_height: LineHeight,
    pub padding: Edges,
    pub margin: Edges,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub max_height: Option<f64>,
    pub overflow: Overflow,
    pub color: Color,
    pub background: Option<Color>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: Display::Block,
            font_size: DEFAULT_FONT_SIZE,
            line_height: LineHeight::Normal,
            padding: Edges::default(),
            margin: Edges::default(),
            width: None,
            height: None,
            max_height: None,
            overflow: Overflow::Visible,
            color: Color::BLACK,
            background: None,
        }
    }
}

impl ComputedStyle {
    pub fn line_height_px(&self) -> f64 {
        match self.line_height {
            LineHeight::Normal => self.font_size * NORMAL_LINE_HEIGHT,
            LineHeight::Number(n) => self.font_size * n,
            LineHeight::Px(px) => px,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl CompoundSelector {
    fn specificity(&self) -> (u32, u32, u32) {
        (
            self.id.is_some() as u32,
            self.classes.len() as u32,
            self.tag.is_some() as u32,
        )
    }

    fn matches(&self, element: &ElementData) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes
            .iter()
            .all(|c| element.classes().any(|ec| ec == c))
    }
}

/// One comma-separated part of a rule prelude, built token by token.
#[derive(Debug, Default)]
struct SelectorBuilder {
    selector: CompoundSelector,
    started: bool,
    ended: bool,
    class_pending: bool,
    unsupported: bool,
}

impl SelectorBuilder {
    fn push(&mut self, token: &Token<'_>) {
        if self.unsupported {
            return;
        }
        if let Token::WhiteSpace(_) = token {
            // Whitespace ends the compound; anything after it is a combinator.
            self.ended |= self.started;
            self.unsupported |= self.class_pending;
            return;
        }
        if self.ended {
            self.unsupported = true;
            return;
        }
        match token {
            Token::Ident(name) if self.class_pending => {
                self.selector.classes.push(name.to_string());
                self.class_pending = false;
            }
            Token::Ident(name) if !self.started => self.selector.tag = Some(name.to_ascii_lowercase()),
            Token::Delim('*') if !self.started => {}
            Token::Delim('.') if !self.class_pending => self.class_pending = true,
            Token::IDHash(id) if !self.class_pending => self.selector.id = Some(id.to_string()),
            _ => self.unsupported = true,
        }
        self.started = true;
    }

    fn finish(self) -> Option<CompoundSelector> {
        (self.started && !self.unsupported && !self.class_pending).then_some(self.selector)
    }
}

/// Selector list in front of a `{}` block.
#[derive(Debug, Default)]
struct Prelude {
    at_rule: bool,
    parts: Vec<SelectorBuilder>,
    current: SelectorBuilder,
}

impl Prelude {
    fn push(&mut self, token: &Token<'_>) {
        match token {
            _ if self.at_rule => {}
            Token::AtKeyword(_) => self.at_rule = true,
            Token::Comma => self.parts.push(std::mem::take(&mut self.current)),
            other => self.current.push(other),
        }
    }

    fn finish(mut self) -> Vec<CompoundSelector> {
        if self.at_rule {
            return Vec::new();
        }
        self.parts.push(self.current);
        self.parts.into_iter().filter_map(SelectorBuilder::finish).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    selector: CompoundSelector,
    specificity: (u32, u32, u32),
    order: usize,
    decls: Vec<(String, String)>,
}

/// Author rules collected from `<style>` blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    rules: Vec<Rule>,
}

impl Stylesheet {
    /// Parse CSS text. Unsupported selectors and at-rules are skipped.
    pub fn parse(css: &str) -> Self {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut rules = Vec::new();
        let mut prelude = Prelude::default();
        loop {
            let token = match parser.next_including_whitespace() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };
            match token {
                Token::CurlyBracketBlock => {
                    let decls = parser
                        .parse_nested_block(|p| Ok::<_, ParseError<'_, ()>>(declaration_list(p)))
                        .unwrap_or_default();
                    for selector in std::mem::take(&mut prelude).finish() {
                        rules.push(Rule {
                            specificity: selector.specificity(),
                            selector,
                            order: rules.len(),
                            decls: decls.clone(),
                        });
                    }
                }
                Token::Semicolon if prelude.at_rule => prelude = Prelude::default(),
                other => prelude.push(&other),
            }
        }
        Self { rules }
    }

    /// Append rules from `other`; they win ties against existing rules.
    pub fn extend(&mut self, other: Stylesheet) {
        let base = self.rules.len();
        self.rules.extend(other.rules.into_iter().map(|mut r| {
            r.order += base;
            r
        }));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Winning author declaration among `names` (longhand first) for `element`.
    fn declared(&self, element: &ElementData, names: &[&str]) -> Option<(usize, String)> {
        let mut best: Option<((u32, u32, u32), usize, usize, String)> = None;
        for rule in self.rules.iter().filter(|r| r.selector.matches(element)) {
            for (rank, name) in names.iter().enumerate() {
                if let Some((_, v)) = rule.decls.iter().rev().find(|(k, _)| k == name) {
                    // Higher specificity, then later order, then longhand over shorthand.
                    let key = (rule.specificity, rule.order, usize::MAX - rank);
                    let better = match &best {
                        None => true,
                        Some((s, o, r, _)) => key > (*s, *o, *r),
                    };
                    if better {
                        best = Some((rule.specificity, rule.order, usize::MAX - rank, v.clone()));
                    }
                }
            }
        }
        best.map(|(_, _, r, v)| (usize::MAX - r, v))
    }
}

/// Parse `a: b; c: d` into lowercase names and trimmed values.
///
/// Values keep their source text, so `;` and `:` inside strings, `url()` and
/// other functions stay part of the value. `!important` is dropped.
pub fn parse_declarations(text: &str) -> Vec<(String, String)> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    declaration_list(&mut parser)
}

fn declaration_list(parser: &mut Parser<'_, '_>) -> Vec<(String, String)> {
    let mut decls = Vec::new();
    while !parser.is_exhausted() {
        if let Ok(decl) = parser.parse_until_after(Delimiter::Semicolon, |p| declaration(p)) {
            decls.push(decl);
        }
    }
    decls
}

fn declaration<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<(String, String), ParseError<'i, ()>> {
    let name = parser.expect_ident()?.to_ascii_lowercase();
    parser.expect_colon()?;
    let start = parser.position();
    let mut end = start;
    loop {
        let (bang, nested) = match parser.next() {
            Ok(token) => (
                matches!(token, Token::Delim('!')),
                matches!(
                    token,
                    Token::Function(_) | Token::ParenthesisBlock | Token::SquareBracketBlock | Token::CurlyBracketBlock
                ),
            ),
            Err(_) => break,
        };
        if bang && parser.try_parse(|p| p.expect_ident_matching("important")).is_ok() {
            break;
        }
        if nested {
            let _ = parser.parse_nested_block(|p| {
                while p.next().is_ok() {}
                Ok::<_, ParseError<'_, ()>>(())
            });
        }
        end = parser.position();
    }
    let value = parser.slice(start..end).trim();
    if value.is_empty() {
        return Err(parser.new_custom_error(()));
    }
    Ok((name, value.to_string()))
}

/// Which declaration of a longhand/shorthand family won.
enum Declared {
    Longhand(String),
    Shorthand(String),
}

fn lookup(element: &ElementData, inline: &InlineStyle, sheet: &Stylesheet, longhand: &str, shorthand: Option<&str>) -> Option<Declared> {
    let long = inline.get(longhand);
    if !long.is_empty() {
        return Some(Declared::Longhand(long.to_string()));
    }
    if let Some(short) = shorthand {
        let value = inline.get(short);
        if !value.is_empty() {
            return Some(Declared::Shorthand(value.to_string()));
        }
    }
    let names: Vec<&str> = std::iter::once(longhand).chain(shorthand).collect();
    sheet.declared(element, &names).map(|(rank, v)| {
        if rank == 0 {
            Declared::Longhand(v)
        } else {
            Declared::Shorthand(v)
        }
    })
}

fn lookup_value(element: &ElementData, inline: &InlineStyle, sheet: &Stylesheet, property: &str) -> Option<String> {
    match lookup(element, inline, sheet, property, None) {
        Some(Declared::Longhand(v)) | Some(Declared::Shorthand(v)) => Some(v),
        None => None,
    }
}

/// Parse a CSS length to px. `em` is relative to `em_base`; `%` needs a base.
pub fn parse_length(value: &str, em_base: f64, percent_base: Option<f64>) -> Option<f64> {
    let v = value.trim().to_ascii_lowercase();
    let split = v
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(v.len());
    let (num, unit) = v.split_at(split);
    let n: f64 = num.parse().ok()?;
    match unit.trim() {
        "px" => Some(n),
        "" if n == 0.0 => Some(0.0),
        "em" => Some(n * em_base),
        "rem" => Some(n * DEFAULT_FONT_SIZE),
        "pt" => Some(n * 4.0 / 3.0),
        "%" => percent_base.map(|b| n * b / 100.0),
        _ => None,
    }
}

fn parse_font_size(value: &str, parent: f64) -> Option<f64> {
    let size = match value.trim().to_ascii_lowercase().as_str() {
        "inherit" => parent,
        "xx-small" => 9.0,
        "x-small" => 10.0,
        "small" => 13.0,
        "medium" => 16.0,
        "large" => 18.0,
        "x-large" => 24.0,
        "xx-large" => 32.0,
        "smaller" => parent / 1.2,
        "larger" => parent * 1.2,
        other => parse_length(other, parent, Some(parent))?,
    };
    (size >= 0.0).then_some(size)
}

fn parse_line_height(value: &str, font_size: f64, parent: LineHeight) -> Option<LineHeight> {
    let v = value.trim().to_ascii_lowercase();
    match v.as_str() {
        "normal" => return Some(LineHeight::Normal),
        "inherit" => return Some(parent),
        _ => {}
    }
    if let Ok(n) = v.parse::<f64>() {
        return Some(LineHeight::Number(n));
    }
    parse_length(&v, font_size, Some(font_size)).map(LineHeight::Px)
}

/// Expand a 1-4 value box shorthand into edges.
fn parse_edges(value: &str, em_base: f64, allow_negative: bool) -> Option<Edges> {
    let parts: Vec<f64> = value
        .split_whitespace()
        .map(|p| {
            if p.eq_ignore_ascii_case("auto") {
                Some(0.0)
            } else {
                parse_length(p, em_base, None).map(|v| if allow_negative { v } else { v.max(0.0) })
            }
        })
        .collect::<Option<Vec<_>>>()?;
    let (t, r, b, l) = match parts.as_slice() {
        [a] => (*a, *a, *a, *a),
        [a, b] => (*a, *b, *a, *b),
        [a, b, c] => (*a, *b, *c, *b),
        [a, b, c, d] => (*a, *b, *c, *d),
        _ => return None,
    };
    Some(Edges {
        top: t,
        right: r,
        bottom: b,
        left: l,
    })
}

fn resolve_edges(element: &ElementData, inline: &InlineStyle, sheet: &Stylesheet, family: &str, em_base: f64) -> Edges {
    let allow_negative = family == "margin";
    let resolve_side = |side: &str| -> f64 {
        let longhand = format!("{}-{}", family, side);
        match lookup(element, inline, sheet, &longhand, Some(family)) {
            Some(Declared::Longhand(v)) => parse_length(&v, em_base, None)
                .map(|x| if allow_negative { x } else { x.max(0.0) })
                .unwrap_or(0.0),
            Some(Declared::Shorthand(v)) => parse_edges(&v, em_base, allow_negative)
                .map(|e| match side {
                    "top" => e.top,
                    "right" => e.right,
                    "bottom" => e.bottom,
                    _ => e.left,
                })
                .unwrap_or(0.0),
            None => 0.0,
        }
    };
    Edges {
        top: resolve_side("top"),
        right: resolve_side("right"),
        bottom: resolve_side("bottom"),
        left: resolve_side("left"),
    }
}

fn default_display(tag: &str) -> Display {
    match tag {
        "head" | "style" | "script" | "title" | "meta" | "link" | "template" | "noscript" => {
            Display::None
        }
        "span" | "a" | "strong" | "em" | "b" | "i" | "u" | "small" | "code" | "label" | "sup"
        | "sub" | "abbr" | "mark" => Display::Inline,
        _ => Display::Block,
    }
}

/// Resolve the style of one element given its parent's computed style.
pub fn compute(element: &ElementData, inline: &InlineStyle, sheet: &Stylesheet, parent: Option<&ComputedStyle>) -> ComputedStyle {
    let inherited = parent.cloned().unwrap_or_default();
    let value = |prop: &str| lookup_value(element, inline, sheet, prop);

    let display = match value("display").as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("none") => Display::None,
        Some("inline") => Display::Inline,
        Some(_) => Display::Block,
        None => default_display(&element.tag),
    };

    let font_size = value("font-size")
        .and_then(|v| parse_font_size(&v, inherited.font_size))
        .unwrap_or(inherited.font_size);

    let line_height = value("line-height")
        .and_then(|v| parse_line_height(&v, font_size, inherited.line_height))
        .unwrap_or(match inherited.line_height {
            // Lengths inherit as computed px, numbers as multipliers.
            LineHeight::Px(px) => LineHeight::Px(px),
            other => other,
        });

    let padding = resolve_edges(element, inline, sheet, "padding", font_size);
    let margin = resolve_edges(element, inline, sheet, "margin", font_size);

    let dimension = |prop: &str| -> Option<f64> {
        value(prop).and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "none" | "auto" => None,
            other => parse_length(other, font_size, None),
        })
    };
    let width = dimension("width").or_else(|| {
        (element.tag == "img")
            .then(|| element.attr("width").and_then(|w| parse_length(&format!("{}px", w.trim()), font_size, None)))
            .flatten()
    });
    let height = dimension("height").or_else(|| {
        (element.tag == "img")
            .then(|| element.attr("height").and_then(|h| parse_length(&format!("{}px", h.trim()), font_size, None)))
            .flatten()
    });
    let max_height = dimension("max-height");

    let overflow = match value("overflow").as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("hidden") | Some("clip") => Overflow::Hidden,
        Some("auto") => Overflow::Auto,
        Some("scroll") => Overflow::Scroll,
        _ => Overflow::Visible,
    };

    let color = value("color")
        .and_then(|v| {
            if v.eq_ignore_ascii_case("inherit") {
                Some(inherited.color)
            } else {
                parse_color(&v)
            }
        })
        .unwrap_or(inherited.color);

    let background = value("background-color")
        .and_then(|v| parse_color(&v))
        .or_else(|| {
            value("background").and_then(|v| background_color(&v))
        })
        .filter(|c| c.0[3] > 0);

    ComputedStyle {
        display,
        font_size,
        line_height,
        padding,
        margin,
        width,
        height,
        max_height,
        overflow,
        color,
        background,
    }
}

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`/`rgba()` and a few names.
pub fn parse_color(value: &str) -> Option<Color> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    let color = color_component(&mut parser).ok()?;
    parser.is_exhausted().then_some(color)
}

/// First colour among the components of a `background` shorthand.
fn background_color(value: &str) -> Option<Color> {
    let mut input = ParserInput::new(value);
    let mut parser = Parser::new(&mut input);
    while !parser.is_exhausted() {
        if let Ok(color) = parser.try_parse(color_component) {
            return Some(color);
        }
        if parser.next().is_err() {
            break;
        }
    }
    None
}

fn color_component<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<Color, ParseError<'i, ()>> {
    let token = parser.next()?.clone();
    let color = match token {
        Token::Hash(hex) | Token::IDHash(hex) => hex_color(&hex),
        Token::Ident(name) => named_color(&name),
        Token::Function(name) if name.eq_ignore_ascii_case("rgb") || name.eq_ignore_ascii_case("rgba") => {
            Some(parser.parse_nested_block(rgb_arguments)?)
        }
        _ => None,
    };
    match color {
        Some(color) => Ok(color),
        None => Err(parser.new_custom_error(())),
    }
}

/// Channels of `rgb(r, g, b[, a])` or `rgb(r g b[ / a])`.
fn rgb_arguments<'i, 't>(parser: &mut Parser<'i, 't>) -> Result<Color, ParseError<'i, ()>> {
    let mut rgba = [0, 0, 0, 255];
    for i in 0..4 {
        if i > 0 && parser.try_parse(|p| p.expect_comma()).is_err() {
            if i == 3 && !parser.is_exhausted() {
                parser.expect_delim('/')?;
            }
        }
        if i == 3 && parser.is_exhausted() {
            break;
        }
        // Channels are 0-255 numbers, alpha a 0-1 number; both accept percentages.
        let fraction = match *parser.next()? {
            Token::Number { value, .. } if i < 3 => Some(value / 255.0),
            Token::Number { value, .. } => Some(value),
            Token::Percentage { unit_value, .. } => Some(unit_value),
            _ => None,
        };
        match fraction {
            Some(f) => rgba[i] = (f.clamp(0.0, 1.0) * 255.0).round() as u8,
            None => return Err(parser.new_custom_error(())),
        }
    }
    if !parser.is_exhausted() {
        return Err(parser.new_custom_error(()));
    }
    Ok(Color(rgba))
}

fn hex_color(hex: &str) -> Option<Color> {
    let digit = |i: usize, len: usize| u8::from_str_radix(hex.get(i..i + len)?, 16).ok();
    match hex.len() {
        3 => Some(Color([digit(0, 1)? * 17, digit(1, 1)? * 17, digit(2, 1)? * 17, 255])),
        4 => Some(Color([digit(0, 1)? * 17, digit(1, 1)? * 17, digit(2, 1)? * 17, digit(3, 1)? * 17])),
        6 => Some(Color([digit(0, 2)?, digit(2, 2)?, digit(4, 2)?, 255])),
        8 => Some(Color([digit(0, 2)?, digit(2, 2)?, digit(4, 2)?, digit(6, 2)?])),
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Color> {
    let named = match name.to_ascii_lowercase().as_str() {
        "black" => [0, 0, 0, 255],
        "white" => [255, 255, 255, 255],
        "red" => [255, 0, 0, 255],
        "green" => [0, 128, 0, 255],
        "blue" => [0, 0, 255, 255],
        "gray" | "grey" => [128, 128, 128, 255],
        "silver" => [192, 192, 192, 255],
        "navy" => [0, 0, 128, 255],
        "transparent" => [0, 0, 0, 0],
        _ => return None,
    };
    Some(Color(named))
}
