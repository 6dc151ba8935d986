//! Rasterization of a settled render subtree into an opaque bitmap

use crate::dom::{NodeId, RenderTree};
use crate::paginate::{EncodedImage, ImageFormat};
use crate::rendering::images;
use crate::rendering::layout::{Rect, GLYPH_ADVANCE};
use crate::rendering::paint::{self, PaintCommand};
use crate::style::{parse_color, Color};
use crate::{Error, ExportConfig, Result};
use async_trait::async_trait;
use image::{imageops, Rgba, RgbaImage};
use log::debug;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Cursor;
use url::Url;

/// Upper bound on captured pixels (about 16k x 12k).
pub const MAX_PIXELS: u64 = 200_000_000;

/// How a capture should be taken.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    /// Device pixels per CSS px.
    pub scale: f64,
    /// Flat, opaque fill behind the content.
    pub background: String,
    /// Fetch images from other origins instead of skipping them.
    pub allow_cross_origin: bool,
    /// Emit the rasterizer's own debug logging.
    pub logging: bool,
    /// Capture width in CSS px; defaults to the target's box width.
    pub window_width: Option<f64>,
    /// Capture height in CSS px; defaults to the target's box height.
    pub window_height: Option<f64>,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scale: 2.5,
            background: "#ffffff".to_string(),
            allow_cross_origin: true,
            logging: false,
            window_width: None,
            window_height: None,
        }
    }
}

impl CaptureOptions {
    /// Options for a print capture of `root`, sized to its full scroll extent.
    pub fn for_target(config: &ExportConfig, tree: &RenderTree, root: NodeId) -> Result<Self> {
        let layout = tree.layout()?;
        let target = layout
            .get(root)
            .ok_or_else(|| Error::RenderError("capture target has no layout box".into()))?;
        let (scroll_width, scroll_height) = target.scroll_size();
        Ok(Self {
            scale: config.scale,
            background: config.background.clone(),
            allow_cross_origin: config.allow_cross_origin,
            logging: config.rasterizer_logging,
            window_width: Some(scroll_width),
            window_height: Some(scroll_height),
        })
    }
}

/// An immutable captured bitmap.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
    pixels: RgbaImage,
}

impl RasterImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.pixels.write_to(&mut buf, image::ImageFormat::Png)?;
        Ok(buf.into_inner())
    }

    pub fn encoded(&self) -> Result<EncodedImage> {
        Ok(EncodedImage {
            format: ImageFormat::Png,
            bytes: self.to_png()?,
            width: self.width(),
            height: self.height(),
        })
    }

    /// Hex SHA-256 over the dimensions and raw pixels.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width().to_be_bytes());
        hasher.update(self.height().to_be_bytes());
        hasher.update(self.pixels.as_raw());
        hex::encode(hasher.finalize())
    }
}

/// Renders a subtree of a settled render tree to a bitmap.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn capture(&self, tree: &RenderTree, root: NodeId, options: &CaptureOptions) -> Result<RasterImage>;
}

/// Pure-Rust rasterizer painting the tree's display list.
#[derive(Debug, Clone, Default)]
pub struct SoftwareRasterizer {
    base_url: Option<Url>,
}

impl SoftwareRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative image sources against `base_url`.
    pub fn with_base_url(base_url: Url) -> Self {
        Self { base_url: Some(base_url) }
    }
}

#[async_trait]
impl Rasterizer for SoftwareRasterizer {
    async fn capture(&self, tree: &RenderTree, root: NodeId, options: &CaptureOptions) -> Result<RasterImage> {
        if !(options.scale > 0.0) {
            return Err(Error::RenderError(format!("invalid capture scale {}", options.scale)));
        }
        let background = parse_color(&options.background)
            .ok_or_else(|| Error::RenderError(format!("invalid background color '{}'", options.background)))?;
        // Flatten onto white so the output never carries transparency.
        let background = over(background, Color::WHITE);

        let layout = tree.layout()?;
        let target = layout
            .get(root)
            .ok_or_else(|| Error::RenderError("capture target has no layout box".into()))?;
        let region = Rect {
            x: target.rect.x,
            y: target.rect.y,
            width: options.window_width.unwrap_or(target.rect.width),
            height: options.window_height.unwrap_or(target.rect.height),
        };
        let commands = paint::build_display_list(layout, root)?;

        let device_width = (region.width * options.scale).ceil();
        let device_height = (region.height * options.scale).ceil();
        let max_side = u32::MAX as f64;
        if !(device_width.is_finite() && device_height.is_finite()) || device_width > max_side || device_height > max_side {
            return Err(Error::RenderError(format!(
                "capture of {}x{} px exceeds limit",
                device_width, device_height
            )));
        }
        let width = device_width.max(0.0) as u64;
        let height = device_height.max(0.0) as u64;
        if width == 0 || height == 0 {
            return Err(Error::RenderError("capture target is empty".into()));
        }
        if width.checked_mul(height).map_or(true, |pixels| pixels > MAX_PIXELS) {
            return Err(Error::RenderError(format!("capture of {}x{} px exceeds limit", width, height)));
        }
        if options.logging {
            debug!(
                "rasterizing {} paint commands into {}x{} px at scale {}",
                commands.len(),
                width,
                height,
                options.scale
            );
        }

        let srcs: Vec<String> = commands
            .iter()
            .filter_map(|c| match c {
                PaintCommand::Image { src, .. } => Some(src.clone()),
                _ => None,
            })
            .collect();
        let loaded = if srcs.is_empty() {
            HashMap::new()
        } else {
            images::load_images(srcs, self.base_url.clone(), options.allow_cross_origin, options.logging).await
        };

        let mut canvas = Canvas {
            pixels: RgbaImage::from_pixel(width as u32, height as u32, Rgba(background.0)),
            origin_x: region.x,
            origin_y: region.y,
            scale: options.scale,
        };
        for command in &commands {
            canvas.paint(command, &loaded);
        }
        Ok(RasterImage::new(canvas.pixels))
    }
}

struct Canvas {
    pixels: RgbaImage,
    origin_x: f64,
    origin_y: f64,
    scale: f64,
}

impl Canvas {
    /// CSS rect to device pixel bounds, clipped to the canvas.
    fn device_bounds(&self, rect: &Rect) -> Option<(u32, u32, u32, u32)> {
        let x0 = ((rect.x - self.origin_x) * self.scale).round().max(0.0);
        let y0 = ((rect.y - self.origin_y) * self.scale).round().max(0.0);
        let x1 = ((rect.right() - self.origin_x) * self.scale)
            .round()
            .min(self.pixels.width() as f64);
        let y1 = ((rect.bottom() - self.origin_y) * self.scale)
            .round()
            .min(self.pixels.height() as f64);
        (x1 > x0 && y1 > y0).then_some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    fn fill(&mut self, rect: &Rect, clip: Option<Rect>, color: Color) {
        let rect = match clip {
            Some(c) => rect.intersect(&c),
            None => *rect,
        };
        let Some((x0, y0, x1, y1)) = self.device_bounds(&rect) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let dst = self.pixels.get_pixel_mut(x, y);
                *dst = Rgba(over(color, Color(dst.0)).0);
            }
        }
    }

    fn paint(&mut self, command: &PaintCommand, images: &HashMap<String, RgbaImage>) {
        match command {
            PaintCommand::SolidRect { rect, color, clip } => self.fill(rect, *clip, *color),
            PaintCommand::Text { x, y, text, font_size, line_height, color, clip } => {
                // Glyphs are drawn as solid blocks sized to the font.
                let advance = font_size * GLYPH_ADVANCE;
                let glyph_h = font_size * 0.7;
                let top = y + (line_height - glyph_h) / 2.0;
                for (i, ch) in text.chars().enumerate() {
                    if ch.is_whitespace() {
                        continue;
                    }
                    let glyph = Rect {
                        x: x + i as f64 * advance + advance * 0.1,
                        y: top,
                        width: advance * 0.8,
                        height: glyph_h,
                    };
                    self.fill(&glyph, *clip, *color);
                }
            }
            PaintCommand::Image { rect, src, clip } => {
                let Some(source) = images.get(src) else {
                    return;
                };
                let Some((x0, y0, x1, y1)) = self.device_bounds(rect) else {
                    return;
                };
                let full_x = ((rect.x - self.origin_x) * self.scale).round();
                let full_y = ((rect.y - self.origin_y) * self.scale).round();
                let full_w = (rect.width * self.scale).round().max(1.0) as u32;
                let full_h = (rect.height * self.scale).round().max(1.0) as u32;
                let scaled = if source.dimensions() == (full_w, full_h) {
                    Cow::Borrowed(source)
                } else {
                    Cow::Owned(imageops::resize(source, full_w, full_h, imageops::FilterType::Triangle))
                };
                let visible = match clip {
                    Some(c) => self.device_bounds(&rect.intersect(c)),
                    None => Some((x0, y0, x1, y1)),
                };
                let Some((vx0, vy0, vx1, vy1)) = visible else {
                    return;
                };
                for y in vy0..vy1 {
                    for x in vx0..vx1 {
                        let sx = (x as f64 - full_x) as i64;
                        let sy = (y as f64 - full_y) as i64;
                        if sx < 0 || sy < 0 || sx >= full_w as i64 || sy >= full_h as i64 {
                            continue;
                        }
                        let src_px = scaled.get_pixel(sx as u32, sy as u32);
                        let dst = self.pixels.get_pixel_mut(x, y);
                        *dst = Rgba(over(Color(src_px.0), Color(dst.0)).0);
                    }
                }
            }
        }
    }
}

/// Source-over compositing of `src` onto an opaque `dst`.
fn over(src: Color, dst: Color) -> Color {
    let a = src.0[3] as u32;
    if a == 255 {
        return Color([src.0[0], src.0[1], src.0[2], 255]);
    }
    let blend = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8;
    Color([
        blend(src.0[0], dst.0[0]),
        blend(src.0[1], dst.0[1]),
        blend(src.0[2], dst.0[2]),
        255,
    ])
}
