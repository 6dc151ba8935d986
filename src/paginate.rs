//! Pagination of one tall raster into fixed-size document pages.
//!
//! The image is scaled uniformly to the page width. Page `k` shows the same
//! full image shifted up by `k * page_height`, so every page is a crop of the
//! single continuous capture and nothing is re-rasterized per page.

use crate::platform::DownloadTarget;
use crate::rendering::raster::RasterImage;
use crate::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Remaining height (document units) below which no further page is added.
pub const PAGE_EPSILON: f64 = 1e-6;

/// Physical page size in document units (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageFormat {
    pub width: f64,
    pub height: f64,
}

impl PageFormat {
    /// Portrait A4.
    pub const A4: PageFormat = PageFormat { width: 210.0, height: 297.0 };
}

impl Default for PageFormat {
    fn default() -> Self {
        Self::A4
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
}

/// Encoded image bytes handed to a document builder.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub format: ImageFormat,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Where an image lands on the current page, in document units from the
/// page's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Compression effort for embedded image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageCompression {
    None,
    #[default]
    Fast,
    Medium,
    Slow,
}

/// A stateful paginated document under construction. A fresh builder
/// already contains page 1.
pub trait DocumentBuilder: Send {
    fn add_image(&mut self, image: &EncodedImage, placement: ImagePlacement, compression: ImageCompression) -> Result<()>;
    fn add_page(&mut self) -> Result<()>;
    fn page_count(&self) -> usize;
    fn finish(self: Box<Self>) -> Result<Vec<u8>>;
}

/// Factory for document builders.
pub trait DocumentAssembler: Send + Sync {
    fn create(&self, format: PageFormat, compress: bool) -> Result<Box<dyn DocumentBuilder>>;
}

/// Page geometry for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub image_width: f64,
    pub image_height: f64,
    /// Vertical image offset on each page (0, -page_height, ...).
    pub offsets: Vec<f64>,
}

impl PagePlan {
    pub fn page_count(&self) -> usize {
        self.offsets.len()
    }
}

/// A finished but not yet delivered document.
pub struct Document {
    builder: Box<dyn DocumentBuilder>,
    page_count: usize,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document").field("page_count", &self.page_count).finish()
    }
}

/// Outcome of handing a document to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDocument {
    pub file_name: String,
    pub page_count: usize,
    pub byte_len: usize,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Serialize and offer the file to the host under `file_name`.
    pub fn finalize(self, file_name: &str, downloads: &dyn DownloadTarget) -> Result<SavedDocument> {
        let page_count = self.page_count;
        let bytes = self.builder.finish()?;
        downloads.offer(file_name, &bytes)?;
        Ok(SavedDocument {
            file_name: file_name.to_string(),
            page_count,
            byte_len: bytes.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paginator {
    format: PageFormat,
    compression: ImageCompression,
}

impl Paginator {
    pub fn new(format: PageFormat, compression: ImageCompression) -> Self {
        Self { format, compression }
    }

    pub fn format(&self) -> PageFormat {
        self.format
    }

    /// Page offsets for an image of `width` x `height` pixels.
    pub fn plan(&self, width: u32, height: u32) -> Result<PagePlan> {
        if width == 0 || height == 0 {
            return Err(Error::DocumentError(format!("cannot paginate a {}x{} image", width, height)));
        }
        if !(self.format.width > 0.0 && self.format.height > 0.0) {
            return Err(Error::DocumentError(format!(
                "invalid page format {}x{}",
                self.format.width, self.format.height
            )));
        }
        let image_width = self.format.width;
        let image_height = height as f64 * self.format.width / width as f64;

        let mut offsets = vec![0.0];
        let mut position = 0.0;
        let mut height_left = image_height - self.format.height;
        while height_left > PAGE_EPSILON {
            position -= self.format.height;
            offsets.push(position);
            height_left -= self.format.height;
        }
        Ok(PagePlan { image_width, image_height, offsets })
    }

    /// Lay `image` out across as many pages as its scaled height needs.
    pub fn build(&self, image: &RasterImage, assembler: &dyn DocumentAssembler, compress: bool) -> Result<Document> {
        let plan = self.plan(image.width(), image.height())?;
        let encoded = image.encoded()?;
        let mut builder = assembler.create(self.format, compress)?;
        for (page, offset) in plan.offsets.iter().enumerate() {
            if page > 0 {
                builder.add_page()?;
            }
            let placement = ImagePlacement {
                x: 0.0,
                y: *offset,
                width: plan.image_width,
                height: plan.image_height,
            };
            builder.add_image(&encoded, placement, self.compression)?;
        }
        debug!(
            "paginated {}x{} px image into {} page(s) ({:.1} units tall)",
            image.width(),
            image.height(),
            plan.page_count(),
            plan.image_height
        );
        Ok(Document {
            page_count: builder.page_count(),
            builder,
        })
    }
}

/// Download name for a resume owner: every whitespace run, leading and
/// trailing ones included, becomes a single `_`.
pub fn file_name_for(name: &str) -> String {
    if name.is_empty() {
        return "resume.pdf".to_string();
    }
    let mut collapsed = String::with_capacity(name.len());
    let mut in_space = false;
    for c in name.chars() {
        if c.is_whitespace() {
            if !in_space {
                collapsed.push('_');
            }
            in_space = true;
        } else {
            collapsed.push(c);
            in_space = false;
        }
    }
    format!("{}_resume.pdf", collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a4() -> Paginator {
        Paginator::new(PageFormat::A4, ImageCompression::Fast)
    }

    #[test]
    fn tall_image_spans_three_pages() {
        let plan = a4().plan(1000, 4000).expect("plan");
        assert_eq!(plan.image_width, 210.0);
        assert_eq!(plan.image_height, 840.0);
        assert_eq!(plan.offsets, vec![0.0, -297.0, -594.0]);
    }

    #[test]
    fn square_image_fits_one_page() {
        let plan = a4().plan(1000, 1000).expect("plan");
        assert_eq!(plan.image_height, 210.0);
        assert_eq!(plan.offsets, vec![0.0]);
    }

    #[test]
    fn page_count_matches_ceiling() {
        for (w, h) in [(1000, 1414), (1000, 1415), (2100, 5940), (2100, 5941), (800, 12345), (3, 7)] {
            let plan = a4().plan(w, h).expect("plan");
            let expected = ((h as f64 * 210.0 / w as f64) / 297.0).ceil() as usize;
            assert_eq!(plan.page_count(), expected.max(1), "{}x{}", w, h);
            for (k, offset) in plan.offsets.iter().enumerate() {
                assert_eq!(*offset, -(k as f64) * 297.0);
            }
        }
    }

    #[test]
    fn exact_multiple_has_no_trailing_page() {
        // 2100 x 5940 px scales to exactly two pages.
        assert_eq!(a4().plan(2100, 5940).expect("plan").page_count(), 2);
    }

    #[test]
    fn empty_image_is_rejected() {
        assert!(a4().plan(0, 10).is_err());
        assert!(a4().plan(10, 0).is_err());
    }

    #[test]
    fn file_names() {
        assert_eq!(file_name_for("Jane Q Doe"), "Jane_Q_Doe_resume.pdf");
        assert_eq!(file_name_for("Jane \t Doe"), "Jane_Doe_resume.pdf");
        assert_eq!(file_name_for(""), "resume.pdf");
        assert_eq!(file_name_for("   "), "__resume.pdf");
        assert_eq!(file_name_for(" Jane Doe "), "_Jane_Doe__resume.pdf");
    }
}
