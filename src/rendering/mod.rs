//! Rendering: layout, display list and rasterization of the render tree.

pub mod images;
pub mod layout;
pub mod paint;
pub mod raster;

pub use layout::{LayoutBox, LayoutTree, Rect};
pub use paint::PaintCommand;
pub use raster::{CaptureOptions, RasterImage, Rasterizer, SoftwareRasterizer};
