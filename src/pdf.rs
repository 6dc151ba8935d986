//! PDF document assembly using the `lopdf` library.
//!
//! Builds the object graph in memory: one shared resources dictionary, one
//! image XObject per distinct image (keyed by the SHA-256 of its encoded
//! bytes, so the same capture placed on every page is stored once) and one
//! content stream per page.

use crate::paginate::{
    DocumentAssembler, DocumentBuilder, EncodedImage, ImageCompression, ImageFormat, ImagePlacement, PageFormat,
};
use crate::{Error, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;

/// Points per millimetre.
const PT_PER_MM: f64 = 72.0 / 25.4;

/// Creates lopdf-backed documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfAssembler;

impl LopdfAssembler {
    pub fn new() -> Self {
        LopdfAssembler
    }
}

impl DocumentAssembler for LopdfAssembler {
    fn create(&self, format: PageFormat, compress: bool) -> Result<Box<dyn DocumentBuilder>> {
        Ok(Box::new(LopdfDocumentBuilder::new(format, compress)?))
    }
}

pub struct LopdfDocumentBuilder {
    document: Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    page_ids: Vec<ObjectId>,
    page_width_pt: f64,
    page_height_pt: f64,
    compress: bool,
    current: Content,
    xobjects: HashMap<String, (String, ObjectId)>,
}

impl LopdfDocumentBuilder {
    pub fn new(format: PageFormat, compress: bool) -> Result<Self> {
        if !(format.width > 0.0 && format.height > 0.0) {
            return Err(Error::DocumentError(format!("invalid page format {}x{}", format.width, format.height)));
        }
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        let resources_id = document.new_object_id();
        Ok(Self {
            document,
            pages_id,
            resources_id,
            page_ids: Vec::new(),
            page_width_pt: format.width * PT_PER_MM,
            page_height_pt: format.height * PT_PER_MM,
            compress,
            current: Content { operations: vec![] },
            xobjects: HashMap::new(),
        })
    }

    fn flate(data: &[u8], level: Compression) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), level);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    fn xobject_for(&mut self, image: &EncodedImage, compression: ImageCompression) -> Result<String> {
        let key = hex::encode(Sha256::digest(&image.bytes));
        if let Some((name, _)) = self.xobjects.get(&key) {
            return Ok(name.clone());
        }
        let rgb = match image.format {
            ImageFormat::Png => image::load_from_memory_with_format(&image.bytes, image::ImageFormat::Png)?.to_rgb8(),
        };
        let (width, height) = rgb.dimensions();
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };
        let level = match compression {
            ImageCompression::None => None,
            ImageCompression::Fast => Some(Compression::fast()),
            ImageCompression::Medium => Some(Compression::default()),
            ImageCompression::Slow => Some(Compression::best()),
        };
        let data = match level {
            Some(level) => {
                dict.set("Filter", "FlateDecode");
                Self::flate(rgb.as_raw(), level)?
            }
            None => rgb.into_raw(),
        };
        let id = self.document.add_object(Stream::new(dict, data));
        let name = format!("Im{}", self.xobjects.len() + 1);
        self.xobjects.insert(key, (name.clone(), id));
        Ok(name)
    }

    fn flush_page(&mut self) -> Result<()> {
        let content = std::mem::replace(&mut self.current, Content { operations: vec![] });
        let encoded = content.encode()?;
        let stream = if self.compress {
            Stream::new(dictionary! { "Filter" => "FlateDecode" }, Self::flate(&encoded, Compression::default())?)
        } else {
            Stream::new(dictionary! {}, encoded)
        };
        let content_id = self.document.add_object(stream);
        let page_id = self.document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), (self.page_width_pt as f32).into(), (self.page_height_pt as f32).into()],
            "Contents" => content_id,
            "Resources" => self.resources_id,
        });
        self.page_ids.push(page_id);
        Ok(())
    }
}

impl DocumentBuilder for LopdfDocumentBuilder {
    fn add_image(&mut self, image: &EncodedImage, placement: ImagePlacement, compression: ImageCompression) -> Result<()> {
        let name = self.xobject_for(image, compression)?;
        let w = placement.width * PT_PER_MM;
        let h = placement.height * PT_PER_MM;
        let x = placement.x * PT_PER_MM;
        // Placement is top-down from the page's top edge; PDF space is bottom-up.
        let y = self.page_height_pt - (placement.y + placement.height) * PT_PER_MM;
        let ops = &mut self.current.operations;
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                (w as f32).into(),
                0.into(),
                0.into(),
                (h as f32).into(),
                (x as f32).into(),
                (y as f32).into(),
            ],
        ));
        ops.push(Operation::new("Do", vec![name.as_str().into()]));
        ops.push(Operation::new("Q", vec![]));
        Ok(())
    }

    fn add_page(&mut self) -> Result<()> {
        self.flush_page()
    }

    fn page_count(&self) -> usize {
        self.page_ids.len() + 1
    }

    fn finish(mut self: Box<Self>) -> Result<Vec<u8>> {
        self.flush_page()?;

        let mut xobjects = Dictionary::new();
        for (name, id) in self.xobjects.values() {
            xobjects.set(name.as_str(), *id);
        }
        self.document
            .objects
            .insert(self.resources_id, Object::Dictionary(dictionary! { "XObject" => xobjects }));

        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::from(*id)).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.document.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.document.add_object(dictionary! { "Type" => "Catalog", "Pages" => self.pages_id });
        self.document.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        self.document.save_to(&mut out)?;
        Ok(out)
    }
}
