//! Raster images used by the document, decoded once and written as image
//! XObjects.

use lopdf::{Document, Stream, dictionary};
use sheaf_idf::SharedData;
use std::collections::HashMap;

#[derive(Debug)]
struct ImageEntry {
    resource: String,
    width: u32,
    height: u32,
    /// Packed 8-bit RGB samples.
    rgb: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ImageTable {
    entries: Vec<ImageEntry>,
    by_src: HashMap<String, Option<usize>>,
}

impl ImageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `data` on first use of `src`. Returns `None` when the bytes are
    /// not an image the decoder understands; the failure is remembered.
    pub fn register(&mut self, src: &str, data: &SharedData) -> Option<usize> {
        if let Some(known) = self.by_src.get(src) {
            return *known;
        }
        let index = match image::load_from_memory(data) {
            Ok(decoded) => {
                let rgb = decoded.to_rgb8();
                let index = self.entries.len();
                log::debug!("Decoded image '{}' ({}x{})", src, rgb.width(), rgb.height());
                self.entries.push(ImageEntry {
                    resource: format!("Im{}", index + 1),
                    width: rgb.width(),
                    height: rgb.height(),
                    rgb: rgb.into_raw(),
                });
                Some(index)
            }
            Err(e) => {
                log::warn!("Image '{}' could not be decoded: {}", src, e);
                None
            }
        };
        self.by_src.insert(src.to_string(), index);
        index
    }

    pub fn pixel_size(&self, index: usize) -> (u32, u32) {
        self.entries
            .get(index)
            .map(|e| (e.width, e.height))
            .unwrap_or((0, 0))
    }

    pub fn resource_name(&self, index: usize) -> &str {
        self.entries.get(index).map(|e| e.resource.as_str()).unwrap_or("Im0")
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every image into `doc` and returns the `/XObject` resource
    /// dictionary.
    pub fn write(&self, doc: &mut Document) -> lopdf::Dictionary {
        let mut xobjects = lopdf::Dictionary::new();
        for entry in &self.entries {
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => entry.width as i64,
                    "Height" => entry.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                entry.rgb.clone(),
            );
            let id = doc.add_object(stream);
            xobjects.set(entry.resource.as_bytes(), id);
        }
        xobjects
    }
}
