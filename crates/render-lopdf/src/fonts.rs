//! Font resources of the output document and the metrics used to break lines.
//!
//! Base-14 faces are referenced by name and measured with built-in tables.
//! Embedded faces are TrueType programs written as `FontFile2`; their widths
//! come from the font itself through `ttf-parser`.

use crate::error::RenderError;
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use sheaf_idf::{FontHandle, SharedData};
use std::collections::HashMap;

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

const FIRST_CHAR: u8 = 32;
const LAST_CHAR: u8 = 255;

/// Encodes text for a simple font with `WinAnsiEncoding`. Characters outside
/// the encoding become `?`.
pub fn to_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_code).collect()
}

fn win_ansi_code(c: char) -> u8 {
    match c {
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{2026}' => 0x85,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{2122}' => 0x99,
        '\u{00A0}' => b' ',
        c if (c as u32) < 0x80 || ((c as u32) >= 0xA0 && (c as u32) <= 0xFF) => c as u8,
        _ => b'?',
    }
}

/// The Unicode character a WinAnsi code stands for.
fn win_ansi_char(code: u8) -> char {
    match code {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x85 => '\u{2026}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x99 => '\u{2122}',
        other => other as char,
    }
}

#[derive(Debug)]
struct FontEntry {
    postscript_name: String,
    resource: String,
    /// Advance widths for codes `FIRST_CHAR..=LAST_CHAR`, in 1/1000 em.
    widths: Vec<u16>,
    program: Option<EmbeddedProgram>,
}

#[derive(Debug)]
struct EmbeddedProgram {
    data: SharedData,
    bbox: [i16; 4],
    ascent: i16,
    descent: i16,
    cap_height: i16,
    italic_angle: f32,
}

/// Every font used by the document, keyed by the name it is drawn with.
#[derive(Debug, Default)]
pub struct FontTable {
    entries: Vec<FontEntry>,
    index: HashMap<(String, bool), usize>,
}

impl FontTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of the font for `handle`, registering it on first use.
    pub fn register(&mut self, handle: &FontHandle) -> usize {
        let key = (handle.postscript_name.clone(), handle.is_embedded());
        if let Some(&index) = self.index.get(&key) {
            return index;
        }
        let index = self.entries.len();
        let resource = format!("F{}", index + 1);
        let entry = match &handle.data {
            Some(data) => match embedded_entry(&handle.postscript_name, data, resource.clone()) {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("{}; drawing with Helvetica instead", err);
                    base_entry("Helvetica", resource)
                }
            },
            None => base_entry(&handle.postscript_name, resource),
        };
        self.entries.push(entry);
        self.index.insert(key, index);
        index
    }

    pub fn resource_name(&self, index: usize) -> &str {
        self.entries.get(index).map(|e| e.resource.as_str()).unwrap_or("F1")
    }

    pub fn postscript_name(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.postscript_name.as_str())
    }

    /// Width of `text` in points.
    pub fn measure(&self, index: usize, text: &str, size: f32) -> f32 {
        let Some(entry) = self.entries.get(index) else {
            return 0.0;
        };
        let units: u32 = to_win_ansi(text)
            .into_iter()
            .map(|code| {
                if code < FIRST_CHAR {
                    0
                } else {
                    entry.widths[(code - FIRST_CHAR) as usize] as u32
                }
            })
            .sum();
        units as f32 * size / 1000.0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes every font into `doc` and returns the `/Font` resource dictionary.
    pub fn write(&self, doc: &mut Document) -> lopdf::Dictionary {
        let mut fonts = lopdf::Dictionary::new();
        for entry in &self.entries {
            let id = match &entry.program {
                None => doc.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => entry.postscript_name.clone(),
                    "Encoding" => "WinAnsiEncoding",
                }),
                Some(program) => write_embedded(doc, entry, program),
            };
            fonts.set(entry.resource.as_bytes(), id);
        }
        fonts
    }
}

fn write_embedded(doc: &mut Document, entry: &FontEntry, program: &EmbeddedProgram) -> ObjectId {
    let file = Stream::new(
        dictionary! { "Length1" => program.data.len() as i64 },
        program.data.to_vec(),
    );
    let file_id = doc.add_object(file);
    let bbox: Vec<Object> = program.bbox.iter().map(|v| Object::Integer(*v as i64)).collect();
    let descriptor_id = doc.add_object(dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => entry.postscript_name.clone(),
        "Flags" => 32,
        "FontBBox" => bbox,
        "ItalicAngle" => program.italic_angle,
        "Ascent" => program.ascent as i64,
        "Descent" => program.descent as i64,
        "CapHeight" => program.cap_height as i64,
        "StemV" => 80,
        "FontFile2" => file_id,
    });
    let widths: Vec<Object> = entry.widths.iter().map(|w| Object::Integer(*w as i64)).collect();
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "TrueType",
        "BaseFont" => entry.postscript_name.clone(),
        "FirstChar" => FIRST_CHAR as i64,
        "LastChar" => LAST_CHAR as i64,
        "Widths" => widths,
        "FontDescriptor" => descriptor_id,
        "Encoding" => "WinAnsiEncoding",
    })
}

fn base_entry(postscript_name: &str, resource: String) -> FontEntry {
    let widths = (FIRST_CHAR..=LAST_CHAR)
        .map(|code| base_width(postscript_name, code))
        .collect();
    FontEntry {
        postscript_name: postscript_name.to_string(),
        resource,
        widths,
        program: None,
    }
}

/// Approximate metrics for the base-14 faces, derived from Helvetica.
fn base_width(postscript_name: &str, code: u8) -> u16 {
    if postscript_name.starts_with("Courier") {
        return 600;
    }
    let helvetica = match code {
        32..=126 => HELVETICA_WIDTHS[(code - 32) as usize],
        0x95 => 350,
        0x96 => 556,
        0x97 => 1000,
        0x85 => 1000,
        _ => 556,
    };
    let bold = postscript_name.contains("Bold");
    let scale = match (postscript_name.starts_with("Times"), bold) {
        (true, false) => 0.9,
        (true, true) => 0.95,
        (false, true) => 1.07,
        (false, false) => 1.0,
    };
    (helvetica as f32 * scale).round() as u16
}

fn embedded_entry(postscript_name: &str, data: &SharedData, resource: String) -> Result<FontEntry, RenderError> {
    let face = ttf_parser::Face::parse(data, 0).map_err(|_| RenderError::Font(postscript_name.to_string()))?;
    let per_em = face.units_per_em().max(1) as f32;
    let scale = |v: i16| (v as f32 * 1000.0 / per_em).round() as i16;

    let widths = (FIRST_CHAR..=LAST_CHAR)
        .map(|code| {
            face.glyph_index(win_ansi_char(code))
                .and_then(|glyph| face.glyph_hor_advance(glyph))
                .map(|advance| (advance as f32 * 1000.0 / per_em).round() as u16)
                .unwrap_or(0)
        })
        .collect();
    let bbox = face.global_bounding_box();

    Ok(FontEntry {
        postscript_name: postscript_name.to_string(),
        resource,
        widths,
        program: Some(EmbeddedProgram {
            data: data.clone(),
            bbox: [scale(bbox.x_min), scale(bbox.y_min), scale(bbox.x_max), scale(bbox.y_max)],
            ascent: scale(face.ascender()),
            descent: scale(face.descender()),
            cap_height: scale(face.capital_height().unwrap_or(face.ascender())),
            italic_angle: face.italic_angle(),
        }),
    })
}
