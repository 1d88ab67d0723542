use lopdf::{Document as LopdfDocument, Object};

/// Extract all text content from a PDF document
pub fn extract_text(doc: &LopdfDocument) -> String {
    let mut text = String::new();
    let pages = doc.get_pages();
    for page_num in 1..=pages.len() {
        if let Ok(page_text) = doc.extract_text(&[page_num as u32]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }
    text
}

/// Titles of the document outline in reading order, with their depth.
pub fn outline_titles(doc: &LopdfDocument) -> Vec<(usize, String)> {
    let mut titles = Vec::new();
    let Ok(catalog) = doc.catalog() else {
        return titles;
    };
    let Ok(root) = catalog.get(b"Outlines").and_then(Object::as_reference) else {
        return titles;
    };
    if let Ok(first) = doc
        .get_dictionary(root)
        .and_then(|d| d.get(b"First"))
        .and_then(Object::as_reference)
    {
        walk(doc, first, 0, &mut titles);
    }
    titles
}

fn walk(doc: &LopdfDocument, mut id: lopdf::ObjectId, depth: usize, titles: &mut Vec<(usize, String)>) {
    loop {
        let Ok(item) = doc.get_dictionary(id) else { return };
        if let Ok(title) = item.get(b"Title").and_then(Object::as_str) {
            titles.push((depth, decode_text_string(title)));
        }
        if let Ok(child) = item.get(b"First").and_then(Object::as_reference) {
            walk(doc, child, depth + 1, titles);
        }
        match item.get(b"Next").and_then(Object::as_reference) {
            Ok(next) => id = next,
            Err(_) => return,
        }
    }
}

fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// The MediaBox of every page as `(width, height)`.
pub fn page_sizes(doc: &LopdfDocument) -> Vec<(f32, f32)> {
    doc.get_pages()
        .values()
        .filter_map(|id| doc.get_dictionary(*id).ok())
        .filter_map(|page| page.get(b"MediaBox").ok())
        .filter_map(|media| media.as_array().ok())
        .map(|media| {
            let value = |i: usize| media.get(i).and_then(|v| v.as_float().ok()).unwrap_or(0.0);
            (value(2), value(3))
        })
        .collect()
}

/// Number of link annotations whose action has the given type (`URI`, `GoTo`).
pub fn link_actions(doc: &LopdfDocument, action: &[u8]) -> usize {
    doc.objects
        .values()
        .filter_map(|object| object.as_dict().ok())
        .filter(|dict| dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Link".as_slice()))
        .filter_map(|dict| dict.get(b"A").and_then(Object::as_dict).ok())
        .filter(|a| a.get(b"S").and_then(Object::as_name).ok() == Some(action))
        .count()
}

/// Whether any image XObject is present.
pub fn has_image(doc: &LopdfDocument) -> bool {
    doc.objects.values().any(|object| match object {
        Object::Stream(stream) => {
            stream.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice())
        }
        _ => false,
    })
}
