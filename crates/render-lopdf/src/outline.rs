//! The document outline, built from bookmarks in registration order.

use lopdf::{Document, Object, ObjectId, StringFormat, dictionary};

/// A bookmark resolved to a page and a PDF y coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineEntry {
    pub title: String,
    pub level: u8,
    pub page: usize,
    pub y: f32,
}

/// Encodes a PDF text string: plain ASCII stays literal, anything else becomes
/// UTF-16BE with a byte order mark.
pub fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::String(text.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

struct OutlineNode {
    id: ObjectId,
    title: String,
    dest: Vec<Object>,
    children: Vec<OutlineNode>,
}

/// Writes the outline tree into `doc` and returns the root dictionary's id.
/// A deeper level nests under the closest preceding shallower entry; skipped
/// levels do not create empty parents.
pub fn build_outline(doc: &mut Document, entries: &[OutlineEntry], page_ids: &[ObjectId]) -> Option<ObjectId> {
    let mut flat: Vec<(OutlineNode, Option<usize>)> = Vec::new();
    let mut level_stack: Vec<(u8, usize)> = Vec::new();

    for entry in entries {
        let Some(&page_id) = page_ids.get(entry.page) else {
            log::warn!("Outline entry '{}' points past the last page", entry.title);
            continue;
        };
        while level_stack.last().is_some_and(|(level, _)| *level >= entry.level) {
            level_stack.pop();
        }
        let parent = level_stack.last().map(|(_, index)| *index);
        let node = OutlineNode {
            id: doc.new_object_id(),
            title: entry.title.clone(),
            dest: vec![Object::Reference(page_id), "XYZ".into(), Object::Null, entry.y.into(), Object::Null],
            children: Vec::new(),
        };
        level_stack.push((entry.level, flat.len()));
        flat.push((node, parent));
    }
    if flat.is_empty() {
        return None;
    }

    // Parents always precede their children, so folding from the back
    // attaches every child before its parent is moved.
    let mut roots = Vec::new();
    let mut pending: Vec<Vec<OutlineNode>> = (0..flat.len()).map(|_| Vec::new()).collect();
    for (index, (mut node, parent)) in flat.into_iter().enumerate().rev() {
        node.children = std::mem::take(&mut pending[index]);
        node.children.reverse();
        match parent {
            Some(parent) => pending[parent].push(node),
            None => roots.push(node),
        }
    }
    roots.reverse();

    let root_id = doc.new_object_id();
    write_level(doc, &roots, root_id);
    let (first, last) = (roots[0].id, roots[roots.len() - 1].id);
    doc.objects.insert(
        root_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => first,
            "Last" => last,
            "Count" => count(&roots) as i64,
        }),
    );
    Some(root_id)
}

fn count(items: &[OutlineNode]) -> usize {
    items.iter().map(|item| 1 + count(&item.children)).sum()
}

fn write_level(doc: &mut Document, items: &[OutlineNode], parent_id: ObjectId) {
    for (i, item) in items.iter().enumerate() {
        let mut dict = dictionary! {
            "Title" => text_string(&item.title),
            "Parent" => parent_id,
            "Dest" => item.dest.clone(),
        };
        if i > 0 {
            dict.set("Prev", items[i - 1].id);
        }
        if let Some(next) = items.get(i + 1) {
            dict.set("Next", next.id);
        }
        if let (Some(first), Some(last)) = (item.children.first(), item.children.last()) {
            dict.set("First", first.id);
            dict.set("Last", last.id);
            dict.set("Count", count(&item.children) as i64);
            write_level(doc, &item.children, item.id);
        }
        doc.objects.insert(item.id, Object::Dictionary(dict));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, level: u8) -> OutlineEntry {
        OutlineEntry {
            title: title.to_string(),
            level,
            page: 0,
            y: 700.0,
        }
    }

    fn title_of(doc: &Document, id: ObjectId) -> Vec<u8> {
        let dict = doc.get_dictionary(id).unwrap();
        dict.get(b"Title").unwrap().as_str().unwrap().to_vec()
    }

    #[test]
    fn test_levels_nest_under_previous_shallower_entry() {
        let mut doc = Document::with_version("1.7");
        let page = doc.new_object_id();
        let entries = vec![entry("A", 1), entry("A.1", 2), entry("A.1.a", 4), entry("B", 1)];
        let root = build_outline(&mut doc, &entries, &[page]).unwrap();

        let root_dict = doc.get_dictionary(root).unwrap();
        assert_eq!(root_dict.get(b"Count").unwrap().as_i64().unwrap(), 4);
        let first = root_dict.get(b"First").unwrap().as_reference().unwrap();
        let last = root_dict.get(b"Last").unwrap().as_reference().unwrap();
        assert_eq!(title_of(&doc, first), b"A");
        assert_eq!(title_of(&doc, last), b"B");

        let a = doc.get_dictionary(first).unwrap();
        let child = a.get(b"First").unwrap().as_reference().unwrap();
        assert_eq!(title_of(&doc, child), b"A.1");
        let grandchild = doc.get_dictionary(child).unwrap().get(b"First").unwrap().as_reference().unwrap();
        assert_eq!(title_of(&doc, grandchild), b"A.1.a");
    }

    #[test]
    fn test_entries_past_last_page_are_skipped() {
        let mut doc = Document::with_version("1.7");
        let mut far = entry("Far", 1);
        far.page = 3;
        assert!(build_outline(&mut doc, &[far], &[]).is_none());
    }

    #[test]
    fn test_non_ascii_titles_use_utf16() {
        let Object::String(bytes, _) = text_string("Ωmega") else {
            panic!("expected a string");
        };
        assert_eq!(&bytes[..4], &[0xFE, 0xFF, 0x03, 0xA9]);
    }
}
