//! Byte-level scanner that splits decoded markup into tags and text.
//!
//! Tag and attribute names are ASCII `[A-Za-z0-9:_-]` and are lower-cased here.
//! Attribute values are left raw; the tree builder decodes their references.

use memchr::{memchr, memmem};
use sheaf_types::Diagnostic;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token<'a> {
    StartTag {
        name: String,
        attributes: Vec<(String, &'a str)>,
        self_closing: bool,
    },
    EndTag(String),
    /// Ordinary character data; references and whitespace still to be processed.
    Text(&'a str),
    /// Script/style bodies and CDATA sections, passed on untouched.
    RawText(&'a str),
}

enum Scan<'a> {
    /// The `<` is plain text.
    Literal,
    /// A comment, doctype or processing instruction ending at the offset.
    Skip(usize),
    Token(Token<'a>, usize),
    Unterminated(&'static str),
}

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

fn starts_with_ignore_ascii_case_at(haystack: &[u8], start: usize, needle: &[u8]) -> bool {
    haystack.len() >= start + needle.len()
        && haystack[start..start + needle.len()].eq_ignore_ascii_case(needle)
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':'
}

pub(crate) fn tokenize(input: &str) -> (Vec<Token<'_>>, Vec<Diagnostic>) {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < len {
        let Some(rel) = memchr(b'<', &bytes[i..]) else {
            break;
        };
        i += rel;
        match scan_markup(input, i) {
            Scan::Literal => i += 1,
            Scan::Unterminated(what) => {
                diagnostics.push(Diagnostic::markup(format!(
                    "unterminated {} at byte {} kept as text",
                    what, i
                )));
                i += 1;
            }
            Scan::Skip(end) => {
                push_text(&mut tokens, input, text_start, i);
                i = end;
                text_start = end;
            }
            Scan::Token(token, end) => {
                push_text(&mut tokens, input, text_start, i);
                i = end;
                text_start = end;
                let raw_text_name = match &token {
                    Token::StartTag { name, self_closing: false, .. }
                        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) =>
                    {
                        Some(name.clone())
                    }
                    _ => None,
                };
                tokens.push(token);
                if let Some(name) = raw_text_name {
                    let (body_end, resume) = find_raw_text_close(input, i, &name);
                    if body_end > i {
                        tokens.push(Token::RawText(&input[i..body_end]));
                    }
                    tokens.push(Token::EndTag(name));
                    i = resume;
                    text_start = resume;
                }
            }
        }
    }
    push_text(&mut tokens, input, text_start, len);
    (tokens, diagnostics)
}

// Slice endpoints are only ever ASCII structural bytes, so they stay on UTF-8
// character boundaries.
fn push_text<'a>(tokens: &mut Vec<Token<'a>>, input: &'a str, from: usize, to: usize) {
    if from < to {
        tokens.push(Token::Text(&input[from..to]));
    }
}

fn scan_markup(input: &str, i: usize) -> Scan<'_> {
    let bytes = input.as_bytes();
    let after = |needle: &[u8], from: usize| memmem::find(&bytes[from..], needle).map(|rel| from + rel + needle.len());

    if bytes[i..].starts_with(b"<!--") {
        // An unterminated comment swallows the rest of the input.
        return Scan::Skip(after(b"-->", i + 4).unwrap_or(bytes.len()));
    }
    if starts_with_ignore_ascii_case_at(bytes, i, b"<![cdata[") {
        let body_start = i + 9;
        return match memmem::find(&bytes[body_start..], b"]]>") {
            Some(rel) => Scan::Token(Token::RawText(&input[body_start..body_start + rel]), body_start + rel + 3),
            None => Scan::Unterminated("CDATA section"),
        };
    }
    if bytes[i..].starts_with(b"<!") || bytes[i..].starts_with(b"<?") {
        return match memchr(b'>', &bytes[i..]) {
            Some(rel) => Scan::Skip(i + rel + 1),
            None => Scan::Unterminated("declaration"),
        };
    }
    if bytes[i..].starts_with(b"</") {
        return scan_end_tag(bytes, i);
    }
    match bytes.get(i + 1) {
        Some(c) if c.is_ascii_alphabetic() => scan_start_tag(input, i),
        _ => Scan::Literal,
    }
}

fn scan_end_tag(bytes: &[u8], i: usize) -> Scan<'static> {
    let start = i + 2;
    match bytes.get(start) {
        Some(b'>') => return Scan::Skip(start + 1),
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Scan::Literal,
    }
    let mut j = start;
    while j < bytes.len() && is_name_char(bytes[j]) {
        j += 1;
    }
    let name = String::from_utf8_lossy(&bytes[start..j]).to_ascii_lowercase();
    match memchr(b'>', &bytes[j..]) {
        Some(rel) => Scan::Token(Token::EndTag(name), j + rel + 1),
        None => Scan::Unterminated("end tag"),
    }
}

fn scan_start_tag(input: &str, i: usize) -> Scan<'_> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let start = i + 1;
    let mut k = start;
    while k < len && is_name_char(bytes[k]) {
        k += 1;
    }
    let name = input[start..k].to_ascii_lowercase();
    let mut attributes: Vec<(String, &str)> = Vec::new();
    let mut self_closing = false;

    let skip_whitespace = |k: &mut usize| {
        while *k < len && bytes[*k].is_ascii_whitespace() {
            *k += 1;
        }
    };

    loop {
        skip_whitespace(&mut k);
        if k >= len {
            return Scan::Unterminated("start tag");
        }
        if bytes[k] == b'>' {
            k += 1;
            break;
        }
        if bytes[k] == b'/' {
            if k + 1 < len && bytes[k + 1] == b'>' {
                self_closing = true;
                k += 2;
                break;
            }
            k += 1;
            continue;
        }
        let name_start = k;
        while k < len && is_name_char(bytes[k]) {
            k += 1;
        }
        if name_start == k {
            // Not a name character (e.g. a stray quote); skip it.
            k += 1;
            continue;
        }
        let attribute_name = input[name_start..k].to_ascii_lowercase();

        skip_whitespace(&mut k);
        let value: &str = if k < len && bytes[k] == b'=' {
            k += 1;
            skip_whitespace(&mut k);
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                k += 1;
                let value_start = k;
                match memchr(quote, &bytes[k..]) {
                    Some(rel) => {
                        k += rel + 1;
                        &input[value_start..value_start + rel]
                    }
                    None => return Scan::Unterminated("attribute value"),
                }
            } else {
                let value_start = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    if bytes[k] == b'/' && k + 1 < len && bytes[k + 1] == b'>' {
                        break;
                    }
                    k += 1;
                }
                &input[value_start..k]
            }
        } else {
            ""
        };
        attributes.push((attribute_name, value));
    }

    Scan::Token(
        Token::StartTag {
            name,
            attributes,
            self_closing,
        },
        k,
    )
}

/// Finds `</name` followed by optional whitespace and `>`, case-insensitively.
/// Returns the end of the body and the offset just past the close tag; a
/// missing close tag makes the rest of the input the body.
fn find_raw_text_close(input: &str, from: usize, name: &str) -> (usize, usize) {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut close = Vec::with_capacity(name.len() + 2);
    close.extend_from_slice(b"</");
    close.extend_from_slice(name.as_bytes());
    let n = close.len();

    let mut i = from;
    while i + n <= len {
        let Some(rel) = memchr(b'<', &bytes[i..]) else {
            break;
        };
        i += rel;
        if starts_with_ignore_ascii_case_at(bytes, i, &close) {
            let mut k = i + n;
            while k < len && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < len && bytes[k] == b'>' {
                return (i, k + 1);
            }
        }
        i += 1;
    }
    (len, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_forms() {
        let (tokens, _) = tokenize(r#"<img SRC="a.png" alt='x > y' width=10 hidden>"#);
        assert_eq!(
            tokens,
            vec![Token::StartTag {
                name: "img".into(),
                attributes: vec![
                    ("src".into(), "a.png"),
                    ("alt".into(), "x > y"),
                    ("width".into(), "10"),
                    ("hidden".into(), ""),
                ],
                self_closing: false,
            }]
        );
    }

    #[test]
    fn test_comments_and_doctype_are_skipped() {
        let (tokens, _) = tokenize("<!DOCTYPE html><!-- note -->a<?pi x?>b");
        assert_eq!(tokens, vec![Token::Text("a"), Token::Text("b")]);
    }

    #[test]
    fn test_lone_angle_bracket_is_text() {
        let (tokens, diagnostics) = tokenize("1 < 2 and 3 <4");
        assert_eq!(tokens, vec![Token::Text("1 < 2 and 3 <4")]);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_script_body_is_raw() {
        let (tokens, _) = tokenize("<SCRIPT>if (a < b) { x = '</p>'; }</ScRiPt >after");
        assert_eq!(
            tokens,
            vec![
                Token::StartTag { name: "script".into(), attributes: vec![], self_closing: false },
                Token::RawText("if (a < b) { x = '</p>'; }"),
                Token::EndTag("script".into()),
                Token::Text("after"),
            ]
        );
    }

    #[test]
    fn test_unterminated_tag_is_text_with_diagnostic() {
        let (tokens, diagnostics) = tokenize("ok <b class=\"x");
        assert_eq!(tokens, vec![Token::Text("ok <b class=\"x")]);
        assert_eq!(diagnostics.len(), 1);
    }
}
