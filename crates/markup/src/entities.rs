//! Character reference decoding.
//!
//! Named references cover the HTML core set, Latin-1 symbols, Greek letters
//! and common typographic punctuation. References must be terminated by `;`;
//! an `&` that does not begin a terminated reference is plain text.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sheaf_types::Diagnostic;

const MAX_NAME_LEN: usize = 32;
const MAX_HEX_DIGITS: usize = 6; // 0x10FFFF
const MAX_DEC_DIGITS: usize = 7; // 1114111

/// What to do with a well-formed reference whose name is not known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownEntityMode {
    /// Keep the reference text as written.
    #[default]
    Literal,
    /// Replace the reference with a single placeholder character.
    Placeholder(char),
}

impl UnknownEntityMode {
    pub const DEFAULT_PLACEHOLDER: char = '\u{FFFD}';
}

impl Serialize for UnknownEntityMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            UnknownEntityMode::Literal => serializer.serialize_str("literal"),
            UnknownEntityMode::Placeholder(c) => serializer.serialize_str(&c.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for UnknownEntityMode {
    /// Accepts `"literal"`, `"placeholder"` (U+FFFD) or any single character.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "literal" => Ok(UnknownEntityMode::Literal),
            "placeholder" => Ok(UnknownEntityMode::Placeholder(Self::DEFAULT_PLACEHOLDER)),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(UnknownEntityMode::Placeholder(c)),
                    _ => Err(de::Error::custom(format!(
                        "expected 'literal', 'placeholder' or a single character, got '{}'",
                        other
                    ))),
                }
            }
        }
    }
}

/// Decodes every character reference in `text`. Unknown or invalid references
/// are handled per `mode` and reported in `diagnostics`.
pub fn decode_entities(
    text: &str,
    mode: UnknownEntityMode,
    diagnostics: &mut Vec<Diagnostic>,
) -> String {
    let Some(first) = memchr::memchr(b'&', text.as_bytes()) else {
        return text.to_string();
    };
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..first]);
    let mut i = first;
    while i < bytes.len() {
        if bytes[i] != b'&' {
            let next = memchr::memchr(b'&', &bytes[i..]).map_or(bytes.len(), |rel| i + rel);
            out.push_str(&text[i..next]);
            i = next;
            continue;
        }
        match scan_reference(bytes, i) {
            Some((end, body)) => {
                let reference = &text[i..=end];
                match resolve(body) {
                    Some(decoded) => out.push_str(&decoded),
                    None => {
                        diagnostics.push(Diagnostic::markup(format!(
                            "unknown character reference '{}'",
                            reference
                        )));
                        match mode {
                            UnknownEntityMode::Literal => out.push_str(reference),
                            UnknownEntityMode::Placeholder(c) => out.push(c),
                        }
                    }
                }
                i = end + 1;
            }
            None => {
                out.push('&');
                i += 1;
            }
        }
    }
    out
}

/// Finds a `;`-terminated reference starting at `start` (the `&`). Returns the
/// index of the `;` and the text between `&` and `;`.
fn scan_reference(bytes: &[u8], start: usize) -> Option<(usize, &str)> {
    let body_start = start + 1;
    let (is_numeric, is_hex) = match (bytes.get(body_start), bytes.get(body_start + 1)) {
        (Some(b'#'), Some(b'x' | b'X')) => (true, true),
        (Some(b'#'), _) => (true, false),
        (Some(c), _) if c.is_ascii_alphabetic() => (false, false),
        _ => return None,
    };
    let digits_start = if is_hex {
        body_start + 2
    } else if is_numeric {
        body_start + 1
    } else {
        body_start
    };
    let limit = if is_hex {
        MAX_HEX_DIGITS
    } else if is_numeric {
        MAX_DEC_DIGITS
    } else {
        MAX_NAME_LEN
    };
    let mut j = digits_start;
    while j < bytes.len() && j - digits_start <= limit {
        let b = bytes[j];
        if b == b';' {
            if j == digits_start {
                return None;
            }
            // Safe to slice: the body is ASCII only.
            let body = std::str::from_utf8(&bytes[body_start..j]).ok()?;
            return Some((j, body));
        }
        let ok = if is_hex {
            b.is_ascii_hexdigit()
        } else if is_numeric {
            b.is_ascii_digit()
        } else {
            b.is_ascii_alphanumeric()
        };
        if !ok {
            return None;
        }
        j += 1;
    }
    None
}

fn resolve(body: &str) -> Option<String> {
    if let Some(numeric) = body.strip_prefix('#') {
        let value = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse::<u32>().ok()?,
        };
        if value == 0 {
            return None;
        }
        return char::from_u32(value).map(String::from);
    }
    lookup_named(body).map(str::to_string)
}

fn lookup_named(name: &str) -> Option<&'static str> {
    let decoded = match name {
        // Core
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{00A0}",
        // Latin-1 symbols
        "iexcl" => "\u{00A1}",
        "cent" => "\u{00A2}",
        "pound" => "\u{00A3}",
        "curren" => "\u{00A4}",
        "yen" => "\u{00A5}",
        "brvbar" => "\u{00A6}",
        "sect" => "\u{00A7}",
        "uml" => "\u{00A8}",
        "copy" => "\u{00A9}",
        "ordf" => "\u{00AA}",
        "laquo" => "\u{00AB}",
        "not" => "\u{00AC}",
        "shy" => "\u{00AD}",
        "reg" => "\u{00AE}",
        "macr" => "\u{00AF}",
        "deg" => "\u{00B0}",
        "plusmn" => "\u{00B1}",
        "sup2" => "\u{00B2}",
        "sup3" => "\u{00B3}",
        "acute" => "\u{00B4}",
        "micro" => "\u{00B5}",
        "para" => "\u{00B6}",
        "middot" => "\u{00B7}",
        "cedil" => "\u{00B8}",
        "sup1" => "\u{00B9}",
        "ordm" => "\u{00BA}",
        "raquo" => "\u{00BB}",
        "frac14" => "\u{00BC}",
        "frac12" => "\u{00BD}",
        "frac34" => "\u{00BE}",
        "iquest" => "\u{00BF}",
        "times" => "\u{00D7}",
        "divide" => "\u{00F7}",
        // Latin-1 letters
        "Agrave" => "\u{00C0}",
        "Aacute" => "\u{00C1}",
        "Acirc" => "\u{00C2}",
        "Atilde" => "\u{00C3}",
        "Auml" => "\u{00C4}",
        "Aring" => "\u{00C5}",
        "AElig" => "\u{00C6}",
        "Ccedil" => "\u{00C7}",
        "Egrave" => "\u{00C8}",
        "Eacute" => "\u{00C9}",
        "Ecirc" => "\u{00CA}",
        "Euml" => "\u{00CB}",
        "Igrave" => "\u{00CC}",
        "Iacute" => "\u{00CD}",
        "Icirc" => "\u{00CE}",
        "Iuml" => "\u{00CF}",
        "ETH" => "\u{00D0}",
        "Ntilde" => "\u{00D1}",
        "Ograve" => "\u{00D2}",
        "Oacute" => "\u{00D3}",
        "Ocirc" => "\u{00D4}",
        "Otilde" => "\u{00D5}",
        "Ouml" => "\u{00D6}",
        "Oslash" => "\u{00D8}",
        "Ugrave" => "\u{00D9}",
        "Uacute" => "\u{00DA}",
        "Ucirc" => "\u{00DB}",
        "Uuml" => "\u{00DC}",
        "Yacute" => "\u{00DD}",
        "THORN" => "\u{00DE}",
        "szlig" => "\u{00DF}",
        "agrave" => "\u{00E0}",
        "aacute" => "\u{00E1}",
        "acirc" => "\u{00E2}",
        "atilde" => "\u{00E3}",
        "auml" => "\u{00E4}",
        "aring" => "\u{00E5}",
        "aelig" => "\u{00E6}",
        "ccedil" => "\u{00E7}",
        "egrave" => "\u{00E8}",
        "eacute" => "\u{00E9}",
        "ecirc" => "\u{00EA}",
        "euml" => "\u{00EB}",
        "igrave" => "\u{00EC}",
        "iacute" => "\u{00ED}",
        "icirc" => "\u{00EE}",
        "iuml" => "\u{00EF}",
        "eth" => "\u{00F0}",
        "ntilde" => "\u{00F1}",
        "ograve" => "\u{00F2}",
        "oacute" => "\u{00F3}",
        "ocirc" => "\u{00F4}",
        "otilde" => "\u{00F5}",
        "ouml" => "\u{00F6}",
        "oslash" => "\u{00F8}",
        "ugrave" => "\u{00F9}",
        "uacute" => "\u{00FA}",
        "ucirc" => "\u{00FB}",
        "uuml" => "\u{00FC}",
        "yacute" => "\u{00FD}",
        "thorn" => "\u{00FE}",
        "yuml" => "\u{00FF}",
        "OElig" => "\u{0152}",
        "oelig" => "\u{0153}",
        "Scaron" => "\u{0160}",
        "scaron" => "\u{0161}",
        "Yuml" => "\u{0178}",
        "fnof" => "\u{0192}",
        "circ" => "\u{02C6}",
        "tilde" => "\u{02DC}",
        // Greek
        "Alpha" => "\u{0391}",
        "Beta" => "\u{0392}",
        "Gamma" => "\u{0393}",
        "Delta" => "\u{0394}",
        "Theta" => "\u{0398}",
        "Lambda" => "\u{039B}",
        "Pi" => "\u{03A0}",
        "Sigma" => "\u{03A3}",
        "Phi" => "\u{03A6}",
        "Psi" => "\u{03A8}",
        "Omega" => "\u{03A9}",
        "alpha" => "\u{03B1}",
        "beta" => "\u{03B2}",
        "gamma" => "\u{03B3}",
        "delta" => "\u{03B4}",
        "epsilon" => "\u{03B5}",
        "zeta" => "\u{03B6}",
        "eta" => "\u{03B7}",
        "theta" => "\u{03B8}",
        "iota" => "\u{03B9}",
        "kappa" => "\u{03BA}",
        "lambda" => "\u{03BB}",
        "mu" => "\u{03BC}",
        "nu" => "\u{03BD}",
        "xi" => "\u{03BE}",
        "omicron" => "\u{03BF}",
        "pi" => "\u{03C0}",
        "rho" => "\u{03C1}",
        "sigma" => "\u{03C3}",
        "tau" => "\u{03C4}",
        "upsilon" => "\u{03C5}",
        "phi" => "\u{03C6}",
        "chi" => "\u{03C7}",
        "psi" => "\u{03C8}",
        "omega" => "\u{03C9}",
        // Punctuation and symbols
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "zwnj" => "\u{200C}",
        "zwj" => "\u{200D}",
        "lrm" => "\u{200E}",
        "rlm" => "\u{200F}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "sbquo" => "\u{201A}",
        "ldquo" => "\u{201C}",
        "rdquo" => "\u{201D}",
        "bdquo" => "\u{201E}",
        "dagger" => "\u{2020}",
        "Dagger" => "\u{2021}",
        "bull" => "\u{2022}",
        "hellip" => "\u{2026}",
        "permil" => "\u{2030}",
        "prime" => "\u{2032}",
        "Prime" => "\u{2033}",
        "lsaquo" => "\u{2039}",
        "rsaquo" => "\u{203A}",
        "oline" => "\u{203E}",
        "frasl" => "\u{2044}",
        "euro" => "\u{20AC}",
        "trade" => "\u{2122}",
        "larr" => "\u{2190}",
        "uarr" => "\u{2191}",
        "rarr" => "\u{2192}",
        "darr" => "\u{2193}",
        "harr" => "\u{2194}",
        "forall" => "\u{2200}",
        "part" => "\u{2202}",
        "exist" => "\u{2203}",
        "empty" => "\u{2205}",
        "nabla" => "\u{2207}",
        "isin" => "\u{2208}",
        "notin" => "\u{2209}",
        "prod" => "\u{220F}",
        "sum" => "\u{2211}",
        "minus" => "\u{2212}",
        "lowast" => "\u{2217}",
        "radic" => "\u{221A}",
        "infin" => "\u{221E}",
        "and" => "\u{2227}",
        "or" => "\u{2228}",
        "cap" => "\u{2229}",
        "cup" => "\u{222A}",
        "int" => "\u{222B}",
        "asymp" => "\u{2248}",
        "ne" => "\u{2260}",
        "equiv" => "\u{2261}",
        "le" => "\u{2264}",
        "ge" => "\u{2265}",
        "loz" => "\u{25CA}",
        "spades" => "\u{2660}",
        "clubs" => "\u{2663}",
        "hearts" => "\u{2665}",
        "diams" => "\u{2666}",
        _ => return None,
    };
    Some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(text: &str, mode: UnknownEntityMode) -> (String, usize) {
        let mut diagnostics = Vec::new();
        let out = decode_entities(text, mode, &mut diagnostics);
        (out, diagnostics.len())
    }

    #[test]
    fn test_named_and_numeric_references() {
        let (out, issues) = decode("a &amp; b &lt;&gt; &#65;&#x42;&copy;&mdash;", UnknownEntityMode::Literal);
        assert_eq!(out, "a & b <> AB\u{00A9}\u{2014}");
        assert_eq!(issues, 0);
    }

    #[test]
    fn test_unterminated_ampersand_is_text() {
        let (out, issues) = decode("AT&T & co &amp", UnknownEntityMode::Literal);
        assert_eq!(out, "AT&T & co &amp");
        assert_eq!(issues, 0);
    }

    #[test]
    fn test_unknown_reference_modes() {
        let (literal, issues) = decode("x &bogus; y", UnknownEntityMode::Literal);
        assert_eq!(literal, "x &bogus; y");
        assert_eq!(issues, 1);

        let (replaced, issues) = decode("x &bogus; y &#0;", UnknownEntityMode::Placeholder('?'));
        assert_eq!(replaced, "x ? y ?");
        assert_eq!(issues, 2);
    }

    #[test]
    fn test_non_ascii_text_survives() {
        let (out, _) = decode("café &eacute; \u{1F600}", UnknownEntityMode::Literal);
        assert_eq!(out, "café é \u{1F600}");
    }

    #[test]
    fn test_mode_from_config_strings() {
        let literal: UnknownEntityMode = serde_json::from_str("\"literal\"").unwrap();
        assert_eq!(literal, UnknownEntityMode::Literal);
        let default_placeholder: UnknownEntityMode = serde_json::from_str("\"placeholder\"").unwrap();
        assert_eq!(default_placeholder, UnknownEntityMode::Placeholder('\u{FFFD}'));
        let custom: UnknownEntityMode = serde_json::from_str("\"*\"").unwrap();
        assert_eq!(custom, UnknownEntityMode::Placeholder('*'));
        assert!(serde_json::from_str::<UnknownEntityMode>("\"stars\"").is_err());
    }
}
