//! Media query evaluation for `@media` and `@import`.
//!
//! Only media types are understood. A query that carries a feature expression
//! such as `(min-width: 600px)` never matches.

/// Whether a comma-separated media query list matches `medium`.
/// An empty list matches everything.
pub fn media_matches(list: &str, medium: &str) -> bool {
    let list = list.trim();
    if list.is_empty() {
        return true;
    }
    list.split(',').any(|query| query_matches(query, medium))
}

fn query_matches(query: &str, medium: &str) -> bool {
    let lowered = query.trim().to_ascii_lowercase();
    if lowered.contains('(') {
        return false;
    }
    let mut words = lowered.split_whitespace().peekable();
    let negated = match words.peek() {
        Some(&"not") => {
            words.next();
            true
        }
        Some(&"only") => {
            words.next();
            false
        }
        _ => false,
    };
    let Some(media_type) = words.next() else {
        return false;
    };
    if words.next().is_some() {
        log::debug!("Media query '{}' not understood; treated as non-matching", query.trim());
        return false;
    }
    let matched = media_type == "all" || media_type.eq_ignore_ascii_case(medium);
    matched != negated
}
