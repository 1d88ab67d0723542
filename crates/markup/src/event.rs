use indexmap::IndexMap;

/// Attribute names in source order, lower-cased, first occurrence kept.
pub type Attributes = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DocumentStart,
    DocumentEnd,
    ElementStart { tag: String, attributes: Attributes },
    Text(String),
    ElementEnd { tag: String },
}

impl Event {
    pub fn start(tag: impl Into<String>) -> Self {
        Event::ElementStart {
            tag: tag.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn end(tag: impl Into<String>) -> Self {
        Event::ElementEnd { tag: tag.into() }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            Event::ElementStart { tag, .. } | Event::ElementEnd { tag } => Some(tag),
            _ => None,
        }
    }
}
