//! The subset of the CSS `display` property the converter acts on.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Display {
    #[default]
    Inline,
    Block,
    ListItem,
    Table,
    TableRow,
    TableCell,
    None,
}

impl Display {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "inline" | "inline-block" => Some(Display::Inline),
            "block" | "flex" | "grid" => Some(Display::Block),
            "list-item" => Some(Display::ListItem),
            "table" => Some(Display::Table),
            "table-row" => Some(Display::TableRow),
            "table-cell" => Some(Display::TableCell),
            "none" => Some(Display::None),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Display::None)
    }
}
