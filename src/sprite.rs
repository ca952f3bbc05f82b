use std::fmt;

use crate::asset::AssetKey;

/// One renderable position in a resolved message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpriteUnit {
    Character(char),
    EmoteRef(AssetKey),
    BadgeRef(AssetKey),
}

impl SpriteUnit {
    pub fn is_badge(&self) -> bool {
        matches!(self, Self::BadgeRef(_))
    }
}

impl fmt::Display for SpriteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Character(ch) => write!(f, "{ch}"),
            Self::EmoteRef(_) => f.write_str("[E]"),
            Self::BadgeRef(_) => f.write_str("[B]"),
        }
    }
}

/// Flattens units into text for logs, with assets as `[E]`/`[B]` markers.
pub fn render_plain(units: &[SpriteUnit]) -> String {
    units.iter().map(ToString::to_string).collect()
}

/// Plain character units for `text`.
pub fn characters(text: &str) -> Vec<SpriteUnit> {
    text.chars().map(SpriteUnit::Character).collect()
}
