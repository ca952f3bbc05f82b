use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::asset::AssetKey;

/// Emote occurrence covering chars `begin..=end` of the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmoteSpan {
    pub key: AssetKey,
    pub begin: usize,
    pub end: usize,
}

impl EmoteSpan {
    pub fn new(key: impl Into<AssetKey>, begin: usize, end: usize) -> Self {
        Self {
            key: key.into(),
            begin,
            end,
        }
    }
}

/// Emote spans keyed by begin offset. Iteration order is not offset order.
pub type EmoteIndex = HashMap<usize, EmoteSpan>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    None,
    Moderator,
    Broadcaster,
    GlobalModerator,
    Admin,
    Staff,
}

impl UserRole {
    /// Maps the `user-type` tag; `mod` and the broadcaster badge arrive separately.
    pub fn from_user_type(value: &str) -> Self {
        match value.trim() {
            "mod" => Self::Moderator,
            "global_mod" => Self::GlobalModerator,
            "admin" => Self::Admin,
            "staff" => Self::Staff,
            _ => Self::None,
        }
    }

    /// Badge set shown for this role.
    pub fn badge_set(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Moderator => Some("moderator"),
            Self::Broadcaster => Some("broadcaster"),
            Self::GlobalModerator => Some("global_mod"),
            Self::Admin => Some("admin"),
            Self::Staff => Some("staff"),
        }
    }

    pub fn is_role_badge_set(set: &str) -> bool {
        matches!(
            set,
            "moderator" | "broadcaster" | "global_mod" | "admin" | "staff"
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#RRGGBB`; anything else is rejected.
    pub fn from_hex(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        let hex = trimmed.strip_prefix('#')?;
        if hex.len() != 6 || !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Per-message facts about the author, already extracted from the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub subscriber: bool,
    pub turbo: bool,
    pub role: UserRole,
    pub color: Option<Rgb>,
    pub badges: BTreeSet<AssetKey>,
}

/// One parsed chat message as handed over by the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub display_name: String,
    pub text: String,
    #[serde(default, with = "emote_list")]
    pub emotes: EmoteIndex,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl ChatMessage {
    pub fn plain(username: impl Into<String>, text: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            display_name: username.clone(),
            username,
            text: text.into(),
            emotes: EmoteIndex::new(),
            metadata: MessageMetadata::default(),
        }
    }
}

/// Stores an `EmoteIndex` as a span list ordered by begin offset. Numeric map
/// keys do not survive buffered (internally tagged) deserialization.
mod emote_list {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{EmoteIndex, EmoteSpan};

    pub fn serialize<S: Serializer>(index: &EmoteIndex, serializer: S) -> Result<S::Ok, S::Error> {
        let mut spans: Vec<&EmoteSpan> = index.values().collect();
        spans.sort_by_key(|span| span.begin);
        spans.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<EmoteIndex, D::Error>
    where
        D: Deserializer<'de>,
    {
        let spans = Vec::<EmoteSpan>::deserialize(deserializer)?;
        Ok(spans.into_iter().map(|span| (span.begin, span)).collect())
    }
}

/// Parses the `emotes` tag, e.g. `25:0-4,12-16/1902:6-10`.
///
/// Fragments that do not parse are skipped.
pub fn parse_emotes_tag(value: &str) -> EmoteIndex {
    let mut index = EmoteIndex::new();
    for group in value.split('/') {
        let Some((id, ranges)) = group.split_once(':') else {
            continue;
        };
        let id = id.trim();
        if id.is_empty() {
            continue;
        }
        for range in ranges.split(',') {
            let Some((begin, end)) = range.split_once('-') else {
                continue;
            };
            let (Ok(begin), Ok(end)) =
                (begin.trim().parse::<usize>(), end.trim().parse::<usize>())
            else {
                continue;
            };
            index.insert(begin, EmoteSpan::new(id, begin, end));
        }
    }
    index
}

/// Parses the `badges` tag, e.g. `moderator/1,subscriber/12`.
pub fn parse_badges_tag(value: &str) -> BTreeSet<AssetKey> {
    value
        .split(',')
        .map(str::trim)
        .filter(|badge| !badge.is_empty())
        .map(AssetKey::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_badges_tag, parse_emotes_tag, EmoteSpan, Rgb, UserRole};
    use crate::asset::AssetKey;

    #[test]
    fn parses_emote_tag_with_multiple_ranges() {
        let index = parse_emotes_tag("25:0-4,12-16/1902:6-10");
        assert_eq!(index.len(), 3);
        assert_eq!(index.get(&0), Some(&EmoteSpan::new("25", 0, 4)));
        assert_eq!(index.get(&12), Some(&EmoteSpan::new("25", 12, 16)));
        assert_eq!(index.get(&6), Some(&EmoteSpan::new("1902", 6, 10)));
    }

    #[test]
    fn emote_tag_skips_malformed_fragments() {
        let index = parse_emotes_tag("25:0-x,3-4/:1-2/nocolon/7:9");
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&3), Some(&EmoteSpan::new("25", 3, 4)));
        assert!(parse_emotes_tag("").is_empty());
    }

    #[test]
    fn parses_badges_tag() {
        let badges = parse_badges_tag("moderator/1,subscriber/12,");
        assert_eq!(badges.len(), 2);
        assert!(badges.contains(&AssetKey::new("subscriber/12")));
    }

    #[test]
    fn parses_hex_colors() {
        assert_eq!(Rgb::from_hex("#1E90FF"), Some(Rgb::new(30, 144, 255)));
        assert_eq!(
            Rgb::from_hex("#ffaa00").map(|c| c.to_string()).as_deref(),
            Some("#FFAA00")
        );
        assert_eq!(Rgb::from_hex("1E90FF"), None);
        assert_eq!(Rgb::from_hex("#12345"), None);
        assert_eq!(Rgb::from_hex("nothex"), None);
    }

    #[test]
    fn maps_user_type_tag() {
        assert_eq!(UserRole::from_user_type("mod"), UserRole::Moderator);
        assert_eq!(UserRole::from_user_type("global_mod"), UserRole::GlobalModerator);
        assert_eq!(UserRole::from_user_type(""), UserRole::None);
        assert_eq!(UserRole::Broadcaster.badge_set(), Some("broadcaster"));
        assert!(UserRole::is_role_badge_set("staff"));
        assert!(!UserRole::is_role_badge_set("subscriber"));
    }
}
