//! Turns message text plus emote offsets into sprite units.
//!
//! Emote offsets address chars of the raw text, so span validation and the
//! cursor walk both run against the raw text, never against the output.

use std::collections::BTreeSet;

use tracing::debug;

use crate::{
    asset::{AssetKey, AssetKind},
    cache::AssetCache,
    protocol::{EmoteSpan, UserRole},
    session::UserSession,
    sprite::SpriteUnit,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("message text is empty")]
    EmptyMessage,
}

/// Display order of a badge: role, then subscriber, then everything else.
fn badge_rank(key: &AssetKey) -> u8 {
    let set = key.badge_set();
    if UserRole::is_role_badge_set(set) {
        0
    } else if set == "subscriber" {
        1
    } else {
        2
    }
}

/// Badges shown ahead of a message, in display order.
pub fn session_badges(session: &UserSession) -> Vec<AssetKey> {
    let mut badges: BTreeSet<AssetKey> = session.badges().clone();
    let has_set = |badges: &BTreeSet<AssetKey>, set: &str| {
        badges.iter().any(|badge| badge.badge_set() == set)
    };
    if let Some(set) = session.role().badge_set() {
        if !has_set(&badges, set) {
            badges.insert(AssetKey::new(format!("{set}/1")));
        }
    }
    if session.is_subscriber() && !has_set(&badges, "subscriber") {
        badges.insert(AssetKey::new("subscriber/0"));
    }
    if session.is_turbo() && !has_set(&badges, "turbo") {
        badges.insert(AssetKey::new("turbo/1"));
    }
    let mut ordered: Vec<AssetKey> = badges.into_iter().collect();
    ordered.sort_by_key(badge_rank);
    ordered
}

/// Spans sorted by begin offset, with malformed and overlapping ones dropped.
///
/// Equal begin offsets keep their input order, so the first one supplied wins.
pub fn plan_spans<'s>(
    spans: impl IntoIterator<Item = &'s EmoteSpan>,
    char_len: usize,
) -> Vec<&'s EmoteSpan> {
    let mut sorted: Vec<&EmoteSpan> = spans.into_iter().collect();
    sorted.sort_by_key(|span| span.begin);

    let mut planned = Vec::with_capacity(sorted.len());
    let mut next_free = 0;
    for span in sorted {
        if span.end < span.begin || span.end >= char_len {
            debug!(
                key = %span.key,
                begin = span.begin,
                end = span.end,
                len = char_len,
                "dropping malformed emote span"
            );
            continue;
        }
        if span.begin < next_free {
            debug!(
                key = %span.key,
                begin = span.begin,
                end = span.end,
                "dropping overlapping emote span"
            );
            continue;
        }
        next_free = span.end + 1;
        planned.push(span);
    }
    planned
}

/// Resolves messages against one connection session's asset cache.
#[derive(Clone)]
pub struct MessageResolver {
    cache: AssetCache,
}

impl MessageResolver {
    pub fn new(cache: AssetCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Badges first, then the text left to right with each emote span
    /// collapsed into one unit. Counts one post for `session` on success.
    pub fn resolve<'s>(
        &self,
        text: &str,
        spans: impl IntoIterator<Item = &'s EmoteSpan>,
        session: &mut UserSession,
    ) -> Result<Vec<SpriteUnit>, ResolveError> {
        if text.is_empty() {
            return Err(ResolveError::EmptyMessage);
        }

        let chars: Vec<char> = text.chars().collect();
        let planned = plan_spans(spans, chars.len());

        let mut units = Vec::with_capacity(chars.len());
        for badge in session_badges(session) {
            self.cache.request(&badge, AssetKind::Badge);
            units.push(SpriteUnit::BadgeRef(badge));
        }

        let mut pending = planned.into_iter().peekable();
        let mut cursor = 0;
        while cursor < chars.len() {
            if let Some(span) = pending.next_if(|span| span.begin == cursor) {
                self.cache.request(&span.key, AssetKind::Emote);
                units.push(SpriteUnit::EmoteRef(span.key.clone()));
                cursor = span.end + 1;
            } else {
                units.push(SpriteUnit::Character(chars[cursor]));
                cursor += 1;
            }
        }

        session.increment_post_count();
        Ok(units)
    }
}
