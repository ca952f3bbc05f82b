use std::collections::{BTreeSet, HashMap};

use crate::{
    asset::AssetKey,
    protocol::{MessageMetadata, Rgb, UserRole},
};

/// What survives a reconnect besides identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResetPolicy {
    pub keep_colors: bool,
}

/// Per-username state for one connection session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    display_name: String,
    post_count: u32,
    color: Option<Rgb>,
    subscriber: bool,
    turbo: bool,
    role: UserRole,
    badges: BTreeSet<AssetKey>,
}

impl UserSession {
    fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_owned(),
            post_count: 0,
            color: None,
            subscriber: false,
            turbo: false,
            role: UserRole::None,
            badges: BTreeSet::new(),
        }
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn post_count(&self) -> u32 {
        self.post_count
    }

    pub fn color(&self) -> Option<Rgb> {
        self.color
    }

    pub fn is_subscriber(&self) -> bool {
        self.subscriber
    }

    pub fn is_turbo(&self) -> bool {
        self.turbo
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn badges(&self) -> &BTreeSet<AssetKey> {
        &self.badges
    }

    pub(crate) fn increment_post_count(&mut self) {
        self.post_count = self.post_count.saturating_add(1);
    }

    /// Merges one message's facts: flags and role are replaced, badges only
    /// accumulate, and a missing color never clears a known one.
    pub fn apply_metadata(&mut self, metadata: &MessageMetadata) {
        self.subscriber = metadata.subscriber;
        self.turbo = metadata.turbo;
        self.role = metadata.role;
        if let Some(color) = metadata.color {
            self.color = Some(color);
        }
        self.badges.extend(metadata.badges.iter().cloned());
    }

    fn reset(&mut self, identity: &str, policy: ResetPolicy) {
        let color = self.color.filter(|_| policy.keep_colors);
        *self = Self::new(identity);
        self.color = color;
    }
}

/// Sessions keyed by lowercase username.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<String, UserSession>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn identity(username: &str) -> String {
        username.trim().to_lowercase()
    }

    /// Looks a user up case-insensitively, adopting the casing given here for display.
    pub fn get_or_create(&mut self, username: &str) -> &mut UserSession {
        self.entry(username, username)
    }

    /// Looks a user up by login while displaying them as `display_name`,
    /// which may be a localized name unrelated to the login.
    pub fn get_or_create_as(&mut self, login: &str, display_name: &str) -> &mut UserSession {
        self.entry(login, display_name)
    }

    fn entry(&mut self, login: &str, display_name: &str) -> &mut UserSession {
        let login = login.trim();
        let display = match display_name.trim() {
            "" => login,
            display => display,
        };
        let session = self
            .sessions
            .entry(Self::identity(login))
            .or_insert_with(|| UserSession::new(display));
        if session.display_name != display {
            session.display_name = display.to_owned();
        }
        session
    }

    pub fn get(&self, username: &str) -> Option<&UserSession> {
        self.sessions.get(&Self::identity(username))
    }

    pub fn apply_metadata(
        &mut self,
        login: &str,
        display_name: &str,
        metadata: &MessageMetadata,
    ) -> &mut UserSession {
        let session = self.get_or_create_as(login, display_name);
        session.apply_metadata(metadata);
        session
    }

    /// Starts a new connection session; identities stay, transient state goes.
    pub fn reset_all(&mut self, policy: ResetPolicy) {
        for (identity, session) in &mut self.sessions {
            session.reset(identity, policy);
        }
    }

    /// Forgets display casing only.
    pub fn clear_username_cases(&mut self) {
        for (identity, session) in &mut self.sessions {
            session.display_name.clone_from(identity);
        }
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{ResetPolicy, SessionTable};
    use crate::{
        asset::AssetKey,
        protocol::{MessageMetadata, Rgb, UserRole},
    };

    fn metadata(color: Option<Rgb>, badges: &[&str]) -> MessageMetadata {
        MessageMetadata {
            subscriber: true,
            turbo: false,
            role: UserRole::Moderator,
            color,
            badges: badges.iter().map(|b| AssetKey::new(*b)).collect(),
        }
    }

    #[test]
    fn lookups_ignore_case_but_track_latest_casing() {
        let mut table = SessionTable::new();
        table.get_or_create("Viewer").increment_post_count();
        let session = table.get_or_create("VIEWER");
        assert_eq!(session.post_count(), 1);
        assert_eq!(session.display_name(), "VIEWER");
        assert_eq!(table.len(), 1);
        assert!(table.get("viewer").is_some());
    }

    #[test]
    fn identity_follows_login_not_display_name() {
        let mut table = SessionTable::new();
        table
            .apply_metadata("kazuki", "カズキ", &MessageMetadata::default())
            .increment_post_count();
        let session = table.apply_metadata("Kazuki", "KAZUKI", &MessageMetadata::default());
        assert_eq!(session.post_count(), 1);
        assert_eq!(session.display_name(), "KAZUKI");
        assert_eq!(table.len(), 1);
        assert!(table.get("カズキ").is_none());
        assert_eq!(table.get_or_create_as("kazuki", " ").display_name(), "kazuki");
    }

    #[test]
    fn new_sessions_start_empty() {
        let mut table = SessionTable::new();
        let session = table.get_or_create("fresh");
        assert_eq!(session.post_count(), 0);
        assert_eq!(session.color(), None);
        assert_eq!(session.role(), UserRole::None);
        assert!(session.badges().is_empty());
    }

    #[test]
    fn metadata_merges_into_session() {
        let mut table = SessionTable::new();
        let blue = Rgb::new(30, 144, 255);
        table.apply_metadata("ahorn", "Ahorn", &metadata(Some(blue), &["moderator/1"]));
        let session = table.apply_metadata(
            "ahorn",
            "Ahorn",
            &MessageMetadata {
                turbo: true,
                role: UserRole::Staff,
                badges: BTreeSet::from([AssetKey::new("turbo/1")]),
                ..MessageMetadata::default()
            },
        );
        assert_eq!(session.color(), Some(blue));
        assert!(session.is_turbo());
        assert!(!session.is_subscriber());
        assert_eq!(session.role(), UserRole::Staff);
        assert_eq!(session.badges().len(), 2);
    }

    #[test]
    fn later_color_replaces_earlier_one() {
        let mut table = SessionTable::new();
        table.apply_metadata("ahorn", "", &metadata(Some(Rgb::new(1, 2, 3)), &[]));
        let session = table.apply_metadata("ahorn", "", &metadata(Some(Rgb::new(4, 5, 6)), &[]));
        assert_eq!(session.color(), Some(Rgb::new(4, 5, 6)));
    }

    #[test]
    fn reset_all_clears_post_counts_and_keeps_identity() {
        let mut table = SessionTable::new();
        let session = table.apply_metadata(
            "ahorn",
            "Ahorn",
            &metadata(Some(Rgb::new(1, 2, 3)), &["moderator/1"]),
        );
        session.increment_post_count();

        table.reset_all(ResetPolicy { keep_colors: true });
        let session = table.get("ahorn").expect("identity should survive reset");
        assert_eq!(session.post_count(), 0);
        assert_eq!(session.display_name(), "ahorn");
        assert_eq!(session.color(), Some(Rgb::new(1, 2, 3)));
        assert!(session.badges().is_empty());

        table.reset_all(ResetPolicy::default());
        assert_eq!(table.get("ahorn").and_then(|s| s.color()), None);
    }

    #[test]
    fn clear_username_cases_keeps_counts() {
        let mut table = SessionTable::new();
        table.get_or_create("MiXeD").increment_post_count();
        table.clear_username_cases();
        let session = table.get("mixed").expect("session should exist");
        assert_eq!(session.display_name(), "mixed");
        assert_eq!(session.post_count(), 1);
    }
}
