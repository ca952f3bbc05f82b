//! Chat feed: the context object that ties sessions, the per-connection
//! asset cache and the resolver together for one channel.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    asset::AssetKey,
    cache::{AssetCache, AssetLoader},
    censor::should_censor,
    config::ChatConfig,
    events::ChatEvent,
    protocol::{ChatMessage, Rgb},
    resolver::MessageResolver,
    session::SessionTable,
    sprite::{characters, SpriteUnit},
};

/// One resolved line ready for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatLine {
    pub author: String,
    pub color: Option<Rgb>,
    pub units: Vec<SpriteUnit>,
    pub first_post: bool,
    pub censored: bool,
    pub at: DateTime<Utc>,
}

pub struct ChatFeed {
    config: ChatConfig,
    ignore_users: HashSet<String>,
    loader: Arc<dyn AssetLoader>,
    sessions: SessionTable,
    resolver: MessageResolver,
    lines: Vec<ChatLine>,
    channel: Option<String>,
}

impl ChatFeed {
    pub fn new(config: ChatConfig, loader: Arc<dyn AssetLoader>) -> Self {
        let ignore_users = config
            .ignore_users
            .iter()
            .map(|value| value.trim().to_lowercase())
            .filter(|value| !value.is_empty())
            .collect();
        let resolver = MessageResolver::new(AssetCache::new(Arc::clone(&loader)));
        Self {
            config,
            ignore_users,
            loader,
            sessions: SessionTable::new(),
            resolver,
            lines: Vec::new(),
            channel: None,
        }
    }

    /// Newest first.
    pub fn lines(&self) -> &[ChatLine] {
        &self.lines
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn cache(&self) -> &AssetCache {
        self.resolver.cache()
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn handle_event(&mut self, event: ChatEvent) -> Option<&ChatLine> {
        match event {
            ChatEvent::Connected { channel, .. } => {
                self.start_session(channel);
                None
            }
            ChatEvent::Disconnected { reason, .. } => {
                self.end_session(&reason);
                None
            }
            ChatEvent::Message { message, at } => self.handle_message(message, at),
        }
    }

    /// Begins a connection session: post counts reset and a fresh cache.
    pub fn start_session(&mut self, channel: String) {
        info!(channel = %channel, users = self.sessions.len(), "chat session started");
        self.sessions.reset_all(self.config.reset_policy());
        self.resolver = MessageResolver::new(AssetCache::new(Arc::clone(&self.loader)));
        self.channel = Some(channel);
    }

    /// Drops the connection's cache. Sessions stay for the reconnect.
    pub fn end_session(&mut self, reason: &str) {
        info!(reason = %reason, "chat session ended");
        self.resolver.cache().clear();
        self.channel = None;
    }

    /// Forgets every user and asset, e.g. when switching channels.
    pub fn teardown(&mut self) {
        self.sessions.clear();
        self.resolver.cache().clear();
        self.lines.clear();
        self.channel = None;
    }

    pub fn clear_username_cases(&mut self) {
        self.sessions.clear_username_cases();
    }

    /// Lets a failed asset load again on its next use.
    pub fn retry_asset(&self, key: &AssetKey) {
        self.resolver.cache().invalidate(key);
    }

    /// Resolves a locally typed message through the normal path.
    pub fn post_manual(&mut self, username: &str, text: &str) -> Option<&ChatLine> {
        self.handle_message(ChatMessage::plain(username, text), Utc::now())
    }

    pub fn handle_message(
        &mut self,
        message: ChatMessage,
        at: DateTime<Utc>,
    ) -> Option<&ChatLine> {
        if self.config.ignore_special && message.text.starts_with('!') {
            return None;
        }
        if self
            .ignore_users
            .contains(&message.username.trim().to_lowercase())
        {
            return None;
        }

        let session = self.sessions.apply_metadata(
            &message.username,
            &message.display_name,
            &message.metadata,
        );
        let units = match self
            .resolver
            .resolve(&message.text, message.emotes.values(), session)
        {
            Ok(units) => units,
            Err(err) => {
                debug!(%err, user = %message.username, "message not resolved");
                return None;
            }
        };

        let post_count = session.post_count();
        let censored = should_censor(&self.config.censor, post_count, &message.text);
        let units = if censored {
            info!(user = %message.username, "censoring link in first message");
            let mut kept: Vec<SpriteUnit> =
                units.into_iter().take_while(SpriteUnit::is_badge).collect();
            kept.extend(characters(&self.config.censor.replacement_text));
            kept
        } else {
            units
        };

        self.lines.insert(
            0,
            ChatLine {
                author: session.display_name().to_owned(),
                color: session.color(),
                units,
                first_post: post_count == 1,
                censored,
                at,
            },
        );
        self.lines.truncate(self.config.max_chat_items.max(1));
        self.lines.first()
    }
}
