//! Resolves live chat messages into sprite units: characters, emotes and
//! badges, with emote and badge images loaded lazily into a shared cache.
//!
//! ```text
//! workers (IRC) ─ChatEvent─▶ ChatFeed ─▶ SessionTable
//!                                 │
//!                                 ▼
//!                          MessageResolver ─▶ AssetCache ─▶ AssetLoader
//!                                 │
//!                                 ▼
//!                          Vec<SpriteUnit> ─▶ renderer
//! ```

pub mod asset;
pub mod cache;
pub mod censor;
pub mod config;
pub mod events;
pub mod feed;
pub mod loader;
pub mod protocol;
pub mod resolver;
pub mod session;
pub mod sprite;
pub mod workers;

pub use asset::{AssetFrameSet, AssetKey, AssetKind};
pub use cache::{AssetCache, AssetLoader, CacheState, FetchCompletion, FetchRequest};
pub use feed::{ChatFeed, ChatLine};
pub use protocol::{ChatMessage, EmoteIndex, EmoteSpan, MessageMetadata, Rgb, UserRole};
pub use resolver::{MessageResolver, ResolveError};
pub use session::{ResetPolicy, SessionTable, UserSession};
pub use sprite::SpriteUnit;
