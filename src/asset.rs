use std::{fmt, time::Duration};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Shortest frame duration an animated asset may use.
pub const MIN_FRAME_DURATION: Duration = Duration::from_millis(10);

/// Identifier the chat service assigns to one emote or badge.
///
/// Emotes use the numeric (or `emotesv2_`) id from the `emotes` tag, badges
/// use `set/version` from the `badges` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetKey(String);

impl AssetKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Badge set name, the part before `/`.
    pub fn badge_set(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }

    /// Badge version, the part after `/`, defaulting to `1`.
    pub fn badge_version(&self) -> &str {
        self.0.split_once('/').map(|(_, version)| version).unwrap_or("1")
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for AssetKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for AssetKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Emote,
    Badge,
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset {0} has no frames")]
    NoFrames(AssetKey),
}

/// Decoded frames for one asset. Never mutated once built.
#[derive(Debug, Clone)]
pub struct AssetFrameSet {
    key: AssetKey,
    kind: AssetKind,
    frames: Vec<RgbaImage>,
    frame_duration: Duration,
}

impl AssetFrameSet {
    pub fn new(
        key: AssetKey,
        kind: AssetKind,
        frames: Vec<RgbaImage>,
        frame_duration: Duration,
    ) -> Result<Self, AssetError> {
        if frames.is_empty() {
            return Err(AssetError::NoFrames(key));
        }
        Ok(Self {
            key,
            kind,
            frames,
            frame_duration: frame_duration.max(MIN_FRAME_DURATION),
        })
    }

    pub fn single(key: AssetKey, kind: AssetKind, frame: RgbaImage) -> Self {
        Self {
            key,
            kind,
            frames: vec![frame],
            frame_duration: MIN_FRAME_DURATION,
        }
    }

    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn is_badge(&self) -> bool {
        self.kind == AssetKind::Badge
    }

    pub fn frames(&self) -> &[RgbaImage] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }

    pub fn is_static(&self) -> bool {
        self.frames.len() == 1
    }

    /// Index of the frame showing after `elapsed` of looping playback.
    pub fn frame_at(&self, elapsed: Duration) -> usize {
        if self.is_static() {
            return 0;
        }
        let step = self.frame_duration.as_millis().max(1);
        let ticks = elapsed.as_millis() / step;
        (ticks % self.frames.len() as u128) as usize
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::{Rgba, RgbaImage};

    use super::{AssetFrameSet, AssetKey, AssetKind};

    fn frames(count: usize) -> Vec<RgbaImage> {
        (0..count)
            .map(|i| RgbaImage::from_pixel(2, 2, Rgba([i as u8, 0, 0, 255])))
            .collect()
    }

    #[test]
    fn rejects_empty_frame_list() {
        let result = AssetFrameSet::new(
            AssetKey::new("25"),
            AssetKind::Emote,
            Vec::new(),
            Duration::from_millis(100),
        );
        assert!(result.is_err());
    }

    #[test]
    fn frame_at_loops_over_frames() {
        let set = AssetFrameSet::new(
            AssetKey::new("25"),
            AssetKind::Emote,
            frames(3),
            Duration::from_millis(100),
        )
        .expect("three frames should build");
        assert!(!set.is_static());
        assert_eq!(set.frame_at(Duration::ZERO), 0);
        assert_eq!(set.frame_at(Duration::from_millis(150)), 1);
        assert_eq!(set.frame_at(Duration::from_millis(250)), 2);
        assert_eq!(set.frame_at(Duration::from_millis(300)), 0);
    }

    #[test]
    fn single_frame_is_always_frame_zero() {
        let set = AssetFrameSet::single(
            AssetKey::new("moderator/1"),
            AssetKind::Badge,
            RgbaImage::new(1, 1),
        );
        assert!(set.is_static());
        assert!(set.is_badge());
        assert_eq!(set.frame_at(Duration::from_secs(99)), 0);
    }

    #[test]
    fn badge_key_splits_set_and_version() {
        let key = AssetKey::new("subscriber/12");
        assert_eq!(key.badge_set(), "subscriber");
        assert_eq!(key.badge_version(), "12");
        assert_eq!(AssetKey::new("turbo").badge_version(), "1");
    }
}
