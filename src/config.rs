use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::ResetPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// `{id}` is replaced by the emote id.
    pub emote_url_template: String,
    /// `{set}` and `{version}` are replaced from the `set/version` badge key.
    pub badge_url_template: String,
    pub fetch_timeout_secs: u64,
    /// Used when an animated image reports a zero frame delay.
    pub fallback_frame_ms: u64,
    /// Download threads shared by every fetch.
    pub fetch_workers: usize,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            emote_url_template: "https://static-cdn.jtvnw.net/emoticons/v2/{id}/default/dark/1.0"
                .to_owned(),
            badge_url_template: "https://static-cdn.jtvnw.net/badges/v1/{set}/{version}/1"
                .to_owned(),
            fetch_timeout_secs: 8,
            fallback_frame_ms: 100,
            fetch_workers: 4,
        }
    }
}

impl AssetConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn fallback_frame_duration(&self) -> Duration {
        Duration::from_millis(self.fallback_frame_ms.max(1))
    }

    pub fn fetch_workers(&self) -> usize {
        self.fetch_workers.clamp(1, 16)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CensorConfig {
    pub censor_first_post_urls: bool,
    pub replacement_text: String,
}

impl Default for CensorConfig {
    fn default() -> Self {
        Self {
            censor_first_post_urls: true,
            replacement_text: "<message censored>".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub channel: Option<String>,
    pub nick: Option<String>,
    pub ignore_special: bool,
    pub ignore_users: Vec<String>,
    pub max_chat_items: usize,
    pub keep_colors_on_reconnect: bool,
    pub assets: AssetConfig,
    pub censor: CensorConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            channel: None,
            nick: None,
            ignore_special: false,
            ignore_users: Vec::new(),
            max_chat_items: 64,
            keep_colors_on_reconnect: true,
            assets: AssetConfig::default(),
            censor: CensorConfig::default(),
        }
    }
}

impl ChatConfig {
    pub fn load_or_create() -> Result<(Self, PathBuf)> {
        let config_dir = dirs::config_dir()
            .context("unable to locate OS config directory")?
            .join("chat-sprites");
        fs::create_dir_all(&config_dir)
            .with_context(|| format!("failed creating config dir at {}", config_dir.display()))?;

        let config_path = config_dir.join("config.json");
        let config = Self::load_or_create_at(&config_path)?;
        Ok((config, config_path))
    }

    pub fn load_or_create_at(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default = Self::default();
            default.save(path)?;
            return Ok(default);
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        serde_json::from_str::<Self>(&text)
            .with_context(|| format!("invalid json in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = serde_json::to_string_pretty(self).context("failed serializing config")?;
        fs::write(path, payload).with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }

    pub fn reset_policy(&self) -> ResetPolicy {
        ResetPolicy {
            keep_colors: self.keep_colors_on_reconnect,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use super::ChatConfig;

    #[test]
    fn parses_partial_config_with_defaults() {
        let raw = r#"{
            "channel": "HornGaming",
            "assets": { "fetch_timeout_secs": 3 }
        }"#;
        let parsed: ChatConfig = serde_json::from_str(raw).expect("config should parse");
        assert_eq!(parsed.channel.as_deref(), Some("HornGaming"));
        assert_eq!(parsed.max_chat_items, 64);
        assert_eq!(parsed.assets.fetch_timeout(), Duration::from_secs(3));
        assert_eq!(parsed.assets.fallback_frame_duration(), Duration::from_millis(100));
        assert!(parsed.assets.emote_url_template.contains("{id}"));
        assert!(parsed.censor.censor_first_post_urls);
        assert!(parsed.reset_policy().keep_colors);
    }

    #[test]
    fn load_or_create_writes_defaults_then_reads_them_back() {
        let dir = std::env::temp_dir().join(format!("chat-sprites-config-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let path = dir.join("config.json");
        let _ = fs::remove_file(&path);

        let created = ChatConfig::load_or_create_at(&path).expect("defaults should be written");
        assert!(path.exists());

        let mut changed = created.clone();
        changed.ignore_users = vec!["nightbot".to_owned()];
        changed.save(&path).expect("config should save");
        let reloaded = ChatConfig::load_or_create_at(&path).expect("config should reload");
        assert_eq!(reloaded.ignore_users, vec!["nightbot".to_owned()]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn rejects_invalid_json() {
        let dir = std::env::temp_dir().join(format!("chat-sprites-bad-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let path = dir.join("config.json");
        fs::write(&path, "{ not json").expect("fixture should write");
        assert!(ChatConfig::load_or_create_at(&path).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
