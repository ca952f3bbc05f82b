use std::sync::OnceLock;

use regex::Regex;

use crate::config::CensorConfig;

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?i)\b(?:https?://|www\.)[^\s<>"']+|\b[a-z0-9-]+(?:\.[a-z0-9-]+)*\.(?:com|net|org|tv|gg|io|ly|me|co)(?:/[^\s<>"']*)?\b"#,
        )
        .expect("url regex is valid")
    })
}

/// Whether `text` looks like it carries a link.
pub fn contains_url(text: &str) -> bool {
    url_regex().is_match(text)
}

/// Whether a message from a user on post number `post_count` must be hidden.
pub fn should_censor(config: &CensorConfig, post_count: u32, text: &str) -> bool {
    config.censor_first_post_urls && post_count <= 1 && contains_url(text)
}
