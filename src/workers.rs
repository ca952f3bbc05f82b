use std::collections::HashMap;

use anyhow::Result;
use chrono::Utc;
use crossbeam_channel::Sender;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    task::JoinHandle,
    time::{sleep, Duration},
};
use tracing::{info, warn};

use crate::{
    events::ChatEvent,
    protocol::{
        parse_badges_tag, parse_emotes_tag, ChatMessage, MessageMetadata, Rgb, UserRole,
    },
};

#[derive(Debug, Clone)]
pub struct TwitchWorkerConfig {
    pub channel: String,
    pub nick: Option<String>,
}

pub fn spawn_twitch_worker(config: TwitchWorkerConfig, tx: Sender<ChatEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_twitch_loop(config, tx).await;
    })
}

async fn run_twitch_loop(config: TwitchWorkerConfig, tx: Sender<ChatEvent>) {
    let channel = normalize_channel(&config.channel);
    if channel.is_empty() {
        warn!("twitch worker started but channel is empty");
        return;
    }
    info!(channel = %channel, "starting twitch worker");

    loop {
        let reason = match TcpStream::connect(("irc.chat.twitch.tv", 6667)).await {
            Ok(stream) => {
                let nick = config
                    .nick
                    .clone()
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(random_justinfan_nick);
                match run_twitch_session(stream, &channel, &nick, &tx).await {
                    Ok(SessionEnd::ReceiverDropped) => {
                        warn!("chat receiver dropped; stopping twitch worker");
                        return;
                    }
                    Ok(SessionEnd::Closed) => "connection closed".to_owned(),
                    Err(err) => {
                        warn!(?err, channel = %channel, "twitch worker disconnected");
                        format!("{err:#}")
                    }
                }
            }
            Err(err) => {
                warn!(?err, channel = %channel, "twitch worker failed to connect");
                format!("connect failed: {err}")
            }
        };

        let event = ChatEvent::Disconnected {
            reason,
            at: Utc::now(),
        };
        if tx.send(event).is_err() {
            return;
        }
        sleep(Duration::from_secs(5)).await;
    }
}

enum SessionEnd {
    Closed,
    ReceiverDropped,
}

async fn run_twitch_session(
    stream: TcpStream,
    channel: &str,
    nick: &str,
    tx: &Sender<ChatEvent>,
) -> Result<SessionEnd> {
    let (read_half, mut write_half) = stream.into_split();
    write_line(
        &mut write_half,
        "CAP REQ :twitch.tv/tags twitch.tv/commands",
    )
    .await?;
    write_line(&mut write_half, "PASS oauth:kappa").await?;
    write_line(&mut write_half, &format!("NICK {nick}")).await?;
    write_line(&mut write_half, &format!("JOIN #{channel}")).await?;

    let mut lines = BufReader::new(read_half).lines();
    info!(channel = %channel, nick = %nick, "twitch worker connected");
    let connected = ChatEvent::Connected {
        channel: channel.to_owned(),
        at: Utc::now(),
    };
    if tx.send(connected).is_err() {
        return Ok(SessionEnd::ReceiverDropped);
    }
    while let Some(line) = lines.next_line().await? {
        let line = line.trim_end_matches('\r');
        if let Some(token) = line.strip_prefix("PING ") {
            write_line(&mut write_half, &format!("PONG {token}")).await?;
            continue;
        }
        if let Some(message) = parse_privmsg(line, channel) {
            let event = ChatEvent::Message {
                message,
                at: Utc::now(),
            };
            if tx.send(event).is_err() {
                return Ok(SessionEnd::ReceiverDropped);
            }
        }
    }
    Ok(SessionEnd::Closed)
}

async fn write_line(writer: &mut tokio::net::tcp::OwnedWriteHalf, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\r\n").await?;
    Ok(())
}

fn parse_privmsg(line: &str, expected_channel: &str) -> Option<ChatMessage> {
    let (tags, payload) = parse_irc_tags(line);
    let mut parts = payload.splitn(4, ' ');
    let prefix = parts.next()?;
    let command = parts.next()?;
    let target = parts.next()?;
    let trailing = parts.next()?;

    if !prefix.starts_with(':') || command != "PRIVMSG" {
        return None;
    }
    if normalize_channel(target) != expected_channel {
        return None;
    }

    let username = prefix[1..]
        .split('!')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if username.is_empty() {
        return None;
    }
    // Emote offsets index the untrimmed text.
    let text = trailing.strip_prefix(':').unwrap_or(trailing);
    let display_name = tags
        .get("display-name")
        .filter(|value| !value.is_empty())
        .cloned()
        .unwrap_or_else(|| username.clone());

    Some(ChatMessage {
        username,
        display_name,
        text: text.to_owned(),
        emotes: tags
            .get("emotes")
            .map(|value| parse_emotes_tag(value))
            .unwrap_or_default(),
        metadata: parse_metadata(&tags),
    })
}

fn parse_metadata(tags: &HashMap<String, String>) -> MessageMetadata {
    let flag = |name: &str| tags.get(name).is_some_and(|value| value == "1");
    let badges = tags
        .get("badges")
        .map(|value| parse_badges_tag(value))
        .unwrap_or_default();
    let has_badge = |set: &str| badges.iter().any(|badge| badge.badge_set() == set);

    let mut role = tags
        .get("user-type")
        .map(|value| UserRole::from_user_type(value))
        .unwrap_or_default();
    if has_badge("broadcaster") {
        role = UserRole::Broadcaster;
    } else if role == UserRole::None && flag("mod") {
        role = UserRole::Moderator;
    }

    MessageMetadata {
        subscriber: flag("subscriber") || has_badge("subscriber"),
        turbo: flag("turbo") || has_badge("turbo"),
        role,
        color: tags.get("color").and_then(|value| Rgb::from_hex(value)),
        badges,
    }
}

fn parse_irc_tags(line: &str) -> (HashMap<String, String>, &str) {
    let Some(stripped) = line.strip_prefix('@') else {
        return (HashMap::new(), line);
    };
    let Some(space_idx) = stripped.find(' ') else {
        return (HashMap::new(), line);
    };

    let tags_part = &stripped[..space_idx];
    let payload = &stripped[(space_idx + 1)..];
    let mut tags = HashMap::new();
    for pair in tags_part.split(';') {
        let Some(eq_idx) = pair.find('=') else {
            continue;
        };
        let key = &pair[..eq_idx];
        let value = decode_irc_tag_value(&pair[(eq_idx + 1)..]);
        tags.insert(key.to_owned(), value);
    }
    (tags, payload)
}

fn decode_irc_tag_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('s') => out.push(' '),
            Some(':') => out.push(';'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

pub fn normalize_channel(value: &str) -> String {
    value.trim().trim_start_matches('#').to_ascii_lowercase()
}

fn random_justinfan_nick() -> String {
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|value| value.as_millis() % 90000)
        .unwrap_or(0);
    format!("justinfan{}", 10000 + seed)
}
