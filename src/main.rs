use std::sync::Arc;

use anyhow::{Context, Result};
use chat_sprites::{
    config::ChatConfig,
    events::ChatEvent,
    feed::ChatFeed,
    loader::HttpAssetLoader,
    sprite::render_plain,
    workers::{normalize_channel, spawn_twitch_worker, TwitchWorkerConfig},
};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (mut config, config_path) = ChatConfig::load_or_create()?;
    info!(path = %config_path.display(), "loaded config");
    if let Some(channel) = std::env::args()
        .nth(1)
        .or_else(|| env_value("CHAT_SPRITES_CHANNEL"))
    {
        config.channel = Some(channel);
    }
    let channel = config
        .channel
        .as_deref()
        .map(normalize_channel)
        .filter(|value| !value.is_empty())
        .with_context(|| {
            format!(
                "no channel configured; pass one as an argument or set it in {}",
                config_path.display()
            )
        })?;

    let loader = Arc::new(HttpAssetLoader::new(config.assets.clone())?);
    let (tx, rx) = crossbeam_channel::unbounded::<ChatEvent>();
    let worker = spawn_twitch_worker(
        TwitchWorkerConfig {
            channel,
            nick: config.nick.clone(),
        },
        tx,
    );

    let mut feed = ChatFeed::new(config, loader);
    let printer = tokio::task::spawn_blocking(move || {
        for event in rx.iter() {
            if let Some(line) = feed.handle_event(event) {
                let color = line.color.map(|c| c.to_string()).unwrap_or_default();
                info!(
                    author = %line.author,
                    color = %color,
                    first_post = line.first_post,
                    censored = line.censored,
                    "{}",
                    render_plain(&line.units)
                );
            }
        }
    });

    tokio::select! {
        result = worker => {
            if let Err(err) = result {
                warn!(?err, "twitch worker task failed");
            }
        }
        result = printer => {
            if let Err(err) = result {
                warn!(?err, "chat feed task failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
        }
    }
    Ok(())
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
