use std::{io::Cursor, thread, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use image::{codecs::gif::GifDecoder, AnimationDecoder, ImageFormat, RgbaImage};
use tracing::{debug, warn};

use crate::{
    asset::{AssetFrameSet, AssetKey, AssetKind},
    cache::{AssetLoader, FetchCompletion, FetchRequest},
    config::AssetConfig,
};

struct FetchJob {
    request: FetchRequest,
    url: String,
    completion: FetchCompletion,
}

/// Downloads emotes and badges over HTTP on a fixed set of worker threads.
///
/// Workers exit once the loader is dropped and the queue drains.
pub struct HttpAssetLoader {
    jobs: Sender<FetchJob>,
    config: AssetConfig,
}

impl HttpAssetLoader {
    pub fn new(config: AssetConfig) -> Result<Self> {
        let client = build_client(&config)?;
        let (jobs, queue) = crossbeam_channel::unbounded::<FetchJob>();
        let fallback = config.fallback_frame_duration();
        for index in 0..config.fetch_workers() {
            let client = client.clone();
            let queue = queue.clone();
            thread::Builder::new()
                .name(format!("asset-fetch-{index}"))
                .spawn(move || run_fetch_worker(&client, &queue, fallback))
                .context("failed spawning asset fetch worker")?;
        }
        Ok(Self { jobs, config })
    }

    pub fn url_for(&self, key: &AssetKey, kind: AssetKind) -> String {
        asset_url(&self.config, key, kind)
    }
}

/// The blocking client owns an internal runtime, so it is built on a plain
/// thread; building it on an async worker panics.
fn build_client(config: &AssetConfig) -> Result<reqwest::blocking::Client> {
    let builder = reqwest::blocking::Client::builder()
        .timeout(config.fetch_timeout())
        .user_agent(concat!("chat-sprites/", env!("CARGO_PKG_VERSION")));
    thread::spawn(move || builder.build())
        .join()
        .map_err(|_| anyhow!("http client init thread panicked"))?
        .context("http client init failed")
}

pub fn asset_url(config: &AssetConfig, key: &AssetKey, kind: AssetKind) -> String {
    match kind {
        AssetKind::Emote => config.emote_url_template.replace("{id}", key.as_str()),
        AssetKind::Badge => config
            .badge_url_template
            .replace("{set}", key.badge_set())
            .replace("{version}", key.badge_version()),
    }
}

impl AssetLoader for HttpAssetLoader {
    fn fetch(&self, request: FetchRequest, completion: FetchCompletion) {
        let url = self.url_for(&request.key, request.kind);
        let job = FetchJob {
            request,
            url,
            completion,
        };
        if let Err(err) = self.jobs.send(job) {
            let job = err.into_inner();
            warn!(key = %job.request.key, "asset fetch workers are gone");
            job.completion.failed();
        }
    }
}

fn run_fetch_worker(
    client: &reqwest::blocking::Client,
    queue: &Receiver<FetchJob>,
    fallback: Duration,
) {
    for job in queue.iter() {
        let FetchJob {
            request,
            url,
            completion,
        } = job;
        let loaded =
            download(client, &url).and_then(|bytes| decode_asset(&request, &bytes, fallback));
        match loaded {
            Ok(frames) => {
                debug!(key = %request.key, frames = frames.frame_count(), "asset loaded");
                completion.loaded(frames);
            }
            Err(err) => {
                warn!(?err, key = %request.key, url = %url, "asset fetch failed");
                completion.failed();
            }
        }
    }
}

fn download(client: &reqwest::blocking::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("request to {url} failed"))?;
    let status = response.status();
    if !status.is_success() {
        bail!("request to {url} returned {status}");
    }
    let bytes = response
        .bytes()
        .with_context(|| format!("failed reading body of {url}"))?;
    Ok(bytes.to_vec())
}

/// Decodes every frame of an animated GIF, or one frame of anything else.
pub fn decode_asset(
    request: &FetchRequest,
    bytes: &[u8],
    fallback: Duration,
) -> Result<AssetFrameSet> {
    let format = image::guess_format(bytes).context("unrecognized image format")?;
    if format == ImageFormat::Gif {
        let (frames, duration) = decode_gif(bytes, fallback)?;
        return AssetFrameSet::new(request.key.clone(), request.kind, frames, duration)
            .context("animated asset decoded to nothing");
    }

    let frame = image::load_from_memory_with_format(bytes, format)
        .context("failed decoding image")?
        .to_rgba8();
    Ok(AssetFrameSet::single(request.key.clone(), request.kind, frame))
}

fn decode_gif(bytes: &[u8], fallback: Duration) -> Result<(Vec<RgbaImage>, Duration)> {
    let decoder = GifDecoder::new(Cursor::new(bytes)).context("invalid gif header")?;
    let frames = decoder
        .into_frames()
        .collect_frames()
        .context("failed decoding gif frames")?;
    let duration = frames
        .first()
        .map(|frame| {
            let (numer, denom) = frame.delay().numer_denom_ms();
            Duration::from_millis(u64::from(numer / denom.max(1)))
        })
        .filter(|duration| !duration.is_zero())
        .unwrap_or(fallback);
    let images = frames.into_iter().map(|frame| frame.into_buffer()).collect();
    Ok((images, duration))
}
