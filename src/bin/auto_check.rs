#![forbid(unsafe_code)]

//! Polls every configured channel once: fetches channel stats and uploads,
//! classifies each video, records the histories and reports crossed
//! milestones. Meant to be fired by an external scheduler; one invocation is
//! one run.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Local;
use log::{info, warn};
use tubepulse_tools::classify::{self, ClassifiedVideo, OVERRIDES_FILE, TypeOverrides};
use tubepulse_tools::config::{ChannelTarget, CheckConfig, ConfigOverrides, resolve_config};
use tubepulse_tools::notify::{LogNotifier, Notifier, achievement_body, achievement_subject};
use tubepulse_tools::runner::{RunOutcome, record_channel_run};
use tubepulse_tools::shorts::{HttpShortsProbe, ShortsProbe, probe_batch};
use tubepulse_tools::store::TIMESTAMP_FORMAT;
use tubepulse_tools::youtube::YouTubeClient;

#[derive(Debug, Clone)]
struct CheckArgs {
    data_dir: Option<PathBuf>,
    env_file: Option<PathBuf>,
}

impl CheckArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut data_dir: Option<PathBuf> = None;
        let mut env_file: Option<PathBuf> = None;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--data-dir=") {
                data_dir = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--env-file=") {
                env_file = Some(PathBuf::from(value));
                continue;
            }

            match arg.as_str() {
                "--data-dir" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--data-dir requires a value"))?;
                    data_dir = Some(PathBuf::from(value));
                }
                "--env-file" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--env-file requires a value"))?;
                    env_file = Some(PathBuf::from(value));
                }
                _ => {
                    bail!("unknown argument: {arg}");
                }
            }
        }

        Ok(Self { data_dir, env_file })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = CheckArgs::parse()?;
    let config = resolve_config(ConfigOverrides {
        data_dir: args.data_dir,
        env_path: args.env_file,
    })?;
    if config.channels.is_empty() {
        bail!("no channels configured; set CHANNELS to a JSON list of {{name, url}} entries");
    }

    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    info!(
        "poll started at {timestamp} for {} channel(s)",
        config.channels.len()
    );
    for target in &config.channels {
        info!("  - {}", target.name);
    }

    let overrides = classify::load_type_overrides(&config.data_dir.join(OVERRIDES_FILE));
    let client = YouTubeClient::new(config.api_key.clone());
    let probe: Arc<dyn ShortsProbe> = Arc::new(HttpShortsProbe::new());
    let notifier = LogNotifier;

    let mut succeeded = 0usize;
    for target in &config.channels {
        match update_channel(
            &client,
            Arc::clone(&probe),
            &config,
            &overrides,
            target,
            &timestamp,
        )
        .await
        {
            Ok(outcome) => {
                succeeded += 1;
                report(target, &outcome, config.notify, &notifier);
            }
            Err(err) => warn!("channel {} failed: {err:#}", target.name),
        }
    }

    info!(
        "poll finished: {succeeded}/{} channel(s) updated",
        config.channels.len()
    );
    Ok(())
}

/// Runs one channel end to end. Any fetch error aborts before the stores
/// are touched; other channels keep going.
async fn update_channel(
    client: &YouTubeClient,
    probe: Arc<dyn ShortsProbe>,
    config: &CheckConfig,
    overrides: &TypeOverrides,
    target: &ChannelTarget,
    timestamp: &str,
) -> Result<RunOutcome> {
    info!("processing channel {}", target.name);
    let channel_id = client
        .channel_id_for(&target.url)
        .with_context(|| format!("resolving channel id for {}", target.name))?;
    let stats = client.channel_stats(&channel_id, timestamp)?;
    info!(
        "  {}: {} subscriber(s), {} total view(s), {} video(s)",
        stats.name, stats.subscribers, stats.total_views, stats.video_count
    );

    let videos =
        fetch_classified_videos(client, probe, &channel_id, &target.name, overrides).await?;
    if videos.is_empty() {
        bail!("no videos returned for {}", target.name);
    }

    record_channel_run(&config.data_dir, &target.name, &stats, &videos, timestamp)
}

/// Pages through the uploads playlist, probing each page for shorts in
/// parallel before classifying it.
async fn fetch_classified_videos(
    client: &YouTubeClient,
    probe: Arc<dyn ShortsProbe>,
    channel_id: &str,
    channel_name: &str,
    overrides: &TypeOverrides,
) -> Result<Vec<ClassifiedVideo>> {
    let playlist_id = client.uploads_playlist(channel_id)?;
    let mut videos = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let (page_ids, next) = client.playlist_page(&playlist_id, page_token.as_deref())?;
        let details = client.video_details(&page_ids)?;
        let short_cache: HashMap<String, bool> =
            probe_batch(Arc::clone(&probe), &page_ids).await;

        for info in &details {
            let video_type = classify::classify_video(
                info,
                Some(&short_cache),
                overrides,
                channel_name,
                probe.as_ref(),
            );
            videos.push(ClassifiedVideo::from_info(info, video_type));
        }
        info!("  fetched {} video(s) so far", videos.len());

        match next {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(videos)
}

fn report(target: &ChannelTarget, outcome: &RunOutcome, notify: bool, notifier: &dyn Notifier) {
    if !outcome.type_changes.is_empty() {
        info!(
            "  {} type correction(s) for {}",
            outcome.type_changes.len(),
            target.name
        );
    }

    if outcome.achievements.is_empty() {
        info!("  no new milestones for {}", target.name);
        return;
    }

    info!(
        "  {} milestone(s) reached for {}",
        outcome.achievements.len(),
        target.name
    );
    for achievement in &outcome.achievements {
        info!(
            "    {}: {} passed {} [{}]",
            achievement.title, achievement.metric, achievement.threshold, achievement.video_type
        );
    }

    if notify {
        let subject = achievement_subject(&target.name, &outcome.achievements);
        let body = achievement_body(&target.name, &outcome.achievements);
        if let Err(err) = notifier.send(&subject, &body) {
            warn!("notification failed for {}: {err:#}", target.name);
        }
    }
}
