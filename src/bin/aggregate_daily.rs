#![forbid(unsafe_code)]

//! Offline compactor for the per-video histories. Every channel found in the
//! data directory gets its multi-sample days collapsed to one record per day,
//! written next to the raw history. The raw file stays untouched so the full
//! resolution is never lost.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use log::info;
use tubepulse_tools::history::aggregate_history;
use tubepulse_tools::store;
use walkdir::WalkDir;

const DAILY_PREFIX: &str = "video_daily_history_";

#[derive(Debug, Clone)]
struct AggregateArgs {
    data_dir: PathBuf,
}

impl AggregateArgs {
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
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--data-dir=") {
                data_dir = Some(PathBuf::from(value));
                continue;
            }
            match arg.as_str() {
                "--data-dir" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--data-dir requires a value"))?;
                    data_dir = Some(PathBuf::from(value));
                }
                _ => {
                    bail!("unknown argument: {arg}");
                }
            }
        }

        Ok(Self {
            data_dir: data_dir.unwrap_or_else(|| PathBuf::from(".")),
        })
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = AggregateArgs::parse()?;
    let channels = find_channels(&args.data_dir)?;
    if channels.is_empty() {
        info!(
            "nothing to do: no {DAILY_PREFIX}*.json files in {}",
            args.data_dir.display()
        );
        return Ok(());
    }

    info!("aggregating {} channel(s)", channels.len());
    for channel in &channels {
        compact_channel(&args.data_dir, channel)?;
    }
    info!("all aggregations complete");
    Ok(())
}

/// Channel names recovered from the daily-history file names in `data_dir`.
fn find_channels(data_dir: &Path) -> Result<Vec<String>> {
    let mut channels = Vec::new();
    for entry in WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if let Some(channel) = name
            .strip_prefix(DAILY_PREFIX)
            .and_then(|rest| rest.strip_suffix(".json"))
        {
            channels.push(channel.to_owned());
        }
    }
    channels.sort();
    Ok(channels)
}

fn compact_channel(data_dir: &Path, channel: &str) -> Result<()> {
    let input = store::daily_history_path(data_dir, channel);
    let history = store::load_daily_history(&input);
    let records_before: usize = history.values().map(|video| video.records.len()).sum();

    let aggregated = aggregate_history(&history);
    let records_after: usize = aggregated.values().map(|video| video.records.len()).sum();

    let output = store::aggregated_path(data_dir, channel);
    store::save_json(&output, &aggregated)
        .with_context(|| format!("writing {}", output.display()))?;

    let reduction = if records_before > 0 {
        100.0 * (1.0 - records_after as f64 / records_before as f64)
    } else {
        0.0
    };
    info!(
        "{channel}: {} video(s), {records_before} -> {records_after} record(s) ({reduction:.1}% less)",
        aggregated.len()
    );
    Ok(())
}
