//! Persistence layer for the per-channel JSON stores.
//!
//! All structs in this module mirror how data is serialized to disk. Four
//! files exist per channel, all living in the data directory:
//!
//! - `video_history_<channel>.json` — latest counts only, used for milestone
//!   comparison on the next poll;
//! - `video_daily_history_<channel>.json` — the growing per-video sample
//!   history;
//! - `video_daily_aggregated_<channel>.json` — the date-compacted copy the
//!   compactor derives from the daily history;
//! - `check_log_<channel>.json` — a rolling log of the last poll runs.
//!
//! Loads are tolerant: a missing file is an empty store, and a corrupt file
//! is treated the same way after a logged warning. Saves go through a
//! temporary file in the target directory and a rename, so readers never
//! observe a half-written store.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::classify::VideoType;
use crate::milestones::Achievement;

/// Timestamp format shared by every store, local time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The run log keeps only this many of the newest entries.
pub const RUN_LOG_CAP: usize = 100;

/// Channel-level aggregates at one point in time. Persisted latest-only;
/// the run log provides the trend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub name: String,
    pub subscribers: u64,
    pub total_views: u64,
    pub video_count: u64,
    pub fetched_at: String,
}

/// Latest counts for one video inside the snapshot store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoTotals {
    pub views: u64,
    pub likes: u64,
    #[serde(rename = "type")]
    pub video_type: VideoType,
}

/// `video_history_<channel>.json`: the channel as of the last poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub timestamp: String,
    pub channel_stats: ChannelStats,
    pub videos: BTreeMap<String, VideoTotals>,
}

/// One timestamped observation of a video's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
}

/// Per-video record inside the daily history: latest metadata plus the
/// append-only sample sequence, insertion order = collection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoHistory {
    pub title: String,
    pub published: String,
    #[serde(rename = "type")]
    pub video_type: VideoType,
    pub records: Vec<Sample>,
}

/// `video_daily_history_<channel>.json` (and its aggregated sibling).
pub type DailyHistory = BTreeMap<String, VideoHistory>;

/// One run-log line: channel stats, per-type counts and what was achieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub timestamp: String,
    pub channel_stats: ChannelStats,
    pub total_videos: usize,
    pub movie_count: usize,
    pub short_count: usize,
    pub archive_count: usize,
    pub achievements: Vec<Achievement>,
}

pub fn snapshot_path(data_dir: &Path, channel: &str) -> PathBuf {
    data_dir.join(format!("video_history_{channel}.json"))
}

pub fn daily_history_path(data_dir: &Path, channel: &str) -> PathBuf {
    data_dir.join(format!("video_daily_history_{channel}.json"))
}

pub fn aggregated_path(data_dir: &Path, channel: &str) -> PathBuf {
    data_dir.join(format!("video_daily_aggregated_{channel}.json"))
}

pub fn run_log_path(data_dir: &Path, channel: &str) -> PathBuf {
    data_dir.join(format!("check_log_{channel}.json"))
}

/// Reads a JSON store. Missing means empty; corrupt also means empty, but
/// gets logged so silent data loss at least leaves a trace.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("treating unreadable store {} as empty: {err}", path.display());
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("treating corrupt store {} as empty: {err}", path.display());
            None
        }
    }
}

pub fn load_snapshot(path: &Path) -> Option<HistorySnapshot> {
    load_json(path)
}

pub fn load_daily_history(path: &Path) -> DailyHistory {
    load_json(path).unwrap_or_default()
}

pub fn load_run_log(path: &Path) -> Vec<RunLogEntry> {
    load_json(path).unwrap_or_default()
}

/// Serializes `value` into a sibling temp file and renames it over `path`.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("creating store directory {}", parent.display()))?;

    let pretty = serde_json::to_string_pretty(value).context("serializing store")?;
    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temp file in {}", parent.display()))?;
    tmp.write_all(pretty.as_bytes())
        .and_then(|()| tmp.write_all(b"\n"))
        .with_context(|| format!("writing {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Appends a run-log entry, dropping the oldest entries beyond
/// [`RUN_LOG_CAP`].
pub fn push_run_log(log: &mut Vec<RunLogEntry>, entry: RunLogEntry) {
    log.push(entry);
    if log.len() > RUN_LOG_CAP {
        let excess = log.len() - RUN_LOG_CAP;
        log.drain(..excess);
    }
}
