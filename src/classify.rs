//! Decides whether an upload is a Movie, a Short or a LiveArchive.
//!
//! The public API does not expose a live-broadcast state directly: YouTube
//! only hands us indirect signals (ISO-8601 duration, `liveBroadcastContent`,
//! streaming details), and a manually maintained override table corrects the
//! cases those signals get wrong.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::shorts::ShortsProbe;
use crate::youtube::VideoInfo;

/// File in the data directory holding manual classification fixes.
pub const OVERRIDES_FILE: &str = "video_type_overrides.json";

/// Finished live broadcasts shorter than this are premiered music videos,
/// not stream archives.
const LIVE_ARCHIVE_MIN_MINUTES: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoType {
    Movie,
    Short,
    LiveArchive,
}

impl fmt::Display for VideoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VideoType::Movie => "Movie",
            VideoType::Short => "Short",
            VideoType::LiveArchive => "LiveArchive",
        })
    }
}

/// Manual corrections: channel name -> video id -> forced type.
pub type TypeOverrides = BTreeMap<String, BTreeMap<String, VideoType>>;

/// Loads the override table. A missing or unreadable file simply means "no
/// overrides"; a poll run must never fail because of this file.
pub fn load_type_overrides(path: &Path) -> TypeOverrides {
    if !path.exists() {
        return TypeOverrides::new();
    }
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            warn!("ignoring unreadable override file {}: {err}", path.display());
            return TypeOverrides::new();
        }
    };
    match serde_json::from_str::<TypeOverrides>(&raw) {
        Ok(overrides) => {
            let total: usize = overrides.values().map(|channel| channel.len()).sum();
            info!("loaded {total} type override(s) from {}", path.display());
            overrides
        }
        Err(err) => {
            warn!("ignoring unparsable override file {}: {err}", path.display());
            TypeOverrides::new()
        }
    }
}

/// Total seconds encoded in an ISO-8601 `PT#H#M#S` duration. Components may
/// appear in any subset; anything that does not look like such a duration
/// counts as zero seconds rather than an error.
pub fn duration_seconds(duration: &str) -> u64 {
    let Some(rest) = duration.strip_prefix("PT") else {
        return 0;
    };
    let mut total = 0u64;
    let mut digits = String::new();
    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let factor: u64 = match ch {
            'H' => 3600,
            'M' => 60,
            'S' => 1,
            _ => return 0,
        };
        // A unit letter without digits in front of it, e.g. "PTMS".
        let Ok(value) = digits.parse::<u64>() else {
            return 0;
        };
        total = total.saturating_add(value.saturating_mul(factor));
        digits.clear();
    }
    // Trailing digits without a closing unit make the whole string invalid.
    if digits.is_empty() { total } else { 0 }
}

pub fn duration_minutes(duration: &str) -> f64 {
    duration_seconds(duration) as f64 / 60.0
}

/// One classified upload, ready for milestone checks and persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedVideo {
    pub id: String,
    pub title: String,
    pub published: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub video_type: VideoType,
}

impl ClassifiedVideo {
    pub fn from_info(info: &VideoInfo, video_type: VideoType) -> Self {
        Self {
            id: info.id.clone(),
            title: info.title.clone(),
            published: info.published.clone(),
            views: info.views,
            likes: info.likes,
            comments: info.comments,
            video_type,
        }
    }
}

/// Decides the type of a single video.
///
/// Precedence, first match wins:
/// 1. a manual override for this (channel, video id) pair;
/// 2. the shorts probe, read from the batch cache when one was collected and
///    asked directly otherwise;
/// 3. completed or started live broadcasts, split on duration: under five
///    minutes is a premiered Movie, anything longer a LiveArchive;
/// 4. Movie.
///
/// The shorts check has to run before the live heuristics: a short-form live
/// premiere would otherwise land in LiveArchive.
pub fn classify_video(
    info: &VideoInfo,
    short_cache: Option<&HashMap<String, bool>>,
    overrides: &TypeOverrides,
    channel_name: &str,
    probe: &dyn ShortsProbe,
) -> VideoType {
    if let Some(forced) = overrides
        .get(channel_name)
        .and_then(|channel| channel.get(&info.id))
    {
        info!("override applied: [{}] -> {forced}", info.title);
        return *forced;
    }

    let is_short = match short_cache {
        Some(cache) => cache.get(&info.id).copied().unwrap_or(false),
        None => probe.is_short(&info.id),
    };
    if is_short {
        return VideoType::Short;
    }

    if info.live_broadcast == "completed" || info.has_live_start {
        if duration_minutes(&info.duration) < LIVE_ARCHIVE_MIN_MINUTES {
            return VideoType::Movie;
        }
        return VideoType::LiveArchive;
    }

    VideoType::Movie
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Probe fake that answers from a fixed list of short ids and records
    /// nothing else; lets every test run without the network.
    struct FixedProbe {
        shorts: Vec<&'static str>,
    }

    impl ShortsProbe for FixedProbe {
        fn is_short(&self, video_id: &str) -> bool {
            self.shorts.contains(&video_id)
        }
    }

    fn no_shorts() -> FixedProbe {
        FixedProbe { shorts: Vec::new() }
    }

    fn video(id: &str) -> VideoInfo {
        VideoInfo {
            id: id.to_owned(),
            title: format!("Video {id}"),
            published: "2024-01-01".to_owned(),
            views: 0,
            likes: 0,
            comments: 0,
            duration: "PT10M".to_owned(),
            live_broadcast: "none".to_owned(),
            has_live_start: false,
        }
    }

    #[test]
    fn duration_seconds_full_form() {
        assert_eq!(duration_seconds("PT1H2M3S"), 3723);
    }

    #[test]
    fn duration_seconds_partial_components() {
        assert_eq!(duration_seconds("PT3M20S"), 200);
        assert_eq!(duration_seconds("PT1H"), 3600);
        assert_eq!(duration_seconds("PT45S"), 45);
        assert_eq!(duration_seconds("PT"), 0);
    }

    #[test]
    fn duration_seconds_rejects_malformed_input() {
        assert_eq!(duration_seconds(""), 0);
        assert_eq!(duration_seconds("3M20S"), 0);
        assert_eq!(duration_seconds("PT5"), 0);
        assert_eq!(duration_seconds("PTXM"), 0);
        assert_eq!(duration_seconds("P1DT2H"), 0);
    }

    #[test]
    fn override_beats_every_other_signal() {
        // A video that would classify as Short by probe and LiveArchive by
        // its live metadata still takes the forced type.
        let mut info = video("forced");
        info.live_broadcast = "completed".to_owned();
        info.duration = "PT2H".to_owned();

        let mut overrides = TypeOverrides::new();
        overrides
            .entry("MyChannel".to_owned())
            .or_default()
            .insert("forced".to_owned(), VideoType::Movie);
        let probe = FixedProbe { shorts: vec!["forced"] };

        let got = classify_video(&info, None, &overrides, "MyChannel", &probe);
        assert_eq!(got, VideoType::Movie);
    }

    #[test]
    fn override_for_other_channel_is_ignored() {
        let info = video("vid");
        let mut overrides = TypeOverrides::new();
        overrides
            .entry("SomeoneElse".to_owned())
            .or_default()
            .insert("vid".to_owned(), VideoType::LiveArchive);

        let got = classify_video(&info, None, &overrides, "MyChannel", &no_shorts());
        assert_eq!(got, VideoType::Movie);
    }

    #[test]
    fn cached_short_wins_over_live_metadata() {
        let mut info = video("clip");
        info.live_broadcast = "completed".to_owned();
        info.duration = "PT20M".to_owned();

        let mut cache = HashMap::new();
        cache.insert("clip".to_owned(), true);

        let got = classify_video(&info, Some(&cache), &TypeOverrides::new(), "ch", &no_shorts());
        assert_eq!(got, VideoType::Short);
    }

    #[test]
    fn direct_probe_is_the_fallback_without_a_cache() {
        let info = video("clip");
        let probe = FixedProbe { shorts: vec!["clip"] };
        let got = classify_video(&info, None, &TypeOverrides::new(), "ch", &probe);
        assert_eq!(got, VideoType::Short);
    }

    #[test]
    fn id_missing_from_cache_counts_as_not_short() {
        let info = video("clip");
        let cache = HashMap::new();
        // Even though the direct probe would say Short, the empty cache is
        // authoritative once a batch result exists.
        let probe = FixedProbe { shorts: vec!["clip"] };
        let got = classify_video(&info, Some(&cache), &TypeOverrides::new(), "ch", &probe);
        assert_eq!(got, VideoType::Movie);
    }

    #[test]
    fn completed_broadcast_splits_on_five_minutes() {
        let mut long = video("stream");
        long.live_broadcast = "completed".to_owned();
        long.duration = "PT1H30M".to_owned();
        assert_eq!(
            classify_video(&long, None, &TypeOverrides::new(), "ch", &no_shorts()),
            VideoType::LiveArchive
        );

        let mut premiere = video("mv");
        premiere.live_broadcast = "completed".to_owned();
        premiere.duration = "PT4M30S".to_owned();
        assert_eq!(
            classify_video(&premiere, None, &TypeOverrides::new(), "ch", &no_shorts()),
            VideoType::Movie
        );
    }

    #[test]
    fn exactly_five_minutes_is_an_archive() {
        let mut info = video("stream");
        info.live_broadcast = "completed".to_owned();
        info.duration = "PT5M".to_owned();
        assert_eq!(
            classify_video(&info, None, &TypeOverrides::new(), "ch", &no_shorts()),
            VideoType::LiveArchive
        );
    }

    #[test]
    fn live_start_time_alone_triggers_the_duration_split() {
        let mut info = video("stream");
        info.has_live_start = true;
        info.duration = "PT2H".to_owned();
        assert_eq!(
            classify_video(&info, None, &TypeOverrides::new(), "ch", &no_shorts()),
            VideoType::LiveArchive
        );
    }

    #[test]
    fn malformed_duration_on_a_broadcast_means_movie() {
        // Unparsable duration counts as zero minutes, which is under the
        // archive threshold.
        let mut info = video("odd");
        info.live_broadcast = "completed".to_owned();
        info.duration = "not-a-duration".to_owned();
        assert_eq!(
            classify_video(&info, None, &TypeOverrides::new(), "ch", &no_shorts()),
            VideoType::Movie
        );
    }

    #[test]
    fn plain_upload_defaults_to_movie() {
        let info = video("plain");
        assert_eq!(
            classify_video(&info, None, &TypeOverrides::new(), "ch", &no_shorts()),
            VideoType::Movie
        );
    }

    #[test]
    fn load_type_overrides_reads_the_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(OVERRIDES_FILE);
        File::create(&path)
            .unwrap()
            .write_all(br#"{"MyChannel":{"abc":"Short","def":"LiveArchive"}}"#)
            .unwrap();

        let overrides = load_type_overrides(&path);
        assert_eq!(overrides["MyChannel"]["abc"], VideoType::Short);
        assert_eq!(overrides["MyChannel"]["def"], VideoType::LiveArchive);
    }

    #[test]
    fn load_type_overrides_tolerates_missing_and_corrupt_files() {
        let dir = tempdir().unwrap();
        assert!(load_type_overrides(&dir.path().join("missing.json")).is_empty());

        let path = dir.path().join(OVERRIDES_FILE);
        File::create(&path).unwrap().write_all(b"{not json").unwrap();
        assert!(load_type_overrides(&path).is_empty());

        // Unknown type names poison the whole file, which falls back to
        // "no overrides" rather than failing the run.
        File::create(&path)
            .unwrap()
            .write_all(br#"{"ch":{"abc":"Documentary"}}"#)
            .unwrap();
        assert!(load_type_overrides(&path).is_empty());
    }
}
