//! Per-video history maintenance: folding a fresh poll into the store and
//! compacting multi-sample days down to one record per day.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};

use crate::classify::{ClassifiedVideo, VideoType};
use crate::store::{DailyHistory, Sample, TIMESTAMP_FORMAT, VideoHistory};

/// A video whose stored type no longer matches what classification says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeChange {
    pub video_id: String,
    pub title: String,
    pub old: VideoType,
    pub new: VideoType,
}

/// Folds one poll's worth of videos into the history.
///
/// Every observed video gains exactly one new sample, even when its counts
/// did not move (a duplicate-value sample records "still this value now").
/// Titles refresh to the latest upstream value; a differing type overwrites
/// the stored one and is reported back. Videos the poll did not return stay
/// untouched: a fetch gap is indistinguishable from an upstream deletion,
/// so nothing is ever dropped here.
pub fn merge_run(
    history: &mut DailyHistory,
    videos: &[ClassifiedVideo],
    timestamp: &str,
) -> Vec<TypeChange> {
    let mut changes = Vec::new();

    for video in videos {
        let entry = history
            .entry(video.id.clone())
            .or_insert_with(|| VideoHistory {
                title: video.title.clone(),
                published: video.published.clone(),
                video_type: video.video_type,
                records: Vec::new(),
            });

        if entry.video_type != video.video_type {
            info!(
                "type corrected: [{}] {} -> {}",
                video.title, entry.video_type, video.video_type
            );
            changes.push(TypeChange {
                video_id: video.id.clone(),
                title: video.title.clone(),
                old: entry.video_type,
                new: video.video_type,
            });
            entry.video_type = video.video_type;
        }

        entry.title = video.title.clone();
        entry.records.push(Sample {
            timestamp: timestamp.to_owned(),
            views: video.views,
            likes: video.likes,
            comments: video.comments,
        });
    }

    changes
}

/// Collapses each video's samples to one per calendar day, keeping the
/// chronologically latest sample of that day and emitting days in ascending
/// order. Samples with unparsable timestamps are skipped; videos left with
/// no samples are omitted. Running this on its own output is a no-op.
pub fn aggregate_history(history: &DailyHistory) -> DailyHistory {
    let mut aggregated = DailyHistory::new();

    for (video_id, video) in history {
        if video.records.is_empty() {
            continue;
        }

        let mut per_day: BTreeMap<NaiveDate, (NaiveDateTime, &Sample)> = BTreeMap::new();
        for sample in &video.records {
            let parsed = match NaiveDateTime::parse_from_str(&sample.timestamp, TIMESTAMP_FORMAT) {
                Ok(parsed) => parsed,
                Err(_) => {
                    warn!(
                        "skipping sample with invalid timestamp {:?} for {video_id}",
                        sample.timestamp
                    );
                    continue;
                }
            };
            let slot = per_day.entry(parsed.date()).or_insert((parsed, sample));
            if parsed > slot.0 {
                *slot = (parsed, sample);
            }
        }
        if per_day.is_empty() {
            continue;
        }

        aggregated.insert(
            video_id.clone(),
            VideoHistory {
                title: video.title.clone(),
                published: video.published.clone(),
                video_type: video.video_type,
                records: per_day.into_values().map(|(_, sample)| sample.clone()).collect(),
            },
        );
    }

    aggregated
}
