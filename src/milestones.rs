//! Round-number milestone detection for view and like counts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classify::{ClassifiedVideo, VideoType};
use crate::store::VideoTotals;

/// Highest view threshold ever generated.
pub const VIEW_MILESTONE_CEILING: u64 = 100_000_000;

/// Highest like threshold ever generated.
pub const LIKE_MILESTONE_CEILING: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Views,
    Likes,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Views => "views",
            Metric::Likes => "likes",
        })
    }
}

/// One crossed threshold. Achievements are transient: they go to the run
/// log and the notifier, nothing reads them back for decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub metric: Metric,
    pub title: String,
    pub threshold: u64,
    pub current: u64,
    pub video_id: String,
    #[serde(rename = "type")]
    pub video_type: VideoType,
}

/// View-count thresholds: 500 first, every 1,000 up to 9,000, then 5,000
/// steps from 10,000 to `max_value`.
pub fn view_milestones(max_value: u64) -> Vec<u64> {
    let mut milestones = vec![500];
    for thousands in (1_000..10_000).step_by(1_000) {
        milestones.push(thousands);
    }
    let mut current = 10_000;
    while current <= max_value {
        milestones.push(current);
        current += 5_000;
    }
    milestones
}

/// Like-count thresholds: every 100 up to `max_value`.
pub fn like_milestones(max_value: u64) -> Vec<u64> {
    let mut milestones = Vec::new();
    let mut current = 100;
    while current <= max_value {
        milestones.push(current);
        current += 100;
    }
    milestones
}

/// Emits one achievement per threshold crossed since the previous poll,
/// ascending within each metric, views before likes per video.
///
/// Only videos already present in `previous` can cross anything: a first
/// observation stays silent even when it lands exactly on a threshold. The
/// crossing rule is strict on the old side (`old < m <= new`), so a value
/// sitting on a threshold does not fire again on the next poll.
pub fn check_milestones(
    current: &[ClassifiedVideo],
    previous: &BTreeMap<String, VideoTotals>,
    view_thresholds: &[u64],
    like_thresholds: &[u64],
) -> Vec<Achievement> {
    let mut achievements = Vec::new();

    for video in current {
        let Some(old) = previous.get(&video.id) else {
            continue;
        };

        for &threshold in view_thresholds {
            if old.views < threshold && threshold <= video.views {
                achievements.push(Achievement {
                    metric: Metric::Views,
                    title: video.title.clone(),
                    threshold,
                    current: video.views,
                    video_id: video.id.clone(),
                    video_type: video.video_type,
                });
            }
        }

        for &threshold in like_thresholds {
            if old.likes < threshold && threshold <= video.likes {
                achievements.push(Achievement {
                    metric: Metric::Likes,
                    title: video.title.clone(),
                    threshold,
                    current: video.likes,
                    video_id: video.id.clone(),
                    video_type: video.video_type,
                });
            }
        }
    }

    achievements
}
