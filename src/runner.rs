//! The read-modify-write pipeline one successfully fetched channel goes
//! through: milestone check against the previous snapshot, then snapshot,
//! run log and daily history updates.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use log::info;

use crate::classify::{ClassifiedVideo, VideoType};
use crate::history::{self, TypeChange};
use crate::milestones::{
    self, Achievement, LIKE_MILESTONE_CEILING, VIEW_MILESTONE_CEILING,
};
use crate::store::{self, ChannelStats, HistorySnapshot, RunLogEntry, VideoTotals};

/// What one channel's run produced, for reporting and notification.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub achievements: Vec<Achievement>,
    pub type_changes: Vec<TypeChange>,
    pub total_videos: usize,
    pub movie_count: usize,
    pub short_count: usize,
    pub archive_count: usize,
}

/// Applies one poll's result to the channel's stores.
///
/// Milestones are judged against the snapshot left by the previous run, so
/// that file is read before the new snapshot overwrites it. Each store is
/// read once and written once; callers only get here with a completely
/// fetched channel, so a failed fetch never mutates any file.
pub fn record_channel_run(
    data_dir: &Path,
    channel_name: &str,
    channel_stats: &ChannelStats,
    videos: &[ClassifiedVideo],
    timestamp: &str,
) -> Result<RunOutcome> {
    let count_of =
        |wanted: VideoType| videos.iter().filter(|video| video.video_type == wanted).count();
    let movie_count = count_of(VideoType::Movie);
    let short_count = count_of(VideoType::Short);
    let archive_count = count_of(VideoType::LiveArchive);

    let snapshot_path = store::snapshot_path(data_dir, channel_name);
    let previous = store::load_snapshot(&snapshot_path);
    let empty = BTreeMap::new();
    let previous_totals = previous
        .as_ref()
        .map(|snapshot| &snapshot.videos)
        .unwrap_or(&empty);

    let achievements = milestones::check_milestones(
        videos,
        previous_totals,
        &milestones::view_milestones(VIEW_MILESTONE_CEILING),
        &milestones::like_milestones(LIKE_MILESTONE_CEILING),
    );

    let snapshot = HistorySnapshot {
        timestamp: timestamp.to_owned(),
        channel_stats: channel_stats.clone(),
        videos: videos
            .iter()
            .map(|video| {
                (
                    video.id.clone(),
                    VideoTotals {
                        views: video.views,
                        likes: video.likes,
                        video_type: video.video_type,
                    },
                )
            })
            .collect(),
    };
    store::save_json(&snapshot_path, &snapshot)?;

    let run_log_path = store::run_log_path(data_dir, channel_name);
    let mut run_log = store::load_run_log(&run_log_path);
    store::push_run_log(
        &mut run_log,
        RunLogEntry {
            timestamp: timestamp.to_owned(),
            channel_stats: channel_stats.clone(),
            total_videos: videos.len(),
            movie_count,
            short_count,
            archive_count,
            achievements: achievements.clone(),
        },
    );
    store::save_json(&run_log_path, &run_log)?;

    let daily_path = store::daily_history_path(data_dir, channel_name);
    let mut daily = store::load_daily_history(&daily_path);
    let type_changes = history::merge_run(&mut daily, videos, timestamp);
    store::save_json(&daily_path, &daily)?;

    info!(
        "recorded {} video(s) for {channel_name}: {movie_count} movie(s), {short_count} short(s), {archive_count} archive(s)",
        videos.len()
    );

    Ok(RunOutcome {
        achievements,
        type_changes,
        total_videos: videos.len(),
        movie_count,
        short_count,
        archive_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::milestones::Metric;
    use tempfile::tempdir;

    fn stats(timestamp: &str) -> ChannelStats {
        ChannelStats {
            name: "My Channel".to_owned(),
            subscribers: 1_000,
            total_views: 100_000,
            video_count: 1,
            fetched_at: timestamp.to_owned(),
        }
    }

    fn video(views: u64, video_type: VideoType) -> ClassifiedVideo {
        ClassifiedVideo {
            id: "vid1".to_owned(),
            title: "The video".to_owned(),
            published: "2024-01-01".to_owned(),
            views,
            likes: 10,
            comments: 1,
            video_type,
        }
    }

    #[test]
    fn three_polls_end_to_end() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path();
        let channel = "ch";

        // Run 1: empty stores, 450 views. One sample, nothing achieved.
        let outcome = record_channel_run(
            data_dir,
            channel,
            &stats("2024-06-01 00:00:00"),
            &[video(450, VideoType::Movie)],
            "2024-06-01 00:00:00",
        )
        .unwrap();
        assert!(outcome.achievements.is_empty());
        let daily = store::load_daily_history(&store::daily_history_path(data_dir, channel));
        assert_eq!(daily["vid1"].records.len(), 1);

        // Run 2: 600 views crosses the 500 threshold exactly once.
        let outcome = record_channel_run(
            data_dir,
            channel,
            &stats("2024-06-01 06:00:00"),
            &[video(600, VideoType::Movie)],
            "2024-06-01 06:00:00",
        )
        .unwrap();
        assert_eq!(outcome.achievements.len(), 1);
        assert_eq!(outcome.achievements[0].metric, Metric::Views);
        assert_eq!(outcome.achievements[0].threshold, 500);
        let daily = store::load_daily_history(&store::daily_history_path(data_dir, channel));
        assert_eq!(daily["vid1"].records.len(), 2);

        // Run 3: unchanged counts. No achievement, but one more sample.
        let outcome = record_channel_run(
            data_dir,
            channel,
            &stats("2024-06-01 12:00:00"),
            &[video(600, VideoType::Movie)],
            "2024-06-01 12:00:00",
        )
        .unwrap();
        assert!(outcome.achievements.is_empty());
        let daily = store::load_daily_history(&store::daily_history_path(data_dir, channel));
        assert_eq!(daily["vid1"].records.len(), 3);

        let run_log = store::load_run_log(&store::run_log_path(data_dir, channel));
        assert_eq!(run_log.len(), 3);
        assert_eq!(run_log[1].achievements.len(), 1);
    }

    #[test]
    fn snapshot_reflects_the_latest_poll() {
        let dir = tempdir().unwrap();
        record_channel_run(
            dir.path(),
            "ch",
            &stats("t1"),
            &[video(450, VideoType::Movie)],
            "t1",
        )
        .unwrap();
        record_channel_run(
            dir.path(),
            "ch",
            &stats("t2"),
            &[video(600, VideoType::Short)],
            "t2",
        )
        .unwrap();

        let snapshot = store::load_snapshot(&store::snapshot_path(dir.path(), "ch")).unwrap();
        assert_eq!(snapshot.timestamp, "t2");
        assert_eq!(snapshot.videos["vid1"].views, 600);
        assert_eq!(snapshot.videos["vid1"].video_type, VideoType::Short);
    }

    #[test]
    fn type_changes_surface_in_the_outcome() {
        let dir = tempdir().unwrap();
        record_channel_run(
            dir.path(),
            "ch",
            &stats("t1"),
            &[video(100, VideoType::Movie)],
            "t1",
        )
        .unwrap();
        let outcome = record_channel_run(
            dir.path(),
            "ch",
            &stats("t2"),
            &[video(120, VideoType::LiveArchive)],
            "t2",
        )
        .unwrap();

        assert_eq!(outcome.type_changes.len(), 1);
        assert_eq!(outcome.type_changes[0].old, VideoType::Movie);
        assert_eq!(outcome.type_changes[0].new, VideoType::LiveArchive);
        assert_eq!(outcome.archive_count, 1);
        assert_eq!(outcome.movie_count, 0);
    }

    #[test]
    fn per_type_counts_cover_the_whole_poll() {
        let dir = tempdir().unwrap();
        let mut short = video(10, VideoType::Short);
        short.id = "vid2".to_owned();
        let mut archive = video(10, VideoType::LiveArchive);
        archive.id = "vid3".to_owned();

        let outcome = record_channel_run(
            dir.path(),
            "ch",
            &stats("t1"),
            &[video(10, VideoType::Movie), short, archive],
            "t1",
        )
        .unwrap();
        assert_eq!(outcome.total_videos, 3);
        assert_eq!(outcome.movie_count, 1);
        assert_eq!(outcome.short_count, 1);
        assert_eq!(outcome.archive_count, 1);
    }
}
