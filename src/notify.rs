//! Notification contract for milestone achievements.
//!
//! The poller only promises that a message goes out when the achievement
//! list is non-empty. Where the message lands is up to the [`Notifier`]
//! implementation; the default one writes into the run's log output.

use anyhow::Result;
use log::info;

use crate::milestones::Achievement;

pub trait Notifier {
    fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// Sink that emits the message through the logger, one line at a time.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, subject: &str, body: &str) -> Result<()> {
        info!("{subject}");
        for line in body.lines() {
            info!("{line}");
        }
        Ok(())
    }
}

pub fn achievement_subject(channel_name: &str, achievements: &[Achievement]) -> String {
    format!(
        "[{channel_name}] {} milestone(s) reached",
        achievements.len()
    )
}

/// Human-readable message body: one numbered block per achievement with the
/// metric, the crossed threshold, the current value and the watch URL.
pub fn achievement_body(channel_name: &str, achievements: &[Achievement]) -> String {
    let mut body = format!("[{channel_name}] crossed round-number milestones!\n\n");
    for (index, achievement) in achievements.iter().enumerate() {
        body.push_str(&format!("[{}] {}\n", index + 1, achievement.title));
        body.push_str(&format!(
            "    {}: passed {} (now {})\n",
            achievement.metric, achievement.threshold, achievement.current
        ));
        body.push_str(&format!("    type: {}\n", achievement.video_type));
        body.push_str(&format!(
            "    https://www.youtube.com/watch?v={}\n\n",
            achievement.video_id
        ));
    }
    body
}
