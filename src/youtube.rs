//! Thin client for the YouTube Data API v3.
//!
//! Only the handful of fields the poller needs are deserialized; the rest of
//! each payload is ignored. Statistics arrive as JSON strings and default to
//! zero when absent, which keeps the untyped-payload problem contained to
//! this module.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::store::ChannelStats;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Page size for playlist listing, the API maximum.
pub const PAGE_SIZE: usize = 50;

/// One upload as fetched, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    /// Publish date, `YYYY-MM-DD`.
    pub published: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    /// Raw ISO-8601 duration string; classifier input only.
    pub duration: String,
    /// `liveBroadcastContent` value, `"none"` when the API omits it.
    pub live_broadcast: String,
    /// Whether the live-streaming details carry an actual start time.
    pub has_live_start: bool,
}

// Wire types. Like the downloader's metadata handling, we only grab the
// small subset of fields we need and let serde drop the rest.

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ItemList<T> {
    #[serde(default)]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct SearchItem {
    snippet: SearchSnippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchSnippet {
    channel_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    snippet: Option<ChannelSnippet>,
    #[serde(default)]
    statistics: ChannelStatistics,
    content_details: Option<ChannelContentDetails>,
}

#[derive(Deserialize)]
struct ChannelSnippet {
    title: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelStatistics {
    subscriber_count: Option<String>,
    view_count: Option<String>,
    video_count: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: RelatedPlaylists,
}

#[derive(Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    snippet: PlaylistSnippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    resource_id: ResourceId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Option<VideoSnippet>,
    #[serde(default)]
    statistics: VideoStatistics,
    #[serde(default)]
    content_details: VideoContentDetails,
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    published_at: String,
    #[serde(default = "broadcast_none")]
    live_broadcast_content: String,
}

fn broadcast_none() -> String {
    "none".to_owned()
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
    comment_count: Option<String>,
}

#[derive(Default, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    actual_start_time: Option<String>,
}

/// Missing or non-numeric counters read as zero.
fn parse_count(value: Option<&str>) -> u64 {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(0)
}

impl VideoInfo {
    fn from_item(item: VideoItem) -> Self {
        let (title, published_at, live_broadcast) = match item.snippet {
            Some(snippet) => (
                snippet.title,
                snippet.published_at,
                snippet.live_broadcast_content,
            ),
            None => (String::new(), String::new(), broadcast_none()),
        };
        let published = published_at.get(..10).unwrap_or(&published_at).to_owned();
        Self {
            id: item.id,
            title,
            published,
            views: parse_count(item.statistics.view_count.as_deref()),
            likes: parse_count(item.statistics.like_count.as_deref()),
            comments: parse_count(item.statistics.comment_count.as_deref()),
            duration: item.content_details.duration,
            live_broadcast,
            has_live_start: item
                .live_streaming_details
                .map(|details| details.actual_start_time.is_some())
                .unwrap_or(false),
        }
    }
}

pub struct YouTubeClient {
    agent: ureq::Agent,
    api_key: String,
}

impl YouTubeClient {
    pub fn new(api_key: String) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self { agent, api_key }
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{API_BASE}/{endpoint}");
        let mut request = self.agent.get(&url).query("key", &self.api_key);
        for (name, value) in params {
            request = request.query(name, value);
        }
        let response = request
            .call()
            .with_context(|| format!("requesting {endpoint}"))?;
        response
            .into_json()
            .with_context(|| format!("decoding {endpoint} response"))
    }

    /// Resolves an `@handle`-style channel URL to a channel id.
    pub fn channel_id_for(&self, channel_url: &str) -> Result<String> {
        let Some((_, handle)) = channel_url.rsplit_once('@') else {
            bail!("unsupported channel URL (expected an @handle): {channel_url}");
        };
        let response: ItemList<SearchItem> = self.get_json(
            "search",
            &[
                ("part", "snippet"),
                ("q", handle),
                ("type", "channel"),
                ("maxResults", "1"),
            ],
        )?;
        let Some(item) = response.items.into_iter().next() else {
            bail!("no channel found for handle @{handle}");
        };
        Ok(item.snippet.channel_id)
    }

    /// Channel-level aggregates, stamped with the caller's run timestamp.
    pub fn channel_stats(&self, channel_id: &str, fetched_at: &str) -> Result<ChannelStats> {
        let response: ItemList<ChannelItem> = self.get_json(
            "channels",
            &[("part", "statistics,snippet"), ("id", channel_id)],
        )?;
        let Some(item) = response.items.into_iter().next() else {
            bail!("channel {channel_id} not found");
        };
        Ok(ChannelStats {
            name: item.snippet.map(|snippet| snippet.title).unwrap_or_default(),
            subscribers: parse_count(item.statistics.subscriber_count.as_deref()),
            total_views: parse_count(item.statistics.view_count.as_deref()),
            video_count: parse_count(item.statistics.video_count.as_deref()),
            fetched_at: fetched_at.to_owned(),
        })
    }

    /// Id of the auto-generated uploads playlist.
    pub fn uploads_playlist(&self, channel_id: &str) -> Result<String> {
        let response: ItemList<ChannelItem> =
            self.get_json("channels", &[("part", "contentDetails"), ("id", channel_id)])?;
        response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.content_details)
            .and_then(|details| details.related_playlists.uploads)
            .with_context(|| format!("channel {channel_id} has no uploads playlist"))
    }

    /// One page of uploaded video ids plus the token for the next page.
    pub fn playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<(Vec<String>, Option<String>)> {
        let max_results = PAGE_SIZE.to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }
        let response: ItemList<PlaylistItem> = self.get_json("playlistItems", &params)?;
        let ids = response
            .items
            .into_iter()
            .map(|item| item.snippet.resource_id.video_id)
            .collect();
        Ok((ids, response.next_page_token))
    }

    /// Details for up to one page worth of video ids.
    pub fn video_details(&self, video_ids: &[String]) -> Result<Vec<VideoInfo>> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = video_ids.join(",");
        let response: ItemList<VideoItem> = self.get_json(
            "videos",
            &[
                ("part", "snippet,statistics,liveStreamingDetails,contentDetails"),
                ("id", &joined),
            ],
        )?;
        Ok(response.items.into_iter().map(VideoInfo::from_item).collect())
    }
}
