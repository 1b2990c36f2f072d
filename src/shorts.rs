//! Short-form detection.
//!
//! The Data API never says whether a video is presented as a Short, so we
//! probe the canonical shorts URL and look at where the response lands.
//! This is a best-effort heuristic: every failure reads as "not a Short".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Upper bound on probe requests in flight at once.
pub const MAX_PROBE_WORKERS: usize = 10;

/// Per-request timeout; a slow probe is as good as a failed one.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Answers "is this video a Short?" Implementations must not fail: absence
/// of evidence counts as `false`.
pub trait ShortsProbe: Send + Sync {
    fn is_short(&self, video_id: &str) -> bool;
}

/// Probe backed by a HEAD request against `youtube.com/shorts/<id>`.
pub struct HttpShortsProbe {
    agent: ureq::Agent,
}

impl HttpShortsProbe {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new().timeout(PROBE_TIMEOUT).build();
        Self { agent }
    }
}

impl Default for HttpShortsProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ShortsProbe for HttpShortsProbe {
    fn is_short(&self, video_id: &str) -> bool {
        let url = format!("https://www.youtube.com/shorts/{video_id}");
        match self.agent.head(&url).call() {
            // Regular videos redirect over to /watch; Shorts stay on the
            // shorts path.
            Ok(response) => response.get_url().to_ascii_lowercase().contains("shorts"),
            Err(err) => {
                debug!("shorts probe failed for {video_id}: {err}");
                false
            }
        }
    }
}

/// Probes every id with at most [`MAX_PROBE_WORKERS`] requests in flight and
/// returns exactly one verdict per input id, failed probes included.
pub async fn probe_batch(
    probe: Arc<dyn ShortsProbe>,
    video_ids: &[String],
) -> HashMap<String, bool> {
    let mut results = HashMap::with_capacity(video_ids.len());
    if video_ids.is_empty() {
        return results;
    }

    info!(
        "checking {} video(s) for shorts, up to {MAX_PROBE_WORKERS} in parallel",
        video_ids.len()
    );
    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(MAX_PROBE_WORKERS));
    let mut tasks = JoinSet::new();

    for id in video_ids {
        let id = id.clone();
        let probe = Arc::clone(&probe);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                // The semaphore is never closed; treat it like a failed probe
                // if that somehow changes.
                return (id, false);
            };
            let probe_id = id.clone();
            match tokio::task::spawn_blocking(move || probe.is_short(&probe_id)).await {
                Ok(verdict) => (id, verdict),
                Err(err) => {
                    warn!("shorts probe crashed for {id}: {err}");
                    (id, false)
                }
            }
        });
    }

    let mut completed = 0usize;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((id, verdict)) => {
                results.insert(id, verdict);
                completed += 1;
                if completed % 20 == 0 {
                    debug!("  {completed}/{} probed", video_ids.len());
                }
            }
            Err(err) => warn!("shorts probe task failed: {err}"),
        }
    }

    // Every requested id gets an answer, even if its task never reported.
    for id in video_ids {
        results.entry(id.clone()).or_insert(false);
    }

    let shorts = results.values().filter(|short| **short).count();
    info!(
        "shorts check finished in {:.1}s: {shorts} of {} are shorts",
        started.elapsed().as_secs_f32(),
        video_ids.len()
    );
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fake probe that marks ids starting with "short" and records how many
    /// calls run at the same time.
    struct CountingProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CountingProbe {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl ShortsProbe for CountingProbe {
        fn is_short(&self, video_id: &str) -> bool {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            video_id.starts_with("short")
        }
    }

    struct PanickingProbe;

    impl ShortsProbe for PanickingProbe {
        fn is_short(&self, video_id: &str) -> bool {
            if video_id == "bad" {
                panic!("probe blew up");
            }
            true
        }
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn probe_batch_answers_every_id_and_bounds_concurrency() {
        let probe = Arc::new(CountingProbe::new());
        let video_ids: Vec<String> = (0..30)
            .map(|n| {
                if n % 3 == 0 {
                    format!("short{n}")
                } else {
                    format!("video{n}")
                }
            })
            .collect();

        let results = probe_batch(probe.clone(), &video_ids).await;

        assert_eq!(results.len(), video_ids.len());
        for id in &video_ids {
            assert_eq!(results[id], id.starts_with("short"), "verdict for {id}");
        }
        let peak = probe.peak.load(Ordering::SeqCst);
        assert!(peak >= 2, "expected some overlap, saw peak {peak}");
        assert!(
            peak <= MAX_PROBE_WORKERS,
            "peak concurrency {peak} exceeded the worker bound"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn probe_batch_defaults_a_crashed_probe_to_false() {
        let results = probe_batch(Arc::new(PanickingProbe), &ids(&["ok1", "bad", "ok2"])).await;
        assert_eq!(results.len(), 3);
        assert!(results["ok1"]);
        assert!(!results["bad"]);
        assert!(results["ok2"]);
    }

    #[tokio::test]
    async fn probe_batch_with_no_ids_is_empty() {
        let results = probe_batch(Arc::new(PanickingProbe), &[]).await;
        assert!(results.is_empty());
    }
}
