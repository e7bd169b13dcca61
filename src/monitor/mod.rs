//! Fixed-cadence score monitor.
//!
//! While at least one league is monitored, each sweep batch-fetches the
//! monitored scoreboards, restricts them to live matches, diffs scores
//! against the tracker's baselines and dispatches an alert per detected
//! increase. An empty monitored set means no work at all — not even a
//! fetch.

pub mod detector;
pub mod dispatch;

pub use detector::{ScoreAlert, ScoreSnapshot, ScoreTracker, ScoringSide};
pub use dispatch::{AlertDispatcher, Notifier, SoundPlayer};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::api::{FetchError, SportsApi};
use crate::models::MatchState;
use crate::sync::BatchFetcher;

/// Where the monitor gets per-league live state from.
#[async_trait]
pub trait ScoreboardSource: Send + Sync {
    async fn league_scoreboard(&self, league_id: &str) -> Result<Vec<MatchState>, FetchError>;
}

#[async_trait]
impl ScoreboardSource for SportsApi {
    async fn league_scoreboard(&self, league_id: &str) -> Result<Vec<MatchState>, FetchError> {
        SportsApi::league_scoreboard(self, league_id).await
    }
}

/// Spawn the monitor loop. Returns the task handle and a channel of the
/// alerts it emitted, for display alongside the dispatched side effects.
pub fn start_score_monitor(
    source: Arc<dyn ScoreboardSource>,
    batch: BatchFetcher,
    dispatcher: Arc<AlertDispatcher>,
    mut monitored: watch::Receiver<Vec<String>>,
    interval: Duration,
) -> (JoinHandle<()>, mpsc::Receiver<ScoreAlert>) {
    let (tx, rx) = mpsc::channel(1024);

    let handle = tokio::spawn(async move {
        info!("Score monitor started (interval={:?})", interval);
        let mut tracker = ScoreTracker::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut monitored_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = monitored.changed(), if monitored_open => {
                    match changed {
                        Ok(()) => {
                            // Baselines for unmonitored leagues go away
                            // immediately, not on the next sweep.
                            let keep: HashSet<String> =
                                monitored.borrow().iter().cloned().collect();
                            tracker.retain_leagues(&keep);
                            debug!("monitored leagues now {:?}", keep);
                        }
                        Err(_) => monitored_open = false,
                    }
                    continue;
                }
            }

            let leagues: Vec<String> = monitored.borrow().clone();
            if leagues.is_empty() {
                tracker.clear();
                continue;
            }

            let boards = batch
                .run(leagues, |league_id| {
                    let source = Arc::clone(&source);
                    async move {
                        source
                            .league_scoreboard(&league_id)
                            .await
                            .map(|matches| (league_id, matches))
                    }
                })
                .await;

            for (league_id, matches) in boards {
                let live: Vec<&MatchState> =
                    matches.iter().filter(|m| m.phase.is_live()).collect();
                debug!("league {}: {} live matches", league_id, live.len());
                for m in live {
                    if let Some(alert) = tracker.observe(m) {
                        info!(
                            "Score change: {} {} {} ({})",
                            alert.home_team,
                            alert.score_line(),
                            alert.away_team,
                            alert.league
                        );
                        dispatcher.dispatch(&alert).await;
                        if let Err(e) = tx.try_send(alert) {
                            error!("Alert channel full, alert DROPPED: {}", e);
                        }
                    }
                }
            }
        }
    });

    (handle, rx)
}
