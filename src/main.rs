use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

mod api;
mod config;
mod models;
mod monitor;
mod prefs;
mod realtime;
mod sync;
mod visibility;

use api::SportsApi;
use config::Config;
use models::TodaySummary;
use monitor::{
    start_score_monitor, AlertDispatcher, Notifier, ScoreAlert, ScoreboardSource, SoundPlayer,
};
use prefs::{KeyValueStore, MemoryStore, Preferences, SqliteStore};
use realtime::{ConnectionState, MatchFeed, Subscription};
use sync::{BatchFetcher, FetchFn, Poller, PollerConfig};
use visibility::Visibility;

/// Stand-in for the host sound primitive: logs instead of playing.
struct LogSound;

#[async_trait::async_trait]
impl SoundPlayer for LogSound {
    async fn play(&self, alert: &ScoreAlert) -> Result<()> {
        info!("🔊 goal sound ({} {})", alert.scoring_team(), alert.score_line());
        Ok(())
    }
}

/// Stand-in for the host notification primitive: logs instead of posting.
struct LogNotifier {
    granted: bool,
}

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn permission_granted(&self) -> bool {
        self.granted
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        info!("🔔 {}: {}", title, body);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Preference store: persistent when a path is configured.
    let store: Arc<dyn KeyValueStore> = match &config.prefs_path {
        Some(path) => {
            let store = SqliteStore::open(path)?;
            info!("Preference store opened: {}", path);
            Arc::new(store)
        }
        None => Arc::new(MemoryStore::new()),
    };
    let user_prefs = Preferences::new(store);
    user_prefs.set_sound_enabled(config.sound_alerts);
    user_prefs.set_notifications_enabled(config.notification_alerts);
    for league in &config.pinned_leagues {
        if !user_prefs.pin_league(league) {
            warn!(
                "League '{}' not pinned (duplicate or cap of {} reached)",
                league,
                prefs::MAX_PINNED_LEAGUES
            );
        }
    }

    let api = Arc::new(SportsApi::new(&config.api_url)?);

    match api.health().await {
        Ok(()) => info!("API reachable at {}", config.api_url),
        Err(e) => warn!("API health probe failed: {} (polling will keep retrying)", e),
    }
    match api.leagues().await {
        Ok(leagues) => info!("{} leagues available", leagues.len()),
        Err(e) => warn!("League list unavailable: {}", e),
    }
    match api.trending().await {
        Ok(items) => {
            for item in items.iter().take(3) {
                info!("Trending: {} ({})", item.title, item.url.as_deref().unwrap_or("-"));
            }
        }
        Err(e) => debug!("Trending feed unavailable: {}", e),
    }

    // Visibility signal: a headless run stays in the foreground; the sender
    // is kept so an embedding host could flip it.
    let (_visibility_tx, visibility_rx) = visibility::channel(Visibility::Visible);

    // Today-summary poll drives the connectivity banner.
    let today_fetch: FetchFn<TodaySummary> = {
        let api = Arc::clone(&api);
        Arc::new(move || {
            let api = Arc::clone(&api);
            Box::pin(async move { api.today_summary().await })
        })
    };
    let mut poller_config = PollerConfig::new(config.poll_interval());
    if let Some(hidden) = config.hidden_poll_interval() {
        poller_config = poller_config.with_hidden_interval(hidden);
    }
    let today_poller = Poller::new(today_fetch, poller_config, visibility_rx.clone());

    // Score monitor over the pinned leagues.
    let pinned = user_prefs.pinned_leagues();
    if pinned.is_empty() {
        info!("No leagues pinned; score monitor is idle until --pin is provided");
    } else {
        info!("Monitoring leagues: {:?}", pinned);
    }
    let (_monitored_tx, monitored_rx) = tokio::sync::watch::channel(pinned);
    let dispatcher = Arc::new(AlertDispatcher::new(
        user_prefs.clone(),
        Arc::new(LogSound),
        Arc::new(LogNotifier {
            granted: user_prefs.notifications_enabled(),
        }),
    ));
    let (monitor_task, mut alerts) = start_score_monitor(
        Arc::clone(&api) as Arc<dyn ScoreboardSource>,
        BatchFetcher::new(config.batch_size),
        dispatcher,
        monitored_rx,
        config.monitor_interval(),
    );

    // Focused match: REST detail first, then the live channel.
    let feed = match &config.follow_match {
        Some(match_id) => {
            match api.match_detail(match_id).await {
                Ok(m) => info!(
                    "Following {} vs {} ({}) — {} {}-{}",
                    m.home_team, m.away_team, m.league, m.id, m.home_score, m.away_score
                ),
                Err(e) => warn!("Initial detail fetch for {} failed: {}", match_id, e),
            }
            let feed = MatchFeed::new(config.feed_config());
            feed.subscribe(Subscription::detail(match_id.clone()));
            Some(feed)
        }
        None => None,
    };

    let mut banner = tokio::time::interval(Duration::from_secs(30));
    banner.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(alert) = alerts.recv() => {
                info!(
                    "⚽ {} {} {} — {} scored ({})",
                    alert.home_team,
                    alert.score_line(),
                    alert.away_team,
                    alert.scoring_team(),
                    alert.league
                );
            }
            _ = banner.tick() => {
                let view = today_poller.view().await;
                match (&view.data, &view.error) {
                    (Some(s), None) => {
                        info!("Today: {} live, {} finished, {} upcoming", s.live, s.finished, s.upcoming);
                    }
                    (Some(s), Some(e)) => {
                        warn!("Connectivity degraded ({}); showing last good data: {} live", e, s.live);
                    }
                    (None, Some(e)) => warn!("Connectivity error: {}", e),
                    (None, None) => {}
                }
                if let Some(feed) = &feed {
                    let state = feed.connection_state();
                    if state == ConnectionState::Closed {
                        warn!("Live channel disconnected; showing last buffered update");
                    }
                    if let Some(update) = feed.latest_update().await {
                        info!(
                            "Live [{}] {}: {}",
                            state.as_str(),
                            update.match_id,
                            update.payload
                        );
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    monitor_task.abort();
    drop(feed);
    Ok(())
}
