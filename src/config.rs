use std::time::Duration;

use clap::Parser;

use crate::realtime::MatchFeedConfig;

/// Live sports score synchronization engine
#[derive(Parser, Debug, Clone)]
#[command(name = "scoresync", version, about)]
pub struct Config {
    /// Sports data REST API base URL
    #[arg(
        long,
        env = "SCORESYNC_API_URL",
        default_value = "https://api.scoresync.example/v1"
    )]
    pub api_url: String,

    /// Live update WebSocket URL
    #[arg(
        long,
        env = "SCORESYNC_WS_URL",
        default_value = "wss://api.scoresync.example/v1/live"
    )]
    pub ws_url: String,

    /// Foreground summary refresh interval in seconds (0 disables the timer)
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "30")]
    pub poll_interval_secs: u64,

    /// Summary refresh interval while backgrounded, in seconds
    #[arg(long, env = "HIDDEN_POLL_INTERVAL_SECS")]
    pub hidden_poll_interval_secs: Option<u64>,

    /// Score monitor sweep interval in seconds
    #[arg(long, env = "MONITOR_INTERVAL_SECS", default_value = "10")]
    pub monitor_interval_secs: u64,

    /// Maximum concurrent scoreboard requests per sweep
    #[arg(long, env = "BATCH_SIZE", default_value = "4")]
    pub batch_size: usize,

    /// Reconnect backoff base delay in milliseconds
    #[arg(long, env = "RECONNECT_BASE_MS", default_value = "1000")]
    pub reconnect_base_ms: u64,

    /// Reconnect backoff ceiling in milliseconds
    #[arg(long, env = "RECONNECT_MAX_MS", default_value = "30000")]
    pub reconnect_max_ms: u64,

    /// Reconnect attempts before the channel is declared disconnected
    #[arg(long, env = "RECONNECT_MAX_ATTEMPTS", default_value = "10")]
    pub reconnect_max_attempts: u32,

    /// Capacity of the per-match live update buffer
    #[arg(long, env = "FEED_BUFFER_CAPACITY", default_value = "256")]
    pub feed_buffer_capacity: usize,

    /// SQLite path for the preference store (omit for in-memory)
    #[arg(long, env = "PREFS_PATH")]
    pub prefs_path: Option<String>,

    /// League ids to monitor for score alerts (repeatable, max 3)
    #[arg(long = "pin", env = "PINNED_LEAGUES", value_delimiter = ',')]
    pub pinned_leagues: Vec<String>,

    /// Play a sound on detected score changes
    #[arg(long, env = "SOUND_ALERTS", default_value = "false")]
    pub sound_alerts: bool,

    /// Post a local notification on detected score changes
    #[arg(long, env = "NOTIFICATION_ALERTS", default_value = "false")]
    pub notification_alerts: bool,

    /// Stream live updates for this match id over the channel client
    #[arg(long, env = "FOLLOW_MATCH")]
    pub follow_match: Option<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.api_url)
            .map_err(|e| anyhow::anyhow!("invalid api url '{}': {}", self.api_url, e))?;
        let ws = url::Url::parse(&self.ws_url)
            .map_err(|e| anyhow::anyhow!("invalid ws url '{}': {}", self.ws_url, e))?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            anyhow::bail!("ws url must use the ws:// or wss:// scheme");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        if self.monitor_interval_secs == 0 {
            anyhow::bail!("monitor_interval_secs must be positive");
        }
        if self.reconnect_base_ms == 0 {
            anyhow::bail!("reconnect_base_ms must be positive");
        }
        if self.reconnect_max_ms < self.reconnect_base_ms {
            anyhow::bail!("reconnect_max_ms must be >= reconnect_base_ms");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn hidden_poll_interval(&self) -> Option<Duration> {
        self.hidden_poll_interval_secs.map(Duration::from_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn feed_config(&self) -> MatchFeedConfig {
        MatchFeedConfig {
            url: self.ws_url.clone(),
            base_delay: Duration::from_millis(self.reconnect_base_ms),
            max_delay: Duration::from_millis(self.reconnect_max_ms),
            max_attempts: self.reconnect_max_attempts,
            buffer_capacity: self.feed_buffer_capacity,
            ..MatchFeedConfig::new(self.ws_url.clone())
        }
    }
}
