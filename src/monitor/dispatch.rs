//! Alert side effects: sound and local notification.
//!
//! Both primitives are host capabilities injected behind small traits so
//! the dispatcher is testable without a real audio device or notification
//! daemon. Dispatch is fire-and-forget: no retry, no queue, and a failing
//! collaborator never propagates or blocks the other.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::prefs::Preferences;

use super::detector::ScoreAlert;

/// Host sound-playback primitive.
#[async_trait]
pub trait SoundPlayer: Send + Sync {
    async fn play(&self, alert: &ScoreAlert) -> anyhow::Result<()>;
}

/// Host local-notification primitive.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Whether the host has granted permission to post notifications.
    async fn permission_granted(&self) -> bool;
    async fn notify(&self, title: &str, body: &str) -> anyhow::Result<()>;
}

pub struct AlertDispatcher {
    prefs: Preferences,
    sound: Arc<dyn SoundPlayer>,
    notifier: Arc<dyn Notifier>,
}

impl AlertDispatcher {
    pub fn new(
        prefs: Preferences,
        sound: Arc<dyn SoundPlayer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        AlertDispatcher {
            prefs,
            sound,
            notifier,
        }
    }

    /// Fire the side effects for one alert: sound when the preference is
    /// on, notification when permission is granted. Either, both or
    /// neither may run.
    pub async fn dispatch(&self, alert: &ScoreAlert) {
        if self.prefs.sound_enabled() {
            if let Err(e) = self.sound.play(alert).await {
                debug!("sound collaborator failed: {}", e);
            }
        }

        if self.notifier.permission_granted().await {
            let title = format!("{} scored", alert.scoring_team());
            let body = format!(
                "{} {} {} ({})",
                alert.home_team,
                alert.score_line(),
                alert.away_team,
                alert.league
            );
            if let Err(e) = self.notifier.notify(&title, &body).await {
                debug!("notification collaborator failed: {}", e);
            }
        }
    }
}
