//! Score-change detection against per-match baselines.
//!
//! The tracker never alerts on a match's first sighting (there is nothing
//! to compare against) and treats scores as monotonically non-decreasing
//! for alerting: a decrease is a provider correction that silently moves
//! the baseline. The baseline is replaced on every observation, so an
//! unchanged score can never re-alert.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::MatchState;

/// Last-observed score line for one monitored match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreSnapshot {
    pub home_score: u32,
    pub away_score: u32,
    pub home_team: String,
    pub away_team: String,
    pub league_id: String,
    pub league: String,
}

impl ScoreSnapshot {
    fn of(m: &MatchState) -> Self {
        ScoreSnapshot {
            home_score: m.home_score,
            away_score: m.away_score,
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            league_id: m.league_id.clone(),
            league: m.league.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringSide {
    Home,
    Away,
}

/// One detected score increase. Emitted at most once per observation.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreAlert {
    pub match_id: String,
    pub side: ScoringSide,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    pub league: String,
    pub detected_at: DateTime<Utc>,
}

impl ScoreAlert {
    pub fn scoring_team(&self) -> &str {
        match self.side {
            ScoringSide::Home => &self.home_team,
            ScoringSide::Away => &self.away_team,
        }
    }

    /// Score line as displayed, e.g. "2-0".
    pub fn score_line(&self) -> String {
        format!("{}-{}", self.home_score, self.away_score)
    }
}

/// Per-match score baselines for all currently monitored matches.
#[derive(Debug, Default)]
pub struct ScoreTracker {
    snapshots: HashMap<String, ScoreSnapshot>,
}

impl ScoreTracker {
    pub fn new() -> Self {
        ScoreTracker::default()
    }

    /// Feed one observation. Returns an alert when either side's score
    /// strictly increased against the stored baseline; the baseline is
    /// replaced either way.
    pub fn observe(&mut self, current: &MatchState) -> Option<ScoreAlert> {
        let side = match self.snapshots.get(&current.id) {
            // Cold start: baseline only, never an alert.
            None => None,
            Some(prev) => {
                if current.home_score > prev.home_score {
                    Some(ScoringSide::Home)
                } else if current.away_score > prev.away_score {
                    Some(ScoringSide::Away)
                } else {
                    None
                }
            }
        };

        self.snapshots
            .insert(current.id.clone(), ScoreSnapshot::of(current));

        side.map(|side| ScoreAlert {
            match_id: current.id.clone(),
            side,
            home_team: current.home_team.clone(),
            away_team: current.away_team.clone(),
            home_score: current.home_score,
            away_score: current.away_score,
            league: current.league.clone(),
            detected_at: Utc::now(),
        })
    }

    /// Drop baselines for matches whose league left the monitored set.
    pub fn retain_leagues(&mut self, monitored: &HashSet<String>) {
        self.snapshots
            .retain(|_, snapshot| monitored.contains(&snapshot.league_id));
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchPhase;

    fn observation(home: u32, away: u32) -> MatchState {
        MatchState {
            id: "m-1".into(),
            league_id: "epl".into(),
            league: "Premier League".into(),
            home_team: "Arsenal".into(),
            away_team: "Chelsea".into(),
            home_score: home,
            away_score: away,
            phase: MatchPhase::SecondHalf,
            clock: Some("61'".into()),
        }
    }

    #[test]
    fn test_first_sighting_never_alerts() {
        let mut tracker = ScoreTracker::new();
        assert!(tracker.observe(&observation(3, 2)).is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_home_increase_alerts_once() {
        let mut tracker = ScoreTracker::new();
        tracker.observe(&observation(1, 0));

        let alert = tracker.observe(&observation(2, 0)).expect("alert expected");
        assert_eq!(alert.side, ScoringSide::Home);
        assert_eq!(alert.scoring_team(), "Arsenal");
        assert_eq!(alert.score_line(), "2-0");
        assert_eq!(alert.league, "Premier League");

        // Same score next cycle: no re-alert.
        assert!(tracker.observe(&observation(2, 0)).is_none());
    }

    #[test]
    fn test_away_increase_identifies_away_side() {
        let mut tracker = ScoreTracker::new();
        tracker.observe(&observation(0, 0));
        let alert = tracker.observe(&observation(0, 1)).expect("alert expected");
        assert_eq!(alert.side, ScoringSide::Away);
        assert_eq!(alert.scoring_team(), "Chelsea");
        assert_eq!(alert.score_line(), "0-1");
    }

    #[test]
    fn test_decrease_rebaselines_silently() {
        let mut tracker = ScoreTracker::new();
        tracker.observe(&observation(2, 1));

        // Provider correction: away goal disallowed.
        assert!(tracker.observe(&observation(2, 0)).is_none());

        // The corrected baseline alerts normally on the next increase.
        let alert = tracker.observe(&observation(2, 1)).expect("alert expected");
        assert_eq!(alert.side, ScoringSide::Away);
        assert_eq!(alert.score_line(), "2-1");
    }

    #[test]
    fn test_both_sides_increasing_emits_one_alert() {
        let mut tracker = ScoreTracker::new();
        tracker.observe(&observation(0, 0));
        let alert = tracker.observe(&observation(1, 1)).expect("alert expected");
        assert_eq!(alert.side, ScoringSide::Home);
        assert!(tracker.observe(&observation(1, 1)).is_none());
    }

    #[test]
    fn test_retain_leagues_drops_unmonitored_baselines() {
        let mut tracker = ScoreTracker::new();
        tracker.observe(&observation(1, 0));
        let mut other = observation(0, 0);
        other.id = "m-2".into();
        other.league_id = "laliga".into();
        tracker.observe(&other);
        assert_eq!(tracker.len(), 2);

        let monitored: HashSet<String> = ["laliga".to_string()].into_iter().collect();
        tracker.retain_leagues(&monitored);
        assert_eq!(tracker.len(), 1);

        // The dropped match is a cold start again: no alert on re-entry.
        assert!(tracker.observe(&observation(2, 0)).is_none());
    }
}
