use serde::{Deserialize, Serialize};

/// A group of matches the user can monitor (league, tournament, competition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct League {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
}

/// Lifecycle phase of a match as reported by the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Scheduled,
    FirstHalf,
    HalfTime,
    SecondHalf,
    ExtraTime,
    Penalties,
    Finished,
    Postponed,
    Cancelled,
    Abandoned,
}

impl MatchPhase {
    /// True while the clock is running and scores can still change.
    /// Half-time is a break, not a live phase.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            MatchPhase::FirstHalf
                | MatchPhase::SecondHalf
                | MatchPhase::ExtraTime
                | MatchPhase::Penalties
        )
    }
}

/// Current state of a single match as last observed from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchState {
    pub id: String,
    pub league_id: String,
    /// Display label of the league, e.g. "Premier League"
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: u32,
    pub away_score: u32,
    pub phase: MatchPhase,
    /// Provider clock/period text, e.g. "74'" or "HT"
    #[serde(default)]
    pub clock: Option<String>,
}

/// Aggregate live-count snapshot for the current day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodaySummary {
    pub live: u32,
    pub finished: u32,
    pub upcoming: u32,
}

/// An entry in the trending/breaking informational feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingItem {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_phases() {
        assert!(MatchPhase::FirstHalf.is_live());
        assert!(MatchPhase::SecondHalf.is_live());
        assert!(MatchPhase::ExtraTime.is_live());
        assert!(MatchPhase::Penalties.is_live());
        assert!(!MatchPhase::Scheduled.is_live());
        assert!(!MatchPhase::HalfTime.is_live());
        assert!(!MatchPhase::Finished.is_live());
        assert!(!MatchPhase::Postponed.is_live());
        assert!(!MatchPhase::Cancelled.is_live());
    }

    #[test]
    fn test_match_state_deserializes_provider_payload() {
        let raw = r#"{
            "id": "m-1001",
            "league_id": "epl",
            "league": "Premier League",
            "home_team": "Arsenal",
            "away_team": "Chelsea",
            "home_score": 2,
            "away_score": 1,
            "phase": "second_half",
            "clock": "74'"
        }"#;
        let m: MatchState = serde_json::from_str(raw).unwrap();
        assert_eq!(m.phase, MatchPhase::SecondHalf);
        assert_eq!(m.home_score, 2);
        assert_eq!(m.clock.as_deref(), Some("74'"));
    }

    #[test]
    fn test_clock_is_optional() {
        let raw = r#"{
            "id": "m-1002",
            "league_id": "epl",
            "league": "Premier League",
            "home_team": "Leeds",
            "away_team": "Everton",
            "home_score": 0,
            "away_score": 0,
            "phase": "scheduled"
        }"#;
        let m: MatchState = serde_json::from_str(raw).unwrap();
        assert!(m.clock.is_none());
    }
}
