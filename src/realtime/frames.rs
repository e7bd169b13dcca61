//! Wire frames for the live update channel.
//!
//! Outbound: a single subscribe frame naming the target and the requested
//! tiers, sent once per successful channel open. Inbound: a tagged union of
//! `snapshot` / `delta` / `state` / `pong`; only `pong` carries no payload.

use serde::Deserialize;
use serde_json::Value;

/// A subscription tier: an independent channel of detail for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Coarse state updates (score, phase, clock).
    Score,
    /// Fine-grained event log (goals, cards, substitutions).
    Timeline,
}

impl Tier {
    /// Numeric code used on the wire.
    pub fn code(self) -> u8 {
        match self {
            Tier::Score => 0,
            Tier::Timeline => 1,
        }
    }
}

/// What one channel client is subscribed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub match_id: String,
    pub tiers: Vec<Tier>,
}

impl Subscription {
    pub fn new(match_id: impl Into<String>, tiers: Vec<Tier>) -> Self {
        Subscription {
            match_id: match_id.into(),
            tiers,
        }
    }

    /// The subscription a detail view opens: both tiers.
    pub fn detail(match_id: impl Into<String>) -> Self {
        Subscription::new(match_id, vec![Tier::Score, Tier::Timeline])
    }
}

/// Build the subscribe frame sent after every successful channel open.
pub fn subscribe_frame(sub: &Subscription) -> String {
    serde_json::json!({
        "op": "subscribe",
        "target_id": sub.match_id,
        "tiers": sub.tiers.iter().map(|t| t.code()).collect::<Vec<_>>(),
    })
    .to_string()
}

/// Inbound frame union. `pong` is transport-level and never surfaced.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedFrame {
    Snapshot { target_id: String, payload: Value },
    Delta { target_id: String, payload: Value },
    State { target_id: String, payload: Value },
    Pong,
}

impl FeedFrame {
    pub fn target_id(&self) -> Option<&str> {
        match self {
            FeedFrame::Snapshot { target_id, .. }
            | FeedFrame::Delta { target_id, .. }
            | FeedFrame::State { target_id, .. } => Some(target_id),
            FeedFrame::Pong => None,
        }
    }
}

/// Parse an inbound text frame. Malformed frames yield `None` and are
/// dropped by the caller without surfacing an error.
pub fn parse_frame(text: &str) -> Option<FeedFrame> {
    serde_json::from_str(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame_shape() {
        let sub = Subscription::detail("m-42");
        let frame: Value = serde_json::from_str(&subscribe_frame(&sub)).unwrap();
        assert_eq!(
            frame,
            serde_json::json!({
                "op": "subscribe",
                "target_id": "m-42",
                "tiers": [0, 1],
            })
        );
    }

    #[test]
    fn test_single_tier_subscription() {
        let sub = Subscription::new("m-42", vec![Tier::Score]);
        let frame: Value = serde_json::from_str(&subscribe_frame(&sub)).unwrap();
        assert_eq!(frame["tiers"], serde_json::json!([0]));
    }

    #[test]
    fn test_parse_snapshot() {
        let frame = parse_frame(r#"{"type":"snapshot","target_id":"m-1","payload":{"home_score":2}}"#)
            .unwrap();
        assert_eq!(frame.target_id(), Some("m-1"));
        match frame {
            FeedFrame::Snapshot { payload, .. } => assert_eq!(payload["home_score"], 2),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_pong_carries_nothing() {
        let frame = parse_frame(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(frame, FeedFrame::Pong);
        assert_eq!(frame.target_id(), None);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        assert!(parse_frame("not json").is_none());
        assert!(parse_frame(r#"{"type":"snapshot"}"#).is_none(), "missing payload");
        assert!(parse_frame(r#"{"type":"mystery","target_id":"m-1"}"#).is_none());
        assert!(parse_frame(r#"{"target_id":"m-1"}"#).is_none(), "untagged");
    }
}
