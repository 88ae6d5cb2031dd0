//! Recommendation round lifecycle.
//!
//! A round moves through a small state machine:
//! `pending → ready | failed`, then `ready | failed → consumed` via an
//! explicit selection request. No other transition is reachable.

use serde::{Deserialize, Serialize};

/// Round lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    /// Generation in flight (initial)
    Pending,
    /// Candidates persisted and pollable
    Ready,
    /// Generation errored or produced unusable output
    Failed,
    /// Selection processed (terminal)
    Consumed,
}

impl RoundStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoundStatus::Pending => "pending",
            RoundStatus::Ready => "ready",
            RoundStatus::Failed => "failed",
            RoundStatus::Consumed => "consumed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RoundStatus::Pending),
            "ready" => Some(RoundStatus::Ready),
            "failed" => Some(RoundStatus::Failed),
            "consumed" => Some(RoundStatus::Consumed),
            _ => None,
        }
    }

    /// Whether the round's item list is exposed to clients.
    ///
    /// Pending rounds may not have items yet; failed rounds may have partial,
    /// meaningless ones. Both report an empty list by contract.
    pub fn exposes_items(self) -> bool {
        matches!(self, RoundStatus::Ready | RoundStatus::Consumed)
    }

    /// Whether a selection request may consume a round in this state.
    pub fn selectable(self) -> bool {
        matches!(self, RoundStatus::Ready | RoundStatus::Failed)
    }

    /// Legal state-machine edges.
    pub fn can_become(self, next: RoundStatus) -> bool {
        matches!(
            (self, next),
            (RoundStatus::Pending, RoundStatus::Ready)
                | (RoundStatus::Pending, RoundStatus::Failed)
                | (RoundStatus::Ready, RoundStatus::Consumed)
                | (RoundStatus::Failed, RoundStatus::Consumed)
        )
    }
}

impl std::fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RoundStatus; 4] = [
        RoundStatus::Pending,
        RoundStatus::Ready,
        RoundStatus::Failed,
        RoundStatus::Consumed,
    ];

    #[test]
    fn test_only_four_edges_are_legal() {
        let mut legal = Vec::new();
        for from in ALL {
            for to in ALL {
                if from.can_become(to) {
                    legal.push((from, to));
                }
            }
        }
        assert_eq!(
            legal,
            vec![
                (RoundStatus::Pending, RoundStatus::Ready),
                (RoundStatus::Pending, RoundStatus::Failed),
                (RoundStatus::Ready, RoundStatus::Consumed),
                (RoundStatus::Failed, RoundStatus::Consumed),
            ]
        );
    }

    #[test]
    fn test_consumed_is_terminal() {
        for to in ALL {
            assert!(!RoundStatus::Consumed.can_become(to));
        }
    }

    #[test]
    fn test_items_exposed_only_when_ready_or_consumed() {
        assert!(!RoundStatus::Pending.exposes_items());
        assert!(!RoundStatus::Failed.exposes_items());
        assert!(RoundStatus::Ready.exposes_items());
        assert!(RoundStatus::Consumed.exposes_items());
    }

    #[test]
    fn test_parse_round_trips_as_str() {
        for status in ALL {
            assert_eq!(RoundStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RoundStatus::parse("bogus"), None);
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&RoundStatus::Pending).unwrap(),
            "\"pending\""
        );
        let status: RoundStatus = serde_json::from_str("\"consumed\"").unwrap();
        assert_eq!(status, RoundStatus::Consumed);
    }
}
