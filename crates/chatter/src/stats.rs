use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::fact::ChatterFact;

/// Statistics mined from one batch's chatter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub pick_sessions: u32,
    pub control_sessions: u32,
    pub video_events: u32,
    /// Problem reports plus errors recorded during control sessions.
    pub problems: u32,
    /// Sorted, without duplicates.
    pub operators: Vec<String>,
    pub total_minutes: u32,
}

impl BatchStats {
    /// All-zero record, used when a batch's chatter could not be read.
    pub fn zeroed() -> Self {
        Self::default()
    }

    pub fn from_facts(facts: &[ChatterFact]) -> Self {
        let mut stats = Self::default();
        let mut operators = BTreeSet::new();

        for fact in facts {
            if let Some(name) = fact.operator().map(str::trim).filter(|n| !n.is_empty()) {
                operators.insert(name.to_string());
            }
            match fact {
                ChatterFact::PickSession {
                    duration_minutes, ..
                } => {
                    stats.pick_sessions += 1;
                    stats.total_minutes = stats
                        .total_minutes
                        .saturating_add(duration_minutes.unwrap_or(0));
                }
                ChatterFact::ControlSession { errors, .. } => {
                    stats.control_sessions += 1;
                    stats.problems = stats.problems.saturating_add(errors.len() as u32);
                }
                ChatterFact::VideoEvent { .. } => stats.video_events += 1,
                ChatterFact::ProblemReport { .. } => stats.problems += 1,
            }
        }

        stats.operators = operators.into_iter().collect();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ChatterMessage;
    use crate::parser::parse_chatter;
    use pickflow_core::MessageId;

    fn msg(id: u64, body: &str) -> ChatterMessage {
        ChatterMessage::new(MessageId::new(id), body)
    }

    #[test]
    fn problems_include_control_errors() {
        let facts = parse_chatter(&[
            msg(1, "[PROBLEM] pallet broken"),
            msg(2, "[PROBLEM] label missing"),
            msg(
                3,
                "<p>Control session by Maria</p><p>Errors:</p><ul><li>a</li><li>b</li><li>c</li></ul>",
            ),
        ]);
        let stats = BatchStats::from_facts(&facts);
        assert_eq!(stats.problems, 5);
        assert_eq!(stats.control_sessions, 1);
        assert_eq!(stats.pick_sessions, 0);
    }

    #[test]
    fn totals_and_operators() {
        let facts = parse_chatter(&[
            msg(1, "Picking session by Zoe in 2h 15m"),
            msg(2, "Picking session by Anna in 45m"),
            msg(3, "Picking session by Zoe"),
            msg(4, "Video by Anna: clip.mp4"),
            msg(5, "lunch break"),
        ]);
        let stats = BatchStats::from_facts(&facts);
        assert_eq!(stats.pick_sessions, 3);
        assert_eq!(stats.video_events, 1);
        assert_eq!(stats.total_minutes, 180);
        assert_eq!(stats.operators, vec!["Anna", "Zoe"]);
    }

    #[test]
    fn completion_narration_counts_toward_totals() {
        let facts = parse_chatter(&[
            msg(1, "<p>pick completed by Anna \u{2014} total time: 2h 15m</p>"),
            msg(2, "Picking finished by Zoe, 30m"),
        ]);
        let stats = BatchStats::from_facts(&facts);
        assert_eq!(stats.pick_sessions, 2);
        assert_eq!(stats.total_minutes, 165);
        assert_eq!(stats.operators, vec!["Anna", "Zoe"]);
    }

    #[test]
    fn empty_chatter_is_zeroed() {
        assert_eq!(BatchStats::from_facts(&[]), BatchStats::zeroed());
    }

    #[test]
    fn serializes_in_camel_case() {
        let json = serde_json::to_value(BatchStats::zeroed()).unwrap();
        assert_eq!(json["pickSessions"], 0);
        assert_eq!(json["totalMinutes"], 0);
        assert!(json["operators"].as_array().unwrap().is_empty());
    }
}
