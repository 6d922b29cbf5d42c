//! Normalization of scheduler-reported node states.
//!
//! Every consumer (alert engine, history store, status display) classifies
//! through [`CanonicalState::classify`], so counts in history and live status
//! always agree.

use serde::{Deserialize, Serialize};

/// The normalized form of a raw Slurm node state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum CanonicalState {
    Idle,
    Mixed,
    Allocated,
    DownOrUnknown,
}

/// Ordered substring rules; the first match wins.
const RULES: [(&str, CanonicalState); 3] = [
    ("idle", CanonicalState::Idle),
    ("mixed", CanonicalState::Mixed),
    ("alloc", CanonicalState::Allocated),
];

impl CanonicalState {
    /// Classifies a raw state such as `idle*`, `MIXED` or `drained`.
    ///
    /// Trailing `*` markers are stripped and the text is lowercased before
    /// matching. Anything that matches no rule is [`CanonicalState::DownOrUnknown`].
    pub fn classify(raw_state: &str) -> Self {
        let normalized = raw_state.trim_end_matches('*').to_lowercase();
        RULES
            .iter()
            .find(|(needle, _)| normalized.contains(needle))
            .map(|(_, state)| *state)
            .unwrap_or(CanonicalState::DownOrUnknown)
    }

    /// Small integer code used by the node snapshot log.
    pub fn code(self) -> u8 {
        match self {
            CanonicalState::Idle => 0,
            CanonicalState::Mixed => 1,
            CanonicalState::Allocated => 2,
            CanonicalState::DownOrUnknown => 3,
        }
    }

    /// Inverse of [`CanonicalState::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CanonicalState::Idle),
            1 => Some(CanonicalState::Mixed),
            2 => Some(CanonicalState::Allocated),
            3 => Some(CanonicalState::DownOrUnknown),
            _ => None,
        }
    }

    /// Idle and Mixed nodes count as available for alerting.
    pub fn is_available(self) -> bool {
        matches!(self, CanonicalState::Idle | CanonicalState::Mixed)
    }

    pub fn label(self) -> &'static str {
        match self {
            CanonicalState::Idle => "Idle",
            CanonicalState::Mixed => "Mixed",
            CanonicalState::Allocated => "Allocated",
            CanonicalState::DownOrUnknown => "Down",
        }
    }
}

impl std::fmt::Display for CanonicalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_basic_states() {
        assert_eq!(CanonicalState::classify("idle"), CanonicalState::Idle);
        assert_eq!(CanonicalState::classify("mixed"), CanonicalState::Mixed);
        assert_eq!(CanonicalState::classify("allocated"), CanonicalState::Allocated);
        assert_eq!(CanonicalState::classify("alloc"), CanonicalState::Allocated);
        assert_eq!(CanonicalState::classify("down"), CanonicalState::DownOrUnknown);
        assert_eq!(CanonicalState::classify("drained"), CanonicalState::DownOrUnknown);
        assert_eq!(CanonicalState::classify(""), CanonicalState::DownOrUnknown);
    }

    #[test]
    fn test_classify_is_case_insensitive_and_strips_markers() {
        assert_eq!(CanonicalState::classify("IDLE*"), CanonicalState::Idle);
        assert_eq!(CanonicalState::classify("Mixed**"), CanonicalState::Mixed);
        assert_eq!(CanonicalState::classify("ALLOCATED*"), CanonicalState::Allocated);
    }

    #[test]
    fn test_classify_uses_substring_match_in_order() {
        // Slurm compound states keep their base state as a substring.
        assert_eq!(CanonicalState::classify("idle+drain"), CanonicalState::Idle);
        assert_eq!(CanonicalState::classify("mixed-"), CanonicalState::Mixed);
        // "mix" alone is not "mixed".
        assert_eq!(CanonicalState::classify("mix"), CanonicalState::DownOrUnknown);
    }

    #[test]
    fn test_codes_round_trip() {
        for state in [
            CanonicalState::Idle,
            CanonicalState::Mixed,
            CanonicalState::Allocated,
            CanonicalState::DownOrUnknown,
        ] {
            assert_eq!(CanonicalState::from_code(state.code()), Some(state));
        }
        assert_eq!(CanonicalState::from_code(4), None);
    }

    #[test]
    fn test_availability() {
        assert!(CanonicalState::Idle.is_available());
        assert!(CanonicalState::Mixed.is_available());
        assert!(!CanonicalState::Allocated.is_available());
        assert!(!CanonicalState::DownOrUnknown.is_available());
    }
}
