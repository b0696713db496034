//! # Timer Keys and Payloads
//!
//! Every wait state in a case is backed by exactly one scheduled callback,
//! keyed by `(case, purpose)`. The purpose tag is a closed enum dispatched
//! through a single `match` in the engine's timer entry point, so the whole
//! timeout-recovery surface is auditable in one place.
//!
//! Re-arming a key replaces the pending callback and real responses cancel
//! by key before proceeding, which gives the callback and the response
//! at-most-once semantics between them.

use serde::{Deserialize, Serialize};

use veridex_core::{CaseId, RoundId};

/// What a pending callback is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimerPurpose {
    /// Waiting for a respondent to answer a complaint or a reappeal.
    RespondAppeal,
    /// Waiting for selected arbitrators to confirm participation.
    RespondArbitrate,
    /// Waiting for confirmed arbitrators to upload votes.
    UploadResult,
    /// Holding the reappeal window open after a round was tallied.
    ReappealWindow,
}

impl TimerPurpose {
    /// The canonical string name of this purpose.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RespondAppeal => "RESPOND_APPEAL",
            Self::RespondArbitrate => "RESPOND_ARBITRATE",
            Self::UploadResult => "UPLOAD_RESULT",
            Self::ReappealWindow => "REAPPEAL_WINDOW",
        }
    }
}

impl std::fmt::Display for TimerPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The replace-by-key identity of a scheduled callback.
///
/// One key per `(case, purpose)` pair: a case never has two pending
/// callbacks for the same purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerKey {
    /// The case the callback belongs to.
    pub case: CaseId,
    /// What the callback is waiting for.
    pub purpose: TimerPurpose,
}

impl TimerKey {
    /// Build a key for `case` and `purpose`.
    pub fn new(case: CaseId, purpose: TimerPurpose) -> Self {
        Self { case, purpose }
    }
}

impl std::fmt::Display for TimerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.case, self.purpose)
    }
}

/// The payload stored with a scheduled callback and handed back to the
/// engine when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerPayload {
    /// The case the callback targets.
    pub case: CaseId,
    /// The round that was current when the callback was armed, if any.
    pub round: Option<RoundId>,
    /// What the callback was waiting for.
    pub purpose: TimerPurpose,
}

impl TimerPayload {
    /// The replace-by-key identity for this payload.
    pub fn key(&self) -> TimerKey {
        TimerKey::new(self.case, self.purpose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display() {
        let key = TimerKey::new(CaseId::new(4), TimerPurpose::UploadResult);
        assert_eq!(format!("{key}"), "case:4/UPLOAD_RESULT");
    }

    #[test]
    fn payload_key_matches_fields() {
        let payload = TimerPayload {
            case: CaseId::new(1),
            round: Some(RoundId::new(2)),
            purpose: TimerPurpose::ReappealWindow,
        };
        assert_eq!(
            payload.key(),
            TimerKey::new(CaseId::new(1), TimerPurpose::ReappealWindow)
        );
    }

    #[test]
    fn purposes_are_distinct_keys() {
        let a = TimerKey::new(CaseId::new(1), TimerPurpose::RespondAppeal);
        let b = TimerKey::new(CaseId::new(1), TimerPurpose::RespondArbitrate);
        assert_ne!(a, b);
    }
}
