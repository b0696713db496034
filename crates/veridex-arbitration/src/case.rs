//! # Cases, Rounds, and Appeals
//!
//! The data model of the arbitration state machine. A [`Case`] spans one
//! or more [`Round`]s; each round carries its own quorum requirement and
//! vote set. An [`Appeal`] records who complained and why; at most one
//! appeal per service is awaiting response at a time.
//!
//! ## Design Choice: Validated Enum over Typestate
//!
//! [`CaseStep`] is a runtime-checked enum rather than a typestate. Cases
//! are stored in host state and crossed over serialization boundaries
//! where the step is not known at compile time, and the timer entry point
//! must be able to inspect any case's step dynamically. Every transition
//! method validates the current step and rejects with a structured
//! `StateConflict` otherwise.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use veridex_core::{AccountId, AppealId, CaseId, RoundId, ServiceId, Timestamp, VoteRecordId};

use crate::error::ArbitrationError;
use crate::escrow::Side;

// ── Method and steps ───────────────────────────────────────────────────

/// How a case is arbitrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbitrationMethod {
    /// Professional arbitration with escalating multi-round appeals.
    MultiRound,
    /// Crowd arbitration: a larger, lower-barrier pool, no appeals.
    Crowd,
}

impl ArbitrationMethod {
    /// The canonical string name of this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MultiRound => "MULTI_ROUND",
            Self::Crowd => "CROWD",
        }
    }
}

impl std::fmt::Display for ArbitrationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The lifecycle step of a case.
///
/// Professional track: `Init → ChoosingArbitrators → Responded → Started`,
/// then either `Ended` (settled) or `Reappeal → ChoosingArbitrators` for
/// the next round. The crowd track mirrors the middle steps; once a case
/// escalates to the crowd track it never returns. `Ended` and
/// `ReappealTimeoutEnded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseStep {
    /// Complaint filed, waiting for a respondent.
    Init,
    /// Selecting professional arbitrators for the current round.
    ChoosingArbitrators,
    /// At least one arbitrator confirmed; quorum not yet reached.
    Responded,
    /// Quorum confirmed; votes are being collected.
    Started,
    /// A reappeal was filed; waiting for the opposite side to re-respond.
    Reappeal,
    /// Selecting crowd arbitrators after escalation.
    CrowdChoosingArbitrators,
    /// At least one crowd arbitrator confirmed; quorum not yet reached.
    CrowdResponded,
    /// Crowd quorum confirmed; votes are being collected.
    CrowdStarted,
    /// The case is settled. Terminal.
    Ended,
    /// The case ended because nobody answered a reappeal. Terminal.
    ReappealTimeoutEnded,
}

impl CaseStep {
    /// The canonical string name of this step.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::ChoosingArbitrators => "CHOOSING_ARBITRATORS",
            Self::Responded => "RESPONDED",
            Self::Started => "STARTED",
            Self::Reappeal => "REAPPEAL",
            Self::CrowdChoosingArbitrators => "CROWD_CHOOSING_ARBITRATORS",
            Self::CrowdResponded => "CROWD_RESPONDED",
            Self::CrowdStarted => "CROWD_STARTED",
            Self::Ended => "ENDED",
            Self::ReappealTimeoutEnded => "REAPPEAL_TIMEOUT_ENDED",
        }
    }

    /// Whether this step is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::ReappealTimeoutEnded)
    }

    /// Whether this step is on the crowd track.
    pub fn is_crowd_track(&self) -> bool {
        matches!(
            self,
            Self::CrowdChoosingArbitrators | Self::CrowdResponded | Self::CrowdStarted
        )
    }

    /// The step entered when arbitrator selection begins, for the given
    /// method.
    pub fn choosing(method: ArbitrationMethod) -> Self {
        match method {
            ArbitrationMethod::MultiRound => Self::ChoosingArbitrators,
            ArbitrationMethod::Crowd => Self::CrowdChoosingArbitrators,
        }
    }

    /// The step entered when the first arbitrator confirms.
    pub fn responded(method: ArbitrationMethod) -> Self {
        match method {
            ArbitrationMethod::MultiRound => Self::Responded,
            ArbitrationMethod::Crowd => Self::CrowdResponded,
        }
    }

    /// The step entered when the arbitrator quorum is full.
    pub fn started(method: ArbitrationMethod) -> Self {
        match method {
            ArbitrationMethod::MultiRound => Self::Started,
            ArbitrationMethod::Crowd => Self::CrowdStarted,
        }
    }
}

impl std::fmt::Display for CaseStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Votes ──────────────────────────────────────────────────────────────

/// An arbitrator's verdict on a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteChoice {
    /// Vote `0`: the responding side is in the right.
    Respondent,
    /// Vote `1`: the appealing side is in the right.
    Applicant,
}

impl VoteChoice {
    /// Parse the wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`ArbitrationError::InvalidVote`] for values outside
    /// `{0, 1}`.
    pub fn from_wire(value: u8) -> Result<Self, ArbitrationError> {
        match value {
            0 => Ok(Self::Respondent),
            1 => Ok(Self::Applicant),
            other => Err(ArbitrationError::InvalidVote(other)),
        }
    }

    /// The wire representation.
    pub fn as_wire(&self) -> u8 {
        match self {
            Self::Respondent => 0,
            Self::Applicant => 1,
        }
    }
}

/// One cast vote within a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    /// The arbitrator that cast the vote.
    pub arbitrator: AccountId,
    /// The verdict.
    pub choice: VoteChoice,
}

/// An append-only record of one cast vote, kept for post-hoc correctness
/// scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    /// Record identifier.
    pub id: VoteRecordId,
    /// The case the vote was cast in.
    pub case_id: CaseId,
    /// The round the vote was cast in.
    pub round_id: RoundId,
    /// The voting arbitrator.
    pub arbitrator: AccountId,
    /// The verdict.
    pub choice: VoteChoice,
}

/// The append-only vote ledger across all cases.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VoteLedger {
    records: Vec<VoteRecord>,
    next_id: u64,
}

impl VoteLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vote record.
    pub fn append(
        &mut self,
        case_id: CaseId,
        round_id: RoundId,
        arbitrator: AccountId,
        choice: VoteChoice,
    ) -> VoteRecordId {
        let id = VoteRecordId::new(self.next_id);
        self.next_id += 1;
        self.records.push(VoteRecord {
            id,
            case_id,
            round_id,
            arbitrator,
            choice,
        });
        id
    }

    /// Per-arbitrator `(matching, total)` vote counts for one case against
    /// the winning choice. Input to the settlement-time correctness update.
    pub fn case_score(
        &self,
        case_id: CaseId,
        winning: VoteChoice,
    ) -> BTreeMap<AccountId, (u64, u64)> {
        let mut scores: BTreeMap<AccountId, (u64, u64)> = BTreeMap::new();
        for record in self.records.iter().filter(|r| r.case_id == case_id) {
            let entry = scores.entry(record.arbitrator.clone()).or_insert((0, 0));
            entry.1 += 1;
            if record.choice == winning {
                entry.0 += 1;
            }
        }
        scores
    }

    /// All records, in append order.
    pub fn records(&self) -> &[VoteRecord] {
        &self.records
    }
}

// ── Evidence ───────────────────────────────────────────────────────────

/// A piece of evidence submitted to a round by a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceEntry {
    /// The submitting account.
    pub account: AccountId,
    /// Free-form evidence text (typically an off-chain locator).
    pub text: String,
    /// When the evidence was submitted.
    pub submitted_at: Timestamp,
}

// ── Rounds ─────────────────────────────────────────────────────────────

/// The arbitrator quorum for a round at `sequence` (1-based): `2^n + 1`.
pub fn required_for_sequence(sequence: u32) -> u64 {
    2u64.saturating_pow(sequence) + 1
}

/// One escalation cycle within a case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// Round identifier.
    pub id: RoundId,
    /// The case this round belongs to.
    pub case_id: CaseId,
    /// 1-based escalation sequence within the case.
    pub sequence: u32,
    /// Arbitrators required to confirm before voting starts.
    pub required_arbitrators: u64,
    /// Accounts that answered the appeal this round.
    pub responders: BTreeSet<AccountId>,
    /// Arbitrators confirmed into this round.
    pub arbitrators: BTreeSet<AccountId>,
    /// Votes cast this round, in arrival order.
    pub votes: Vec<Vote>,
    /// Evidence submitted this round.
    pub evidence: Vec<EvidenceEntry>,
    /// The tallied result, once the quorum fired.
    pub tallied_result: Option<VoteChoice>,
}

impl Round {
    /// Create a fresh round.
    pub fn new(id: RoundId, case_id: CaseId, sequence: u32, required_arbitrators: u64) -> Self {
        Self {
            id,
            case_id,
            sequence,
            required_arbitrators,
            responders: BTreeSet::new(),
            arbitrators: BTreeSet::new(),
            votes: Vec::new(),
            evidence: Vec::new(),
            tallied_result: None,
        }
    }

    /// Whether the arbitrator already voted this round.
    pub fn has_voted(&self, arbitrator: &AccountId) -> bool {
        self.votes.iter().any(|v| &v.arbitrator == arbitrator)
    }

    /// Number of votes cast for `choice`.
    pub fn votes_for(&self, choice: VoteChoice) -> u64 {
        self.votes.iter().filter(|v| v.choice == choice).count() as u64
    }

    /// Whether enough votes arrived to tally: a strict majority of the
    /// required quorum. Tallying at exactly `required / 2` votes would
    /// let a round finalize in which the result bar equals the entire
    /// vote set.
    pub fn quorum_reached(&self) -> bool {
        self.votes.len() as u64 > self.required_arbitrators / 2
    }

    /// Tally the round: the applicant side wins iff its votes reach
    /// `required / 2`. Depends only on vote counts, never on arrival
    /// order.
    pub fn tally(&self) -> VoteChoice {
        if self.votes_for(VoteChoice::Applicant) >= self.required_arbitrators / 2 {
            VoteChoice::Applicant
        } else {
            VoteChoice::Respondent
        }
    }

    /// Record a vote.
    ///
    /// # Errors
    ///
    /// Returns [`ArbitrationError::AlreadyVoted`] on a duplicate.
    pub fn record_vote(
        &mut self,
        arbitrator: AccountId,
        choice: VoteChoice,
    ) -> Result<(), ArbitrationError> {
        if self.has_voted(&arbitrator) {
            return Err(ArbitrationError::AlreadyVoted {
                round: self.id,
                arbitrator,
            });
        }
        self.votes.push(Vote { arbitrator, choice });
        Ok(())
    }

    /// Arbitrators still missing from the confirmation quorum.
    pub fn missing_arbitrators(&self) -> u64 {
        self.required_arbitrators
            .saturating_sub(self.arbitrators.len() as u64)
    }
}

// ── Appeals ────────────────────────────────────────────────────────────

/// The lifecycle status of an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppealStatus {
    /// Filed; the opposing side has not yet responded.
    AwaitingResponse,
    /// The opposing side engaged (or the case ended); no longer blocking
    /// new complaints against the service.
    Closed,
}

/// A filed complaint or reappeal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appeal {
    /// Appeal identifier.
    pub id: AppealId,
    /// The disputed service.
    pub service_id: ServiceId,
    /// The case this appeal belongs to, once one exists.
    pub case_id: Option<CaseId>,
    /// Current status.
    pub status: AppealStatus,
    /// Whether this appeal opened a fresh dispute (first complainant).
    pub is_sponsor: bool,
    /// The complaining account.
    pub applicant: AccountId,
    /// When the appeal was filed.
    pub filed_at: Timestamp,
    /// The complainant's stated reason.
    pub reason: String,
}

// ── Cases ──────────────────────────────────────────────────────────────

/// One arbitration dispute over a service, spanning one or more rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    /// Case identifier.
    pub id: CaseId,
    /// The disputed service.
    pub service_id: ServiceId,
    /// The appeal that opened the case.
    pub appeal_id: AppealId,
    /// Arbitration method; flips to crowd permanently on escalation.
    pub method: ArbitrationMethod,
    /// Current lifecycle step.
    pub step: CaseStep,
    /// Deadline of the step's pending wait, mirrored from the armed timer.
    pub deadline: Timestamp,
    /// Quorum requirement of the current round.
    pub required_arbitrators: u64,
    /// Every account that appealed into the case, across rounds.
    pub applicants: BTreeSet<AccountId>,
    /// Every arbitrator confirmed into the case, across rounds. Feeds the
    /// settlement-time correctness update; never reset.
    pub arbitrators: BTreeSet<AccountId>,
    /// Selection exclusion set. Grows with each confirmation, cleared once
    /// when the case escalates to the crowd track.
    pub excluded_arbitrators: BTreeSet<AccountId>,
    /// Whether the currently responding side is the provider side.
    pub is_respondent_provider: bool,
    /// The final ruling, once terminal.
    pub final_ruling: FinalRuling,
    /// The economic side that won, once terminal.
    pub final_winner: Option<Side>,
    /// The round whose tally became the final result.
    pub last_round: Option<RoundId>,
    /// All rounds of the case, oldest first.
    pub rounds: Vec<RoundId>,
    /// Set once settlement has run; guards idempotence.
    pub settled: bool,
    /// When the case was opened.
    pub created_at: Timestamp,
}

/// The final outcome of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalRuling {
    /// No outcome yet.
    Undetermined,
    /// The appealing side prevailed.
    ApplicantWins,
    /// The responding side prevailed.
    RespondentWins,
}

impl FinalRuling {
    /// Map a round tally onto a final ruling.
    pub fn from_tally(choice: VoteChoice) -> Self {
        match choice {
            VoteChoice::Applicant => Self::ApplicantWins,
            VoteChoice::Respondent => Self::RespondentWins,
        }
    }

    /// The tally choice this ruling corresponds to, if determined.
    pub fn as_tally(&self) -> Option<VoteChoice> {
        match self {
            Self::Undetermined => None,
            Self::ApplicantWins => Some(VoteChoice::Applicant),
            Self::RespondentWins => Some(VoteChoice::Respondent),
        }
    }
}

impl Case {
    /// Open a new case in `Init`, waiting for a respondent.
    pub fn open(
        id: CaseId,
        service_id: ServiceId,
        appeal_id: AppealId,
        method: ArbitrationMethod,
        applicant: AccountId,
        deadline: Timestamp,
    ) -> Self {
        let mut applicants = BTreeSet::new();
        applicants.insert(applicant);
        Self {
            id,
            service_id,
            appeal_id,
            method,
            step: CaseStep::Init,
            deadline,
            required_arbitrators: required_for_sequence(1),
            applicants,
            arbitrators: BTreeSet::new(),
            excluded_arbitrators: BTreeSet::new(),
            // Round 1 respondents are the service's providers.
            is_respondent_provider: true,
            final_ruling: FinalRuling::Undetermined,
            final_winner: None,
            last_round: None,
            rounds: Vec::new(),
            settled: false,
            created_at: Timestamp::now(),
        }
    }

    /// The current (most recent) round, if any exists.
    pub fn current_round(&self) -> Option<RoundId> {
        self.rounds.last().copied()
    }

    /// Require the case to be in one of `allowed` steps.
    ///
    /// # Errors
    ///
    /// Returns [`ArbitrationError::StateConflict`] naming the current step
    /// and the rejected action.
    pub fn require_step(
        &self,
        allowed: &[CaseStep],
        action: &'static str,
    ) -> Result<(), ArbitrationError> {
        if allowed.contains(&self.step) {
            return Ok(());
        }
        Err(ArbitrationError::StateConflict {
            case: self.id,
            step: self.step.as_str(),
            action,
        })
    }

    /// Mark an arbitrator as confirmed into the case: joins the cumulative
    /// set and the selection exclusion set.
    pub fn confirm_arbitrator(&mut self, arbitrator: AccountId) {
        self.arbitrators.insert(arbitrator.clone());
        self.excluded_arbitrators.insert(arbitrator);
    }

    /// Escalate the case onto the crowd track: the method flips
    /// permanently and the selection exclusion set starts fresh (the crowd
    /// pool re-admits every non-malicious arbitrator).
    pub fn escalate_to_crowd(&mut self) {
        self.method = ArbitrationMethod::Crowd;
        self.step = CaseStep::CrowdChoosingArbitrators;
        self.excluded_arbitrators.clear();
    }
}
