//! # Arbitration Error Types
//!
//! Structured error hierarchy for the arbitration engine. Every variant
//! carries enough diagnostic context for operators to act without reading
//! logs: identifiers, the state at the time of failure, and the rejected
//! action.
//!
//! The variants group into the engine's failure taxonomy: validation
//! failures (unknown entities, malformed values — rejected before any state
//! change), authorization failures, state conflicts (the action is real but
//! the case's current step disallows it), resource exhaustion (the
//! arbitrator pool cannot fill a quorum), accounting failures, and fatal
//! ledger corruption. Timer callbacks that find their precondition already
//! superseded are `Ok` no-ops, never errors.

use thiserror::Error;

use veridex_core::{AccountId, AmountError, CaseId, RoundId, ServiceId};

use crate::ports::{ServiceStatus, TransferError};

/// Errors arising from arbitration operations.
#[derive(Error, Debug)]
pub enum ArbitrationError {
    // ── Validation ───────────────────────────────────────────────────

    /// The referenced case does not exist.
    #[error("unknown case {0}")]
    UnknownCase(CaseId),

    /// The referenced round does not exist.
    #[error("unknown round {0}")]
    UnknownRound(RoundId),

    /// The referenced service does not exist in the directory.
    #[error("unknown service {0}")]
    UnknownService(ServiceId),

    /// The account is not a registered arbitrator.
    #[error("account {0} is not a registered arbitrator")]
    UnknownArbitrator(AccountId),

    /// A vote value outside {0, 1} was submitted.
    #[error("vote value must be 0 or 1, got {0}")]
    InvalidVote(u8),

    /// The arbitrator already cast a vote in this round.
    #[error("arbitrator {arbitrator} already voted in round {round}")]
    AlreadyVoted {
        /// The round the duplicate vote targeted.
        round: RoundId,
        /// The arbitrator that voted twice.
        arbitrator: AccountId,
    },

    /// A monetary value failed validation or arithmetic.
    #[error("amount error: {0}")]
    Amount(#[from] AmountError),

    // ── Authorization ────────────────────────────────────────────────

    /// The caller is not entitled to perform this action on the case.
    #[error("account {account} is not authorized to {action} on case {case}")]
    Unauthorized {
        /// The calling account.
        account: AccountId,
        /// The attempted action.
        action: &'static str,
        /// The target case.
        case: CaseId,
    },

    // ── State conflicts ──────────────────────────────────────────────

    /// The case's current step disallows the attempted action.
    #[error("case {case} cannot {action} in step {step}")]
    StateConflict {
        /// The target case.
        case: CaseId,
        /// The case's current step name.
        step: &'static str,
        /// The attempted action.
        action: &'static str,
    },

    /// A service already has an appeal awaiting response.
    #[error("service {service} already has an appeal awaiting response")]
    AppealPending {
        /// The disputed service.
        service: ServiceId,
    },

    /// The arbitrator is already registered.
    #[error("arbitrator {0} already registered")]
    AlreadyRegistered(AccountId),

    /// The arbitrator already confirmed participation in this round.
    #[error("arbitrator {arbitrator} already confirmed for round {round}")]
    AlreadyConfirmed {
        /// The round the duplicate confirmation targeted.
        round: RoundId,
        /// The arbitrator that confirmed twice.
        arbitrator: AccountId,
    },

    /// The offered participation stake is below the required amount.
    #[error("participation stake {offered} is below the required {required}")]
    InsufficientStake {
        /// The required stake in smallest units.
        required: i64,
        /// The offered stake in smallest units.
        offered: i64,
    },

    /// The service is not in a disputable state.
    #[error("service {service} is {status}, complaints require an active service")]
    ServiceUnavailable {
        /// The disputed service.
        service: ServiceId,
        /// The status reported by the directory.
        status: ServiceStatus,
    },

    /// The service has no registered providers to respond to a dispute.
    #[error("service {0} has no providers")]
    NoProviders(ServiceId),

    // ── Resource exhaustion ──────────────────────────────────────────

    /// Even the full crowd pool cannot fill the required quorum.
    #[error(
        "no eligible arbitrators: {eligible} available for a quorum of {required} \
         (pool exhausted after crowd escalation)"
    )]
    NoEligibleArbitrators {
        /// The quorum size that could not be filled.
        required: u64,
        /// Eligible candidates actually available.
        eligible: u64,
    },

    // ── Accounting ───────────────────────────────────────────────────

    /// A debit exceeded the account's escrow balance.
    #[error(
        "insufficient balance for {account} in case {case}: requested {requested}, held {held}"
    )]
    InsufficientBalance {
        /// The case whose escrow was debited.
        case: CaseId,
        /// The account being debited.
        account: AccountId,
        /// The requested debit in smallest units.
        requested: i64,
        /// The held balance in smallest units.
        held: i64,
    },

    /// Settlement was invoked a second time for the same case.
    #[error("case {0} is already settled")]
    AlreadySettled(CaseId),

    /// A fund transfer through the host port failed.
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    // ── Fatal ────────────────────────────────────────────────────────

    /// The escrow ledger reported an impossible state (e.g., a negative
    /// balance). The enclosing transition must abort; nothing may be
    /// persisted.
    #[error("escrow ledger corruption in case {case}: account {account} holds {held}")]
    LedgerCorruption {
        /// The affected case.
        case: CaseId,
        /// The account with the impossible balance.
        account: AccountId,
        /// The observed balance in smallest units.
        held: i64,
    },
}
