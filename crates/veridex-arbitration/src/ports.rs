//! # Host Ports
//!
//! The engine runs inside a host that owns value custody, wall-clock
//! timers, and the service catalog. Those three collaborators are consumed
//! through the traits in this module; the engine never touches raw
//! balances, clocks, or catalog storage directly.
//!
//! Implementations are expected to be transactional with the enclosing
//! call: if the engine returns an error, the host discards the whole
//! transition including any port effects.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use veridex_core::{AccountId, ServiceId, TokenAmount};

use crate::timer::{TimerKey, TimerPayload};

// ── Value transfer ─────────────────────────────────────────────────────

/// Errors from the host's value-transfer primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The sending account cannot cover the amount.
    #[error("insufficient funds: {from} cannot cover {amount}")]
    InsufficientFunds {
        /// The sending account.
        from: AccountId,
        /// The amount that could not be covered (display form).
        amount: String,
    },

    /// A party to the transfer does not exist.
    #[error("invalid account: {0}")]
    InvalidAccount(AccountId),
}

/// The host's value-transfer primitive.
///
/// Used for stake deposits into the arbitration vault, one-unit
/// notification transfers, and settlement-time service-stake movement.
pub trait FundTransfer {
    /// Move `amount` from `from` to `to`, tagging the movement with `memo`.
    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: &TokenAmount,
        memo: &str,
    ) -> Result<(), TransferError>;
}

// ── Scheduled callbacks ────────────────────────────────────────────────

/// The host's deferred-callback primitive.
///
/// Scheduling under an already-armed key replaces the pending callback
/// (the old one will not fire). Cancellation of an unknown key is a no-op.
/// When a callback fires, the host invokes the engine's timer entry point
/// with the stored payload; only the scheduler may do so.
pub trait TimerScheduler {
    /// Arm (or re-arm) a callback under `key` after `delay_secs`.
    fn schedule(&mut self, key: TimerKey, delay_secs: i64, payload: TimerPayload);

    /// Disarm any pending callback under `key`.
    fn cancel(&mut self, key: &TimerKey);
}

// ── Service catalog ────────────────────────────────────────────────────

/// Lifecycle status of a listed data service, as reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    /// The service is live and disputable.
    Active,
    /// The service was cancelled by its providers.
    Cancelled,
    /// The service is temporarily paused.
    Paused,
}

impl ServiceStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Cancelled => "CANCELLED",
            Self::Paused => "PAUSED",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only view of the marketplace service catalog.
pub trait ServiceDirectory {
    /// The status of `service`, or `None` if it was never listed.
    fn service_status(&self, service: ServiceId) -> Option<ServiceStatus>;

    /// The provider accounts currently backing `service`, in a stable
    /// order. Empty when the service has no active providers.
    fn service_providers(&self, service: ServiceId) -> Vec<AccountId>;
}
