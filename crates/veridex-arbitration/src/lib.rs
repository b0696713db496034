//! # veridex-arbitration — Dispute Arbitration Engine
//!
//! Decentralized dispute arbitration and escrow for the Veridex data
//! marketplace. Consumers and providers trade data subscriptions backed by
//! stake; either party may raise a complaint. The engine selects impartial
//! arbitrators, runs multi-round voting with crowd escalation, recovers
//! from non-response through keyed timers, and settles stakes
//! deterministically:
//!
//! - **Error** ([`error`]): Structured error hierarchy for the whole
//!   subsystem.
//!
//! - **Policy** ([`policy`]): Protocol constants (quorum growth, timeout
//!   windows, the 80/20 slash split, correctness threshold).
//!
//! - **Ports** ([`ports`]): The host traits the engine consumes — value
//!   transfer, scheduled callbacks, and the service catalog.
//!
//! - **Registry** ([`registry`]): Arbitrator identities, stakes, and
//!   correctness track records.
//!
//! - **Escrow** ([`escrow`]): Per-case stake entries and the
//!   service-level provider stake book.
//!
//! - **Case** ([`case`]): Cases, rounds, appeals, votes, and the
//!   quorum/tally rules.
//!
//! - **Selection** ([`selection`]): Verifiable random arbitrator draws.
//!
//! - **Timer** ([`timer`]): Replace-by-key timer identities and payloads.
//!
//! - **Settlement** ([`settlement`]): Slashing, dividend and fee
//!   distribution, correctness updates.
//!
//! - **Engine** ([`engine`]): The orchestrating state machine behind every
//!   public operation.

pub mod case;
pub mod engine;
pub mod error;
pub mod escrow;
pub mod policy;
pub mod ports;
pub mod registry;
pub mod selection;
pub mod settlement;
pub mod timer;

// Re-export primary types for ergonomic imports.

// Error types
pub use error::ArbitrationError;

// Engine
pub use engine::ArbitrationEngine;

// Case lifecycle
pub use case::{
    required_for_sequence, Appeal, AppealStatus, ArbitrationMethod, Case, CaseStep, EvidenceEntry,
    FinalRuling, Round, Vote, VoteChoice, VoteLedger, VoteRecord,
};

// Stake books
pub use escrow::{EscrowLedger, ProviderStakeBook, Side, StakeEntry};

// Registry
pub use registry::{ArbitratorProfile, ArbitratorRegistry, ArbitratorTier};

// Selection
pub use selection::{draw_distinct, EntropySeed};

// Policy and ports
pub use policy::ArbitrationPolicy;
pub use ports::{FundTransfer, ServiceDirectory, ServiceStatus, TimerScheduler, TransferError};

// Settlement
pub use settlement::{winner_side, SettlementReport};

// Timers
pub use timer::{TimerKey, TimerPayload, TimerPurpose};
