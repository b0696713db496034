#![deny(missing_docs)]

//! # veridex-core — Foundational Types for the Veridex Marketplace
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies — only `serde`, `thiserror`,
//! and `chrono` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** Every identifier is a
//!    distinct type. You cannot pass a [`CaseId`] where a [`RoundId`] is
//!    expected.
//!
//! 2. **Integer money.** [`TokenAmount`] stores smallest currency units as
//!    `i64` with an explicit [`Currency`] tag. Arithmetic is checked;
//!    mixing currencies or overflowing is a structured error, never a
//!    silent wrap.
//!
//! 3. **UTC-only time.** [`Timestamp`] carries second-precision UTC.
//!    Deadline comparison is a total order; local time is a presentation
//!    concern outside this workspace.

pub mod amount;
pub mod error;
pub mod identity;
pub mod temporal;

// Re-export primary types at crate root for ergonomic imports.
pub use amount::{Currency, TokenAmount};
pub use error::{AmountError, ValidationError};
pub use identity::{AccountId, AppealId, CaseId, PublicKey, RoundId, ServiceId, VoteRecordId};
pub use temporal::Timestamp;
