//! # Core Error Types
//!
//! Construction-time validation errors and monetary arithmetic errors.
//! Domain-specific failures (state conflicts, accounting violations) live
//! with the subsystems that raise them; this module only covers failures
//! that can occur while building a core type.

use thiserror::Error;

/// Errors from validating a core type at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A string-based identifier was empty.
    #[error("{kind} identifier must be non-empty")]
    EmptyIdentifier {
        /// Which identifier kind was being constructed (e.g., "account").
        kind: &'static str,
    },

    /// A currency code was empty or not ASCII-uppercase.
    #[error("invalid currency code: \"{0}\" (expected non-empty ASCII uppercase)")]
    InvalidCurrencyCode(String),
}

/// Errors from monetary arithmetic on [`TokenAmount`](crate::TokenAmount).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// Two amounts in different currencies were combined.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Currency code of the left operand.
        left: String,
        /// Currency code of the right operand.
        right: String,
    },

    /// Arithmetic overflowed the i64 smallest-unit range.
    #[error("token amount arithmetic overflowed i64 range")]
    Overflow,

    /// An operation required a strictly positive amount.
    #[error("amount must be positive, got {0}")]
    NonPositive(i64),
}
