//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers throughout the marketplace.
//! Each identifier is a distinct type — you cannot pass a [`CaseId`] where
//! a [`RoundId`] is expected.
//!
//! ## Sequence identifiers
//!
//! Cases, rounds, appeals, and vote records are identified by `u64`
//! sequence numbers allocated by the engine's stores. The host delivers
//! calls in a total order, so sequence allocation is deterministic and
//! replayable; random identifiers would break that property.
//!
//! ## String identifiers
//!
//! [`AccountId`] and [`PublicKey`] are opaque handles minted by the host's
//! authentication layer. They are validated only for non-emptiness.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// String-based identifiers
// ---------------------------------------------------------------------------

/// An opaque, authenticated account handle.
///
/// The host guarantees that a call attributed to an `AccountId` was made by
/// that account; the engine performs no further identity verification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create an account identifier from a host-issued handle.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyIdentifier`] if the handle is empty.
    pub fn new(handle: impl Into<String>) -> Result<Self, ValidationError> {
        let handle = handle.into();
        if handle.is_empty() {
            return Err(ValidationError::EmptyIdentifier { kind: "account" });
        }
        Ok(Self(handle))
    }

    /// Access the underlying handle.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An arbitrator's registered public key, kept as an opaque string.
///
/// The engine stores the key for off-chain verification tooling; it never
/// performs cryptographic operations on it (identity verification is a host
/// concern).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(String);

impl PublicKey {
    /// Create a public key wrapper.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyIdentifier`] if the key is empty.
    pub fn new(key: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ValidationError::EmptyIdentifier { kind: "public key" });
        }
        Ok(Self(key))
    }

    /// Access the underlying key material.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Sequence-based identifiers
// ---------------------------------------------------------------------------

/// Declare a `u64` sequence identifier newtype with a display prefix.
macro_rules! sequence_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw sequence value.
            pub fn new(value: u64) -> Self {
                Self(value)
            }

            /// Access the raw sequence value.
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

sequence_id!(
    /// A unique identifier for a data service listed in the marketplace
    /// catalog. Allocated by the catalog, referenced by the engine.
    ServiceId,
    "service"
);

sequence_id!(
    /// A unique identifier for an arbitration case.
    CaseId,
    "case"
);

sequence_id!(
    /// A unique identifier for one voting round within a case.
    RoundId,
    "round"
);

sequence_id!(
    /// A unique identifier for a filed appeal (complaint).
    AppealId,
    "appeal"
);

sequence_id!(
    /// A unique identifier for an appended vote record.
    VoteRecordId,
    "vote"
);
