//! # Arbitrator Registry
//!
//! Identities, stakes, and track records of registered arbitrators.
//! Correctness rates and the malicious flag are recomputed only at
//! settlement, never during voting — a round's outcome cannot change the
//! pool it was drawn from.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use veridex_core::{AccountId, PublicKey, Timestamp, TokenAmount};

use crate::error::ArbitrationError;

/// The admission track an arbitrator registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArbitratorTier {
    /// Vetted professional arbitrator; first-round selection draws from
    /// this tier's stake-backed pool.
    Professional,
    /// Amateur arbitrator admitted with a lower barrier; participates once
    /// a case escalates to crowd arbitration.
    Amateur,
}

impl ArbitratorTier {
    /// The canonical string name of this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Professional => "PROFESSIONAL",
            Self::Amateur => "AMATEUR",
        }
    }
}

impl std::fmt::Display for ArbitratorTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A registered arbitrator's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitratorProfile {
    /// The arbitrator's account.
    pub account: AccountId,
    /// Public key registered for off-chain tooling; opaque to the engine.
    pub public_key: PublicKey,
    /// Admission track.
    pub tier: ArbitratorTier,
    /// Aggregate stake deposited across registration and case
    /// confirmations.
    pub stake: TokenAmount,
    /// Arbitration fees earned across settled cases.
    pub accrued_income: TokenAmount,
    /// Income already claimed through the host's withdrawal surface.
    pub claimed: TokenAmount,
    /// Fraction of this arbitrator's historical votes that matched final
    /// case outcomes, in `[0, 1]`.
    pub correctness_rate: f64,
    /// Whether the arbitrator is excluded from future selection.
    pub is_malicious: bool,
    /// When the arbitrator registered.
    pub registered_at: Timestamp,
}

/// The registry of all arbitrators known to the engine.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ArbitratorRegistry {
    profiles: BTreeMap<AccountId, ArbitratorProfile>,
}

impl ArbitratorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new arbitrator.
    ///
    /// The stake deposit itself is moved by the caller through the fund
    /// port before this is invoked; the registry only records it.
    ///
    /// # Errors
    ///
    /// Returns [`ArbitrationError::AlreadyRegistered`] if the account
    /// already has a profile.
    pub fn register(
        &mut self,
        account: AccountId,
        public_key: PublicKey,
        tier: ArbitratorTier,
        stake: TokenAmount,
    ) -> Result<(), ArbitrationError> {
        if self.profiles.contains_key(&account) {
            return Err(ArbitrationError::AlreadyRegistered(account));
        }
        let zero = TokenAmount::zero(stake.currency.clone());
        self.profiles.insert(
            account.clone(),
            ArbitratorProfile {
                account,
                public_key,
                tier,
                stake,
                accrued_income: zero.clone(),
                claimed: zero,
                correctness_rate: 0.0,
                is_malicious: false,
                registered_at: Timestamp::now(),
            },
        );
        Ok(())
    }

    /// Look up a profile.
    pub fn get(&self, account: &AccountId) -> Option<&ArbitratorProfile> {
        self.profiles.get(account)
    }

    /// Whether the account is registered.
    pub fn contains(&self, account: &AccountId) -> bool {
        self.profiles.contains_key(account)
    }

    /// Total number of registered arbitrators, malicious included.
    pub fn len(&self) -> u64 {
        self.profiles.len() as u64
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// The selection candidates: registered, not flagged malicious, and
    /// not in `exclusions`. Returned in registry (account) order so that
    /// selection is a pure function of the registry snapshot.
    pub fn eligible_candidates(&self, exclusions: &BTreeSet<AccountId>) -> Vec<AccountId> {
        self.profiles
            .values()
            .filter(|p| !p.is_malicious && !exclusions.contains(&p.account))
            .map(|p| p.account.clone())
            .collect()
    }

    /// Add `amount` to an arbitrator's aggregate stake.
    ///
    /// # Errors
    ///
    /// Returns [`ArbitrationError::UnknownArbitrator`] if the account has
    /// no profile.
    pub fn add_stake(
        &mut self,
        account: &AccountId,
        amount: &TokenAmount,
    ) -> Result<(), ArbitrationError> {
        let profile = self
            .profiles
            .get_mut(account)
            .ok_or_else(|| ArbitrationError::UnknownArbitrator(account.clone()))?;
        profile.stake = profile.stake.checked_add(amount)?;
        Ok(())
    }

    /// Credit an arbitration fee to an arbitrator's accrued income.
    ///
    /// # Errors
    ///
    /// Returns [`ArbitrationError::UnknownArbitrator`] if the account has
    /// no profile.
    pub fn credit_income(
        &mut self,
        account: &AccountId,
        amount: &TokenAmount,
    ) -> Result<(), ArbitrationError> {
        let profile = self
            .profiles
            .get_mut(account)
            .ok_or_else(|| ArbitrationError::UnknownArbitrator(account.clone()))?;
        profile.accrued_income = profile.accrued_income.checked_add(amount)?;
        Ok(())
    }

    /// Record a settled case's outcome for one arbitrator: `correct` of
    /// `total` votes matched the final result. Recomputes the correctness
    /// rate and the malicious flag against `threshold`.
    ///
    /// Unknown accounts are skipped silently: a case may reference an
    /// arbitrator the host has since pruned, and correctness scoring must
    /// not abort settlement.
    pub fn record_case_outcome(
        &mut self,
        account: &AccountId,
        correct: u64,
        total: u64,
        threshold: f64,
    ) {
        if let Some(profile) = self.profiles.get_mut(account) {
            let rate = if total > 0 {
                correct as f64 / total as f64
            } else {
                0.0
            };
            profile.correctness_rate = rate;
            profile.is_malicious = rate < threshold;
            tracing::debug!(
                arbitrator = %account,
                rate,
                malicious = profile.is_malicious,
                "correctness updated"
            );
        }
    }

    /// Iterate all profiles in account order.
    pub fn iter(&self) -> impl Iterator<Item = &ArbitratorProfile> {
        self.profiles.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veridex_core::Currency;

    fn acct(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn stake(amount: i64) -> TokenAmount {
        TokenAmount::new(amount, Currency::vdx())
    }

    fn registry_with(names: &[&str]) -> ArbitratorRegistry {
        let mut registry = ArbitratorRegistry::new();
        for name in names {
            registry
                .register(
                    acct(name),
                    PublicKey::new(format!("VDX{name}")).unwrap(),
                    ArbitratorTier::Professional,
                    stake(1000),
                )
                .unwrap();
        }
        registry
    }

    #[test]
    fn register_and_lookup() {
        let registry = registry_with(&["arb.one"]);
        let profile = registry.get(&acct("arb.one")).unwrap();
        assert_eq!(profile.tier, ArbitratorTier::Professional);
        assert_eq!(profile.stake.amount, 1000);
        assert!(!profile.is_malicious);
        assert_eq!(profile.correctness_rate, 0.0);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = registry_with(&["arb.one"]);
        let result = registry.register(
            acct("arb.one"),
            PublicKey::new("VDXother").unwrap(),
            ArbitratorTier::Amateur,
            stake(5),
        );
        assert!(matches!(
            result,
            Err(ArbitrationError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn eligible_candidates_exclude_malicious_and_chosen() {
        let mut registry = registry_with(&["arb.a", "arb.b", "arb.c"]);
        registry.record_case_outcome(&acct("arb.b"), 0, 3, 0.5);

        let mut exclusions = BTreeSet::new();
        exclusions.insert(acct("arb.c"));

        let pool = registry.eligible_candidates(&exclusions);
        assert_eq!(pool, vec![acct("arb.a")]);
    }

    #[test]
    fn eligible_candidates_are_account_ordered() {
        let registry = registry_with(&["arb.c", "arb.a", "arb.b"]);
        let pool = registry.eligible_candidates(&BTreeSet::new());
        assert_eq!(pool, vec![acct("arb.a"), acct("arb.b"), acct("arb.c")]);
    }

    #[test]
    fn correctness_rate_zero_when_no_votes() {
        let mut registry = registry_with(&["arb.a"]);
        registry.record_case_outcome(&acct("arb.a"), 0, 0, 0.5);
        let profile = registry.get(&acct("arb.a")).unwrap();
        assert_eq!(profile.correctness_rate, 0.0);
        assert!(profile.is_malicious);
    }

    #[test]
    fn correctness_above_threshold_clears_flag() {
        let mut registry = registry_with(&["arb.a"]);
        registry.record_case_outcome(&acct("arb.a"), 0, 2, 0.5);
        assert!(registry.get(&acct("arb.a")).unwrap().is_malicious);

        // A later case with matching votes restores eligibility.
        registry.record_case_outcome(&acct("arb.a"), 2, 2, 0.5);
        let profile = registry.get(&acct("arb.a")).unwrap();
        assert_eq!(profile.correctness_rate, 1.0);
        assert!(!profile.is_malicious);
    }

    #[test]
    fn credit_income_accumulates() {
        let mut registry = registry_with(&["arb.a"]);
        registry.credit_income(&acct("arb.a"), &stake(40)).unwrap();
        registry.credit_income(&acct("arb.a"), &stake(60)).unwrap();
        assert_eq!(registry.get(&acct("arb.a")).unwrap().accrued_income.amount, 100);
    }

    #[test]
    fn credit_income_unknown_account_fails() {
        let mut registry = ArbitratorRegistry::new();
        let result = registry.credit_income(&acct("ghost"), &stake(1));
        assert!(matches!(
            result,
            Err(ArbitrationError::UnknownArbitrator(_))
        ));
    }

    #[test]
    fn add_stake_accumulates() {
        let mut registry = registry_with(&["arb.a"]);
        registry.add_stake(&acct("arb.a"), &stake(500)).unwrap();
        assert_eq!(registry.get(&acct("arb.a")).unwrap().stake.amount, 1500);
    }
}
