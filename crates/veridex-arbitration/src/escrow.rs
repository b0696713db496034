//! # Escrow and Stake Books
//!
//! Two ledgers back every stake movement in the engine:
//!
//! - [`EscrowLedger`] — per-case stake entries, keyed by case first so
//!   cross-case isolation holds by construction. Settlement slashes one
//!   side, credits the other, and the per-case sum is auditable at any
//!   snapshot.
//! - [`ProviderStakeBook`] — service-level provider stakes, a mirror of
//!   the marketplace's staking records. Settlement forfeits these when a
//!   provider side loses a dispute.
//!
//! ## Invariants
//!
//! A balance is never negative: debits fail with `InsufficientBalance`
//! before any mutation, and an observed negative balance is fatal
//! [`LedgerCorruption`](ArbitrationError::LedgerCorruption) — the
//! enclosing transition must abort rather than persist.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use veridex_core::{AccountId, CaseId, Currency, ServiceId, TokenAmount};

use crate::error::ArbitrationError;

// ── Sides ──────────────────────────────────────────────────────────────

/// Which economic side of a dispute an escrow entry belongs to.
///
/// Sides are identity-based: an account is on the provider side iff it
/// provides the disputed service. The applicant/respondent roles rotate
/// between the sides as a case is reappealed; the economic grouping used
/// by settlement does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Data consumers (subscribers) of the disputed service.
    Consumer,
    /// Data providers backing the disputed service.
    Provider,
}

impl Side {
    /// The canonical string name of this side.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumer => "CONSUMER",
            Self::Provider => "PROVIDER",
        }
    }

    /// The opposing side.
    pub fn opposite(&self) -> Side {
        match self {
            Self::Consumer => Side::Provider,
            Self::Provider => Side::Consumer,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Case escrow ────────────────────────────────────────────────────────

/// One account's stake position within one case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeEntry {
    /// The staking account.
    pub account: AccountId,
    /// The side the account entered the case on.
    pub side: Side,
    /// Current escrowed balance.
    pub balance: TokenAmount,
    /// Dividends credited into this entry across settlements.
    pub cumulative_income: TokenAmount,
    /// Amount already claimed back through the host's withdrawal surface.
    pub cumulative_claimed: TokenAmount,
}

/// The per-case stake ledger.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EscrowLedger {
    entries: BTreeMap<CaseId, BTreeMap<AccountId, StakeEntry>>,
}

impl EscrowLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `(case, account)`, creating the entry on first
    /// deposit. The side recorded at creation is permanent; later deposits
    /// by the same account keep it.
    ///
    /// # Errors
    ///
    /// Rejects non-positive amounts and propagates arithmetic errors.
    pub fn deposit(
        &mut self,
        case: CaseId,
        account: &AccountId,
        amount: &TokenAmount,
        side: Side,
    ) -> Result<(), ArbitrationError> {
        amount.require_positive()?;
        let accounts = self.entries.entry(case).or_default();
        match accounts.get_mut(account) {
            Some(entry) => {
                entry.balance = entry.balance.checked_add(amount)?;
            }
            None => {
                accounts.insert(
                    account.clone(),
                    StakeEntry {
                        account: account.clone(),
                        side,
                        balance: amount.clone(),
                        cumulative_income: TokenAmount::zero(amount.currency.clone()),
                        cumulative_claimed: TokenAmount::zero(amount.currency.clone()),
                    },
                );
            }
        }
        Ok(())
    }

    /// Debit `amount` from `(case, account)`.
    ///
    /// # Errors
    ///
    /// Fails with [`ArbitrationError::InsufficientBalance`] before any
    /// mutation if the balance cannot cover the amount; fails with
    /// [`ArbitrationError::LedgerCorruption`] if the stored balance is
    /// already negative.
    pub fn debit(
        &mut self,
        case: CaseId,
        account: &AccountId,
        amount: &TokenAmount,
    ) -> Result<(), ArbitrationError> {
        amount.require_positive()?;
        let entry = self
            .entries
            .get_mut(&case)
            .and_then(|accounts| accounts.get_mut(account))
            .ok_or_else(|| ArbitrationError::InsufficientBalance {
                case,
                account: account.clone(),
                requested: amount.amount,
                held: 0,
            })?;
        if entry.balance.amount < 0 {
            return Err(ArbitrationError::LedgerCorruption {
                case,
                account: account.clone(),
                held: entry.balance.amount,
            });
        }
        if entry.balance.amount < amount.amount {
            return Err(ArbitrationError::InsufficientBalance {
                case,
                account: account.clone(),
                requested: amount.amount,
                held: entry.balance.amount,
            });
        }
        entry.balance = entry.balance.checked_sub(amount)?;
        Ok(())
    }

    /// The accounts and summed stake of one side of a case, in account
    /// order. Used by settlement to compute slash and award pools.
    pub fn balances_by_side(
        &self,
        case: CaseId,
        side: Side,
        currency: &Currency,
    ) -> Result<(Vec<AccountId>, TokenAmount), ArbitrationError> {
        let mut accounts = Vec::new();
        let mut total = TokenAmount::zero(currency.clone());
        if let Some(case_entries) = self.entries.get(&case) {
            for entry in case_entries.values() {
                if entry.side != side {
                    continue;
                }
                if entry.balance.amount < 0 {
                    return Err(ArbitrationError::LedgerCorruption {
                        case,
                        account: entry.account.clone(),
                        held: entry.balance.amount,
                    });
                }
                accounts.push(entry.account.clone());
                total = total.checked_add(&entry.balance)?;
            }
        }
        Ok((accounts, total))
    }

    /// Zero every balance on one side of a case, returning the total
    /// removed. Settlement's slash primitive.
    pub fn slash_side(
        &mut self,
        case: CaseId,
        side: Side,
        currency: &Currency,
    ) -> Result<TokenAmount, ArbitrationError> {
        let mut total = TokenAmount::zero(currency.clone());
        if let Some(case_entries) = self.entries.get_mut(&case) {
            for entry in case_entries.values_mut() {
                if entry.side != side {
                    continue;
                }
                if entry.balance.amount < 0 {
                    return Err(ArbitrationError::LedgerCorruption {
                        case,
                        account: entry.account.clone(),
                        held: entry.balance.amount,
                    });
                }
                total = total.checked_add(&entry.balance)?;
                entry.balance = TokenAmount::zero(currency.clone());
            }
        }
        Ok(total)
    }

    /// Credit a settlement dividend into `(case, account)`, tracking it in
    /// the entry's cumulative income.
    ///
    /// # Errors
    ///
    /// The entry must already exist — dividends only flow to accounts that
    /// staked into the case.
    pub fn credit_dividend(
        &mut self,
        case: CaseId,
        account: &AccountId,
        amount: &TokenAmount,
    ) -> Result<(), ArbitrationError> {
        let entry = self
            .entries
            .get_mut(&case)
            .and_then(|accounts| accounts.get_mut(account))
            .ok_or_else(|| ArbitrationError::InsufficientBalance {
                case,
                account: account.clone(),
                requested: 0,
                held: 0,
            })?;
        entry.balance = entry.balance.checked_add(amount)?;
        entry.cumulative_income = entry.cumulative_income.checked_add(amount)?;
        Ok(())
    }

    /// One account's entry in a case, if it staked.
    pub fn entry(&self, case: CaseId, account: &AccountId) -> Option<&StakeEntry> {
        self.entries.get(&case).and_then(|a| a.get(account))
    }

    /// The sum of all balances currently held in a case's escrow.
    pub fn case_total(&self, case: CaseId, currency: &Currency) -> Result<TokenAmount, ArbitrationError> {
        let mut total = TokenAmount::zero(currency.clone());
        if let Some(case_entries) = self.entries.get(&case) {
            for entry in case_entries.values() {
                total = total.checked_add(&entry.balance)?;
            }
        }
        Ok(total)
    }
}

// ── Service-level provider stakes ──────────────────────────────────────

/// Service-level provider stakes, mirrored from the marketplace's staking
/// records so settlement can forfeit them without reaching into catalog
/// storage.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProviderStakeBook {
    stakes: BTreeMap<ServiceId, BTreeMap<AccountId, TokenAmount>>,
}

impl ProviderStakeBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of service-level stake for `(service, provider)`.
    ///
    /// # Errors
    ///
    /// Rejects non-positive amounts and propagates arithmetic errors.
    pub fn fund(
        &mut self,
        service: ServiceId,
        provider: &AccountId,
        amount: &TokenAmount,
    ) -> Result<(), ArbitrationError> {
        amount.require_positive()?;
        let providers = self.stakes.entry(service).or_default();
        match providers.get_mut(provider) {
            Some(held) => {
                *held = held.checked_add(amount)?;
            }
            None => {
                providers.insert(provider.clone(), amount.clone());
            }
        }
        Ok(())
    }

    /// The providers holding stake for `service` and their summed stake.
    pub fn service_stakes(
        &self,
        service: ServiceId,
        currency: &Currency,
    ) -> Result<(Vec<AccountId>, TokenAmount), ArbitrationError> {
        let mut providers = Vec::new();
        let mut total = TokenAmount::zero(currency.clone());
        if let Some(entries) = self.stakes.get(&service) {
            for (account, held) in entries {
                if held.is_positive() {
                    providers.push(account.clone());
                    total = total.checked_add(held)?;
                }
            }
        }
        Ok((providers, total))
    }

    /// Forfeit every provider's stake for `service`, returning the total
    /// removed.
    pub fn slash_service(
        &mut self,
        service: ServiceId,
        currency: &Currency,
    ) -> Result<TokenAmount, ArbitrationError> {
        let mut total = TokenAmount::zero(currency.clone());
        if let Some(entries) = self.stakes.get_mut(&service) {
            for held in entries.values_mut() {
                total = total.checked_add(held)?;
                *held = TokenAmount::zero(currency.clone());
            }
        }
        Ok(total)
    }

    /// One provider's current service-level stake.
    pub fn stake_of(&self, service: ServiceId, provider: &AccountId) -> Option<&TokenAmount> {
        self.stakes.get(&service).and_then(|p| p.get(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn vdx(amount: i64) -> TokenAmount {
        TokenAmount::new(amount, Currency::vdx())
    }

    #[test]
    fn deposit_creates_entry_with_side() {
        let mut ledger = EscrowLedger::new();
        let case = CaseId::new(1);
        ledger
            .deposit(case, &acct("alice"), &vdx(100), Side::Consumer)
            .unwrap();

        let entry = ledger.entry(case, &acct("alice")).unwrap();
        assert_eq!(entry.balance.amount, 100);
        assert_eq!(entry.side, Side::Consumer);
        assert!(entry.cumulative_income.is_zero());
    }

    #[test]
    fn deposit_accumulates_and_keeps_side() {
        let mut ledger = EscrowLedger::new();
        let case = CaseId::new(1);
        ledger
            .deposit(case, &acct("alice"), &vdx(100), Side::Consumer)
            .unwrap();
        ledger
            .deposit(case, &acct("alice"), &vdx(50), Side::Provider)
            .unwrap();

        let entry = ledger.entry(case, &acct("alice")).unwrap();
        assert_eq!(entry.balance.amount, 150);
        assert_eq!(entry.side, Side::Consumer);
    }

    #[test]
    fn deposit_rejects_non_positive() {
        let mut ledger = EscrowLedger::new();
        assert!(ledger
            .deposit(CaseId::new(1), &acct("alice"), &vdx(0), Side::Consumer)
            .is_err());
    }

    #[test]
    fn debit_respects_balance() {
        let mut ledger = EscrowLedger::new();
        let case = CaseId::new(1);
        ledger
            .deposit(case, &acct("alice"), &vdx(100), Side::Consumer)
            .unwrap();

        ledger.debit(case, &acct("alice"), &vdx(60)).unwrap();
        assert_eq!(ledger.entry(case, &acct("alice")).unwrap().balance.amount, 40);

        let err = ledger.debit(case, &acct("alice"), &vdx(41)).unwrap_err();
        assert!(matches!(
            err,
            ArbitrationError::InsufficientBalance { requested: 41, held: 40, .. }
        ));
    }

    #[test]
    fn debit_unknown_entry_is_insufficient() {
        let mut ledger = EscrowLedger::new();
        let err = ledger
            .debit(CaseId::new(1), &acct("ghost"), &vdx(10))
            .unwrap_err();
        assert!(matches!(
            err,
            ArbitrationError::InsufficientBalance { held: 0, .. }
        ));
    }

    #[test]
    fn cases_are_isolated() {
        let mut ledger = EscrowLedger::new();
        ledger
            .deposit(CaseId::new(1), &acct("alice"), &vdx(100), Side::Consumer)
            .unwrap();

        assert!(ledger.entry(CaseId::new(2), &acct("alice")).is_none());
        assert!(ledger.debit(CaseId::new(2), &acct("alice"), &vdx(1)).is_err());
        assert_eq!(
            ledger.case_total(CaseId::new(2), &Currency::vdx()).unwrap().amount,
            0
        );
    }

    #[test]
    fn balances_by_side_groups_and_sums() {
        let mut ledger = EscrowLedger::new();
        let case = CaseId::new(1);
        ledger
            .deposit(case, &acct("alice"), &vdx(100), Side::Consumer)
            .unwrap();
        ledger
            .deposit(case, &acct("bob"), &vdx(40), Side::Consumer)
            .unwrap();
        ledger
            .deposit(case, &acct("prov"), &vdx(300), Side::Provider)
            .unwrap();

        let (consumers, consumer_total) = ledger
            .balances_by_side(case, Side::Consumer, &Currency::vdx())
            .unwrap();
        assert_eq!(consumers, vec![acct("alice"), acct("bob")]);
        assert_eq!(consumer_total.amount, 140);

        let (providers, provider_total) = ledger
            .balances_by_side(case, Side::Provider, &Currency::vdx())
            .unwrap();
        assert_eq!(providers, vec![acct("prov")]);
        assert_eq!(provider_total.amount, 300);
    }

    #[test]
    fn slash_side_zeroes_and_returns_total() {
        let mut ledger = EscrowLedger::new();
        let case = CaseId::new(1);
        ledger
            .deposit(case, &acct("alice"), &vdx(100), Side::Consumer)
            .unwrap();
        ledger
            .deposit(case, &acct("prov"), &vdx(300), Side::Provider)
            .unwrap();

        let slashed = ledger.slash_side(case, Side::Provider, &Currency::vdx()).unwrap();
        assert_eq!(slashed.amount, 300);
        assert_eq!(ledger.entry(case, &acct("prov")).unwrap().balance.amount, 0);
        // The other side is untouched.
        assert_eq!(ledger.entry(case, &acct("alice")).unwrap().balance.amount, 100);
    }

    #[test]
    fn credit_dividend_tracks_income() {
        let mut ledger = EscrowLedger::new();
        let case = CaseId::new(1);
        ledger
            .deposit(case, &acct("alice"), &vdx(100), Side::Consumer)
            .unwrap();
        ledger.credit_dividend(case, &acct("alice"), &vdx(80)).unwrap();

        let entry = ledger.entry(case, &acct("alice")).unwrap();
        assert_eq!(entry.balance.amount, 180);
        assert_eq!(entry.cumulative_income.amount, 80);
    }

    #[test]
    fn case_total_sums_both_sides() {
        let mut ledger = EscrowLedger::new();
        let case = CaseId::new(1);
        ledger
            .deposit(case, &acct("alice"), &vdx(100), Side::Consumer)
            .unwrap();
        ledger
            .deposit(case, &acct("prov"), &vdx(300), Side::Provider)
            .unwrap();
        assert_eq!(ledger.case_total(case, &Currency::vdx()).unwrap().amount, 400);
    }

    #[test]
    fn side_opposite() {
        assert_eq!(Side::Consumer.opposite(), Side::Provider);
        assert_eq!(Side::Provider.opposite(), Side::Consumer);
    }

    // ── Provider stake book ──────────────────────────────────────────

    #[test]
    fn fund_and_slash_service_stakes() {
        let mut book = ProviderStakeBook::new();
        let service = ServiceId::new(7);
        book.fund(service, &acct("prov.a"), &vdx(500)).unwrap();
        book.fund(service, &acct("prov.b"), &vdx(300)).unwrap();
        book.fund(service, &acct("prov.a"), &vdx(200)).unwrap();

        let (providers, total) = book.service_stakes(service, &Currency::vdx()).unwrap();
        assert_eq!(providers, vec![acct("prov.a"), acct("prov.b")]);
        assert_eq!(total.amount, 1000);

        let slashed = book.slash_service(service, &Currency::vdx()).unwrap();
        assert_eq!(slashed.amount, 1000);
        assert_eq!(book.stake_of(service, &acct("prov.a")).unwrap().amount, 0);

        let (providers_after, total_after) =
            book.service_stakes(service, &Currency::vdx()).unwrap();
        assert!(providers_after.is_empty());
        assert!(total_after.is_zero());
    }

    #[test]
    fn service_stake_isolation() {
        let mut book = ProviderStakeBook::new();
        book.fund(ServiceId::new(1), &acct("prov.a"), &vdx(500)).unwrap();
        let slashed = book.slash_service(ServiceId::new(2), &Currency::vdx()).unwrap();
        assert!(slashed.is_zero());
        assert_eq!(book.stake_of(ServiceId::new(1), &acct("prov.a")).unwrap().amount, 500);
    }
}
