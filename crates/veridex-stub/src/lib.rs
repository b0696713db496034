//! # veridex-stub — In-Memory Host Ports
//!
//! In-memory implementations of the three host ports the arbitration
//! engine consumes, for integration tests and development hosts that run
//! without a real chain behind them. Storage is process-local with no
//! persistence — state is lost on drop.
//!
//! Every stub is a cheaply cloneable handle over shared state
//! (`Arc<Mutex<_>>`), so a test can hand one clone to the engine and keep
//! another to inspect balances, fire armed timers, or flip a service's
//! status mid-scenario.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use veridex_arbitration::{
    FundTransfer, ServiceDirectory, ServiceStatus, TimerKey, TimerPayload, TimerScheduler,
    TransferError,
};
use veridex_core::{AccountId, ServiceId, TokenAmount};

// ── Bank ───────────────────────────────────────────────────────────────

/// A recorded transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Sending account.
    pub from: AccountId,
    /// Receiving account.
    pub to: AccountId,
    /// Amount in smallest units.
    pub amount: i64,
    /// The memo the engine attached.
    pub memo: String,
}

#[derive(Default)]
struct BankState {
    balances: BTreeMap<AccountId, i64>,
    log: Vec<TransferRecord>,
}

/// A balance-tracking in-memory bank.
///
/// Transfers fail with [`TransferError::InvalidAccount`] when the sender
/// was never credited and with [`TransferError::InsufficientFunds`] when
/// the balance cannot cover the amount, mirroring the host ledger's
/// behaviour.
#[derive(Clone, Default)]
pub struct InMemoryBank {
    inner: Arc<Mutex<BankState>>,
}

impl InMemoryBank {
    /// Create an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit an account (test seeding).
    pub fn credit(&self, account: &AccountId, amount: i64) {
        let mut state = self.inner.lock();
        *state.balances.entry(account.clone()).or_insert(0) += amount;
    }

    /// An account's current balance, zero if never seen.
    pub fn balance_of(&self, account: &AccountId) -> i64 {
        self.inner.lock().balances.get(account).copied().unwrap_or(0)
    }

    /// Every transfer executed so far, in order.
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.inner.lock().log.clone()
    }
}

impl FundTransfer for InMemoryBank {
    fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: &TokenAmount,
        memo: &str,
    ) -> Result<(), TransferError> {
        let mut state = self.inner.lock();
        let held = *state
            .balances
            .get(from)
            .ok_or_else(|| TransferError::InvalidAccount(from.clone()))?;
        if held < amount.amount {
            return Err(TransferError::InsufficientFunds {
                from: from.clone(),
                amount: amount.to_string(),
            });
        }
        *state.balances.entry(from.clone()).or_insert(0) -= amount.amount;
        *state.balances.entry(to.clone()).or_insert(0) += amount.amount;
        state.log.push(TransferRecord {
            from: from.clone(),
            to: to.clone(),
            amount: amount.amount,
            memo: memo.to_string(),
        });
        Ok(())
    }
}

// ── Scheduler ──────────────────────────────────────────────────────────

#[derive(Default)]
struct SchedulerState {
    armed: BTreeMap<TimerKey, (i64, TimerPayload)>,
}

/// A manually-fired timer scheduler.
///
/// Arms and cancels like the host scheduler (schedule replaces any
/// pending callback under the same key) but never fires on its own; the
/// test reads a pending payload and feeds it to the engine's timer entry
/// point when the scenario calls for it.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<SchedulerState>>,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a callback is pending under `key`.
    pub fn is_armed(&self, key: &TimerKey) -> bool {
        self.inner.lock().armed.contains_key(key)
    }

    /// The pending payload under `key`, if armed.
    pub fn payload(&self, key: &TimerKey) -> Option<TimerPayload> {
        self.inner.lock().armed.get(key).map(|(_, p)| *p)
    }

    /// The pending delay in seconds under `key`, if armed.
    pub fn delay(&self, key: &TimerKey) -> Option<i64> {
        self.inner.lock().armed.get(key).map(|(d, _)| *d)
    }

    /// Remove and return the pending payload under `key`, simulating the
    /// host firing the callback (a fired callback is no longer armed).
    pub fn fire(&self, key: &TimerKey) -> Option<TimerPayload> {
        self.inner.lock().armed.remove(key).map(|(_, p)| p)
    }

    /// All armed keys, in order.
    pub fn armed_keys(&self) -> Vec<TimerKey> {
        self.inner.lock().armed.keys().copied().collect()
    }
}

impl TimerScheduler for ManualScheduler {
    fn schedule(&mut self, key: TimerKey, delay_secs: i64, payload: TimerPayload) {
        self.inner.lock().armed.insert(key, (delay_secs, payload));
    }

    fn cancel(&mut self, key: &TimerKey) {
        self.inner.lock().armed.remove(key);
    }
}

// ── Directory ──────────────────────────────────────────────────────────

#[derive(Default)]
struct DirectoryState {
    services: BTreeMap<ServiceId, (ServiceStatus, Vec<AccountId>)>,
}

/// A static service directory backed by a table the test populates.
#[derive(Clone, Default)]
pub struct StaticDirectory {
    inner: Arc<Mutex<DirectoryState>>,
}

impl StaticDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// List (or replace) a service with its status and providers.
    pub fn put_service(
        &self,
        service: ServiceId,
        status: ServiceStatus,
        providers: Vec<AccountId>,
    ) {
        self.inner.lock().services.insert(service, (status, providers));
    }

    /// Change a listed service's status, if it exists.
    pub fn set_status(&self, service: ServiceId, status: ServiceStatus) {
        if let Some(entry) = self.inner.lock().services.get_mut(&service) {
            entry.0 = status;
        }
    }
}

impl ServiceDirectory for StaticDirectory {
    fn service_status(&self, service: ServiceId) -> Option<ServiceStatus> {
        self.inner.lock().services.get(&service).map(|(s, _)| *s)
    }

    fn service_providers(&self, service: ServiceId) -> Vec<AccountId> {
        self.inner
            .lock()
            .services
            .get(&service)
            .map(|(_, p)| p.clone())
            .unwrap_or_default()
    }
}
