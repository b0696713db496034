//! # Protocol Policy
//!
//! The tunable constants of the arbitration protocol, gathered into one
//! struct the engine takes at construction. Tests shorten the timeout
//! windows; production hosts supply the governance-approved values.

use serde::{Deserialize, Serialize};

use veridex_core::{AccountId, Currency, TokenAmount};

/// Ten hours, the protocol's standard response window.
const STANDARD_WINDOW_SECS: i64 = 10 * 3600;

/// Protocol constants for the arbitration engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationPolicy {
    /// The settlement currency every stake must be denominated in.
    pub currency: Currency,
    /// The arbitration vault: stake deposits land here, notifications and
    /// payouts originate here.
    pub vault_account: AccountId,
    /// The marketplace staking vault holding service-level provider
    /// stakes; debited when a losing provider side forfeits service stake.
    pub staking_account: AccountId,
    /// Acknowledgment transfer sent to notified parties, smallest units.
    pub notify_amount: i64,
    /// Per-case stake an arbitrator must post to confirm participation,
    /// smallest units.
    pub arbitrator_stake: i64,
    /// Multiplier applied to `arbitrator_stake` on the crowd track.
    pub crowd_stake_multiplier: i64,
    /// Correctness rate below which an arbitrator is flagged malicious.
    pub correctness_threshold: f64,
    /// Percentage of the slashed pool paid to winners as dividend; the
    /// rest is the arbitrator fee pool.
    pub dividend_percent: u8,
    /// Window for a respondent to answer a complaint or reappeal, seconds.
    pub respond_appeal_window_secs: i64,
    /// Window for selected arbitrators to confirm participation, seconds.
    pub respond_arbitrate_window_secs: i64,
    /// Window for confirmed arbitrators to upload votes, seconds.
    pub upload_result_window_secs: i64,
    /// Window in which a tallied multi-round case may be reappealed,
    /// seconds.
    pub reappeal_window_secs: i64,
}

impl ArbitrationPolicy {
    /// The standard protocol policy with the given engine accounts.
    pub fn standard(vault_account: AccountId, staking_account: AccountId) -> Self {
        Self {
            currency: Currency::vdx(),
            vault_account,
            staking_account,
            notify_amount: 1,
            arbitrator_stake: 100_0000,
            crowd_stake_multiplier: 2,
            correctness_threshold: 0.5,
            dividend_percent: 80,
            respond_appeal_window_secs: STANDARD_WINDOW_SECS,
            respond_arbitrate_window_secs: STANDARD_WINDOW_SECS,
            upload_result_window_secs: STANDARD_WINDOW_SECS,
            reappeal_window_secs: STANDARD_WINDOW_SECS,
        }
    }

    /// The one-unit acknowledgment amount as a [`TokenAmount`].
    pub fn notify_amount(&self) -> TokenAmount {
        TokenAmount::new(self.notify_amount, self.currency.clone())
    }

    /// The stake an arbitrator must post to confirm participation.
    pub fn required_arbitrator_stake(&self, crowd: bool) -> TokenAmount {
        let amount = if crowd {
            self.arbitrator_stake.saturating_mul(self.crowd_stake_multiplier)
        } else {
            self.arbitrator_stake
        };
        TokenAmount::new(amount, self.currency.clone())
    }

    /// Split a slashed total into `(dividend_pool, fee_pool)`.
    ///
    /// The dividend is the floored percentage; the fee pool is the exact
    /// remainder, so the two always sum to the slashed total. The
    /// intermediate product is widened to i128 so the split cannot
    /// overflow for any representable slash.
    pub fn dividend_split(&self, slashed: i64) -> (i64, i64) {
        let dividend = (i128::from(slashed) * i128::from(self.dividend_percent) / 100) as i64;
        (dividend, slashed - dividend)
    }
}
