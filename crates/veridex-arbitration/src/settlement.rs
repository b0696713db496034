//! # Settlement
//!
//! Runs exactly once per case when it reaches a terminal step: determines
//! the losing economic side, slashes its case escrow (plus the provider's
//! service-level stake when the provider side lost), splits the pool into
//! a winners' dividend and an arbitrator fee, and updates every case
//! arbitrator's correctness record.
//!
//! ## Accounting
//!
//! All math is integer, in smallest currency units. The dividend is the
//! floored percentage of the slashed total; the fee pool is the exact
//! remainder, so `dividend + fee == slashed` always. Per-recipient shares
//! are floored; the sub-share remainder stays in the vault.
//!
//! Settlement is idempotent by construction: the `settled` flag is checked
//! first and set last, and a second invocation fails with
//! [`ArbitrationError::AlreadySettled`] before touching any balance.

use serde::{Deserialize, Serialize};
use veridex_core::{AccountId, CaseId, TokenAmount};

use crate::case::{Case, FinalRuling, Round, VoteLedger};
use crate::error::ArbitrationError;
use crate::escrow::{EscrowLedger, ProviderStakeBook, Side};
use crate::policy::ArbitrationPolicy;
use crate::ports::FundTransfer;
use crate::registry::ArbitratorRegistry;

/// The audited outcome of one settlement run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    /// The settled case.
    pub case: CaseId,
    /// The final ruling the settlement applied.
    pub ruling: FinalRuling,
    /// The economic side that won.
    pub winner_side: Side,
    /// The economic side that was slashed.
    pub loser_side: Side,
    /// Case escrow slashed, smallest units.
    pub case_slash: i64,
    /// Service-level provider stake slashed, smallest units.
    pub service_stake_slash: i64,
    /// Total slashed pool, smallest units.
    pub slashed_total: i64,
    /// Dividend pool (80% floor of the slash).
    pub dividend_pool: i64,
    /// Arbitrator fee pool (exact remainder of the slash).
    pub fee_pool: i64,
    /// Dividend credited to each winning escrow account.
    pub dividend_per_winner: i64,
    /// Fee credited to each final-round arbitrator.
    pub fee_per_arbitrator: i64,
    /// Winning-side escrow accounts that received the dividend.
    pub winners: Vec<AccountId>,
    /// Losing-side escrow accounts that were zeroed.
    pub slashed_accounts: Vec<AccountId>,
    /// Final-round arbitrators that received the fee.
    pub paid_arbitrators: Vec<AccountId>,
}

/// The economic side a ruling awards the case to.
pub fn winner_side(ruling: FinalRuling, is_respondent_provider: bool) -> Option<Side> {
    let respondent_side = if is_respondent_provider {
        Side::Provider
    } else {
        Side::Consumer
    };
    match ruling {
        FinalRuling::Undetermined => None,
        FinalRuling::ApplicantWins => Some(respondent_side.opposite()),
        FinalRuling::RespondentWins => Some(respondent_side),
    }
}

/// Settle a terminal case against the engine's books.
///
/// `final_round` is the round whose tally (or default judgment) became
/// the case outcome; its arbitrators receive the fee pool. A case that
/// ended by default judgment before any round opened settles with no
/// final round and therefore no fee recipients.
#[allow(clippy::too_many_arguments)]
pub(crate) fn settle<B: FundTransfer>(
    case: &mut Case,
    final_round: Option<&Round>,
    escrow: &mut EscrowLedger,
    provider_stakes: &mut ProviderStakeBook,
    registry: &mut ArbitratorRegistry,
    votes: &VoteLedger,
    policy: &ArbitrationPolicy,
    bank: &mut B,
) -> Result<SettlementReport, ArbitrationError> {
    if case.settled {
        return Err(ArbitrationError::AlreadySettled(case.id));
    }
    if !case.step.is_terminal() {
        return Err(ArbitrationError::StateConflict {
            case: case.id,
            step: case.step.as_str(),
            action: "settle",
        });
    }
    let ruling = case.final_ruling;
    let winner = winner_side(ruling, case.is_respondent_provider).ok_or(
        ArbitrationError::StateConflict {
            case: case.id,
            step: case.step.as_str(),
            action: "settle without a ruling",
        },
    )?;
    let loser = winner.opposite();
    let currency = &policy.currency;

    // Slash the losing side's case escrow.
    let (slashed_accounts, _) = escrow.balances_by_side(case.id, loser, currency)?;
    let case_slash = escrow.slash_side(case.id, loser, currency)?;

    // A losing provider side additionally forfeits its service-level
    // stake. Policy alternative (unconditional forfeiture) deliberately
    // not implemented; see DESIGN.md.
    let mut service_stake_slash = TokenAmount::zero(currency.clone());
    if loser == Side::Provider {
        service_stake_slash = provider_stakes.slash_service(case.service_id, currency)?;
        if service_stake_slash.is_positive() {
            bank.transfer(
                &policy.staking_account,
                &policy.vault_account,
                &service_stake_slash,
                &format!("{} service stake forfeiture", case.id),
            )?;
        }
    }

    let slashed_total = case_slash.checked_add(&service_stake_slash)?;
    let (dividend_pool, fee_pool) = policy.dividend_split(slashed_total.amount);

    // Winners' dividend: even floor split over winning-side escrow
    // accounts, credited back into their escrow balances.
    let (winners, _) = escrow.balances_by_side(case.id, winner, currency)?;
    let dividend_per_winner = if winners.is_empty() {
        0
    } else {
        dividend_pool / winners.len() as i64
    };
    if dividend_per_winner > 0 {
        let share = TokenAmount::new(dividend_per_winner, currency.clone());
        for account in &winners {
            escrow.credit_dividend(case.id, account, &share)?;
        }
    }

    // Arbitrator fee: even floor split over the final round's
    // arbitrators, credited to accrued income.
    let paid_arbitrators: Vec<AccountId> = final_round
        .map(|round| round.arbitrators.iter().cloned().collect())
        .unwrap_or_default();
    let fee_per_arbitrator = if paid_arbitrators.is_empty() {
        0
    } else {
        fee_pool / paid_arbitrators.len() as i64
    };
    if fee_per_arbitrator > 0 {
        let share = TokenAmount::new(fee_per_arbitrator, currency.clone());
        for account in &paid_arbitrators {
            registry.credit_income(account, &share)?;
        }
    }

    case.settled = true;
    case.final_winner = Some(winner);
    case.last_round = final_round.map(|round| round.id);

    // Correctness update runs last, over every arbitrator the case ever
    // confirmed. Arbitrators who never voted score 0 of 0.
    if let Some(winning_choice) = ruling.as_tally() {
        let scores = votes.case_score(case.id, winning_choice);
        for account in case.arbitrators.clone() {
            let (correct, total) = scores.get(&account).copied().unwrap_or((0, 0));
            registry.record_case_outcome(&account, correct, total, policy.correctness_threshold);
        }
    }

    let report = SettlementReport {
        case: case.id,
        ruling,
        winner_side: winner,
        loser_side: loser,
        case_slash: case_slash.amount,
        service_stake_slash: service_stake_slash.amount,
        slashed_total: slashed_total.amount,
        dividend_pool,
        fee_pool,
        dividend_per_winner,
        fee_per_arbitrator,
        winners,
        slashed_accounts,
        paid_arbitrators,
    };
    tracing::info!(
        case = %case.id,
        ruling = ?report.ruling,
        winner = %report.winner_side,
        slashed = report.slashed_total,
        dividend = report.dividend_pool,
        fee = report.fee_pool,
        "case settled"
    );
    Ok(report)
}
