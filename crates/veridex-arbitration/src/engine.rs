//! # Arbitration Engine
//!
//! The single entry point for every external action: filing complaints,
//! responding, arbitrator confirmation, voting, reappeal, and the
//! scheduler-invoked timer callbacks. The engine owns the registry, both
//! stake books, the vote ledger, and all case/round/appeal records, and
//! consumes the host's fund, timer, and catalog ports.
//!
//! ## Transactional model
//!
//! The host delivers one call at a time and persists state after the call
//! returns. Every operation validates before mutating, so an error return
//! implies the engine state is unchanged (the one documented exception is
//! crowd escalation, which commits before reporting an unfillable crowd
//! quorum — the armed arbitrator-response timer retries it).

use std::collections::BTreeMap;

use veridex_core::{AccountId, AppealId, CaseId, PublicKey, RoundId, ServiceId, Timestamp, TokenAmount};

use crate::case::{
    required_for_sequence, Appeal, AppealStatus, ArbitrationMethod, Case, CaseStep, EvidenceEntry,
    FinalRuling, Round, VoteChoice, VoteLedger,
};
use crate::error::ArbitrationError;
use crate::escrow::{EscrowLedger, ProviderStakeBook, Side, StakeEntry};
use crate::policy::ArbitrationPolicy;
use crate::ports::{FundTransfer, ServiceDirectory, ServiceStatus, TimerScheduler};
use crate::registry::{ArbitratorProfile, ArbitratorRegistry, ArbitratorTier};
use crate::selection::{draw_distinct, EntropySeed};
use crate::settlement::{settle, SettlementReport};
use crate::timer::{TimerKey, TimerPayload, TimerPurpose};

/// The arbitration engine.
///
/// Generic over the three host ports so tests can run against in-memory
/// implementations and production hosts can wire their own.
pub struct ArbitrationEngine<B, S, D> {
    policy: ArbitrationPolicy,
    bank: B,
    scheduler: S,
    directory: D,
    entropy: EntropySeed,
    registry: ArbitratorRegistry,
    escrow: EscrowLedger,
    provider_stakes: ProviderStakeBook,
    votes: VoteLedger,
    cases: BTreeMap<CaseId, Case>,
    rounds: BTreeMap<RoundId, Round>,
    appeals: BTreeMap<AppealId, Appeal>,
    settlements: BTreeMap<CaseId, SettlementReport>,
    next_case: u64,
    next_round: u64,
    next_appeal: u64,
}

impl<B, S, D> ArbitrationEngine<B, S, D>
where
    B: FundTransfer,
    S: TimerScheduler,
    D: ServiceDirectory,
{
    /// Build an engine over the given policy, host ports, and initial
    /// selection entropy.
    pub fn new(
        policy: ArbitrationPolicy,
        bank: B,
        scheduler: S,
        directory: D,
        entropy: EntropySeed,
    ) -> Self {
        Self {
            policy,
            bank,
            scheduler,
            directory,
            entropy,
            registry: ArbitratorRegistry::new(),
            escrow: EscrowLedger::new(),
            provider_stakes: ProviderStakeBook::new(),
            votes: VoteLedger::new(),
            cases: BTreeMap::new(),
            rounds: BTreeMap::new(),
            appeals: BTreeMap::new(),
            settlements: BTreeMap::new(),
            next_case: 0,
            next_round: 0,
            next_appeal: 0,
        }
    }

    /// Refresh the selection entropy (the host calls this per block).
    pub fn set_entropy(&mut self, entropy: EntropySeed) {
        self.entropy = entropy;
    }

    // ── Public operations ────────────────────────────────────────────

    /// Register an arbitrator with a stake deposit.
    pub fn register_arbitrator(
        &mut self,
        account: AccountId,
        public_key: PublicKey,
        tier: ArbitratorTier,
        stake: TokenAmount,
    ) -> Result<(), ArbitrationError> {
        self.require_policy_currency(&stake)?;
        stake.require_positive()?;
        if self.registry.contains(&account) {
            return Err(ArbitrationError::AlreadyRegistered(account));
        }
        let vault = self.policy.vault_account.clone();
        self.bank
            .transfer(&account, &vault, &stake, "arbitrator registration stake")?;
        self.registry
            .register(account.clone(), public_key, tier, stake)?;
        tracing::info!(arbitrator = %account, tier = %tier, "arbitrator registered");
        Ok(())
    }

    /// File a complaint against a service, opening a new case.
    ///
    /// Rejected while the service already has an appeal awaiting response
    /// whose case has not yet reached the started step.
    pub fn file_complaint(
        &mut self,
        applicant: AccountId,
        service: ServiceId,
        stake: TokenAmount,
        reason: impl Into<String>,
        method: ArbitrationMethod,
    ) -> Result<(AppealId, CaseId), ArbitrationError> {
        self.require_policy_currency(&stake)?;
        stake.require_positive()?;
        let status = self
            .directory
            .service_status(service)
            .ok_or(ArbitrationError::UnknownService(service))?;
        if status != ServiceStatus::Active {
            return Err(ArbitrationError::ServiceUnavailable { service, status });
        }
        let providers = self.directory.service_providers(service);
        if providers.is_empty() {
            return Err(ArbitrationError::NoProviders(service));
        }

        // One awaiting appeal per service: a new complaint is only
        // accepted once the prior case started (or ended).
        if let Some(open) = self
            .appeals
            .values()
            .find(|a| a.service_id == service && a.status == AppealStatus::AwaitingResponse)
        {
            let disputable_again = open
                .case_id
                .and_then(|id| self.cases.get(&id))
                .map(|c| {
                    matches!(c.step, CaseStep::Started | CaseStep::CrowdStarted)
                        || c.step.is_terminal()
                })
                .unwrap_or(false);
            if !disputable_again {
                return Err(ArbitrationError::AppealPending { service });
            }
        }
        let is_sponsor = !self.appeals.values().any(|a| a.service_id == service);

        let vault = self.policy.vault_account.clone();
        self.bank.transfer(
            &applicant,
            &vault,
            &stake,
            &format!("complaint stake for {service}"),
        )?;

        let appeal_id = AppealId::new(self.next_appeal);
        self.next_appeal += 1;
        let case_id = CaseId::new(self.next_case);
        self.next_case += 1;

        let deadline = Timestamp::now().plus_seconds(self.policy.respond_appeal_window_secs);
        self.cases.insert(
            case_id,
            Case::open(case_id, service, appeal_id, method, applicant.clone(), deadline),
        );
        self.appeals.insert(
            appeal_id,
            Appeal {
                id: appeal_id,
                service_id: service,
                case_id: Some(case_id),
                status: AppealStatus::AwaitingResponse,
                is_sponsor,
                applicant: applicant.clone(),
                filed_at: Timestamp::now(),
                reason: reason.into(),
            },
        );

        let side = self.side_of(service, &applicant);
        self.escrow.deposit(case_id, &applicant, &stake, side)?;

        let memo = serde_json::json!({
            "event": "complaint",
            "case": case_id.to_string(),
            "service": service.to_string(),
            "stake": stake.to_string(),
        })
        .to_string();
        for provider in &providers {
            self.notify(provider, &memo)?;
        }
        let window = self.policy.respond_appeal_window_secs;
        self.arm_timer(case_id, None, TimerPurpose::RespondAppeal, window);
        tracing::info!(case = %case_id, service = %service, applicant = %applicant, "complaint filed");
        Ok((appeal_id, case_id))
    }

    /// A respondent accepts the dispute: opens round 1 and starts
    /// arbitrator selection. Further respondents join the open round.
    pub fn respond_to_case(
        &mut self,
        responder: AccountId,
        case_id: CaseId,
    ) -> Result<RoundId, ArbitrationError> {
        let (step, service, method) = {
            let case = self
                .cases
                .get(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            case.require_step(
                &[
                    CaseStep::Init,
                    CaseStep::ChoosingArbitrators,
                    CaseStep::CrowdChoosingArbitrators,
                ],
                "respond to the case",
            )?;
            (case.step, case.service_id, case.method)
        };
        if !self.directory.service_providers(service).contains(&responder) {
            return Err(ArbitrationError::Unauthorized {
                account: responder,
                action: "respond to the case",
                case: case_id,
            });
        }

        if step == CaseStep::Init {
            self.cancel_timer(case_id, TimerPurpose::RespondAppeal);
            let required = required_for_sequence(1);
            let round_id = self.open_round(case_id, 1, required, None)?;
            if let Some(round) = self.rounds.get_mut(&round_id) {
                round.responders.insert(responder.clone());
            }
            let window = self.policy.respond_arbitrate_window_secs;
            if let Some(case) = self.cases.get_mut(&case_id) {
                case.step = CaseStep::choosing(method);
                case.deadline = Timestamp::now().plus_seconds(window);
            }
            tracing::info!(case = %case_id, responder = %responder, "dispute accepted");
            self.select_arbitrators(case_id, required)?;
            Ok(round_id)
        } else {
            let round_id = self
                .cases
                .get(&case_id)
                .and_then(|c| c.current_round())
                .ok_or(ArbitrationError::StateConflict {
                    case: case_id,
                    step: CaseStep::ChoosingArbitrators.as_str(),
                    action: "respond without an open round",
                })?;
            if let Some(round) = self.rounds.get_mut(&round_id) {
                round.responders.insert(responder);
            }
            Ok(round_id)
        }
    }

    /// A selected arbitrator confirms participation, posting the
    /// per-case stake. The case starts once the quorum is full.
    pub fn respond_as_arbitrator(
        &mut self,
        arbitrator: AccountId,
        case_id: CaseId,
        stake: TokenAmount,
    ) -> Result<(), ArbitrationError> {
        let (method, round_id, service, already_served) = {
            let case = self
                .cases
                .get(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            case.require_step(
                &[
                    CaseStep::ChoosingArbitrators,
                    CaseStep::Responded,
                    CaseStep::CrowdChoosingArbitrators,
                    CaseStep::CrowdResponded,
                ],
                "confirm participation",
            )?;
            let round_id = case.current_round().ok_or(ArbitrationError::StateConflict {
                case: case_id,
                step: case.step.as_str(),
                action: "confirm participation without an open round",
            })?;
            (
                case.method,
                round_id,
                case.service_id,
                case.excluded_arbitrators.contains(&arbitrator),
            )
        };
        // The exclusion set covers every arbitrator confirmed earlier in
        // the case (until a crowd escalation resets it); a round's panel
        // must stay disjoint from it.
        if already_served {
            return Err(ArbitrationError::AlreadyConfirmed {
                round: round_id,
                arbitrator,
            });
        }

        let profile = self
            .registry
            .get(&arbitrator)
            .ok_or_else(|| ArbitrationError::UnknownArbitrator(arbitrator.clone()))?;
        if profile.is_malicious {
            return Err(ArbitrationError::Unauthorized {
                account: arbitrator,
                action: "confirm participation",
                case: case_id,
            });
        }
        self.require_policy_currency(&stake)?;
        let required_stake = self
            .policy
            .required_arbitrator_stake(method == ArbitrationMethod::Crowd);
        if stake.amount < required_stake.amount {
            return Err(ArbitrationError::InsufficientStake {
                required: required_stake.amount,
                offered: stake.amount,
            });
        }
        if let Some(round) = self.rounds.get(&round_id) {
            if round.arbitrators.contains(&arbitrator) {
                return Err(ArbitrationError::AlreadyConfirmed {
                    round: round_id,
                    arbitrator,
                });
            }
        }

        let vault = self.policy.vault_account.clone();
        self.bank.transfer(
            &arbitrator,
            &vault,
            &stake,
            &format!("{case_id} arbitration participation stake"),
        )?;
        self.registry.add_stake(&arbitrator, &stake)?;

        let confirmed = {
            let round = self
                .rounds
                .get_mut(&round_id)
                .ok_or(ArbitrationError::UnknownRound(round_id))?;
            round.arbitrators.insert(arbitrator.clone());
            round.arbitrators.len() as u64
        };
        let required = {
            let case = self
                .cases
                .get_mut(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            case.confirm_arbitrator(arbitrator.clone());
            case.step = CaseStep::responded(method);
            case.required_arbitrators
        };
        tracing::debug!(
            case = %case_id,
            arbitrator = %arbitrator,
            confirmed,
            required,
            "arbitrator confirmed"
        );

        if confirmed >= required {
            let window = self.policy.upload_result_window_secs;
            if let Some(case) = self.cases.get_mut(&case_id) {
                case.step = CaseStep::started(method);
                case.deadline = Timestamp::now().plus_seconds(window);
            }
            self.close_service_appeals(service);
            self.cancel_timer(case_id, TimerPurpose::RespondArbitrate);
            self.arm_timer(case_id, Some(round_id), TimerPurpose::UploadResult, window);
            tracing::info!(case = %case_id, quorum = required, "arbitration started");
        } else {
            self.select_arbitrators(case_id, required - confirmed)?;
        }
        Ok(())
    }

    /// A party attaches evidence to the current round.
    pub fn upload_evidence(
        &mut self,
        account: AccountId,
        case_id: CaseId,
        text: impl Into<String>,
    ) -> Result<(), ArbitrationError> {
        let round_id = {
            let case = self
                .cases
                .get(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            if case.step.is_terminal() {
                return Err(ArbitrationError::StateConflict {
                    case: case_id,
                    step: case.step.as_str(),
                    action: "upload evidence",
                });
            }
            case.current_round().ok_or(ArbitrationError::StateConflict {
                case: case_id,
                step: case.step.as_str(),
                action: "upload evidence before any round",
            })?
        };
        let authorized = {
            let case = self
                .cases
                .get(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            let round = self
                .rounds
                .get(&round_id)
                .ok_or(ArbitrationError::UnknownRound(round_id))?;
            case.applicants.contains(&account) || round.responders.contains(&account)
        };
        if !authorized {
            return Err(ArbitrationError::Unauthorized {
                account,
                action: "upload evidence",
                case: case_id,
            });
        }
        if let Some(round) = self.rounds.get_mut(&round_id) {
            round.evidence.push(EvidenceEntry {
                account,
                text: text.into(),
                submitted_at: Timestamp::now(),
            });
        }
        Ok(())
    }

    /// An arbitrator uploads a vote. Returns the tallied result when this
    /// vote completed the quorum and triggered the tally.
    pub fn upload_vote(
        &mut self,
        arbitrator: AccountId,
        case_id: CaseId,
        vote: u8,
    ) -> Result<Option<VoteChoice>, ArbitrationError> {
        let choice = VoteChoice::from_wire(vote)?;
        let (round_id, deadline, step_str) = {
            let case = self
                .cases
                .get(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            case.require_step(&[CaseStep::Started, CaseStep::CrowdStarted], "upload a vote")?;
            let round_id = case.current_round().ok_or(ArbitrationError::StateConflict {
                case: case_id,
                step: case.step.as_str(),
                action: "upload a vote without an open round",
            })?;
            (round_id, case.deadline.clone(), case.step.as_str())
        };
        if Timestamp::now() > deadline {
            return Err(ArbitrationError::StateConflict {
                case: case_id,
                step: step_str,
                action: "upload a vote after the deadline",
            });
        }
        {
            let round = self
                .rounds
                .get_mut(&round_id)
                .ok_or(ArbitrationError::UnknownRound(round_id))?;
            if !round.arbitrators.contains(&arbitrator) {
                return Err(ArbitrationError::Unauthorized {
                    account: arbitrator,
                    action: "vote",
                    case: case_id,
                });
            }
            // Stragglers after the quorum fired cannot reopen the tally.
            if round.tallied_result.is_some() {
                return Err(ArbitrationError::StateConflict {
                    case: case_id,
                    step: step_str,
                    action: "upload a vote after the tally",
                });
            }
            round.record_vote(arbitrator.clone(), choice)?;
        }
        self.votes.append(case_id, round_id, arbitrator.clone(), choice);
        tracing::debug!(case = %case_id, arbitrator = %arbitrator, vote = choice.as_wire(), "vote recorded");

        let quorum = self
            .rounds
            .get(&round_id)
            .map(|r| r.quorum_reached())
            .unwrap_or(false);
        if quorum {
            let result = self.begin_tally(case_id)?;
            return Ok(Some(result));
        }
        Ok(None)
    }

    /// The losing side reappeals a tallied multi-round case within the
    /// reappeal window, opening the next round.
    pub fn reappeal(
        &mut self,
        applicant: AccountId,
        case_id: CaseId,
        stake: TokenAmount,
        reason: impl Into<String>,
    ) -> Result<AppealId, ArbitrationError> {
        let (service, round_id) = {
            let case = self
                .cases
                .get(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            if case.method != ArbitrationMethod::MultiRound {
                return Err(ArbitrationError::StateConflict {
                    case: case_id,
                    step: case.step.as_str(),
                    action: "reappeal a crowd-arbitrated case",
                });
            }
            case.require_step(&[CaseStep::Started], "reappeal")?;
            let round_id = case.current_round().ok_or(ArbitrationError::StateConflict {
                case: case_id,
                step: case.step.as_str(),
                action: "reappeal before any round",
            })?;
            (case.service_id, round_id)
        };
        let (prev_sequence, tallied) = {
            let round = self
                .rounds
                .get(&round_id)
                .ok_or(ArbitrationError::UnknownRound(round_id))?;
            (round.sequence, round.tallied_result.is_some())
        };
        if !tallied {
            return Err(ArbitrationError::StateConflict {
                case: case_id,
                step: "STARTED",
                action: "reappeal before the round is tallied",
            });
        }
        let status = self
            .directory
            .service_status(service)
            .ok_or(ArbitrationError::UnknownService(service))?;
        if status != ServiceStatus::Active {
            return Err(ArbitrationError::ServiceUnavailable { service, status });
        }
        self.require_policy_currency(&stake)?;
        stake.require_positive()?;

        let vault = self.policy.vault_account.clone();
        self.bank.transfer(
            &applicant,
            &vault,
            &stake,
            &format!("{case_id} reappeal stake"),
        )?;
        let side = self.side_of(service, &applicant);
        self.escrow.deposit(case_id, &applicant, &stake, side)?;

        let appeal_id = AppealId::new(self.next_appeal);
        self.next_appeal += 1;
        self.appeals.insert(
            appeal_id,
            Appeal {
                id: appeal_id,
                service_id: service,
                case_id: Some(case_id),
                status: AppealStatus::AwaitingResponse,
                is_sponsor: false,
                applicant: applicant.clone(),
                filed_at: Timestamp::now(),
                reason: reason.into(),
            },
        );

        let new_sequence = prev_sequence + 1;
        let new_round = self.open_round(case_id, new_sequence, required_for_sequence(new_sequence), None)?;

        let window = self.policy.respond_appeal_window_secs;
        if let Some(case) = self.cases.get_mut(&case_id) {
            case.applicants.insert(applicant.clone());
            // The reappealing side becomes the applicant side; whoever is
            // opposite must now respond.
            case.is_respondent_provider = side == Side::Consumer;
            case.step = CaseStep::Reappeal;
            case.deadline = Timestamp::now().plus_seconds(window);
        }
        self.cancel_timer(case_id, TimerPurpose::ReappealWindow);

        let targets: Vec<AccountId> = if side == Side::Consumer {
            self.directory.service_providers(service)
        } else {
            let (consumers, _) =
                self.escrow
                    .balances_by_side(case_id, Side::Consumer, &self.policy.currency)?;
            consumers
        };
        let memo = serde_json::json!({
            "event": "reappeal",
            "case": case_id.to_string(),
            "service": service.to_string(),
            "stake": stake.to_string(),
        })
        .to_string();
        for target in &targets {
            self.notify(target, &memo)?;
        }
        self.arm_timer(case_id, Some(new_round), TimerPurpose::RespondAppeal, window);
        tracing::info!(case = %case_id, applicant = %applicant, sequence = new_sequence, "reappeal filed");
        Ok(appeal_id)
    }

    /// The opposite side answers a reappeal, restarting arbitrator
    /// selection for the new round.
    pub fn re_respond(
        &mut self,
        responder: AccountId,
        case_id: CaseId,
    ) -> Result<(), ArbitrationError> {
        let (service, round_id, respondent_is_provider, is_prior_applicant) = {
            let case = self
                .cases
                .get(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            case.require_step(&[CaseStep::Reappeal], "re-respond")?;
            let round_id = case.current_round().ok_or(ArbitrationError::StateConflict {
                case: case_id,
                step: case.step.as_str(),
                action: "re-respond without an open round",
            })?;
            (
                case.service_id,
                round_id,
                case.is_respondent_provider,
                case.applicants.contains(&responder),
            )
        };
        let expected_side = if respondent_is_provider {
            Side::Provider
        } else {
            Side::Consumer
        };
        let responder_side = self.side_of(service, &responder);
        // Consumer-side respondents must additionally be prior case
        // participants; any provider of the service may answer.
        let authorized = responder_side == expected_side
            && (expected_side == Side::Provider || is_prior_applicant);
        if !authorized {
            return Err(ArbitrationError::Unauthorized {
                account: responder,
                action: "re-respond",
                case: case_id,
            });
        }

        self.cancel_timer(case_id, TimerPurpose::RespondAppeal);
        if let Some(round) = self.rounds.get_mut(&round_id) {
            round.responders.insert(responder.clone());
        }
        let window = self.policy.respond_arbitrate_window_secs;
        let required = {
            let case = self
                .cases
                .get_mut(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            case.step = CaseStep::ChoosingArbitrators;
            case.deadline = Timestamp::now().plus_seconds(window);
            case.required_arbitrators
        };
        tracing::info!(case = %case_id, responder = %responder, "reappeal answered");
        self.select_arbitrators(case_id, required)
    }

    /// Scheduler-only entry point: a timer fired. Callbacks whose
    /// precondition was superseded no-op.
    pub fn on_timer(&mut self, payload: TimerPayload) -> Result<(), ArbitrationError> {
        let case_id = payload.case;
        let Some(case) = self.cases.get(&case_id) else {
            tracing::debug!(case = %case_id, purpose = %payload.purpose, "timer for unknown case ignored");
            return Ok(());
        };
        let step = case.step;
        let settled = case.settled;
        let current_round = case.current_round();

        match payload.purpose {
            TimerPurpose::RespondAppeal => match step {
                CaseStep::Init => {
                    // Nobody ever responded: default judgment against the
                    // silent respondent.
                    tracing::info!(case = %case_id, "respondent silent, default judgment");
                    self.finalize(case_id, FinalRuling::ApplicantWins, CaseStep::Ended)
                }
                CaseStep::Reappeal => {
                    // Nobody answered the reappeal: the reappealing side
                    // wins by default.
                    tracing::info!(case = %case_id, "reappeal unanswered, default judgment");
                    self.finalize(
                        case_id,
                        FinalRuling::ApplicantWins,
                        CaseStep::ReappealTimeoutEnded,
                    )
                }
                _ => {
                    tracing::debug!(case = %case_id, step = %step, "respond-appeal timer superseded");
                    Ok(())
                }
            },
            TimerPurpose::RespondArbitrate => {
                let selecting = matches!(
                    step,
                    CaseStep::ChoosingArbitrators
                        | CaseStep::Responded
                        | CaseStep::CrowdChoosingArbitrators
                        | CaseStep::CrowdResponded
                );
                if !selecting {
                    tracing::debug!(case = %case_id, step = %step, "respond-arbitrate timer superseded");
                    return Ok(());
                }
                let missing = current_round
                    .and_then(|id| self.rounds.get(&id))
                    .map(|r| r.missing_arbitrators())
                    .unwrap_or(0);
                if missing == 0 {
                    return Ok(());
                }
                self.select_arbitrators(case_id, missing)
            }
            TimerPurpose::UploadResult => {
                if !matches!(step, CaseStep::Started | CaseStep::CrowdStarted) {
                    tracing::debug!(case = %case_id, step = %step, "upload-result timer superseded");
                    return Ok(());
                }
                let untallied = current_round
                    .and_then(|id| self.rounds.get(&id))
                    .map(|r| r.tallied_result.is_none())
                    .unwrap_or(false);
                if !untallied {
                    return Ok(());
                }
                tracing::info!(case = %case_id, "vote window expired, forcing tally");
                self.begin_tally(case_id).map(|_| ())
            }
            TimerPurpose::ReappealWindow => {
                if step != CaseStep::Started || settled {
                    tracing::debug!(case = %case_id, step = %step, "reappeal-window timer superseded");
                    return Ok(());
                }
                let Some(result) = current_round
                    .and_then(|id| self.rounds.get(&id))
                    .and_then(|r| r.tallied_result)
                else {
                    tracing::debug!(case = %case_id, "reappeal-window timer without a tallied round ignored");
                    return Ok(());
                };
                tracing::info!(case = %case_id, "reappeal window closed, finalizing");
                self.finalize(case_id, FinalRuling::from_tally(result), CaseStep::Ended)
            }
        }
    }

    /// Mirror a service-level provider stake deposit from the catalog, so
    /// settlement can forfeit it.
    pub fn fund_provider_stake(
        &mut self,
        service: ServiceId,
        provider: AccountId,
        amount: TokenAmount,
    ) -> Result<(), ArbitrationError> {
        self.require_policy_currency(&amount)?;
        self.provider_stakes.fund(service, &provider, &amount)
    }

    // ── Read-only accessors ──────────────────────────────────────────

    /// Look up a case.
    pub fn case(&self, id: CaseId) -> Option<&Case> {
        self.cases.get(&id)
    }

    /// Look up a round.
    pub fn round(&self, id: RoundId) -> Option<&Round> {
        self.rounds.get(&id)
    }

    /// Look up an appeal.
    pub fn appeal(&self, id: AppealId) -> Option<&Appeal> {
        self.appeals.get(&id)
    }

    /// Look up an arbitrator profile.
    pub fn arbitrator(&self, account: &AccountId) -> Option<&ArbitratorProfile> {
        self.registry.get(account)
    }

    /// One account's escrow entry within a case.
    pub fn escrow_entry(&self, case: CaseId, account: &AccountId) -> Option<&StakeEntry> {
        self.escrow.entry(case, account)
    }

    /// The sum of all escrow balances held for a case.
    pub fn escrow_case_total(&self, case: CaseId) -> Result<TokenAmount, ArbitrationError> {
        self.escrow.case_total(case, &self.policy.currency)
    }

    /// One provider's service-level stake as mirrored by the engine.
    pub fn provider_stake(&self, service: ServiceId, provider: &AccountId) -> Option<&TokenAmount> {
        self.provider_stakes.stake_of(service, provider)
    }

    /// The settlement report for a settled case.
    pub fn settlement(&self, case: CaseId) -> Option<&SettlementReport> {
        self.settlements.get(&case)
    }

    /// The append-only vote ledger.
    pub fn vote_ledger(&self) -> &VoteLedger {
        &self.votes
    }

    /// The active policy.
    pub fn policy(&self) -> &ArbitrationPolicy {
        &self.policy
    }

    // ── Internals ────────────────────────────────────────────────────

    fn require_policy_currency(&self, amount: &TokenAmount) -> Result<(), ArbitrationError> {
        if amount.currency != self.policy.currency {
            return Err(veridex_core::AmountError::CurrencyMismatch {
                left: amount.currency.code.clone(),
                right: self.policy.currency.code.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Provider accounts are on the provider side; everyone else is a
    /// consumer.
    fn side_of(&self, service: ServiceId, account: &AccountId) -> Side {
        if self.directory.service_providers(service).contains(account) {
            Side::Provider
        } else {
            Side::Consumer
        }
    }

    fn notify(&mut self, to: &AccountId, memo: &str) -> Result<(), ArbitrationError> {
        let amount = self.policy.notify_amount();
        let vault = self.policy.vault_account.clone();
        self.bank.transfer(&vault, to, &amount, memo)?;
        Ok(())
    }

    fn arm_timer(
        &mut self,
        case: CaseId,
        round: Option<RoundId>,
        purpose: TimerPurpose,
        delay_secs: i64,
    ) {
        let payload = TimerPayload { case, round, purpose };
        self.scheduler
            .schedule(TimerKey::new(case, purpose), delay_secs, payload);
    }

    fn cancel_timer(&mut self, case: CaseId, purpose: TimerPurpose) {
        self.scheduler.cancel(&TimerKey::new(case, purpose));
    }

    fn close_service_appeals(&mut self, service: ServiceId) {
        for appeal in self
            .appeals
            .values_mut()
            .filter(|a| a.service_id == service && a.status == AppealStatus::AwaitingResponse)
        {
            appeal.status = AppealStatus::Closed;
        }
    }

    fn open_round(
        &mut self,
        case_id: CaseId,
        sequence: u32,
        required: u64,
        carry_responders_from: Option<RoundId>,
    ) -> Result<RoundId, ArbitrationError> {
        let id = RoundId::new(self.next_round);
        self.next_round += 1;
        let mut round = Round::new(id, case_id, sequence, required);
        if let Some(prev) = carry_responders_from {
            if let Some(prev_round) = self.rounds.get(&prev) {
                round.responders = prev_round.responders.clone();
            }
        }
        self.rounds.insert(id, round);
        let case = self
            .cases
            .get_mut(&case_id)
            .ok_or(ArbitrationError::UnknownCase(case_id))?;
        case.rounds.push(id);
        case.required_arbitrators = required;
        Ok(id)
    }

    /// Fill the current round's quorum: draw from the eligible pool,
    /// notify the selected arbitrators, and arm the response timer.
    ///
    /// A short professional pool escalates the case onto the crowd track
    /// with a doubled quorum and a fresh exclusion set; a short crowd pool
    /// is a hard `NoEligibleArbitrators` (retried by the response timer).
    fn select_arbitrators(
        &mut self,
        case_id: CaseId,
        mut count: u64,
    ) -> Result<(), ArbitrationError> {
        loop {
            let (round_id, on_crowd_track, excluded, service) = {
                let case = self
                    .cases
                    .get(&case_id)
                    .ok_or(ArbitrationError::UnknownCase(case_id))?;
                let round_id = case.current_round().ok_or(ArbitrationError::StateConflict {
                    case: case_id,
                    step: case.step.as_str(),
                    action: "select arbitrators without an open round",
                })?;
                (
                    round_id,
                    case.method == ArbitrationMethod::Crowd,
                    case.excluded_arbitrators.clone(),
                    case.service_id,
                )
            };
            let window = self.policy.respond_arbitrate_window_secs;
            self.arm_timer(case_id, Some(round_id), TimerPurpose::RespondArbitrate, window);

            let pool = self.registry.eligible_candidates(&excluded);
            if pool.len() as u64 >= count {
                let selected = draw_distinct(&pool, count, &self.entropy, round_id);
                let memo = serde_json::json!({
                    "event": "invitation",
                    "case": case_id.to_string(),
                    "service": service.to_string(),
                    "round": round_id.to_string(),
                })
                .to_string();
                for arbitrator in &selected {
                    self.notify(arbitrator, &memo)?;
                }
                tracing::debug!(case = %case_id, round = %round_id, invited = selected.len(), "arbitrators invited");
                return Ok(());
            }

            if on_crowd_track {
                tracing::warn!(
                    case = %case_id,
                    required = count,
                    eligible = pool.len(),
                    "crowd pool cannot fill quorum"
                );
                return Err(ArbitrationError::NoEligibleArbitrators {
                    required: count,
                    eligible: pool.len() as u64,
                });
            }

            // Professional pool exhausted: escalate to crowd arbitration.
            // The quorum doubles, the exclusion set resets, and the loop
            // retries against the full crowd pool.
            let doubled = count.saturating_mul(2);
            let prev_sequence = self
                .rounds
                .get(&round_id)
                .map(|r| r.sequence)
                .unwrap_or(1);
            if let Some(case) = self.cases.get_mut(&case_id) {
                case.escalate_to_crowd();
            }
            self.open_round(case_id, prev_sequence + 1, doubled, Some(round_id))?;
            tracing::info!(
                case = %case_id,
                required = doubled,
                "professional pool short, escalated to crowd arbitration"
            );
            count = doubled;
        }
    }

    /// Tally the current round and route the case onward: crowd cases
    /// settle immediately, multi-round cases open the reappeal window.
    fn begin_tally(&mut self, case_id: CaseId) -> Result<VoteChoice, ArbitrationError> {
        self.cancel_timer(case_id, TimerPurpose::UploadResult);
        let (round_id, method) = {
            let case = self
                .cases
                .get(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            let round_id = case.current_round().ok_or(ArbitrationError::StateConflict {
                case: case_id,
                step: case.step.as_str(),
                action: "tally without an open round",
            })?;
            (round_id, case.method)
        };
        let result = {
            let round = self
                .rounds
                .get_mut(&round_id)
                .ok_or(ArbitrationError::UnknownRound(round_id))?;
            let result = round.tally();
            round.tallied_result = Some(result);
            result
        };
        if let Some(case) = self.cases.get_mut(&case_id) {
            case.last_round = Some(round_id);
        }
        tracing::info!(case = %case_id, round = %round_id, result = result.as_wire(), "round tallied");

        match method {
            ArbitrationMethod::Crowd => {
                self.finalize(case_id, FinalRuling::from_tally(result), CaseStep::Ended)?;
            }
            ArbitrationMethod::MultiRound => {
                let window = self.policy.reappeal_window_secs;
                if let Some(case) = self.cases.get_mut(&case_id) {
                    case.deadline = Timestamp::now().plus_seconds(window);
                }
                self.arm_timer(case_id, Some(round_id), TimerPurpose::ReappealWindow, window);
            }
        }
        Ok(result)
    }

    /// Move the case to a terminal step with the given ruling and settle.
    fn finalize(
        &mut self,
        case_id: CaseId,
        ruling: FinalRuling,
        terminal_step: CaseStep,
    ) -> Result<(), ArbitrationError> {
        let service = {
            let case = self
                .cases
                .get_mut(&case_id)
                .ok_or(ArbitrationError::UnknownCase(case_id))?;
            case.final_ruling = ruling;
            case.step = terminal_step;
            case.service_id
        };
        for purpose in [
            TimerPurpose::RespondAppeal,
            TimerPurpose::RespondArbitrate,
            TimerPurpose::UploadResult,
            TimerPurpose::ReappealWindow,
        ] {
            self.cancel_timer(case_id, purpose);
        }
        self.close_service_appeals(service);

        let case = self
            .cases
            .get_mut(&case_id)
            .ok_or(ArbitrationError::UnknownCase(case_id))?;
        let final_round_id = case.current_round();
        let final_round = match final_round_id {
            Some(id) => self.rounds.get(&id),
            None => None,
        };
        let report = settle(
            case,
            final_round,
            &mut self.escrow,
            &mut self.provider_stakes,
            &mut self.registry,
            &self.votes,
            &self.policy,
            &mut self.bank,
        )?;
        self.settlements.insert(case_id, report);
        Ok(())
    }
}
