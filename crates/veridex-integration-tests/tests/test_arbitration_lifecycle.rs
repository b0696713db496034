//! Full arbitration lifecycle against the in-memory host: complaint,
//! response, arbitrator selection and confirmation, voting, the reappeal
//! window, and settlement — asserting case steps, escrow movements, and
//! bank conservation at every stage.

use veridex_arbitration::{
    ArbitrationEngine, ArbitrationMethod, ArbitrationPolicy, ArbitratorTier, CaseStep,
    EntropySeed, FinalRuling, ServiceStatus, Side, TimerKey, TimerPurpose, VoteChoice,
};
use veridex_core::{AccountId, CaseId, Currency, PublicKey, ServiceId, TokenAmount};
use veridex_stub::{InMemoryBank, ManualScheduler, StaticDirectory};

type Engine = ArbitrationEngine<InMemoryBank, ManualScheduler, StaticDirectory>;

const ARB_STAKE: i64 = 100_0000;

fn acct(s: &str) -> AccountId {
    AccountId::new(s).unwrap()
}

fn vdx(amount: i64) -> TokenAmount {
    TokenAmount::new(amount, Currency::vdx())
}

fn service() -> ServiceId {
    ServiceId::new(7)
}

struct World {
    engine: Engine,
    bank: InMemoryBank,
    scheduler: ManualScheduler,
    accounts: Vec<AccountId>,
}

fn world(arbitrators: &[&str]) -> World {
    let bank = InMemoryBank::new();
    let scheduler = ManualScheduler::new();
    let directory = StaticDirectory::new();
    directory.put_service(service(), ServiceStatus::Active, vec![acct("prov.a")]);

    let mut accounts = vec![
        acct("veridex.arb"),
        acct("veridex.stake"),
        acct("consumer"),
        acct("prov.a"),
    ];
    bank.credit(&acct("veridex.arb"), 1_000_000);
    bank.credit(&acct("veridex.stake"), 100_000_000);
    bank.credit(&acct("consumer"), 10_000_000);
    bank.credit(&acct("prov.a"), 10_000_000);

    let policy = ArbitrationPolicy::standard(acct("veridex.arb"), acct("veridex.stake"));
    let mut engine = ArbitrationEngine::new(
        policy,
        bank.clone(),
        scheduler.clone(),
        directory,
        EntropySeed::derive(b"lifecycle-seed"),
    );
    for name in arbitrators {
        bank.credit(&acct(name), 10_000_000);
        accounts.push(acct(name));
        engine
            .register_arbitrator(
                acct(name),
                PublicKey::new(format!("VDX{name}")).unwrap(),
                ArbitratorTier::Professional,
                vdx(5_000_000),
            )
            .unwrap();
    }
    World {
        engine,
        bank,
        scheduler,
        accounts,
    }
}

fn fire(world: &mut World, case: CaseId, purpose: TimerPurpose) {
    let payload = world
        .scheduler
        .fire(&TimerKey::new(case, purpose))
        .expect("timer should be armed");
    world.engine.on_timer(payload).unwrap();
}

fn bank_total(world: &World) -> i64 {
    world
        .accounts
        .iter()
        .map(|a| world.bank.balance_of(a))
        .sum()
}

#[test]
fn full_lifecycle_single_round() {
    let mut world = world(&["arb.a", "arb.b", "arb.c"]);
    world
        .engine
        .fund_provider_stake(service(), acct("prov.a"), vdx(4000))
        .unwrap();
    let total_before = bank_total(&world);

    // Complaint: case opens in Init, the respond-appeal timer is armed.
    let (appeal_id, case_id) = world
        .engine
        .file_complaint(
            acct("consumer"),
            service(),
            vdx(1000),
            "served stale quotes for a week",
            ArbitrationMethod::MultiRound,
        )
        .unwrap();
    assert_eq!(world.engine.case(case_id).unwrap().step, CaseStep::Init);
    assert!(world
        .scheduler
        .is_armed(&TimerKey::new(case_id, TimerPurpose::RespondAppeal)));

    // Response cancels the appeal timer and starts selection.
    world.engine.respond_to_case(acct("prov.a"), case_id).unwrap();
    assert_eq!(
        world.engine.case(case_id).unwrap().step,
        CaseStep::ChoosingArbitrators
    );
    assert!(!world
        .scheduler
        .is_armed(&TimerKey::new(case_id, TimerPurpose::RespondAppeal)));
    assert!(world
        .scheduler
        .is_armed(&TimerKey::new(case_id, TimerPurpose::RespondArbitrate)));

    // Quorum confirmation moves the case to Started.
    for name in ["arb.a", "arb.b", "arb.c"] {
        world
            .engine
            .respond_as_arbitrator(acct(name), case_id, vdx(ARB_STAKE))
            .unwrap();
    }
    let case = world.engine.case(case_id).unwrap();
    assert_eq!(case.step, CaseStep::Started);
    assert_eq!(case.arbitrators.len(), 3);
    assert!(world
        .scheduler
        .is_armed(&TimerKey::new(case_id, TimerPurpose::UploadResult)));

    // Two applicant votes reach a strict majority of three and tally.
    assert_eq!(
        world.engine.upload_vote(acct("arb.a"), case_id, 1).unwrap(),
        None
    );
    assert_eq!(
        world.engine.upload_vote(acct("arb.b"), case_id, 1).unwrap(),
        Some(VoteChoice::Applicant)
    );
    assert!(world
        .scheduler
        .is_armed(&TimerKey::new(case_id, TimerPurpose::ReappealWindow)));

    // Nobody reappeals; the window expires and the case settles.
    fire(&mut world, case_id, TimerPurpose::ReappealWindow);
    let case = world.engine.case(case_id).unwrap();
    assert_eq!(case.step, CaseStep::Ended);
    assert_eq!(case.final_ruling, FinalRuling::ApplicantWins);
    assert_eq!(case.final_winner, Some(Side::Consumer));
    assert!(case.settled);
    assert_eq!(world.engine.appeal(appeal_id).unwrap().case_id, Some(case_id));

    let report = world.engine.settlement(case_id).unwrap();
    assert_eq!(report.loser_side, Side::Provider);
    assert_eq!(report.service_stake_slash, 4000);
    assert_eq!(report.dividend_pool + report.fee_pool, report.slashed_total);

    // The consumer's escrow grew by the dividend; the provider's service
    // stake is gone.
    let entry = world.engine.escrow_entry(case_id, &acct("consumer")).unwrap();
    assert_eq!(entry.balance.amount, 1000 + report.dividend_per_winner);
    assert_eq!(
        world
            .engine
            .provider_stake(service(), &acct("prov.a"))
            .unwrap()
            .amount,
        0
    );

    // Transfers only moved value between tracked accounts.
    assert_eq!(bank_total(&world), total_before);
}

#[test]
fn reappeal_runs_a_second_round_with_a_bigger_panel() {
    let mut world = world(&[
        "arb.a", "arb.b", "arb.c", "arb.d", "arb.e", "arb.f", "arb.g", "arb.h",
    ]);
    let (_, case_id) = world
        .engine
        .file_complaint(
            acct("consumer"),
            service(),
            vdx(1000),
            "bad data",
            ArbitrationMethod::MultiRound,
        )
        .unwrap();
    world.engine.respond_to_case(acct("prov.a"), case_id).unwrap();
    for name in ["arb.a", "arb.b", "arb.c"] {
        world
            .engine
            .respond_as_arbitrator(acct(name), case_id, vdx(ARB_STAKE))
            .unwrap();
    }
    world.engine.upload_vote(acct("arb.a"), case_id, 1).unwrap();
    world.engine.upload_vote(acct("arb.b"), case_id, 1).unwrap();

    // The losing provider reappeals; the quorum grows to five and the
    // consumer side must re-respond.
    world
        .engine
        .reappeal(acct("prov.a"), case_id, vdx(2000), "tally was wrong")
        .unwrap();
    let case = world.engine.case(case_id).unwrap();
    assert_eq!(case.step, CaseStep::Reappeal);
    assert_eq!(case.required_arbitrators, 5);
    assert!(!case.is_respondent_provider);

    world.engine.re_respond(acct("consumer"), case_id).unwrap();
    for name in ["arb.d", "arb.e", "arb.f", "arb.g", "arb.h"] {
        world
            .engine
            .respond_as_arbitrator(acct(name), case_id, vdx(ARB_STAKE))
            .unwrap();
    }
    assert_eq!(world.engine.case(case_id).unwrap().step, CaseStep::Started);

    // Round two favors the reappealing provider.
    world.engine.upload_vote(acct("arb.d"), case_id, 1).unwrap();
    world.engine.upload_vote(acct("arb.e"), case_id, 1).unwrap();
    let result = world.engine.upload_vote(acct("arb.f"), case_id, 1).unwrap();
    assert_eq!(result, Some(VoteChoice::Applicant));

    fire(&mut world, case_id, TimerPurpose::ReappealWindow);
    let case = world.engine.case(case_id).unwrap();
    assert_eq!(case.step, CaseStep::Ended);
    // Applicant side won and the applicant was the provider.
    assert_eq!(case.final_winner, Some(Side::Provider));

    let report = world.engine.settlement(case_id).unwrap();
    assert_eq!(report.loser_side, Side::Consumer);
    assert_eq!(report.case_slash, 1000);
    // The provider won: no service-level forfeiture.
    assert_eq!(report.service_stake_slash, 0);
    assert_eq!(
        world
            .engine
            .escrow_entry(case_id, &acct("consumer"))
            .unwrap()
            .balance
            .amount,
        0
    );
    // The provider's reappeal stake earned the dividend.
    let provider_entry = world.engine.escrow_entry(case_id, &acct("prov.a")).unwrap();
    assert_eq!(provider_entry.side, Side::Provider);
    assert_eq!(
        provider_entry.balance.amount,
        2000 + report.dividend_per_winner
    );
}

#[test]
fn evidence_attaches_to_the_current_round() {
    let mut world = world(&["arb.a", "arb.b", "arb.c"]);
    let (_, case_id) = world
        .engine
        .file_complaint(
            acct("consumer"),
            service(),
            vdx(1000),
            "bad data",
            ArbitrationMethod::MultiRound,
        )
        .unwrap();
    let round_id = world.engine.respond_to_case(acct("prov.a"), case_id).unwrap();

    world
        .engine
        .upload_evidence(acct("consumer"), case_id, "ipfs://bafy.../complaint.pdf")
        .unwrap();
    world
        .engine
        .upload_evidence(acct("prov.a"), case_id, "ipfs://bafy.../rebuttal.pdf")
        .unwrap();
    assert_eq!(world.engine.round(round_id).unwrap().evidence.len(), 2);

    let err = world
        .engine
        .upload_evidence(acct("stranger"), case_id, "unrelated")
        .unwrap_err();
    assert!(matches!(
        err,
        veridex_arbitration::ArbitrationError::Unauthorized { .. }
    ));
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut world = world(&["arb.a"]);
    let err = world
        .engine
        .register_arbitrator(
            acct("arb.a"),
            PublicKey::new("VDXother").unwrap(),
            ArbitratorTier::Amateur,
            vdx(1),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        veridex_arbitration::ArbitrationError::AlreadyRegistered(_)
    ));
}

#[test]
fn foreign_currency_stakes_are_rejected() {
    let mut world = world(&[]);
    let usd = TokenAmount::new(1000, Currency::new("USD", 2).unwrap());
    let err = world
        .engine
        .file_complaint(
            acct("consumer"),
            service(),
            usd,
            "bad data",
            ArbitrationMethod::MultiRound,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        veridex_arbitration::ArbitrationError::Amount(_)
    ));
}
