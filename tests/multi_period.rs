//! Library tests over the fixture files: workflow per file, then the
//! multi-period run.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use spedc::core::{AdjustmentRef, CorrectionAction, ExclusionReason, ResolutionChoice};
use spedc::period::{MultiPeriodSequence, PeriodContext};
use spedc::tax::{
    confront_declarations, FomentarConfig, IncentiveEngine, LogproduzirConfig, ProgoiasConfig, ProgramConfig,
};
use spedc::workflow::{Command, PendingItems, Resolution, Workflow, WorkflowState};
use std::collections::BTreeMap;

fn fixture(name: &str) -> PeriodContext {
    let text = std::fs::read_to_string(format!("tests/data/{}", name)).expect("fixture");
    PeriodContext::from_text(&text)
}

fn fomentar() -> IncentiveEngine {
    IncentiveEngine::new(ProgramConfig::Fomentar(FomentarConfig::default())).unwrap()
}

/// Resolve every step with the defaults.
fn skip_all(context: PeriodContext, engine: &IncentiveEngine) -> PeriodContext {
    let mut workflow = Workflow::new(context, engine.clone());
    workflow.handle(Command::Begin).unwrap();
    while workflow.state() != WorkflowState::ReadyToCalculate {
        workflow.handle(Command::Skip).unwrap();
    }
    workflow.into_resolved().unwrap()
}

#[test]
fn january_fomentar() {
    let engine = fomentar();
    let mut context = skip_all(fixture("fomentar_012024.txt"), &engine);
    let result = context.calculate(&engine).unwrap();

    assert_eq!(result.period, "01/2024");
    assert_eq!(result.value("A", "proportion"), dec!(0.8));
    assert_eq!(result.value("A", "credit_incentivized"), dec!(640));
    assert_eq!(result.value("B", "gross_debit"), dec!(1800));
    assert_eq!(result.value("B", "financed"), dec!(812));
    assert_eq!(result.value("C", "amount_due_not_incentivized"), dec!(290));
    assert_eq!(result.summary.total_due, dec!(638));
    assert_eq!(result.summary.economy_rate, dec!(0.56));

    let reasons: Vec<_> = result.audit.exclusions.iter().map(|e| e.reason).collect();
    assert_eq!(
        reasons,
        vec![ExclusionReason::OwnProgramCredit, ExclusionReason::SpecialDebitExcluded]
    );
}

#[test]
fn sequence_orders_and_chains_credit() {
    let engine = fomentar();
    let periods = vec![
        skip_all(fixture("fomentar_022024.txt"), &engine),
        skip_all(fixture("generic_cfop_032024.txt"), &engine),
        skip_all(fixture("fomentar_012024.txt"), &engine),
    ];
    let mut sequence = MultiPeriodSequence::new(periods);
    sequence.process(&engine, Decimal::ZERO).unwrap();

    let labels: Vec<_> = sequence.periods().iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec!["01/2024", "02/2024", "03/2024"]);

    let results: Vec<_> = sequence.results().collect();
    assert_eq!(results[0].remaining_credit, Decimal::ZERO);
    assert_eq!(results[1].remaining_credit, dec!(900));
    assert_eq!(sequence.periods()[2].carried_forward, dec!(900));

    // 900 carried + 20 credit, half of it incentivized, covers the 180 debit
    assert_eq!(results[2].value("A", "credit_incentivized"), dec!(460));
    assert_eq!(results[2].value("B", "financed"), Decimal::ZERO);
    assert!(sequence.duplicate_sources().is_empty());

    let totals = sequence.totals();
    assert_eq!(totals.periods, 3);
    assert_eq!(totals.total_due, dec!(638));
    assert_eq!(totals.final_remaining_credit, results[2].remaining_credit);
}

#[test]
fn resolutions_drive_the_calculation() {
    let engine = fomentar();
    let mut workflow = Workflow::new(fixture("generic_cfop_032024.txt"), engine);

    workflow.handle(Command::Begin).unwrap();
    assert!(matches!(workflow.pending(), PendingItems::GenericCfops(ref items) if items.len() == 1));
    let choices = BTreeMap::from([("5949".parse().unwrap(), ResolutionChoice::Incentivized)]);
    workflow
        .handle(Command::ApplyResolution(Resolution::GenericCfops(choices)))
        .unwrap();

    // no C197/D197 in the file
    assert_eq!(workflow.state(), WorkflowState::ResolvePeriodAdjustments);
    let actions = BTreeMap::from([(AdjustmentRef::new("E111", 0), CorrectionAction::Exclude)]);
    workflow
        .handle(Command::ApplyResolution(Resolution::Corrections(actions)))
        .unwrap();
    assert_eq!(workflow.handle(Command::Calculate).unwrap(), WorkflowState::Calculated);

    let result = workflow.result().unwrap();
    assert_eq!(result.value("B", "gross_debit"), dec!(360));
    assert_eq!(result.value("B", "financed"), dec!(252));
    assert_eq!(result.audit.exclusions[0].reason, ExclusionReason::UserExcluded);
}

#[test]
fn progoias_january() {
    let engine = IncentiveEngine::new(ProgramConfig::Progoias(ProgoiasConfig::default())).unwrap();
    let mut context = skip_all(fixture("fomentar_012024.txt"), &engine);
    let result = context.calculate(&engine).unwrap();

    assert_eq!(result.value("A", "base"), dec!(1000));
    assert_eq!(result.value("B", "credit_granted"), dec!(640));
    assert_eq!(result.value("B", "surcharge"), dec!(64));
    assert_eq!(result.summary.total_due, dec!(296));
    assert_eq!(
        result.declarations[0].to_sped_line(),
        "|E115|GO020158|640,00|PROGOIÁS - Crédito Outorgado|"
    );
    assert_eq!(result.audit.exclusions[0].reason, ExclusionReason::SiblingProgramCredit);
}

#[test]
fn identical_files_are_reported() {
    let engine = fomentar();
    let sequence = MultiPeriodSequence::new(vec![
        skip_all(fixture("fomentar_012024.txt"), &engine),
        skip_all(fixture("fomentar_012024.txt"), &engine).with_label("02/2024"),
    ]);
    assert_eq!(sequence.duplicate_sources().len(), 1);
}

#[test]
fn declarations_checked_against_file() {
    let engine = fomentar();
    let mut context = skip_all(fixture("fomentar_e115_012024.txt"), &engine);
    let result = context.calculate(&engine).unwrap().clone();
    assert_eq!(result.declarations.len(), 13);

    let check = confront_declarations(&result.declarations, &context.records, result.program);
    let codes = |items: Vec<&str>| items.join(",");
    assert_eq!(codes(check.matching.iter().map(|c| c.code).collect()), "GO200019");
    assert_eq!(codes(check.differing.iter().map(|c| c.code).collect()), "GO200001");
    assert_eq!(check.differing[0].difference, dec!(-300));
    assert_eq!(check.missing.len(), 11);
    assert_eq!(codes(check.extra.iter().map(|d| d.code.as_str()).collect()), "GO200099");
}

#[test]
fn logproduzir_sequence_carries_credit() {
    let engine = IncentiveEngine::new(ProgramConfig::Logproduzir(LogproduzirConfig::default())).unwrap();
    let mut sequence = MultiPeriodSequence::new(vec![skip_all(fixture("logproduzir_012024.txt"), &engine)]);
    sequence.process(&engine, dec!(1300)).unwrap();

    let result = sequence.results().next().unwrap();
    assert_eq!(result.value("A", "freight_icms"), dec!(1200));
    assert_eq!(result.summary.total_due, Decimal::ZERO);
    assert_eq!(result.remaining_credit, dec!(100));
}
