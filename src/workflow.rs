//! Correction workflow: the decisions a period needs before it can be
//! calculated, taken one step at a time.
//!
//! Generic CFOPs are resolved first, then per-document adjustments (C197/D197),
//! then period adjustments (E111). A step with nothing pending is passed
//! through without waiting for a command.

use crate::core::corrections::detect_pending_adjustments;
use crate::core::{
    detect_pending, AdjustmentRef, AdjustmentScope, Cfop, CorrectionAction, PendingAdjustment,
    PendingCfop, ResolutionChoice,
};
use crate::period::PeriodContext;
use crate::tax::{CalculationError, CalculationResult, IncentiveEngine};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkflowState {
    UploadDone,
    ResolveGenericCfops,
    ResolveDocumentAdjustments,
    ResolvePeriodAdjustments,
    ReadyToCalculate,
    Calculated,
    Error,
}

impl WorkflowState {
    fn next(self) -> WorkflowState {
        match self {
            WorkflowState::UploadDone => WorkflowState::ResolveGenericCfops,
            WorkflowState::ResolveGenericCfops => WorkflowState::ResolveDocumentAdjustments,
            WorkflowState::ResolveDocumentAdjustments => WorkflowState::ResolvePeriodAdjustments,
            WorkflowState::ResolvePeriodAdjustments => WorkflowState::ReadyToCalculate,
            WorkflowState::ReadyToCalculate => WorkflowState::Calculated,
            WorkflowState::Calculated => WorkflowState::Calculated,
            WorkflowState::Error => WorkflowState::Error,
        }
    }

    fn adjustment_scope(self) -> Option<AdjustmentScope> {
        match self {
            WorkflowState::ResolveDocumentAdjustments => Some(AdjustmentScope::Document),
            WorkflowState::ResolvePeriodAdjustments => Some(AdjustmentScope::Period),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Taxpayer decisions for one resolution step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    GenericCfops(BTreeMap<Cfop, ResolutionChoice>),
    Corrections(BTreeMap<AdjustmentRef, CorrectionAction>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Begin,
    /// Apply decisions; pending items not mentioned take the default.
    ApplyResolution(Resolution),
    /// Take the default for every pending item.
    Skip,
    Calculate,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Begin => "begin",
            Command::ApplyResolution(_) => "apply-resolution",
            Command::Skip => "skip",
            Command::Calculate => "calculate",
        }
    }
}

/// Items waiting for a decision in the current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum PendingItems {
    None,
    GenericCfops(Vec<PendingCfop>),
    Adjustments(Vec<PendingAdjustment>),
}

impl PendingItems {
    pub fn is_empty(&self) -> bool {
        match self {
            PendingItems::None => true,
            PendingItems::GenericCfops(items) => items.is_empty(),
            PendingItems::Adjustments(items) => items.is_empty(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Command '{command}' is not valid in state {state}")]
    InvalidCommand {
        command: &'static str,
        state: WorkflowState,
    },
    #[error("Resolution does not apply to state {0}")]
    ResolutionMismatch(WorkflowState),
    #[error("Calculation failed: {0}")]
    Calculation(#[from] CalculationError),
}

/// One period's workflow instance.
#[derive(Debug)]
pub struct Workflow {
    state: WorkflowState,
    context: PeriodContext,
    engine: IncentiveEngine,
}

impl Workflow {
    pub fn new(context: PeriodContext, engine: IncentiveEngine) -> Self {
        Self {
            state: WorkflowState::UploadDone,
            context,
            engine,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn context(&self) -> &PeriodContext {
        &self.context
    }

    pub fn result(&self) -> Option<&CalculationResult> {
        self.context.result.as_ref()
    }

    /// What the current state is waiting for.
    pub fn pending(&self) -> PendingItems {
        let context = &self.context;
        match self.state {
            WorkflowState::ResolveGenericCfops => {
                PendingItems::GenericCfops(detect_pending(&context.records, &context.generic_cfops))
            }
            state => match state.adjustment_scope() {
                Some(scope) => PendingItems::Adjustments(detect_pending_adjustments(
                    &context.records,
                    scope,
                    &context.corrections,
                )),
                None => PendingItems::None,
            },
        }
    }

    /// Apply a command. An invalid command leaves the state unchanged.
    pub fn handle(&mut self, command: Command) -> Result<WorkflowState, WorkflowError> {
        let invalid = |state: WorkflowState| WorkflowError::InvalidCommand {
            command: command.name(),
            state,
        };

        match (self.state, &command) {
            (WorkflowState::UploadDone, Command::Begin) => self.advance(),
            (state @ WorkflowState::ResolveGenericCfops, Command::ApplyResolution(resolution)) => {
                let Resolution::GenericCfops(choices) = resolution else {
                    return Err(WorkflowError::ResolutionMismatch(state));
                };
                let PendingItems::GenericCfops(pending) = self.pending() else {
                    return Err(invalid(state));
                };
                self.context.generic_cfops.apply_map(&pending, choices);
                self.advance();
            }
            (state, Command::ApplyResolution(resolution)) if state.adjustment_scope().is_some() => {
                let Resolution::Corrections(actions) = resolution else {
                    return Err(WorkflowError::ResolutionMismatch(state));
                };
                let PendingItems::Adjustments(pending) = self.pending() else {
                    return Err(invalid(state));
                };
                self.context.corrections.apply_map(&pending, actions);
                self.advance();
            }
            (WorkflowState::ResolveGenericCfops, Command::Skip) => {
                if let PendingItems::GenericCfops(pending) = self.pending() {
                    self.context.generic_cfops.apply_normative(&pending);
                }
                self.advance();
            }
            (state, Command::Skip) if state.adjustment_scope().is_some() => {
                if let PendingItems::Adjustments(pending) = self.pending() {
                    self.context.corrections.keep_all(&pending);
                }
                self.advance();
            }
            (WorkflowState::ReadyToCalculate, Command::Calculate) => {
                let outcome = self.context.calculate(&self.engine).map(|_| ());
                if let Err(err) = outcome {
                    log::error!("Calculation of {} failed: {}", self.context.label, err);
                    self.state = WorkflowState::Error;
                    return Err(err.into());
                }
                self.state = WorkflowState::Calculated;
            }
            (state, _) => return Err(invalid(state)),
        }

        log::debug!("Workflow {} -> {}", self.context.label, self.state);
        Ok(self.state)
    }

    /// Move to the next state, passing through steps with nothing pending.
    fn advance(&mut self) {
        self.state = self.state.next();
        while matches!(
            self.state,
            WorkflowState::ResolveGenericCfops
                | WorkflowState::ResolveDocumentAdjustments
                | WorkflowState::ResolvePeriodAdjustments
        ) && self.pending().is_empty()
        {
            self.state = self.state.next();
        }
    }

    /// Run every resolution step with the given decisions, skipping steps they
    /// do not cover. Stops at `ReadyToCalculate`.
    pub fn resolve_with(
        &mut self,
        generic_cfops: &BTreeMap<Cfop, ResolutionChoice>,
        corrections: &BTreeMap<AdjustmentRef, CorrectionAction>,
    ) -> Result<WorkflowState, WorkflowError> {
        if self.state == WorkflowState::UploadDone {
            self.handle(Command::Begin)?;
        }
        loop {
            let command = match self.state {
                WorkflowState::ResolveGenericCfops => {
                    Command::ApplyResolution(Resolution::GenericCfops(generic_cfops.clone()))
                }
                WorkflowState::ResolveDocumentAdjustments | WorkflowState::ResolvePeriodAdjustments => {
                    Command::ApplyResolution(Resolution::Corrections(corrections.clone()))
                }
                state => return Ok(state),
            };
            self.handle(command)?;
        }
    }

    /// Abandon the workflow; nothing it decided is kept.
    pub fn cancel(self) {
        log::info!("Workflow for {} cancelled in state {}", self.context.label, self.state);
    }

    /// The period with its decisions, once every step is resolved.
    pub fn into_resolved(self) -> Result<PeriodContext, WorkflowError> {
        match self.state {
            WorkflowState::ReadyToCalculate | WorkflowState::Calculated => Ok(self.context),
            state => Err(WorkflowError::InvalidCommand {
                command: "into-resolved",
                state,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ExclusionReason;
    use crate::tax::{FomentarConfig, ProgramConfig};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    const FILE: &str = "|0000|017|0|01012024|31012024|ACME LTDA|12345678000190||GO|1|5208707|||A|0|\n\
                        |C190|000|5101|18,00|1000,00|1000,00|180,00|0|0|0|0||\n\
                        |C190|000|5949|18,00|500,00|500,00|90,00|0|0|0|0||\n\
                        |C197|GO70000001|||0|0|25,00|0|\n\
                        |E111|GO020159|credito|10,00|\n";

    fn engine() -> IncentiveEngine {
        IncentiveEngine::new(ProgramConfig::Fomentar(FomentarConfig::default())).unwrap()
    }

    fn workflow(text: &str) -> Workflow {
        Workflow::new(PeriodContext::from_text(text), engine())
    }

    fn cfop(s: &str) -> Cfop {
        s.parse().unwrap()
    }

    #[test]
    fn steps_run_in_order() {
        let mut wf = workflow(FILE);
        assert_eq!(wf.state(), WorkflowState::UploadDone);

        assert_eq!(wf.handle(Command::Begin).unwrap(), WorkflowState::ResolveGenericCfops);
        let PendingItems::GenericCfops(pending) = wf.pending() else {
            panic!("expected pending CFOPs");
        };
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].cfop, cfop("5949"));

        let choices = BTreeMap::from([(cfop("5949"), ResolutionChoice::Incentivized)]);
        let state = wf
            .handle(Command::ApplyResolution(Resolution::GenericCfops(choices)))
            .unwrap();
        assert_eq!(state, WorkflowState::ResolveDocumentAdjustments);

        let actions = BTreeMap::from([(AdjustmentRef::new("C197", 0), CorrectionAction::Keep)]);
        let state = wf
            .handle(Command::ApplyResolution(Resolution::Corrections(actions)))
            .unwrap();
        assert_eq!(state, WorkflowState::ResolvePeriodAdjustments);

        assert_eq!(wf.handle(Command::Skip).unwrap(), WorkflowState::ReadyToCalculate);
        assert_eq!(wf.handle(Command::Calculate).unwrap(), WorkflowState::Calculated);

        let result = wf.result().unwrap();
        // 5949 resolved as incentivized: (270 - 10) * 0.70
        assert_eq!(result.value("B", "gross_debit"), dec!(270));
        assert_eq!(result.value("B", "financed"), dec!(182));
        assert_eq!(result.audit.exclusions[0].reason, ExclusionReason::SpecialDebitExcluded);
    }

    #[test]
    fn nothing_pending_goes_straight_to_ready() {
        let mut wf = workflow("|C190|000|5101|18,00|1000,00|1000,00|180,00|0|0|0|0||\n");
        assert_eq!(wf.handle(Command::Begin).unwrap(), WorkflowState::ReadyToCalculate);
        assert!(wf.pending().is_empty());
    }

    #[test]
    fn empty_file_calculates_to_zero() {
        let mut wf = workflow("");
        wf.handle(Command::Begin).unwrap();
        wf.handle(Command::Calculate).unwrap();
        assert_eq!(wf.result().unwrap().summary.total_due, Decimal::ZERO);
    }

    #[test]
    fn invalid_commands_leave_state_unchanged() {
        let mut wf = workflow(FILE);
        assert!(matches!(
            wf.handle(Command::Calculate),
            Err(WorkflowError::InvalidCommand {
                command: "calculate",
                state: WorkflowState::UploadDone
            })
        ));
        assert_eq!(wf.state(), WorkflowState::UploadDone);

        wf.handle(Command::Begin).unwrap();
        let wrong = Resolution::Corrections(BTreeMap::new());
        assert!(matches!(
            wf.handle(Command::ApplyResolution(wrong)),
            Err(WorkflowError::ResolutionMismatch(WorkflowState::ResolveGenericCfops))
        ));
        assert_eq!(wf.state(), WorkflowState::ResolveGenericCfops);
        assert!(wf.handle(Command::Begin).is_err());
    }

    #[test]
    fn later_steps_do_not_reopen_earlier_ones() {
        let mut wf = workflow(FILE);
        wf.handle(Command::Begin).unwrap();
        wf.handle(Command::Skip).unwrap();
        assert_eq!(wf.state(), WorkflowState::ResolveDocumentAdjustments);
        wf.handle(Command::Skip).unwrap();
        wf.handle(Command::Skip).unwrap();
        assert_eq!(wf.state(), WorkflowState::ReadyToCalculate);
        let context = wf.into_resolved().unwrap();
        assert_eq!(context.generic_cfops.get(&cfop("5949")), Some(ResolutionChoice::Default));
        assert_eq!(context.corrections.len(), 2);
    }

    #[test]
    fn resolve_with_runs_all_steps() {
        let mut wf = workflow(FILE);
        let corrections = BTreeMap::from([(AdjustmentRef::new("E111", 0), CorrectionAction::Exclude)]);
        let state = wf.resolve_with(&BTreeMap::new(), &corrections).unwrap();
        assert_eq!(state, WorkflowState::ReadyToCalculate);
        wf.handle(Command::Calculate).unwrap();
        let result = wf.result().unwrap();
        assert!(result
            .audit
            .exclusions
            .iter()
            .any(|e| e.reason == ExclusionReason::UserExcluded));
    }

    #[test]
    fn calculation_error_moves_to_error_state() {
        let mut context = PeriodContext::from_text(FILE);
        context.carried_forward = dec!(-1);
        let mut wf = Workflow::new(context, engine());
        wf.resolve_with(&BTreeMap::new(), &BTreeMap::new()).unwrap();

        assert!(matches!(
            wf.handle(Command::Calculate),
            Err(WorkflowError::Calculation(_))
        ));
        assert_eq!(wf.state(), WorkflowState::Error);
        assert!(wf.handle(Command::Calculate).is_err());
        assert!(wf.into_resolved().is_err());
    }

    #[test]
    fn cancel_consumes_instance() {
        let mut wf = workflow(FILE);
        wf.handle(Command::Begin).unwrap();
        wf.cancel();
    }
}
