//! Pending command - list the decisions a period still needs

use crate::cmd::{read_periods, ResolutionFile};
use clap::Args;
use serde::Serialize;
use spedc::core::{Direction, PendingAdjustment, PendingCfop};
use spedc::period::PeriodContext;
use spedc::tax::{FomentarConfig, IncentiveEngine, ProgramConfig};
use spedc::workflow::{Command, PendingItems, Workflow, WorkflowState};
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct PendingCommand {
    /// SPED files, one per period
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// JSON file with decisions already taken; decided items are not listed
    #[arg(long)]
    resolutions: Option<PathBuf>,

    /// Output as JSON instead of formatted tables
    #[arg(long)]
    json: bool,
}

/// Pending items of one period
#[derive(Debug, Serialize)]
struct PendingPeriod {
    period: String,
    generic_cfops: Vec<PendingCfop>,
    document_adjustments: Vec<PendingAdjustment>,
    period_adjustments: Vec<PendingAdjustment>,
}

impl PendingPeriod {
    fn is_empty(&self) -> bool {
        self.generic_cfops.is_empty() && self.document_adjustments.is_empty() && self.period_adjustments.is_empty()
    }
}

#[derive(Debug, Tabled)]
struct CfopRow {
    #[tabled(rename = "Período")]
    period: String,
    #[tabled(rename = "CFOP")]
    cfop: String,
    #[tabled(rename = "Direção")]
    direction: String,
    #[tabled(rename = "Descrição")]
    description: String,
    #[tabled(rename = "Registros")]
    occurrences: usize,
    #[tabled(rename = "Valor")]
    operation_amount: String,
    #[tabled(rename = "ICMS")]
    icms: String,
}

#[derive(Debug, Tabled)]
struct AdjustmentRow {
    #[tabled(rename = "Período")]
    period: String,
    #[tabled(rename = "Registro")]
    reference: String,
    #[tabled(rename = "Código")]
    code: String,
    #[tabled(rename = "Descrição")]
    description: String,
    #[tabled(rename = "Valor")]
    amount: String,
}

impl PendingCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let resolutions = ResolutionFile::load(self.resolutions.as_deref())?;
        // Detection does not depend on the program.
        let engine = IncentiveEngine::new(ProgramConfig::Fomentar(FomentarConfig::default()))?;

        let pending = read_periods(&self.files)?
            .into_iter()
            .map(|context| collect_pending(context, &engine, &resolutions))
            .collect::<anyhow::Result<Vec<_>>>()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&pending)?);
        } else {
            print_tables(&pending);
        }
        Ok(())
    }
}

/// Walk the workflow, taking the default at every step, and record what each
/// step was waiting for.
fn collect_pending(
    mut context: PeriodContext,
    engine: &IncentiveEngine,
    resolutions: &ResolutionFile,
) -> anyhow::Result<PendingPeriod> {
    context.generic_cfops = resolutions
        .generic_cfops
        .iter()
        .map(|(cfop, choice)| (*cfop, *choice))
        .collect();
    context.corrections = resolutions.corrections_for(&context.label).into_iter().collect();

    let mut pending = PendingPeriod {
        period: context.label.clone(),
        generic_cfops: Vec::new(),
        document_adjustments: Vec::new(),
        period_adjustments: Vec::new(),
    };

    let mut workflow = Workflow::new(context, engine.clone());
    workflow.handle(Command::Begin)?;
    while workflow.state() != WorkflowState::ReadyToCalculate {
        match (workflow.state(), workflow.pending()) {
            (_, PendingItems::GenericCfops(items)) => pending.generic_cfops = items,
            (WorkflowState::ResolveDocumentAdjustments, PendingItems::Adjustments(items)) => {
                pending.document_adjustments = items
            }
            (_, PendingItems::Adjustments(items)) => pending.period_adjustments = items,
            (state, PendingItems::None) => anyhow::bail!("Workflow stopped in state {}", state),
        }
        workflow.handle(Command::Skip)?;
    }
    workflow.cancel();
    Ok(pending)
}

fn print_tables(pending: &[PendingPeriod]) {
    if pending.iter().all(PendingPeriod::is_empty) {
        println!("\u{2713} Nothing pending.");
        return;
    }

    let cfops: Vec<CfopRow> = pending
        .iter()
        .flat_map(|p| {
            p.generic_cfops.iter().map(|item| CfopRow {
                period: p.period.clone(),
                cfop: item.cfop.to_string(),
                direction: match item.direction {
                    Direction::Entrada => "Entrada".to_string(),
                    Direction::Saida => "Saída".to_string(),
                },
                description: item.description.to_string(),
                occurrences: item.occurrences,
                operation_amount: format!("{:.2}", item.operation_amount),
                icms: format!("{:.2}", item.icms),
            })
        })
        .collect();
    if !cfops.is_empty() {
        println!();
        println!("GENERIC CFOPS");
        print_table(cfops);
    }

    let adjustments: Vec<AdjustmentRow> = pending
        .iter()
        .flat_map(|p| {
            p.document_adjustments
                .iter()
                .chain(&p.period_adjustments)
                .map(|item| AdjustmentRow {
                    period: p.period.clone(),
                    reference: item.reference.to_string(),
                    code: item.code.clone(),
                    description: item.description.clone().unwrap_or_default(),
                    amount: format!("{:.2}", item.amount),
                })
        })
        .collect();
    if !adjustments.is_empty() {
        println!();
        println!("ADJUSTMENTS");
        print_table(adjustments);
    }
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}
