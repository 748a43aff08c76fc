//! Calculate command - run the incentive calculation over one or more periods

use crate::cmd::{read_periods, ResolutionFile};
use anyhow::bail;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use spedc::period::{MultiPeriodSequence, PeriodContext, SequenceTotals};
use spedc::tax::{
    confront_declarations, CalculationResult, DeclarationCheck, FomentarConfig, FomentarKind, FreightCategory,
    IncentiveEngine, LogproduzirConfig, ProgoiasConfig, ProgramConfig, RateMode,
};
use spedc::workflow::Workflow;
use std::io;
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct CalculateCommand {
    /// SPED files, one per period ("-" reads stdin)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    #[command(flatten)]
    program: ProgramArgs,

    /// Credit balance carried into the first period
    #[arg(long, default_value_t = Decimal::ZERO)]
    initial_credit: Decimal,

    /// JSON file with generic CFOP decisions and adjustment corrections
    #[arg(long)]
    resolutions: Option<PathBuf>,

    /// Print the E115 declaration lines of each period and check them against
    /// the E115 records of the file
    #[arg(long)]
    declarations: bool,

    /// Output as JSON instead of formatted tables
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output quadro line items as CSV
    #[arg(long)]
    csv: bool,
}

/// Program parameters shared by the commands that build an engine.
#[derive(Args, Debug)]
pub struct ProgramArgs {
    /// Incentive program
    #[arg(short, long, value_enum, default_value_t = ProgramArg::Fomentar)]
    program: ProgramArg,

    /// Financing rate (FOMENTAR family) or manual credit rate (ProGoiás), 0 to 1
    #[arg(short, long)]
    rate: Option<Decimal>,

    /// Amount deducted from the base before the benefit applies (LogPRODUZIR:
    /// the average ICMS before the incentive)
    #[arg(long, default_value_t = Decimal::ZERO)]
    floor: Decimal,

    /// ProGoiás year of enjoyment of the first period
    #[arg(short, long, default_value_t = 1)]
    year: u32,

    /// ProGoiás credit rate mode
    #[arg(long, value_enum, default_value_t = RateModeArg::Schedule)]
    mode: RateModeArg,

    /// ProGoiás PROTEGE rate, overriding the rate for the year
    #[arg(long)]
    surcharge: Option<Decimal>,

    /// LogPRODUZIR company category
    #[arg(long, value_enum, default_value_t = CategoryArg::Ii)]
    category: CategoryArg,

    /// LogPRODUZIR IGP-DI correction factor for the average
    #[arg(long, default_value_t = Decimal::ONE)]
    igp_di: Decimal,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum ProgramArg {
    #[default]
    Fomentar,
    Produzir,
    Microproduzir,
    Progoias,
    Logproduzir,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum CategoryArg {
    /// 50% credit
    I,
    /// 73% credit
    #[default]
    Ii,
    /// 80% credit
    Iii,
}

impl From<CategoryArg> for FreightCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::I => FreightCategory::I,
            CategoryArg::Ii => FreightCategory::II,
            CategoryArg::Iii => FreightCategory::III,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum RateModeArg {
    /// Rate by year of enjoyment
    #[default]
    Schedule,
    /// Company with a collection target
    Target,
    /// Rate given with --rate
    Manual,
    /// Low-HDI municipality, fixed 2% burden
    FixedBurden,
}

impl ProgramArgs {
    pub fn config(&self) -> anyhow::Result<ProgramConfig> {
        let kind = match self.program {
            ProgramArg::Fomentar => FomentarKind::Fomentar,
            ProgramArg::Produzir => FomentarKind::Produzir,
            ProgramArg::Microproduzir => FomentarKind::Microproduzir,
            ProgramArg::Progoias => return self.progoias_config().map(ProgramConfig::Progoias),
            ProgramArg::Logproduzir => return self.logproduzir_config().map(ProgramConfig::Logproduzir),
        };
        Ok(ProgramConfig::Fomentar(FomentarConfig {
            kind,
            financing_rate: self.rate,
            floor_amount: self.floor,
        }))
    }

    fn progoias_config(&self) -> anyhow::Result<ProgoiasConfig> {
        let mode = match (self.mode, self.rate) {
            (RateModeArg::Manual, Some(rate)) => RateMode::Manual(rate),
            (RateModeArg::Manual, None) => bail!("--mode manual needs --rate"),
            (_, Some(_)) => bail!("--rate applies to ProGoiás only with --mode manual"),
            (RateModeArg::Schedule, None) => RateMode::Schedule,
            (RateModeArg::Target, None) => RateMode::Target,
            (RateModeArg::FixedBurden, None) => RateMode::FixedBurden,
        };
        Ok(ProgoiasConfig {
            mode,
            year: self.year,
            surcharge_rate: self.surcharge,
            floor_amount: self.floor,
        })
    }

    fn logproduzir_config(&self) -> anyhow::Result<LogproduzirConfig> {
        if self.rate.is_some() {
            bail!("--rate does not apply to LogPRODUZIR, use --category");
        }
        Ok(LogproduzirConfig {
            category: self.category.into(),
            average_base: self.floor,
            igp_di: self.igp_di,
        })
    }

    pub fn engine(&self) -> anyhow::Result<IncentiveEngine> {
        Ok(IncentiveEngine::new(self.config()?)?)
    }
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct CalculationOutput<'a> {
    config: &'a ProgramConfig,
    periods: &'a [PeriodContext],
    totals: SequenceTotals,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    declaration_checks: Vec<PeriodCheck>,
}

#[derive(Debug, Serialize)]
struct PeriodCheck {
    period: String,
    #[serde(flatten)]
    check: DeclarationCheck,
}

/// One quadro line item
#[derive(Debug, Clone, Tabled, Serialize)]
struct LineItemRow {
    #[tabled(skip)]
    period: String,

    #[tabled(rename = "Quadro")]
    quadro: String,

    #[tabled(rename = "Código")]
    code: String,

    #[tabled(rename = "Descrição")]
    description: String,

    #[tabled(rename = "Valor")]
    value: String,
}

/// One row per period of the closing summary
#[derive(Debug, Clone, Tabled)]
struct PeriodRow {
    #[tabled(rename = "Período")]
    period: String,

    #[tabled(rename = "ICMS a recolher")]
    total_due: String,

    #[tabled(rename = "Benefício")]
    benefit: String,

    #[tabled(rename = "Economia")]
    economy: String,

    #[tabled(rename = "Economia %")]
    economy_rate: String,

    #[tabled(rename = "Saldo credor")]
    remaining_credit: String,
}

impl CalculateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let engine = self.program.engine()?;
        let resolutions = ResolutionFile::load(self.resolutions.as_deref())?;

        let periods = read_periods(&self.files)?
            .into_iter()
            .map(|context| resolve(context, &engine, &resolutions))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut sequence = MultiPeriodSequence::new(periods);
        for (first, duplicate) in sequence.duplicate_sources() {
            eprintln!("Warning: period {} has the same content as {}", duplicate, first);
        }
        sequence.process(&engine, self.initial_credit)?;

        if self.json {
            let output = CalculationOutput {
                config: engine.config(),
                periods: sequence.periods(),
                totals: sequence.totals(),
                declaration_checks: if self.declarations {
                    declaration_checks(&sequence)
                } else {
                    Vec::new()
                },
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else if self.csv {
            self.write_csv(&sequence)?;
        } else {
            self.print_tables(&sequence);
        }
        Ok(())
    }

    fn print_tables(&self, sequence: &MultiPeriodSequence) {
        for period in sequence.periods() {
            let Some(result) = &period.result else {
                continue;
            };

            println!();
            match &period.header {
                Some(header) => println!(
                    "{} - {} - {} ({})",
                    result.program,
                    period.label,
                    header.company_name,
                    header.cnpj.as_deref().unwrap_or("sem CNPJ")
                ),
                None => println!("{} - {}", result.program, period.label),
            }
            println!();

            let table = Table::new(line_item_rows(result))
                .with(Style::rounded())
                .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
                .to_string();
            println!("{}", table);

            for exclusion in &result.audit.exclusions {
                println!(
                    "  Excluded {} {} {:.2} ({})",
                    exclusion.source,
                    exclusion.code,
                    exclusion.amount,
                    exclusion.reason.tag()
                );
            }
            for warning in &result.audit.warnings {
                println!("  \u{26A0} {}", warning.message());
            }
            if self.declarations {
                println!();
                for declaration in &result.declarations {
                    println!("{}", declaration.to_sped_line());
                }
                let check = confront_declarations(&result.declarations, &period.records, result.program);
                print_check(&check);
            }
        }

        let rows: Vec<PeriodRow> = sequence.results().map(period_row).collect();
        if rows.is_empty() {
            println!("No periods calculated");
            return;
        }

        println!();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);

        let totals = sequence.totals();
        if totals.periods > 1 {
            println!(
                "Total: {} periods, ICMS a recolher {}, benefício {}, economia {}",
                totals.periods,
                format_amount(totals.total_due),
                format_amount(totals.benefit_value),
                format_amount(totals.economy)
            );
        }
    }

    fn write_csv(&self, sequence: &MultiPeriodSequence) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(io::stdout());
        for result in sequence.results() {
            for row in line_item_rows(result) {
                wtr.serialize(row)?;
            }
        }
        wtr.flush()?;
        Ok(())
    }
}

fn declaration_checks(sequence: &MultiPeriodSequence) -> Vec<PeriodCheck> {
    sequence
        .periods()
        .iter()
        .filter_map(|period| {
            let result = period.result.as_ref()?;
            Some(PeriodCheck {
                period: period.label.clone(),
                check: confront_declarations(&result.declarations, &period.records, result.program),
            })
        })
        .collect()
}

fn print_check(check: &DeclarationCheck) {
    println!();
    println!(
        "E115 check: {} matching, {} differing, {} missing, {} extra ({} matched)",
        check.matching.len(),
        check.differing.len(),
        check.missing.len(),
        check.extra.len(),
        format_percent(check.match_rate())
    );
    for item in &check.differing {
        println!(
            "  \u{2717} {} calculated {}, declared {}",
            item.code,
            format_amount(item.calculated),
            format_amount(item.declared)
        );
    }
    for declaration in &check.missing {
        println!("  - {} {} not declared", declaration.code, format_amount(declaration.value));
    }
    for declared in &check.extra {
        println!("  + {} {} not calculated", declared.code, format_amount(declared.value));
    }
}

/// Run the correction workflow with the decisions from the resolutions file.
/// Anything the file does not decide takes the default.
fn resolve(
    context: PeriodContext,
    engine: &IncentiveEngine,
    resolutions: &ResolutionFile,
) -> anyhow::Result<PeriodContext> {
    let corrections = resolutions.corrections_for(&context.label);
    let mut workflow = Workflow::new(context, engine.clone());
    workflow.resolve_with(&resolutions.generic_cfops, &corrections)?;
    Ok(workflow.into_resolved()?)
}

fn line_item_rows(result: &CalculationResult) -> Vec<LineItemRow> {
    result
        .quadros
        .iter()
        .flat_map(|quadro| {
            quadro.items.iter().map(|item| LineItemRow {
                period: result.period.clone(),
                quadro: quadro.id.to_string(),
                code: item.code.to_string(),
                description: item.label.to_string(),
                value: format_value(item.code, item.value),
            })
        })
        .collect()
}

fn period_row(result: &CalculationResult) -> PeriodRow {
    PeriodRow {
        period: result.period.clone(),
        total_due: format_amount(result.summary.total_due),
        benefit: format_amount(result.summary.benefit_value),
        economy: format_amount(result.summary.economy),
        economy_rate: format_percent(result.summary.economy_rate),
        remaining_credit: format_amount(result.remaining_credit),
    }
}

/// Rates and proportions as percentages, everything else as money.
fn format_value(code: &str, value: Decimal) -> String {
    if code.ends_with("rate") || code == "proportion" {
        format_percent(value)
    } else {
        format_amount(value)
    }
}

fn format_amount(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn format_percent(fraction: Decimal) -> String {
    format!("{:.2}%", (fraction * dec!(100)).round_dp(2))
}
