//! Incentive calculation engine.
//!
//! Every program consumes the same resolved inputs: classified operations,
//! classified adjustments and the credit carried forward from the previous
//! period. Each program is a [`ProgramFormula`].

pub mod confrontation;
pub mod fomentar;
pub mod logproduzir;
pub mod progoias;
pub mod result;

pub use confrontation::{confront_declarations, DeclarationCheck, DeclarationComparison, DeclaredValue};
pub use fomentar::{FomentarConfig, FomentarKind};
pub use logproduzir::{FreightCategory, LogproduzirConfig};
pub use progoias::{ProgoiasConfig, RateMode};
pub use result::{AuditTrail, CalculationResult, Declaration, LineItem, Quadro, Summary};

use crate::core::{
    classify_operations, resolve_adjustments, AdjustmentReport, AdjustmentTables,
    ClassifiedOperations, Corrections, GenericCodeConfiguration, RecordSet,
};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalculationError {
    #[error("Invalid configuration: {parameter} = {value} (valid range: {valid_range})")]
    InvalidConfiguration {
        parameter: &'static str,
        value: String,
        valid_range: &'static str,
    },
    #[error("Unknown program '{0}' (expected fomentar, produzir, microproduzir, progoias or logproduzir)")]
    UnknownProgram(String),
}

impl CalculationError {
    pub(crate) fn invalid(parameter: &'static str, value: impl fmt::Display, valid_range: &'static str) -> Self {
        CalculationError::InvalidConfiguration {
            parameter,
            value: value.to_string(),
            valid_range,
        }
    }
}

/// Check a rate lies in [0, 1].
pub(crate) fn check_rate(parameter: &'static str, rate: Decimal) -> Result<(), CalculationError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(CalculationError::invalid(parameter, rate, "0 to 1"));
    }
    Ok(())
}

pub(crate) fn check_non_negative(parameter: &'static str, amount: Decimal) -> Result<(), CalculationError> {
    if amount < Decimal::ZERO {
        return Err(CalculationError::invalid(parameter, amount, ">= 0"));
    }
    Ok(())
}

/// Incentive program family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Program {
    /// Financing of part of the ICMS due (FOMENTAR, PRODUZIR, MICROPRODUZIR).
    Fomentar,
    /// Granted credit over the incentivized ICMS balance.
    Progoias,
    /// Granted credit over interstate freight ICMS above the historical average.
    Logproduzir,
}

impl FromStr for Program {
    type Err = CalculationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fomentar" | "produzir" | "microproduzir" => Ok(Program::Fomentar),
            "progoias" | "progoiás" => Ok(Program::Progoias),
            "logproduzir" => Ok(Program::Logproduzir),
            _ => Err(CalculationError::UnknownProgram(s.to_string())),
        }
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Program::Fomentar => write!(f, "FOMENTAR"),
            Program::Progoias => write!(f, "ProGoiás"),
            Program::Logproduzir => write!(f, "LogPRODUZIR"),
        }
    }
}

impl Program {
    /// Code tables used to classify this program's adjustments. Each program
    /// excludes its own credit and the other program's credit.
    pub fn adjustment_tables(&self) -> AdjustmentTables {
        use crate::core::adjustments::{FOMENTAR_CREDIT_CODES, INCENTIVIZED_CODES, PROGOIAS_CREDIT_CODES};
        match self {
            Program::Fomentar => AdjustmentTables {
                incentivized: INCENTIVIZED_CODES,
                own_credits: FOMENTAR_CREDIT_CODES,
                sibling_credits: PROGOIAS_CREDIT_CODES,
            },
            Program::Progoias => AdjustmentTables {
                incentivized: INCENTIVIZED_CODES,
                own_credits: PROGOIAS_CREDIT_CODES,
                sibling_credits: FOMENTAR_CREDIT_CODES,
            },
            // adjustments do not enter the freight calculation
            Program::Logproduzir => AdjustmentTables {
                incentivized: INCENTIVIZED_CODES,
                own_credits: &[],
                sibling_credits: &[],
            },
        }
    }

    /// Whether an E115 code belongs to the declarations this program reports.
    pub fn declares(&self, code: &str) -> bool {
        match self {
            Program::Fomentar => code.starts_with("GO200"),
            Program::Progoias => code == progoias::CREDIT_CODE,
            Program::Logproduzir => false,
        }
    }
}

/// Resolved inputs of one period's calculation.
#[derive(Debug, Clone, Copy)]
pub struct FormulaInputs<'a> {
    pub period: &'a str,
    pub operations: &'a ClassifiedOperations,
    pub adjustments: &'a AdjustmentReport,
    pub carried_forward: Decimal,
}

/// One incentive program's calculation.
pub trait ProgramFormula {
    fn program(&self) -> Program;

    /// Reject out of range parameters.
    fn validate(&self) -> Result<(), CalculationError>;

    /// Compute the quadros. Inputs are assumed valid; amounts never go negative.
    fn calculate(&self, inputs: &FormulaInputs) -> CalculationResult;
}

/// Validated configuration for one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProgramConfig {
    Fomentar(FomentarConfig),
    Progoias(ProgoiasConfig),
    Logproduzir(LogproduzirConfig),
}

impl ProgramConfig {
    fn formula(&self) -> &dyn ProgramFormula {
        match self {
            ProgramConfig::Fomentar(config) => config,
            ProgramConfig::Progoias(config) => config,
            ProgramConfig::Logproduzir(config) => config,
        }
    }

    /// Configuration for the `index`-th period of a sequence. ProGoiás advances
    /// its year of enjoyment every 12 periods.
    pub fn for_period_index(&self, index: usize) -> ProgramConfig {
        match self {
            ProgramConfig::Fomentar(config) => ProgramConfig::Fomentar(config.clone()),
            ProgramConfig::Progoias(config) => ProgramConfig::Progoias(config.advanced_by(index)),
            ProgramConfig::Logproduzir(config) => ProgramConfig::Logproduzir(config.clone()),
        }
    }
}

/// Entry point for single period calculations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncentiveEngine {
    config: ProgramConfig,
}

impl IncentiveEngine {
    pub fn new(config: ProgramConfig) -> Result<Self, CalculationError> {
        config.formula().validate()?;
        Ok(Self { config })
    }

    pub fn program(&self) -> Program {
        self.config.formula().program()
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// Engine for the `index`-th period of a sequence.
    pub fn for_period_index(&self, index: usize) -> Result<Self, CalculationError> {
        IncentiveEngine::new(self.config.for_period_index(index))
    }

    /// Classify and calculate one period.
    pub fn calculate(
        &self,
        period: &str,
        records: &RecordSet,
        generic_cfops: &GenericCodeConfiguration,
        corrections: &Corrections,
        carried_forward: Decimal,
    ) -> Result<CalculationResult, CalculationError> {
        check_non_negative("carried_forward", carried_forward)?;

        let operations = classify_operations(records, generic_cfops);
        let adjustments = resolve_adjustments(records, &self.program().adjustment_tables(), corrections);
        let inputs = FormulaInputs {
            period,
            operations: &operations,
            adjustments: &adjustments,
            carried_forward,
        };
        let result = self.config.formula().calculate(&inputs);
        log::info!(
            "{} {}: total due {:.2}, benefit {:.2}, remaining credit {:.2}",
            result.program,
            period,
            result.summary.total_due,
            result.summary.benefit_value,
            result.remaining_credit
        );
        Ok(result)
    }
}

/// Audit trail shared by all formulas.
pub(crate) fn audit_trail(inputs: &FormulaInputs) -> AuditTrail {
    let mut warnings = inputs.operations.warnings.clone();
    warnings.extend(inputs.adjustments.warnings.iter().cloned());
    AuditTrail {
        adjustments: inputs.adjustments.entries.clone(),
        exclusions: inputs.adjustments.exclusions.clone(),
        warnings,
    }
}
