//! ProGoiás: granted credit over the ICMS balance of incentivized operations,
//! less the PROTEGE contribution.

use crate::tax::result::{floor_zero, ratio};
use crate::tax::{
    audit_trail, check_non_negative, check_rate, CalculationError, CalculationResult, Declaration,
    FormulaInputs, Program, ProgramFormula, Quadro, Summary,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Adjustment code under which the granted credit is declared.
pub const CREDIT_CODE: &str = "GO020158";

/// Rate applied to the effective balance in low-HDI municipalities.
pub const FIXED_BURDEN: Decimal = dec!(0.02);

/// How the granted credit rate is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateMode {
    /// Rate by year of enjoyment.
    #[default]
    Schedule,
    /// Company with a collection target.
    Target,
    /// Rate given by the taxpayer.
    Manual(Decimal),
    /// Low-HDI municipality: the effective burden is fixed and there is no
    /// PROTEGE contribution.
    FixedBurden,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgoiasConfig {
    pub mode: RateMode,
    /// Year of enjoyment of the incentive, starting at 1.
    pub year: u32,
    /// Overrides the PROTEGE rate for the year.
    pub surcharge_rate: Option<Decimal>,
    /// Amount deducted from the base before the credit is applied.
    pub floor_amount: Decimal,
}

impl Default for ProgoiasConfig {
    fn default() -> Self {
        Self {
            mode: RateMode::Schedule,
            year: 1,
            surcharge_rate: None,
            floor_amount: Decimal::ZERO,
        }
    }
}

impl ProgoiasConfig {
    /// Granted credit rate.
    pub fn program_rate(&self) -> Decimal {
        match self.mode {
            RateMode::Schedule => match self.year {
                0 | 1 => dec!(0.64),
                2 => dec!(0.65),
                _ => dec!(0.66),
            },
            RateMode::Target => dec!(0.67),
            RateMode::Manual(rate) => rate,
            RateMode::FixedBurden => Decimal::ONE - FIXED_BURDEN,
        }
    }

    /// PROTEGE contribution rate on the granted credit.
    pub fn surcharge_rate(&self) -> Decimal {
        if self.mode == RateMode::FixedBurden {
            return Decimal::ZERO;
        }
        self.surcharge_rate.unwrap_or(match self.year {
            0 | 1 => dec!(0.10),
            2 => dec!(0.08),
            _ => dec!(0.06),
        })
    }

    /// Configuration `periods` months later; the year of enjoyment moves on
    /// every 12 periods.
    pub fn advanced_by(&self, periods: usize) -> Self {
        let years = u32::try_from(periods / 12).unwrap_or(u32::MAX);
        Self {
            year: self.year.saturating_add(years),
            ..self.clone()
        }
    }
}

impl ProgramFormula for ProgoiasConfig {
    fn program(&self) -> Program {
        Program::Progoias
    }

    fn validate(&self) -> Result<(), CalculationError> {
        if self.year == 0 {
            return Err(CalculationError::invalid("year", self.year, ">= 1"));
        }
        check_rate("program_rate", self.program_rate())?;
        check_rate("surcharge_rate", self.surcharge_rate())?;
        check_non_negative("floor_amount", self.floor_amount)
    }

    fn calculate(&self, inputs: &FormulaInputs) -> CalculationResult {
        let totals = &inputs.operations.totals;
        let adjustments = &inputs.adjustments.totals;
        let fixed_burden = self.mode == RateMode::FixedBurden;

        // Quadro A: base
        let output_icms = totals.saidas_incentivized.icms;
        let input_icms = totals.entradas_incentivized.icms;
        let adjustment_credits = adjustments.credits_incentivized;
        let adjustment_debits = adjustments.debits_incentivized;
        let base = floor_zero(output_icms - input_icms - adjustment_credits + adjustment_debits);
        if base.is_zero() && !output_icms.is_zero() {
            log::warn!(
                "{}: ProGoiás base is zero, credits cover the incentivized debits",
                inputs.period
            );
        }

        // Quadro B: credit
        let program_rate = self.program_rate();
        let surcharge_rate = self.surcharge_rate();
        let due_base = floor_zero(base - inputs.carried_forward - self.floor_amount);
        let credit_granted = if fixed_burden {
            due_base * program_rate
        } else {
            base * program_rate
        };
        let surcharge = credit_granted * surcharge_rate;

        // Quadro C: amount due
        let after_credit = floor_zero(due_base - credit_granted);
        let amount_due = floor_zero(after_credit - surcharge);
        let economy = credit_granted + surcharge.min(after_credit);
        let economy_rate = ratio(economy, due_base);
        let remaining_credit =
            floor_zero(inputs.carried_forward + input_icms + adjustment_credits - output_icms - adjustment_debits);

        let quadro_a = Quadro::new("A", "Base de cálculo ProGoiás")
            .item("incentivized_output_icms", "ICMS das saídas incentivadas", output_icms)
            .item("incentivized_input_icms", "ICMS das entradas incentivadas", input_icms)
            .item("incentivized_adjustment_credits", "Outros créditos incentivados", adjustment_credits)
            .item("incentivized_adjustment_debits", "Outros débitos incentivados", adjustment_debits)
            .item("base", "Base de cálculo", base);

        let quadro_b = Quadro::new("B", "Crédito outorgado")
            .item("program_rate", "Percentual ProGoiás", program_rate)
            .item("carried_forward", "Saldo credor do período anterior", inputs.carried_forward)
            .item("floor_amount", "Parcela mínima", self.floor_amount)
            .item("due_base", "Saldo devedor", due_base)
            .item("credit_granted", "Crédito outorgado", credit_granted)
            .item("surcharge_rate", "Percentual PROTEGE", surcharge_rate)
            .item("surcharge", "Contribuição PROTEGE", surcharge);

        let quadro_c = Quadro::new("C", "Apuração final")
            .item("after_credit", "Saldo após crédito outorgado", after_credit)
            .item("amount_due", "ICMS a recolher", amount_due)
            .item("economy", "Economia", economy);

        let mut declarations = Vec::new();
        if !credit_granted.is_zero() {
            declarations.push(Declaration {
                code: CREDIT_CODE,
                value: credit_granted,
                description: "PROGOIÁS - Crédito Outorgado",
            });
        }

        CalculationResult {
            program: Program::Progoias,
            period: inputs.period.to_string(),
            quadros: vec![quadro_a, quadro_b, quadro_c],
            summary: Summary {
                total_due: amount_due,
                benefit_value: credit_granted,
                economy,
                economy_rate,
            },
            remaining_credit,
            audit: audit_trail(inputs),
            declarations,
        }
    }
}
