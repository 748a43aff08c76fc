use crate::core::{AdjustmentEntry, Exclusion, Warning};
use crate::tax::Program;
use rust_decimal::Decimal;
use serde::Serialize;

/// One named value of a quadro.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineItem {
    pub code: &'static str,
    pub label: &'static str,
    pub value: Decimal,
}

/// A section of the calculation. Later quadros depend on earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quadro {
    pub id: &'static str,
    pub title: &'static str,
    pub items: Vec<LineItem>,
}

impl Quadro {
    pub fn new(id: &'static str, title: &'static str) -> Self {
        Self {
            id,
            title,
            items: Vec::new(),
        }
    }

    pub fn item(mut self, code: &'static str, label: &'static str, value: Decimal) -> Self {
        self.items.push(LineItem { code, label, value });
        self
    }

    pub fn value(&self, code: &str) -> Option<Decimal> {
        self.items.iter().find(|i| i.code == code).map(|i| i.value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_due: Decimal,
    /// Financed amount (FOMENTAR family) or granted credit (ProGoiás).
    pub benefit_value: Decimal,
    pub economy: Decimal,
    /// Fraction, not a percentage.
    pub economy_rate: Decimal,
}

/// Informational code reported in the period's E115 records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Declaration {
    pub code: &'static str,
    pub value: Decimal,
    pub description: &'static str,
}

impl Declaration {
    /// As a SPED line, e.g. `|E115|GO020158|640,00|PROGOIÁS - Crédito Outorgado|`.
    pub fn to_sped_line(&self) -> String {
        let value = format!("{:.2}", self.value.round_dp(2)).replace('.', ",");
        format!("|E115|{}|{}|{}|", self.code, value, self.description)
    }
}

/// Adjustments and exclusions behind the numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditTrail {
    pub adjustments: Vec<AdjustmentEntry>,
    pub exclusions: Vec<Exclusion>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculationResult {
    pub program: Program,
    pub period: String,
    pub quadros: Vec<Quadro>,
    pub summary: Summary,
    /// Credit balance to carry into the next period.
    pub remaining_credit: Decimal,
    pub audit: AuditTrail,
    pub declarations: Vec<Declaration>,
}

impl CalculationResult {
    pub fn quadro(&self, id: &str) -> Option<&Quadro> {
        self.quadros.iter().find(|q| q.id == id)
    }

    /// Value of a line item, or zero when absent.
    pub fn value(&self, quadro: &str, code: &str) -> Decimal {
        self.quadro(quadro)
            .and_then(|q| q.value(code))
            .unwrap_or_default()
    }
}

/// `numerator / denominator`, or zero when the denominator is zero.
pub(crate) fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

pub(crate) fn floor_zero(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO)
}
