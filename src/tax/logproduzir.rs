//! LogPRODUZIR: granted credit for logistics companies over the ICMS on
//! interstate freight that exceeds their corrected historical average.

use crate::tax::result::{floor_zero, ratio};
use crate::tax::{
    audit_trail, check_non_negative, CalculationError, CalculationResult, FormulaInputs, Program,
    ProgramFormula, Quadro, Summary,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// ICMS rate on interstate freight.
pub const FREIGHT_ICMS_RATE: Decimal = dec!(0.12);

/// Contributions owed on the gross credit: university grants, FUNPRODUZIR and
/// PROTEGE.
pub const UNIVERSITY_GRANT_RATE: Decimal = dec!(0.02);
pub const FUNPRODUZIR_RATE: Decimal = dec!(0.03);
pub const PROTEGE_RATE: Decimal = dec!(0.15);

/// Company category of the incentive contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FreightCategory {
    I,
    #[default]
    II,
    III,
}

impl FreightCategory {
    pub fn credit_rate(&self) -> Decimal {
        match self {
            FreightCategory::I => dec!(0.50),
            FreightCategory::II => dec!(0.73),
            FreightCategory::III => dec!(0.80),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogproduzirConfig {
    pub category: FreightCategory,
    /// Average monthly ICMS before the incentive.
    pub average_base: Decimal,
    /// IGP-DI correction factor applied to the average.
    pub igp_di: Decimal,
}

impl Default for LogproduzirConfig {
    fn default() -> Self {
        Self {
            category: FreightCategory::II,
            average_base: Decimal::ZERO,
            igp_di: Decimal::ONE,
        }
    }
}

impl ProgramFormula for LogproduzirConfig {
    fn program(&self) -> Program {
        Program::Logproduzir
    }

    fn validate(&self) -> Result<(), CalculationError> {
        check_non_negative("average_base", self.average_base)?;
        check_non_negative("igp_di", self.igp_di)
    }

    fn calculate(&self, inputs: &FormulaInputs) -> CalculationResult {
        let freight = inputs
            .operations
            .operations
            .iter()
            .filter(|op| op.cfop.is_freight() && op.operation_amount > Decimal::ZERO);
        let (interstate_freight, total_freight) =
            freight.fold((Decimal::ZERO, Decimal::ZERO), |(interstate, total), op| {
                let interstate = if op.cfop.is_interstate_freight() {
                    interstate + op.operation_amount
                } else {
                    interstate
                };
                (interstate, total + op.operation_amount)
            });

        // Quadro A: freight
        let proportion = ratio(interstate_freight, total_freight);
        let freight_icms = interstate_freight * FREIGHT_ICMS_RATE;
        let balance = floor_zero(freight_icms - inputs.carried_forward);
        let remaining_credit = floor_zero(inputs.carried_forward - freight_icms);

        // Quadro B: credit over the excess
        let corrected_average = self.average_base * self.igp_di;
        let excess = floor_zero(balance - corrected_average);
        let credit_rate = self.category.credit_rate();
        let gross_credit = excess * credit_rate;
        let university_grant = gross_credit * UNIVERSITY_GRANT_RATE;
        let funproduzir = gross_credit * FUNPRODUZIR_RATE;
        let protege = gross_credit * PROTEGE_RATE;
        let contributions = university_grant + funproduzir + protege;
        let net_credit = gross_credit - contributions;

        // Quadro C
        let amount_due = floor_zero(balance - net_credit);
        let economy = balance - amount_due;

        let quadro_a = Quadro::new("A", "Fretes")
            .item("interstate_freight", "Fretes interestaduais", interstate_freight)
            .item("total_freight", "Frete total", total_freight)
            .item("proportion", "Proporção dos fretes interestaduais", proportion)
            .item("freight_icms", "ICMS sobre fretes interestaduais", freight_icms)
            .item("carried_forward", "Saldo credor do período anterior", inputs.carried_forward)
            .item("balance", "Saldo devedor", balance);

        let quadro_b = Quadro::new("B", "Crédito outorgado")
            .item("average_base", "Média base", self.average_base)
            .item("igp_di", "Fator IGP-DI", self.igp_di)
            .item("corrected_average", "Média corrigida", corrected_average)
            .item("excess", "Excesso sobre a média", excess)
            .item("credit_rate", "Percentual da categoria", credit_rate)
            .item("gross_credit", "Crédito bruto", gross_credit)
            .item("university_grant", "Bolsa Universitária", university_grant)
            .item("funproduzir", "FUNPRODUZIR", funproduzir)
            .item("protege", "PROTEGE GOIÁS", protege)
            .item("contributions", "Total das contribuições", contributions)
            .item("net_credit", "Crédito líquido", net_credit);

        let quadro_c = Quadro::new("C", "Apuração final")
            .item("amount_due", "ICMS a recolher", amount_due)
            .item("economy", "Economia", economy);

        CalculationResult {
            program: Program::Logproduzir,
            period: inputs.period.to_string(),
            quadros: vec![quadro_a, quadro_b, quadro_c],
            summary: Summary {
                total_due: amount_due,
                benefit_value: net_credit,
                economy,
                economy_rate: ratio(economy, balance),
            },
            remaining_credit,
            audit: audit_trail(inputs),
            declarations: Vec::new(),
        }
    }
}
