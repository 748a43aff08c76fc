//! FOMENTAR / PRODUZIR / MICROPRODUZIR: financing of part of the ICMS due on
//! incentivized operations.
//!
//! Quadro A splits the period's credits between incentivized and
//! non-incentivized operations in proportion to outbound amounts. Quadro B
//! computes the financed share of the incentivized balance; Quadro C the plain
//! balance of everything else.

use crate::tax::result::{floor_zero, ratio};
use crate::tax::{
    audit_trail, check_non_negative, check_rate, CalculationError, CalculationResult, Declaration,
    FormulaInputs, Program, ProgramFormula, Quadro, Summary,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Program of the FOMENTAR family; decides the default financing rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FomentarKind {
    #[default]
    Fomentar,
    Produzir,
    Microproduzir,
}

impl FomentarKind {
    pub fn default_financing_rate(&self) -> Decimal {
        match self {
            FomentarKind::Fomentar => dec!(0.70),
            FomentarKind::Produzir => dec!(0.73),
            FomentarKind::Microproduzir => dec!(0.90),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct FomentarConfig {
    pub kind: FomentarKind,
    /// Overrides the kind's default rate.
    pub financing_rate: Option<Decimal>,
    /// Average ICMS paid before the incentive; deducted from the financing base.
    pub floor_amount: Decimal,
}

impl FomentarConfig {
    pub fn new(kind: FomentarKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn financing_rate(&self) -> Decimal {
        self.financing_rate
            .unwrap_or_else(|| self.kind.default_financing_rate())
    }
}

impl ProgramFormula for FomentarConfig {
    fn program(&self) -> Program {
        Program::Fomentar
    }

    fn validate(&self) -> Result<(), CalculationError> {
        check_rate("financing_rate", self.financing_rate())?;
        check_non_negative("floor_amount", self.floor_amount)
    }

    fn calculate(&self, inputs: &FormulaInputs) -> CalculationResult {
        let totals = &inputs.operations.totals;
        let adjustments = &inputs.adjustments.totals;
        let financing_rate = self.financing_rate();

        // Quadro A
        let incentivized_saida_amount = totals.saidas_incentivized.operation_amount;
        let total_saida_amount = totals.saida_amount();
        let proportion = ratio(incentivized_saida_amount, total_saida_amount);
        let entrada_icms = totals.entrada_icms();
        let adjustment_credits = adjustments.credits();
        let total_credits = entrada_icms + adjustment_credits + inputs.carried_forward;
        let credit_incentivized = total_credits * proportion;
        let credit_not_incentivized = total_credits - credit_incentivized;

        // Quadro B
        let incentivized_saida_icms = totals.saidas_incentivized.icms;
        let incentivized_debits = adjustments.debits_incentivized;
        let gross_debit = incentivized_saida_icms + incentivized_debits;
        let base = floor_zero(gross_debit - credit_incentivized - self.floor_amount);
        let financed = base * financing_rate;
        let not_financed = base - financed;
        let amount_due_incentivized = floor_zero(not_financed);

        // Quadro C
        let not_incentivized_saida_icms = totals.saidas_not_incentivized.icms;
        let not_incentivized_debits = adjustments.debits_not_incentivized;
        let not_incentivized_gross = not_incentivized_saida_icms + not_incentivized_debits;
        let amount_due_not_incentivized = floor_zero(not_incentivized_gross - credit_not_incentivized);

        let balance_incentivized = floor_zero(gross_debit - credit_incentivized);
        let total_due = amount_due_incentivized + amount_due_not_incentivized;
        let economy_rate = ratio(financed, balance_incentivized + amount_due_not_incentivized);
        let remaining_credit = floor_zero(credit_incentivized - gross_debit)
            + floor_zero(credit_not_incentivized - not_incentivized_gross);

        let quadro_a = Quadro::new("A", "Proporção dos créditos apropriados")
            .item("incentivized_saida_amount", "Saídas incentivadas", incentivized_saida_amount)
            .item("total_saida_amount", "Total das saídas", total_saida_amount)
            .item("proportion", "Proporção das saídas incentivadas", proportion)
            .item("entrada_icms", "Créditos por entradas", entrada_icms)
            .item("adjustment_credits", "Outros créditos", adjustment_credits)
            .item("carried_forward", "Saldo credor do período anterior", inputs.carried_forward)
            .item("total_credits", "Total dos créditos", total_credits)
            .item("credit_incentivized", "Crédito das operações incentivadas", credit_incentivized)
            .item("credit_not_incentivized", "Crédito das operações não incentivadas", credit_not_incentivized);

        let quadro_b = Quadro::new("B", "Operações incentivadas")
            .item("incentivized_saida_icms", "Débito das operações incentivadas", incentivized_saida_icms)
            .item("incentivized_adjustment_debits", "Outros débitos incentivados", incentivized_debits)
            .item("gross_debit", "Débito total incentivado", gross_debit)
            .item("credit_incentivized", "Crédito das operações incentivadas", credit_incentivized)
            .item("balance_incentivized", "Saldo devedor incentivado", balance_incentivized)
            .item("floor_amount", "ICMS por média", self.floor_amount)
            .item("base", "ICMS base do financiamento", base)
            .item("financing_rate", "Percentual de financiamento", financing_rate)
            .item("financed", "ICMS financiado", financed)
            .item("not_financed", "Parcela não financiada", not_financed)
            .item("amount_due_incentivized", "Saldo a pagar da parcela não financiada", amount_due_incentivized);

        let quadro_c = Quadro::new("C", "Operações não incentivadas")
            .item("not_incentivized_saida_icms", "Débito das operações não incentivadas", not_incentivized_saida_icms)
            .item("not_incentivized_adjustment_debits", "Outros débitos não incentivados", not_incentivized_debits)
            .item("not_incentivized_gross", "Débito total não incentivado", not_incentivized_gross)
            .item("credit_not_incentivized", "Crédito das operações não incentivadas", credit_not_incentivized)
            .item("amount_due_not_incentivized", "Saldo a pagar não incentivado", amount_due_not_incentivized);

        // The rate is only declared for a period that had something to finance.
        let declared_rate = if base.is_zero() {
            Decimal::ZERO
        } else {
            financing_rate * dec!(100)
        };
        let declarations = [
            ("GO200001", "Débito do ICMS das Operações Incentivadas", gross_debit),
            ("GO200002", "Crédito do ICMS das Operações Incentivadas", credit_incentivized),
            ("GO200003", "Saldo Devedor das Operações Incentivadas", balance_incentivized),
            ("GO200004", "Débito do ICMS das Operações Não Incentivadas", not_incentivized_gross),
            ("GO200005", "Crédito do ICMS das Operações Não Incentivadas", credit_not_incentivized),
            ("GO200006", "Saldo Devedor das Operações Não Incentivadas", amount_due_not_incentivized),
            ("GO200018", "ICMS devido pelas operações incentivadas", base),
            ("GO200019", "ICMS financiado", financed),
            ("GO200020", "Parcela não financiada", not_financed),
            ("GO200021", "Percentual de financiamento aplicado", declared_rate),
            ("GO200022", "Valor total a pagar", total_due),
            ("GO200023", "Valor do financiamento (economia)", financed),
            ("GO200024", "Percentual de economia obtida", economy_rate * dec!(100)),
            ("GO200025", "Crédito oriundo de saldo anterior", inputs.carried_forward),
            ("GO200026", "Crédito a transportar para período seguinte", remaining_credit),
        ]
        .into_iter()
        .filter(|(_, _, value)| !value.is_zero())
        .map(|(code, description, value)| Declaration {
            code,
            value,
            description,
        })
        .collect();

        CalculationResult {
            program: Program::Fomentar,
            period: inputs.period.to_string(),
            quadros: vec![quadro_a, quadro_b, quadro_c],
            summary: Summary {
                total_due,
                benefit_value: financed,
                economy: financed,
                economy_rate,
            },
            remaining_credit,
            audit: audit_trail(inputs),
            declarations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Corrections, ExclusionReason, GenericCodeConfiguration, RecordSet};
    use crate::tax::{IncentiveEngine, ProgramConfig};

    fn calculate(config: FomentarConfig, text: &str, carried_forward: Decimal) -> CalculationResult {
        IncentiveEngine::new(ProgramConfig::Fomentar(config))
            .unwrap()
            .calculate(
                "01/2024",
                &RecordSet::parse(text),
                &GenericCodeConfiguration::new(),
                &Corrections::new(),
                carried_forward,
            )
            .unwrap()
    }

    #[test]
    fn single_incentivized_sale() {
        let result = calculate(
            FomentarConfig::default(),
            "|C190|000|5101|18,00|1000,00|1000,00|180,00|0|0|0|0||\n",
            Decimal::ZERO,
        );

        assert_eq!(result.value("B", "gross_debit"), dec!(180));
        assert_eq!(result.value("A", "credit_incentivized"), dec!(0));
        assert_eq!(result.value("B", "base"), dec!(180));
        assert_eq!(result.value("B", "financed"), dec!(126));
        assert_eq!(result.value("B", "not_financed"), dec!(54));
        assert_eq!(result.value("B", "amount_due_incentivized"), dec!(54));
        assert_eq!(result.summary.total_due, dec!(54));
        assert_eq!(result.summary.benefit_value, dec!(126));
        assert_eq!(result.summary.economy_rate, dec!(0.7));
        assert_eq!(result.remaining_credit, Decimal::ZERO);
    }

    #[test]
    fn empty_records_give_zero_result() {
        let result = calculate(FomentarConfig::default(), "", Decimal::ZERO);

        assert_eq!(result.quadros.len(), 3);
        for quadro in &result.quadros {
            for item in &quadro.items {
                // configured rate, not an amount
                let expected = if item.code == "financing_rate" { dec!(0.70) } else { Decimal::ZERO };
                assert_eq!(item.value, expected, "{}.{}", quadro.id, item.code);
            }
        }
        assert_eq!(result.summary.total_due, Decimal::ZERO);
        assert_eq!(result.summary.economy_rate, Decimal::ZERO);
        assert!(result.declarations.is_empty());
    }

    #[test]
    fn credits_split_by_outbound_proportion() {
        let text = "|C190|000|5101|18,00|750,00|750,00|135,00|0|0|0|0||\n\
                    |C190|000|5102|18,00|250,00|250,00|45,00|0|0|0|0||\n\
                    |C190|000|1101|18,00|400,00|400,00|72,00|0|0|0|0||\n";
        let result = calculate(FomentarConfig::new(FomentarKind::Produzir), text, dec!(28));

        assert_eq!(result.value("A", "proportion"), dec!(0.75));
        assert_eq!(result.value("A", "total_credits"), dec!(100));
        assert_eq!(result.value("A", "credit_incentivized"), dec!(75));
        assert_eq!(result.value("A", "credit_not_incentivized"), dec!(25));
        // (135 - 75) * 0.73
        assert_eq!(result.value("B", "financed"), dec!(43.8));
        assert_eq!(result.value("B", "amount_due_incentivized"), dec!(16.2));
        assert_eq!(result.value("C", "amount_due_not_incentivized"), dec!(20));
        assert_eq!(result.summary.total_due, dec!(36.2));
    }

    #[test]
    fn floor_amount_reduces_base() {
        let config = FomentarConfig {
            floor_amount: dec!(30),
            ..FomentarConfig::default()
        };
        let result = calculate(config, "|C190|000|5101|18,00|1000,00|1000,00|180,00|0|0|0|0||\n", Decimal::ZERO);
        assert_eq!(result.value("B", "base"), dec!(150));
        assert_eq!(result.value("B", "financed"), dec!(105));
    }

    #[test]
    fn excess_credit_is_carried_and_nothing_due() {
        let text = "|C190|000|5101|18,00|1000,00|1000,00|180,00|0|0|0|0||\n\
                    |C190|000|1101|18,00|2000,00|2000,00|360,00|0|0|0|0||\n";
        let result = calculate(FomentarConfig::default(), text, Decimal::ZERO);

        assert_eq!(result.value("B", "base"), Decimal::ZERO);
        assert_eq!(result.value("B", "amount_due_incentivized"), Decimal::ZERO);
        assert_eq!(result.summary.total_due, Decimal::ZERO);
        assert_eq!(result.remaining_credit, dec!(180));
    }

    #[test]
    fn adjustment_debits_follow_incentive_flag() {
        let text = "|C190|000|5101|18,00|1000,00|1000,00|180,00|0|0|0|0||\n\
                    |E111|GO010016|estorno incentivado|20,00|\n\
                    |E111|GO000001|debito comum|10,00|\n\
                    |E111|GO040007|credito FOMENTAR|126,00|\n\
                    |C197|GO70000001|||0|0|50,00|0|\n";
        let result = calculate(FomentarConfig::default(), text, Decimal::ZERO);

        assert_eq!(result.value("B", "gross_debit"), dec!(200));
        assert_eq!(result.value("B", "financed"), dec!(140));
        assert_eq!(result.value("C", "amount_due_not_incentivized"), dec!(10));
        let reasons: Vec<_> = result.audit.exclusions.iter().map(|e| e.reason).collect();
        assert_eq!(
            reasons,
            vec![ExclusionReason::OwnProgramCredit, ExclusionReason::SpecialDebitExcluded]
        );
    }

    #[test]
    fn declarations_report_financed_amount() {
        let result = calculate(
            FomentarConfig::default(),
            "|C190|000|5101|18,00|1000,00|1000,00|180,00|0|0|0|0||\n",
            Decimal::ZERO,
        );
        let financed = result
            .declarations
            .iter()
            .find(|d| d.code == "GO200019")
            .unwrap();
        assert_eq!(financed.value, dec!(126));
        assert_eq!(financed.to_sped_line(), "|E115|GO200019|126,00|ICMS financiado|");

        let codes: Vec<_> = result.declarations.iter().map(|d| d.code).collect();
        assert_eq!(
            codes,
            vec![
                "GO200001", "GO200003", "GO200018", "GO200019", "GO200020", "GO200021", "GO200022",
                "GO200023", "GO200024"
            ]
        );
        let value = |code: &str| result.declarations.iter().find(|d| d.code == code).map(|d| d.value);
        assert_eq!(value("GO200021"), Some(dec!(70)));
        assert_eq!(value("GO200022"), Some(dec!(54)));
        assert_eq!(value("GO200023"), Some(dec!(126)));
        assert_eq!(value("GO200024"), Some(dec!(70)));
    }

    #[test]
    fn default_rates() {
        assert_eq!(FomentarKind::Fomentar.default_financing_rate(), dec!(0.70));
        assert_eq!(FomentarKind::Produzir.default_financing_rate(), dec!(0.73));
        assert_eq!(FomentarKind::Microproduzir.default_financing_rate(), dec!(0.90));
    }
}
