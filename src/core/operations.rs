//! Classification of consolidated operations by direction and incentive.

use crate::core::cfop::{Cfop, Direction};
use crate::core::generic::{GenericCodeConfiguration, ResolutionChoice};
use crate::core::layout::{ConsolidatedLine, CONSOLIDATED_TYPES};
use crate::core::record::RecordSet;
use crate::core::warnings::Warning;
use rust_decimal::Decimal;
use serde::Serialize;

/// One consolidated operation line after classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub cfop: Cfop,
    pub record_type: String,
    pub direction: Direction,
    pub operation_amount: Decimal,
    pub icms: Decimal,
    pub incentivized: bool,
}

/// Running totals for one direction/incentive bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub operation_amount: Decimal,
    pub icms: Decimal,
    pub count: usize,
}

impl Aggregate {
    fn add(&mut self, op: &Operation) {
        self.operation_amount += op.operation_amount;
        self.icms += op.icms;
        self.count += 1;
    }
}

/// Totals for the four direction x incentive buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationTotals {
    pub entradas_incentivized: Aggregate,
    pub entradas_not_incentivized: Aggregate,
    pub saidas_incentivized: Aggregate,
    pub saidas_not_incentivized: Aggregate,
}

impl OperationTotals {
    pub fn bucket(&self, direction: Direction, incentivized: bool) -> &Aggregate {
        match (direction, incentivized) {
            (Direction::Entrada, true) => &self.entradas_incentivized,
            (Direction::Entrada, false) => &self.entradas_not_incentivized,
            (Direction::Saida, true) => &self.saidas_incentivized,
            (Direction::Saida, false) => &self.saidas_not_incentivized,
        }
    }

    fn bucket_mut(&mut self, direction: Direction, incentivized: bool) -> &mut Aggregate {
        match (direction, incentivized) {
            (Direction::Entrada, true) => &mut self.entradas_incentivized,
            (Direction::Entrada, false) => &mut self.entradas_not_incentivized,
            (Direction::Saida, true) => &mut self.saidas_incentivized,
            (Direction::Saida, false) => &mut self.saidas_not_incentivized,
        }
    }

    pub fn entrada_icms(&self) -> Decimal {
        self.entradas_incentivized.icms + self.entradas_not_incentivized.icms
    }

    pub fn saida_amount(&self) -> Decimal {
        self.saidas_incentivized.operation_amount + self.saidas_not_incentivized.operation_amount
    }

    pub fn total_icms(&self) -> Decimal {
        self.entrada_icms() + self.saidas_incentivized.icms + self.saidas_not_incentivized.icms
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassifiedOperations {
    pub operations: Vec<Operation>,
    pub totals: OperationTotals,
    pub warnings: Vec<Warning>,
}

/// Incentive status of a CFOP. An explicit decision for a generic CFOP wins;
/// otherwise the normative table for the direction decides.
pub fn resolve_incentive(cfop: &Cfop, direction: Direction, config: &GenericCodeConfiguration) -> bool {
    if cfop.is_generic() {
        match config.get(cfop) {
            Some(ResolutionChoice::Incentivized) => return true,
            Some(ResolutionChoice::NotIncentivized) => return false,
            Some(ResolutionChoice::Default) | None => {}
        }
    }
    cfop.is_normatively_incentivized(direction)
}

/// Classify every consolidated operation record (C190, C590, D190, D590).
///
/// Records with an empty CFOP or a zero operation amount are ignored. Malformed
/// CFOPs and CFOPs without a direction are skipped with a warning.
pub fn classify_operations(records: &RecordSet, config: &GenericCodeConfiguration) -> ClassifiedOperations {
    let mut result = ClassifiedOperations::default();

    for record_type in CONSOLIDATED_TYPES {
        for record in records.records(record_type) {
            let Some(line) = ConsolidatedLine::from_record(record) else {
                continue;
            };
            if line.cfop.is_empty() || line.operation_amount.is_zero() {
                continue;
            }

            let cfop = match line.cfop.parse::<Cfop>() {
                Ok(cfop) => cfop,
                Err(err) => {
                    log::warn!("{} line {}: {}", record_type, record.line, err);
                    result.warnings.push(Warning::MalformedCfop {
                        record_type: record_type.to_string(),
                        line: record.line,
                        cfop: line.cfop.clone(),
                    });
                    continue;
                }
            };
            let Some(direction) = cfop.direction() else {
                log::warn!(
                    "{} line {}: CFOP {} has no direction, skipping",
                    record_type,
                    record.line,
                    cfop
                );
                result.warnings.push(Warning::UnknownCfopDirection {
                    record_type: record_type.to_string(),
                    line: record.line,
                    cfop: cfop.to_string(),
                });
                continue;
            };

            let operation = Operation {
                cfop,
                record_type: record_type.to_string(),
                direction,
                operation_amount: line.operation_amount,
                icms: line.icms,
                incentivized: resolve_incentive(&cfop, direction, config),
            };
            result
                .totals
                .bucket_mut(direction, operation.incentivized)
                .add(&operation);
            result.operations.push(operation);
        }
    }

    log::info!(
        "Classified {} operations ({} warnings)",
        result.operations.len(),
        result.warnings.len()
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cfop(s: &str) -> Cfop {
        s.parse().unwrap()
    }

    #[test]
    fn classify_single_incentivized_sale() {
        let set = RecordSet::parse("|C190|000|5101|18,00|1000,00|1000,00|180,00|0|0|0|0||\n");
        let classified = classify_operations(&set, &GenericCodeConfiguration::new());

        assert_eq!(classified.operations.len(), 1);
        let op = &classified.operations[0];
        assert_eq!(op.direction, Direction::Saida);
        assert!(op.incentivized);
        assert_eq!(classified.totals.saidas_incentivized.icms, dec!(180));
        assert_eq!(classified.totals.saidas_incentivized.count, 1);
        assert_eq!(classified.totals.saida_amount(), dec!(1000));
    }

    #[test]
    fn skip_zero_amount_and_empty_cfop() {
        let set = RecordSet::parse(
            "|C190|000|5101|18,00|0,00|0,00|0,00|0|0|0|0||\n\
             |C190|000||18,00|100,00|100,00|18,00|0|0|0|0||\n",
        );
        let classified = classify_operations(&set, &GenericCodeConfiguration::new());
        assert!(classified.operations.is_empty());
        assert!(classified.warnings.is_empty());
    }

    #[test]
    fn oversized_amounts_do_not_overflow_totals() {
        let line = "|C190|000|5101|18,00|79228162514264337593543950335|1000,00|180,00|0|0|0|0||\n";
        let set = RecordSet::parse(&line.repeat(2));
        let classified = classify_operations(&set, &GenericCodeConfiguration::new());
        assert!(classified.operations.is_empty());
        assert_eq!(classified.totals.saida_amount(), Decimal::ZERO);
    }

    #[test]
    fn anomalous_cfops_become_warnings() {
        let set = RecordSet::parse(
            "|C190|000|4101|18,00|100,00|100,00|18,00|0|0|0|0||\n\
             |D190|000|51X1|18,00|100,00|100,00|18,00|0||\n\
             |C190|000|6101|12,00|100,00|100,00|12,00|0|0|0|0||\n",
        );
        let classified = classify_operations(&set, &GenericCodeConfiguration::new());
        assert_eq!(classified.operations.len(), 1);
        assert_eq!(classified.warnings.len(), 2);
        assert!(matches!(classified.warnings[0], Warning::UnknownCfopDirection { .. }));
        assert!(matches!(classified.warnings[1], Warning::MalformedCfop { .. }));
    }

    #[test]
    fn explicit_choice_overrides_generic_cfop() {
        let set = RecordSet::parse("|C190|000|5949|18,00|100,00|100,00|18,00|0|0|0|0||\n");

        let default = classify_operations(&set, &GenericCodeConfiguration::new());
        assert!(!default.operations[0].incentivized);

        let config: GenericCodeConfiguration =
            [(cfop("5949"), ResolutionChoice::Incentivized)].into_iter().collect();
        let overridden = classify_operations(&set, &config);
        assert!(overridden.operations[0].incentivized);
        assert_eq!(overridden.totals.saidas_incentivized.icms, dec!(18));
    }

    #[test]
    fn default_choice_uses_normative_table() {
        // 5910 is both generic and normatively incentivized
        let config: GenericCodeConfiguration =
            [(cfop("5910"), ResolutionChoice::Default)].into_iter().collect();
        assert!(resolve_incentive(&cfop("5910"), Direction::Saida, &config));

        let config: GenericCodeConfiguration =
            [(cfop("5910"), ResolutionChoice::NotIncentivized)].into_iter().collect();
        assert!(!resolve_incentive(&cfop("5910"), Direction::Saida, &config));
    }

    #[test]
    fn overrides_ignored_for_non_generic_cfops() {
        let config: GenericCodeConfiguration =
            [(cfop("5101"), ResolutionChoice::NotIncentivized)].into_iter().collect();
        assert!(resolve_incentive(&cfop("5101"), Direction::Saida, &config));
    }
}
