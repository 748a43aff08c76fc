//! Check of the calculated declarations against the E115 records the
//! taxpayer filed.

use crate::core::layout::{AssessmentInformation, SpedRecord, DECLARATION_TYPE};
use crate::core::RecordSet;
use crate::tax::result::ratio;
use crate::tax::{Declaration, Program};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;

/// Differences below one cent count as equal.
pub const TOLERANCE: Decimal = dec!(0.01);

/// An E115 record found in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredValue {
    pub code: String,
    pub value: Decimal,
    pub description: Option<String>,
    pub line: usize,
}

/// A code both calculated and declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclarationComparison {
    pub code: &'static str,
    pub description: &'static str,
    pub calculated: Decimal,
    pub declared: Decimal,
    /// `declared - calculated`
    pub difference: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeclarationCheck {
    pub matching: Vec<DeclarationComparison>,
    pub differing: Vec<DeclarationComparison>,
    /// Calculated but absent from the file.
    pub missing: Vec<Declaration>,
    /// Filed under one of the program's codes but not calculated.
    pub extra: Vec<DeclaredValue>,
}

impl DeclarationCheck {
    pub fn is_consistent(&self) -> bool {
        self.differing.is_empty() && self.missing.is_empty() && self.extra.is_empty()
    }

    /// Fraction of the calculated declarations the file matches.
    pub fn match_rate(&self) -> Decimal {
        let calculated = self.matching.len() + self.differing.len() + self.missing.len();
        ratio(Decimal::from(self.matching.len()), Decimal::from(calculated))
    }
}

/// E115 records of the file that fall under the program's codes. A repeated
/// code keeps its first record.
pub fn declared_values(records: &RecordSet, program: Program) -> Vec<DeclaredValue> {
    let mut declared: Vec<DeclaredValue> = Vec::new();
    for record in records.records(DECLARATION_TYPE) {
        let info = AssessmentInformation::from_record(record);
        if !program.declares(&info.cod_inf_adic) {
            continue;
        }
        if declared.iter().any(|d| d.code == info.cod_inf_adic) {
            log::warn!(
                "E115 line {}: code {} declared more than once, keeping the first",
                record.line,
                info.cod_inf_adic
            );
            continue;
        }
        declared.push(DeclaredValue {
            code: info.cod_inf_adic,
            value: info.vl_inf_adic,
            description: info.descr_compl_aj,
            line: record.line,
        });
    }
    declared
}

/// Compare each calculated declaration with the value the file declares under
/// the same code.
pub fn confront_declarations(calculated: &[Declaration], records: &RecordSet, program: Program) -> DeclarationCheck {
    let mut declared: BTreeMap<String, DeclaredValue> = declared_values(records, program)
        .into_iter()
        .map(|d| (d.code.clone(), d))
        .collect();
    let mut check = DeclarationCheck::default();

    for declaration in calculated {
        let Some(filed) = declared.remove(declaration.code) else {
            check.missing.push(declaration.clone());
            continue;
        };
        let calculated = declaration.value.round_dp(2);
        let comparison = DeclarationComparison {
            code: declaration.code,
            description: declaration.description,
            calculated,
            declared: filed.value,
            difference: filed.value - calculated,
        };
        if comparison.difference.abs() < TOLERANCE {
            check.matching.push(comparison);
        } else {
            check.differing.push(comparison);
        }
    }
    check.extra = declared.into_values().collect();

    log::info!(
        "{}: E115 check {} matching, {} differing, {} missing, {} extra",
        program,
        check.matching.len(),
        check.differing.len(),
        check.missing.len(),
        check.extra.len()
    );
    check
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(code: &'static str, value: Decimal) -> Declaration {
        Declaration {
            code,
            value,
            description: "",
        }
    }

    #[test]
    fn sorts_codes_into_the_four_groups() {
        let records = RecordSet::parse(
            "|E115|GO200019|812,00|ICMS financiado|\n\
             |E115|GO200001|1500,00||\n\
             |E115|GO200099|10,00||\n\
             |E115|GO999999|5,00||\n",
        );
        let calculated = vec![
            declaration("GO200001", dec!(1800)),
            declaration("GO200019", dec!(812.004)),
            declaration("GO200020", dec!(348)),
        ];
        let check = confront_declarations(&calculated, &records, Program::Fomentar);

        assert_eq!(check.matching.len(), 1);
        assert_eq!(check.matching[0].code, "GO200019");
        assert_eq!(check.differing.len(), 1);
        assert_eq!(check.differing[0].difference, dec!(-300));
        assert_eq!(check.missing[0].code, "GO200020");
        assert_eq!(check.extra.len(), 1);
        assert_eq!(check.extra[0].code, "GO200099");
        assert_eq!(check.extra[0].line, 3);
        assert!(!check.is_consistent());
        assert_eq!(check.match_rate(), dec!(1) / dec!(3));
    }

    #[test]
    fn other_programs_codes_are_ignored() {
        let records = RecordSet::parse("|E115|GO200019|812,00||\n|E115|GO020158|640,00||\n");
        let calculated = vec![declaration("GO020158", dec!(640))];
        let check = confront_declarations(&calculated, &records, Program::Progoias);

        assert!(check.is_consistent());
        assert_eq!(check.match_rate(), Decimal::ONE);
    }

    #[test]
    fn repeated_code_keeps_first_record() {
        let records = RecordSet::parse("|E115|GO200019|812,00||\n|E115|GO200019|1,00||\n");
        let declared = declared_values(&records, Program::Fomentar);
        assert_eq!(declared.len(), 1);
        assert_eq!(declared[0].value, dec!(812));
    }

    #[test]
    fn nothing_declared_or_calculated() {
        let check = confront_declarations(&[], &RecordSet::default(), Program::Fomentar);
        assert!(check.is_consistent());
        assert_eq!(check.match_rate(), Decimal::ZERO);
    }
}
