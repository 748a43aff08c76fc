//! Generic CFOP configuration: which ambiguous CFOPs still need a decision.

use crate::core::cfop::{Cfop, Direction};
use crate::core::layout::{ConsolidatedLine, CONSOLIDATED_TYPES};
use crate::core::record::RecordSet;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Taxpayer decision for a generic CFOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionChoice {
    Incentivized,
    NotIncentivized,
    /// Fall back to the normative tables.
    #[default]
    Default,
}

/// Generic CFOP -> decision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct GenericCodeConfiguration(BTreeMap<Cfop, ResolutionChoice>);

impl GenericCodeConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cfop: &Cfop) -> Option<ResolutionChoice> {
        self.0.get(cfop).copied()
    }

    pub fn set(&mut self, cfop: Cfop, choice: ResolutionChoice) {
        self.0.insert(cfop, choice);
    }

    pub fn is_resolved(&self, cfop: &Cfop) -> bool {
        self.0.contains_key(cfop)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve every pending CFOP by normative lookup.
    pub fn apply_normative(&mut self, pending: &[PendingCfop]) {
        for item in pending {
            self.0.entry(item.cfop).or_insert(ResolutionChoice::Default);
        }
    }

    /// Resolve pending CFOPs from an explicit map. Pending CFOPs the map does
    /// not mention fall back to normative lookup.
    pub fn apply_map(&mut self, pending: &[PendingCfop], choices: &BTreeMap<Cfop, ResolutionChoice>) {
        for (cfop, choice) in choices {
            self.0.insert(*cfop, *choice);
        }
        self.apply_normative(pending);
    }
}

impl FromIterator<(Cfop, ResolutionChoice)> for GenericCodeConfiguration {
    fn from_iter<I: IntoIterator<Item = (Cfop, ResolutionChoice)>>(iter: I) -> Self {
        GenericCodeConfiguration(iter.into_iter().collect())
    }
}

/// A generic CFOP found in the records without a configured decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingCfop {
    pub cfop: Cfop,
    pub direction: Direction,
    pub description: &'static str,
    pub operation_amount: Decimal,
    pub icms: Decimal,
    pub occurrences: usize,
}

/// Generic CFOPs used in the records that the configuration does not cover,
/// with their totals across all consolidated record types. Lines with a zero
/// operation amount never reach the calculation and are left out.
pub fn detect_pending(records: &RecordSet, config: &GenericCodeConfiguration) -> Vec<PendingCfop> {
    let mut pending: BTreeMap<Cfop, PendingCfop> = BTreeMap::new();

    for record_type in CONSOLIDATED_TYPES {
        for record in records.records(record_type) {
            let Some(line) = ConsolidatedLine::from_record(record) else {
                continue;
            };
            if line.operation_amount.is_zero() {
                continue;
            }
            let Ok(cfop) = line.cfop.parse::<Cfop>() else {
                continue;
            };
            if !cfop.is_generic() || config.is_resolved(&cfop) {
                continue;
            }
            let Some(direction) = cfop.direction() else {
                continue;
            };
            let item = pending.entry(cfop).or_insert_with(|| PendingCfop {
                cfop,
                direction,
                description: cfop.description(),
                operation_amount: Decimal::ZERO,
                icms: Decimal::ZERO,
                occurrences: 0,
            });
            item.operation_amount += line.operation_amount;
            item.icms += line.icms;
            item.occurrences += 1;
        }
    }

    pending.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn records() -> RecordSet {
        RecordSet::parse(
            "|C190|000|5949|18,00|200,00|200,00|36,00|0|0|0|0||\n\
             |C590|000|5949|18,00|100,00|100,00|18,00|0|0|0||\n\
             |C190|000|1949|18,00|50,00|50,00|9,00|0|0|0|0||\n\
             |C190|000|5101|18,00|1000,00|1000,00|180,00|0|0|0|0||\n",
        )
    }

    fn cfop(s: &str) -> Cfop {
        s.parse().unwrap()
    }

    #[test]
    fn detect_aggregates_across_record_types() {
        let pending = detect_pending(&records(), &GenericCodeConfiguration::new());
        assert_eq!(pending.len(), 2);

        assert_eq!(pending[0].cfop, cfop("1949"));
        assert_eq!(pending[0].direction, Direction::Entrada);

        let saida = &pending[1];
        assert_eq!(saida.cfop, cfop("5949"));
        assert_eq!(saida.direction, Direction::Saida);
        assert_eq!(saida.operation_amount, dec!(300));
        assert_eq!(saida.icms, dec!(54));
        assert_eq!(saida.occurrences, 2);
        assert!(!saida.description.is_empty());
    }

    #[test]
    fn zero_amount_lines_are_not_pending() {
        let set = RecordSet::parse(
            "|C190|000|5949|18,00|0,00|0,00|0,00|0|0|0|0||\n\
             |C190|000|6949|12,00|100,00|100,00|12,00|0|0|0|0||\n",
        );
        let pending = detect_pending(&set, &GenericCodeConfiguration::new());
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].cfop, cfop("6949"));
        assert_eq!(pending[0].occurrences, 1);
    }

    #[test]
    fn configured_cfops_are_not_pending() {
        let config: GenericCodeConfiguration =
            [(cfop("5949"), ResolutionChoice::Incentivized)].into_iter().collect();
        let pending = detect_pending(&records(), &config);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].cfop, cfop("1949"));
    }

    #[test]
    fn apply_normative_resolves_everything() {
        let set = records();
        let mut config = GenericCodeConfiguration::new();
        let pending = detect_pending(&set, &config);
        config.apply_normative(&pending);

        assert_eq!(config.get(&cfop("5949")), Some(ResolutionChoice::Default));
        assert!(detect_pending(&set, &config).is_empty());
    }

    #[test]
    fn apply_map_defaults_unmentioned() {
        let set = records();
        let mut config = GenericCodeConfiguration::new();
        let pending = detect_pending(&set, &config);
        let choices = BTreeMap::from([(cfop("5949"), ResolutionChoice::NotIncentivized)]);
        config.apply_map(&pending, &choices);

        assert_eq!(config.get(&cfop("5949")), Some(ResolutionChoice::NotIncentivized));
        assert_eq!(config.get(&cfop("1949")), Some(ResolutionChoice::Default));
        assert!(detect_pending(&set, &config).is_empty());
    }

    #[test]
    fn configuration_json_uses_cfop_keys() {
        let config: GenericCodeConfiguration =
            [(cfop("5949"), ResolutionChoice::Incentivized)].into_iter().collect();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"5949":"incentivized"}"#);
    }
}
