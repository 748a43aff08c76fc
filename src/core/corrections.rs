//! Taxpayer corrections to adjustment records before classification.

use crate::core::layout::{adjustment_fields, DOCUMENT_ADJUSTMENT_TYPES, PERIOD_ADJUSTMENT_TYPE};
use crate::core::record::RecordSet;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Position of an adjustment record: its type and index within that type's group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdjustmentRef {
    pub record_type: String,
    pub index: usize,
}

impl AdjustmentRef {
    pub fn new(record_type: &str, index: usize) -> Self {
        Self {
            record_type: record_type.to_string(),
            index,
        }
    }

    pub fn is_document_level(&self) -> bool {
        DOCUMENT_ADJUSTMENT_TYPES.contains(&self.record_type.as_str())
    }
}

impl fmt::Display for AdjustmentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.record_type, self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid adjustment reference '{0}': expected TYPE:INDEX, e.g. E111:0")]
pub struct InvalidAdjustmentRef(String);

impl FromStr for AdjustmentRef {
    type Err = InvalidAdjustmentRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (record_type, index) = s
            .split_once(':')
            .ok_or_else(|| InvalidAdjustmentRef(s.to_string()))?;
        let index = index
            .parse::<usize>()
            .map_err(|_| InvalidAdjustmentRef(s.to_string()))?;
        Ok(AdjustmentRef::new(record_type, index))
    }
}

// Serialized as "TYPE:INDEX" so it can key a JSON object.
impl Serialize for AdjustmentRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AdjustmentRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for AdjustmentRef {
    fn schema_name() -> String {
        "AdjustmentRef".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// What to do with one adjustment record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionAction {
    /// Use the record as filed.
    #[default]
    Keep,
    /// Leave the record out of the calculation.
    Exclude,
    /// Classify the record under a different adjustment code.
    Replace(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Corrections(BTreeMap<AdjustmentRef, CorrectionAction>);

impl Corrections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &AdjustmentRef) -> Option<&CorrectionAction> {
        self.0.get(reference)
    }

    pub fn set(&mut self, reference: AdjustmentRef, action: CorrectionAction) {
        self.0.insert(reference, action);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record `Keep` for every pending item without a decision.
    pub fn keep_all(&mut self, pending: &[PendingAdjustment]) {
        for item in pending {
            self.0
                .entry(item.reference.clone())
                .or_insert(CorrectionAction::Keep);
        }
    }

    /// Apply explicit decisions; pending items not mentioned are kept as filed.
    pub fn apply_map(&mut self, pending: &[PendingAdjustment], actions: &BTreeMap<AdjustmentRef, CorrectionAction>) {
        for (reference, action) in actions {
            self.0.insert(reference.clone(), action.clone());
        }
        self.keep_all(pending);
    }
}

impl FromIterator<(AdjustmentRef, CorrectionAction)> for Corrections {
    fn from_iter<I: IntoIterator<Item = (AdjustmentRef, CorrectionAction)>>(iter: I) -> Self {
        Corrections(iter.into_iter().collect())
    }
}

/// Which adjustment records a pending query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentScope {
    /// C197 and D197
    Document,
    /// E111
    Period,
}

impl AdjustmentScope {
    pub fn record_types(&self) -> &'static [&'static str] {
        match self {
            AdjustmentScope::Document => DOCUMENT_ADJUSTMENT_TYPES,
            AdjustmentScope::Period => &[PERIOD_ADJUSTMENT_TYPE],
        }
    }
}

/// An adjustment record still waiting for a correction decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAdjustment {
    pub reference: AdjustmentRef,
    pub code: String,
    pub description: Option<String>,
    pub amount: Decimal,
}

/// Coded, nonzero adjustment records in scope with no recorded correction.
pub fn detect_pending_adjustments(
    records: &RecordSet,
    scope: AdjustmentScope,
    corrections: &Corrections,
) -> Vec<PendingAdjustment> {
    let mut pending = Vec::new();
    for record_type in scope.record_types() {
        for (index, record) in records.records(record_type).iter().enumerate() {
            let Some((code, description, amount)) = adjustment_fields(record) else {
                continue;
            };
            if code.is_empty() || amount.is_zero() {
                continue;
            }
            let reference = AdjustmentRef::new(record_type, index);
            if corrections.get(&reference).is_some() {
                continue;
            }
            pending.push(PendingAdjustment {
                reference,
                code,
                description,
                amount: amount.abs(),
            });
        }
    }
    pending
}
