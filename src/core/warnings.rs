use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Data anomalies found while classifying a period. None of these stop a
/// calculation; the offending record is left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// CFOP field is not four digits starting with 1-7.
    MalformedCfop {
        record_type: String,
        line: usize,
        cfop: String,
    },
    /// CFOP is well formed but its leading digit has no direction (4xxx).
    UnknownCfopDirection {
        record_type: String,
        line: usize,
        cfop: String,
    },
    /// Adjustment code is not two letters followed by six digits, or its kind
    /// digit is unassigned. The entry contributes nothing.
    IndeterminateAdjustmentCode {
        record_type: String,
        line: usize,
        code: String,
    },
}

impl Warning {
    pub fn message(&self) -> String {
        match self {
            Warning::MalformedCfop {
                record_type,
                line,
                cfop,
            } => format!("{} line {}: malformed CFOP '{}' skipped", record_type, line, cfop),
            Warning::UnknownCfopDirection {
                record_type,
                line,
                cfop,
            } => format!(
                "{} line {}: CFOP {} has no entrada/saida direction, skipped",
                record_type, line, cfop
            ),
            Warning::IndeterminateAdjustmentCode {
                record_type,
                line,
                code,
            } => format!(
                "{} line {}: adjustment code '{}' is indeterminate and ignored",
                record_type, line, code
            ),
        }
    }
}
