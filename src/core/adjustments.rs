//! Classification of adjustment codes (E111, C197, D197).
//!
//! Adjustment codes are `UF` + one digit for the assessment section + one digit
//! for the nature of the adjustment + four digits of sequence, e.g. `GO020159`.
//! The nature digit (4th character) decides whether the entry is a credit, a
//! debit, a deduction or informational.

use crate::core::corrections::{AdjustmentRef, CorrectionAction, Corrections};
use crate::core::layout::{adjustment_fields, DOCUMENT_ADJUSTMENT_TYPES, PERIOD_ADJUSTMENT_TYPE};
use crate::core::record::RecordSet;
use crate::core::warnings::Warning;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Debits on per-document records with this prefix are already part of the
/// period assessment and would be counted twice.
pub const SPECIAL_DEBIT_PREFIX: &str = "GO7";

/// Nature of an adjustment, from the 4th character of its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AdjustmentCategory {
    OtherDebits,
    CreditReversal,
    OtherCredits,
    DebitReversal,
    Deduction,
    SpecialDebit,
    Control,
    Indeterminate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AdjustmentKind {
    Credit,
    Debit,
    Deduction,
    Control,
    Indeterminate,
}

impl AdjustmentCategory {
    pub fn from_code(code: &str) -> Self {
        if !is_valid_code(code) {
            return AdjustmentCategory::Indeterminate;
        }
        match code.as_bytes()[3] {
            b'0' => AdjustmentCategory::OtherDebits,
            b'1' => AdjustmentCategory::CreditReversal,
            b'2' => AdjustmentCategory::OtherCredits,
            b'3' => AdjustmentCategory::DebitReversal,
            b'4' => AdjustmentCategory::Deduction,
            b'5' => AdjustmentCategory::SpecialDebit,
            b'9' => AdjustmentCategory::Control,
            _ => AdjustmentCategory::Indeterminate,
        }
    }

    pub fn kind(&self) -> AdjustmentKind {
        match self {
            AdjustmentCategory::OtherDebits
            | AdjustmentCategory::CreditReversal
            | AdjustmentCategory::SpecialDebit => AdjustmentKind::Debit,
            AdjustmentCategory::OtherCredits | AdjustmentCategory::DebitReversal => AdjustmentKind::Credit,
            AdjustmentCategory::Deduction => AdjustmentKind::Deduction,
            AdjustmentCategory::Control => AdjustmentKind::Control,
            AdjustmentCategory::Indeterminate => AdjustmentKind::Indeterminate,
        }
    }
}

/// Two ASCII letters followed by six digits.
pub fn is_valid_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 8
        && bytes[..2].iter().all(u8::is_ascii_alphabetic)
        && bytes[2..].iter().all(u8::is_ascii_digit)
}

/// Why an adjustment record was left out of the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ExclusionReason {
    /// Credit granted by the program being calculated.
    OwnProgramCredit,
    /// Credit granted by the other program; never cumulative.
    SiblingProgramCredit,
    /// `GO7` debit on a per-document record.
    SpecialDebitExcluded,
    /// Excluded by a taxpayer correction.
    UserExcluded,
}

impl ExclusionReason {
    pub fn tag(&self) -> &'static str {
        match self {
            ExclusionReason::OwnProgramCredit => "own-program-credit",
            ExclusionReason::SiblingProgramCredit => "sibling-program-credit",
            ExclusionReason::SpecialDebitExcluded => "special-debit-excluded",
            ExclusionReason::UserExcluded => "user-excluded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdjustmentEntry {
    pub source: AdjustmentRef,
    pub line: usize,
    pub code: String,
    /// Code as filed, when a correction replaced it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_code: Option<String>,
    pub category: AdjustmentCategory,
    pub kind: AdjustmentKind,
    /// Always positive.
    pub amount: Decimal,
    pub incentivized: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Exclusion {
    pub source: AdjustmentRef,
    pub line: usize,
    pub code: String,
    pub amount: Decimal,
    pub reason: ExclusionReason,
}

/// Code tables of one incentive program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdjustmentTables {
    /// Codes whose amounts belong to incentivized operations.
    pub incentivized: &'static [&'static str],
    /// Credits granted by the program itself.
    pub own_credits: &'static [&'static str],
    /// Credits granted by programs that cannot be combined with this one.
    pub sibling_credits: &'static [&'static str],
}

impl AdjustmentTables {
    fn exclusion_for(&self, code: &str) -> Option<ExclusionReason> {
        if self.own_credits.contains(&code) {
            Some(ExclusionReason::OwnProgramCredit)
        } else if self.sibling_credits.contains(&code) {
            Some(ExclusionReason::SiblingProgramCredit)
        } else {
            None
        }
    }
}

/// Credit and debit totals from classified adjustments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdjustmentTotals {
    pub credits_incentivized: Decimal,
    pub credits_not_incentivized: Decimal,
    pub debits_incentivized: Decimal,
    pub debits_not_incentivized: Decimal,
    pub deductions: Decimal,
}

impl AdjustmentTotals {
    pub fn credits(&self) -> Decimal {
        self.credits_incentivized + self.credits_not_incentivized
    }

    pub fn debits(&self) -> Decimal {
        self.debits_incentivized + self.debits_not_incentivized
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdjustmentReport {
    pub entries: Vec<AdjustmentEntry>,
    pub exclusions: Vec<Exclusion>,
    pub totals: AdjustmentTotals,
    pub warnings: Vec<Warning>,
}

/// Classify every E111, C197 and D197 record.
///
/// Corrections apply first, then program credit exclusions, then the `GO7`
/// rule for per-document records. Only what survives is classified by kind;
/// indeterminate codes are kept in the entries but never reach the totals.
pub fn resolve_adjustments(
    records: &RecordSet,
    tables: &AdjustmentTables,
    corrections: &Corrections,
) -> AdjustmentReport {
    let mut report = AdjustmentReport::default();

    let record_types = std::iter::once(PERIOD_ADJUSTMENT_TYPE).chain(DOCUMENT_ADJUSTMENT_TYPES.iter().copied());
    for record_type in record_types {
        for (index, record) in records.records(record_type).iter().enumerate() {
            let Some((filed_code, description, amount)) = adjustment_fields(record) else {
                continue;
            };
            if filed_code.is_empty() || amount.is_zero() {
                continue;
            }
            let amount = amount.abs();
            let source = AdjustmentRef::new(record_type, index);

            let (code, original_code) = match corrections.get(&source) {
                Some(CorrectionAction::Exclude) => {
                    log::info!("{} excluded by correction: {} = {}", source, filed_code, amount);
                    report.exclusions.push(Exclusion {
                        source,
                        line: record.line,
                        code: filed_code,
                        amount,
                        reason: ExclusionReason::UserExcluded,
                    });
                    continue;
                }
                Some(CorrectionAction::Replace(new_code)) => {
                    log::debug!("{} code replaced: {} -> {}", source, filed_code, new_code);
                    (new_code.trim().to_string(), Some(filed_code))
                }
                _ => (filed_code, None),
            };

            let exclusion = tables.exclusion_for(&code).or_else(|| {
                (source.is_document_level() && code.starts_with(SPECIAL_DEBIT_PREFIX))
                    .then_some(ExclusionReason::SpecialDebitExcluded)
            });
            if let Some(reason) = exclusion {
                log::warn!("{} excluded ({}): {} = {}", source, reason.tag(), code, amount);
                report.exclusions.push(Exclusion {
                    source,
                    line: record.line,
                    code,
                    amount,
                    reason,
                });
                continue;
            }

            let category = AdjustmentCategory::from_code(&code);
            let kind = category.kind();
            let incentivized = tables.incentivized.contains(&code.as_str());

            match (kind, incentivized) {
                (AdjustmentKind::Credit, true) => report.totals.credits_incentivized += amount,
                (AdjustmentKind::Credit, false) => report.totals.credits_not_incentivized += amount,
                (AdjustmentKind::Debit, true) => report.totals.debits_incentivized += amount,
                (AdjustmentKind::Debit, false) => report.totals.debits_not_incentivized += amount,
                (AdjustmentKind::Deduction, _) => report.totals.deductions += amount,
                (AdjustmentKind::Control, _) => {}
                (AdjustmentKind::Indeterminate, _) => {
                    log::warn!("{} line {}: indeterminate adjustment code '{}'", record_type, record.line, code);
                    report.warnings.push(Warning::IndeterminateAdjustmentCode {
                        record_type: record_type.to_string(),
                        line: record.line,
                        code: code.clone(),
                    });
                }
            }

            report.entries.push(AdjustmentEntry {
                source,
                line: record.line,
                code,
                original_code,
                category,
                kind,
                amount,
                incentivized,
                description,
            });
        }
    }

    log::info!(
        "Resolved {} adjustments, {} excluded",
        report.entries.len(),
        report.exclusions.len()
    );
    report
}

/// Adjustment codes tied to incentivized operations, common to every program.
pub const INCENTIVIZED_CODES: &[&str] = &[
    "GO030003", //
    "GO020159", "GO020007", "GO020160", "GO020162", "GO020014", "GO020021", "GO020023",
    "GO020025", "GO020026", "GO020027", "GO020029", "GO020030", "GO020031", "GO020033",
    "GO020034", "GO020035", "GO020036", "GO020039", "GO020041", "GO020048", "GO020050",
    "GO020051", "GO020052", "GO020059", "GO020063", "GO020069", "GO020070", "GO020072",
    "GO020079", "GO020081", "GO020093", "GO020102", "GO020103", "GO020104", "GO020105",
    "GO020107", "GO020110", "GO020111", "GO020114", "GO020122", "GO020124", "GO020125",
    "GO020128", "GO020129", "GO020133", "GO020142", "GO020151", "GO020152", "GO020153",
    "GO020155", "GO020156", "GO020157", //
    "GO010016", "GO010017", "GO010068", "GO010063", "GO010064", "GO010026", "GO010028",
    "GO010034", "GO010036", "GO010065", "GO010066", "GO010067", "GO010047", "GO010053",
    "GO010054", "GO010055", "GO010060", "GO010061",
];

/// Financing credits of FOMENTAR, PRODUZIR and MICROPRODUZIR.
pub const FOMENTAR_CREDIT_CODES: &[&str] = &[
    "GO040007", "GO040008", "GO040009", "GO040010", "GO040011", "GO040012", "GO040137",
];

/// Granted credit of ProGoiás.
pub const PROGOIAS_CREDIT_CODES: &[&str] = &["GO020158"];
