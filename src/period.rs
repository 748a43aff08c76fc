//! Periods and multi-period processing with credit carry-forward.

use crate::core::{Corrections, GenericCodeConfiguration, Header, RecordSet};
use crate::tax::{CalculationError, CalculationResult, IncentiveEngine};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid period label '{0}': expected MM/YYYY or YYYY-MM")]
pub struct PeriodLabelError(pub String);

/// Parse a period label into (year, month). Accepts `MM/YYYY` and `YYYY-MM`.
pub fn parse_period_label(label: &str) -> Result<(i32, u32), PeriodLabelError> {
    let err = || PeriodLabelError(label.to_string());
    let label = label.trim();
    let (year, month) = if let Some((month, year)) = label.split_once('/') {
        (year, month)
    } else if let Some((year, month)) = label.split_once('-') {
        (year, month)
    } else {
        return Err(err());
    };
    let year: i32 = year.parse().map_err(|_| err())?;
    let month: u32 = month.parse().map_err(|_| err())?;
    if !(1..=12).contains(&month) || year.to_string().len() != 4 {
        return Err(err());
    }
    Ok((year, month))
}

/// Everything known about one period's file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodContext {
    pub label: String,
    pub header: Option<Header>,
    #[serde(skip)]
    pub records: RecordSet,
    pub generic_cfops: GenericCodeConfiguration,
    pub corrections: Corrections,
    pub carried_forward: Decimal,
    pub result: Option<CalculationResult>,
    /// SHA-256 of the source text.
    pub source_digest: String,
}

impl PeriodContext {
    /// Parse a decoded SPED file. The label comes from the 0000 record, or is
    /// empty when the file has none.
    pub fn from_text(text: &str) -> Self {
        let records = RecordSet::parse(text);
        let header = Header::extract(&records);
        let label = header
            .as_ref()
            .and_then(Header::period_label)
            .unwrap_or_default();
        if label.is_empty() {
            log::warn!("No period found in record 0000");
        }
        PeriodContext {
            label,
            header,
            records,
            generic_cfops: GenericCodeConfiguration::new(),
            corrections: Corrections::new(),
            carried_forward: Decimal::ZERO,
            result: None,
            source_digest: hex::encode(Sha256::digest(text.as_bytes())),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn year_month(&self) -> Option<(i32, u32)> {
        parse_period_label(&self.label).ok()
    }

    /// Calculate this period alone with its own carried-forward balance.
    pub fn calculate(&mut self, engine: &IncentiveEngine) -> Result<&CalculationResult, CalculationError> {
        let result = engine.calculate(
            &self.label,
            &self.records,
            &self.generic_cfops,
            &self.corrections,
            self.carried_forward,
        )?;
        Ok(self.result.insert(result))
    }
}

/// Periods in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MultiPeriodSequence {
    periods: Vec<PeriodContext>,
}

impl MultiPeriodSequence {
    /// Order by (year, month). Periods whose label does not parse go last;
    /// ties keep their input order.
    pub fn new(mut periods: Vec<PeriodContext>) -> Self {
        for period in periods.iter().filter(|p| p.year_month().is_none()) {
            log::warn!("Period label '{}' not recognised, placing it last", period.label);
        }
        periods.sort_by_key(|p| match p.year_month() {
            Some(ym) => (false, ym),
            None => (true, (0, 0)),
        });
        Self { periods }
    }

    pub fn periods(&self) -> &[PeriodContext] {
        &self.periods
    }

    pub fn into_periods(self) -> Vec<PeriodContext> {
        self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Labels of periods whose source text is identical to an earlier one.
    pub fn duplicate_sources(&self) -> Vec<(String, String)> {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        let mut duplicates = Vec::new();
        for period in &self.periods {
            match seen.get(period.source_digest.as_str()) {
                Some(first) => duplicates.push((first.to_string(), period.label.clone())),
                None => {
                    seen.insert(&period.source_digest, &period.label);
                }
            }
        }
        duplicates
    }

    /// Calculate every period in order. Period 0 starts from `initial_credit`;
    /// each later period starts from the previous period's remaining credit.
    ///
    /// A configuration error stops the run; periods already calculated keep
    /// their results.
    pub fn process(&mut self, engine: &IncentiveEngine, initial_credit: Decimal) -> Result<(), CalculationError> {
        let mut carried_forward = initial_credit;
        for (index, period) in self.periods.iter_mut().enumerate() {
            let period_engine = engine.for_period_index(index)?;
            period.carried_forward = carried_forward;
            carried_forward = period.calculate(&period_engine)?.remaining_credit;
            log::debug!(
                "Period {} carries {:.2} into the next period",
                period.label,
                carried_forward
            );
        }
        Ok(())
    }

    pub fn results(&self) -> impl Iterator<Item = &CalculationResult> {
        self.periods.iter().filter_map(|p| p.result.as_ref())
    }

    /// Sums over all calculated periods.
    pub fn totals(&self) -> SequenceTotals {
        let mut totals = SequenceTotals::default();
        for result in self.results() {
            totals.periods += 1;
            totals.total_due += result.summary.total_due;
            totals.benefit_value += result.summary.benefit_value;
            totals.economy += result.summary.economy;
            totals.final_remaining_credit = result.remaining_credit;
        }
        totals
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SequenceTotals {
    pub periods: usize,
    pub total_due: Decimal,
    pub benefit_value: Decimal,
    pub economy: Decimal,
    pub final_remaining_credit: Decimal,
}
