//! Reading raw SPED text into record groups.
//!
//! A SPED EFD line looks like `|C190|000|5101|18,00|1000,00|...|`: a type code
//! followed by the fields of that type's fixed layout, all pipe delimited.

use crate::core::layout::LayoutField;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use rust_decimal_macros::dec;
use std::str::FromStr;

/// Largest magnitude a SPED monetary field can hold (17 integer digits).
pub const MAX_AMOUNT: Decimal = dec!(99999999999999999.99);

/// One parsed line of a SPED file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FiscalRecord {
    pub record_type: String,
    /// Field values in layout order. Index 0 is the type code itself, matching
    /// the leading `REG` entry of every layout.
    pub fields: Vec<String>,
    /// 1-based line number in the source text
    pub line: usize,
}

impl FiscalRecord {
    pub fn new(line: usize, fields: Vec<String>) -> Self {
        let record_type = fields.first().cloned().unwrap_or_default();
        Self {
            record_type,
            fields,
            line,
        }
    }

    /// Value of the named field, or "" when the layout has no such field or the
    /// line was short.
    pub fn field(&self, layout: &[LayoutField], name: &str) -> &str {
        layout
            .iter()
            .position(|f| f.name == name)
            .and_then(|idx| self.fields.get(idx))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    /// Numeric value of the named field (see [`parse_amount`]).
    pub fn amount(&self, layout: &[LayoutField], name: &str) -> Decimal {
        parse_amount(self.field(layout, name))
    }
}

/// All records of one file, grouped by type code in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordSet {
    groups: BTreeMap<String, Vec<FiscalRecord>>,
}

impl RecordSet {
    /// Parse decoded SPED text. Lines that are not well-formed records are
    /// skipped; empty input gives an empty set.
    pub fn parse(text: &str) -> Self {
        let mut groups: BTreeMap<String, Vec<FiscalRecord>> = BTreeMap::new();
        let mut skipped = 0usize;

        for (idx, raw) in text.split('\n').enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            match split_line(line) {
                Some(fields) => {
                    let record = FiscalRecord::new(idx + 1, fields);
                    groups
                        .entry(record.record_type.clone())
                        .or_default()
                        .push(record);
                }
                None => {
                    log::debug!("Skipping malformed line {}: {:?}", idx + 1, line);
                    skipped += 1;
                }
            }
        }

        let set = RecordSet { groups };
        log::info!(
            "Parsed {} records across {} types ({} lines skipped)",
            set.len(),
            set.groups.len(),
            skipped
        );
        set
    }

    /// Records of the given type, in file order.
    pub fn records(&self, record_type: &str) -> &[FiscalRecord] {
        self.groups
            .get(record_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains(&self, record_type: &str) -> bool {
        !self.records(record_type).is_empty()
    }

    /// Record type codes present, sorted.
    pub fn record_types(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn count(&self, record_type: &str) -> usize {
        self.records(record_type).len()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl FromIterator<FiscalRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = FiscalRecord>>(iter: I) -> Self {
        let mut groups: BTreeMap<String, Vec<FiscalRecord>> = BTreeMap::new();
        for record in iter {
            groups
                .entry(record.record_type.clone())
                .or_default()
                .push(record);
        }
        RecordSet { groups }
    }
}

/// Split a trimmed line into its fields, dropping the empty boundary entries.
/// Returns `None` unless the line is `|TYPE|...|` with a valid type code.
fn split_line(line: &str) -> Option<Vec<String>> {
    if !line.starts_with('|') || !line.ends_with('|') {
        return None;
    }
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 3 {
        return None;
    }
    let inner = &parts[1..parts.len() - 1];
    let record_type = inner.first()?;
    if !is_record_type(record_type) {
        return None;
    }
    Some(inner.iter().map(|s| s.to_string()).collect())
}

/// An optional leading upper-case letter or digit, then 3 or 4 digits
/// (`0000`, `C190`, `9900`, `E111`).
fn is_record_type(code: &str) -> bool {
    let bytes = code.as_bytes();
    let digits = match bytes.first() {
        Some(b) if b.is_ascii_uppercase() => &bytes[1..],
        Some(b) if bytes.len() == 5 && b.is_ascii_digit() => &bytes[1..],
        _ => bytes,
    };
    (3..=4).contains(&digits.len()) && digits.iter().all(u8::is_ascii_digit)
}

/// Parse a SPED amount. SPED writes `1234,56`; when a comma is present any dots
/// are thousands separators. Empty or invalid input reads as zero, and so does
/// anything wider than [`MAX_AMOUNT`].
pub fn parse_amount(raw: &str) -> Decimal {
    let raw = raw.trim();
    if raw.is_empty() {
        return Decimal::ZERO;
    }
    let normalized = if raw.contains(',') {
        raw.replace('.', "").replace(',', ".")
    } else {
        raw.to_string()
    };
    match Decimal::from_str(&normalized) {
        Ok(value) if value.abs() <= MAX_AMOUNT => value,
        _ => {
            log::debug!("Invalid amount {:?}, reading as zero", raw);
            Decimal::ZERO
        }
    }
}
