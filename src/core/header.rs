//! File header (record 0000) and structural checks.

use crate::core::layout::{OpeningRecord, SpedRecord, CONSOLIDATED_TYPES};
use crate::core::record::RecordSet;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Company and period metadata from the opening record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub company_name: String,
    pub cnpj: Option<String>,
    pub uf: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
}

impl Header {
    /// Read the first 0000 record, if any.
    pub fn extract(records: &RecordSet) -> Option<Header> {
        let opening = OpeningRecord::from_record(records.records("0000").first()?);
        Some(Header {
            company_name: opening.nome,
            cnpj: opening.cnpj,
            uf: opening.uf,
            period_start: parse_sped_date(&opening.dt_ini),
            period_end: parse_sped_date(&opening.dt_fin),
        })
    }

    /// Period as `MM/YYYY`, from the start date.
    pub fn period_label(&self) -> Option<String> {
        self.period_start
            .map(|d| format!("{:02}/{}", d.month(), d.year()))
    }
}

/// SPED dates are DDMMYYYY.
pub fn parse_sped_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d%m%Y").ok()
}

/// Result of the structural checks on one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Block letters/digits present (first character of each type code).
    pub blocks: BTreeSet<char>,
    pub record_counts: BTreeMap<String, usize>,
    pub has_operations: bool,
}

/// Check that the file has the records a calculation relies on. Only a missing
/// opening record is an error.
pub fn validate_structure(records: &RecordSet) -> StructureReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !records.contains("0000") {
        errors.push("Opening record 0000 not found".to_string());
    }
    for (record_type, name) in [
        ("9900", "block 9 record count"),
        ("9990", "block 9 closing"),
        ("9999", "file closing"),
    ] {
        if !records.contains(record_type) {
            warnings.push(format!("Record {} ({}) not found", record_type, name));
        }
    }

    let has_operations = CONSOLIDATED_TYPES.iter().any(|t| records.contains(t));
    if !has_operations {
        warnings.push(format!(
            "No consolidated operation records found ({})",
            CONSOLIDATED_TYPES.join(", ")
        ));
    }

    if let Some(header) = Header::extract(records) {
        if let Some(cnpj) = header.cnpj.as_ref().filter(|c| c.len() != 14) {
            warnings.push(format!("CNPJ '{}' does not have 14 digits", cnpj));
        }
        if header.period_start.is_none() {
            warnings.push("Record 0000 has an invalid DT_INI".to_string());
        }
    }

    let blocks = records
        .record_types()
        .filter_map(|t| t.chars().next())
        .collect();
    let record_counts = records
        .record_types()
        .map(|t| (t.to_string(), records.count(t)))
        .collect();

    for error in &errors {
        log::error!("SPED structure: {}", error);
    }
    for warning in &warnings {
        log::warn!("SPED structure: {}", warning);
    }

    StructureReport {
        valid: errors.is_empty(),
        errors,
        warnings,
        blocks,
        record_counts,
        has_operations,
    }
}
