//! Fixed record layouts, generated from the typed record structs below.

use crate::core::record::{parse_amount, FiscalRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use spedc_derive::SpedRecord;

/// One field of a record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

/// A typed view over one or more record types sharing a layout.
pub trait SpedRecord: Sized {
    const RECORD_TYPES: &'static [&'static str];

    fn layout() -> &'static [LayoutField];

    fn from_record(record: &FiscalRecord) -> Self;
}

/// Conversion from a raw field string into a struct field.
pub trait FieldValue {
    fn from_field(raw: &str) -> Self;
}

impl FieldValue for String {
    fn from_field(raw: &str) -> Self {
        raw.to_string()
    }
}

impl FieldValue for Decimal {
    fn from_field(raw: &str) -> Self {
        parse_amount(raw)
    }
}

impl FieldValue for Option<String> {
    fn from_field(raw: &str) -> Self {
        (!raw.is_empty()).then(|| raw.to_string())
    }
}

impl FieldValue for Option<Decimal> {
    fn from_field(raw: &str) -> Self {
        (!raw.is_empty()).then(|| parse_amount(raw))
    }
}

/// Opening record of the file (block 0).
#[derive(Debug, Clone, SpedRecord)]
#[sped(reg = "0000")]
pub struct OpeningRecord {
    /// Layout version
    pub cod_ver: String,
    /// Purpose of the file (0 original, 1 rectifying)
    pub cod_fin: String,
    /// Period start (DDMMYYYY)
    pub dt_ini: String,
    /// Period end (DDMMYYYY)
    pub dt_fin: String,
    /// Company name
    pub nome: String,
    /// Company CNPJ
    pub cnpj: Option<String>,
    /// Taxpayer CPF
    pub cpf: Option<String>,
    /// State
    pub uf: String,
    /// State registration
    pub ie: String,
    /// Municipality code (IBGE)
    pub cod_mun: String,
    /// Municipal registration
    pub im: Option<String>,
    /// SUFRAMA registration
    pub suframa: Option<String>,
    /// Profile (A, B or C)
    pub ind_perfil: String,
    /// Activity indicator
    pub ind_ativ: String,
}

/// Consolidated operations per CST/CFOP/rate (block C, goods).
#[derive(Debug, Clone, SpedRecord)]
#[sped(reg = "C190")]
pub struct GoodsSummary {
    /// ICMS tax situation code
    pub cst_icms: String,
    /// Fiscal operation code
    pub cfop: String,
    /// ICMS rate
    pub aliq_icms: Decimal,
    /// Operation amount
    pub vl_opr: Decimal,
    /// ICMS base
    pub vl_bc_icms: Decimal,
    /// ICMS amount
    pub vl_icms: Decimal,
    /// ICMS-ST base
    pub vl_bc_icms_st: Decimal,
    /// ICMS-ST amount
    pub vl_icms_st: Decimal,
    /// Base reduction
    pub vl_red_bc: Decimal,
    /// IPI amount
    pub vl_ipi: Decimal,
    /// Observation code
    pub cod_obs: Option<String>,
}

/// Consolidated operations for energy, water, gas (C590) and communication
/// services (D590).
#[derive(Debug, Clone, SpedRecord)]
#[sped(reg = "C590", reg = "D590")]
pub struct UtilitySummary {
    /// ICMS tax situation code
    pub cst_icms: String,
    /// Fiscal operation code
    pub cfop: String,
    /// ICMS rate
    pub aliq_icms: Decimal,
    /// Operation amount
    pub vl_opr: Decimal,
    /// ICMS base
    pub vl_bc_icms: Decimal,
    /// ICMS amount
    pub vl_icms: Decimal,
    /// ICMS-ST base
    pub vl_bc_icms_st: Decimal,
    /// ICMS-ST amount
    pub vl_icms_st: Decimal,
    /// Base reduction
    pub vl_red_bc: Decimal,
    /// Observation code
    pub cod_obs: Option<String>,
}

/// Consolidated transport operations (block D).
#[derive(Debug, Clone, SpedRecord)]
#[sped(reg = "D190")]
pub struct TransportSummary {
    /// ICMS tax situation code
    pub cst_icms: String,
    /// Fiscal operation code
    pub cfop: String,
    /// ICMS rate
    pub aliq_icms: Decimal,
    /// Operation amount
    pub vl_opr: Decimal,
    /// ICMS base
    pub vl_bc_icms: Decimal,
    /// ICMS amount
    pub vl_icms: Decimal,
    /// Base reduction
    pub vl_red_bc: Decimal,
    /// Observation code
    pub cod_obs: Option<String>,
}

/// Period-level adjustment of the ICMS assessment (E111).
#[derive(Debug, Clone, SpedRecord)]
#[sped(reg = "E111")]
pub struct PeriodAdjustment {
    /// Adjustment code
    pub cod_aj_apur: String,
    /// Complementary description
    pub descr_compl_aj: Option<String>,
    /// Adjustment amount
    pub vl_aj_apur: Decimal,
}

/// Per-document adjustment (C197, D197).
#[derive(Debug, Clone, SpedRecord)]
#[sped(reg = "C197", reg = "D197")]
pub struct DocumentAdjustment {
    /// Adjustment code
    pub cod_aj: String,
    /// Complementary description
    pub descr_compl_aj: Option<String>,
    /// Item code
    pub cod_item: Option<String>,
    /// ICMS base
    pub vl_bc_icms: Decimal,
    /// ICMS rate
    pub aliq_icms: Decimal,
    /// ICMS amount
    pub vl_icms: Decimal,
    /// Other amounts
    pub vl_outros: Decimal,
}

/// Additional information declared with the period's assessment (E115).
#[derive(Debug, Clone, SpedRecord)]
#[sped(reg = "E115")]
pub struct AssessmentInformation {
    /// Additional information code
    pub cod_inf_adic: String,
    /// Informed value
    pub vl_inf_adic: Decimal,
    /// Complementary description
    pub descr_compl_aj: Option<String>,
}

/// Fields the classifier needs from any consolidated operation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedLine {
    pub cfop: String,
    pub operation_amount: Decimal,
    pub icms: Decimal,
}

/// Record types carrying consolidated operations.
pub const CONSOLIDATED_TYPES: &[&str] = &["C190", "C590", "D190", "D590"];

/// Record types carrying per-document adjustments.
pub const DOCUMENT_ADJUSTMENT_TYPES: &[&str] = &["C197", "D197"];

pub const PERIOD_ADJUSTMENT_TYPE: &str = "E111";

pub const DECLARATION_TYPE: &str = "E115";

impl ConsolidatedLine {
    /// Read a consolidated record through its own layout. `None` for other
    /// record types.
    pub fn from_record(record: &FiscalRecord) -> Option<Self> {
        let line = match record.record_type.as_str() {
            "C190" => {
                let r = GoodsSummary::from_record(record);
                (r.cfop, r.vl_opr, r.vl_icms)
            }
            "C590" | "D590" => {
                let r = UtilitySummary::from_record(record);
                (r.cfop, r.vl_opr, r.vl_icms)
            }
            "D190" => {
                let r = TransportSummary::from_record(record);
                (r.cfop, r.vl_opr, r.vl_icms)
            }
            _ => return None,
        };
        Some(ConsolidatedLine {
            cfop: line.0,
            operation_amount: line.1,
            icms: line.2,
        })
    }
}

/// Code, description and amount of an adjustment record, whichever layout it
/// uses. `None` for other record types.
pub fn adjustment_fields(record: &FiscalRecord) -> Option<(String, Option<String>, Decimal)> {
    match record.record_type.as_str() {
        "E111" => {
            let r = PeriodAdjustment::from_record(record);
            Some((r.cod_aj_apur, r.descr_compl_aj, r.vl_aj_apur))
        }
        "C197" | "D197" => {
            let r = DocumentAdjustment::from_record(record);
            Some((r.cod_aj, r.descr_compl_aj, r.vl_icms))
        }
        _ => None,
    }
}

/// Layout of a known record type.
pub fn layout_for(record_type: &str) -> Option<&'static [LayoutField]> {
    let layouts: [(&[&str], fn() -> &'static [LayoutField]); 7] = [
        (OpeningRecord::RECORD_TYPES, OpeningRecord::layout),
        (GoodsSummary::RECORD_TYPES, GoodsSummary::layout),
        (UtilitySummary::RECORD_TYPES, UtilitySummary::layout),
        (TransportSummary::RECORD_TYPES, TransportSummary::layout),
        (PeriodAdjustment::RECORD_TYPES, PeriodAdjustment::layout),
        (DocumentAdjustment::RECORD_TYPES, DocumentAdjustment::layout),
        (AssessmentInformation::RECORD_TYPES, AssessmentInformation::layout),
    ];
    layouts
        .iter()
        .find(|(types, _)| types.contains(&record_type))
        .map(|(_, layout)| layout())
}

/// All record types with a known layout.
pub fn known_record_types() -> Vec<&'static str> {
    [
        OpeningRecord::RECORD_TYPES,
        GoodsSummary::RECORD_TYPES,
        UtilitySummary::RECORD_TYPES,
        TransportSummary::RECORD_TYPES,
        PeriodAdjustment::RECORD_TYPES,
        DocumentAdjustment::RECORD_TYPES,
        AssessmentInformation::RECORD_TYPES,
    ]
    .concat()
}
