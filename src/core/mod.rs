pub mod adjustments;
pub mod cfop;
pub mod corrections;
pub mod generic;
pub mod header;
pub mod layout;
pub mod operations;
pub mod record;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use adjustments::{
    resolve_adjustments, AdjustmentCategory, AdjustmentEntry, AdjustmentKind, AdjustmentReport,
    AdjustmentTables, AdjustmentTotals, Exclusion, ExclusionReason,
};
pub use cfop::{Cfop, Direction};
pub use corrections::{
    detect_pending_adjustments, AdjustmentRef, AdjustmentScope, CorrectionAction, Corrections,
    PendingAdjustment,
};
pub use generic::{detect_pending, GenericCodeConfiguration, PendingCfop, ResolutionChoice};
pub use header::{validate_structure, Header, StructureReport};
pub use operations::{classify_operations, Aggregate, ClassifiedOperations, Operation, OperationTotals};
pub use record::{FiscalRecord, RecordSet};
pub use warnings::Warning;
