//! ICMS incentive calculations (FOMENTAR, PRODUZIR, MICROPRODUZIR, ProGoiás
//! and LogPRODUZIR) over SPED EFD ICMS/IPI files.

pub mod core;
pub mod period;
pub mod tax;
pub mod workflow;
