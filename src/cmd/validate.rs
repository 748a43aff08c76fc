//! Validate command - structural checks on SPED files without calculating

use crate::cmd::read_sped;
use clap::Args;
use serde::Serialize;
use spedc::core::{validate_structure, Header, RecordSet, StructureReport};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// SPED files to check
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    header: Option<Header>,
    #[serde(flatten)]
    structure: StructureReport,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let reports = self
            .files
            .iter()
            .map(|path| -> anyhow::Result<FileReport> {
                let records = RecordSet::parse(&read_sped(path)?);
                Ok(FileReport {
                    file: path.display().to_string(),
                    header: Header::extract(&records),
                    structure: validate_structure(&records),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&reports)?);
        } else {
            reports.iter().for_each(print_text);
        }

        // Exit with code 1 if any file is unusable
        if reports.iter().any(|r| !r.structure.valid) {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn print_text(report: &FileReport) {
    let structure = &report.structure;

    println!();
    println!("{}", report.file);
    if let Some(header) = &report.header {
        println!(
            "  {} | CNPJ {} | UF {} | {}",
            header.company_name,
            header.cnpj.as_deref().unwrap_or("-"),
            header.uf,
            header.period_label().unwrap_or_else(|| "período inválido".to_string())
        );
    }

    let blocks: String = structure.blocks.iter().collect();
    println!("  Blocks: {}", blocks);
    let counts: Vec<String> = structure
        .record_counts
        .iter()
        .map(|(record_type, count)| format!("{}={}", record_type, count))
        .collect();
    println!("  Records: {}", counts.join(" "));

    if structure.errors.is_empty() && structure.warnings.is_empty() {
        println!("  \u{2713} No issues found.");
    }
    for error in &structure.errors {
        println!("  \u{2717} {}", error);
    }
    for warning in &structure.warnings {
        println!("  \u{26A0} {}", warning);
    }
}
