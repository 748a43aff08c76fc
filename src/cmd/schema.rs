//! Schema command - print the resolutions file format

use crate::cmd::ResolutionFile;
use clap::Args;
use schemars::schema_for;
use spedc::core::{AdjustmentRef, CorrectionAction, ResolutionChoice};
use std::collections::BTreeMap;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: json-schema or example
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the resolutions file
    JsonSchema,
    /// A resolutions file using every kind of decision
    Example,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => self.print_json_schema(),
            SchemaFormat::Example => self.print_example(),
        }
    }

    fn print_json_schema(&self) -> anyhow::Result<()> {
        let schema = schema_for!(ResolutionFile);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }

    fn print_example(&self) -> anyhow::Result<()> {
        let example = ResolutionFile {
            generic_cfops: BTreeMap::from([
                ("5949".parse()?, ResolutionChoice::Incentivized),
                ("1949".parse()?, ResolutionChoice::NotIncentivized),
            ]),
            corrections: BTreeMap::from([(
                "01/2024".to_string(),
                BTreeMap::from([
                    (AdjustmentRef::new("E111", 0), CorrectionAction::Keep),
                    (AdjustmentRef::new("E111", 1), CorrectionAction::Exclude),
                    (
                        AdjustmentRef::new("C197", 0),
                        CorrectionAction::Replace("GO020159".to_string()),
                    ),
                ]),
            )]),
        };
        println!("{}", serde_json::to_string_pretty(&example)?);
        Ok(())
    }
}
