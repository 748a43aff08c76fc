//! Layout command - print the record layouts the reader understands

use clap::Args;
use serde::Serialize;
use spedc::core::layout::{known_record_types, layout_for, LayoutField};

#[derive(Args, Debug)]
pub struct LayoutCommand {
    /// Record type to show (e.g. C190); all known types when omitted
    record_type: Option<String>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct RecordLayout {
    record_type: &'static str,
    fields: &'static [LayoutField],
}

impl LayoutCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let layouts: Vec<RecordLayout> = match &self.record_type {
            Some(wanted) => {
                let wanted = wanted.to_uppercase();
                let Some(record_type) = known_record_types().into_iter().find(|t| *t == wanted) else {
                    anyhow::bail!(
                        "Unknown record type '{}'. Known types: {}",
                        wanted,
                        known_record_types().join(", ")
                    );
                };
                vec![record_layout(record_type)?]
            }
            None => known_record_types()
                .into_iter()
                .map(record_layout)
                .collect::<anyhow::Result<_>>()?,
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&layouts)?);
            return Ok(());
        }

        for layout in &layouts {
            println!("{}", layout.record_type);
            println!("{}", "=".repeat(layout.record_type.len()));
            for (position, field) in layout.fields.iter().enumerate() {
                let req = if field.required { "required" } else { "optional" };
                println!("{:>3} {:20} ({:8})  {}", position + 1, field.name, req, field.description);
            }
            println!();
        }
        Ok(())
    }
}

fn record_layout(record_type: &'static str) -> anyhow::Result<RecordLayout> {
    let fields = layout_for(record_type)
        .ok_or_else(|| anyhow::anyhow!("No layout for record type {}", record_type))?;
    Ok(RecordLayout { record_type, fields })
}
