pub mod calculate;
pub mod layout;
pub mod pending;
pub mod schema;
pub mod validate;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use spedc::core::{AdjustmentRef, Cfop, CorrectionAction, ResolutionChoice};
use spedc::period::PeriodContext;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Taxpayer decisions read from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ResolutionFile {
    /// Decision for each generic CFOP, applied to every period
    #[serde(default)]
    pub generic_cfops: BTreeMap<Cfop, ResolutionChoice>,
    /// Adjustment corrections by period label (MM/YYYY), then by "TYPE:INDEX"
    #[serde(default)]
    pub corrections: BTreeMap<String, BTreeMap<AdjustmentRef, CorrectionAction>>,
}

impl ResolutionFile {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let reader = BufReader::new(File::open(path)?);
        let resolutions: ResolutionFile = serde_json::from_reader(reader)
            .map_err(|e| anyhow::anyhow!("Invalid resolutions file {}: {}", path.display(), e))?;
        log::info!(
            "Loaded {} generic CFOP decisions and corrections for {} periods",
            resolutions.generic_cfops.len(),
            resolutions.corrections.len()
        );
        Ok(resolutions)
    }

    pub fn corrections_for(&self, label: &str) -> BTreeMap<AdjustmentRef, CorrectionAction> {
        self.corrections.get(label).cloned().unwrap_or_default()
    }
}

/// Read every file into a period. Files without a usable 0000 record are
/// labelled with their file name.
pub fn read_periods(files: &[PathBuf]) -> anyhow::Result<Vec<PeriodContext>> {
    if files.is_empty() {
        anyhow::bail!("No SPED files given");
    }
    files
        .iter()
        .map(|path| -> anyhow::Result<PeriodContext> {
            let text = read_sped(path)?;
            let context = PeriodContext::from_text(&text);
            if context.label.is_empty() {
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                return Ok(context.with_label(name.unwrap_or_else(|| "-".to_string())));
            }
            Ok(context)
        })
        .collect()
}

/// Read a SPED file (or stdin with "-").
pub fn read_sped(path: &Path) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    if path.as_os_str() == "-" {
        io::stdin().lock().read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
    } else {
        File::open(path)
            .map_err(|e| anyhow::anyhow!("Cannot open {}: {}", path.display(), e))?
            .read_to_end(&mut buffer)?;
    }
    Ok(decode(buffer))
}

/// SPED files are usually ISO-8859-1; UTF-8 is accepted as well.
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            log::debug!("Input is not UTF-8, reading as ISO-8859-1");
            err.into_bytes().into_iter().map(char::from).collect()
        }
    }
}
