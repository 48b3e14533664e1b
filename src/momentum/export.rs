// Momentum record export (JSON array consumed by the orchestration layer)

use std::path::Path;

use super::classifier::{MomentumError, MomentumRecord};

/// Serialize records as a pretty-printed JSON array
pub fn export_records_json(records: &[MomentumRecord]) -> Result<String, MomentumError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Write records to a JSON file, replacing any existing file
pub fn write_records_json(path: &Path, records: &[MomentumRecord]) -> Result<(), MomentumError> {
    let json = export_records_json(records)?;
    std::fs::write(path, json)?;
    log::debug!("Wrote {} momentum records to {:?}", records.len(), path);
    Ok(())
}
