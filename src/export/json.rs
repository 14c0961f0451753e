use crate::error::ExportError;
use crate::model::QuantityRow;
use crate::table::{QuantityTable, SummaryRow};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct QuantityExport<'a> {
    levels: &'a [String],
    rows: &'a [QuantityRow],
    summary: SummaryRow,
}

pub fn export_json<P: AsRef<Path>>(table: &QuantityTable, path: P) -> Result<(), ExportError> {
    let path_ref = path.as_ref();
    let document = QuantityExport {
        levels: table.levels(),
        rows: table.rows(),
        summary: table.summary(),
    };
    let json = serde_json::to_string_pretty(&document)?;

    let mut file = File::create(path_ref).map_err(|source| ExportError::FileCreate {
        path: path_ref.to_path_buf(),
        source,
    })?;

    file.write_all(json.as_bytes())
        .map_err(|e| ExportError::WriteError {
            message: e.to_string(),
        })?;

    tracing::info!(path = %path_ref.display(), rows = table.rows().len(), "Exported JSON");
    Ok(())
}
