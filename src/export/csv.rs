use crate::error::ExportError;
use crate::table::QuantityTable;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the table as displayed: one record per row, then the summary.
pub fn export_csv<P: AsRef<Path>>(table: &QuantityTable, path: P) -> Result<(), ExportError> {
    let path_ref = path.as_ref();
    let file = File::create(path_ref).map_err(|source| ExportError::FileCreate {
        path: path_ref.to_path_buf(),
        source,
    })?;

    write_table(table, file)?;
    tracing::info!(path = %path_ref.display(), rows = table.rows().len(), "Exported CSV");
    Ok(())
}

fn write_table<W: Write>(table: &QuantityTable, out: W) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(out);

    writer.write_record(table.columns().iter().map(|c| c.header()))?;

    for row in table.rows() {
        writer.write_record(table.columns().iter().map(|c| c.cell(row)))?;
    }

    let summary = table.summary();
    writer.write_record(table.columns().iter().map(|c| summary.cell(c)))?;

    writer.flush().map_err(|e| ExportError::WriteError {
        message: e.to_string(),
    })?;

    Ok(())
}
