//! Bulk location import.
//!
//! Reads a tabular file with columns {city/cidade, bairro, rua, lat, lng,
//! observations/observacoes} and rebuilds the whole location tree from it.
//! The import is destructive and resettable: running it twice over the same
//! file produces the same tree. Rows whose member references a group missing
//! from the input are skipped with a warning, never failing the run.

use std::path::Path;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{ImportSummary, LocationImportRow};

/// Parses the import file into rows. Headers are matched by name, so column
/// order does not matter; empty lat/lng/observations cells become `None`.
pub fn read_rows(path: &Path) -> Result<Vec<LocationImportRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| Error::Validation(format!("cannot read import file: {e}")))?;

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: LocationImportRow =
            result.map_err(|e| Error::Validation(format!("malformed import row: {e}")))?;
        if row.city.trim().is_empty() {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Runs the full destructive import against the store and logs the outcome.
pub fn run(store: &dyn Store, path: &Path) -> Result<ImportSummary> {
    let rows = read_rows(path)?;
    let summary = store.replace_location_tree(&rows)?;

    tracing::info!(
        "Location import complete: {} group(s), {} member(s), {} skipped",
        summary.groups_created,
        summary.members_created,
        summary.skipped.len()
    );
    Ok(summary)
}
