use polars::io::csv::write::{CsvWriter, QuoteStyle};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::dataset::Dataset;
use crate::domain::ViewerError;
use crate::filter::{FilterState, VisibleSet};

const NO_FILTER_SUFFIX: &str = "filtered";

/// CSV text of the visible rows together with the name it is saved under.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub filename: String,
    pub csv: String,
    pub rows: usize,
}

impl ExportDocument {
    pub fn build(
        dataset: &Dataset,
        filters: &FilterState,
        visible: &VisibleSet,
    ) -> Result<Self, ViewerError> {
        Ok(ExportDocument {
            filename: export_filename(&dataset.stem(), filters),
            csv: to_csv(dataset, visible)?,
            rows: visible.len(),
        })
    }

    /// Writes the document into `dir`, creating it if needed.
    #[instrument(skip(self), fields(filename = %self.filename))]
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ViewerError> {
        let path = dir.join(&self.filename);
        let export_error = |source| ViewerError::Export {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(dir).map_err(export_error)?;
        fs::write(&path, &self.csv).map_err(export_error)?;
        info!("Exported {} rows to {}", self.rows, path.display());
        Ok(path)
    }
}

/// Drops everything except ASCII letters, digits, `_` and `-`.
fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// `<stem>_<Column>-<values>..._Search-<term>.csv`, or `<stem>_filtered.csv` without active filters.
pub fn export_filename(stem: &str, filters: &FilterState) -> String {
    if !filters.is_active() {
        return format!("{stem}_{NO_FILTER_SUFFIX}.csv");
    }
    let mut parts: Vec<String> = filters
        .controls()
        .iter()
        .filter(|c| c.is_active())
        .map(|c| {
            let mut part = vec![sanitize(c.label())];
            part.extend(c.selected_values().into_iter().map(sanitize));
            part.join("-")
        })
        .collect();
    if !filters.search().is_empty() {
        parts.push(format!("Search-{}", sanitize(filters.search())));
    }
    format!("{}_{}.csv", stem, parts.join("_"))
}

/// Serializes the visible rows in dataset column order with a header row.
///
/// Fields holding a comma, a quote or a line break are quoted, quotes inside are doubled.
/// Empty fields are written bare.
pub fn to_csv(dataset: &Dataset, visible: &VisibleSet) -> Result<String, ViewerError> {
    let columns: Vec<Column> = dataset
        .column_ids()
        .map(|id| {
            // Nulls are written as nothing, an empty string would come out as ""
            let values: Vec<Option<&str>> = visible
                .rows()
                .iter()
                .map(|&row| Some(dataset.value(row, id)).filter(|v| !v.is_empty()))
                .collect();
            Column::new(dataset.column(id).name().into(), values)
        })
        .collect();
    let mut df = DataFrame::new(columns)?;

    let mut buf: Vec<u8> = Vec::new();
    CsvWriter::new(&mut buf)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .with_quote_style(QuoteStyle::Necessary)
        .finish(&mut df)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
