use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::domain::ViewerError;

/// Position of a column inside its [`Dataset`]. Only obtainable from the dataset it indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(usize);

impl ColumnId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct Column {
    name: String,
    max_width: usize,
    numeric: bool,
    data: Vec<String>,
}

impl Column {
    fn new(name: String, data: Vec<String>) -> Self {
        let max_width = data.iter().map(|v| v.chars().count()).max().unwrap_or(0);
        let mut non_empty = data.iter().filter(|v| !v.is_empty()).peekable();
        let numeric = non_empty.peek().is_some() && non_empty.all(|v| v.trim().parse::<f64>().is_ok());
        Column {
            name,
            max_width,
            numeric,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of the widest value, in characters.
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// True if every non-empty value parses as a number.
    pub fn is_numeric(&self) -> bool {
        self.numeric
    }

    pub fn values(&self) -> &[String] {
        &self.data
    }

    pub fn as_string(&self) -> String {
        format!(
            "\"{}\", numeric: {}, width_max: {}, # rows {}",
            self.name,
            self.numeric,
            self.max_width,
            self.data.len(),
        )
    }
}

/// All rows of one loaded CSV file, stored column by column.
///
/// Every column holds exactly `nrows` values; missing fields are empty strings.
#[derive(Debug)]
pub struct Dataset {
    source: PathBuf,
    columns: Vec<Column>,
    index: HashMap<String, ColumnId>,
    identity: Option<ColumnId>,
    nrows: usize,
}

impl Dataset {
    /// Builds a dataset from named columns. Shorter columns are padded with empty values.
    pub fn from_columns(
        source: PathBuf,
        columns: Vec<(String, Vec<String>)>,
        identity_column: &str,
    ) -> Self {
        let nrows = columns.iter().map(|(_, d)| d.len()).max().unwrap_or(0);
        let columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, mut data)| {
                data.resize(nrows, String::new());
                Column::new(name, data)
            })
            .collect();

        let index = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), ColumnId(idx)))
            .collect();

        let wanted = identity_column.trim().to_lowercase();
        let identity = columns
            .iter()
            .position(|c| c.name.trim().to_lowercase() == wanted)
            .map(ColumnId);

        Dataset {
            source,
            columns,
            index,
            identity,
            nrows,
        }
    }

    /// Parses CSV text with a header row into a dataset.
    ///
    /// All values are read as text. Blank lines are skipped, a line of empty fields
    /// is a record of empty values. Extra fields are truncated and missing ones become empty.
    #[instrument(skip(bytes), fields(bytes = bytes.len()))]
    pub fn parse(source: &Path, bytes: Vec<u8>, identity_column: &str) -> Result<Self, ViewerError> {
        let failure = |reason: String| ViewerError::ParseFailure {
            path: source.to_path_buf(),
            reason,
        };
        let start_time = Instant::now();

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .map_parse_options(|opts| opts.with_truncate_ragged_lines(true))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| failure(e.to_string()))?;

        if df.width() == 0 {
            return Err(failure("missing header row".to_string()));
        }

        // Each column is converted on its own rayon worker.
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let loaded: Result<Vec<(String, Vec<String>)>, PolarsError> = names
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect();
        let columns = loaded.map_err(|e| failure(e.to_string()))?;

        let dataset = Dataset::from_columns(source.to_path_buf(), columns, identity_column);
        info!(
            "Parsed {} rows x {} columns in {}ms",
            dataset.nrows(),
            dataset.ncolumns(),
            start_time.elapsed().as_millis()
        );
        for c in dataset.columns().iter() {
            debug!("Column: {}", c.as_string());
        }
        Ok(dataset)
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<String>), PolarsError> {
        let col = df.column(col_name)?.cast(&DataType::String)?;
        let series = col.str()?;
        let data = series
            .into_iter()
            .map(|value| value.map(|s| s.to_string()).unwrap_or_default())
            .collect();
        Ok((col_name.to_string(), data))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// File name without extension, used as the export base name.
    pub fn stem(&self) -> String {
        self.source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("export")
            .to_string()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, id: ColumnId) -> &Column {
        &self.columns[id.0]
    }

    pub fn column_id(&self, name: &str) -> Option<ColumnId> {
        self.index.get(name).copied()
    }

    pub fn column_ids(&self) -> impl Iterator<Item = ColumnId> + '_ {
        (0..self.columns.len()).map(ColumnId)
    }

    /// The column pinned to the left of the table, if present.
    pub fn identity(&self) -> Option<ColumnId> {
        self.identity
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncolumns(&self) -> usize {
        self.columns.len()
    }

    pub fn value(&self, row: usize, column: ColumnId) -> &str {
        &self.columns[column.0].data[row]
    }

    pub fn record(&self, row: usize) -> Record<'_> {
        Record { dataset: self, row }
    }
}

/// One row of a [`Dataset`].
#[derive(Clone, Copy)]
pub struct Record<'a> {
    dataset: &'a Dataset,
    row: usize,
}

impl<'a> Record<'a> {
    /// Values in column order.
    pub fn values(&self) -> Vec<&'a str> {
        let dataset = self.dataset;
        let row = self.row;
        dataset.column_ids().map(move |id| dataset.value(row, id)).collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn dataset(file: &str, header: &[&str], rows: &[&[&str]]) -> Dataset {
        let columns = header
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let data = rows.iter().map(|r| r[idx].to_string()).collect();
                (name.to_string(), data)
            })
            .collect();
        Dataset::from_columns(PathBuf::from(file), columns, "Name")
    }

    /// The two-row dataset from the filter and export scenarios.
    pub(crate) fn teams() -> Dataset {
        dataset(
            "Batting.csv",
            &["Name", "Round", "Team"],
            &[&["A", "1", "X"], &["B", "2", "Y"]],
        )
    }
}
