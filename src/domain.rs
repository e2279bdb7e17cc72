use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

pub const HELP_TEXT: &str = "\
Files
  Tab / ]        next file
  Shift-Tab / [  previous file

Table
  Arrows         move selection
  PgUp / PgDn    page up / down
  Home / End     first / last row
  s / S          sort column ascending / descending

Filters
  f              focus next filter control
  Left / Right   move between options
  Space          toggle checkbox / pick option
  /              edit search text
  c              clear all filters
  Esc            back to table

  e              export visible rows to CSV
  ?              this help
  q              quit";

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("failed to load CSV file {path}: {source}")]
    LoadFailure { path: PathBuf, source: Error },

    #[error("failed to parse CSV {path}: {reason}")]
    ParseFailure { path: PathBuf, reason: String },

    #[error("no CSV files found in {0}")]
    NoCsvFiles(PathBuf),

    #[error("failed to write export {path}: {source}")]
    Export { path: PathBuf, source: Error },

    #[error(transparent)]
    IoError(#[from] Error),

    #[error(transparent)]
    PolarsError(#[from] PolarsError),
}

impl ViewerError {
    /// Message shown in place of the table when a load request fails.
    pub fn user_message(&self) -> &'static str {
        match self {
            ViewerError::LoadFailure { .. } => "Failed to load CSV file.",
            ViewerError::ParseFailure { .. } => "Failed to parse CSV.",
            _ => "Failed to show CSV file.",
        }
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct ViewerConfig {
    pub event_poll_time: u64,
    pub max_column_width: usize,
    /// Columns rendered as checkbox groups (multi-select).
    pub grouped_columns: Vec<String>,
    /// Columns rendered as dropdowns with an "All" option.
    pub select_columns: Vec<String>,
    /// Column pinned to the left edge, matched case-insensitively.
    pub identity_column: String,
    pub export_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 30,
            grouped_columns: vec!["Round".to_string()],
            select_columns: vec!["Team".to_string()],
            identity_column: "Name".to_string(),
            export_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    NextFile,
    PreviousFile,
    FocusFilters,
    ToggleOption,
    ClearFilters,
    Search,
    SortAscending,
    SortDescending,
    Export,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
