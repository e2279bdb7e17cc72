use std::sync::Arc;
use tracing::{debug, trace};

use crate::dataset::{ColumnId, Dataset};
use crate::domain::{ViewerConfig, ViewerError};
use crate::export::ExportDocument;
use crate::filter::{FilterState, VisibleSet};

/// Anything that can show the rows of a dataset.
pub trait TableView {
    fn render(&mut self, dataset: &Dataset, visible: &VisibleSet);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SortOrder {
    pub column: ColumnId,
    pub ascending: bool,
}

/// Filter and export state for one loaded file.
///
/// A new session is created for every load, the previous one is dropped as a whole.
#[derive(Debug)]
pub struct ViewSession {
    dataset: Arc<Dataset>,
    filters: FilterState,
    sort: Option<SortOrder>,
    visible: VisibleSet,
}

impl ViewSession {
    pub fn new(dataset: Arc<Dataset>, config: &ViewerConfig) -> Self {
        let filters = FilterState::build(&dataset, &config.grouped_columns, &config.select_columns);
        let visible = filters.visible_rows(&dataset);
        debug!(
            "New session for {} with {} rows",
            dataset.source().display(),
            visible.len()
        );
        ViewSession {
            dataset,
            filters,
            sort: None,
            visible,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn sort(&self) -> Option<SortOrder> {
        self.sort
    }

    pub fn visible(&self) -> &VisibleSet {
        &self.visible
    }

    pub fn present(&self, view: &mut dyn TableView) {
        view.render(&self.dataset, &self.visible);
    }

    pub fn toggle(&mut self, control: usize, value: &str, view: &mut dyn TableView) {
        if self.filters.toggle(control, value) {
            self.refresh(view);
        }
    }

    pub fn select(&mut self, control: usize, value: Option<&str>, view: &mut dyn TableView) {
        if self.filters.select(control, value) {
            self.refresh(view);
        }
    }

    pub fn set_search(&mut self, term: &str, view: &mut dyn TableView) {
        if self.filters.search() != term {
            self.filters.set_search(term);
            self.refresh(view);
        }
    }

    pub fn clear_filters(&mut self, view: &mut dyn TableView) {
        self.filters.clear();
        self.refresh(view);
    }

    pub fn sort_by(&mut self, column: ColumnId, ascending: bool, view: &mut dyn TableView) {
        self.sort = Some(SortOrder { column, ascending });
        self.refresh(view);
    }

    /// Export of the rows as currently shown, filters and sort applied.
    pub fn export(&self) -> Result<ExportDocument, ViewerError> {
        ExportDocument::build(&self.dataset, &self.filters, &self.visible)
    }

    fn refresh(&mut self, view: &mut dyn TableView) {
        let mut visible = self.filters.visible_rows(&self.dataset);
        if let Some(sort) = self.sort {
            visible.sort_by(&self.dataset, sort.column, sort.ascending);
        }
        trace!("Refreshed visible rows: {}", visible.len());
        self.visible = visible;
        self.present(view);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dataset::fixtures;

    /// Keeps every rendered row set.
    #[derive(Default)]
    pub(crate) struct RecordingView {
        pub renders: Vec<Vec<usize>>,
    }

    impl TableView for RecordingView {
        fn render(&mut self, _dataset: &Dataset, visible: &VisibleSet) {
            self.renders.push(visible.rows().to_vec());
        }
    }

    fn session() -> ViewSession {
        let ds = fixtures::dataset(
            "Batting.csv",
            &["Name", "Round", "Team", "HR"],
            &[
                &["Smith", "1", "Tigers", "12"],
                &["Jones", "2", "Bears", "3"],
                &["Brown", "1", "Bears", "7"],
            ],
        );
        ViewSession::new(Arc::new(ds), &ViewerConfig::default())
    }

    #[test]
    fn every_change_renders_once() {
        let mut session = session();
        let mut view = RecordingView::default();
        session.present(&mut view);
        session.toggle(0, "1", &mut view);
        session.select(1, Some("Bears"), &mut view);
        session.set_search("br", &mut view);
        assert_eq!(view.renders, vec![vec![0, 1, 2], vec![0, 2], vec![2], vec![2]]);
    }

    #[test]
    fn unchanged_search_does_not_render() {
        let mut session = session();
        let mut view = RecordingView::default();
        session.set_search("", &mut view);
        assert!(view.renders.is_empty());
    }

    #[test]
    fn invalid_control_changes_nothing() {
        let mut session = session();
        let mut view = RecordingView::default();
        session.toggle(7, "1", &mut view);
        session.select(0, Some("1"), &mut view);
        assert!(view.renders.is_empty());
        assert_eq!(session.visible().len(), 3);
    }

    #[test]
    fn sort_survives_filter_changes_and_drives_export() {
        let mut session = session();
        let mut view = RecordingView::default();
        let hr = session.dataset().column_id("HR").unwrap();
        session.sort_by(hr, false, &mut view);
        assert_eq!(session.visible().rows(), [0, 2, 1]);

        session.toggle(0, "1", &mut view);
        assert_eq!(session.visible().rows(), [0, 2]);
        assert_eq!(session.sort(), Some(SortOrder { column: hr, ascending: false }));

        let doc = session.export().unwrap();
        assert_eq!(doc.filename, "Batting_Round-1.csv");
        assert_eq!(doc.csv, "Name,Round,Team,HR\nSmith,1,Tigers,12\nBrown,1,Bears,7\n");
    }

    #[test]
    fn clear_filters_restores_all_rows() {
        let mut session = session();
        let mut view = RecordingView::default();
        session.toggle(0, "2", &mut view);
        session.set_search("jones", &mut view);
        assert_eq!(session.visible().len(), 1);
        session.clear_filters(&mut view);
        assert_eq!(session.visible().len(), 3);
        assert!(!session.filters().is_active());
        assert_eq!(session.export().unwrap().filename, "Batting_filtered.csv");
    }
}
