use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, trace};

use crate::dataset::{ColumnId, Dataset};

pub const ALL_OPTION: &str = "All";

#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    /// Checkbox group. OR within the column, an empty selection means no constraint.
    Grouped { selected: BTreeSet<String> },
    /// Dropdown with an explicit "All" entry (`None`).
    Single { selected: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterControl {
    column: ColumnId,
    label: String,
    options: Vec<String>,
    kind: FilterKind,
}

impl FilterControl {
    fn new(dataset: &Dataset, column: ColumnId, kind: FilterKind) -> Self {
        let options: BTreeSet<&str> = dataset
            .column(column)
            .values()
            .iter()
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .collect();
        FilterControl {
            column,
            label: dataset.column(column).name().to_string(),
            options: options.into_iter().map(str::to_string).collect(),
            kind,
        }
    }

    pub fn column(&self) -> ColumnId {
        self.column
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Distinct non-empty values of the column, sorted ascending.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self.kind, FilterKind::Grouped { .. })
    }

    pub fn is_active(&self) -> bool {
        match &self.kind {
            FilterKind::Grouped { selected } => !selected.is_empty(),
            FilterKind::Single { selected } => selected.as_deref().is_some_and(|v| !v.is_empty()),
        }
    }

    /// Whether `value` is currently checked or picked.
    pub fn is_selected(&self, value: &str) -> bool {
        match &self.kind {
            FilterKind::Grouped { selected } => selected.contains(value),
            FilterKind::Single { selected } => selected.as_deref() == Some(value),
        }
    }

    /// Selected values in display order.
    pub fn selected_values(&self) -> Vec<&str> {
        match &self.kind {
            FilterKind::Grouped { selected } => selected.iter().map(String::as_str).collect(),
            FilterKind::Single { selected } => selected
                .as_deref()
                .filter(|v| !v.is_empty())
                .into_iter()
                .collect(),
        }
    }

    pub fn passes(&self, value: &str) -> bool {
        match &self.kind {
            FilterKind::Grouped { selected } => selected.is_empty() || selected.contains(value),
            FilterKind::Single { selected } => match selected.as_deref() {
                None | Some("") => true,
                Some(v) => v == value,
            },
        }
    }

    fn clear(&mut self) {
        match &mut self.kind {
            FilterKind::Grouped { selected } => selected.clear(),
            FilterKind::Single { selected } => *selected = None,
        }
    }
}

/// Active filter selections plus the free-text search of one view session.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    controls: Vec<FilterControl>,
    search: String,
}

impl FilterState {
    /// Builds one control per recognized column present in `dataset`.
    ///
    /// Grouped controls come first, then single-select controls, each in the order given.
    pub fn build(dataset: &Dataset, grouped_columns: &[String], select_columns: &[String]) -> Self {
        let grouped = grouped_columns.iter().filter_map(|name| {
            dataset.column_id(name).map(|id| {
                FilterControl::new(
                    dataset,
                    id,
                    FilterKind::Grouped {
                        selected: BTreeSet::new(),
                    },
                )
            })
        });
        let single = select_columns.iter().filter_map(|name| {
            dataset
                .column_id(name)
                .map(|id| FilterControl::new(dataset, id, FilterKind::Single { selected: None }))
        });
        let controls: Vec<FilterControl> = grouped.chain(single).collect();
        debug!(
            "Built {} filter controls for {}",
            controls.len(),
            dataset.source().display()
        );
        FilterState {
            controls,
            search: String::new(),
        }
    }

    pub fn controls(&self) -> &[FilterControl] {
        &self.controls
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.to_string();
    }

    /// Checks `value` if it is unchecked and unchecks it otherwise. Only applies to grouped controls.
    pub fn toggle(&mut self, control: usize, value: &str) -> bool {
        match self.controls.get_mut(control).map(|c| &mut c.kind) {
            Some(FilterKind::Grouped { selected }) => {
                if !selected.remove(value) {
                    selected.insert(value.to_string());
                }
                true
            }
            _ => false,
        }
    }

    /// Picks `value` in a single-select control. `None`, an empty value or "All" means no constraint.
    pub fn select(&mut self, control: usize, value: Option<&str>) -> bool {
        match self.controls.get_mut(control).map(|c| &mut c.kind) {
            Some(FilterKind::Single { selected }) => {
                *selected = value
                    .filter(|v| !v.is_empty() && *v != ALL_OPTION)
                    .map(str::to_string);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.controls.iter_mut().for_each(FilterControl::clear);
        self.search.clear();
    }

    pub fn is_active(&self) -> bool {
        !self.search.is_empty() || self.controls.iter().any(FilterControl::is_active)
    }

    /// `needle` is the lower-cased search term.
    fn matches(&self, dataset: &Dataset, row: usize, needle: &str) -> bool {
        self.controls
            .iter()
            .all(|c| c.passes(dataset.value(row, c.column)))
            && (needle.is_empty()
                || dataset
                    .record(row)
                    .values()
                    .iter()
                    .any(|v| v.to_lowercase().contains(needle)))
    }

    /// Row indices that pass all filters, in dataset order.
    pub fn visible_rows(&self, dataset: &Dataset) -> VisibleSet {
        if !self.is_active() {
            return VisibleSet::all(dataset);
        }
        let needle = self.search.to_lowercase();
        let rows: Vec<usize> = (0..dataset.nrows())
            .into_par_iter()
            .filter(|&row| self.matches(dataset, row, &needle))
            .collect();
        trace!("{} of {} rows visible", rows.len(), dataset.nrows());
        VisibleSet { rows }
    }
}

/// Ordered dataset row indices currently shown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibleSet {
    rows: Vec<usize>,
}

impl VisibleSet {
    pub fn all(dataset: &Dataset) -> Self {
        VisibleSet {
            rows: (0..dataset.nrows()).collect(),
        }
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stable sort by the values of `column`, numerically if the column is numeric.
    pub fn sort_by(&mut self, dataset: &Dataset, column: ColumnId, ascending: bool) {
        let is_numeric = dataset.column(column).is_numeric();
        self.rows.sort_by(|&a, &b| {
            let (a, b) = (dataset.value(a, column), dataset.value(b, column));
            let ord = if is_numeric {
                // Parsable numbers first, the rest compared as strings
                match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
                    (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => a.cmp(b),
                }
            } else {
                a.cmp(b)
            };
            if ascending { ord } else { ord.reverse() }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures;
    use rstest::rstest;

    fn state(ds: &Dataset) -> FilterState {
        FilterState::build(ds, &["Round".to_string()], &["Team".to_string()])
    }

    fn names(ds: &Dataset, visible: &VisibleSet) -> Vec<String> {
        let name = ds.column_id("Name").unwrap();
        visible.rows().iter().map(|&r| ds.value(r, name).to_string()).collect()
    }

    fn league() -> Dataset {
        fixtures::dataset(
            "Batting.csv",
            &["Name", "Round", "Team"],
            &[
                &["Smith", "1", "Tigers"],
                &["Jones", "2", "Bears"],
                &["Brown", "11", "Tigers"],
                &["Adams", "", "Bears"],
                &["Baker", "1", ""],
            ],
        )
    }

    #[test]
    fn build_collects_sorted_distinct_non_empty_options() {
        let ds = league();
        let filters = state(&ds);
        assert_eq!(filters.controls().len(), 2);
        let round = &filters.controls()[0];
        assert!(round.is_grouped());
        assert_eq!(round.label(), "Round");
        assert_eq!(round.options(), ["1", "11", "2"]);
        let team = &filters.controls()[1];
        assert!(!team.is_grouped());
        assert_eq!(team.options(), ["Bears", "Tigers"]);
    }

    #[test]
    fn build_without_recognized_columns_has_only_search() {
        let ds = fixtures::dataset("x.csv", &["Name", "HR"], &[&["A", "1"]]);
        let filters = state(&ds);
        assert!(filters.controls().is_empty());
        assert_eq!(filters.search(), "");
    }

    #[test]
    fn empty_state_shows_everything() {
        let ds = league();
        let visible = state(&ds).visible_rows(&ds);
        assert_eq!(visible, VisibleSet::all(&ds));
    }

    #[test]
    fn grouped_filter_is_exact_membership() {
        let ds = league();
        let mut filters = state(&ds);
        filters.toggle(0, "1");
        assert_eq!(names(&ds, &filters.visible_rows(&ds)), ["Smith", "Baker"]);

        filters.toggle(0, "2");
        assert_eq!(names(&ds, &filters.visible_rows(&ds)), ["Smith", "Jones", "Baker"]);

        // Unchecking everything lifts the constraint
        filters.toggle(0, "1");
        filters.toggle(0, "2");
        assert!(!filters.is_active());
        assert_eq!(filters.visible_rows(&ds).len(), ds.nrows());
    }

    #[test]
    fn grouped_filter_does_not_match_prefixes() {
        let ds = fixtures::dataset(
            "x.csv",
            &["Name", "Round"],
            &[&["a", "A"], &["b", "AA"], &["c", "a"]],
        );
        let mut filters = FilterState::build(&ds, &["Round".to_string()], &[]);
        filters.toggle(0, "A");
        assert_eq!(filters.visible_rows(&ds).rows(), [0]);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some(ALL_OPTION))]
    fn single_select_all_is_no_filter(#[case] value: Option<&str>) {
        let ds = league();
        let mut filters = state(&ds);
        filters.select(1, Some("Bears"));
        filters.select(1, value);
        assert!(!filters.controls()[1].is_active());
        assert_eq!(filters.visible_rows(&ds), VisibleSet::all(&ds));
    }

    #[test]
    fn single_select_matches_whole_value() {
        let ds = league();
        let mut filters = state(&ds);
        assert!(filters.select(1, Some("Tigers")));
        assert_eq!(names(&ds, &filters.visible_rows(&ds)), ["Smith", "Brown"]);
        // Grouped operations do not apply to a dropdown
        assert!(!filters.toggle(1, "Bears"));
        assert!(!filters.select(0, Some("1")));
    }

    #[test]
    fn search_is_case_insensitive_across_columns() {
        let ds = league();
        let mut filters = state(&ds);
        filters.set_search("TIG");
        assert_eq!(names(&ds, &filters.visible_rows(&ds)), ["Smith", "Brown"]);
        filters.set_search("ad");
        assert_eq!(names(&ds, &filters.visible_rows(&ds)), ["Adams"]);
    }

    #[test]
    fn filters_combine_with_and() {
        let ds = league();
        let mut filters = state(&ds);
        filters.toggle(0, "1");
        filters.toggle(0, "11");
        filters.select(1, Some("Tigers"));
        filters.set_search("brown");
        let visible = filters.visible_rows(&ds);
        assert_eq!(names(&ds, &visible), ["Brown"]);
        assert!(visible.rows().iter().all(|&r| filters.matches(&ds, r, "brown")));
        assert!(!filters.matches(&ds, 0, "brown"));
    }

    #[test]
    fn visible_set_never_exceeds_dataset() {
        let ds = league();
        let mut filters = state(&ds);
        for term in ["", "s", "zzz", "1"] {
            filters.set_search(term);
            assert!(filters.visible_rows(&ds).len() <= ds.nrows());
        }
    }

    #[test]
    fn scenario_round_and_search() {
        let ds = fixtures::teams();
        let mut filters = state(&ds);
        filters.toggle(0, "1");
        assert_eq!(filters.visible_rows(&ds).rows(), [0]);

        let mut filters = state(&ds);
        filters.set_search("b");
        assert_eq!(filters.visible_rows(&ds).rows(), [1]);
    }

    #[test]
    fn clear_resets_every_control() {
        let ds = league();
        let mut filters = state(&ds);
        filters.toggle(0, "2");
        filters.select(1, Some("Bears"));
        filters.set_search("x");
        assert!(filters.is_active());
        filters.clear();
        assert!(!filters.is_active());
        assert_eq!(filters, state(&ds));
    }

    #[test]
    fn sort_orders_numeric_columns_by_value() {
        let ds = league();
        let round = ds.column_id("Round").unwrap();
        assert!(ds.column(round).is_numeric());
        let mut visible = VisibleSet::all(&ds);
        visible.sort_by(&ds, round, true);
        assert_eq!(names(&ds, &visible), ["Smith", "Baker", "Jones", "Brown", "Adams"]);
        visible.sort_by(&ds, round, false);
        assert_eq!(names(&ds, &visible)[0], "Adams");
    }
}
