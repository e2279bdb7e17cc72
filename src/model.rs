use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace};

use crate::catalog::Catalog;
use crate::dataset::{ColumnId, Dataset};
use crate::domain::{HELP_TEXT, Message, ViewerConfig, ViewerError};
use crate::filter::{ALL_OPTION, VisibleSet};
use crate::inputter::{InputResult, Inputter};
use crate::loader::{LoadResult, Loader};
use crate::session::{TableView, ViewSession};
use crate::ui::{
    COLUMN_WIDTH_MARGIN, FILEBAR_HEIGHT, PANEL_BORDER_HEIGHT, SCROLLBAR_WIDTH,
    STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT,
};

#[derive(Debug, PartialEq)]
pub enum Status {
    LOADING,
    READY,
    FAILED,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    FILTER,
    CMDINPUT,
    POPUP,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
    pub pinned: bool,
}

/// The window of the visible rows and columns that fits on screen.
#[derive(Default)]
pub struct Viewport {
    rows: Vec<usize>, // Dataset row index for every visible row
    total_rows: usize,
    visible_columns: Vec<ColumnId>,
    curser_row: usize,
    curser_column: usize,
    offset_row: usize,
    offset_column: usize, // Offset into the columns right of the pinned one
    data: Vec<ColumnView>,
    max_column_width: usize,
    width: usize,
    heigh: usize,
}

impl TableView for Viewport {
    fn render(&mut self, dataset: &Dataset, visible: &VisibleSet) {
        self.rows = visible.rows().to_vec();
        self.total_rows = dataset.nrows();
        if self.offset_row + self.curser_row >= self.rows.len() {
            self.offset_row = 0;
            self.curser_row = 0;
        }
        self.rebuild(dataset);
    }
}

impl Viewport {
    fn new(max_column_width: usize) -> Self {
        Viewport {
            max_column_width,
            ..Default::default()
        }
    }

    fn reset(&mut self) {
        self.curser_row = 0;
        self.curser_column = 0;
        self.offset_row = 0;
        self.offset_column = 0;
    }

    fn resize(&mut self, width: usize, heigh: usize) {
        self.width = width;
        self.heigh = heigh;
    }

    fn calculate_column_width(&self, dataset: &Dataset, id: ColumnId) -> usize {
        let column = dataset.column(id);
        let width = std::cmp::max(column.name().chars().count(), column.max_width()) + COLUMN_WIDTH_MARGIN;
        std::cmp::min(width, self.max_column_width)
    }

    fn selected_column(&self) -> Option<ColumnId> {
        self.visible_columns.get(self.curser_column).copied()
    }

    fn rebuild(&mut self, dataset: &Dataset) {
        let pinned = dataset.identity();
        let scrollable: Vec<ColumnId> = dataset.column_ids().filter(|id| Some(*id) != pinned).collect();
        self.offset_column = std::cmp::min(self.offset_column, scrollable.len().saturating_sub(1));

        // Pinned column first, then as many columns as fit, the last one possibly cut
        let mut columns: Vec<(ColumnId, usize)> = Vec::new();
        let mut visible_width = 0;
        let candidates = pinned.into_iter().chain(scrollable[self.offset_column..].iter().copied());
        for id in candidates {
            let width = self.calculate_column_width(dataset, id);
            if visible_width + width + 1 <= self.width {
                columns.push((id, width));
                visible_width += width + 1;
            } else {
                if visible_width < self.width {
                    columns.push((id, self.width - visible_width));
                }
                break;
            }
        }
        self.visible_columns = columns.iter().map(|(id, _)| *id).collect();
        self.curser_column = std::cmp::min(self.curser_column, self.visible_columns.len().saturating_sub(1));

        let rbegin = self.offset_row;
        let rend = std::cmp::min(rbegin + self.heigh, self.rows.len());
        trace!(
            "Viewport: Cr {}, Cc {}, Or {}, Oc {}, Rb {}, Re {}, w {}, h {}",
            self.curser_row,
            self.curser_column,
            self.offset_row,
            self.offset_column,
            rbegin,
            rend,
            self.width,
            self.heigh
        );

        self.data = columns
            .into_iter()
            .map(|(id, width)| ColumnView {
                name: Self::get_visible_name(dataset.column(id).name(), width),
                width,
                data: self.rows[rbegin..rend]
                    .iter()
                    .map(|&row| dataset.value(row, id).replace("\r\n", " ↵ ").replace('\n', " ↵ "))
                    .collect(),
                pinned: Some(id) == pinned,
            })
            .collect();
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        if width < 3 {
            return String::new();
        }
        if name.chars().count() > width {
            let mut reduced: String = name.chars().take(width - 3).collect();
            reduced.push_str("...");
            reduced
        } else {
            name.to_string()
        }
    }

    fn select_row(&mut self, target: usize) {
        if target < self.offset_row {
            self.offset_row = target;
        } else if self.heigh > 0 && target >= self.offset_row + self.heigh {
            self.offset_row = target + 1 - self.heigh;
        }
        self.curser_row = target - self.offset_row;
    }

    fn move_up(&mut self, size: usize) {
        self.select_row((self.offset_row + self.curser_row).saturating_sub(size));
    }

    fn move_down(&mut self, size: usize) {
        if !self.rows.is_empty() {
            let target = std::cmp::min(self.offset_row + self.curser_row + size, self.rows.len() - 1);
            self.select_row(target);
        }
    }

    fn move_beginning(&mut self) {
        self.select_row(0);
    }

    fn move_end(&mut self) {
        self.select_row(self.rows.len().saturating_sub(1));
    }

    fn move_left(&mut self, has_pinned: bool) {
        let first_scrollable = usize::from(has_pinned);
        if self.curser_column > first_scrollable {
            self.curser_column -= 1;
        } else if self.offset_column > 0 {
            self.offset_column -= 1;
        } else {
            self.curser_column = self.curser_column.saturating_sub(1);
        }
    }

    fn move_right(&mut self, ncolumns: usize) {
        if self.curser_column + 1 < self.visible_columns.len() {
            self.curser_column += 1;
        } else if self.offset_column + self.visible_columns.len() < ncolumns {
            self.offset_column += 1;
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterLine {
    pub label: String,
    pub grouped: bool,
    /// Option text and whether it is checked/picked.
    pub options: Vec<(String, bool)>,
    /// Highlighted option while the control has focus.
    pub curser: Option<usize>,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub filter_height: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize, filter_lines: usize) -> Self {
        let filter_height = filter_lines + PANEL_BORDER_HEIGHT;
        let table_width = ui_width.saturating_sub(SCROLLBAR_WIDTH);
        let table_height = ui_height.saturating_sub(
            FILEBAR_HEIGHT + filter_height + STATUSLINE_HEIGHT + TABLE_HEADER_HEIGHT,
        );
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            filter_height,
            table_width,
            table_height,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct UIData {
    pub files: Vec<String>,
    pub active_file: usize,
    pub filters: Vec<FilterLine>,
    pub search: InputResult,
    pub active_cmdinput: bool,
    pub table: Vec<ColumnView>,
    /// Replaces the table while loading or after a failure.
    pub table_message: Option<String>,
    pub nrows: usize,
    pub total_rows: usize,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub sort: Option<(String, bool)>,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub status_message: String,
}

pub struct Model {
    config: ViewerConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    catalog: Catalog,
    current_file: usize,
    loader: Loader,
    session: Option<ViewSession>,
    viewport: Viewport,
    load_error: Option<String>,
    filter_focus: usize,
    option_curser: usize,
    input: Inputter,
    last_input: InputResult,
    /// Search term active when editing started, restored on cancel.
    previous_search: String,
    uilayout: UILayout,
    uidata: UIData,
    status_message: String,
}

impl Model {
    /// Creates the model and starts loading the first file of the catalog.
    pub fn init(config: &ViewerConfig, catalog: Catalog, ui_width: usize, ui_height: usize) -> Self {
        let uilayout = UILayout::from_values(ui_width, ui_height, 1);
        let mut viewport = Viewport::new(config.max_column_width);
        viewport.resize(uilayout.table_width, uilayout.table_height);
        let mut model = Model {
            config: config.clone(),
            status: Status::LOADING,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            catalog,
            current_file: 0,
            loader: Loader::new(&config.identity_column),
            session: None,
            viewport,
            load_error: None,
            filter_focus: 0,
            option_curser: 0,
            input: Inputter::default(),
            last_input: InputResult::default(),
            previous_search: String::new(),
            uilayout,
            uidata: UIData {
                files: Vec::new(),
                active_file: 0,
                filters: Vec::new(),
                search: InputResult::default(),
                active_cmdinput: false,
                table: Vec::new(),
                table_message: None,
                nrows: 0,
                total_rows: 0,
                selected_row: 0,
                selected_column: 0,
                abs_selected_row: 0,
                sort: None,
                show_popup: false,
                popup_message: String::new(),
                layout: UILayout::default(),
                status_message: String::new(),
            },
            status_message: "Started resview!".to_string(),
        };
        model.load_current_file();
        model.update_uidata();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    // -------------------- Loading ---------------------- //

    fn load_current_file(&mut self) {
        let Some(entry) = self.catalog.get(self.current_file) else {
            return;
        };
        let path = entry.path.clone();
        let label = entry.label.clone();

        // The previous session goes away completely, controls included
        self.session = None;
        self.load_error = None;
        self.status = Status::LOADING;
        if self.modus != Modus::POPUP {
            self.modus = Modus::TABLE;
        }
        self.loader.request(path);
        self.set_status_message(format!("Loading {label} ..."));
    }

    fn switch_file(&mut self, step: isize) {
        if self.catalog.is_empty() {
            return;
        }
        let n = self.catalog.len() as isize;
        self.current_file = (self.current_file as isize + step).rem_euclid(n) as usize;
        self.load_current_file();
    }

    fn apply_load(&mut self, loaded: LoadResult) {
        let start_time = Instant::now();
        match loaded.result {
            Ok(dataset) => {
                let session = ViewSession::new(Arc::new(dataset), &self.config);
                self.filter_focus = 0;
                self.option_curser = 0;
                self.uilayout = UILayout::from_values(
                    self.uilayout.width,
                    self.uilayout.height,
                    session.filters().controls().len() + 1,
                );
                self.viewport.reset();
                self.viewport.resize(self.uilayout.table_width, self.uilayout.table_height);
                session.present(&mut self.viewport);
                self.set_status_message(format!(
                    "Loaded {} rows in {}ms",
                    session.dataset().nrows(),
                    start_time.elapsed().as_millis()
                ));
                info!("Showing {}", loaded.path.display());
                self.session = Some(session);
                self.status = Status::READY;
            }
            Err(e) => {
                error!("Loading {} failed: {e}", loaded.path.display());
                self.load_error = Some(e.user_message().to_string());
                self.set_status_message(e.to_string());
                self.status = Status::FAILED;
            }
        }
    }

    // -------------------- Update ---------------------- //

    pub fn update(&mut self, message: Option<Message>) -> Result<(), ViewerError> {
        if let Some(loaded) = self.loader.poll() {
            self.apply_load(loaded);
        }

        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.move_table(|v, _| v.move_up(1)),
                    Message::MoveDown => self.move_table(|v, _| v.move_down(1)),
                    Message::MovePageUp => {
                        let page = self.uilayout.table_height.max(1);
                        self.move_table(|v, _| v.move_up(page))
                    }
                    Message::MovePageDown => {
                        let page = self.uilayout.table_height.max(1);
                        self.move_table(|v, _| v.move_down(page))
                    }
                    Message::MoveBeginning => self.move_table(|v, _| v.move_beginning()),
                    Message::MoveEnd => self.move_table(|v, _| v.move_end()),
                    Message::MoveLeft => {
                        self.move_table(|v, ds| v.move_left(ds.identity().is_some()))
                    }
                    Message::MoveRight => self.move_table(|v, ds| v.move_right(ds.ncolumns())),
                    Message::SortAscending => self.sort_current_column(true),
                    Message::SortDescending => self.sort_current_column(false),
                    Message::NextFile => self.switch_file(1),
                    Message::PreviousFile => self.switch_file(-1),
                    Message::FocusFilters => self.focus_next_filter(),
                    Message::ClearFilters => self.clear_filters(),
                    Message::Search => self.enter_search(),
                    Message::Export => self.export(),
                    Message::Help => self.show_help(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::FILTER => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveLeft => self.move_option(-1),
                    Message::MoveRight => self.move_option(1),
                    Message::MoveUp => self.focus_filter(self.filter_focus.saturating_sub(1)),
                    Message::MoveDown => self.focus_filter(self.filter_focus + 1),
                    Message::ToggleOption => self.toggle_option(),
                    Message::FocusFilters => self.focus_next_filter(),
                    Message::ClearFilters => self.clear_filters(),
                    Message::Search => self.enter_search(),
                    Message::Export => self.export(),
                    Message::NextFile => self.switch_file(1),
                    Message::PreviousFile => self.switch_file(-1),
                    Message::Help => self.show_help(),
                    Message::Exit => self.modus = Modus::TABLE,
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit | Message::Help => self.modus = self.previous_modus,
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
        }

        self.update_uidata();
        Ok(())
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        let filter_lines = self
            .session
            .as_ref()
            .map(|s| s.filters().controls().len() + 1)
            .unwrap_or(1);
        self.uilayout = UILayout::from_values(width, height, filter_lines);
        self.viewport.resize(self.uilayout.table_width, self.uilayout.table_height);
        self.move_table(|_, _| ());
    }

    // -------------------- Table ---------------------- //

    fn move_table(&mut self, op: impl FnOnce(&mut Viewport, &Dataset)) {
        if let Some(session) = &self.session {
            op(&mut self.viewport, session.dataset());
            self.viewport.rebuild(session.dataset());
        }
    }

    fn sort_current_column(&mut self, ascending: bool) {
        if let (Some(session), Some(column)) = (self.session.as_mut(), self.viewport.selected_column()) {
            session.sort_by(column, ascending, &mut self.viewport);
            let name = session.dataset().column(column).name().to_string();
            self.set_status_message(format!(
                "Sorted by {name} {}",
                if ascending { "ascending" } else { "descending" }
            ));
        }
    }

    fn export(&mut self) {
        let Some(session) = &self.session else {
            self.set_status_message("Nothing to export");
            return;
        };
        let saved = session
            .export()
            .and_then(|doc| doc.save(&self.config.export_dir).map(|path| (path, doc.rows)));
        match saved {
            Ok((path, rows)) => {
                self.set_status_message(format!("Exported {rows} rows to {}", path.display()))
            }
            Err(e) => {
                error!("Export failed: {e}");
                self.set_status_message(e.to_string());
            }
        }
    }

    // -------------------- Filters ---------------------- //

    fn ncontrols(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.filters().controls().len())
            .unwrap_or(0)
    }

    fn focus_filter(&mut self, idx: usize) {
        if idx < self.ncontrols() {
            self.filter_focus = idx;
            self.option_curser = 0;
            self.modus = Modus::FILTER;
        }
    }

    /// Table -> first control -> ... -> last control -> table.
    fn focus_next_filter(&mut self) {
        let next = if self.modus == Modus::FILTER {
            self.filter_focus + 1
        } else {
            0
        };
        if next < self.ncontrols() {
            self.focus_filter(next);
        } else {
            self.modus = Modus::TABLE;
        }
    }

    /// Number of selectable entries of the focused control, "All" included.
    fn option_count(&self) -> usize {
        self.session
            .as_ref()
            .and_then(|s| s.filters().controls().get(self.filter_focus))
            .map(|c| c.options().len() + usize::from(!c.is_grouped()))
            .unwrap_or(0)
    }

    fn move_option(&mut self, step: isize) {
        let n = self.option_count() as isize;
        if n > 0 {
            self.option_curser = (self.option_curser as isize + step).rem_euclid(n) as usize;
        }
    }

    fn toggle_option(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(control) = session.filters().controls().get(self.filter_focus) else {
            return;
        };
        let grouped = control.is_grouped();
        let value = if grouped {
            control.options().get(self.option_curser).cloned()
        } else {
            // Entry 0 is "All"
            self.option_curser
                .checked_sub(1)
                .and_then(|n| control.options().get(n).cloned())
        };
        debug!("Filter {} <- {value:?}", control.label());
        match (grouped, value) {
            (true, Some(value)) => session.toggle(self.filter_focus, &value, &mut self.viewport),
            (true, None) => return,
            (false, value) => session.select(self.filter_focus, value.as_deref(), &mut self.viewport),
        }
        let message = if session.visible().is_empty() {
            "No rows match".to_string()
        } else {
            format!("{} rows match", session.visible().len())
        };
        self.set_status_message(message);
    }

    fn clear_filters(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.clear_filters(&mut self.viewport);
            self.set_status_message("Filters cleared");
        }
    }

    // -------------------- Search input ---------------------- //

    fn enter_search(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        trace!("Entering search input ...");
        self.previous_search = session.filters().search().to_string();
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.input.set(&self.previous_search);
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: ratatui::crossterm::event::KeyEvent) {
        self.last_input = self.input.read(key);
        if let Some(session) = self.session.as_mut() {
            if self.last_input.canceled {
                trace!("Search canceled, back to {:?}", self.previous_search);
                session.set_search(&self.previous_search, &mut self.viewport);
            } else if self.last_input.changed {
                session.set_search(&self.last_input.input, &mut self.viewport);
            }
        }
        if self.last_input.finished {
            trace!("Search input finished: {:?}", self.last_input.input);
            self.modus = match self.previous_modus {
                Modus::FILTER => Modus::FILTER,
                _ => Modus::TABLE,
            };
            self.previous_modus = Modus::CMDINPUT;
            if let Some(session) = &self.session {
                self.status_message = format!("{} rows match", session.visible().len());
            }
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
    }

    // -------------------- UI data ---------------------- //

    fn filter_lines(&self, session: &ViewSession) -> Vec<FilterLine> {
        session
            .filters()
            .controls()
            .iter()
            .enumerate()
            .map(|(idx, control)| {
                let mut options: Vec<(String, bool)> = Vec::new();
                if !control.is_grouped() {
                    options.push((ALL_OPTION.to_string(), !control.is_active()));
                }
                options.extend(
                    control
                        .options()
                        .iter()
                        .map(|o| (o.clone(), control.is_selected(o))),
                );
                let focused = self.modus == Modus::FILTER && idx == self.filter_focus;
                FilterLine {
                    label: control.label().to_string(),
                    grouped: control.is_grouped(),
                    options,
                    curser: focused.then_some(self.option_curser),
                }
            })
            .collect()
    }

    fn update_uidata(&mut self) {
        let table_message = match (&self.session, &self.load_error) {
            (_, Some(message)) => Some(message.clone()),
            (None, None) if self.loader.is_pending() => Some("Loading...".to_string()),
            (None, None) => Some("No file loaded.".to_string()),
            (Some(_), None) => None,
        };
        let (filters, search, sort) = match &self.session {
            Some(session) => {
                let search = if self.modus == Modus::CMDINPUT {
                    self.last_input.clone()
                } else {
                    InputResult {
                        input: session.filters().search().to_string(),
                        ..Default::default()
                    }
                };
                let sort = session.sort().map(|s| {
                    (session.dataset().column(s.column).name().to_string(), s.ascending)
                });
                (self.filter_lines(session), search, sort)
            }
            None => (Vec::new(), InputResult::default(), None),
        };

        let viewport = &self.viewport;
        self.uidata = UIData {
            files: self.catalog.files().iter().map(|f| f.label.clone()).collect(),
            active_file: self.current_file,
            filters,
            search,
            active_cmdinput: self.modus == Modus::CMDINPUT,
            table: viewport.data.clone(),
            table_message,
            nrows: viewport.rows.len(),
            total_rows: viewport.total_rows,
            selected_row: viewport.curser_row,
            selected_column: viewport.curser_column,
            abs_selected_row: viewport.offset_row + viewport.curser_row,
            sort,
            show_popup: self.modus == Modus::POPUP,
            popup_message: HELP_TEXT.to_string(),
            layout: self.uilayout.clone(),
            status_message: self.status_message.clone(),
        };
    }
}
