use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, Tabs, Wrap,
    },
};

use crate::domain::ViewerConfig;
use crate::model::{FilterLine, UIData};

pub const FILEBAR_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const PANEL_BORDER_HEIGHT: usize = 2;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

const SEARCH_LABEL: &str = "Search: ";
const OPTION_GAP: &str = "  ";
const HIDDEN_OPTIONS: &str = "« ";

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(cfg: &ViewerConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
        }
    }

    pub fn draw(&mut self, uidata: &UIData, frame: &mut Frame) {
        let [filebar, filters, table, statusline] = Layout::vertical([
            Constraint::Length(FILEBAR_HEIGHT as u16),
            Constraint::Length(uidata.layout.filter_height as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_filebar(uidata, frame, filebar);
        self.draw_filters(uidata, frame, filters);
        match &uidata.table_message {
            Some(message) => self.draw_message(message, frame, table),
            None => self.draw_table(uidata, frame, table),
        }
        self.draw_statusline(uidata, frame, statusline);

        if uidata.show_popup {
            self.draw_popup(&uidata.popup_message, frame);
        }
    }

    fn draw_filebar(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let tabs = Tabs::new(uidata.files.clone())
            .select(uidata.active_file)
            .style(Style::new().fg(Color::Blue))
            .highlight_style(Style::new().fg(Color::Black).bg(Color::Green).bold())
            .divider("|");
        frame.render_widget(tabs, area);
    }

    /// One control as a single line of `width` cells. Options scroll so that the
    /// highlighted one stays visible, a leading marker shows hidden ones.
    fn filter_line(filter: &FilterLine, width: usize) -> Line<'static> {
        let label = format!("{}: ", filter.label);
        let items: Vec<Span<'static>> = filter
            .options
            .iter()
            .enumerate()
            .map(|(idx, (option, selected))| {
                let marker = match (filter.grouped, selected) {
                    (true, true) => "[x] ",
                    (true, false) => "[ ] ",
                    (false, true) => "(•) ",
                    (false, false) => "( ) ",
                };
                let mut style = Style::new();
                if *selected {
                    style = style.fg(Color::Green);
                }
                if filter.curser == Some(idx) {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                Span::styled(format!("{marker}{option}"), style)
            })
            .collect();

        let item_width = |item: &Span| item.content.chars().count() + OPTION_GAP.len();
        let available = width.saturating_sub(label.chars().count());
        let mut start = 0;
        if let Some(curser) = filter.curser
            && curser < items.len()
        {
            let marker_width = HIDDEN_OPTIONS.chars().count();
            let mut used: usize = items[..=curser].iter().map(item_width).sum();
            while start < curser && used + usize::from(start > 0) * marker_width > available {
                used -= item_width(&items[start]);
                start += 1;
            }
        }

        let mut spans = vec![label.bold()];
        if start > 0 {
            spans.push(Span::raw(HIDDEN_OPTIONS).dark_gray());
        }
        for item in items.into_iter().skip(start) {
            spans.push(item);
            spans.push(Span::raw(OPTION_GAP));
        }
        Line::from(spans)
    }

    fn draw_filters(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let inner_width = area.width.saturating_sub(2) as usize;
        let mut lines: Vec<Line> = uidata
            .filters
            .iter()
            .map(|f| Self::filter_line(f, inner_width))
            .collect();
        let search_style = if uidata.active_cmdinput {
            Style::new().fg(Color::Yellow)
        } else {
            Style::new()
        };
        lines.push(Line::from(vec![
            SEARCH_LABEL.bold(),
            Span::styled(uidata.search.input.clone(), search_style),
        ]));

        let block = Block::bordered()
            .title(Line::from(" Filters ".bold()))
            .border_set(border::ROUNDED);
        frame.render_widget(Paragraph::new(lines).block(block), area);

        if uidata.active_cmdinput {
            // Search is the last line inside the border
            let x = area.x + 1 + (SEARCH_LABEL.len() + uidata.search.curser_pos) as u16;
            let y = area.y + 1 + uidata.filters.len() as u16;
            frame.set_cursor_position(Position::new(x, y));
        }
    }

    fn draw_message(&self, message: &str, frame: &mut Frame, area: Rect) {
        let style = if message.starts_with("Failed") {
            Style::new().fg(Color::Red)
        } else {
            Style::new().fg(Color::DarkGray)
        };
        let paragraph = Paragraph::new(Line::styled(message.to_string(), style))
            .centered()
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let [table_area, scrollbar_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(SCROLLBAR_WIDTH as u16),
        ])
        .areas(area);

        let header = Row::new(uidata.table.iter().map(|c| {
            let style = if c.pinned {
                Style::new().fg(Color::Cyan).bold()
            } else {
                Style::new().bold()
            };
            Cell::from(c.name.clone()).style(style)
        }))
        .style(Style::new().underlined());

        let nrows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
        let rows = (0..nrows).map(|ridx| {
            let cells = uidata.table.iter().enumerate().map(|(cidx, c)| {
                let mut style = if c.pinned {
                    Style::new().fg(Color::Cyan)
                } else {
                    Style::new()
                };
                if ridx == uidata.selected_row && cidx == uidata.selected_column {
                    style = style.add_modifier(Modifier::REVERSED);
                }
                Cell::from(c.data[ridx].clone()).style(style)
            });
            let row = Row::new(cells);
            if ridx == uidata.selected_row {
                row.style(Style::new().bg(Color::DarkGray))
            } else {
                row
            }
        });

        let widths = uidata
            .table
            .iter()
            .map(|c| Constraint::Length(c.width.min(self.max_column_width) as u16));
        let table = Table::new(rows, widths).header(header).column_spacing(1);
        frame.render_widget(table, table_area);

        let mut state = ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            scrollbar_area,
            &mut state,
        );
    }

    fn draw_statusline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let [left, right] =
            Layout::horizontal([Constraint::Fill(1), Constraint::Length(48)]).areas(area);
        frame.render_widget(Paragraph::new(uidata.status_message.clone()), left);

        let mut info = vec![
            format!(
                " {}/{} of {} ",
                (uidata.abs_selected_row + 1).min(uidata.nrows),
                uidata.nrows,
                uidata.total_rows
            )
            .yellow(),
        ];
        if let Some((column, ascending)) = &uidata.sort {
            let arrow = if *ascending { "↑" } else { "↓" };
            info.push(format!("{column}{arrow} ").blue());
        }
        info.push(" <?> help ".blue().bold());
        frame.render_widget(Paragraph::new(Line::from(info)).right_aligned(), right);
    }

    fn draw_popup(&self, message: &str, frame: &mut Frame) {
        let [area] = Layout::vertical([Constraint::Percentage(80)])
            .flex(Flex::Center)
            .areas(frame.area());
        let [area] = Layout::horizontal([Constraint::Percentage(50)])
            .flex(Flex::Center)
            .areas(area);
        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> close ".blue()).centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(message.to_string()).block(block), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rounds(curser: Option<usize>) -> FilterLine {
        FilterLine {
            label: "Round".to_string(),
            grouped: true,
            options: (1..=20).map(|r| (r.to_string(), r == 3)).collect(),
            curser,
        }
    }

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn unfocused_line_starts_at_first_option() {
        let line = TableUI::filter_line(&rounds(None), 40);
        assert!(text(&line).starts_with("Round: [ ] 1  [ ] 2  [x] 3  "));
    }

    #[test]
    fn highlighted_option_is_scrolled_into_view() {
        let width = 40;
        let line = TableUI::filter_line(&rounds(Some(19)), width);
        let shown = text(&line);
        assert!(shown.starts_with("Round: « "));
        assert!(!shown.contains("[ ] 1  "));

        // Everything up to and including the highlighted option fits
        let end = shown.find("[ ] 20").unwrap() + "[ ] 20".len();
        assert!(shown[..end].chars().count() <= width);
        let highlighted = line.spans.iter().find(|s| s.content == "[ ] 20").unwrap();
        assert!(highlighted.style.add_modifier.contains(Modifier::REVERSED));
    }
}
