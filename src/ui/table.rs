use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState};

use crate::Theme;

pub struct ColumnDef {
    pub header: &'static str,
    pub constraint: Constraint,
}

impl ColumnDef {
    pub const fn new(header: &'static str, constraint: Constraint) -> Self {
        Self { header, constraint }
    }
}

/// Filter line shown under the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchBar<'a> {
    pub query: &'a str,
    /// Still typing, as opposed to a filter that was submitted.
    pub editing: bool,
    pub matches: usize,
}

/// Table drawn from borrowed rows and an externally owned selection.
///
/// Selection and scroll offset live in the caller's state, so drawing never
/// mutates anything.
pub struct TableView<'a> {
    columns: &'a [ColumnDef],
    rows: Vec<Row<'a>>,
    selected: Option<usize>,
    offset: usize,
    title: Line<'a>,
    title_right: Option<Line<'a>>,
    search: Option<SearchBar<'a>>,
    placeholder: Option<Line<'a>>,
}

impl<'a> TableView<'a> {
    pub fn new(columns: &'a [ColumnDef], rows: Vec<Row<'a>>) -> Self {
        Self {
            columns,
            rows,
            selected: None,
            offset: 0,
            title: Line::default(),
            title_right: None,
            search: None,
            placeholder: None,
        }
    }

    pub const fn selected(mut self, selected: Option<usize>, offset: usize) -> Self {
        self.selected = selected;
        self.offset = offset;
        self
    }

    pub fn title(mut self, title: impl Into<Line<'a>>) -> Self {
        self.title = title.into();
        self
    }

    pub fn title_right(mut self, title: impl Into<Line<'a>>) -> Self {
        self.title_right = Some(title.into().right_aligned());
        self
    }

    pub fn search(mut self, search: Option<SearchBar<'a>>) -> Self {
        self.search = search;
        self
    }

    /// Message drawn inside the table body when there are no rows.
    pub fn placeholder(mut self, placeholder: impl Into<Line<'a>>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    /// Number of body rows visible in `area`, after borders, header and search bar.
    pub fn page_size(area: Rect, with_search: bool) -> usize {
        let chrome = 3 + u16::from(with_search);
        usize::from(area.height.saturating_sub(chrome)).max(1)
    }

    pub fn render(self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let (table_area, search_area) = if self.search.is_some() {
            let [table, search] =
                Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(area);
            (table, Some(search))
        } else {
            (area, None)
        };

        let header = Row::new(self.columns.iter().map(|c| {
            Cell::from(c.header).style(
                Style::default()
                    .fg(theme.header())
                    .add_modifier(Modifier::BOLD),
            )
        }))
        .height(1)
        .style(Style::default().bg(theme.surface0()));

        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.border()))
            .title(self.title)
            .title_style(
                Style::default()
                    .fg(theme.secondary())
                    .add_modifier(Modifier::BOLD),
            );
        if let Some(right) = self.title_right {
            block = block.title(right);
        }

        let is_empty = self.rows.is_empty();
        let body = block.inner(table_area);
        let table = Table::new(self.rows, self.columns.iter().map(|c| c.constraint))
            .header(header)
            .style(Style::default().fg(theme.text()))
            .row_highlight_style(
                Style::default()
                    .bg(theme.selection_bg())
                    .fg(theme.lavender())
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ")
            .block(block);

        let mut state = TableState::default()
            .with_offset(self.offset)
            .with_selected(self.selected);
        frame.render_stateful_widget(table, table_area, &mut state);

        if is_empty
            && let Some(placeholder) = self.placeholder
            && body.height > 2
        {
            let [_, message] = Layout::vertical([Constraint::Length(2), Constraint::Min(0)]).areas(body);
            frame.render_widget(
                Paragraph::new(placeholder.centered()).style(Style::default().fg(theme.overlay1())),
                message,
            );
        }

        if let (Some(search), Some(search_area)) = (self.search, search_area) {
            let (text, style) = if search.editing {
                (
                    format!("/{}_", search.query),
                    Style::default().fg(theme.warning()),
                )
            } else {
                (
                    format!("/{} ({} matches)", search.query, search.matches),
                    Style::default().fg(theme.subtext0()),
                )
            };
            frame.render_widget(Paragraph::new(text).style(style), search_area);
        }
    }
}
