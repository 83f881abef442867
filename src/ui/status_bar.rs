use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use crate::Theme;
use crate::ui::{Keybinding, truncate_with_ellipsis};

const LOGO: &[&str] = &[
    r"   __ _ ___ ___| |_ ",
    r"  / _` |_ // __| __|",
    r" | (_| |/ /| (__| |_",
    r"  \__,_/___|\___|\__|",
];

/// Five info lines plus borders.
pub const STATUS_BAR_HEIGHT: u16 = 7;

const LABEL_WIDTH: usize = 10;
const HINT_COLUMN_WIDTH: u16 = 18;

/// One `label: value` entry in the left column.
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub label: &'static str,
    pub value: String,
    pub color: Color,
}

impl StatusLine {
    pub fn new(label: &'static str, value: impl Into<String>, color: Color) -> Self {
        Self {
            label,
            value: value.into(),
            color,
        }
    }
}

/// Bottom bar: session info, key hints, and the logo.
pub struct StatusBar<'a> {
    info: Vec<StatusLine>,
    hints: &'a [Keybinding],
}

impl<'a> StatusBar<'a> {
    pub const fn new(info: Vec<StatusLine>, hints: &'a [Keybinding]) -> Self {
        Self { info, hints }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.border()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [info, hints, logo] = Layout::horizontal([
            Constraint::Length(42),
            Constraint::Min(20),
            Constraint::Length(22),
        ])
        .areas(inner);

        self.render_info(frame, info, theme);
        self.render_hints(frame, hints, theme);
        render_logo(frame, logo, theme);
    }

    fn render_info(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let value_width = (area.width as usize).saturating_sub(LABEL_WIDTH + 2);
        let lines: Vec<Line> = self
            .info
            .iter()
            .map(|line| {
                Line::from(vec![
                    Span::styled(
                        format!("{:>LABEL_WIDTH$}", line.label),
                        Style::default()
                            .fg(theme.subtext0())
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("  "),
                    Span::styled(
                        truncate_with_ellipsis(&line.value, value_width),
                        Style::default().fg(line.color),
                    ),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), area);
    }

    fn render_hints(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let hints: Vec<&Keybinding> = self.hints.iter().filter(|kb| kb.hint).collect();
        let rows = usize::from(area.height).max(1);
        let num_cols = usize::from((area.width / HINT_COLUMN_WIDTH).max(1));

        let mut columns: Vec<Vec<Line>> = vec![Vec::new(); num_cols];
        for (i, kb) in hints.iter().enumerate() {
            let Some(column) = columns.get_mut(i / rows) else {
                break;
            };
            column.push(Line::from(vec![
                Span::styled(format!("{:>6}", kb.key), Style::default().fg(theme.peach())),
                Span::raw(" "),
                Span::styled(
                    kb.description.clone(),
                    Style::default().fg(theme.subtext0()),
                ),
            ]));
        }

        let areas =
            Layout::horizontal(vec![Constraint::Length(HINT_COLUMN_WIDTH); num_cols]).split(area);
        for (lines, column_area) in columns.into_iter().zip(areas.iter()) {
            frame.render_widget(Paragraph::new(lines), *column_area);
        }
    }
}

fn render_logo(frame: &mut Frame, area: Rect, theme: &Theme) {
    let lines: Vec<Line> = LOGO
        .iter()
        .map(|line| {
            Line::from(Span::styled(
                *line,
                Style::default()
                    .fg(theme.secondary())
                    .add_modifier(Modifier::BOLD),
            ))
        })
        .collect();
    frame.render_widget(Paragraph::new(lines), area);
}
