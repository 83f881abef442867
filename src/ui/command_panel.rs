//! Tracks background commands for the inline indicator and the commands panel.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph};

use crate::Theme;

const MAX_HISTORY: usize = 10;
const VISIBLE_HISTORY: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId(u64);

#[derive(Debug)]
struct Running {
    id: CommandId,
    name: String,
    started_at: Instant,
}

#[derive(Debug)]
struct Finished {
    name: String,
    success: bool,
    duration: Duration,
    completed_at: Instant,
}

#[derive(Default)]
pub struct CommandPanel {
    running: Vec<Running>,
    history: VecDeque<Finished>,
    next_id: u64,
    expanded: bool,
}

impl CommandPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, name: impl Into<String>, now: Instant) -> CommandId {
        let id = CommandId(self.next_id);
        self.next_id += 1;
        self.running.push(Running {
            id,
            name: name.into(),
            started_at: now,
        });
        id
    }

    pub fn complete(&mut self, id: CommandId, success: bool, now: Instant) {
        let Some(pos) = self.running.iter().position(|c| c.id == id) else {
            return;
        };
        let cmd = self.running.remove(pos);
        self.history.push_front(Finished {
            name: cmd.name,
            success,
            duration: now.duration_since(cmd.started_at),
            completed_at: now,
        });
        self.history.truncate(MAX_HISTORY);
    }

    pub const fn toggle_expanded(&mut self) {
        self.expanded = !self.expanded;
    }

    #[cfg(test)]
    fn running_count(&self) -> usize {
        self.running.len()
    }

    #[cfg(test)]
    fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Compact text for the header line, e.g. `Stop vm-1 1.2s (+1)`.
    pub fn inline_status(&self, now: Instant) -> Option<String> {
        let first = self.running.first()?;
        let elapsed = format_duration(now.duration_since(first.started_at));
        Some(match self.running.len() {
            1 => format!("{} {elapsed}", first.name),
            n => format!("{} {elapsed} (+{})", first.name, n - 1),
        })
    }

    /// Panel anchored to the bottom right of `area`.
    pub fn render_panel(&self, frame: &mut Frame, area: Rect, theme: &Theme, now: Instant) {
        if !self.expanded {
            return;
        }

        let running_lines = if self.running.is_empty() {
            0
        } else {
            self.running.len() + 1
        };
        let shown_history = self.history.len().min(VISIBLE_HISTORY);
        let history_lines = if shown_history == 0 {
            0
        } else {
            shown_history + 1
        };
        let separator = usize::from(running_lines > 0 && history_lines > 0);
        let content_lines = running_lines + history_lines + separator;
        if content_lines == 0 {
            return;
        }

        let width = 65u16.min(area.width.saturating_sub(4));
        let height = (content_lines as u16 + 2).min(15);
        let x = area.right().saturating_sub(width + 2);
        let y = area.bottom().saturating_sub(height + 1);
        let panel_area = Rect::new(x, y, width, height);

        frame.render_widget(Clear, panel_area);

        let title = if self.running.is_empty() {
            format!(" Commands ({} recent) ", self.history.len())
        } else {
            format!(
                " Commands ({} running, {} recent) ",
                self.running.len(),
                self.history.len()
            )
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface2()))
            .title(title)
            .title_style(
                Style::default()
                    .fg(theme.secondary())
                    .add_modifier(Modifier::BOLD),
            )
            .style(Style::default().bg(theme.mantle()));

        let inner = block.inner(panel_area);
        frame.render_widget(block, panel_area);

        let inner_width = inner.width as usize;
        let mut lines: Vec<Line> = Vec::new();

        if !self.running.is_empty() {
            lines.push(section_header("RUNNING", theme.warning()));
            let time_col = 10;
            let name_width = inner_width.saturating_sub(4 + time_col);
            for cmd in &self.running {
                let elapsed = format_duration(now.duration_since(cmd.started_at));
                lines.push(row(
                    Span::styled("•", Style::default().fg(theme.peach())),
                    &cmd.name,
                    name_width,
                    format!("{elapsed:>time_col$}"),
                    Style::default().fg(theme.text()),
                    Style::default().fg(theme.overlay1()),
                ));
            }
        }

        if separator == 1 {
            lines.push(Line::raw(""));
        }

        if !self.history.is_empty() {
            lines.push(section_header("RECENT", theme.subtext0()));
            let time_col = 18;
            let name_width = inner_width.saturating_sub(4 + time_col);
            for cmd in self.history.iter().take(VISIBLE_HISTORY) {
                let (icon, color) = if cmd.success {
                    ("✓", theme.success())
                } else {
                    ("✗", theme.error())
                };
                let info = format!(
                    "{} · {}",
                    format_duration(cmd.duration),
                    format_age(now.duration_since(cmd.completed_at))
                );
                lines.push(row(
                    Span::styled(icon, Style::default().fg(color)),
                    &cmd.name,
                    name_width,
                    format!("{info:>time_col$}"),
                    Style::default().fg(theme.subtext1()),
                    Style::default().fg(theme.overlay0()),
                ));
            }
        }

        frame.render_widget(Paragraph::new(lines), inner);
    }
}

fn section_header(label: &'static str, color: ratatui::style::Color) -> Line<'static> {
    Line::from(Span::styled(
        label,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    ))
}

fn row(
    icon: Span<'static>,
    name: &str,
    name_width: usize,
    time: String,
    name_style: Style,
    time_style: Style,
) -> Line<'static> {
    let name = truncate_with_ellipsis(name, name_width);
    let padding = name_width.saturating_sub(name.chars().count());
    Line::from(vec![
        Span::raw("  "),
        icon,
        Span::raw(" "),
        Span::styled(name, name_style),
        Span::raw(" ".repeat(padding)),
        Span::styled(time, time_style.add_modifier(Modifier::DIM)),
    ])
}

pub fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let head: String = s.chars().take(max_len - 1).collect();
    format!("{head}…")
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 10.0 {
        format!("{secs:.1}s")
    } else if secs < 60.0 {
        format!("{secs:.0}s")
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

pub fn format_age(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 5 {
        "just now".to_string()
    } else if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}
