use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};

use super::{RenderModel, status_color};
use crate::config::ResourceAction;
use crate::dispatcher::{ActionStatus, PendingAction};
use crate::model::Resource;
use crate::Theme;
use crate::ui::{format_age, format_duration, spinner_frame};

const LABEL_WIDTH: usize = 16;

pub(super) fn render(frame: &mut Frame, area: Rect, model: &RenderModel, resource_id: &str) {
    let theme = model.theme;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.border_focused()))
        .title_style(
            Style::default()
                .fg(theme.secondary())
                .add_modifier(Modifier::BOLD),
        );

    let Some(resource) = model.resources().iter().find(|r| r.id == resource_id) else {
        let message = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                "This resource is no longer listed in the current scope.",
                Style::default().fg(theme.muted()),
            )),
        ])
        .alignment(Alignment::Center)
        .block(block.title(" Details "));
        frame.render_widget(message, area);
        return;
    };

    let handler = model.registry.get(resource.kind);
    let block = block.title(format!(" {} {} ", handler.icon(), resource.name));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let actions: Vec<&PendingAction> = model.dispatcher.for_resource(&resource.id).collect();
    let actions_height = if actions.is_empty() {
        0
    } else {
        actions.len() as u16 + 3
    };
    let [fields_area, actions_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(actions_height),
    ])
    .areas(inner);

    let mut lines = common_fields(resource, model);
    let extra = handler.detail_fields(resource);
    if !extra.is_empty() {
        lines.push(Line::from(""));
        lines.push(section(handler.display_name(), theme));
        lines.extend(extra.iter().map(|(label, value)| field(label, value.clone(), theme)));
    }
    lines.push(Line::from(""));
    lines.push(section("Properties", theme));
    lines.extend(properties(resource, theme));

    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        fields_area,
    );

    if !actions.is_empty() {
        render_actions(frame, actions_area, model, &actions);
    }
}

fn common_fields<'a>(resource: &Resource, model: &RenderModel) -> Vec<Line<'a>> {
    let theme = model.theme;
    let refreshed = resource.refreshed_at.with_timezone(&chrono::Local);
    let tags = if resource.tags.is_empty() {
        "None".to_string()
    } else {
        resource
            .tags
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    };

    vec![
        field("ID", resource.id.clone(), theme),
        field("Name", resource.name.clone(), theme),
        field("Type", resource.type_name.clone(), theme),
        field("Location", optional(resource.location.as_deref()), theme),
        field(
            "Resource Group",
            optional(resource.resource_group.as_deref()),
            theme,
        ),
        field(
            "Subscription",
            optional(resource.subscription_id().as_deref()),
            theme,
        ),
        Line::from(vec![
            label("Status", theme),
            Span::styled(
                resource.status.label(),
                Style::default()
                    .fg(status_color(theme, resource.status))
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        field(
            "Refreshed",
            refreshed.format("%Y-%m-%d %H:%M:%S").to_string(),
            theme,
        ),
        field("Tags", tags, theme),
    ]
}

/// Top-level properties, one per line. Nested values are shown as compact JSON.
fn properties<'a>(resource: &Resource, theme: &Theme) -> Vec<Line<'a>> {
    if resource.properties.is_empty() {
        return vec![Line::from(Span::styled(
            "  (none)",
            Style::default().fg(theme.muted()),
        ))];
    }
    resource
        .properties
        .iter()
        .map(|(key, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Line::from(vec![
                Span::styled(format!("  {key}: "), Style::default().fg(theme.subtext0())),
                Span::styled(text, Style::default().fg(theme.text())),
            ])
        })
        .collect()
}

fn render_actions(
    frame: &mut Frame,
    area: Rect,
    model: &RenderModel,
    actions: &[&PendingAction],
) {
    let theme = model.theme;
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(theme.border()))
        .title(" Actions ")
        .title_style(Style::default().fg(theme.subtext0()).add_modifier(Modifier::BOLD));

    let mut lines: Vec<Line> = actions
        .iter()
        .map(|action| {
            let (marker, color) = match &action.status {
                ActionStatus::Queued | ActionStatus::InFlight => {
                    (spinner_frame(model.tick), theme.warning())
                }
                ActionStatus::Succeeded => ("✓", theme.success()),
                ActionStatus::Failed(_) => ("✗", theme.error()),
            };
            let timing = if action.status.is_terminal() {
                action
                    .finished_at
                    .map(|at| format_age(model.now.saturating_duration_since(at)))
                    .unwrap_or_default()
            } else {
                format!("for {}", format_duration(action.elapsed(model.now)))
            };
            Line::from(vec![
                Span::styled(format!("  {marker} "), Style::default().fg(color)),
                Span::styled(
                    format!("{:<8}", action.action.label()),
                    Style::default().fg(theme.text()).add_modifier(Modifier::BOLD),
                ),
                Span::styled(action.status.label(), Style::default().fg(color)),
                Span::styled(format!("  {timing}"), Style::default().fg(theme.muted())),
            ])
        })
        .collect();

    if actions.iter().any(|a| a.status.is_terminal()) {
        lines.push(Line::from(Span::styled(
            format!(
                "  Press {} to clear finished actions",
                model.resolver.display_resource(ResourceAction::Acknowledge)
            ),
            Style::default().fg(theme.muted()),
        )));
    }

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn section<'a>(title: &str, theme: &Theme) -> Line<'a> {
    Line::from(Span::styled(
        format!("── {title} ──"),
        Style::default()
            .fg(theme.subtext0())
            .add_modifier(Modifier::BOLD),
    ))
}

fn label<'a>(text: &str, theme: &Theme) -> Span<'a> {
    Span::styled(
        format!("{text:>LABEL_WIDTH$}  "),
        Style::default()
            .fg(theme.header())
            .add_modifier(Modifier::BOLD),
    )
}

fn field<'a>(name: &str, value: String, theme: &Theme) -> Line<'a> {
    Line::from(vec![
        label(name, theme),
        Span::styled(value, Style::default().fg(theme.text())),
    ])
}

fn optional(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}
