use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Cell, Row};

use super::{RenderModel, status_color};
use crate::dispatcher::ActionStatus;
use crate::model::{Resource, Scope, last_segment, parse_subscription_id, short_type};
use crate::ui::{ColumnDef, SearchBar, TableView, spinner_frame};

const SUBSCRIPTION_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("Name", Constraint::Fill(2)),
    ColumnDef::new("Subscription ID", Constraint::Length(38)),
    ColumnDef::new("State", Constraint::Length(24)),
];

const GROUP_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("Name", Constraint::Fill(2)),
    ColumnDef::new("Location", Constraint::Length(18)),
    ColumnDef::new("State", Constraint::Length(24)),
];

const TYPE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("Type", Constraint::Fill(2)),
    ColumnDef::new("Provider", Constraint::Fill(1)),
    ColumnDef::new("Resources", Constraint::Length(10)),
];

const CONTAINER_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("Name", Constraint::Fill(2)),
    ColumnDef::new("Public access", Constraint::Length(14)),
    ColumnDef::new("Lease", Constraint::Length(12)),
    ColumnDef::new("Last modified", Constraint::Length(26)),
];

const VAULT_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("Name", Constraint::Fill(2)),
    ColumnDef::new("Kind", Constraint::Length(12)),
    ColumnDef::new("Updated", Constraint::Length(22)),
    ColumnDef::new("State", Constraint::Length(24)),
];

pub(super) fn render(frame: &mut Frame, area: Rect, model: &RenderModel) {
    let theme = model.theme;
    let navigator = model.navigator;
    let level = navigator.current();
    let visible = navigator.visible(model.resources());

    let columns = match level.scope {
        Scope::Subscriptions => SUBSCRIPTION_COLUMNS,
        Scope::Subscription { .. } | Scope::ResourceType { .. } => GROUP_COLUMNS,
        Scope::ResourceGroup { .. } => TYPE_COLUMNS,
        Scope::Containers { .. } => CONTAINER_COLUMNS,
        Scope::Vault { .. } => VAULT_COLUMNS,
    };

    let rows: Vec<Row> = visible
        .iter()
        .map(|resource| {
            let name = Cell::from(Line::from(vec![
                Span::styled(
                    model.registry.get(resource.kind).icon(),
                    Style::default().fg(theme.info()),
                ),
                Span::raw(" "),
                Span::raw(resource.name.clone()),
            ]));
            let location = resource.location.clone().unwrap_or_default();
            let state = state_cell(resource, model);
            match level.scope {
                Scope::Subscriptions => Row::new(vec![
                    name,
                    Cell::from(parse_subscription_id(&resource.id).unwrap_or_default()),
                    state,
                ]),
                Scope::Subscription { .. } | Scope::ResourceType { .. } => {
                    Row::new(vec![name, Cell::from(location), state])
                }
                Scope::ResourceGroup { .. } => Row::new(vec![
                    name,
                    Cell::from(
                        resource
                            .type_name
                            .split_once('/')
                            .map_or("", |(provider, _)| provider)
                            .to_string(),
                    ),
                    Cell::from(property(resource, "count")),
                ]),
                Scope::Containers { .. } => Row::new(vec![
                    name,
                    Cell::from(property(resource, "publicAccess")),
                    Cell::from(property(resource, "leaseState")),
                    Cell::from(property(resource, "lastModifiedTime")),
                ]),
                Scope::Vault { .. } => Row::new(vec![
                    name,
                    Cell::from(model.registry.get(resource.kind).display_name().trim_end_matches('s')),
                    Cell::from(property(resource, "updated")),
                    state,
                ]),
            }
        })
        .collect();

    let title = Line::from(vec![
        Span::raw(" "),
        Span::raw(scope_title(&level.scope)),
        Span::styled(
            format!(" ({}) ", visible.len()),
            Style::default().fg(theme.subtext0()),
        ),
    ]);

    let search = (navigator.is_searching() || !level.filter.is_empty()).then(|| SearchBar {
        query: &level.filter,
        editing: navigator.is_searching(),
        matches: visible.len(),
    });

    let selected = (!visible.is_empty()).then_some(level.selected);
    let mut table = TableView::new(columns, rows)
        .selected(selected, level.offset)
        .title(title)
        .search(search);

    if let Some(freshness) = freshness(model) {
        table = table.title_right(freshness);
    }
    if visible.is_empty() {
        table = table.placeholder(placeholder(model, &level.filter));
    }

    table.render(frame, area, theme);
}

fn scope_title(scope: &Scope) -> String {
    match scope {
        Scope::Subscriptions => "Subscriptions".to_string(),
        Scope::Subscription { .. } => "Resource Groups".to_string(),
        Scope::ResourceGroup { resource_group, .. } => format!("Resource types in {resource_group}"),
        Scope::ResourceType {
            resource_group,
            type_name,
            ..
        } => format!("{} in {resource_group}", short_type(type_name)),
        Scope::Containers { account_id } => format!("Containers in {}", last_segment(account_id)),
        Scope::Vault { vault_id } => format!("Secrets, keys and certificates in {}", last_segment(vault_id)),
    }
}

fn property(resource: &Resource, path: &str) -> String {
    resource.property(path).unwrap_or_default()
}

/// Status cell. An action on the resource overrides the provider status.
fn state_cell<'a>(resource: &Resource, model: &RenderModel) -> Cell<'a> {
    let theme = model.theme;
    let latest = model.dispatcher.for_resource(&resource.id).last();

    match latest.map(|a| (&a.status, a.action)) {
        Some((ActionStatus::Queued | ActionStatus::InFlight, action)) => Cell::from(Line::from(vec![
            Span::styled(
                spinner_frame(model.tick),
                Style::default().fg(theme.warning()),
            ),
            Span::styled(
                format!(" {}", action.progressive()),
                Style::default()
                    .fg(theme.warning())
                    .add_modifier(Modifier::ITALIC),
            ),
        ])),
        Some((ActionStatus::Failed(_), action)) => Cell::from(Span::styled(
            format!("✗ {action} failed"),
            Style::default().fg(theme.error()),
        )),
        Some((ActionStatus::Succeeded, _)) | None => Cell::from(Span::styled(
            resource.status.label(),
            Style::default().fg(status_color(theme, resource.status)),
        )),
    }
}

/// Right-hand title: how current the rows are.
fn freshness<'a>(model: &RenderModel) -> Option<Line<'a>> {
    let theme = model.theme;
    let view = model.view?;

    if let Some(error) = view.error.as_ref().filter(|e| e.is_retryable()) {
        return Some(Line::from(Span::styled(
            format!(" retrying: {error} "),
            Style::default().fg(theme.error()),
        )));
    }
    // Shown inline instead when there is nothing to list.
    if let Some(error) = &view.error
        && !view.resources.is_empty()
    {
        return Some(Line::from(Span::styled(
            format!(" {error} "),
            Style::default().fg(theme.error()),
        )));
    }
    if view.refreshing && view.loaded {
        return Some(Line::from(vec![
            Span::styled(
                format!(" {} ", spinner_frame(model.tick)),
                Style::default().fg(theme.info()),
            ),
            Span::styled("refreshing ", Style::default().fg(theme.info())),
        ]));
    }
    if view.stale {
        return Some(Line::from(Span::styled(
            " stale ",
            Style::default().fg(theme.warning()),
        )));
    }
    None
}

fn placeholder<'a>(model: &RenderModel, filter: &str) -> Line<'a> {
    let theme = model.theme;
    let scope = model.navigator.scope();

    let Some(view) = model.view else {
        return loading(model);
    };
    if let Some(error) = view.error.as_ref().filter(|e| !e.is_retryable()) {
        return Line::from(Span::styled(
            error.to_string(),
            Style::default().fg(theme.error()),
        ));
    }
    if !view.loaded {
        return loading(model);
    }
    if !filter.is_empty() {
        return Line::from(Span::styled(
            format!("No matches for '{filter}'"),
            Style::default().fg(theme.muted()),
        ));
    }
    Line::from(Span::styled(
        format!("No resources in {scope}"),
        Style::default().fg(theme.muted()),
    ))
}

fn loading<'a>(model: &RenderModel) -> Line<'a> {
    Line::from(vec![
        Span::styled(
            spinner_frame(model.tick),
            Style::default().fg(model.theme.border_focused()),
        ),
        Span::styled(" Loading…", Style::default().fg(model.theme.subtext0())),
    ])
}
