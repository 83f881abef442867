//! Frame drawing.
//!
//! [`render`] is a pure function of [`RenderModel`]: it borrows application
//! state and never changes it, so the same model always produces the same
//! frame.

mod detail;
mod list;

use std::sync::Arc;
use std::time::Instant;

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};

use crate::Theme;
use crate::azure::UserInfo;
use crate::cache::CacheView;
use crate::config::{GlobalAction, KeyResolver};
use crate::dispatcher::ActionDispatcher;
use crate::model::{Resource, ResourceStatus, Scope};
use crate::navigation::{Confirmation, Navigator, Origin, Screen};
use crate::registry::HandlerRegistry;
use crate::ui::{
    CommandPanel, Component, ConfirmDialog, Keybinding, STATUS_BAR_HEIGHT, StatusBar, StatusLine,
    TableView, ToastManager, spinner_frame,
};

/// Sign-in state of the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Authenticating,
    Ready(UserInfo),
    /// Credentials were rejected. Nothing but quitting is possible.
    AuthFailed(String),
}

impl Session {
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::AuthFailed(_))
    }
}

/// Everything a frame is drawn from.
pub struct RenderModel<'a> {
    pub navigator: &'a Navigator,
    /// Cache entry of the current scope, `None` before the first fetch starts.
    pub view: Option<&'a CacheView>,
    pub dispatcher: &'a ActionDispatcher,
    pub session: &'a Session,
    pub registry: &'a HandlerRegistry,
    pub resolver: &'a Arc<KeyResolver>,
    pub theme: &'a Theme,
    pub commands: &'a CommandPanel,
    pub toasts: &'a ToastManager,
    /// Key hints for the status bar.
    pub hints: &'a [Keybinding],
    /// Animation counter for spinners.
    pub tick: u64,
    pub now: Instant,
}

impl RenderModel<'_> {
    fn resources(&self) -> &[Resource] {
        self.view.map(|v| v.resources.as_ref()).unwrap_or(&[])
    }
}

pub struct Areas {
    pub header: Rect,
    pub body: Rect,
    pub status: Rect,
}

pub fn layout(area: Rect) -> Areas {
    let [header, body, status] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(STATUS_BAR_HEIGHT),
    ])
    .areas(area);
    Areas {
        header,
        body,
        status,
    }
}

/// Rows of the resource list that fit on a terminal of `size`.
pub fn page_size(size: Rect, navigator: &Navigator) -> usize {
    let body = layout(size).body;
    let with_search = navigator.is_searching() || !navigator.current().filter.is_empty();
    TableView::page_size(body, with_search)
}

/// Confirmation dialog for a pending confirmation.
pub fn confirm_dialog(confirmation: &Confirmation, resolver: Arc<KeyResolver>) -> ConfirmDialog {
    let Confirmation {
        resource, action, ..
    } = confirmation;
    let dialog = ConfirmDialog::new(
        format!("{} {} '{}'?", action.label(), resource.short_type(), resource.name),
        resolver,
    )
    .with_title(format!("{} resource", action.label()))
    .with_detail(resource.id.clone())
    .with_confirm_text(action.label());
    if action.is_destructive() {
        dialog.danger()
    } else {
        dialog
    }
}

pub fn render(frame: &mut Frame, model: &RenderModel) {
    let full = frame.area();
    let areas = layout(full);

    render_header(frame, areas.header, model);

    match (model.session, model.navigator.screen()) {
        (Session::AuthFailed(reason), _) => render_auth_error(frame, areas.body, model, reason),
        (_, Screen::Detail { resource_id }) => {
            detail::render(frame, areas.body, model, resource_id);
        }
        (
            _,
            Screen::Confirm(Confirmation {
                origin: Origin::Detail,
                resource,
                ..
            }),
        ) => detail::render(frame, areas.body, model, &resource.id),
        (_, Screen::List | Screen::Confirm(_) | Screen::Exited) => {
            list::render(frame, areas.body, model);
        }
    }

    render_status_bar(frame, areas.status, model);

    if !model.session.is_failed()
        && let Screen::Confirm(confirmation) = model.navigator.screen()
    {
        confirm_dialog(confirmation, model.resolver.clone()).render(frame, full, model.theme);
    }

    model
        .commands
        .render_panel(frame, areas.body, model.theme, model.now);
    model.toasts.render(frame, areas.body, model.theme);
}

fn status_color(theme: &Theme, status: ResourceStatus) -> ratatui::style::Color {
    match status {
        ResourceStatus::Running | ResourceStatus::Enabled => theme.success(),
        ResourceStatus::Stopped | ResourceStatus::Disabled => theme.peach(),
        ResourceStatus::Transitioning => theme.warning(),
        ResourceStatus::Unknown => theme.muted(),
    }
}

fn render_header(frame: &mut Frame, area: Rect, model: &RenderModel) {
    let theme = model.theme;

    let activity = model.commands.inline_status(model.now).map(|status| {
        Line::from(vec![
            Span::styled(
                spinner_frame(model.tick),
                Style::default().fg(theme.border_focused()),
            ),
            Span::raw(" "),
            Span::styled(status, Style::default().fg(theme.subtext0())),
            Span::raw(" "),
        ])
    });
    let activity_width = activity.as_ref().map_or(0, |l| l.width() as u16);

    let [crumbs_area, activity_area] =
        Layout::horizontal([Constraint::Min(0), Constraint::Length(activity_width)]).areas(area);

    let crumbs = model.navigator.breadcrumbs();
    let last = crumbs.len().saturating_sub(1);
    let mut spans = vec![Span::raw(" ")];
    for (i, crumb) in crumbs.into_iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" › ", Style::default().fg(theme.overlay0())));
        }
        let style = if i == last {
            Style::default()
                .fg(theme.secondary())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.subtext0())
        };
        spans.push(Span::styled(crumb.to_string(), style));
    }
    if let Screen::Detail { resource_id } = model.navigator.screen()
        && let Some(resource) = model.resources().iter().find(|r| &r.id == resource_id)
    {
        spans.push(Span::styled(" › ", Style::default().fg(theme.overlay0())));
        spans.push(Span::styled(
            resource.name.clone(),
            Style::default()
                .fg(theme.border_focused())
                .add_modifier(Modifier::BOLD),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), crumbs_area);

    if let Some(activity) = activity {
        frame.render_widget(Paragraph::new(activity), activity_area);
    }
}

fn render_auth_error(frame: &mut Frame, area: Rect, model: &RenderModel, reason: &str) {
    let theme = model.theme;
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Could not sign in to Azure",
            Style::default()
                .fg(theme.error())
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(reason, Style::default().fg(theme.text()))),
        Line::from(""),
        Line::from(Span::styled(
            "Run `az login`, set AZURE_ACCESS_TOKEN, or set AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET, then restart.",
            Style::default().fg(theme.subtext0()),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!(
                "Press {} to quit",
                model.resolver.display_global(GlobalAction::Quit)
            ),
            Style::default().fg(theme.muted()),
        )),
    ];

    let block = Block::default()
        .title(" Authentication required ")
        .title_style(
            Style::default()
                .fg(theme.error())
                .add_modifier(Modifier::BOLD),
        )
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.error()));

    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn render_status_bar(frame: &mut Frame, area: Rect, model: &RenderModel) {
    let theme = model.theme;

    let (user, tenant) = match model.session {
        Session::Authenticating => (
            StatusLine::new("User", "signing in…", theme.muted()),
            StatusLine::new("Tenant", "-", theme.muted()),
        ),
        Session::Ready(info) => (
            StatusLine::new("User", info.display_name(), theme.text()),
            StatusLine::new(
                "Tenant",
                info.tenant_id.as_deref().unwrap_or("-"),
                theme.text(),
            ),
        ),
        Session::AuthFailed(_) => (
            StatusLine::new("User", "not signed in", theme.error()),
            StatusLine::new("Tenant", "-", theme.muted()),
        ),
    };

    let subscription = match model.navigator.scope() {
        Scope::Subscriptions => StatusLine::new("Sub", "all", theme.muted()),
        scope => StatusLine::new(
            "Sub",
            scope.subscription_id().unwrap_or("-"),
            theme.info(),
        ),
    };

    let cache = match model.view {
        None => StatusLine::new("Cache", "empty", theme.muted()),
        Some(view) if view.error.as_ref().is_some_and(|e| e.is_retryable()) => {
            StatusLine::new("Cache", "retrying", theme.warning())
        }
        Some(view) if view.refreshing => StatusLine::new("Cache", "refreshing", theme.info()),
        Some(view) if !view.loaded => StatusLine::new("Cache", "empty", theme.muted()),
        Some(view) if view.stale => StatusLine::new("Cache", "stale", theme.warning()),
        Some(_) => StatusLine::new("Cache", "fresh", theme.success()),
    };

    let running = model.dispatcher.running().count();
    let actions = StatusLine::new(
        "Actions",
        match running {
            0 => "idle".to_string(),
            n => format!("{n} running"),
        },
        if running == 0 {
            theme.muted()
        } else {
            theme.warning()
        },
    );

    StatusBar::new(vec![user, tenant, subscription, cache, actions], model.hints)
        .render(frame, area, theme);
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::azure::{ClientError, Operation};
    use crate::model::fixtures::{resource, type_summary, vm};
    use crate::model::{ActionKind, ResourceKind};
    use crate::navigation::{NavContext, NavInput};

    struct Fixture {
        navigator: Navigator,
        view: Option<CacheView>,
        dispatcher: ActionDispatcher,
        session: Session,
        registry: HandlerRegistry,
        resolver: Arc<KeyResolver>,
        theme: Theme,
        commands: CommandPanel,
        toasts: ToastManager,
        now: Instant,
    }

    impl Fixture {
        fn new(resources: Vec<Resource>) -> Self {
            Self {
                navigator: Navigator::starting_at(&Scope::resource_type(
                    "sub-1",
                    "rg-1",
                    "Microsoft.Compute/virtualMachines",
                )),
                view: Some(CacheView {
                    resources: Arc::from(resources),
                    loaded: true,
                    stale: false,
                    refreshing: false,
                    error: None,
                }),
                dispatcher: ActionDispatcher::new(Duration::from_secs(3), 5),
                session: Session::Ready(UserInfo {
                    name: Some("Ada Lovelace".into()),
                    email: Some("ada@example.com".into()),
                    tenant_id: Some("tenant-1".into()),
                }),
                registry: HandlerRegistry::with_builtin(),
                resolver: Arc::new(KeyResolver::default()),
                theme: Theme::default(),
                commands: CommandPanel::new(),
                toasts: ToastManager::new(),
                now: Instant::now(),
            }
        }

        fn resources(&self) -> Vec<Resource> {
            self.view
                .as_ref()
                .map(|v| v.resources.to_vec())
                .unwrap_or_default()
        }

        fn input(&mut self, input: NavInput) {
            let resources = self.resources();
            let ctx = NavContext {
                resources: &resources,
                page_size: 10,
            };
            self.navigator.handle(input, &ctx);
        }

        fn draw(&self) -> String {
            let model = RenderModel {
                navigator: &self.navigator,
                view: self.view.as_ref(),
                dispatcher: &self.dispatcher,
                session: &self.session,
                registry: &self.registry,
                resolver: &self.resolver,
                theme: &self.theme,
                commands: &self.commands,
                toasts: &self.toasts,
                hints: &[],
                tick: 0,
                now: self.now,
            };
            let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
            terminal.draw(|frame| render(frame, &model)).unwrap();
            let buffer = terminal.backend().buffer();
            (0..buffer.area.height)
                .map(|y| {
                    (0..buffer.area.width)
                        .map(|x| buffer[(x, y)].symbol())
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    }

    #[test]
    fn test_list_shows_resources_and_status() {
        let fixture = Fixture::new(vec![
            vm("vm-web", ResourceStatus::Running),
            vm("vm-db", ResourceStatus::Stopped),
        ]);
        let screen = fixture.draw();
        assert!(screen.contains("vm-web"));
        assert!(screen.contains("vm-db"));
        assert!(screen.contains("Running"));
        assert!(screen.contains("Stopped"));
        assert!(screen.contains("rg-1"));
        assert!(screen.contains("Ada Lovelace"));
    }

    #[test]
    fn test_in_flight_action_marks_row() {
        let machine = vm("vm-web", ResourceStatus::Running);
        let mut fixture = Fixture::new(vec![machine.clone()]);
        let submission = fixture
            .dispatcher
            .enqueue(
                &machine,
                fixture.navigator.scope().clone(),
                ActionKind::Stop,
                fixture.now,
            )
            .unwrap();
        fixture.dispatcher.on_submitted(
            submission.id,
            Ok(Operation::Pending(crate::azure::OperationHandle::Location(
                "https://example.com/op".into(),
            ))),
            fixture.now,
        );

        let screen = fixture.draw();
        assert!(screen.contains("Stopping"));
        assert!(screen.contains("1 running"));
    }

    #[test]
    fn test_auth_failure_blocks_listing() {
        let mut fixture = Fixture::new(vec![vm("vm-secret", ResourceStatus::Running)]);
        fixture.session = Session::AuthFailed("token expired".into());
        let screen = fixture.draw();
        assert!(screen.contains("Authentication required"));
        assert!(screen.contains("token expired"));
        assert!(screen.contains("az login"));
        assert!(screen.contains("AZURE_CLIENT_SECRET"));
        assert!(!screen.contains("vm-secret"));
    }

    #[test]
    fn test_loading_and_empty_placeholders() {
        let mut fixture = Fixture::new(Vec::new());
        fixture.view = Some(CacheView {
            resources: Arc::from(Vec::new()),
            loaded: false,
            stale: false,
            refreshing: true,
            error: None,
        });
        assert!(fixture.draw().contains("Loading"));

        fixture.view = Some(CacheView {
            resources: Arc::from(Vec::new()),
            loaded: true,
            stale: false,
            refreshing: false,
            error: None,
        });
        assert!(fixture.draw().contains("No resources"));
    }

    #[test]
    fn test_not_found_is_shown_inline() {
        let mut fixture = Fixture::new(Vec::new());
        fixture.view = Some(CacheView {
            resources: Arc::from(Vec::new()),
            loaded: false,
            stale: false,
            refreshing: false,
            error: Some(ClientError::NotFound("resource group rg-1".into())),
        });
        let screen = fixture.draw();
        assert!(screen.contains("not found: resource group rg-1"));
    }

    #[test]
    fn test_freshness_indicators_in_title() {
        let mut fixture = Fixture::new(vec![vm("vm-web", ResourceStatus::Running)]);
        if let Some(view) = fixture.view.as_mut() {
            view.stale = true;
        }
        assert!(fixture.draw().contains("stale"));

        if let Some(view) = fixture.view.as_mut() {
            view.error = Some(ClientError::transient("connection reset"));
        }
        let screen = fixture.draw();
        assert!(screen.contains("retrying: connection reset"));
        // Old rows stay visible while retrying.
        assert!(screen.contains("vm-web"));
    }

    #[test]
    fn test_detail_shows_defaults_and_failure_reason() {
        let machine = vm("vm-web", ResourceStatus::Running);
        let mut fixture = Fixture::new(vec![machine.clone()]);
        let submission = fixture
            .dispatcher
            .enqueue(
                &machine,
                fixture.navigator.scope().clone(),
                ActionKind::Restart,
                fixture.now,
            )
            .unwrap();
        fixture.dispatcher.on_submitted(
            submission.id,
            Err(ClientError::rejected("Conflict", "operation in progress")),
            fixture.now,
        );
        fixture.input(NavInput::ShowDetails);

        let screen = fixture.draw();
        assert!(screen.contains("Resource Group"));
        assert!(screen.contains("westeurope"));
        assert!(screen.contains("Tags"));
        assert!(screen.contains("None"));
        assert!(screen.contains("operation in progress"));
    }

    #[test]
    fn test_detail_lists_tags() {
        let mut machine = vm("vm-web", ResourceStatus::Running);
        machine.tags = BTreeMap::from([("env".to_string(), "prod".to_string())]);
        let mut fixture = Fixture::new(vec![machine]);
        fixture.input(NavInput::ShowDetails);
        assert!(fixture.draw().contains("env=prod"));
    }

    #[test]
    fn test_delete_confirmation_is_drawn() {
        let mut fixture = Fixture::new(vec![vm("vm-web", ResourceStatus::Running)]);
        fixture.input(NavInput::Request(ActionKind::Delete));
        assert!(matches!(fixture.navigator.screen(), Screen::Confirm(_)));

        let screen = fixture.draw();
        assert!(screen.contains("Delete resource"));
        assert!(screen.contains("Delete virtualMachines 'vm-web'?"));
    }

    #[test]
    fn test_resource_group_lists_types_with_counts() {
        let mut fixture = Fixture::new(vec![
            type_summary("Microsoft.Compute/virtualMachines", 3),
            type_summary("Microsoft.Web/sites", 1),
        ]);
        fixture.navigator = Navigator::starting_at(&Scope::resource_group("sub-1", "rg-1"));
        let screen = fixture.draw();
        assert!(screen.contains("Resource types in rg-1"));
        assert!(screen.contains("virtualMachines"));
        assert!(screen.contains("Microsoft.Compute"));
        assert!(screen.contains("Provider"));
    }

    #[test]
    fn test_vault_lists_item_kinds_and_state() {
        let vault = resource("kv-prod", ResourceKind::KeyVault, ResourceStatus::Unknown);
        let mut fixture = Fixture::new(vec![
            resource("db-password", ResourceKind::Secret, ResourceStatus::Enabled),
            resource("signing", ResourceKind::Key, ResourceStatus::Disabled),
        ]);
        fixture.navigator = Navigator::starting_at(&Scope::Vault { vault_id: vault.id });
        let screen = fixture.draw();
        assert!(screen.contains("Secrets, keys and certificates in kv-prod"));
        assert!(screen.contains("db-password"));
        assert!(screen.contains("Secret"));
        assert!(screen.contains("Enabled"));
        assert!(screen.contains("Disabled"));
        assert!(screen.contains("kv-prod"));
    }

    #[test]
    fn test_confirm_dialog_style_follows_action() {
        let machine = vm("vm-web", ResourceStatus::Running);
        let resolver = Arc::new(KeyResolver::default());
        let delete = Confirmation {
            resource: machine.clone(),
            action: ActionKind::Delete,
            origin: Origin::List,
        };
        let stop = Confirmation {
            action: ActionKind::Stop,
            ..delete.clone()
        };
        assert!(confirm_dialog(&delete, resolver.clone()).is_danger());
        assert!(!confirm_dialog(&stop, resolver).is_danger());
    }
}
