use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::Rect;
use tracing::{debug, error, info, warn};

use crate::Theme;
use crate::app::AppMessage;
use crate::azure::{ClientError, ResourceClient};
use crate::cache::{CacheView, ResourceCache};
use crate::commands::{
    Command, CopyToClipboardCmd, LoadUserInfoCmd, PollActionCmd, RefreshScopeCmd,
    SaveLastSubscriptionCmd, SaveThemeCmd, SubmitActionCmd,
};
use crate::config::{
    AppConfig, DialogAction, GlobalAction, KeyResolver, NavAction, ResourceAction, SearchAction,
};
use crate::dispatcher::{ActionDispatcher, Completion};
use crate::model::{ActionKind, Resource, Scope};
use crate::navigation::{Effect, NavContext, NavInput, Navigator, Screen};
use crate::registry::HandlerRegistry;
use crate::render::{self, RenderModel, Session};
use crate::theme::{ThemeEvent, ThemeSelector};
use crate::ui::{
    CommandId, CommandPanel, Component, ConfirmEvent, ErrorDialog, ErrorDialogEvent,
    EventResultExt, HelpEvent, HelpOverlay, Keybinding, KeybindingSection, Result, Toast,
    ToastManager,
};

const USER_INFO_RETRY: Duration = Duration::from_secs(10);

type Commands = Vec<Box<dyn Command>>;

/// Popups that take every key until closed.
enum Overlay {
    Help(HelpOverlay),
    Theme(ThemeSelector),
    Error(ErrorDialog),
}

/// All application state. Changes only through [`AppState::handle_key`],
/// [`AppState::update`] and [`AppState::tick`], each of which returns the
/// background commands to spawn.
pub struct AppState {
    client: Arc<dyn ResourceClient>,
    resolver: Arc<KeyResolver>,
    theme: Theme,
    theme_name: String,
    registry: HandlerRegistry,
    cache: ResourceCache,
    dispatcher: ActionDispatcher,
    navigator: Navigator,
    session: Session,
    user_retry_at: Option<Instant>,
    last_subscription: Option<String>,
    overlay: Option<Overlay>,
    toasts: ToastManager,
    commands: CommandPanel,
    area: Rect,
    tick: u64,
    should_quit: bool,
    should_suspend: bool,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        client: Arc<dyn ResourceClient>,
        resolver: Arc<KeyResolver>,
        theme: Theme,
        start: &Scope,
    ) -> Self {
        Self {
            client,
            resolver,
            theme,
            theme_name: config.theme.name.clone(),
            registry: HandlerRegistry::with_builtin(),
            cache: ResourceCache::new(config.cache.ttl()),
            dispatcher: ActionDispatcher::new(
                config.actions.poll_interval(),
                config.actions.max_poll_failures,
            ),
            navigator: Navigator::starting_at(start),
            session: Session::Authenticating,
            user_retry_at: None,
            last_subscription: config.last_subscription.clone(),
            overlay: None,
            toasts: ToastManager::new(),
            commands: CommandPanel::new(),
            area: Rect::new(0, 0, 80, 24),
            tick: 0,
            should_quit: false,
            should_suspend: false,
        }
    }

    /// Sign in and load the starting scope.
    pub fn start(&mut self, now: Instant) -> Commands {
        let mut commands: Commands = vec![Box::new(LoadUserInfoCmd::new(self.client.clone()))];
        let scope = self.navigator.scope().clone();
        commands.extend(self.refresh(&scope, now));
        commands
    }

    pub const fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub const fn should_suspend(&self) -> bool {
        self.should_suspend
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        self.area = Rect::new(0, 0, width, height);
        let page = self.page_size();
        let resources = self.current_resources(Instant::now());
        self.navigator.reconcile(&resources, page);
    }

    /// Register a spawned command with the commands panel.
    pub fn track_command(&mut self, name: String, now: Instant) -> CommandId {
        self.commands.start(name, now)
    }

    fn page_size(&self) -> usize {
        render::page_size(self.area, &self.navigator)
    }

    fn current_view(&self, now: Instant) -> Option<CacheView> {
        self.cache.get(self.navigator.scope(), now)
    }

    fn current_resources(&self, now: Instant) -> Arc<[Resource]> {
        self.current_view(now)
            .map_or_else(|| Arc::from(Vec::new()), |view| view.resources)
    }

    // === Input ===

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Commands {
        if self.overlay.is_some() {
            return self.handle_overlay_key(key);
        }

        if self.session.is_failed() {
            if self.resolver.matches_global(&key, GlobalAction::Quit) {
                self.should_quit = true;
            }
            return Vec::new();
        }

        if let Screen::Confirm(confirmation) = self.navigator.screen() {
            let mut dialog = render::confirm_dialog(confirmation, self.resolver.clone());
            let input = match dialog.handle_key(key).process() {
                (_, Some(ConfirmEvent::Confirmed)) => NavInput::Confirm,
                (_, Some(ConfirmEvent::Cancelled)) => NavInput::Cancel,
                (_, None) => return Vec::new(),
            };
            return self.navigate(input, now);
        }

        if self.navigator.is_searching() {
            return match self.search_input(&key) {
                Some(input) => self.navigate(input, now),
                None => Vec::new(),
            };
        }

        let r = &self.resolver;
        if r.matches_global(&key, GlobalAction::Help) {
            self.overlay = Some(Overlay::Help(HelpOverlay::new(
                self.help_sections(),
                self.resolver.clone(),
            )));
            return Vec::new();
        }
        if r.matches_global(&key, GlobalAction::Theme) {
            self.overlay = Some(Overlay::Theme(ThemeSelector::new(
                &self.theme_name,
                self.resolver.clone(),
            )));
            return Vec::new();
        }
        if r.matches_global(&key, GlobalAction::CommandsToggle) {
            self.commands.toggle_expanded();
            return Vec::new();
        }

        match self.key_input(&key) {
            Some(input) => self.navigate(input, now),
            None => Vec::new(),
        }
    }

    fn handle_overlay_key(&mut self, key: KeyEvent) -> Commands {
        let mut commands: Commands = Vec::new();
        let close = match &mut self.overlay {
            Some(Overlay::Help(help)) => matches!(
                help.handle_key(key).process(),
                (_, Some(HelpEvent::Close))
            ),
            Some(Overlay::Error(dialog)) => matches!(
                dialog.handle_key(key).process(),
                (_, Some(ErrorDialogEvent::Dismissed))
            ),
            Some(Overlay::Theme(selector)) => match selector.handle_key(key).process() {
                (_, Some(ThemeEvent::Selected(info))) => {
                    info!(theme = info.name, "Theme selected");
                    self.theme = info.theme;
                    self.theme_name = info.name.to_string();
                    commands.push(Box::new(SaveThemeCmd::new(info.name)));
                    true
                }
                (_, Some(ThemeEvent::Cancelled)) => true,
                (_, None) => false,
            },
            None => false,
        };
        if close {
            self.overlay = None;
        }
        commands
    }

    fn search_input(&self, key: &KeyEvent) -> Option<NavInput> {
        if self.resolver.matches_search(key, SearchAction::Exit) {
            return Some(NavInput::SearchCancel);
        }
        match key.code {
            KeyCode::Enter => Some(NavInput::SearchSubmit),
            KeyCode::Backspace => Some(NavInput::SearchBackspace),
            KeyCode::Up => Some(NavInput::Up),
            KeyCode::Down => Some(NavInput::Down),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(NavInput::SearchInput(c))
            }
            _ => None,
        }
    }

    fn key_input(&self, key: &KeyEvent) -> Option<NavInput> {
        let r = &self.resolver;
        let global = [
            (GlobalAction::Quit, NavInput::Quit),
            (GlobalAction::Back, NavInput::Back),
        ];
        let nav = [
            (NavAction::Up, NavInput::Up),
            (NavAction::Down, NavInput::Down),
            (NavAction::PageUp, NavInput::PageUp),
            (NavAction::PageDown, NavInput::PageDown),
            (NavAction::Home, NavInput::Home),
            (NavAction::End, NavInput::End),
            (NavAction::Select, NavInput::Open),
        ];
        let resource = [
            (ResourceAction::Details, NavInput::ShowDetails),
            (ResourceAction::Start, NavInput::Request(ActionKind::Start)),
            (ResourceAction::Stop, NavInput::Request(ActionKind::Stop)),
            (ResourceAction::Restart, NavInput::Request(ActionKind::Restart)),
            (ResourceAction::Delete, NavInput::Request(ActionKind::Delete)),
            (ResourceAction::Refresh, NavInput::Refresh),
            (ResourceAction::CopyId, NavInput::CopyId),
            (ResourceAction::Acknowledge, NavInput::Acknowledge),
        ];

        let global = global
            .into_iter()
            .find(|(action, _)| r.matches_global(key, *action))
            .map(|(_, input)| input);
        let nav = || {
            nav.into_iter()
                .find(|(action, _)| r.matches_nav(key, *action))
                .map(|(_, input)| input)
        };
        let resource = || {
            resource
                .into_iter()
                .find(|(action, _)| r.matches_resource(key, *action))
                .map(|(_, input)| input)
        };
        let search = || {
            r.matches_search(key, SearchAction::Toggle)
                .then_some(NavInput::SearchStart)
        };
        global.or_else(nav).or_else(resource).or_else(search)
    }

    fn navigate(&mut self, input: NavInput, now: Instant) -> Commands {
        let resources = self.current_resources(now);
        let ctx = NavContext {
            resources: &resources,
            page_size: self.page_size(),
        };
        let effects = self.navigator.handle(input, &ctx);

        let mut commands = Vec::new();
        for effect in effects {
            commands.extend(self.apply(effect, now));
        }
        commands
    }

    fn apply(&mut self, effect: Effect, now: Instant) -> Commands {
        match effect {
            Effect::Load(scope) => {
                let mut commands = self.remember_subscription(&scope);
                commands.extend(self.refresh(&scope, now));
                commands
            }
            Effect::Refresh(scope) => {
                self.cache.invalidate(&scope);
                self.refresh(&scope, now)
            }
            Effect::Leave(scope) => {
                self.cache.abandon(&scope);
                Vec::new()
            }
            Effect::Dispatch {
                resource,
                action,
                scope,
            } => match self.dispatcher.enqueue(&resource, scope, action, now) {
                Ok(submission) => vec![Box::new(SubmitActionCmd::new(
                    self.client.clone(),
                    submission,
                    resource.name,
                ))],
                Err(error) => {
                    self.toasts.show(Toast::error(error.to_string()));
                    Vec::new()
                }
            },
            Effect::Acknowledge(resource_id) => {
                let cleared = self.dispatcher.acknowledge(&resource_id);
                if cleared > 0 {
                    self.toasts.show(Toast::info(match cleared {
                        1 => "Cleared 1 finished action".to_string(),
                        n => format!("Cleared {n} finished actions"),
                    }));
                }
                Vec::new()
            }
            Effect::CopyId(id) => vec![Box::new(CopyToClipboardCmd::new(id, "resource ID"))],
            Effect::Unsupported { name, action } => {
                self.toasts
                    .show(Toast::error(format!("{action} is not supported for {name}")));
                Vec::new()
            }
            Effect::Exit => {
                info!("Exit requested");
                self.should_quit = true;
                Vec::new()
            }
        }
    }

    fn refresh(&mut self, scope: &Scope, now: Instant) -> Commands {
        if self.session.is_failed() {
            return Vec::new();
        }
        match self.cache.begin_refresh(scope, now) {
            Some(ticket) => vec![Box::new(RefreshScopeCmd::new(
                self.client.clone(),
                scope.clone(),
                ticket,
            ))],
            None => Vec::new(),
        }
    }

    fn remember_subscription(&mut self, scope: &Scope) -> Commands {
        let Some(subscription_id) = scope.subscription_id() else {
            return Vec::new();
        };
        if self.last_subscription.as_deref() == Some(subscription_id) {
            return Vec::new();
        }
        self.last_subscription = Some(subscription_id.to_string());
        vec![Box::new(SaveLastSubscriptionCmd::new(subscription_id))]
    }

    // === Messages ===

    pub fn update(&mut self, message: AppMessage, now: Instant) -> Commands {
        match message {
            AppMessage::Tick => return self.tick(now),
            AppMessage::Quit => self.should_quit = true,
            AppMessage::Suspend => self.should_suspend = true,
            AppMessage::Resume => self.should_suspend = false,
            AppMessage::Resize(width, height) => self.resize(width, height),
            AppMessage::Render | AppMessage::ClearScreen => {}
            AppMessage::DisplayError(message) => {
                self.overlay = Some(Overlay::Error(
                    ErrorDialog::new(message, self.resolver.clone()).with_title("Command failed"),
                ));
            }
            AppMessage::ShowToast {
                message,
                toast_type,
            } => self.toasts.show(Toast::new(message, toast_type)),
            AppMessage::CommandCompleted { id, success } => {
                self.commands.complete(id, success, now);
            }
            AppMessage::UserInfoLoaded(result) => self.on_user_info(result, now),
            AppMessage::RefreshFinished {
                scope,
                ticket,
                result,
            } => {
                let auth = auth_error(&result);
                if self.cache.complete_refresh(&scope, ticket, result, now) {
                    if &scope == self.navigator.scope() {
                        let resources = self.current_resources(now);
                        let page = self.page_size();
                        self.navigator.reconcile(&resources, page);
                    }
                    if let Some(error) = auth {
                        self.fail_session(&error);
                    }
                }
            }
            AppMessage::ActionSubmitted { id, result } => {
                if let Some(error) = auth_error(&result) {
                    self.fail_session(&error);
                }
                if let Some(completion) = self.dispatcher.on_submitted(id, result, now) {
                    return self.on_completion(completion, now);
                }
            }
            AppMessage::ActionPolled { id, seq, result } => {
                if let Some(error) = auth_error(&result) {
                    self.fail_session(&error);
                }
                if let Some(completion) = self.dispatcher.on_polled(id, seq, result, now) {
                    return self.on_completion(completion, now);
                }
            }
        }
        Vec::new()
    }

    fn on_user_info(&mut self, result: Result<crate::azure::UserInfo, ClientError>, now: Instant) {
        match result {
            Ok(user) => {
                info!(user = user.display_name(), "Signed in");
                if !self.session.is_failed() {
                    self.session = Session::Ready(user);
                }
            }
            Err(error) if error.is_auth() => self.fail_session(&error),
            Err(error) => {
                warn!(%error, "Could not load user info");
                self.user_retry_at = Some(now + USER_INFO_RETRY);
            }
        }
    }

    fn fail_session(&mut self, error: &ClientError) {
        if self.session.is_failed() {
            return;
        }
        error!(%error, "Authentication failed");
        self.session = Session::AuthFailed(error.to_string());
        self.overlay = None;
    }

    /// The resource changed state: drop the cached listing and fetch it
    /// again if it is on screen.
    fn on_completion(&mut self, completion: Completion, now: Instant) -> Commands {
        let Completion {
            resource_name,
            scope,
            action,
            outcome,
            ..
        } = completion;
        match outcome {
            Ok(()) => self
                .toasts
                .show(Toast::success(format!("{action} {resource_name} succeeded"))),
            Err(reason) => self.toasts.show(Toast::error(format!(
                "{action} {resource_name} failed: {reason}"
            ))),
        }

        self.cache.invalidate(&scope);
        if &scope == self.navigator.scope() {
            self.refresh(&scope, now)
        } else {
            Vec::new()
        }
    }

    pub fn tick(&mut self, now: Instant) -> Commands {
        self.tick = self.tick.wrapping_add(1);
        self.toasts.expire(now);

        let mut commands: Commands = self
            .dispatcher
            .due_polls(now)
            .into_iter()
            .map(|poll| Box::new(PollActionCmd::new(self.client.clone(), poll)) as Box<dyn Command>)
            .collect();

        if self.user_retry_at.is_some_and(|at| now >= at) {
            debug!("Retrying user info");
            self.user_retry_at = None;
            commands.push(Box::new(LoadUserInfoCmd::new(self.client.clone())));
        }

        let scope = self.navigator.scope().clone();
        commands.extend(self.refresh(&scope, now));
        commands
    }

    // === View ===

    pub fn render(&mut self, frame: &mut Frame, now: Instant) {
        let view = self.current_view(now);
        let hints = self.hints();
        let model = RenderModel {
            navigator: &self.navigator,
            view: view.as_ref(),
            dispatcher: &self.dispatcher,
            session: &self.session,
            registry: &self.registry,
            resolver: &self.resolver,
            theme: &self.theme,
            commands: &self.commands,
            toasts: &self.toasts,
            hints: &hints,
            tick: self.tick,
            now,
        };
        render::render(frame, &model);

        let area = frame.area();
        match &mut self.overlay {
            Some(Overlay::Help(help)) => help.render(frame, area, &self.theme),
            Some(Overlay::Theme(selector)) => selector.render(frame, area, &self.theme),
            Some(Overlay::Error(dialog)) => dialog.render(frame, area, &self.theme),
            None => {}
        }
    }

    /// Status bar hints for what the user is looking at.
    fn hints(&self) -> Vec<Keybinding> {
        let r = &self.resolver;
        let quit = Keybinding::hint(r.display_global(GlobalAction::Quit), "Quit");
        if self.session.is_failed() {
            return vec![quit];
        }
        if self.navigator.is_searching() {
            return vec![
                Keybinding::hint("Enter", "Apply filter"),
                Keybinding::hint(r.display_search(SearchAction::Exit), "Clear filter"),
            ];
        }
        match self.navigator.screen() {
            Screen::Confirm(_) => vec![
                Keybinding::hint(r.display_dialog(DialogAction::Confirm), "Confirm"),
                Keybinding::hint(r.display_dialog(DialogAction::Cancel), "Cancel"),
            ],
            Screen::Detail { .. } => vec![
                Keybinding::hint(r.display_global(GlobalAction::Back), "Back"),
                Keybinding::hint(r.display_resource(ResourceAction::Start), "Start"),
                Keybinding::hint(r.display_resource(ResourceAction::Stop), "Stop"),
                Keybinding::hint(r.display_resource(ResourceAction::Restart), "Restart"),
                Keybinding::hint(r.display_resource(ResourceAction::Delete), "Delete"),
                Keybinding::hint(r.display_resource(ResourceAction::CopyId), "Copy ID"),
                Keybinding::hint(r.display_resource(ResourceAction::Acknowledge), "Clear"),
                Keybinding::hint(r.display_global(GlobalAction::Help), "Help"),
                quit,
            ],
            Screen::List | Screen::Exited => vec![
                Keybinding::hint(r.display_nav(NavAction::Select), "Open"),
                Keybinding::hint(r.display_global(GlobalAction::Back), "Back"),
                Keybinding::hint(r.display_resource(ResourceAction::Details), "Details"),
                Keybinding::hint(r.display_search(SearchAction::Toggle), "Filter"),
                Keybinding::hint(r.display_resource(ResourceAction::Refresh), "Refresh"),
                Keybinding::hint(r.display_resource(ResourceAction::Stop), "Stop"),
                Keybinding::hint(r.display_global(GlobalAction::Help), "Help"),
                quit,
            ],
        }
    }

    fn help_sections(&self) -> Vec<KeybindingSection> {
        let r = &self.resolver;
        vec![
            KeybindingSection::new(
                "Global",
                vec![
                    Keybinding::new(r.display_global(GlobalAction::Quit), "Quit"),
                    Keybinding::new(r.display_global(GlobalAction::Help), "Toggle help"),
                    Keybinding::new(r.display_global(GlobalAction::Theme), "Select theme"),
                    Keybinding::new(r.display_global(GlobalAction::Back), "Go back"),
                    Keybinding::new(
                        r.display_global(GlobalAction::CommandsToggle),
                        "Toggle commands panel",
                    ),
                    Keybinding::new("ctrl+z", "Suspend"),
                ],
            ),
            KeybindingSection::new(
                "Navigation",
                vec![
                    Keybinding::new(r.display_nav(NavAction::Up), "Move up"),
                    Keybinding::new(r.display_nav(NavAction::Down), "Move down"),
                    Keybinding::new(r.display_nav(NavAction::PageUp), "Page up"),
                    Keybinding::new(r.display_nav(NavAction::PageDown), "Page down"),
                    Keybinding::new(r.display_nav(NavAction::Home), "First row"),
                    Keybinding::new(r.display_nav(NavAction::End), "Last row"),
                    Keybinding::new(r.display_nav(NavAction::Select), "Open"),
                ],
            ),
            KeybindingSection::new(
                "Search",
                vec![
                    Keybinding::new(r.display_search(SearchAction::Toggle), "Filter rows"),
                    Keybinding::new(r.display_search(SearchAction::Exit), "Clear filter"),
                ],
            ),
            KeybindingSection::new(
                "Resources",
                vec![
                    Keybinding::new(r.display_resource(ResourceAction::Details), "Show details"),
                    Keybinding::new(r.display_resource(ResourceAction::Start), "Start"),
                    Keybinding::new(r.display_resource(ResourceAction::Stop), "Stop"),
                    Keybinding::new(r.display_resource(ResourceAction::Restart), "Restart"),
                    Keybinding::new(r.display_resource(ResourceAction::Delete), "Delete"),
                    Keybinding::new(r.display_resource(ResourceAction::Refresh), "Refresh"),
                    Keybinding::new(r.display_resource(ResourceAction::CopyId), "Copy ID"),
                    Keybinding::new(
                        r.display_resource(ResourceAction::Acknowledge),
                        "Clear finished actions",
                    ),
                ],
            ),
        ]
    }
}

fn auth_error<T>(result: &Result<T, ClientError>) -> Option<ClientError> {
    result.as_ref().err().filter(|e| e.is_auth()).cloned()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use tokio::sync::mpsc;

    use super::*;
    use crate::azure::{ActionRequest, Operation, OperationHandle, OperationStatus, UserInfo};
    use crate::dispatcher::ActionStatus;
    use crate::model::ResourceStatus;
    use crate::model::fixtures::vm;

    /// Scripted client. Listing returns the current inventory; a poll that
    /// reports success applies the action to the inventory.
    struct FakeClient {
        inventory: Mutex<Vec<Resource>>,
        polls: Mutex<VecDeque<OperationStatus>>,
        submitted: Mutex<Vec<ActionRequest>>,
        auth_error: Option<ClientError>,
    }

    impl FakeClient {
        fn new(inventory: Vec<Resource>) -> Self {
            Self {
                inventory: Mutex::new(inventory),
                polls: Mutex::new(VecDeque::new()),
                submitted: Mutex::new(Vec::new()),
                auth_error: None,
            }
        }

        fn failing_auth() -> Self {
            Self {
                auth_error: Some(ClientError::Auth("no credential available".into())),
                ..Self::new(vec![vm("vm-1", ResourceStatus::Running)])
            }
        }

        fn script_polls(&self, statuses: impl IntoIterator<Item = OperationStatus>) {
            self.polls.lock().unwrap().extend(statuses);
        }
    }

    #[async_trait]
    impl ResourceClient for FakeClient {
        async fn list_resources(&self, _scope: &Scope) -> Result<Vec<Resource>, ClientError> {
            match &self.auth_error {
                Some(error) => Err(error.clone()),
                None => Ok(self.inventory.lock().unwrap().clone()),
            }
        }

        async fn perform_action(&self, request: &ActionRequest) -> Result<Operation, ClientError> {
            self.submitted.lock().unwrap().push(request.clone());
            Ok(Operation::Pending(OperationHandle::AsyncOperation(
                "https://management.azure.com/operations/1".into(),
            )))
        }

        async fn poll_action(
            &self,
            _handle: &OperationHandle,
        ) -> Result<OperationStatus, ClientError> {
            let status = self
                .polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(OperationStatus::InProgress);
            if status == OperationStatus::Succeeded {
                let mut inventory = self.inventory.lock().unwrap();
                let submitted = self.submitted.lock().unwrap();
                for request in submitted.iter() {
                    if let Some(resource) = inventory.iter_mut().find(|r| r.id == request.resource_id) {
                        resource.status = match request.action {
                            ActionKind::Stop => ResourceStatus::Stopped,
                            _ => ResourceStatus::Running,
                        };
                    }
                }
            }
            Ok(status)
        }

        async fn user_info(&self) -> Result<UserInfo, ClientError> {
            match &self.auth_error {
                Some(error) => Err(error.clone()),
                None => Ok(UserInfo {
                    name: Some("Ada".into()),
                    email: None,
                    tenant_id: Some("tenant-1".into()),
                }),
            }
        }
    }

    fn scope() -> Scope {
        Scope::resource_type("sub-1", "rg-1", "Microsoft.Compute/virtualMachines")
    }

    fn state(client: Arc<FakeClient>) -> AppState {
        let config = AppConfig {
            last_subscription: Some("sub-1".into()),
            ..AppConfig::default()
        };
        AppState::new(
            &config,
            client,
            Arc::new(KeyResolver::default()),
            Theme::default(),
            &scope(),
        )
    }

    /// Run commands to completion and feed their messages back.
    async fn run(state: &mut AppState, commands: Commands, now: Instant) -> Commands {
        let (tx, mut rx) = mpsc::unbounded_channel();
        for command in commands {
            command.execute(tx.clone()).await.unwrap();
        }
        drop(tx);
        let mut next = Vec::new();
        while let Some(message) = rx.recv().await {
            next.extend(state.update(message, now));
        }
        next
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn cached_status(state: &AppState, now: Instant) -> ResourceStatus {
        state.current_resources(now)[0].status
    }

    fn action_status(state: &AppState) -> ActionStatus {
        state.dispatcher.actions()[0].status.clone()
    }

    fn screen_text(state: &mut AppState, now: Instant) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|frame| state.render(frame, now)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[tokio::test]
    async fn test_stop_vm_until_refreshed() {
        let client = Arc::new(FakeClient::new(vec![vm("vm-1", ResourceStatus::Running)]));
        client.script_polls([OperationStatus::InProgress, OperationStatus::Succeeded]);
        let mut state = state(client.clone());
        let interval = AppConfig::default().actions.poll_interval();

        let t0 = Instant::now();
        let commands = state.start(t0);
        assert!(run(&mut state, commands, t0).await.is_empty());
        assert!(matches!(state.session, Session::Ready(_)));
        assert_eq!(cached_status(&state, t0), ResourceStatus::Running);

        assert!(state.handle_key(key('S'), t0).is_empty());
        assert!(matches!(state.navigator.screen(), Screen::Confirm(_)));
        let commands = state.handle_key(key('y'), t0);
        assert_eq!(commands.len(), 1);
        assert_eq!(action_status(&state), ActionStatus::Queued);
        assert_eq!(state.navigator.screen(), &Screen::List);

        run(&mut state, commands, t0).await;
        assert_eq!(action_status(&state), ActionStatus::InFlight);
        assert_eq!(client.submitted.lock().unwrap().len(), 1);

        let t1 = t0 + interval;
        let polls = state.tick(t1);
        assert_eq!(polls.len(), 1);
        run(&mut state, polls, t1).await;
        assert_eq!(action_status(&state), ActionStatus::InFlight);
        assert_eq!(cached_status(&state, t1), ResourceStatus::Running);

        let t2 = t1 + interval;
        let polls = state.tick(t2);
        let refresh = run(&mut state, polls, t2).await;
        assert_eq!(action_status(&state), ActionStatus::Succeeded);
        // Succeeded, but the listing has not been fetched again yet.
        assert_eq!(cached_status(&state, t2), ResourceStatus::Running);
        assert_eq!(refresh.len(), 1);

        run(&mut state, refresh, t2).await;
        assert_eq!(cached_status(&state, t2), ResourceStatus::Stopped);

        // Terminal actions are never polled again.
        assert!(state.tick(t2 + interval * 3).is_empty());
        assert_eq!(client.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_auth_error_blocks_ui() {
        let client = Arc::new(FakeClient::failing_auth());
        let mut state = state(client);

        let t0 = Instant::now();
        let commands = state.start(t0);
        assert!(run(&mut state, commands, t0).await.is_empty());
        assert!(state.session.is_failed());
        assert!(state.current_resources(t0).is_empty());

        // Only quitting is possible.
        assert!(state.handle_key(key('S'), t0).is_empty());
        assert_eq!(state.navigator.screen(), &Screen::List);
        assert!(state.tick(t0 + Duration::from_secs(120)).is_empty());

        let text = screen_text(&mut state, t0);
        assert!(text.contains("Authentication required"));
        assert!(!text.contains("vm-1"));

        state.handle_key(key('q'), t0);
        assert!(state.should_quit());
    }

    #[tokio::test]
    async fn test_stale_refresh_is_discarded_after_leaving() {
        let client = Arc::new(FakeClient::new(vec![vm("vm-1", ResourceStatus::Running)]));
        let mut state = state(client);

        let t0 = Instant::now();
        let commands = state.start(t0);
        // Leave before the listing arrives.
        state.handle_key(key('h'), t0);
        assert_eq!(state.navigator.scope(), &Scope::resource_group("sub-1", "rg-1"));

        run(&mut state, commands, t0).await;
        assert!(state.cache.get(&scope(), t0).is_some_and(|v| !v.loaded));
    }

    #[test]
    fn test_unsupported_action_shows_toast() {
        let client = Arc::new(FakeClient::new(Vec::new()));
        let mut state = state(client);
        let t0 = Instant::now();
        let ticket = state.cache.begin_refresh(&scope(), t0).unwrap();
        let storage = crate::model::fixtures::resource(
            "store-1",
            crate::model::ResourceKind::StorageAccount,
            ResourceStatus::Unknown,
        );
        state.update(
            AppMessage::RefreshFinished {
                scope: scope(),
                ticket,
                result: Ok(vec![storage]),
            },
            t0,
        );

        assert!(state.handle_key(key('S'), t0).is_empty());
        assert_eq!(state.navigator.screen(), &Screen::List);
        let toast = state.toasts.iter().next().unwrap();
        assert_eq!(toast.message(), "Stop is not supported for store-1");
    }

    #[test]
    fn test_overlays_capture_keys() {
        let client = Arc::new(FakeClient::new(Vec::new()));
        let mut state = state(client);
        let t0 = Instant::now();

        state.handle_key(key('?'), t0);
        assert!(matches!(state.overlay, Some(Overlay::Help(_))));
        // Quit does not leak through the help overlay.
        state.handle_key(key('q'), t0);
        assert!(state.overlay.is_none());
        assert!(!state.should_quit());

        state.update(AppMessage::DisplayError("Copy resource ID failed".into()), t0);
        assert!(matches!(state.overlay, Some(Overlay::Error(_))));
        state.handle_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE), t0);
        assert!(state.overlay.is_none());
    }
}
