//! View state and the transitions between views.
//!
//! [`Navigator::handle`] is the only way to change what the user looks at.
//! It performs no I/O: anything that needs the outside world is returned as
//! an [`Effect`] for the main loop to carry out.

use crate::model::{ActionKind, Resource, Scope, last_segment, short_type};
use crate::search::Matcher;

/// One list in the drill-down stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Level {
    pub scope: Scope,
    pub label: String,
    /// Index into the visible (filtered) rows.
    pub selected: usize,
    pub offset: usize,
    pub filter: String,
}

impl Level {
    fn new(scope: Scope, label: impl Into<String>) -> Self {
        Self {
            scope,
            label: label.into(),
            selected: 0,
            offset: 0,
            filter: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    List,
    Detail,
}

/// A pending confirmation, bound to the resource it was opened for.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub resource: Resource,
    pub action: ActionKind,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    List,
    Detail { resource_id: String },
    Confirm(Confirmation),
    Exited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavInput {
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Open,
    ShowDetails,
    Back,
    Refresh,
    Request(ActionKind),
    Confirm,
    Cancel,
    Acknowledge,
    CopyId,
    SearchStart,
    SearchInput(char),
    SearchBackspace,
    SearchSubmit,
    SearchCancel,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// The scope became visible and should be fetched if needed.
    Load(Scope),
    /// The user asked for fresh data.
    Refresh(Scope),
    /// The scope is no longer visible; its in-flight fetch may be dropped.
    Leave(Scope),
    Dispatch {
        resource: Resource,
        action: ActionKind,
        scope: Scope,
    },
    Acknowledge(String),
    CopyId(String),
    /// The requested action does not apply to the resource.
    Unsupported { name: String, action: ActionKind },
    Exit,
}

/// What the navigator needs to know about the outside world for one input.
pub struct NavContext<'a> {
    /// All rows of the current level, unfiltered.
    pub resources: &'a [Resource],
    /// Rows that fit in the list viewport.
    pub page_size: usize,
}

pub struct Navigator {
    levels: Vec<Level>,
    screen: Screen,
    searching: bool,
    matcher: Matcher,
}

impl Navigator {
    pub fn new() -> Self {
        Self::starting_at(&Scope::Subscriptions)
    }

    /// Start with `scope` open and every parent scope on the stack beneath it.
    pub fn starting_at(scope: &Scope) -> Self {
        let mut chain = vec![scope.clone()];
        while let Some(parent) = chain.last().and_then(Scope::parent) {
            chain.push(parent);
        }
        let levels = chain
            .into_iter()
            .rev()
            .map(|scope| {
                let label = scope_label(&scope);
                Level::new(scope, label)
            })
            .collect();

        Self {
            levels,
            screen: Screen::List,
            searching: false,
            matcher: Matcher::new(),
        }
    }

    pub const fn screen(&self) -> &Screen {
        &self.screen
    }

    #[cfg(test)]
    fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn current(&self) -> &Level {
        // The stack always holds the root level.
        &self.levels[self.levels.len() - 1]
    }

    fn current_mut(&mut self) -> &mut Level {
        let last = self.levels.len() - 1;
        &mut self.levels[last]
    }

    pub fn scope(&self) -> &Scope {
        &self.current().scope
    }

    pub const fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn is_exited(&self) -> bool {
        self.screen == Screen::Exited
    }

    pub fn breadcrumbs(&self) -> Vec<&str> {
        self.levels.iter().map(|l| l.label.as_str()).collect()
    }

    /// Rows of the current level that pass the filter.
    pub fn visible<'a>(&self, resources: &'a [Resource]) -> Vec<&'a Resource> {
        let filter = &self.current().filter;
        resources
            .iter()
            .filter(|r| filter.is_empty() || self.matcher.matches_any(r.search_texts(), filter))
            .collect()
    }

    pub fn selected<'a>(&self, resources: &'a [Resource]) -> Option<&'a Resource> {
        self.visible(resources).get(self.current().selected).copied()
    }

    /// Clamp the selection after the row set of the current level changed.
    pub fn reconcile(&mut self, resources: &[Resource], page_size: usize) {
        let len = self.visible(resources).len();
        clamp(self.current_mut(), len, page_size);
    }

    pub fn handle(&mut self, input: NavInput, ctx: &NavContext<'_>) -> Vec<Effect> {
        if self.is_exited() {
            return Vec::new();
        }
        if input == NavInput::Quit {
            self.screen = Screen::Exited;
            self.searching = false;
            return vec![Effect::Exit];
        }

        let depth = self.levels.len();
        let effects = match self.screen.clone() {
            Screen::List => self.handle_list(input, ctx),
            Screen::Detail { resource_id } => self.handle_detail(input, ctx, resource_id),
            Screen::Confirm(confirmation) => self.handle_confirm(input, confirmation),
            Screen::Exited => Vec::new(),
        };
        // After a push or pop the context rows belong to the level we left.
        if self.levels.len() == depth {
            self.reconcile(ctx.resources, ctx.page_size);
        }
        effects
    }

    fn handle_list(&mut self, input: NavInput, ctx: &NavContext<'_>) -> Vec<Effect> {
        let len = self.visible(ctx.resources).len();
        let page = ctx.page_size.max(1);

        if self.searching {
            match input {
                NavInput::SearchInput(c) => {
                    let level = self.current_mut();
                    level.filter.push(c);
                    level.selected = 0;
                    level.offset = 0;
                    return Vec::new();
                }
                NavInput::SearchBackspace => {
                    let level = self.current_mut();
                    level.filter.pop();
                    level.selected = 0;
                    level.offset = 0;
                    return Vec::new();
                }
                NavInput::SearchSubmit => {
                    self.searching = false;
                    return Vec::new();
                }
                NavInput::SearchCancel => {
                    self.searching = false;
                    self.clear_filter();
                    return Vec::new();
                }
                _ => {}
            }
        }

        match input {
            NavInput::Up => self.move_by(len, -1),
            NavInput::Down => self.move_by(len, 1),
            NavInput::PageUp => self.move_by(len, -signed(page)),
            NavInput::PageDown => self.move_by(len, signed(page)),
            NavInput::Home => self.current_mut().selected = 0,
            NavInput::End => self.current_mut().selected = len.saturating_sub(1),
            NavInput::Open => {
                let Some(resource) = self.selected(ctx.resources).cloned() else {
                    return Vec::new();
                };
                return match resource.child_scope() {
                    Some(child) => self.push(child, resource.name),
                    None => self.show_detail(resource.id),
                };
            }
            NavInput::ShowDetails => {
                if let Some(resource) = self.selected(ctx.resources) {
                    return self.show_detail(resource.id.clone());
                }
            }
            NavInput::Back | NavInput::SearchCancel => {
                if !self.current().filter.is_empty() {
                    self.clear_filter();
                    return Vec::new();
                }
                if input == NavInput::Back {
                    return self.pop();
                }
            }
            NavInput::Refresh => return vec![Effect::Refresh(self.scope().clone())],
            NavInput::Request(action) => {
                if let Some(resource) = self.selected(ctx.resources).cloned() {
                    return self.request(resource, action, Origin::List);
                }
            }
            NavInput::Acknowledge => {
                if let Some(resource) = self.selected(ctx.resources) {
                    return vec![Effect::Acknowledge(resource.id.clone())];
                }
            }
            NavInput::CopyId => {
                if let Some(resource) = self.selected(ctx.resources) {
                    return vec![Effect::CopyId(resource.id.clone())];
                }
            }
            NavInput::SearchStart => self.searching = true,
            NavInput::SearchInput(_)
            | NavInput::SearchBackspace
            | NavInput::SearchSubmit
            | NavInput::Confirm
            | NavInput::Cancel
            | NavInput::Quit => {}
        }
        Vec::new()
    }

    fn handle_detail(
        &mut self,
        input: NavInput,
        ctx: &NavContext<'_>,
        resource_id: String,
    ) -> Vec<Effect> {
        match input {
            NavInput::Back | NavInput::Cancel => {
                self.screen = Screen::List;
                Vec::new()
            }
            NavInput::Refresh => vec![Effect::Refresh(self.scope().clone())],
            NavInput::Acknowledge => vec![Effect::Acknowledge(resource_id)],
            NavInput::CopyId => vec![Effect::CopyId(resource_id)],
            NavInput::Request(action) => {
                // The resource may have disappeared in a refresh meanwhile.
                match ctx.resources.iter().find(|r| r.id == resource_id) {
                    Some(resource) => self.request(resource.clone(), action, Origin::Detail),
                    None => Vec::new(),
                }
            }
            _ => Vec::new(),
        }
    }

    fn handle_confirm(&mut self, input: NavInput, confirmation: Confirmation) -> Vec<Effect> {
        match input {
            NavInput::Confirm => {
                self.screen = origin_screen(&confirmation);
                vec![Effect::Dispatch {
                    scope: self.scope().clone(),
                    resource: confirmation.resource,
                    action: confirmation.action,
                }]
            }
            NavInput::Cancel | NavInput::Back => {
                self.screen = origin_screen(&confirmation);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn request(&mut self, resource: Resource, action: ActionKind, origin: Origin) -> Vec<Effect> {
        if !resource.kind.supports(action) {
            return vec![Effect::Unsupported {
                name: resource.name,
                action,
            }];
        }
        self.searching = false;
        self.screen = Screen::Confirm(Confirmation {
            resource,
            action,
            origin,
        });
        Vec::new()
    }

    fn show_detail(&mut self, resource_id: String) -> Vec<Effect> {
        self.searching = false;
        self.screen = Screen::Detail { resource_id };
        Vec::new()
    }

    fn push(&mut self, scope: Scope, label: String) -> Vec<Effect> {
        let left = self.scope().clone();
        self.searching = false;
        self.levels.push(Level::new(scope.clone(), label));
        vec![Effect::Leave(left), Effect::Load(scope)]
    }

    fn pop(&mut self) -> Vec<Effect> {
        if self.levels.len() <= 1 {
            return Vec::new();
        }
        let left = self.levels.pop().map(|l| l.scope);
        let mut effects: Vec<Effect> = left.into_iter().map(Effect::Leave).collect();
        effects.push(Effect::Load(self.scope().clone()));
        effects
    }

    fn clear_filter(&mut self) {
        let level = self.current_mut();
        level.filter.clear();
        level.selected = 0;
        level.offset = 0;
    }

    fn move_by(&mut self, len: usize, delta: isize) {
        if len == 0 {
            return;
        }
        let level = self.current_mut();
        let target = level.selected.saturating_add_signed(delta);
        level.selected = target.min(len - 1);
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

fn origin_screen(confirmation: &Confirmation) -> Screen {
    match confirmation.origin {
        Origin::List => Screen::List,
        Origin::Detail => Screen::Detail {
            resource_id: confirmation.resource.id.clone(),
        },
    }
}

fn clamp(level: &mut Level, len: usize, page_size: usize) {
    level.selected = level.selected.min(len.saturating_sub(1));
    let page = page_size.max(1);
    if level.selected < level.offset {
        level.offset = level.selected;
    } else if level.selected >= level.offset + page {
        level.offset = level.selected + 1 - page;
    }
    level.offset = level.offset.min(len.saturating_sub(page));
}

fn signed(n: usize) -> isize {
    isize::try_from(n).unwrap_or(isize::MAX)
}

fn scope_label(scope: &Scope) -> String {
    match scope {
        Scope::Subscriptions => "Subscriptions".to_string(),
        Scope::Subscription { subscription_id } => subscription_id.clone(),
        Scope::ResourceGroup { resource_group, .. } => resource_group.clone(),
        Scope::ResourceType { type_name, .. } => short_type(type_name).to_string(),
        Scope::Containers { account_id: id } | Scope::Vault { vault_id: id } => {
            last_segment(id).to_string()
        }
    }
}
