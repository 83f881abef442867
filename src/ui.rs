//! Reusable UI building blocks.
//!
//! Components here know nothing about Azure. They render from the data they
//! are handed and translate keys into small event enums.

mod command_panel;
mod confirm_dialog;
mod error_dialog;
mod help;
mod list;
mod spinner;
mod status_bar;
mod table;
mod toast;

use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::Rect;

pub use color_eyre::Result;

use crate::Theme;

pub use command_panel::{
    CommandId, CommandPanel, format_age, format_duration, truncate_with_ellipsis,
};
pub use confirm_dialog::{ConfirmDialog, ConfirmEvent};
pub use error_dialog::{ErrorDialog, ErrorDialogEvent};
pub use help::{HelpEvent, HelpOverlay, Keybinding, KeybindingSection};
pub use list::{List, ListEvent, ListRow};
pub use spinner::spinner_frame;
pub use status_bar::{STATUS_BAR_HEIGHT, StatusBar, StatusLine};
pub use table::{ColumnDef, SearchBar, TableView};
pub use toast::{Toast, ToastManager, ToastType};

/// Result of handling an input event.
///
/// - `Ignored` - the handler didn't recognize the input, the parent should process it
/// - `Consumed` - the input was handled but produced no event
/// - `Event(E)` - the input was handled and produced an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResult<E> {
    Ignored,
    Consumed,
    Event(E),
}

impl<E> From<E> for EventResult<E> {
    fn from(event: E) -> Self {
        Self::Event(event)
    }
}

/// Extension trait for processing `Result<EventResult<T>>` from component handlers.
pub trait EventResultExt<T> {
    /// Split into (was consumed, optional event). Errors count as ignored.
    fn process(self) -> (bool, Option<T>);
}

impl<T> EventResultExt<T> for Result<EventResult<T>> {
    fn process(self) -> (bool, Option<T>) {
        match self {
            Ok(EventResult::Event(msg)) => (true, Some(msg)),
            Ok(EventResult::Consumed) => (true, None),
            Ok(EventResult::Ignored) | Err(_) => (false, None),
        }
    }
}

/// Interactive UI building block.
///
/// Components handle keys and emit generic outputs. They know nothing about
/// business logic.
pub trait Component {
    type Output;

    /// Handle a key event.
    ///
    /// Returns `Err(...)` if an error occurred during handling.
    fn handle_key(&mut self, key: KeyEvent) -> Result<EventResult<Self::Output>> {
        _ = key;
        Ok(EventResult::Ignored)
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme);
}
