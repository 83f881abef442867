//! Messages applied by the main loop.
//!
//! Terminal events are translated into lifecycle messages. Background
//! commands report their results with the remaining variants.

use crate::azure::{ClientError, Operation, OperationStatus, UserInfo};
use crate::cache::Ticket;
use crate::dispatcher::ActionId;
use crate::model::{Resource, Scope};
use crate::ui::{CommandId, ToastType};

#[derive(Debug, Clone)]
pub enum AppMessage {
    // === Lifecycle ===
    /// Periodic tick for polling, cache refresh and spinners.
    Tick,
    Render,
    Resize(u16, u16),
    /// Ctrl+Z
    Suspend,
    Resume,
    Quit,
    ClearScreen,

    // === Feedback ===
    /// A command failed or panicked.
    DisplayError(String),
    ShowToast {
        message: String,
        toast_type: ToastType,
    },
    CommandCompleted {
        id: CommandId,
        success: bool,
    },

    // === Results ===
    UserInfoLoaded(Result<UserInfo, ClientError>),
    RefreshFinished {
        scope: Scope,
        ticket: Ticket,
        result: Result<Vec<Resource>, ClientError>,
    },
    ActionSubmitted {
        id: ActionId,
        result: Result<Operation, ClientError>,
    },
    ActionPolled {
        id: ActionId,
        seq: u64,
        result: Result<OperationStatus, ClientError>,
    },
}

impl AppMessage {
    /// One-line description for the debug log. Listings are summarised.
    pub fn summary(&self) -> String {
        match self {
            Self::RefreshFinished {
                scope,
                ticket,
                result,
            } => match result {
                Ok(resources) => format!(
                    "RefreshFinished({scope}, ticket {ticket}, {} resources)",
                    resources.len()
                ),
                Err(error) => format!("RefreshFinished({scope}, ticket {ticket}, {error})"),
            },
            other => format!("{other:?}"),
        }
    }

    /// High-frequency messages that are not logged.
    pub const fn is_periodic(&self) -> bool {
        matches!(self, Self::Tick | Self::Render)
    }
}
