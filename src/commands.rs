//! Background work.
//!
//! A [`Command`] runs outside the main loop on its own task and reports back
//! by sending [`AppMessage`]s. The app tracks running commands for the
//! inline spinner and the commands panel.

mod action;
mod clipboard;
mod config;
mod refresh;
mod session;

use async_trait::async_trait;
use color_eyre::Result;
use tokio::sync::mpsc::UnboundedSender;

use crate::app::AppMessage;

pub use action::{PollActionCmd, SubmitActionCmd};
pub use clipboard::CopyToClipboardCmd;
pub use config::{SaveLastSubscriptionCmd, SaveThemeCmd};
pub use refresh::RefreshScopeCmd;
pub use session::LoadUserInfoCmd;

#[async_trait]
pub trait Command: Send + 'static {
    /// Short label for the commands panel, e.g. `Stop vm-web`.
    fn name(&self) -> String;

    /// Run to completion. Client failures are reported as messages; an `Err`
    /// here means the command itself could not do its job.
    async fn execute(self: Box<Self>, message_tx: UnboundedSender<AppMessage>) -> Result<()>;
}
