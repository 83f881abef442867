use arboard::Clipboard;
use async_trait::async_trait;
use color_eyre::Result;
use tokio::sync::mpsc::UnboundedSender;

use crate::app::AppMessage;
use crate::commands::Command;
use crate::ui::ToastType;

/// Put text on the system clipboard and confirm with a toast.
pub struct CopyToClipboardCmd {
    text: String,
    what: String,
}

impl CopyToClipboardCmd {
    pub fn new(text: impl Into<String>, what: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            what: what.into(),
        }
    }
}

#[async_trait]
impl Command for CopyToClipboardCmd {
    fn name(&self) -> String {
        format!("Copy {}", self.what)
    }

    async fn execute(self: Box<Self>, message_tx: UnboundedSender<AppMessage>) -> Result<()> {
        let text = self.text;
        // arboard talks to the display server synchronously.
        tokio::task::spawn_blocking(move || -> Result<()> {
            Clipboard::new()?.set_text(text)?;
            Ok(())
        })
        .await??;
        message_tx.send(AppMessage::ShowToast {
            message: format!("Copied {}", self.what),
            toast_type: ToastType::Success,
        })?;
        Ok(())
    }
}
