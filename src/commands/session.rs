use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::Result;
use tokio::sync::mpsc::UnboundedSender;

use crate::app::AppMessage;
use crate::azure::ResourceClient;
use crate::commands::Command;

/// Resolve the signed-in identity. Doubles as the credential check at startup.
pub struct LoadUserInfoCmd {
    client: Arc<dyn ResourceClient>,
}

impl LoadUserInfoCmd {
    pub fn new(client: Arc<dyn ResourceClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Command for LoadUserInfoCmd {
    fn name(&self) -> String {
        "Sign in".to_string()
    }

    async fn execute(self: Box<Self>, message_tx: UnboundedSender<AppMessage>) -> Result<()> {
        let result = self.client.user_info().await;
        message_tx.send(AppMessage::UserInfoLoaded(result))?;
        Ok(())
    }
}
