use async_trait::async_trait;
use color_eyre::Result;
use tokio::sync::mpsc::UnboundedSender;

use crate::app::AppMessage;
use crate::commands::Command;
use crate::config;

/// Persist the chosen theme name.
pub struct SaveThemeCmd {
    name: String,
}

impl SaveThemeCmd {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Command for SaveThemeCmd {
    fn name(&self) -> String {
        format!("Save theme {}", self.name)
    }

    async fn execute(self: Box<Self>, _message_tx: UnboundedSender<AppMessage>) -> Result<()> {
        tokio::task::spawn_blocking(move || config::save_theme(&self.name)).await?
    }
}

/// Remember the subscription the user opened for the next start.
pub struct SaveLastSubscriptionCmd {
    subscription_id: String,
}

impl SaveLastSubscriptionCmd {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
        }
    }
}

#[async_trait]
impl Command for SaveLastSubscriptionCmd {
    fn name(&self) -> String {
        "Remember subscription".to_string()
    }

    async fn execute(self: Box<Self>, _message_tx: UnboundedSender<AppMessage>) -> Result<()> {
        tokio::task::spawn_blocking(move || config::save_last_subscription(&self.subscription_id))
            .await?
    }
}
