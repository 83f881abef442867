use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::Result;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::app::AppMessage;
use crate::azure::ResourceClient;
use crate::cache::Ticket;
use crate::commands::Command;
use crate::model::Scope;

/// Fetch the children of a scope for the cache.
pub struct RefreshScopeCmd {
    client: Arc<dyn ResourceClient>,
    scope: Scope,
    ticket: Ticket,
}

impl RefreshScopeCmd {
    pub fn new(client: Arc<dyn ResourceClient>, scope: Scope, ticket: Ticket) -> Self {
        Self {
            client,
            scope,
            ticket,
        }
    }
}

#[async_trait]
impl Command for RefreshScopeCmd {
    fn name(&self) -> String {
        format!("Load {}", self.scope)
    }

    async fn execute(self: Box<Self>, message_tx: UnboundedSender<AppMessage>) -> Result<()> {
        let result = self.client.list_resources(&self.scope).await;
        debug!(scope = %self.scope, ticket = self.ticket, ok = result.is_ok(), "Refresh finished");
        message_tx.send(AppMessage::RefreshFinished {
            scope: self.scope,
            ticket: self.ticket,
            result,
        })?;
        Ok(())
    }
}
