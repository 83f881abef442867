use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::Result;
use tokio::sync::mpsc::UnboundedSender;

use crate::app::AppMessage;
use crate::azure::{ActionRequest, OperationHandle, ResourceClient};
use crate::commands::Command;
use crate::dispatcher::{ActionId, PollRequest, Submission};

/// Send a confirmed action to the provider.
pub struct SubmitActionCmd {
    client: Arc<dyn ResourceClient>,
    id: ActionId,
    request: ActionRequest,
    resource_name: String,
}

impl SubmitActionCmd {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        submission: Submission,
        resource_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            id: submission.id,
            request: submission.request,
            resource_name: resource_name.into(),
        }
    }
}

#[async_trait]
impl Command for SubmitActionCmd {
    fn name(&self) -> String {
        format!("{} {}", self.request.action, self.resource_name)
    }

    async fn execute(self: Box<Self>, message_tx: UnboundedSender<AppMessage>) -> Result<()> {
        let result = self.client.perform_action(&self.request).await;
        message_tx.send(AppMessage::ActionSubmitted {
            id: self.id,
            result,
        })?;
        Ok(())
    }
}

/// Ask the provider how a long-running action is doing.
pub struct PollActionCmd {
    client: Arc<dyn ResourceClient>,
    id: ActionId,
    seq: u64,
    handle: OperationHandle,
}

impl PollActionCmd {
    pub fn new(client: Arc<dyn ResourceClient>, poll: PollRequest) -> Self {
        Self {
            client,
            id: poll.id,
            seq: poll.seq,
            handle: poll.handle,
        }
    }
}

#[async_trait]
impl Command for PollActionCmd {
    fn name(&self) -> String {
        format!("Poll action #{}", self.id)
    }

    async fn execute(self: Box<Self>, message_tx: UnboundedSender<AppMessage>) -> Result<()> {
        let result = self.client.poll_action(&self.handle).await;
        message_tx.send(AppMessage::ActionPolled {
            id: self.id,
            seq: self.seq,
            result,
        })?;
        Ok(())
    }
}
