//! Tracks confirmed actions from submission until a terminal status.
//!
//! The dispatcher holds no client. It produces [`Submission`]s and
//! [`PollRequest`]s for the main loop to run in the background and consumes
//! their results. An action moves `Queued → InFlight → Succeeded | Failed`
//! (or straight from `Queued` to a terminal status) and never leaves a
//! terminal status until the user acknowledges it.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::azure::{ActionRequest, ClientError, Operation, OperationHandle, OperationStatus};
use crate::model::{ActionKind, Resource, Scope};

pub type ActionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    Queued,
    InFlight,
    Succeeded,
    Failed(String),
}

impl ActionStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Queued => "Queued".to_string(),
            Self::InFlight => "In progress".to_string(),
            Self::Succeeded => "Succeeded".to_string(),
            Self::Failed(reason) => format!("Failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PendingAction {
    pub id: ActionId,
    pub resource_id: String,
    pub resource_name: String,
    /// Scope the resource was listed in, invalidated on completion.
    pub scope: Scope,
    pub action: ActionKind,
    pub nonce: Uuid,
    pub status: ActionStatus,
    pub handle: Option<OperationHandle>,
    pub created_at: Instant,
    pub finished_at: Option<Instant>,
    next_poll: Option<Instant>,
    poll_seq: u64,
    outstanding_poll: Option<u64>,
    poll_failures: u32,
}

impl PendingAction {
    fn finish(&mut self, status: ActionStatus, now: Instant) -> Completion {
        self.status = status;
        self.finished_at = Some(now);
        self.next_poll = None;
        self.outstanding_poll = None;
        Completion {
            id: self.id,
            resource_id: self.resource_id.clone(),
            resource_name: self.resource_name.clone(),
            scope: self.scope.clone(),
            action: self.action,
            outcome: match &self.status {
                ActionStatus::Failed(reason) => Err(reason.clone()),
                _ => Ok(()),
            },
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.finished_at
            .unwrap_or(now)
            .saturating_duration_since(self.created_at)
    }
}

/// A new action ready to be sent to the client.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: ActionId,
    pub request: ActionRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    pub id: ActionId,
    pub seq: u64,
    pub handle: OperationHandle,
}

/// Emitted once when an action reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: ActionId,
    pub resource_id: String,
    pub resource_name: String,
    pub scope: Scope,
    pub action: ActionKind,
    pub outcome: Result<(), String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("{action} is not supported for {name}")]
    Unsupported { name: String, action: ActionKind },
    #[error("{action} is already running for {name}")]
    Duplicate { name: String, action: ActionKind },
}

#[derive(Debug)]
pub struct ActionDispatcher {
    actions: Vec<PendingAction>,
    next_id: ActionId,
    poll_interval: Duration,
    max_poll_failures: u32,
}

impl ActionDispatcher {
    pub const fn new(poll_interval: Duration, max_poll_failures: u32) -> Self {
        Self {
            actions: Vec::new(),
            next_id: 1,
            poll_interval,
            max_poll_failures,
        }
    }

    pub fn enqueue(
        &mut self,
        resource: &Resource,
        scope: Scope,
        action: ActionKind,
        now: Instant,
    ) -> Result<Submission, DispatchError> {
        if !resource.kind.supports(action) {
            return Err(DispatchError::Unsupported {
                name: resource.name.clone(),
                action,
            });
        }
        let duplicate = self.actions.iter().any(|a| {
            a.resource_id == resource.id && a.action == action && !a.status.is_terminal()
        });
        if duplicate {
            return Err(DispatchError::Duplicate {
                name: resource.name.clone(),
                action,
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        let nonce = Uuid::new_v4();
        self.actions.push(PendingAction {
            id,
            resource_id: resource.id.clone(),
            resource_name: resource.name.clone(),
            scope,
            action,
            nonce,
            status: ActionStatus::Queued,
            handle: None,
            created_at: now,
            finished_at: None,
            next_poll: None,
            poll_seq: 0,
            outstanding_poll: None,
            poll_failures: 0,
        });
        info!(id, resource = %resource.name, %action, "Action queued");

        Ok(Submission {
            id,
            request: ActionRequest {
                resource_id: resource.id.clone(),
                kind: resource.kind,
                action,
                nonce,
            },
        })
    }

    /// Record the client's answer to a submission.
    pub fn on_submitted(
        &mut self,
        id: ActionId,
        result: Result<Operation, ClientError>,
        now: Instant,
    ) -> Option<Completion> {
        let interval = self.poll_interval;
        let Some(action) = self.get_mut(id) else {
            debug!(id, "Dropping submission result for unknown action");
            return None;
        };
        if action.status != ActionStatus::Queued {
            debug!(id, status = ?action.status, "Dropping duplicate submission result");
            return None;
        }

        match result {
            Ok(Operation::Completed) => {
                info!(id, action = %action.action, "Action completed");
                Some(action.finish(ActionStatus::Succeeded, now))
            }
            Ok(Operation::Pending(handle)) => {
                debug!(id, url = handle.url(), "Action accepted");
                action.status = ActionStatus::InFlight;
                action.handle = Some(handle);
                action.next_poll = Some(now + interval);
                None
            }
            Err(error) => {
                warn!(id, action = %action.action, %error, "Action rejected");
                Some(action.finish(ActionStatus::Failed(error.to_string()), now))
            }
        }
    }

    /// Polls that are due and not already outstanding.
    pub fn due_polls(&mut self, now: Instant) -> Vec<PollRequest> {
        let mut due = Vec::new();
        for action in &mut self.actions {
            if action.status != ActionStatus::InFlight || action.outstanding_poll.is_some() {
                continue;
            }
            let (Some(at), Some(handle)) = (action.next_poll, &action.handle) else {
                continue;
            };
            if now < at {
                continue;
            }
            action.poll_seq += 1;
            action.outstanding_poll = Some(action.poll_seq);
            due.push(PollRequest {
                id: action.id,
                seq: action.poll_seq,
                handle: handle.clone(),
            });
        }
        due
    }

    pub fn on_polled(
        &mut self,
        id: ActionId,
        seq: u64,
        result: Result<OperationStatus, ClientError>,
        now: Instant,
    ) -> Option<Completion> {
        let interval = self.poll_interval;
        let max_failures = self.max_poll_failures;
        let Some(action) = self.get_mut(id) else {
            debug!(id, seq, "Dropping poll result for unknown action");
            return None;
        };
        if action.status != ActionStatus::InFlight || action.outstanding_poll != Some(seq) {
            debug!(id, seq, "Dropping superseded poll result");
            return None;
        }
        action.outstanding_poll = None;

        match result {
            Ok(OperationStatus::InProgress) => {
                action.poll_failures = 0;
                action.next_poll = Some(now + interval);
                None
            }
            Ok(OperationStatus::Succeeded) => {
                info!(id, action = %action.action, resource = %action.resource_name, "Action succeeded");
                Some(action.finish(ActionStatus::Succeeded, now))
            }
            Ok(OperationStatus::Failed(reason)) => {
                warn!(id, action = %action.action, %reason, "Action failed");
                Some(action.finish(ActionStatus::Failed(reason), now))
            }
            Err(error) if error.is_retryable() && action.poll_failures + 1 < max_failures => {
                action.poll_failures += 1;
                action.next_poll = Some(now + interval);
                warn!(id, %error, failures = action.poll_failures, "Poll failed, retrying");
                None
            }
            Err(error) => {
                warn!(id, %error, "Poll failed, giving up");
                Some(action.finish(ActionStatus::Failed(error.to_string()), now))
            }
        }
    }

    /// Drop the terminal actions of a resource. Returns how many were removed.
    pub fn acknowledge(&mut self, resource_id: &str) -> usize {
        let before = self.actions.len();
        self.actions
            .retain(|a| !(a.resource_id == resource_id && a.status.is_terminal()));
        before - self.actions.len()
    }

    #[cfg(test)]
    fn get(&self, id: ActionId) -> Option<&PendingAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    fn get_mut(&mut self, id: ActionId) -> Option<&mut PendingAction> {
        self.actions.iter_mut().find(|a| a.id == id)
    }

    /// Actions of one resource, oldest first.
    pub fn for_resource<'a>(
        &'a self,
        resource_id: &'a str,
    ) -> impl Iterator<Item = &'a PendingAction> + 'a {
        self.actions
            .iter()
            .filter(move |a| a.resource_id == resource_id)
    }

    #[cfg(test)]
    fn is_busy(&self, resource_id: &str) -> bool {
        self.for_resource(resource_id)
            .any(|a| !a.status.is_terminal())
    }

    #[cfg(test)]
    pub fn actions(&self) -> &[PendingAction] {
        &self.actions
    }

    pub fn running(&self) -> impl Iterator<Item = &PendingAction> {
        self.actions.iter().filter(|a| !a.status.is_terminal())
    }
}
