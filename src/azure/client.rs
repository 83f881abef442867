use async_trait::async_trait;
use uuid::Uuid;

use super::credential::UserInfo;
use super::error::ClientError;
use crate::model::{ActionKind, Resource, ResourceKind, Scope};

/// A lifecycle action addressed to one resource.
///
/// The nonce identifies a single user confirmation. Submitting the same
/// `(resource_id, action, nonce)` twice must not act twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionRequest {
    pub resource_id: String,
    pub kind: ResourceKind,
    pub action: ActionKind,
    pub nonce: Uuid,
}

/// Where the provider reports progress of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationHandle {
    /// `Azure-AsyncOperation` header: returns a status document.
    AsyncOperation(String),
    /// `Location` header: 202 while running, 200/204 once done.
    Location(String),
}

impl OperationHandle {
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::AsyncOperation(url) | Self::Location(url) => url,
        }
    }
}

/// Immediate outcome of submitting an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Completed,
    Pending(OperationHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed(String),
}

impl OperationStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// List the direct children of `scope`.
    async fn list_resources(&self, scope: &Scope) -> Result<Vec<Resource>, ClientError>;

    /// Submit an action. Idempotent per request nonce.
    async fn perform_action(&self, request: &ActionRequest) -> Result<Operation, ClientError>;

    async fn poll_action(&self, handle: &OperationHandle) -> Result<OperationStatus, ClientError>;

    /// Identity of the signed-in user.
    async fn user_info(&self) -> Result<UserInfo, ClientError>;
}
