//! Azure Resource Manager access.
//!
//! [`ResourceClient`] is the seam the rest of the application talks to.
//! [`ArmClient`] implements it over HTTPS, authenticating through a
//! credential chain (an access token or a service principal from the
//! environment, then the Azure CLI).

mod arm;
mod client;
mod credential;
mod error;
mod http;
mod wire;

pub use arm::ArmClient;
pub use client::{ActionRequest, Operation, OperationHandle, OperationStatus, ResourceClient};
pub use credential::{ChainedCredential, UserInfo};
pub use http::build_client;
pub use error::ClientError;

/// Token audience for the management plane.
pub const MANAGEMENT_RESOURCE: &str = "https://management.azure.com/";

/// Token audience for a key vault's own endpoint.
pub const KEY_VAULT_RESOURCE: &str = "https://vault.azure.net";
