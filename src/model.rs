//! Domain types shared by the client, cache, navigator and renderer.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use chrono::{DateTime, Utc};

/// Boundary over which resources are listed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Tenant root, lists the subscriptions visible to the signed-in user.
    Subscriptions,
    /// Lists the resource groups of a subscription.
    Subscription { subscription_id: String },
    /// Lists the resource types present in a resource group, with counts.
    ResourceGroup {
        subscription_id: String,
        resource_group: String,
    },
    /// Lists the resources of one type inside a resource group.
    ResourceType {
        subscription_id: String,
        resource_group: String,
        type_name: String,
    },
    /// Lists the blob containers of a storage account.
    Containers { account_id: String },
    /// Lists the secrets, keys and certificates of a key vault.
    Vault { vault_id: String },
}

impl Scope {
    pub fn subscription(subscription_id: impl Into<String>) -> Self {
        Self::Subscription {
            subscription_id: subscription_id.into(),
        }
    }

    pub fn resource_group(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
    ) -> Self {
        Self::ResourceGroup {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
        }
    }

    pub fn resource_type(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self::ResourceType {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            type_name: type_name.into(),
        }
    }

    #[must_use]
    pub fn subscription_id(&self) -> Option<&str> {
        match self {
            Self::Subscriptions => None,
            Self::Subscription { subscription_id }
            | Self::ResourceGroup {
                subscription_id, ..
            }
            | Self::ResourceType {
                subscription_id, ..
            } => Some(subscription_id),
            Self::Containers { account_id: id } | Self::Vault { vault_id: id } => {
                id_segment(id, "subscriptions")
            }
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        match self {
            Self::Subscriptions => None,
            Self::Subscription { .. } => Some(Self::Subscriptions),
            Self::ResourceGroup {
                subscription_id, ..
            } => Some(Self::subscription(subscription_id.clone())),
            Self::ResourceType {
                subscription_id,
                resource_group,
                ..
            } => Some(Self::resource_group(
                subscription_id.clone(),
                resource_group.clone(),
            )),
            Self::Containers { account_id } => {
                type_scope_of(account_id, ResourceKind::STORAGE_ACCOUNT_TYPE)
            }
            Self::Vault { vault_id } => type_scope_of(vault_id, ResourceKind::KEY_VAULT_TYPE),
        }
    }
}

/// Resource-type scope holding the resource `id` of type `type_name`.
fn type_scope_of(id: &str, type_name: &str) -> Option<Scope> {
    Some(Scope::resource_type(
        id_segment(id, "subscriptions")?,
        id_segment(id, "resourceGroups")?,
        type_name,
    ))
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscriptions => write!(f, "subscriptions"),
            Self::Subscription { subscription_id } => write!(f, "subscription {subscription_id}"),
            Self::ResourceGroup { resource_group, .. } => {
                write!(f, "resource group {resource_group}")
            }
            Self::ResourceType {
                resource_group,
                type_name,
                ..
            } => write!(f, "{} in {resource_group}", short_type(type_name)),
            Self::Containers { account_id } => {
                write!(f, "storage account {}", last_segment(account_id))
            }
            Self::Vault { vault_id } => write!(f, "key vault {}", last_segment(vault_id)),
        }
    }
}

/// Type tag of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Subscription,
    ResourceGroup,
    VirtualMachine,
    StorageAccount,
    WebApp,
    KeyVault,
    /// A row summarising every resource of one type in a resource group.
    ResourceType,
    BlobContainer,
    Secret,
    Key,
    Certificate,
    Other,
}

impl ResourceKind {
    pub const SUBSCRIPTION_TYPE: &'static str = "Microsoft.Resources/subscriptions";
    pub const RESOURCE_GROUP_TYPE: &'static str = "Microsoft.Resources/resourceGroups";
    pub const STORAGE_ACCOUNT_TYPE: &'static str = "Microsoft.Storage/storageAccounts";
    pub const KEY_VAULT_TYPE: &'static str = "Microsoft.KeyVault/vaults";
    pub const CONTAINER_TYPE: &'static str =
        "Microsoft.Storage/storageAccounts/blobServices/containers";
    pub const SECRET_TYPE: &'static str = "Microsoft.KeyVault/vaults/secrets";
    pub const KEY_TYPE: &'static str = "Microsoft.KeyVault/vaults/keys";
    pub const CERTIFICATE_TYPE: &'static str = "Microsoft.KeyVault/vaults/certificates";

    /// Classify an ARM resource type such as `Microsoft.Compute/virtualMachines`.
    pub fn from_type(type_name: &str) -> Self {
        match type_name.to_ascii_lowercase().as_str() {
            "microsoft.resources/subscriptions" => Self::Subscription,
            "microsoft.resources/resourcegroups" => Self::ResourceGroup,
            "microsoft.compute/virtualmachines" => Self::VirtualMachine,
            "microsoft.storage/storageaccounts" => Self::StorageAccount,
            "microsoft.web/sites" => Self::WebApp,
            "microsoft.keyvault/vaults" => Self::KeyVault,
            "microsoft.storage/storageaccounts/blobservices/containers" => Self::BlobContainer,
            "microsoft.keyvault/vaults/secrets" => Self::Secret,
            "microsoft.keyvault/vaults/keys" => Self::Key,
            "microsoft.keyvault/vaults/certificates" => Self::Certificate,
            _ => Self::Other,
        }
    }

    /// Lifecycle actions the provider exposes for this kind.
    #[must_use]
    pub const fn actions(self) -> &'static [ActionKind] {
        match self {
            Self::Subscription
            | Self::ResourceType
            | Self::BlobContainer
            | Self::Secret
            | Self::Key
            | Self::Certificate => &[],
            Self::VirtualMachine | Self::WebApp => &[
                ActionKind::Start,
                ActionKind::Stop,
                ActionKind::Restart,
                ActionKind::Delete,
            ],
            Self::ResourceGroup | Self::StorageAccount | Self::KeyVault | Self::Other => {
                &[ActionKind::Delete]
            }
        }
    }

    #[must_use]
    pub fn supports(self, action: ActionKind) -> bool {
        self.actions().contains(&action)
    }
}

/// Provider-reported state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    Running,
    Stopped,
    Transitioning,
    /// Key Vault items report enablement instead of a power state.
    Enabled,
    Disabled,
    Unknown,
}

impl ResourceStatus {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Transitioning => "Transitioning",
            Self::Enabled => "Enabled",
            Self::Disabled => "Disabled",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Operation a user can request against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Start,
    Stop,
    Restart,
    Delete,
}

impl ActionKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Stop => "Stop",
            Self::Restart => "Restart",
            Self::Delete => "Delete",
        }
    }

    /// Present participle used in progress messages.
    #[must_use]
    pub const fn progressive(self) -> &'static str {
        match self {
            Self::Start => "Starting",
            Self::Stop => "Stopping",
            Self::Restart => "Restarting",
            Self::Delete => "Deleting",
        }
    }

    #[must_use]
    pub const fn is_destructive(self) -> bool {
        matches!(self, Self::Delete)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Snapshot of a single resource as returned by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: String,
    pub kind: ResourceKind,
    /// Full ARM type, e.g. `Microsoft.Compute/virtualMachines`.
    pub type_name: String,
    pub name: String,
    pub location: Option<String>,
    pub resource_group: Option<String>,
    pub status: ResourceStatus,
    pub tags: BTreeMap<String, String>,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub refreshed_at: DateTime<Utc>,
}

impl Resource {
    /// Scope listing the children of this resource, if it is a container.
    #[must_use]
    pub fn child_scope(&self) -> Option<Scope> {
        match self.kind {
            ResourceKind::Subscription => {
                parse_subscription_id(&self.id).map(Scope::subscription)
            }
            ResourceKind::ResourceGroup => {
                let sub = parse_subscription_id(&self.id)?;
                Some(Scope::resource_group(sub, self.name.clone()))
            }
            ResourceKind::ResourceType => Some(Scope::resource_type(
                parse_subscription_id(&self.id)?,
                self.resource_group.clone()?,
                self.type_name.clone(),
            )),
            ResourceKind::StorageAccount => Some(Scope::Containers {
                account_id: self.id.clone(),
            }),
            ResourceKind::KeyVault => Some(Scope::Vault {
                vault_id: self.id.clone(),
            }),
            _ => None,
        }
    }

    /// Summary row for `count` resources of `type_name` in a resource group.
    pub fn type_summary(
        subscription_id: &str,
        resource_group: &str,
        type_name: &str,
        count: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let mut properties = serde_json::Map::new();
        properties.insert("count".into(), Value::from(count));
        Self {
            id: format!(
                "/subscriptions/{subscription_id}/resourceGroups/{resource_group}/providers/{type_name}"
            ),
            kind: ResourceKind::ResourceType,
            type_name: type_name.to_string(),
            name: short_type(type_name).to_string(),
            location: None,
            resource_group: Some(resource_group.to_string()),
            status: ResourceStatus::Unknown,
            tags: BTreeMap::new(),
            properties,
            refreshed_at: now,
        }
    }

    /// Follow a dotted `path` through the properties and render a scalar.
    #[must_use]
    pub fn property(&self, path: &str) -> Option<String> {
        let mut keys = path.split('.');
        let mut value = self.properties.get(keys.next()?)?;
        for key in keys {
            value = value.get(key)?;
        }
        match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    #[must_use]
    pub fn subscription_id(&self) -> Option<String> {
        parse_subscription_id(&self.id)
    }

    /// Type without the provider namespace, e.g. `virtualMachines`.
    #[must_use]
    pub fn short_type(&self) -> &str {
        short_type(&self.type_name)
    }

    /// Texts the list filter matches against.
    pub fn search_texts(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.name.as_str()),
            Some(self.short_type()),
            self.location.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// One summary row per resource type, ordered by type name.
pub fn summarize_types(
    resources: &[Resource],
    subscription_id: &str,
    resource_group: &str,
    now: DateTime<Utc>,
) -> Vec<Resource> {
    // Keyed case-insensitively; the first spelling seen is kept.
    let mut counts: BTreeMap<String, (&str, usize)> = BTreeMap::new();
    for resource in resources {
        counts
            .entry(resource.type_name.to_ascii_lowercase())
            .or_insert((resource.type_name.as_str(), 0))
            .1 += 1;
    }
    let mut summaries: Vec<Resource> = counts
        .into_values()
        .map(|(type_name, count)| {
            Resource::type_summary(subscription_id, resource_group, type_name, count, now)
        })
        .collect();
    summaries.sort_by_key(|r| r.name.to_ascii_lowercase());
    summaries
}

pub fn short_type(type_name: &str) -> &str {
    match type_name.rfind('/') {
        Some(idx) if idx + 1 < type_name.len() => &type_name[idx + 1..],
        _ => type_name,
    }
}

/// Final path segment of an ARM id.
pub fn last_segment(id: &str) -> &str {
    id.trim_end_matches('/').rsplit('/').next().unwrap_or(id)
}

/// Value following `segment` in an ARM id, compared case-insensitively.
fn id_segment<'a>(id: &'a str, segment: &str) -> Option<&'a str> {
    let mut parts = id.split('/').filter(|p| !p.is_empty());
    while let Some(part) = parts.next() {
        if part.eq_ignore_ascii_case(segment) {
            return parts.next();
        }
    }
    None
}

pub fn parse_subscription_id(id: &str) -> Option<String> {
    id_segment(id, "subscriptions").map(str::to_string)
}

pub fn parse_resource_group(id: &str) -> Option<String> {
    id_segment(id, "resourceGroups").map(str::to_string)
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn resource(name: &str, kind: ResourceKind, status: ResourceStatus) -> Resource {
        let (id, type_name) = match kind {
            ResourceKind::Subscription => (
                format!("/subscriptions/{name}"),
                ResourceKind::SUBSCRIPTION_TYPE.to_string(),
            ),
            ResourceKind::ResourceGroup => (
                format!("/subscriptions/sub-1/resourceGroups/{name}"),
                ResourceKind::RESOURCE_GROUP_TYPE.to_string(),
            ),
            _ => {
                let type_name = match kind {
                    ResourceKind::VirtualMachine => "Microsoft.Compute/virtualMachines",
                    ResourceKind::StorageAccount => "Microsoft.Storage/storageAccounts",
                    ResourceKind::WebApp => "Microsoft.Web/sites",
                    ResourceKind::KeyVault => "Microsoft.KeyVault/vaults",
                    ResourceKind::BlobContainer => ResourceKind::CONTAINER_TYPE,
                    ResourceKind::Secret => ResourceKind::SECRET_TYPE,
                    ResourceKind::Key => ResourceKind::KEY_TYPE,
                    ResourceKind::Certificate => ResourceKind::CERTIFICATE_TYPE,
                    _ => "Microsoft.Network/virtualNetworks",
                };
                (
                    format!("/subscriptions/sub-1/resourceGroups/rg-1/providers/{type_name}/{name}"),
                    type_name.to_string(),
                )
            }
        };
        Resource {
            resource_group: parse_resource_group(&id),
            id,
            kind,
            type_name,
            name: name.to_string(),
            location: Some("westeurope".to_string()),
            status,
            tags: BTreeMap::new(),
            properties: serde_json::Map::new(),
            refreshed_at: Utc::now(),
        }
    }

    pub fn vm(name: &str, status: ResourceStatus) -> Resource {
        resource(name, ResourceKind::VirtualMachine, status)
    }

    pub fn type_summary(type_name: &str, count: usize) -> Resource {
        Resource::type_summary("sub-1", "rg-1", type_name, count, Utc::now())
    }
}
