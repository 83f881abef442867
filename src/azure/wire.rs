//! ARM response documents and their conversion into [`Resource`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::model::{Resource, ResourceKind, ResourceStatus, parse_resource_group};

#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "nextLink")]
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArmErrorBody {
    pub error: Option<ArmErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArmErrorDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct AsyncOperationDocument {
    pub status: String,
    pub error: Option<ArmErrorDetail>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDocument {
    #[serde(default)]
    pub resource_types: Vec<ProviderResourceType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResourceType {
    pub resource_type: String,
    #[serde(default)]
    pub api_versions: Vec<String>,
}

impl ProviderResourceType {
    /// Newest stable version, falling back to the newest preview.
    pub fn preferred_api_version(&self) -> Option<&str> {
        self.api_versions
            .iter()
            .find(|v| !v.contains("preview"))
            .or_else(|| self.api_versions.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDocument {
    pub id: String,
    pub subscription_id: String,
    pub display_name: Option<String>,
    pub state: Option<String>,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
}

impl SubscriptionDocument {
    pub fn into_resource(self, now: DateTime<Utc>) -> Resource {
        let mut properties = Map::new();
        properties.insert("subscriptionId".into(), Value::String(self.subscription_id.clone()));
        if let Some(tenant) = &self.tenant_id {
            properties.insert("tenantId".into(), Value::String(tenant.clone()));
        }
        if let Some(state) = &self.state {
            properties.insert("state".into(), Value::String(state.clone()));
        }

        Resource {
            status: subscription_status(self.state.as_deref()),
            name: self.display_name.unwrap_or_else(|| self.subscription_id.clone()),
            id: self.id,
            kind: ResourceKind::Subscription,
            type_name: ResourceKind::SUBSCRIPTION_TYPE.to_string(),
            location: None,
            resource_group: None,
            tags: self.tags.unwrap_or_default(),
            properties,
            refreshed_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResourceGroupDocument {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl ResourceGroupDocument {
    pub fn into_resource(self, now: DateTime<Utc>) -> Resource {
        let properties = self.properties.unwrap_or_default();
        let status = provisioning_status(
            properties
                .get("provisioningState")
                .and_then(Value::as_str),
        );
        Resource {
            resource_group: Some(self.name.clone()),
            id: self.id,
            kind: ResourceKind::ResourceGroup,
            type_name: ResourceKind::RESOURCE_GROUP_TYPE.to_string(),
            name: self.name,
            location: self.location,
            status,
            tags: self.tags.unwrap_or_default(),
            properties,
            refreshed_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericResourceDocument {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub location: Option<String>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    pub kind: Option<String>,
    pub sku: Option<Value>,
    pub provisioning_state: Option<String>,
    pub created_time: Option<String>,
    pub changed_time: Option<String>,
}

impl GenericResourceDocument {
    pub fn into_resource(self, now: DateTime<Utc>) -> Resource {
        let mut properties = Map::new();
        let scalars = [
            ("kind", self.kind),
            ("provisioningState", self.provisioning_state),
            ("createdTime", self.created_time),
            ("changedTime", self.changed_time),
        ];
        for (key, value) in scalars {
            if let Some(value) = value {
                properties.insert(key.into(), Value::String(value));
            }
        }
        if let Some(sku) = self.sku {
            properties.insert("sku".into(), sku);
        }

        Resource {
            kind: ResourceKind::from_type(&self.type_name),
            resource_group: parse_resource_group(&self.id),
            id: self.id,
            type_name: self.type_name,
            name: self.name,
            location: self.location,
            // Only the per-type enrichment knows the runtime state.
            status: ResourceStatus::Unknown,
            tags: self.tags.unwrap_or_default(),
            properties,
            refreshed_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContainerDocument {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl ContainerDocument {
    pub fn into_resource(self, now: DateTime<Utc>) -> Resource {
        Resource {
            kind: ResourceKind::BlobContainer,
            resource_group: parse_resource_group(&self.id),
            id: self.id,
            type_name: self
                .type_name
                .unwrap_or_else(|| ResourceKind::CONTAINER_TYPE.to_string()),
            name: self.name,
            location: None,
            status: ResourceStatus::Unknown,
            tags: BTreeMap::new(),
            properties: self.properties.unwrap_or_default(),
            refreshed_at: now,
        }
    }
}

/// Enablement and timestamps shared by secrets, keys and certificates.
#[derive(Debug, Default, Deserialize)]
pub struct VaultItemAttributes {
    pub enabled: Option<bool>,
    pub created: Option<i64>,
    pub updated: Option<i64>,
    pub exp: Option<i64>,
}

impl VaultItemAttributes {
    fn status(&self) -> ResourceStatus {
        match self.enabled {
            Some(true) => ResourceStatus::Enabled,
            Some(false) => ResourceStatus::Disabled,
            None => ResourceStatus::Unknown,
        }
    }

    fn flatten_into(&self, properties: &mut Map<String, Value>) {
        if let Some(enabled) = self.enabled {
            properties.insert("enabled".into(), Value::Bool(enabled));
        }
        let times = [
            ("created", self.created),
            ("updated", self.updated),
            ("expires", self.exp),
        ];
        for (key, secs) in times {
            if let Some(text) = secs.and_then(format_unix) {
                properties.insert(key.into(), Value::String(text));
            }
        }
    }
}

fn format_unix(secs: i64) -> Option<String> {
    DateTime::from_timestamp(secs, 0).map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// A secret or key as listed by the management plane.
#[derive(Debug, Deserialize)]
pub struct VaultItemDocument {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub properties: Option<Map<String, Value>>,
}

impl VaultItemDocument {
    pub fn into_resource(self, now: DateTime<Utc>) -> Resource {
        let mut properties = self.properties.unwrap_or_default();
        let attributes: VaultItemAttributes = properties
            .remove("attributes")
            .and_then(|a| serde_json::from_value(a).ok())
            .unwrap_or_default();
        attributes.flatten_into(&mut properties);

        Resource {
            kind: ResourceKind::from_type(&self.type_name),
            resource_group: parse_resource_group(&self.id),
            id: self.id,
            type_name: self.type_name,
            name: self.name,
            location: None,
            status: attributes.status(),
            tags: self.tags.unwrap_or_default(),
            properties,
            refreshed_at: now,
        }
    }
}

/// A certificate as listed by the vault's own endpoint.
#[derive(Debug, Deserialize)]
pub struct CertificateItemDocument {
    pub id: String,
    pub x5t: Option<String>,
    #[serde(default)]
    pub attributes: VaultItemAttributes,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
}

impl CertificateItemDocument {
    /// Rows are keyed under `vault_id` so they sit beside the vault's other items.
    pub fn into_resource(self, vault_id: &str, now: DateTime<Utc>) -> Resource {
        let name = self
            .id
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let mut properties = Map::new();
        properties.insert("certificateUri".into(), Value::String(self.id));
        if let Some(x5t) = self.x5t {
            properties.insert("x5t".into(), Value::String(x5t));
        }
        self.attributes.flatten_into(&mut properties);

        let id = format!("{vault_id}/certificates/{name}");
        Resource {
            kind: ResourceKind::Certificate,
            resource_group: parse_resource_group(&id),
            id,
            type_name: ResourceKind::CERTIFICATE_TYPE.to_string(),
            name,
            location: None,
            status: self.attributes.status(),
            tags: self.tags.unwrap_or_default(),
            properties,
            refreshed_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VaultDocument {
    pub properties: VaultProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultProperties {
    pub vault_uri: Option<String>,
}

pub fn subscription_status(state: Option<&str>) -> ResourceStatus {
    match state {
        Some(s) if s.eq_ignore_ascii_case("Enabled") => ResourceStatus::Running,
        Some(s)
            if ["Disabled", "Deleted", "Warned"]
                .iter()
                .any(|d| s.eq_ignore_ascii_case(d)) =>
        {
            ResourceStatus::Stopped
        }
        _ => ResourceStatus::Unknown,
    }
}

pub fn provisioning_status(state: Option<&str>) -> ResourceStatus {
    match state {
        Some(s) if s.eq_ignore_ascii_case("Succeeded") => ResourceStatus::Running,
        Some(s) if s.eq_ignore_ascii_case("Deleting") => ResourceStatus::Transitioning,
        _ => ResourceStatus::Unknown,
    }
}

/// Status from the `PowerState/*` code of a VM instance view.
pub fn vm_power_status(instance_view: &Value) -> ResourceStatus {
    let Some(statuses) = instance_view.get("statuses").and_then(Value::as_array) else {
        return ResourceStatus::Unknown;
    };
    let power = statuses
        .iter()
        .filter_map(|s| s.get("code").and_then(Value::as_str))
        .find_map(|code| code.strip_prefix("PowerState/"));

    match power {
        Some("running") => ResourceStatus::Running,
        Some("stopped" | "deallocated") => ResourceStatus::Stopped,
        Some("starting" | "stopping" | "deallocating") => ResourceStatus::Transitioning,
        _ => ResourceStatus::Unknown,
    }
}

pub fn web_app_status(state: Option<&str>) -> ResourceStatus {
    match state {
        Some(s) if s.eq_ignore_ascii_case("Running") => ResourceStatus::Running,
        Some(s) if s.eq_ignore_ascii_case("Stopped") => ResourceStatus::Stopped,
        _ => ResourceStatus::Unknown,
    }
}

/// Map an async-operation document onto a terminal or running status.
pub fn operation_status(doc: AsyncOperationDocument) -> crate::azure::OperationStatus {
    use crate::azure::OperationStatus;

    match doc.status.to_ascii_lowercase().as_str() {
        "succeeded" => OperationStatus::Succeeded,
        "failed" | "canceled" | "cancelled" => {
            let reason = doc
                .error
                .map(|e| {
                    if e.message.is_empty() {
                        e.code
                    } else {
                        e.message
                    }
                })
                .filter(|r| !r.is_empty())
                .unwrap_or(doc.status);
            OperationStatus::Failed(reason)
        }
        _ => OperationStatus::InProgress,
    }
}
