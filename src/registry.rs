//! Per-type presentation of resources.
//!
//! Every resource kind may register a [`ResourceHandler`] that names the
//! kind and contributes extra fields to the detail view. Kinds without a
//! handler fall back to [`DefaultHandler`].

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::model::{Resource, ResourceKind};

/// Type-specific behaviour for the detail view and list.
pub trait ResourceHandler: Send + Sync {
    /// The kind this handler is registered for.
    fn kind(&self) -> ResourceKind;

    /// Plural display name, e.g. "Virtual Machines".
    fn display_name(&self) -> &'static str;

    /// Single-width glyph shown before the resource name.
    fn icon(&self) -> &'static str {
        "•"
    }

    /// Fields shown in the detail view after the common ones.
    fn detail_fields(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        _ = resource;
        Vec::new()
    }
}

/// Registry of resource handlers keyed by kind.
pub struct HandlerRegistry {
    handlers: HashMap<ResourceKind, Arc<dyn ResourceHandler>>,
    fallback: Arc<dyn ResourceHandler>,
}

impl HandlerRegistry {
    /// Create a registry holding only the default handler.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(DefaultHandler),
        }
    }

    /// Registry with every built-in handler.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(SubscriptionHandler);
        registry.register(ResourceGroupHandler);
        registry.register(VirtualMachineHandler);
        registry.register(WebAppHandler);
        registry.register(StorageAccountHandler);
        registry.register(KeyVaultHandler);
        registry.register(ResourceTypeHandler);
        registry.register(BlobContainerHandler);
        registry.register(VaultItemHandler(ResourceKind::Secret));
        registry.register(VaultItemHandler(ResourceKind::Key));
        registry.register(VaultItemHandler(ResourceKind::Certificate));
        registry
    }

    /// Register a handler, replacing any handler for the same kind.
    pub fn register<H: ResourceHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.kind(), Arc::new(handler));
    }

    /// Handler for `kind`, or the default handler.
    pub fn get(&self, kind: ResourceKind) -> &dyn ResourceHandler {
        self.handlers
            .get(&kind)
            .map_or(self.fallback.as_ref(), Arc::as_ref)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.handlers.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

/// Used for any kind without a dedicated handler.
pub struct DefaultHandler;

impl ResourceHandler for DefaultHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Other
    }

    fn display_name(&self) -> &'static str {
        "Resources"
    }
}

struct SubscriptionHandler;

impl ResourceHandler for SubscriptionHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Subscription
    }

    fn display_name(&self) -> &'static str {
        "Subscriptions"
    }

    fn icon(&self) -> &'static str {
        "◆"
    }

    fn detail_fields(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        fields(resource, &[("Tenant", "tenantId"), ("State", "state")])
    }
}

struct ResourceGroupHandler;

impl ResourceHandler for ResourceGroupHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ResourceGroup
    }

    fn display_name(&self) -> &'static str {
        "Resource Groups"
    }

    fn icon(&self) -> &'static str {
        "▣"
    }

    fn detail_fields(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        fields(resource, &[("Provisioning", "provisioningState")])
    }
}

struct VirtualMachineHandler;

impl ResourceHandler for VirtualMachineHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::VirtualMachine
    }

    fn display_name(&self) -> &'static str {
        "Virtual Machines"
    }

    fn icon(&self) -> &'static str {
        "▶"
    }

    fn detail_fields(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        let mut out = fields(
            resource,
            &[
                ("Size", "hardwareProfile.vmSize"),
                ("OS", "storageProfile.osDisk.osType"),
                ("Computer name", "osProfile.computerName"),
            ],
        );
        if let Some(power) = power_state(resource) {
            out.push(("Power state", power));
        }
        out
    }
}

struct WebAppHandler;

impl ResourceHandler for WebAppHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::WebApp
    }

    fn display_name(&self) -> &'static str {
        "Web Apps"
    }

    fn icon(&self) -> &'static str {
        "◎"
    }

    fn detail_fields(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        let mut out = fields(
            resource,
            &[("State", "state"), ("Plan", "serverFarmId")],
        );
        if let Some(host) = resource.property("defaultHostName") {
            out.insert(0, ("URL", format!("https://{host}")));
        }
        out
    }
}

struct StorageAccountHandler;

impl ResourceHandler for StorageAccountHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::StorageAccount
    }

    fn display_name(&self) -> &'static str {
        "Storage Accounts"
    }

    fn icon(&self) -> &'static str {
        "▤"
    }

    fn detail_fields(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        let mut out = vec![(
            "Blob endpoint",
            format!("https://{}.blob.core.windows.net/", resource.name),
        )];
        out.extend(fields(
            resource,
            &[("Account kind", "kind"), ("SKU", "sku.name")],
        ));
        out
    }
}

struct KeyVaultHandler;

impl ResourceHandler for KeyVaultHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::KeyVault
    }

    fn display_name(&self) -> &'static str {
        "Key Vaults"
    }

    fn icon(&self) -> &'static str {
        "⚿"
    }

    fn detail_fields(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        let uri = resource.property("vaultUri")
            .unwrap_or_else(|| format!("https://{}.vault.azure.net/", resource.name));
        let mut out = vec![("Vault URI", uri)];
        out.extend(fields(resource, &[("SKU", "sku.name")]));
        out
    }
}

struct ResourceTypeHandler;

impl ResourceHandler for ResourceTypeHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ResourceType
    }

    fn display_name(&self) -> &'static str {
        "Resource Types"
    }

    fn icon(&self) -> &'static str {
        "≡"
    }

    fn detail_fields(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        let mut out = vec![("Type", resource.type_name.clone())];
        if let Some((provider, _)) = resource.type_name.split_once('/') {
            out.push(("Provider", provider.to_string()));
        }
        out.extend(fields(resource, &[("Resources", "count")]));
        out
    }
}

struct BlobContainerHandler;

impl ResourceHandler for BlobContainerHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::BlobContainer
    }

    fn display_name(&self) -> &'static str {
        "Blob Containers"
    }

    fn icon(&self) -> &'static str {
        "▭"
    }

    fn detail_fields(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        fields(
            resource,
            &[
                ("Public access", "publicAccess"),
                ("Lease", "leaseState"),
                ("Last modified", "lastModifiedTime"),
            ],
        )
    }
}

/// Secrets, keys and certificates share the vault item attributes.
struct VaultItemHandler(ResourceKind);

impl ResourceHandler for VaultItemHandler {
    fn kind(&self) -> ResourceKind {
        self.0
    }

    fn display_name(&self) -> &'static str {
        match self.0 {
            ResourceKind::Secret => "Secrets",
            ResourceKind::Key => "Keys",
            _ => "Certificates",
        }
    }

    fn icon(&self) -> &'static str {
        match self.0 {
            ResourceKind::Secret => "✱",
            ResourceKind::Key => "⚷",
            _ => "✎",
        }
    }

    fn detail_fields(&self, resource: &Resource) -> Vec<(&'static str, String)> {
        fields(
            resource,
            &[
                ("Enabled", "enabled"),
                ("Key type", "kty"),
                ("Content type", "contentType"),
                ("Thumbprint", "x5t"),
                ("Created", "created"),
                ("Updated", "updated"),
                ("Expires", "expires"),
            ],
        )
    }
}

fn fields(resource: &Resource, wanted: &[(&'static str, &str)]) -> Vec<(&'static str, String)> {
    wanted
        .iter()
        .filter_map(|(label, path)| resource.property(path).map(|v| (*label, v)))
        .collect()
}

/// Display text of the `PowerState/*` status in a VM instance view.
fn power_state(resource: &Resource) -> Option<String> {
    resource
        .properties
        .get("instanceView")?
        .get("statuses")?
        .as_array()?
        .iter()
        .find(|s| {
            s.get("code")
                .and_then(Value::as_str)
                .is_some_and(|c| c.starts_with("PowerState/"))
        })
        .and_then(|s| s.get("displayStatus").and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::model::ResourceStatus;
    use crate::model::fixtures::{resource, type_summary, vm};

    #[test]
    fn test_unknown_kind_uses_default_handler() {
        let registry = HandlerRegistry::with_builtin();
        assert_eq!(registry.get(ResourceKind::Other).display_name(), "Resources");
        assert_eq!(registry.len(), 11);

        let empty = HandlerRegistry::new();
        assert!(empty.is_empty());
        assert_eq!(empty.get(ResourceKind::VirtualMachine).display_name(), "Resources");
    }

    #[test]
    fn test_register_replaces_handler() {
        struct Custom;
        impl ResourceHandler for Custom {
            fn kind(&self) -> ResourceKind {
                ResourceKind::KeyVault
            }
            fn display_name(&self) -> &'static str {
                "Vaults"
            }
        }

        let mut registry = HandlerRegistry::with_builtin();
        registry.register(Custom);
        assert_eq!(registry.get(ResourceKind::KeyVault).display_name(), "Vaults");
        assert_eq!(registry.len(), 11);
    }

    #[test]
    fn test_vm_detail_fields() {
        let mut machine = vm("vm-1", ResourceStatus::Stopped);
        machine.properties = json!({
            "hardwareProfile": {"vmSize": "Standard_B2s"},
            "storageProfile": {"osDisk": {"osType": "Linux"}},
            "instanceView": {"statuses": [
                {"code": "ProvisioningState/succeeded", "displayStatus": "Provisioning succeeded"},
                {"code": "PowerState/deallocated", "displayStatus": "VM deallocated"}
            ]}
        })
        .as_object()
        .cloned()
        .unwrap();

        let registry = HandlerRegistry::with_builtin();
        let fields = registry.get(machine.kind).detail_fields(&machine);
        assert_eq!(
            fields,
            vec![
                ("Size", "Standard_B2s".to_string()),
                ("OS", "Linux".to_string()),
                ("Power state", "VM deallocated".to_string()),
            ]
        );
    }

    #[test]
    fn test_key_vault_uri_falls_back_to_name() {
        let vault = resource("kv-prod", ResourceKind::KeyVault, ResourceStatus::Unknown);
        let registry = HandlerRegistry::with_builtin();
        let fields = registry.get(vault.kind).detail_fields(&vault);
        assert_eq!(fields[0], ("Vault URI", "https://kv-prod.vault.azure.net/".to_string()));
    }

    #[test]
    fn test_resource_type_fields() {
        let summary = type_summary("Microsoft.Compute/virtualMachines", 4);
        let registry = HandlerRegistry::with_builtin();
        let handler = registry.get(summary.kind);
        assert_eq!(handler.display_name(), "Resource Types");
        assert_eq!(
            handler.detail_fields(&summary),
            vec![
                ("Type", "Microsoft.Compute/virtualMachines".to_string()),
                ("Provider", "Microsoft.Compute".to_string()),
                ("Resources", "4".to_string()),
            ]
        );
    }

    #[test]
    fn test_vault_item_handlers() {
        let registry = HandlerRegistry::with_builtin();
        assert_eq!(registry.get(ResourceKind::Secret).display_name(), "Secrets");
        assert_eq!(registry.get(ResourceKind::Key).display_name(), "Keys");
        assert_eq!(registry.get(ResourceKind::Certificate).display_name(), "Certificates");

        let mut key = resource("signing", ResourceKind::Key, ResourceStatus::Enabled);
        key.properties = json!({"enabled": true, "kty": "RSA", "updated": "2024-05-01 10:00 UTC"})
            .as_object()
            .cloned()
            .unwrap();
        assert_eq!(
            registry.get(key.kind).detail_fields(&key),
            vec![
                ("Enabled", "true".to_string()),
                ("Key type", "RSA".to_string()),
                ("Updated", "2024-05-01 10:00 UTC".to_string()),
            ]
        );
    }

    #[test]
    fn test_blob_container_fields() {
        let mut container = resource("logs", ResourceKind::BlobContainer, ResourceStatus::Unknown);
        container.properties = json!({"publicAccess": "None", "leaseState": "Available"})
            .as_object()
            .cloned()
            .unwrap();
        let registry = HandlerRegistry::with_builtin();
        assert_eq!(
            registry.get(container.kind).detail_fields(&container),
            vec![
                ("Public access", "None".to_string()),
                ("Lease", "Available".to_string()),
            ]
        );
    }
}
