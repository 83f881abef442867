use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{KEY_VAULT_RESOURCE, MANAGEMENT_RESOURCE};
use super::client::{ActionRequest, Operation, OperationHandle, OperationStatus, ResourceClient};
use super::credential::{TokenCredential, UserInfo};
use super::error::ClientError;
use super::http::{self, HttpResponse};
use super::wire::{
    self, CertificateItemDocument, ContainerDocument, GenericResourceDocument, Page,
    ProviderDocument, ResourceGroupDocument, SubscriptionDocument, VaultDocument,
    VaultItemDocument,
};
use crate::config::ClientConfig;
use crate::model::{self, ActionKind, Resource, ResourceKind, ResourceStatus, Scope};

const SUBSCRIPTIONS_API: &str = "2022-12-01";
const RESOURCES_API: &str = "2021-04-01";
const COMPUTE_API: &str = "2024-07-01";
const WEB_API: &str = "2023-12-01";
const STORAGE_API: &str = "2023-05-01";
const KEY_VAULT_API: &str = "2023-07-01";
/// Version of the vault endpoint itself, used for certificates.
const VAULT_DATA_API: &str = "7.4";

const GROUP_RESOURCES_EXPAND: &str = "$expand=provisioningState,createdTime,changedTime";

/// Concurrent per-resource enrichment requests.
const ENRICH_CONCURRENCY: usize = 8;

type SubmissionKey = (String, ActionKind, Uuid);

/// [`ResourceClient`] backed by the Azure Resource Manager REST API.
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    max_retries: u32,
    credential: Arc<dyn TokenCredential>,
    /// One cell per submission. Only successful submissions fill their cell.
    submissions: Mutex<HashMap<SubmissionKey, Arc<OnceCell<Operation>>>>,
    api_versions: Mutex<HashMap<String, String>>,
}

impl ArmClient {
    pub fn new(config: &ClientConfig, credential: Arc<dyn TokenCredential>) -> color_eyre::Result<Self> {
        let http = http::build_client(Duration::from_secs(config.timeout_secs))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            credential,
            submissions: Mutex::new(HashMap::new()),
            api_versions: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str, api_version: &str) -> String {
        format!("{}{path}?api-version={api_version}", self.endpoint)
    }

    async fn send(&self, method: Method, url: &str) -> Result<HttpResponse, ClientError> {
        self.send_as(MANAGEMENT_RESOURCE, method, url).await
    }

    /// Send with a token for `resource` instead of the management plane.
    async fn send_as(
        &self,
        resource: &str,
        method: Method,
        url: &str,
    ) -> Result<HttpResponse, ClientError> {
        let token = self.credential.get_token(resource).await?;
        let request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token.token);
        http::execute_with_retry(request, method.as_str(), url, self.max_retries).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ClientError> {
        self.send(Method::GET, url).await?.json()
    }

    async fn list_paged<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, ClientError> {
        self.list_paged_as(MANAGEMENT_RESOURCE, url).await
    }

    /// Follow `nextLink` until the listing is exhausted.
    async fn list_paged_as<T: DeserializeOwned>(
        &self,
        resource: &str,
        url: String,
    ) -> Result<Vec<T>, ClientError> {
        let mut items = Vec::new();
        let mut next = Some(url);
        while let Some(url) = next {
            let page: Page<T> = self.send_as(resource, Method::GET, &url).await?.json()?;
            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }
        Ok(items)
    }

    async fn list_subscriptions(&self, now: DateTime<Utc>) -> Result<Vec<Resource>, ClientError> {
        let url = self.url("/subscriptions", SUBSCRIPTIONS_API);
        let docs: Vec<SubscriptionDocument> = self.list_paged(url).await?;
        Ok(docs.into_iter().map(|d| d.into_resource(now)).collect())
    }

    async fn list_resource_groups(
        &self,
        subscription_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Resource>, ClientError> {
        let url = self.url(
            &format!("/subscriptions/{subscription_id}/resourcegroups"),
            RESOURCES_API,
        );
        let docs: Vec<ResourceGroupDocument> = self.list_paged(url).await?;
        Ok(docs.into_iter().map(|d| d.into_resource(now)).collect())
    }

    fn group_resources_url(&self, subscription_id: &str, resource_group: &str) -> String {
        format!(
            "{}&{GROUP_RESOURCES_EXPAND}",
            self.url(
                &format!("/subscriptions/{subscription_id}/resourceGroups/{resource_group}/resources"),
                RESOURCES_API,
            )
        )
    }

    /// One row per resource type present in the group.
    async fn list_group_types(
        &self,
        subscription_id: &str,
        resource_group: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Resource>, ClientError> {
        let url = self.group_resources_url(subscription_id, resource_group);
        let docs: Vec<GenericResourceDocument> = self.list_paged(url).await?;
        let resources: Vec<Resource> = docs.into_iter().map(|d| d.into_resource(now)).collect();
        Ok(model::summarize_types(&resources, subscription_id, resource_group, now))
    }

    async fn list_typed_resources(
        &self,
        subscription_id: &str,
        resource_group: &str,
        type_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Resource>, ClientError> {
        let url = format!(
            "{}&$filter=resourceType eq '{type_name}'",
            self.group_resources_url(subscription_id, resource_group)
        );
        let docs: Vec<GenericResourceDocument> = self.list_paged(url).await?;
        let resources = docs.into_iter().map(|d| d.into_resource(now));

        Ok(stream::iter(resources)
            .map(|r| self.enrich(r))
            .buffered(ENRICH_CONCURRENCY)
            .collect::<Vec<_>>()
            .await)
    }

    async fn list_containers(
        &self,
        account_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Resource>, ClientError> {
        let url = self.url(
            &format!("{account_id}/blobServices/default/containers"),
            STORAGE_API,
        );
        let docs: Vec<ContainerDocument> = self.list_paged(url).await?;
        Ok(docs.into_iter().map(|d| d.into_resource(now)).collect())
    }

    /// Secrets, keys and certificates of a vault, each category as permitted.
    ///
    /// A category the caller may not list is left out with a warning. The
    /// listing fails only when every category fails, or on an auth error.
    async fn list_vault_items(
        &self,
        vault_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Resource>, ClientError> {
        let (secrets, keys, certificates) = tokio::join!(
            self.list_paged::<VaultItemDocument>(self.url(&format!("{vault_id}/secrets"), KEY_VAULT_API)),
            self.list_paged::<VaultItemDocument>(self.url(&format!("{vault_id}/keys"), KEY_VAULT_API)),
            self.list_certificates(vault_id, now),
        );
        let into_resources = |docs: Vec<VaultItemDocument>| -> Vec<Resource> {
            docs.into_iter().map(|d| d.into_resource(now)).collect()
        };
        let secrets = secrets.map(into_resources);
        let keys = keys.map(into_resources);

        let mut items = Vec::new();
        let mut first_error = None;
        for (category, result) in [("secrets", secrets), ("keys", keys), ("certificates", certificates)] {
            match result {
                Ok(resources) => items.extend(resources),
                Err(e) if e.is_auth() => return Err(e),
                Err(e) => {
                    warn!(vault = %vault_id, category, error = %e, "Vault items not listed");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) if items.is_empty() => Err(e),
            _ => Ok(items),
        }
    }

    /// Certificates are only listed by the vault endpoint itself.
    async fn list_certificates(
        &self,
        vault_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Resource>, ClientError> {
        let vault: VaultDocument = self.get_json(&self.url(vault_id, KEY_VAULT_API)).await?;
        let Some(vault_uri) = vault.properties.vault_uri else {
            return Err(ClientError::rejected("NoVaultUri", "vault has no endpoint"));
        };
        let url = format!(
            "{}/certificates?api-version={VAULT_DATA_API}",
            vault_uri.trim_end_matches('/')
        );
        let docs: Vec<CertificateItemDocument> = self
            .list_paged_as(KEY_VAULT_RESOURCE, url)
            .await
            .map_err(|e| match e {
                // The vault refusing a token is a permission matter, not a failed sign-in.
                ClientError::Auth(message) => ClientError::rejected("VaultAccessDenied", message),
                e => e,
            })?;
        Ok(docs
            .into_iter()
            .map(|d| d.into_resource(vault_id, now))
            .collect())
    }

    /// Fetch runtime state for kinds whose listing omits it.
    async fn enrich(&self, mut resource: Resource) -> Resource {
        let (suffix, api) = match resource.kind {
            ResourceKind::VirtualMachine => ("&$expand=instanceView", COMPUTE_API),
            ResourceKind::WebApp => ("", WEB_API),
            _ => return resource,
        };
        let url = format!("{}{suffix}", self.url(&resource.id, api));

        match self.get_json::<Value>(&url).await {
            Ok(doc) => {
                let Some(Value::Object(properties)) = doc.get("properties").cloned() else {
                    return resource;
                };
                resource.status = match resource.kind {
                    ResourceKind::VirtualMachine => properties
                        .get("instanceView")
                        .map_or(ResourceStatus::Unknown, wire::vm_power_status),
                    _ => wire::web_app_status(properties.get("state").and_then(Value::as_str)),
                };
                for (key, value) in properties {
                    resource.properties.entry(key).or_insert(value);
                }
            }
            Err(e) => {
                warn!(resource = %resource.id, error = %e, "Failed to fetch resource state");
            }
        }
        resource
    }

    async fn api_version_for(&self, request: &ActionRequest) -> Result<String, ClientError> {
        match request.kind {
            ResourceKind::ResourceGroup => return Ok(RESOURCES_API.to_string()),
            ResourceKind::VirtualMachine => return Ok(COMPUTE_API.to_string()),
            ResourceKind::WebApp => return Ok(WEB_API.to_string()),
            ResourceKind::StorageAccount => return Ok(STORAGE_API.to_string()),
            ResourceKind::KeyVault => return Ok(KEY_VAULT_API.to_string()),
            ResourceKind::Subscription => {
                return Err(ClientError::rejected(
                    "UnsupportedAction",
                    "subscriptions cannot be deleted from azct",
                ));
            }
            ResourceKind::ResourceType
            | ResourceKind::BlobContainer
            | ResourceKind::Secret
            | ResourceKind::Key
            | ResourceKind::Certificate => {
                return Err(ClientError::rejected(
                    "UnsupportedAction",
                    format!("{:?} rows are read-only in azct", request.kind),
                ));
            }
            ResourceKind::Other => {}
        }

        let (subscription, namespace, resource_type) = provider_type(&request.resource_id)
            .ok_or_else(|| {
                ClientError::rejected("InvalidResourceId", format!("cannot parse {}", request.resource_id))
            })?;
        let cache_key = format!("{namespace}/{resource_type}").to_ascii_lowercase();

        if let Ok(versions) = self.api_versions.lock()
            && let Some(version) = versions.get(&cache_key)
        {
            return Ok(version.clone());
        }

        let url = self.url(
            &format!("/subscriptions/{subscription}/providers/{namespace}"),
            RESOURCES_API,
        );
        let provider: ProviderDocument = self.get_json(&url).await?;
        let version = provider
            .resource_types
            .iter()
            .find(|rt| rt.resource_type.eq_ignore_ascii_case(&resource_type))
            .and_then(|rt| rt.preferred_api_version())
            .map(str::to_string)
            .ok_or_else(|| {
                ClientError::rejected(
                    "NoApiVersion",
                    format!("no API version registered for {namespace}/{resource_type}"),
                )
            })?;

        debug!(resource_type = %cache_key, %version, "Resolved API version");
        if let Ok(mut versions) = self.api_versions.lock() {
            versions.insert(cache_key, version.clone());
        }
        Ok(version)
    }

    async fn action_target(&self, request: &ActionRequest) -> Result<(Method, String), ClientError> {
        let id = &request.resource_id;
        if request.action == ActionKind::Delete {
            let version = self.api_version_for(request).await?;
            return Ok((Method::DELETE, self.url(id, &version)));
        }

        let (verb, api) = match (request.kind, request.action) {
            (ResourceKind::VirtualMachine, ActionKind::Start) => ("start", COMPUTE_API),
            (ResourceKind::VirtualMachine, ActionKind::Stop) => ("deallocate", COMPUTE_API),
            (ResourceKind::VirtualMachine, ActionKind::Restart) => ("restart", COMPUTE_API),
            (ResourceKind::WebApp, ActionKind::Start) => ("start", WEB_API),
            (ResourceKind::WebApp, ActionKind::Stop) => ("stop", WEB_API),
            (ResourceKind::WebApp, ActionKind::Restart) => ("restart", WEB_API),
            (kind, action) => {
                return Err(ClientError::rejected(
                    "UnsupportedAction",
                    format!("{action} is not supported for {kind:?}"),
                ));
            }
        };
        Ok((Method::POST, self.url(&format!("{id}/{verb}"), api)))
    }

    async fn submit(&self, request: &ActionRequest) -> Result<Operation, ClientError> {
        let (method, url) = self.action_target(request).await?;
        let response = self.send(method, &url).await?;

        let operation = if response.status == StatusCode::ACCEPTED
            || response.status == StatusCode::CREATED
        {
            if let Some(url) = response.header("azure-asyncoperation") {
                Operation::Pending(OperationHandle::AsyncOperation(url.to_string()))
            } else if let Some(url) = response.header("location") {
                Operation::Pending(OperationHandle::Location(url.to_string()))
            } else {
                Operation::Completed
            }
        } else {
            Operation::Completed
        };

        info!(
            resource = %request.resource_id,
            action = %request.action,
            nonce = %request.nonce,
            pending = matches!(operation, Operation::Pending(_)),
            "Action submitted"
        );
        Ok(operation)
    }
}

/// `(subscription, namespace, type path)` of a provider resource id.
fn provider_type(id: &str) -> Option<(String, String, String)> {
    let parts: Vec<&str> = id.split('/').filter(|p| !p.is_empty()).collect();
    let subscription = parts
        .iter()
        .position(|p| p.eq_ignore_ascii_case("subscriptions"))
        .and_then(|i| parts.get(i + 1))?;
    let providers = parts
        .iter()
        .rposition(|p| p.eq_ignore_ascii_case("providers"))?;
    let namespace = parts.get(providers + 1)?;
    // type/name pairs follow the namespace: type1/name1/type2/name2...
    let types: Vec<&str> = parts[providers + 2..].iter().step_by(2).copied().collect();
    if types.is_empty() {
        return None;
    }
    Some((subscription.to_string(), namespace.to_string(), types.join("/")))
}

#[async_trait]
impl ResourceClient for ArmClient {
    async fn list_resources(&self, scope: &Scope) -> Result<Vec<Resource>, ClientError> {
        let now = Utc::now();
        let result = match scope {
            Scope::Subscriptions => self.list_subscriptions(now).await,
            Scope::Subscription { subscription_id } => {
                self.list_resource_groups(subscription_id, now).await
            }
            Scope::ResourceGroup {
                subscription_id,
                resource_group,
            } => {
                self.list_group_types(subscription_id, resource_group, now)
                    .await
            }
            Scope::ResourceType {
                subscription_id,
                resource_group,
                type_name,
            } => {
                self.list_typed_resources(subscription_id, resource_group, type_name, now)
                    .await
            }
            Scope::Containers { account_id } => self.list_containers(account_id, now).await,
            Scope::Vault { vault_id } => self.list_vault_items(vault_id, now).await,
        };

        match &result {
            Ok(resources) => debug!(%scope, count = resources.len(), "Listed resources"),
            Err(e) if e.is_expected() => warn!(%scope, error = %e, "Listing refused"),
            Err(e) => error!(%scope, error = %e, "Listing failed"),
        }
        result
    }

    async fn perform_action(&self, request: &ActionRequest) -> Result<Operation, ClientError> {
        let key = (request.resource_id.clone(), request.action, request.nonce);
        // The map lock is released before any request; only callers sharing
        // the same nonce wait on each other.
        let cell = self
            .submissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone();

        if let Some(operation) = cell.get() {
            debug!(resource = %request.resource_id, action = %request.action, nonce = %request.nonce, "Duplicate submission ignored");
            return Ok(operation.clone());
        }
        cell.get_or_try_init(|| self.submit(request))
            .await
            .cloned()
    }

    async fn poll_action(&self, handle: &OperationHandle) -> Result<OperationStatus, ClientError> {
        let response = self.send(Method::GET, handle.url()).await?;
        match handle {
            OperationHandle::AsyncOperation(_) => Ok(wire::operation_status(response.json()?)),
            OperationHandle::Location(_) => Ok(if response.status == StatusCode::ACCEPTED {
                OperationStatus::InProgress
            } else {
                OperationStatus::Succeeded
            }),
        }
    }

    async fn user_info(&self) -> Result<UserInfo, ClientError> {
        let token = self.credential.get_token(MANAGEMENT_RESOURCE).await?;
        UserInfo::from_token(&token.token)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::super::credential::tests::{StaticCredential, jwt};
    use super::*;

    fn client(server: &MockServer) -> ArmClient {
        let config = ClientConfig {
            endpoint: server.base_url(),
            timeout_secs: 5,
            max_retries: 1,
        };
        let token = jwt(&json!({"name": "Ada", "tid": "tenant-1"}));
        ArmClient::new(&config, Arc::new(StaticCredential::new(token))).unwrap()
    }

    fn request(resource_id: &str, kind: ResourceKind, action: ActionKind) -> ActionRequest {
        ActionRequest {
            resource_id: resource_id.to_string(),
            kind,
            action,
            nonce: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_provider_type() {
        assert_eq!(
            provider_type("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/vnet"),
            Some(("s".into(), "Microsoft.Network".into(), "virtualNetworks".into()))
        );
        assert_eq!(
            provider_type("/subscriptions/s/resourceGroups/rg/providers/Microsoft.Sql/servers/db1/databases/d"),
            Some(("s".into(), "Microsoft.Sql".into(), "servers/databases".into()))
        );
        assert_eq!(provider_type("/subscriptions/s/resourceGroups/rg"), None);
    }

    #[tokio::test]
    async fn test_list_subscriptions_follows_next_link() {
        let server = MockServer::start_async().await;
        let second_page = server.url("/page2");
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/subscriptions")
                    .query_param("api-version", SUBSCRIPTIONS_API)
                    .header_exists("authorization");
                then.status(200).json_body(json!({
                    "value": [{"id": "/subscriptions/s1", "subscriptionId": "s1", "displayName": "Dev", "state": "Enabled"}],
                    "nextLink": second_page
                }));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET).path("/page2");
                then.status(200).json_body(json!({
                    "value": [{"id": "/subscriptions/s2", "subscriptionId": "s2", "displayName": "Prod", "state": "Disabled"}]
                }));
            })
            .await;

        let resources = client(&server)
            .list_resources(&Scope::Subscriptions)
            .await
            .unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let names: Vec<_> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Dev", "Prod"]);
        assert_eq!(resources[0].status, ResourceStatus::Running);
        assert_eq!(resources[1].status, ResourceStatus::Stopped);
    }

    #[tokio::test]
    async fn test_resource_group_lists_type_summaries() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/subscriptions/s1/resourceGroups/rg1/resources")
                    .query_param("$expand", "provisioningState,createdTime,changedTime");
                then.status(200).json_body(json!({"value": [
                    {"id": "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm1",
                     "name": "vm1", "type": "Microsoft.Compute/virtualMachines"},
                    {"id": "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm2",
                     "name": "vm2", "type": "Microsoft.Compute/virtualMachines"},
                    {"id": "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/st1",
                     "name": "st1", "type": "Microsoft.Storage/storageAccounts"}
                ]}));
            })
            .await;

        let types = client(&server)
            .list_resources(&Scope::resource_group("s1", "rg1"))
            .await
            .unwrap();

        let rows: Vec<_> = types
            .iter()
            .map(|r| (r.name.as_str(), r.property("count")))
            .collect();
        assert_eq!(
            rows,
            [
                ("storageAccounts", Some("1".to_string())),
                ("virtualMachines", Some("2".to_string())),
            ]
        );
        assert!(types.iter().all(|r| r.kind == ResourceKind::ResourceType));
        assert_eq!(
            types[1].child_scope(),
            Some(Scope::resource_type("s1", "rg1", "Microsoft.Compute/virtualMachines"))
        );
    }

    #[tokio::test]
    async fn test_resource_type_listing_filters_and_enriches_vm_status() {
        let server = MockServer::start_async().await;
        let vm_id = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm1";
        let listing = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/subscriptions/s1/resourceGroups/rg1/resources")
                    .query_param("$filter", "resourceType eq 'Microsoft.Compute/virtualMachines'");
                then.status(200).json_body(json!({"value": [
                    {"id": vm_id, "name": "vm1", "type": "Microsoft.Compute/virtualMachines", "location": "westeurope"}
                ]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(vm_id)
                    .query_param("$expand", "instanceView");
                then.status(200).json_body(json!({
                    "properties": {
                        "hardwareProfile": {"vmSize": "Standard_B2s"},
                        "instanceView": {"statuses": [{"code": "PowerState/running"}]}
                    }
                }));
            })
            .await;

        let resources = client(&server)
            .list_resources(&Scope::resource_type(
                "s1",
                "rg1",
                "Microsoft.Compute/virtualMachines",
            ))
            .await
            .unwrap();

        listing.assert_async().await;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].status, ResourceStatus::Running);
        assert_eq!(resources[0].properties["hardwareProfile"]["vmSize"], json!("Standard_B2s"));
    }

    #[tokio::test]
    async fn test_storage_account_lists_blob_containers() {
        let server = MockServer::start_async().await;
        let account = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/st1";
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("{account}/blobServices/default/containers"))
                    .query_param("api-version", STORAGE_API);
                then.status(200).json_body(json!({"value": [
                    {"id": format!("{account}/blobServices/default/containers/logs"), "name": "logs",
                     "type": "Microsoft.Storage/storageAccounts/blobServices/containers",
                     "properties": {"publicAccess": "None", "leaseState": "Available"}}
                ]}));
            })
            .await;

        let containers = client(&server)
            .list_resources(&Scope::Containers {
                account_id: account.to_string(),
            })
            .await
            .unwrap();

        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "logs");
        assert_eq!(containers[0].kind, ResourceKind::BlobContainer);
        assert_eq!(containers[0].resource_group.as_deref(), Some("rg1"));
    }

    #[tokio::test]
    async fn test_vault_lists_secrets_keys_and_certificates() {
        let server = MockServer::start_async().await;
        let vault = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.KeyVault/vaults/kv1";
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{vault}/secrets"));
                then.status(200).json_body(json!({"value": [
                    {"id": format!("{vault}/secrets/db-password"), "name": "db-password",
                     "type": "Microsoft.KeyVault/vaults/secrets",
                     "properties": {"attributes": {"enabled": true}}}
                ]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{vault}/keys"));
                then.status(200).json_body(json!({"value": [
                    {"id": format!("{vault}/keys/signing"), "name": "signing",
                     "type": "Microsoft.KeyVault/vaults/keys",
                     "properties": {"attributes": {"enabled": false}, "kty": "RSA"}}
                ]}));
            })
            .await;
        let vault_uri = server.url("/");
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(vault)
                    .query_param("api-version", KEY_VAULT_API);
                then.status(200)
                    .json_body(json!({"properties": {"vaultUri": vault_uri}}));
            })
            .await;
        let certificates = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/certificates")
                    .query_param("api-version", VAULT_DATA_API);
                then.status(200).json_body(json!({"value": [
                    {"id": "https://kv1.vault.azure.net/certificates/site-tls", "attributes": {"enabled": true}}
                ]}));
            })
            .await;

        let items = client(&server)
            .list_resources(&Scope::Vault {
                vault_id: vault.to_string(),
            })
            .await
            .unwrap();

        certificates.assert_async().await;
        let rows: Vec<_> = items.iter().map(|r| (r.name.as_str(), r.kind, r.status)).collect();
        assert_eq!(
            rows,
            [
                ("db-password", ResourceKind::Secret, ResourceStatus::Enabled),
                ("signing", ResourceKind::Key, ResourceStatus::Disabled),
                ("site-tls", ResourceKind::Certificate, ResourceStatus::Enabled),
            ]
        );
    }

    #[tokio::test]
    async fn test_vault_omits_forbidden_categories() {
        let server = MockServer::start_async().await;
        let vault = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.KeyVault/vaults/kv1";
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{vault}/secrets"));
                then.status(200).json_body(json!({"value": [
                    {"id": format!("{vault}/secrets/api-key"), "name": "api-key",
                     "type": "Microsoft.KeyVault/vaults/secrets"}
                ]}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("{vault}/keys"));
                then.status(403).json_body(json!({
                    "error": {"code": "AuthorizationFailed", "message": "not permitted"}
                }));
            })
            .await;
        let vault_uri = server.url("/");
        server
            .mock_async(|when, then| {
                when.method(GET).path(vault);
                then.status(200)
                    .json_body(json!({"properties": {"vaultUri": vault_uri}}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/certificates");
                then.status(401).json_body(json!({
                    "error": {"code": "Unauthorized", "message": "AKV10022: Invalid audience."}
                }));
            })
            .await;

        let items = client(&server)
            .list_resources(&Scope::Vault {
                vault_id: vault.to_string(),
            })
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "api-key");
        assert_eq!(items[0].status, ResourceStatus::Unknown);
    }

    #[tokio::test]
    async fn test_vault_listing_fails_when_nothing_is_permitted() {
        let server = MockServer::start_async().await;
        let vault = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.KeyVault/vaults/kv1";
        server
            .mock_async(|when, then| {
                when.method(GET).path_includes(vault);
                then.status(403).json_body(json!({
                    "error": {"code": "AuthorizationFailed", "message": "not permitted"}
                }));
            })
            .await;

        let err = client(&server)
            .list_resources(&Scope::Vault {
                vault_id: vault.to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_unauthorized_is_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions");
                then.status(401).json_body(json!({
                    "error": {"code": "ExpiredAuthenticationToken", "message": "The access token expiry has passed."}
                }));
            })
            .await;

        let err = client(&server)
            .list_resources(&Scope::Subscriptions)
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Auth("The access token expiry has passed.".into()));
    }

    #[tokio::test]
    async fn test_missing_resource_group_is_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions/s1/resourceGroups/gone/resources");
                then.status(404).json_body(json!({
                    "error": {"code": "ResourceGroupNotFound", "message": "Resource group 'gone' could not be found."}
                }));
            })
            .await;

        let err = client(&server)
            .list_resources(&Scope::resource_group("s1", "gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_server_errors_are_transient_after_retries() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions/s1/resourcegroups");
                then.status(503).body("unavailable");
            })
            .await;

        let err = client(&server)
            .list_resources(&Scope::subscription("s1"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_vm_stop_deallocates_and_is_idempotent_per_nonce() {
        let server = MockServer::start_async().await;
        let vm_id = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm1";
        let status_url = server.url("/operations/op1");
        let deallocate = server
            .mock_async(|when, then| {
                when.method(POST).path(format!("{vm_id}/deallocate"));
                then.status(202).header("Azure-AsyncOperation", status_url.as_str());
            })
            .await;

        let client = client(&server);
        let req = request(vm_id, ResourceKind::VirtualMachine, ActionKind::Stop);
        let first = client.perform_action(&req).await.unwrap();
        let second = client.perform_action(&req).await.unwrap();

        deallocate.assert_async().await;
        assert_eq!(first, second);
        assert_eq!(
            first,
            Operation::Pending(OperationHandle::AsyncOperation(status_url))
        );
    }

    #[tokio::test]
    async fn test_slow_submission_does_not_hold_up_others() {
        let server = MockServer::start_async().await;
        let slow = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/slow";
        let fast = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/fast";
        server
            .mock_async(|when, then| {
                when.method(POST).path(format!("{slow}/restart"));
                then.status(200).delay(Duration::from_secs(3));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(format!("{fast}/restart"));
                then.status(200);
            })
            .await;

        let client = client(&server);
        let slow_request = request(slow, ResourceKind::VirtualMachine, ActionKind::Restart);
        let fast_request = request(fast, ResourceKind::VirtualMachine, ActionKind::Restart);
        let (slow_result, fast_result) = tokio::join!(
            client.perform_action(&slow_request),
            tokio::time::timeout(
                Duration::from_secs(2),
                client.perform_action(&fast_request)
            ),
        );

        let fast_result = fast_result.expect("fast submission waited for the slow one");
        assert_eq!(fast_result.unwrap(), Operation::Completed);
        assert_eq!(slow_result.unwrap(), Operation::Completed);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_submission_sends_once() {
        let server = MockServer::start_async().await;
        let vm_id = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm1";
        let start = server
            .mock_async(|when, then| {
                when.method(POST).path(format!("{vm_id}/start"));
                then.status(200).delay(Duration::from_millis(200));
            })
            .await;

        let client = client(&server);
        let req = request(vm_id, ResourceKind::VirtualMachine, ActionKind::Start);
        let (first, second) = tokio::join!(client.perform_action(&req), client.perform_action(&req));

        start.assert_async().await;
        assert_eq!(first.unwrap(), Operation::Completed);
        assert_eq!(second.unwrap(), Operation::Completed);
    }

    #[tokio::test]
    async fn test_failed_submission_can_be_retried_with_same_nonce() {
        let server = MockServer::start_async().await;
        let vm_id = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Compute/virtualMachines/vm1";
        let conflict = server
            .mock_async(|when, then| {
                when.method(POST).path(format!("{vm_id}/start"));
                then.status(409).json_body(json!({
                    "error": {"code": "Conflict", "message": "operation in progress"}
                }));
            })
            .await;

        let client = client(&server);
        let req = request(vm_id, ResourceKind::VirtualMachine, ActionKind::Start);
        assert!(client.perform_action(&req).await.is_err());

        conflict.delete_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(format!("{vm_id}/start"));
                then.status(200);
            })
            .await;
        assert_eq!(client.perform_action(&req).await.unwrap(), Operation::Completed);
    }

    #[tokio::test]
    async fn test_poll_async_operation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/operations/op1");
                then.status(200).json_body(json!({"status": "Succeeded"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/operations/op2");
                then.status(202);
            })
            .await;

        let client = client(&server);
        let done = client
            .poll_action(&OperationHandle::AsyncOperation(server.url("/operations/op1")))
            .await
            .unwrap();
        let running = client
            .poll_action(&OperationHandle::Location(server.url("/operations/op2")))
            .await
            .unwrap();

        assert_eq!(done, OperationStatus::Succeeded);
        assert_eq!(running, OperationStatus::InProgress);
    }

    #[tokio::test]
    async fn test_delete_resolves_api_version_from_provider() {
        let server = MockServer::start_async().await;
        let vnet = "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Network/virtualNetworks/vnet1";
        let provider = server
            .mock_async(|when, then| {
                when.method(GET).path("/subscriptions/s1/providers/Microsoft.Network");
                then.status(200).json_body(json!({"resourceTypes": [
                    {"resourceType": "virtualNetworks", "apiVersions": ["2024-06-01-preview", "2024-05-01"]}
                ]}));
            })
            .await;
        let delete = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path(vnet)
                    .query_param("api-version", "2024-05-01");
                then.status(200);
            })
            .await;

        let operation = client(&server)
            .perform_action(&request(vnet, ResourceKind::Other, ActionKind::Delete))
            .await
            .unwrap();

        provider.assert_async().await;
        delete.assert_async().await;
        assert_eq!(operation, Operation::Completed);
    }

    #[tokio::test]
    async fn test_read_only_rows_reject_delete() {
        let server = MockServer::start_async().await;
        let err = client(&server)
            .perform_action(&request(
                "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.KeyVault/vaults/kv1/secrets/s",
                ResourceKind::Secret,
                ActionKind::Delete,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_unsupported_action_is_rejected_without_request() {
        let server = MockServer::start_async().await;
        let err = client(&server)
            .perform_action(&request(
                "/subscriptions/s1/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/st1",
                ResourceKind::StorageAccount,
                ActionKind::Restart,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_user_info_from_token() {
        let server = MockServer::start_async().await;
        let info = client(&server).user_info().await.unwrap();
        assert_eq!(info.display_name(), "Ada");
        assert_eq!(info.tenant_id.as_deref(), Some("tenant-1"));
    }
}
