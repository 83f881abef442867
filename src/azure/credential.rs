//! Access tokens for the management plane.
//!
//! Tokens come from a chain of sources tried in order: an explicit
//! `AZURE_ACCESS_TOKEN` environment variable, a service principal secret
//! (`AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`), then the
//! Azure CLI. The first token obtained for a resource is cached until
//! shortly before it expires.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::ClientError;

/// Tokens closer to expiry than this are refreshed.
const EXPIRY_MARGIN_MINUTES: i64 = 5;
const ENV_TOKEN_VAR: &str = "AZURE_ACCESS_TOKEN";
const TENANT_ID_VAR: &str = "AZURE_TENANT_ID";
const CLIENT_ID_VAR: &str = "AZURE_CLIENT_ID";
const CLIENT_SECRET_VAR: &str = "AZURE_CLIENT_SECRET";
const AUTHORITY_HOST_VAR: &str = "AZURE_AUTHORITY_HOST";
const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_on - Duration::minutes(EXPIRY_MARGIN_MINUTES) > now
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_token(&self, resource: &str) -> Result<AccessToken, ClientError>;
}

/// Token supplied through the environment, e.g. from a CI pipeline.
pub struct EnvironmentCredential {
    variable: String,
}

impl EnvironmentCredential {
    pub fn new() -> Self {
        Self {
            variable: ENV_TOKEN_VAR.to_string(),
        }
    }
}

impl Default for EnvironmentCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn get_token(&self, _resource: &str) -> Result<AccessToken, ClientError> {
        let token = std::env::var(&self.variable)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ClientError::Auth(format!("{} is not set", self.variable)))?;

        let expires_on = decode_claims(&token)
            .ok()
            .and_then(|c| c.exp)
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
            .unwrap_or_else(|| Utc::now() + Duration::hours(1));

        Ok(AccessToken {
            token: token.trim().to_string(),
            expires_on,
        })
    }
}

/// Service principal secret exchanged at the Entra ID token endpoint.
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// `None` unless tenant, client id and secret are all set.
    pub fn from_env(http: reqwest::Client) -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let authority = var(AUTHORITY_HOST_VAR).unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());
        Some(Self::new(
            http,
            authority,
            var(TENANT_ID_VAR)?,
            var(CLIENT_ID_VAR)?,
            var(CLIENT_SECRET_VAR)?,
        ))
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "client-secret"
    }

    async fn get_token(&self, resource: &str) -> Result<AccessToken, ClientError> {
        let scope = format!("{}/.default", resource.trim_end_matches('/'));
        let response = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ClientError::transient(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::transient(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            // Entra appends trace and correlation ids on further lines.
            let reason = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .and_then(|r| r.lines().next().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(if status.is_server_error() {
                ClientError::transient(reason)
            } else {
                ClientError::Auth(reason)
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| ClientError::Auth(format!("unexpected token response: {e}")))?;
        let lifetime = parsed.expires_in.unwrap_or(3600);
        Ok(AccessToken {
            token: parsed.access_token,
            expires_on: Utc::now() + Duration::seconds(lifetime),
        })
    }
}

/// Token issued by `az account get-access-token`.
#[derive(Default)]
pub struct AzureCliCredential;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    expires_on: Option<String>,
    #[serde(rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

impl CliToken {
    fn expiry(&self) -> Option<DateTime<Utc>> {
        if let Some(epoch) = self.expires_on_epoch {
            return DateTime::from_timestamp(epoch, 0);
        }
        // Older CLI versions only report local time.
        let local = self.expires_on.as_deref()?;
        let naive = NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "azure-cli"
    }

    async fn get_token(&self, resource: &str) -> Result<AccessToken, ClientError> {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        let output = tokio::process::Command::new(program)
            .args(["account", "get-access-token", "--resource", resource, "-o", "json"])
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ClientError::Auth("Azure CLI (az) is not installed".to_string())
                } else {
                    ClientError::Auth(format!("failed to run Azure CLI: {e}"))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim().lines().last().unwrap_or("Azure CLI failed");
            return Err(ClientError::Auth(message.to_string()));
        }

        let parsed: CliToken = serde_json::from_slice(&output.stdout)
            .map_err(|e| ClientError::Auth(format!("unexpected Azure CLI output: {e}")))?;
        let expires_on = parsed
            .expiry()
            .unwrap_or_else(|| Utc::now() + Duration::minutes(30));

        Ok(AccessToken {
            token: parsed.access_token,
            expires_on,
        })
    }
}

/// Tries each source in order and caches the first token obtained per resource.
pub struct ChainedCredential {
    sources: Vec<Box<dyn TokenCredential>>,
    cached: Mutex<HashMap<String, AccessToken>>,
}

impl ChainedCredential {
    pub fn new(sources: Vec<Box<dyn TokenCredential>>) -> Self {
        Self {
            sources,
            cached: Mutex::new(HashMap::new()),
        }
    }

    /// Access token variable, then a service principal when one is
    /// configured, then the Azure CLI.
    pub fn default_chain(http: reqwest::Client) -> Self {
        let mut sources: Vec<Box<dyn TokenCredential>> = vec![Box::new(EnvironmentCredential::new())];
        if let Some(principal) = ClientSecretCredential::from_env(http) {
            sources.push(Box::new(principal));
        }
        sources.push(Box::new(AzureCliCredential));
        Self::new(sources)
    }
}

#[async_trait]
impl TokenCredential for ChainedCredential {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn get_token(&self, resource: &str) -> Result<AccessToken, ClientError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.get(resource)
            && token.is_fresh(Utc::now())
        {
            return Ok(token.clone());
        }

        let mut failures = Vec::new();
        for source in &self.sources {
            match source.get_token(resource).await {
                Ok(token) => {
                    info!(source = source.name(), resource, expires_on = %token.expires_on, "Acquired access token");
                    cached.insert(resource.to_string(), token.clone());
                    return Ok(token);
                }
                Err(e) => {
                    debug!(source = source.name(), error = %e, "Credential source unavailable");
                    failures.push(format!("{}: {e}", source.name()));
                }
            }
        }

        warn!(?failures, "No credential source produced a token");
        Err(ClientError::Auth(format!(
            "no usable Azure credentials ({}). Please run 'az login'",
            failures.join("; ")
        )))
    }
}

/// Signed-in identity, read from the access token's claims.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub tenant_id: Option<String>,
}

impl UserInfo {
    pub fn from_token(token: &str) -> Result<Self, ClientError> {
        let claims = decode_claims(token)?;
        Ok(Self {
            name: claims.name.or_else(|| claims.preferred_username.clone()),
            email: claims
                .upn
                .or(claims.email)
                .or(claims.preferred_username),
            tenant_id: claims.tid,
        })
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or("unknown user")
    }
}

#[derive(Debug, Default, Deserialize)]
struct Claims {
    name: Option<String>,
    preferred_username: Option<String>,
    upn: Option<String>,
    email: Option<String>,
    tid: Option<String>,
    exp: Option<i64>,
}

fn decode_claims(token: &str) -> Result<Claims, ClientError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ClientError::Auth("access token is not a JWT".to_string()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ClientError::Auth(format!("malformed token payload: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::Auth(format!("malformed token claims: {e}")))
}

#[cfg(test)]
pub mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    pub fn jwt(claims: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{header}.{payload}.sig")
    }

    /// Fixed token source for tests.
    pub struct StaticCredential {
        pub token: String,
        pub calls: Arc<AtomicUsize>,
    }

    impl StaticCredential {
        pub fn new(token: impl Into<String>) -> Self {
            Self {
                token: token.into(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl TokenCredential for StaticCredential {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn get_token(&self, _resource: &str) -> Result<AccessToken, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AccessToken {
                token: self.token.clone(),
                expires_on: Utc::now() + Duration::hours(1),
            })
        }
    }

    struct FailingCredential;

    #[async_trait]
    impl TokenCredential for FailingCredential {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn get_token(&self, _resource: &str) -> Result<AccessToken, ClientError> {
            Err(ClientError::Auth("not logged in".into()))
        }
    }

    #[test]
    fn test_user_info_claim_fallbacks() {
        let token = jwt(&serde_json::json!({
            "preferred_username": "ada@contoso.com",
            "tid": "tenant-1"
        }));
        let info = UserInfo::from_token(&token).unwrap();
        assert_eq!(info.name.as_deref(), Some("ada@contoso.com"));
        assert_eq!(info.email.as_deref(), Some("ada@contoso.com"));
        assert_eq!(info.tenant_id.as_deref(), Some("tenant-1"));

        let token = jwt(&serde_json::json!({
            "name": "Ada Lovelace",
            "upn": "ada@corp.example",
            "email": "ada@other.example"
        }));
        let info = UserInfo::from_token(&token).unwrap();
        assert_eq!(info.display_name(), "Ada Lovelace");
        assert_eq!(info.email.as_deref(), Some("ada@corp.example"));
    }

    #[test]
    fn test_malformed_token_is_auth_error() {
        assert!(UserInfo::from_token("not-a-jwt").unwrap_err().is_auth());
        assert!(UserInfo::from_token("a.%%%.c").unwrap_err().is_auth());
    }

    #[test]
    fn test_cli_token_expiry_prefers_epoch() {
        let parsed: CliToken = serde_json::from_str(
            r#"{"accessToken":"t","expiresOn":"2030-01-01 00:00:00.000000","expires_on":1700000000}"#,
        )
        .unwrap();
        assert_eq!(parsed.expiry(), DateTime::from_timestamp(1_700_000_000, 0));
    }

    #[tokio::test]
    async fn test_chain_falls_through_and_caches() {
        let source = StaticCredential::new("token");
        let calls = source.calls.clone();
        let chain = ChainedCredential::new(vec![Box::new(FailingCredential), Box::new(source)]);

        let first = chain.get_token("r").await.unwrap();
        let second = chain.get_token("r").await.unwrap();
        assert_eq!(first.token, "token");
        assert_eq!(second.token, "token");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chain_caches_per_resource() {
        let source = StaticCredential::new("token");
        let calls = source.calls.clone();
        let chain = ChainedCredential::new(vec![Box::new(source)]);

        chain.get_token("https://management.azure.com/").await.unwrap();
        chain.get_token("https://vault.azure.net").await.unwrap();
        chain.get_token("https://management.azure.com/").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_secret_exchanges_for_token() {
        let server = MockServer::start_async().await;
        let token_endpoint = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/tenant-1/oauth2/v2.0/token")
                    .form_urlencoded_tuple("grant_type", "client_credentials")
                    .form_urlencoded_tuple("client_id", "app-1")
                    .form_urlencoded_tuple("client_secret", "s3cret")
                    .form_urlencoded_tuple("scope", "https://management.azure.com/.default");
                then.status(200).json_body(json!({
                    "token_type": "Bearer",
                    "expires_in": 3599,
                    "access_token": "principal-token"
                }));
            })
            .await;

        let credential = ClientSecretCredential::new(
            reqwest::Client::new(),
            server.base_url(),
            "tenant-1",
            "app-1",
            "s3cret",
        );
        let token = credential
            .get_token("https://management.azure.com/")
            .await
            .unwrap();

        token_endpoint.assert_async().await;
        assert_eq!(token.token, "principal-token");
        assert!(token.is_fresh(Utc::now()));
    }

    #[tokio::test]
    async fn test_client_secret_rejection_is_auth_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/tenant-1/oauth2/v2.0/token");
                then.status(401).json_body(json!({
                    "error": "invalid_client",
                    "error_description": "AADSTS7000215: Invalid client secret provided.\r\nTrace ID: 1"
                }));
            })
            .await;

        let credential = ClientSecretCredential::new(
            reqwest::Client::new(),
            server.base_url(),
            "tenant-1",
            "app-1",
            "wrong",
        );
        let err = credential.get_token("https://management.azure.com/").await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Auth("AADSTS7000215: Invalid client secret provided.".into())
        );
    }

    #[tokio::test]
    async fn test_chain_exhausted_suggests_login() {
        let chain = ChainedCredential::new(vec![Box::new(FailingCredential)]);
        let err = chain.get_token("r").await.unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("az login"));
    }
}
