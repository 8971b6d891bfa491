//! ALTR protection-service client
//!
//! All calls use HTTP Basic auth built from the API key name and password.

use base64::Engine;
use serde::Deserialize;
use tagsync_core::{GovernanceRequest, TargetDatabase};

use crate::adapter::{ApiError, GovernanceOutcome, ProtectionTarget};
use crate::http::{ensure_success, is_conflict, HttpClient};

/// Warehouse databases registered through this client are of this type
const SNOWFLAKE_DATABASE_TYPE: &str = "snowflake_external_functions";

/// How a new warehouse database is registered
#[derive(Clone, PartialEq, Eq)]
pub enum DatabaseRegistration {
    /// Direct registration with the service user's credentials
    Credentials {
        hostname: String,
        username: String,
        password: String,
        role: Option<String>,
        warehouse: Option<String>,
    },

    /// Registration through an existing partner-connect account
    PartnerConnect { account_id: i64 },
}

impl std::fmt::Debug for DatabaseRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Credentials { hostname, username, role, warehouse, .. } => f
                .debug_struct("Credentials")
                .field("hostname", hostname)
                .field("username", username)
                .field("password", &"<redacted>")
                .field("role", role)
                .field("warehouse", warehouse)
                .finish(),
            Self::PartnerConnect { account_id } => f
                .debug_struct("PartnerConnect")
                .field("account_id", account_id)
                .finish(),
        }
    }
}

impl DatabaseRegistration {
    /// Endpoint path used to register a database
    fn path(&self) -> &'static str {
        match self {
            Self::Credentials { .. } => "/api/databases/",
            Self::PartnerConnect { .. } => "/api/databases/snowflake/connect",
        }
    }

    /// Request body for registering `name`
    fn body(&self, name: &str) -> serde_json::Value {
        match self {
            Self::Credentials { hostname, username, password, role, warehouse } => serde_json::json!({
                "friendlyDatabaseName": name.to_uppercase(),
                "databasePort": 443,
                "maxNumberOfConnections": "5",
                "maxNumberOfBatches": "15",
                "databaseName": name,
                "databasePassword": password,
                "databaseType": SNOWFLAKE_DATABASE_TYPE,
                "hostname": hostname,
                "databaseUsername": username,
                "snowflakeRole": role,
                "warehouseName": warehouse,
                "shouldClassify": false,
                "dataUsageHistory": false,
                "classificationType": "3",
            }),
            Self::PartnerConnect { account_id } => serde_json::json!({
                "friendlyDatabaseName": name.to_uppercase(),
                "databaseName": name,
                "accountId": account_id,
                "shouldClassify": false,
                "dataUsageHistory": false,
                "classificationType": "3",
            }),
        }
    }
}

/// Database record as returned by the service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AltrDatabase {
    id: i64,
    database_name: String,
    #[serde(default)]
    friendly_database_name: Option<String>,
}

impl From<AltrDatabase> for TargetDatabase {
    fn from(db: AltrDatabase) -> Self {
        Self {
            id: db.id,
            name: db.database_name,
            friendly_name: db.friendly_database_name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct DatabaseList {
    #[serde(default)]
    databases: Vec<AltrDatabase>,
}

/// Body sent when asking the service to re-import tags for a database
fn update_body() -> serde_json::Value {
    serde_json::json!({
        "shouldClassify": true,
        "dataUsageHistory": true,
        "classificationType": "3",
    })
}

/// `Basic base64(name:password)`
pub fn basic_auth(key_name: &str, key_password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD
        .encode(format!("{}:{}", key_name, key_password));
    format!("Basic {}", encoded)
}

/// ALTR REST client
#[derive(Clone)]
pub struct AltrClient {
    http: HttpClient,
    base_url: String,
    authorization: String,
    database_type: String,
    registration: DatabaseRegistration,
}

impl AltrClient {
    pub fn new(
        http: HttpClient,
        domain: &str,
        key_name: &str,
        key_password: &str,
        registration: DatabaseRegistration,
    ) -> Self {
        Self {
            http,
            base_url: format!("https://{}", domain.trim_end_matches('/')),
            authorization: basic_auth(key_name, key_password),
            database_type: SNOWFLAKE_DATABASE_TYPE.to_string(),
            registration,
        }
    }

    /// Build from the `[protection]`, `[warehouse]` and `[governance]` settings
    pub fn from_config(http: HttpClient, config: &tagsync_core::Config) -> Result<Self, ApiError> {
        let registration = match config.governance.registration {
            tagsync_core::Registration::Credentials => DatabaseRegistration::Credentials {
                hostname: config.warehouse.hostname.clone(),
                username: config.warehouse.username.clone(),
                password: config.credentials.warehouse_password.clone(),
                role: config.warehouse.role.clone(),
                warehouse: config.warehouse.warehouse.clone(),
            },
            tagsync_core::Registration::PartnerConnect => {
                let account_id = config.governance.partner_account_id.ok_or_else(|| {
                    ApiError::ConfigError(
                        "partner-connect registration needs ALTR_PC_ACCOUNT_ID".to_string(),
                    )
                })?;
                DatabaseRegistration::PartnerConnect { account_id }
            }
        };

        Ok(Self::new(
            http,
            &config.protection.domain,
            &config.credentials.altr_key_name,
            &config.credentials.altr_key_password,
            registration,
        )
        .with_database_type(config.protection.database_type.clone()))
    }

    pub fn with_database_type(mut self, database_type: impl Into<String>) -> Self {
        self.database_type = database_type.into();
        self
    }

    /// Override the base URL (scheme included)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn registration(&self) -> &DatabaseRegistration {
        &self.registration
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl ProtectionTarget for AltrClient {
    fn name(&self) -> &'static str {
        "ALTR"
    }

    async fn check_access(&self) -> Result<(), ApiError> {
        let url = self.url("/api/administrators");
        self.http
            .send_ok("GET altr administrators", |client| {
                client
                    .get(&url)
                    .header("Authorization", &self.authorization)
                    .header("Content-Type", "application/json")
            })
            .await?;
        Ok(())
    }

    async fn fetch_target_databases(&self) -> Result<Vec<TargetDatabase>, ApiError> {
        let url = self.url("/api/databases");
        let envelope: Envelope<DatabaseList> = self
            .http
            .get_json("GET altr databases", |client| {
                client
                    .get(&url)
                    .header("Authorization", &self.authorization)
                    .header("Content-Type", "application/json")
                    .query(&[("databaseType", self.database_type.as_str())])
            })
            .await?;

        Ok(envelope.data.databases.into_iter().map(TargetDatabase::from).collect())
    }

    async fn create_target_database(&self, name: &str) -> Result<TargetDatabase, ApiError> {
        let url = self.url(self.registration.path());
        let body = self.registration.body(name);

        let envelope: Envelope<AltrDatabase> = self
            .http
            .get_json("POST altr database", |client| {
                client
                    .post(&url)
                    .header("Authorization", &self.authorization)
                    .json(&body)
            })
            .await?;

        tracing::debug!(database = name, id = envelope.data.id, "Registration accepted");
        Ok(envelope.data.into())
    }

    async fn submit_governance_request(
        &self,
        request: &GovernanceRequest,
    ) -> Result<GovernanceOutcome, ApiError> {
        let url = self.url("/api/data");
        let response = self
            .http
            .send("POST altr data", |client| {
                client
                    .post(&url)
                    .header("Authorization", &self.authorization)
                    .json(request)
            })
            .await?;

        if is_conflict(response.status()) {
            tracing::debug!(
                table = %request.table_name,
                column = %request.column_name,
                "Column already governed"
            );
            return Ok(GovernanceOutcome::Conflict);
        }

        ensure_success("POST altr data", response).await?;
        tracing::info!(
            table = %request.table_name,
            column = %request.column_name,
            "Governed column"
        );
        Ok(GovernanceOutcome::Created)
    }

    async fn update_target_database(&self, database: &TargetDatabase) -> Result<(), ApiError> {
        let url = self.url(&format!("/api/databases/{}", database.id));
        let body = update_body();

        self.http
            .send_ok("PATCH altr database", |client| {
                client
                    .patch(&url)
                    .header("Authorization", &self.authorization)
                    .json(&body)
            })
            .await?;

        tracing::info!(database = %database.name, id = database.id, "Requested tag re-import");
        Ok(())
    }
}
