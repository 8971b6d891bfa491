//! Configuration schema (tagsync.toml)
//!
//! Non-secret settings come from the TOML file. Every setting, secrets
//! included, can be overridden by the environment variables the job has
//! always used (`ALATION_DOMAIN`, `SF_ACCOUNT`, ...). Secrets are never
//! written back to disk.

use serde::{Deserialize, Serialize};

/// How catalog columns are matched to protection-system databases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Match on database name only
    #[default]
    Database,

    /// Database name must match and `SCHEMA.TABLE` must exist in the warehouse
    Table,
}

/// How new databases are registered in the protection system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Registration {
    /// Register with the warehouse service-user credentials
    #[default]
    Credentials,

    /// Register through an existing partner-connect account
    PartnerConnect,
}

/// Catalog (Alation) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Catalog host, without scheme
    #[serde(default)]
    pub domain: String,

    /// Email of the operator used for the permission probe
    #[serde(default)]
    pub email: String,

    /// Custom field type holding governance tags
    #[serde(default = "default_field_type")]
    pub field_type: String,

    /// Plural name of the governance tag field
    #[serde(default = "default_field_name")]
    pub field_name_plural: String,
}

fn default_field_type() -> String {
    "MULTI_PICKER".to_string()
}

fn default_field_name() -> String {
    "ALTR Policy Tags".to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            email: String::new(),
            field_type: default_field_type(),
            field_name_plural: default_field_name(),
        }
    }
}

/// Protection system (ALTR) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionConfig {
    #[serde(default)]
    pub domain: String,

    /// Database type filter used when listing registered databases
    #[serde(default = "default_database_type")]
    pub database_type: String,
}

fn default_database_type() -> String {
    "snowflake_external_functions".to_string()
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            database_type: default_database_type(),
        }
    }
}

/// Warehouse (Snowflake) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Catalog engine type of the warehouse datasources
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Account identifier, e.g. `xy12345.us-east-1`
    #[serde(default)]
    pub account: String,

    /// Host as recorded in the catalog, e.g. `xy12345.snowflakecomputing.com`
    #[serde(default)]
    pub hostname: String,

    /// Service user
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub warehouse: Option<String>,

    /// Object tag that mirrors the catalog values
    #[serde(default = "default_tag_name")]
    pub tag_name: String,

    /// Also probe the warehouse connection before a run
    #[serde(default)]
    pub probe: bool,
}

fn default_engine() -> String {
    "snowflake".to_string()
}

fn default_tag_name() -> String {
    "ALATION_TAG".to_string()
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            account: String::new(),
            hostname: String::new(),
            username: String::new(),
            role: None,
            warehouse: None,
            tag_name: default_tag_name(),
            probe: false,
        }
    }
}

/// Reconciliation behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub match_policy: MatchPolicy,

    #[serde(default)]
    pub registration: Registration,

    /// Account id for partner-connect registration
    #[serde(default)]
    pub partner_account_id: Option<i64>,

    /// Unset warehouse tags whose value disappeared from the catalog
    #[serde(default)]
    pub cleanup_stale_tags: bool,
}

/// HTTP transport settings shared by both API clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Secrets, only ever read from the environment
#[derive(Clone, Default, PartialEq)]
pub struct Credentials {
    pub alation_token: String,
    pub altr_key_name: String,
    pub altr_key_password: String,
    pub warehouse_password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("alation_token", &redact(&self.alation_token))
            .field("altr_key_name", &self.altr_key_name)
            .field("altr_key_password", &redact(&self.altr_key_password))
            .field("warehouse_password", &redact(&self.warehouse_password))
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub protection: ProtectionConfig,

    #[serde(default)]
    pub warehouse: WarehouseConfig,

    #[serde(default)]
    pub governance: GovernanceConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(skip)]
    pub credentials: Credentials,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file (secrets are skipped)
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from any variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, name: &str| {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };

        set(&mut self.catalog.domain, "ALATION_DOMAIN");
        set(&mut self.catalog.email, "ALATION_EMAIL");
        set(&mut self.protection.domain, "ALTR_DOMAIN");
        set(&mut self.warehouse.account, "SF_ACCOUNT");
        set(&mut self.warehouse.hostname, "SF_HOSTNAME");
        set(&mut self.warehouse.username, "SF_DB_USERNAME");

        set(&mut self.credentials.alation_token, "ALATION_API_ACCESS_TOKEN");
        set(&mut self.credentials.altr_key_name, "ALTR_KEY_NAME");
        set(&mut self.credentials.altr_key_password, "ALTR_KEY_PASSWORD");
        set(&mut self.credentials.warehouse_password, "SF_DB_PASSWORD");

        if let Some(role) = lookup("SF_ROLE").filter(|v| !v.is_empty()) {
            self.warehouse.role = Some(role);
        }
        if let Some(warehouse) = lookup("SF_WAREHOUSE").filter(|v| !v.is_empty()) {
            self.warehouse.warehouse = Some(warehouse);
        }
        if let Some(raw) = lookup("ALTR_PC_ACCOUNT_ID").filter(|v| !v.is_empty()) {
            let id = raw.trim().parse::<i64>().map_err(|_| {
                ConfigError::Invalid(format!("ALTR_PC_ACCOUNT_ID must be an integer, got '{}'", raw))
            })?;
            self.governance.partner_account_id = Some(id);
        }

        Ok(())
    }

    /// Check that every value a run needs is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &str); 10] = [
            ("ALATION_DOMAIN", &self.catalog.domain),
            ("ALATION_EMAIL", &self.catalog.email),
            ("ALATION_API_ACCESS_TOKEN", &self.credentials.alation_token),
            ("ALTR_DOMAIN", &self.protection.domain),
            ("ALTR_KEY_NAME", &self.credentials.altr_key_name),
            ("ALTR_KEY_PASSWORD", &self.credentials.altr_key_password),
            ("SF_ACCOUNT", &self.warehouse.account),
            ("SF_HOSTNAME", &self.warehouse.hostname),
            ("SF_DB_USERNAME", &self.warehouse.username),
            ("SF_DB_PASSWORD", &self.credentials.warehouse_password),
        ];

        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Missing(name));
        }

        if self.governance.registration == Registration::PartnerConnect
            && self.governance.partner_account_id.is_none()
        {
            return Err(ConfigError::Missing("ALTR_PC_ACCOUNT_ID"));
        }

        if self.warehouse.tag_name.trim().is_empty() {
            return Err(ConfigError::Invalid("warehouse.tag_name must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}
