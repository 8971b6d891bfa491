//! Alation catalog client
//!
//! Authenticates with an API access token in the `TOKEN` header. Endpoints:
//! - `GET /integration/v1/user/` permission probe
//! - `GET /integration/v2/custom_field/` governance tag field lookup
//! - `GET /integration/v1/datasource/` datasources
//! - `GET /integration/v2/column/` columns filtered by custom field

use serde::Deserialize;
use tagsync_core::{CatalogDatabase, TagField, TaggedColumn};

use crate::adapter::{ApiError, CatalogSource};
use crate::http::HttpClient;

/// Custom field definition as returned by the catalog
#[derive(Debug, Clone, Deserialize)]
struct AlationCustomField {
    id: i64,
    #[serde(default)]
    field_type: Option<String>,
    #[serde(default)]
    name_plural: Option<String>,
}

impl From<AlationCustomField> for TagField {
    fn from(field: AlationCustomField) -> Self {
        Self {
            id: field.id,
            name_plural: field.name_plural.unwrap_or_default(),
            field_type: field.field_type.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AlationDatasource {
    id: i64,
    #[serde(default)]
    dbtype: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    dbname: Option<String>,
    #[serde(default)]
    is_gone: bool,
    #[serde(default)]
    deleted: bool,
}

impl From<AlationDatasource> for CatalogDatabase {
    fn from(ds: AlationDatasource) -> Self {
        Self {
            id: ds.id,
            dbtype: ds.dbtype.unwrap_or_default(),
            host: ds.host.unwrap_or_default(),
            dbname: ds.dbname,
            is_gone: ds.is_gone,
            deleted: ds.deleted,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AlationFieldValue {
    field_id: i64,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct AlationColumn {
    key: String,
    name: String,
    #[serde(default)]
    ds_id: i64,
    #[serde(default)]
    custom_fields: Vec<AlationFieldValue>,
}

impl AlationColumn {
    /// Keep only the values of the governance tag field
    fn into_tagged(self, field_id: i64) -> TaggedColumn {
        let tag_values = self
            .custom_fields
            .iter()
            .find(|field| field.field_id == field_id)
            .map(|field| field_values(&field.value))
            .unwrap_or_default();

        TaggedColumn {
            key: self.key,
            name: self.name,
            datasource_id: self.ds_id,
            tag_values,
        }
    }
}

/// Multi-picker values arrive as an array of strings; single values as a string
fn field_values(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        serde_json::Value::String(s) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Decode a column listing, keeping null placeholders as `None`
fn decode_columns(
    raw: Vec<Option<serde_json::Value>>,
    field_id: i64,
) -> Result<Vec<Option<TaggedColumn>>, ApiError> {
    raw.into_iter()
        .map(|entry| match entry {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(value) => serde_json::from_value::<AlationColumn>(value)
                .map(|column| Some(column.into_tagged(field_id)))
                .map_err(|e| ApiError::InvalidResponse(format!("catalog column: {}", e))),
        })
        .collect()
}

/// Alation REST client
#[derive(Clone)]
pub struct AlationClient {
    http: HttpClient,
    base_url: String,
    token: String,
    email: String,
    field_type: String,
    field_name_plural: String,
}

impl AlationClient {
    /// Client for `https://{domain}`
    pub fn new(http: HttpClient, domain: &str, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: format!("https://{}", domain.trim_end_matches('/')),
            token: token.into(),
            email: String::new(),
            field_type: "MULTI_PICKER".to_string(),
            field_name_plural: "ALTR Policy Tags".to_string(),
        }
    }

    /// Build from the `[catalog]` settings
    pub fn from_config(http: HttpClient, config: &tagsync_core::Config) -> Self {
        Self::new(http, &config.catalog.domain, config.credentials.alation_token.clone())
            .with_email(config.catalog.email.clone())
            .with_tag_field(
                config.catalog.field_type.clone(),
                config.catalog.field_name_plural.clone(),
            )
    }

    /// Operator email used for the permission probe
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_tag_field(mut self, field_type: impl Into<String>, name_plural: impl Into<String>) -> Self {
        self.field_type = field_type.into();
        self.field_name_plural = name_plural.into();
        self
    }

    /// Override the base URL (scheme included)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait::async_trait]
impl CatalogSource for AlationClient {
    fn name(&self) -> &'static str {
        "Alation"
    }

    async fn check_access(&self) -> Result<(), ApiError> {
        let url = self.url("/integration/v1/user/");
        self.http
            .send_ok("GET alation users", |client| {
                client
                    .get(&url)
                    .header("TOKEN", &self.token)
                    .header("accept", "application/json")
                    .query(&[("email", self.email.as_str()), ("limit", "100"), ("skip", "0")])
            })
            .await?;
        Ok(())
    }

    async fn fetch_tag_fields(&self) -> Result<Vec<TagField>, ApiError> {
        let url = self.url("/integration/v2/custom_field/");
        let fields: Vec<AlationCustomField> = self
            .http
            .get_json("GET alation custom fields", |client| {
                client
                    .get(&url)
                    .header("TOKEN", &self.token)
                    .header("accept", "application/json")
                    .query(&[
                        ("field_type", self.field_type.as_str()),
                        ("name_plural", self.field_name_plural.as_str()),
                    ])
            })
            .await?;

        Ok(fields.into_iter().map(TagField::from).collect())
    }

    async fn fetch_databases(&self) -> Result<Vec<CatalogDatabase>, ApiError> {
        let url = self.url("/integration/v1/datasource/");
        let datasources: Vec<AlationDatasource> = self
            .http
            .get_json("GET alation datasources", |client| {
                client
                    .get(&url)
                    .header("TOKEN", &self.token)
                    .header("accept", "application/json")
                    .query(&[("include_undeployed", "false"), ("include_hidden", "false")])
            })
            .await?;

        Ok(datasources.into_iter().map(CatalogDatabase::from).collect())
    }

    async fn fetch_tagged_columns(
        &self,
        field: &TagField,
    ) -> Result<Vec<Option<TaggedColumn>>, ApiError> {
        let url = self.url("/integration/v2/column/");
        let filter = serde_json::json!([{ "field_id": field.id }]).to_string();

        let raw: Vec<Option<serde_json::Value>> = self
            .http
            .get_json("GET alation columns", |client| {
                client
                    .get(&url)
                    .header("TOKEN", &self.token)
                    .header("accept", "application/json")
                    .query(&[("custom_fields", filter.as_str())])
            })
            .await?;

        decode_columns(raw, field.id)
    }
}
