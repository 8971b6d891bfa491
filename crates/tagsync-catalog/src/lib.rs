//! Adapters for the systems a tag sync run talks to
//!
//! - [`CatalogSource`]: the data catalog holding governance tags (Alation)
//! - [`ProtectionTarget`]: the data-protection service (ALTR)
//! - [`WarehouseTagger`]: the warehouse receiving object tags (Snowflake)
//!
//! Every adapter is constructed explicitly and handed to the pipeline; the HTTP
//! adapters share one injected [`HttpClient`].
//!
//! ## Features
//!
//! - `snowflake` - Snowflake warehouse support through `snowflake-api`
//!
//! ## Example
//!
//! ```rust,ignore
//! use tagsync_catalog::{AlationClient, HttpClient, CatalogSource};
//!
//! let http = HttpClient::new(&config.http)?;
//! let catalog = AlationClient::new(http, "catalog.example.com", token);
//! let fields = catalog.fetch_tag_fields().await?;
//! ```

pub mod adapter;
pub mod http;
pub mod statements;
pub mod alation;
pub mod altr;
pub mod snowflake;
pub mod mock;

pub use adapter::{ApiError, CatalogSource, GovernanceOutcome, ProtectionTarget, WarehouseTagger};
pub use http::{HttpClient, RetryPolicy};
pub use alation::AlationClient;
pub use altr::{AltrClient, DatabaseRegistration};
pub use snowflake::{SnowflakeTagger, SnowflakeTaggerBuilder};
pub use mock::{default_tag_field, MockCatalog, MockProtection, MockWarehouse};
