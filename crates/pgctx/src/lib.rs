//! # pgctx
//!
//! Access-controlled context profiles over a PostgreSQL object graph, shaped
//! into nested values for template rendering.
//!
//! ## Features
//!
//! - **Declarative profiles**: a root entity, include paths, allowed field
//!   paths and an optional tree of custom joins
//! - **Safe SQL synthesis**: every identifier is whitelisted and quoted, join
//!   types and operators are closed enums, the root id is the only parameter
//! - **Two pipelines, one shape**: custom-join profiles run a single built
//!   query and fold the flat rows back into a tree; other profiles are eagerly
//!   loaded and pruned to the allowed fields
//! - **Cancellation**: in-flight queries are cancelled on the server when the
//!   caller's token fires or the timeout elapses
//! - **Advisory caching**: shaped results and compiled templates are cached
//!   under keys that change whenever the profile or markup changes
//!
//! ## Example
//!
//! ```ignore
//! use pgctx::prelude::*;
//! use std::sync::Arc;
//!
//! let catalog = SchemaCatalog::new()
//!     .with_entity(
//!         EntityDef::new("SampleInvoice", "SampleInvoices")
//!             .column("Id", ColumnType::Uuid)
//!             .column("Number", ColumnType::Text)
//!             .has_many("Items", "SampleInvoiceItem", "SampleInvoiceId"),
//!     )
//!     .with_entity(
//!         EntityDef::new("SampleInvoiceItem", "SampleInvoiceItems")
//!             .column("Id", ColumnType::Uuid)
//!             .column("SampleInvoiceId", ColumnType::Uuid)
//!             .column("Description", ColumnType::Text),
//!     );
//!
//! let profiles = MemoryProfileStore::new().with_profile(
//!     ContextProfile::new("invoice", "SampleInvoice")
//!         .include("Items")
//!         .allow_all(["Number", "Items[].Description"]),
//! );
//!
//! let fetcher = ContextDataFetcher::new(Arc::new(catalog), Arc::new(profiles));
//! let client = create_pool(&database_url)?.get().await?;
//! let shaped = fetcher
//!     .fetch(&client, "invoice", &invoice_id.into(), &CancellationToken::new())
//!     .await?;
//! ```

pub mod builder;
pub mod cache;
pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod graph;
pub mod ident;
pub mod path;
pub mod prelude;
pub mod profile;
pub mod render;
pub mod row;
pub mod shape;
pub mod store;
pub mod validator;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(test)]
mod test_fixtures;

pub use builder::{BuiltQuery, NamedParam, QueryBuilder};
pub use cache::{ShapeCache, ShapeKey, TtlCache};
pub use catalog::{
    ColumnDef, ColumnType, EntityDef, FieldKind, FieldNode, FieldTree, NavigationDef,
    SchemaCatalog,
};
pub use client::GenericClient;
pub use config::{CacheConfig, FetcherConfig};
pub use error::{CtxError, CtxResult};
pub use executor::QueryExecutor;
pub use fetcher::{ContextDataFetcher, FetchPath};
pub use graph::{EntityNode, GraphLoader, Related};
pub use ident::Ident;
pub use path::FieldPath;
pub use profile::{CompareOp, ContextProfile, CustomJoin, JoinCondition, JoinType};
pub use render::{
    DocumentRenderer, MemoryTemplateStore, RenderService, SharedEngine, Template,
    TemplateRenderer, TemplateStore,
};
pub use row::FlatRow;
pub use shape::{FlatShaper, GraphShaper, Shaper, shape_rows};
pub use store::{MemoryProfileStore, PgProfileStore, ProfileStore};
pub use validator::{JoinLimits, JoinValidator, SchemaContext, ValidationResult, validate_profile};
pub use value::{EntityId, Scalar, Value};

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config, create_pool_with_tls};

pub use tokio_util::sync::CancellationToken;
