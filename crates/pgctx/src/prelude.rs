//! Convenient imports for typical `pgctx` usage.
//!
//! ```ignore
//! use pgctx::prelude::*;
//! ```

pub use crate::{
    CancellationToken, ColumnType, ContextDataFetcher, ContextProfile, CtxError, CtxResult,
    CustomJoin, EntityDef, EntityId, FetcherConfig, GenericClient, MemoryProfileStore,
    ProfileStore, SchemaCatalog, Scalar, Value,
};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
