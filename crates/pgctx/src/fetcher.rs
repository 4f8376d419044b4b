//! Context data fetcher: profile lookup and dispatch to one of two pipelines.
//!
//! A profile with custom joins goes through validation, the query builder, the
//! executor and the flat shaper. Any other profile is eagerly loaded by the
//! graph loader and pruned by the graph shaper. Both end in the same
//! [`Value`] tree, or `None` when the root entity does not exist.

use crate::builder::{BuiltQuery, QueryBuilder};
use crate::cache::ShapeCache;
use crate::catalog::{FieldTree, SchemaCatalog};
use crate::client::GenericClient;
use crate::config::FetcherConfig;
use crate::error::CtxResult;
use crate::executor::QueryExecutor;
use crate::graph::GraphLoader;
use crate::profile::ContextProfile;
use crate::shape::{FlatShaper, GraphShaper, Shaper, missing_columns};
use crate::store::ProfileStore;
use crate::validator::{JoinValidator, SchemaContext, ValidationResult, validate_profile};
use crate::value::{EntityId, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which pipeline serves a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPath {
    /// Built SQL with custom joins, shaped from flat rows.
    CustomJoins,
    /// Eager graph loading, shaped from the entity tree.
    Graph,
}

impl FetchPath {
    pub fn for_profile(profile: &ContextProfile) -> Self {
        if profile.has_custom_joins() {
            Self::CustomJoins
        } else {
            Self::Graph
        }
    }
}

/// Loads shaped data for a named context and a root identifier.
pub struct ContextDataFetcher {
    catalog: Arc<SchemaCatalog>,
    profiles: Arc<dyn ProfileStore>,
    config: FetcherConfig,
    validator: JoinValidator,
    executor: QueryExecutor,
    cache: Option<ShapeCache>,
}

impl ContextDataFetcher {
    pub fn new(catalog: Arc<SchemaCatalog>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self::with_config(catalog, profiles, FetcherConfig::default())
    }

    pub fn with_config(
        catalog: Arc<SchemaCatalog>,
        profiles: Arc<dyn ProfileStore>,
        config: FetcherConfig,
    ) -> Self {
        let mut executor = QueryExecutor::new();
        if let Some(timeout) = config.query_timeout {
            executor = executor.with_timeout(timeout);
        }
        Self {
            catalog,
            profiles,
            validator: JoinValidator::with_limits(config.join_limits),
            executor,
            cache: config.cache.map(|c| ShapeCache::new(c.capacity, c.ttl)),
            config,
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&ShapeCache> {
        self.cache.as_ref()
    }

    /// Load the profile registered under `context_name`.
    pub async fn profile(&self, context_name: &str) -> CtxResult<ContextProfile> {
        self.profiles.get(context_name).await
    }

    /// Fetch and shape the data of `context_name` for root `id`.
    pub async fn fetch<C: GenericClient>(
        &self,
        conn: &C,
        context_name: &str,
        id: &EntityId,
        cancel: &CancellationToken,
    ) -> CtxResult<Option<Value>> {
        let profile = self.profile(context_name).await?;
        self.fetch_with_profile(conn, &profile, id, cancel).await
    }

    /// Same as [`fetch`](Self::fetch) with an already loaded profile.
    pub async fn fetch_with_profile<C: GenericClient>(
        &self,
        conn: &C,
        profile: &ContextProfile,
        id: &EntityId,
        cancel: &CancellationToken,
    ) -> CtxResult<Option<Value>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(profile, id) {
                tracing::debug!(target: "pgctx", context = %profile.context_name, %id, "shape cache hit");
                return Ok(Some(hit));
            }
            tracing::debug!(target: "pgctx", context = %profile.context_name, %id, "shape cache miss");
        }

        let shaped = match FetchPath::for_profile(profile) {
            FetchPath::CustomJoins => {
                tracing::info!(
                    target: "pgctx",
                    context = %profile.context_name,
                    root_entity = %profile.root_entity,
                    joins = profile.custom_joins.len(),
                    "fetching with custom joins"
                );
                self.fetch_flat(conn, profile, id, cancel).await?
            }
            FetchPath::Graph => {
                tracing::info!(
                    target: "pgctx",
                    context = %profile.context_name,
                    root_entity = %profile.root_entity,
                    "fetching with graph loading"
                );
                self.fetch_graph(conn, profile, id, cancel).await?
            }
        };

        if let (Some(cache), Some(value)) = (&self.cache, &shaped) {
            cache.insert(profile, id, value.clone());
        }
        Ok(shaped)
    }

    /// Validate custom joins and build the query without running it.
    pub fn build_query(&self, profile: &ContextProfile, id: &EntityId) -> CtxResult<BuiltQuery> {
        self.validator
            .validate_all(&profile.custom_joins, &SchemaContext::for_profile(profile))
            .into_result()?;
        QueryBuilder::new(&self.catalog)
            .max_sql_log_length(self.config.max_sql_log_length)
            .build(profile, id)
    }

    /// Every problem with `profile` against the catalog and join limits.
    pub fn validate(&self, profile: &ContextProfile) -> ValidationResult {
        validate_profile(profile, &self.catalog, &self.validator)
    }

    /// Navigable field tree of `profile` for admin tooling.
    pub fn field_tree(&self, profile: &ContextProfile) -> CtxResult<FieldTree> {
        self.catalog.field_tree(profile)
    }

    async fn fetch_flat<C: GenericClient>(
        &self,
        conn: &C,
        profile: &ContextProfile,
        id: &EntityId,
        cancel: &CancellationToken,
    ) -> CtxResult<Option<Value>> {
        let query = self.build_query(profile, id)?;
        let rows = self.executor.execute(conn, &query, cancel).await?;

        if let Some(first) = rows.first() {
            let fields = profile.field_paths();
            let missing = missing_columns(first, &fields);
            if !missing.is_empty() {
                tracing::debug!(target: "pgctx", context = %profile.context_name, ?missing, "result is missing field columns");
            }
        }
        Ok(FlatShaper::new().shape(&rows, profile))
    }

    async fn fetch_graph<C: GenericClient>(
        &self,
        conn: &C,
        profile: &ContextProfile,
        id: &EntityId,
        cancel: &CancellationToken,
    ) -> CtxResult<Option<Value>> {
        let root = GraphLoader::new(&self.catalog)
            .executor(self.executor)
            .max_sql_log_length(self.config.max_sql_log_length)
            .load(conn, profile, id, cancel)
            .await?;
        Ok(root.and_then(|node| GraphShaper::new().shape(&node, profile)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CtxError;
    use crate::profile::CustomJoin;
    use crate::store::MemoryProfileStore;
    use crate::test_fixtures::{invoice_catalog, invoice_profile};
    use crate::value::Scalar;
    use tokio_postgres::Row;
    use tokio_postgres::types::ToSql;

    struct Empty;

    impl GenericClient for Empty {
        async fn query(&self, _: &str, _: &[&(dyn ToSql + Sync)]) -> CtxResult<Vec<Row>> {
            Ok(Vec::new())
        }
    }

    struct Unreachable;

    impl GenericClient for Unreachable {
        async fn query(&self, sql: &str, _: &[&(dyn ToSql + Sync)]) -> CtxResult<Vec<Row>> {
            panic!("unexpected query: {sql}")
        }
    }

    fn with_joins() -> ContextProfile {
        ContextProfile::new("invoice_customer", "SampleInvoice")
            .allow("Number")
            .allow("cust.Name")
            .join(CustomJoin::new("cust", "Customer").on("CustomerId", "=", "Id"))
    }

    fn fetcher(config: FetcherConfig) -> ContextDataFetcher {
        let store = MemoryProfileStore::new()
            .with_profile(invoice_profile())
            .with_profile(with_joins());
        ContextDataFetcher::with_config(Arc::new(invoice_catalog()), Arc::new(store), config)
    }

    #[test]
    fn dispatch_follows_custom_joins() {
        assert_eq!(FetchPath::for_profile(&invoice_profile()), FetchPath::Graph);
        assert_eq!(FetchPath::for_profile(&with_joins()), FetchPath::CustomJoins);
    }

    #[tokio::test]
    async fn missing_root_is_none_on_both_paths() {
        let fetcher = fetcher(FetcherConfig::new());
        let cancel = CancellationToken::new();
        let id = EntityId::Int(404);
        assert!(fetcher.fetch(&Empty, "invoice", &id, &cancel).await.unwrap().is_none());
        assert!(
            fetcher
                .fetch(&Empty, "invoice_customer", &id, &cancel)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn unknown_context_is_profile_not_found() {
        let err = fetcher(FetcherConfig::new())
            .fetch(&Unreachable, "nope", &EntityId::Int(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CtxError::ProfileNotFound(_)));
    }

    #[tokio::test]
    async fn invalid_joins_block_the_query() {
        let profile = with_joins().join(CustomJoin::new("bad alias", "Customer"));
        let err = fetcher(FetcherConfig::new())
            .fetch_with_profile(&Unreachable, &profile, &EntityId::Int(1), &CancellationToken::new())
            .await
            .unwrap_err();
        let CtxError::InvalidJoins(errors) = err else {
            panic!("expected InvalidJoins, got {err}");
        };
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Invalid alias 'bad alias'"));
    }

    #[tokio::test]
    async fn cache_hit_skips_the_database() {
        let fetcher = fetcher(FetcherConfig::new().cache_capacity(4));
        let profile = invoice_profile();
        let id = EntityId::Int(1);
        let cached = Value::Scalar(Scalar::from("cached"));
        fetcher.cache().unwrap().insert(&profile, &id, cached.clone());

        let got = fetcher
            .fetch(&Unreachable, "invoice", &id, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(got, Some(cached));
    }

    #[test]
    fn build_query_uses_configured_limits() {
        let fetcher = fetcher(FetcherConfig::new().join_limits(crate::validator::JoinLimits {
            max_depth: 3,
            max_joins: 0,
        }));
        let err = fetcher
            .build_query(&with_joins(), &EntityId::Int(1))
            .unwrap_err();
        assert!(matches!(err, CtxError::InvalidJoins(_)));
        assert!(fetcher.build_query(&invoice_profile(), &EntityId::Int(1)).is_ok());
    }
}
