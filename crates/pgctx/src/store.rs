//! Profile stores: where context profiles are looked up by name.

use crate::client::GenericClient;
use crate::error::{CtxError, CtxResult};
use crate::profile::{ContextProfile, CustomJoin};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tokio_postgres::Row;
use tokio_postgres::types::Json;
use uuid::Uuid;

/// Lookup of context profiles by name.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// The profile registered under `name`, if any.
    async fn find_by_name(&self, name: &str) -> CtxResult<Option<ContextProfile>>;

    /// Like [`find_by_name`](Self::find_by_name) but absent is [`CtxError::ProfileNotFound`].
    async fn get(&self, name: &str) -> CtxResult<ContextProfile> {
        self.find_by_name(name)
            .await?
            .ok_or_else(|| CtxError::ProfileNotFound(name.to_string()))
    }
}

/// In-process store, keyed by context name.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, ContextProfile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(self, profile: ContextProfile) -> Self {
        self.insert(profile);
        self
    }

    /// Parse a JSON array of profiles.
    pub fn from_json(json: &str) -> CtxResult<Self> {
        let profiles: Vec<ContextProfile> = serde_json::from_str(json)?;
        let store = Self::new();
        for profile in profiles {
            store.insert(profile);
        }
        Ok(store)
    }

    /// Add or replace a profile.
    pub fn insert(&self, profile: ContextProfile) {
        let mut profiles = self
            .profiles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        profiles.insert(profile.context_name.clone(), profile);
    }

    pub fn remove(&self, name: &str) -> Option<ContextProfile> {
        self.profiles
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let profiles = self
            .profiles
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<String> = profiles.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn find_by_name(&self, name: &str) -> CtxResult<Option<ContextProfile>> {
        let profiles = self
            .profiles
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(profiles.get(name).cloned())
    }
}

/// Default table read by [`PgProfileStore`].
pub const DEFAULT_PROFILE_TABLE: &str = "context_profiles";

/// Profiles persisted in PostgreSQL.
///
/// Expected columns (JSONB for lists, maps and joins):
///
/// ```sql
/// CREATE TABLE context_profiles (
///     "Id"            uuid PRIMARY KEY,
///     "ContextName"   text NOT NULL UNIQUE,
///     "RootEntity"    text NOT NULL,
///     "IncludePaths"  jsonb NOT NULL DEFAULT '[]',
///     "AllowedFields" jsonb NOT NULL DEFAULT '[]',
///     "Labels"        jsonb NOT NULL DEFAULT '{}',
///     "CustomJoins"   jsonb NOT NULL DEFAULT '[]'
/// );
/// ```
pub struct PgProfileStore<C> {
    client: C,
    select_sql: String,
}

impl<C: GenericClient> PgProfileStore<C> {
    /// Read from [`DEFAULT_PROFILE_TABLE`].
    pub fn new(client: C) -> Self {
        Self {
            client,
            select_sql: select_sql(DEFAULT_PROFILE_TABLE),
        }
    }

    /// Read from another table; the name must be a plain identifier.
    pub fn with_table(client: C, table: &str) -> CtxResult<Self> {
        crate::ident::Ident::parse(table)?;
        Ok(Self {
            client,
            select_sql: select_sql(table),
        })
    }
}

fn select_sql(table: &str) -> String {
    format!(
        r#"SELECT "Id", "ContextName", "RootEntity", "IncludePaths", "AllowedFields", "Labels", "CustomJoins" FROM "{table}" WHERE "ContextName" = $1"#
    )
}

/// Decode one `context_profiles` row.
pub fn profile_from_row(row: &Row) -> CtxResult<ContextProfile> {
    let id: Option<Uuid> = row.try_get("Id")?;
    let Json(include_paths): Json<Vec<String>> = row.try_get("IncludePaths")?;
    let Json(allowed_fields): Json<Vec<String>> = row.try_get("AllowedFields")?;
    let Json(labels): Json<BTreeMap<String, String>> = row.try_get("Labels")?;
    let Json(custom_joins): Json<Vec<CustomJoin>> = row.try_get("CustomJoins")?;
    Ok(ContextProfile {
        id,
        context_name: row.try_get("ContextName")?,
        root_entity: row.try_get("RootEntity")?,
        include_paths,
        allowed_fields,
        labels,
        custom_joins,
    })
}

#[async_trait]
impl<C: GenericClient> ProfileStore for PgProfileStore<C> {
    async fn find_by_name(&self, name: &str) -> CtxResult<Option<ContextProfile>> {
        let row = self.client.query_opt(&self.select_sql, &[&name]).await?;
        row.as_ref().map(profile_from_row).transpose()
    }
}
