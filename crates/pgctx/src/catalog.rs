//! Schema catalog: entity → table, columns and navigations.
//!
//! The catalog is the single source of truth standard include paths are
//! resolved against. It is built once (programmatically or from a TOML/JSON
//! document) and then only read.
//!
//! # Example
//! ```ignore
//! use pgctx::catalog::{ColumnType, EntityDef, SchemaCatalog};
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
//! ```

mod field_tree;


pub use field_tree::{FieldKind, FieldNode, FieldTree};

use crate::error::{CtxError, CtxResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const DEFAULT_PRIMARY_KEY: &str = "Id";

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

/// Logical column type, used for field-tree display and documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Uuid,
    #[default]
    Text,
    Int,
    BigInt,
    Float,
    Decimal,
    Bool,
    Date,
    Timestamp,
    TimestampTz,
    Json,
}

impl ColumnType {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Text => "text",
            Self::Int => "integer",
            Self::BigInt => "bigint",
            Self::Float => "double precision",
            Self::Decimal => "numeric",
            Self::Bool => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::TimestampTz => "timestamptz",
            Self::Json => "jsonb",
        }
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: ColumnType,
    #[serde(default)]
    pub nullable: bool,
}

/// A relationship from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationDef {
    pub name: String,
    pub target_entity: String,
    #[serde(default)]
    pub is_collection: bool,
    /// FK column: on the target for collections, on the source otherwise.
    pub foreign_key_column: String,
    /// Key column the FK points at.
    #[serde(default = "default_primary_key")]
    pub principal_key_column: String,
}

/// Entity registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub table: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub columns: Vec<ColumnDef>,
    #[serde(default)]
    pub navigations: Vec<NavigationDef>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            primary_key: default_primary_key(),
            columns: Vec::new(),
            navigations: Vec::new(),
        }
    }

    /// Override the primary key column (default `Id`).
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Add a non-nullable column.
    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            ty,
            nullable: false,
        });
        self
    }

    /// Add a nullable column.
    pub fn nullable_column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            ty,
            nullable: true,
        });
        self
    }

    /// One-to-many: `target.<fk>` references this entity's primary key.
    pub fn has_many(
        mut self,
        name: impl Into<String>,
        target_entity: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        let principal = self.primary_key.clone();
        self.navigations.push(NavigationDef {
            name: name.into(),
            target_entity: target_entity.into(),
            is_collection: true,
            foreign_key_column: foreign_key.into(),
            principal_key_column: principal,
        });
        self
    }

    /// Many-to-one: this entity's `<fk>` references the target's `Id`.
    pub fn belongs_to(
        self,
        name: impl Into<String>,
        target_entity: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.belongs_to_key(name, target_entity, foreign_key, DEFAULT_PRIMARY_KEY)
    }

    /// Many-to-one with an explicit principal key column on the target.
    pub fn belongs_to_key(
        mut self,
        name: impl Into<String>,
        target_entity: impl Into<String>,
        foreign_key: impl Into<String>,
        principal_key: impl Into<String>,
    ) -> Self {
        self.navigations.push(NavigationDef {
            name: name.into(),
            target_entity: target_entity.into(),
            is_collection: false,
            foreign_key_column: foreign_key.into(),
            principal_key_column: principal_key.into(),
        });
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn find_navigation(&self, name: &str) -> Option<&NavigationDef> {
        self.navigations.iter().find(|n| n.name == name)
    }
}

/// One hop of a resolved include path.
#[derive(Debug, Clone, Copy)]
pub struct IncludeHop<'a> {
    /// Entity the navigation is declared on.
    pub source: &'a EntityDef,
    pub navigation: &'a NavigationDef,
    /// Entity the navigation points at.
    pub target: &'a EntityDef,
}

/// Admin-facing description of an entity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDescription {
    pub entity_name: String,
    pub table_name: String,
    pub properties: Vec<PropertyDescription>,
    pub navigations: Vec<NavigationDef>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub is_nullable: bool,
    pub is_primary_key: bool,
}

/// Registry of entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    #[serde(with = "entity_list")]
    entities: HashMap<String, EntityDef>,
}

impl SchemaCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity (builder style).
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.register(entity);
        self
    }

    /// Register an entity, replacing any previous registration of the same name.
    pub fn register(&mut self, entity: EntityDef) {
        self.entities.insert(entity.name.clone(), entity);
    }

    /// Parse a catalog from JSON (`{"entities": [...]}`).
    pub fn from_json(json: &str) -> CtxResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn entity(&self, name: &str) -> CtxResult<&EntityDef> {
        self.entities
            .get(name)
            .ok_or_else(|| CtxError::EntityNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn table_name_for(&self, entity: &str) -> CtxResult<&str> {
        Ok(self.entity(entity)?.table.as_str())
    }

    pub fn columns_of(&self, entity: &str) -> CtxResult<Vec<&str>> {
        Ok(self
            .entity(entity)?
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect())
    }

    pub fn column_defs(&self, entity: &str) -> CtxResult<&[ColumnDef]> {
        Ok(&self.entity(entity)?.columns)
    }

    pub fn primary_key_of(&self, entity: &str) -> CtxResult<&str> {
        Ok(self.entity(entity)?.primary_key.as_str())
    }

    pub fn navigations_of(&self, entity: &str) -> CtxResult<&[NavigationDef]> {
        Ok(&self.entity(entity)?.navigations)
    }

    /// Look up a navigation by name on its source entity.
    pub fn navigation(&self, entity: &str, name: &str) -> CtxResult<&NavigationDef> {
        self.entity(entity)?
            .find_navigation(name)
            .ok_or_else(|| CtxError::NavigationNotFound {
                entity: entity.to_string(),
                navigation: name.to_string(),
            })
    }

    /// Resolve a dotted include path hop by hop starting at `root`.
    pub fn resolve_include(&self, root: &str, path: &str) -> CtxResult<Vec<IncludeHop<'_>>> {
        let mut hops = Vec::new();
        let mut source = self.entity(root)?;
        for name in path.split('.') {
            let navigation =
                source
                    .find_navigation(name)
                    .ok_or_else(|| CtxError::NavigationNotFound {
                        entity: source.name.clone(),
                        navigation: name.to_string(),
                    })?;
            let target = self.entity(&navigation.target_entity)?;
            hops.push(IncludeHop {
                source,
                navigation,
                target,
            });
            source = target;
        }
        Ok(hops)
    }

    /// Raw metadata for admin tooling.
    pub fn describe(&self, entity: &str) -> CtxResult<EntityDescription> {
        let def = self.entity(entity)?;
        Ok(EntityDescription {
            entity_name: def.name.clone(),
            table_name: def.table.clone(),
            properties: def
                .columns
                .iter()
                .map(|c| PropertyDescription {
                    name: c.name.clone(),
                    type_name: c.ty.type_name(),
                    is_nullable: c.nullable,
                    is_primary_key: c.name == def.primary_key,
                })
                .collect(),
            navigations: def.navigations.clone(),
        })
    }

    /// Registered entity names, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Serialise the entity map as a plain list keyed by `name`.
mod entity_list {
    use super::EntityDef;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    pub fn serialize<S: Serializer>(
        map: &HashMap<String, EntityDef>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut list: Vec<&EntityDef> = map.values().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<String, EntityDef>, D::Error> {
        let list = Vec::<EntityDef>::deserialize(deserializer)?;
        Ok(list.into_iter().map(|e| (e.name.clone(), e)).collect())
    }
}
