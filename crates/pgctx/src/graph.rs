//! Entity graph loading for profiles without custom joins.
//!
//! This is ordinary eager loading: one query for the root row, then one batched
//! query per include-path hop (`= ANY($1)` over the parent keys), so the number
//! of round trips depends only on the include paths, never on row counts.
//! The loaded [`EntityNode`] tree is pruned to the profile by
//! [`GraphShaper`](crate::shape::GraphShaper).

use crate::builder::{DEFAULT_SQL_LOG_LENGTH, log_sql};
use crate::catalog::{EntityDef, NavigationDef, SchemaCatalog};
use crate::client::GenericClient;
use crate::error::{CtxError, CtxResult};
use crate::executor::QueryExecutor;
use crate::ident::quote_ident;
use crate::profile::ContextProfile;
use crate::row::FlatRow;
use crate::value::{EntityId, Scalar};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Navigation hops below the root that are loaded and shaped.
pub const MAX_GRAPH_DEPTH: usize = 2;

/// One loaded entity with its scalar columns and loaded navigations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityNode {
    pub entity: String,
    /// Primary key value, `Null` when the column was not loaded.
    pub id: Scalar,
    pub fields: FlatRow,
    pub navigations: BTreeMap<String, Related>,
}

/// A loaded navigation.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    One(Option<Box<EntityNode>>),
    Many(Vec<EntityNode>),
}

impl EntityNode {
    pub fn new(entity: impl Into<String>, id: impl Into<Scalar>) -> Self {
        Self {
            entity: entity.into(),
            id: id.into(),
            ..Self::default()
        }
    }

    /// Build a node from a decoded row, taking the id from `def.primary_key`.
    pub fn from_row(def: &EntityDef, fields: FlatRow) -> Self {
        let id = fields
            .get(&def.primary_key)
            .cloned()
            .unwrap_or(Scalar::Null);
        Self {
            entity: def.name.clone(),
            id,
            fields,
            navigations: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.fields.insert(name, value);
        self
    }

    pub fn with_one(mut self, name: impl Into<String>, node: Option<EntityNode>) -> Self {
        self.navigations
            .insert(name.into(), Related::One(node.map(Box::new)));
        self
    }

    pub fn with_many(mut self, name: impl Into<String>, nodes: Vec<EntityNode>) -> Self {
        self.navigations.insert(name.into(), Related::Many(nodes));
        self
    }

    pub fn field(&self, name: &str) -> Option<&Scalar> {
        self.fields.get(name)
    }

    pub fn navigation(&self, name: &str) -> Option<&Related> {
        self.navigations.get(name)
    }
}

/// Include paths folded into a tree of navigation names.
#[derive(Debug, Default)]
struct IncludeTree {
    children: BTreeMap<String, IncludeTree>,
}

impl IncludeTree {
    fn from_paths(paths: &[String]) -> Self {
        let mut tree = Self::default();
        for path in paths {
            let mut node = &mut tree;
            for segment in path.split('.').take(MAX_GRAPH_DEPTH) {
                node = node.children.entry(segment.to_string()).or_default();
            }
            if path.split('.').count() > MAX_GRAPH_DEPTH {
                tracing::warn!(
                    target: "pgctx",
                    path = %path,
                    max_depth = MAX_GRAPH_DEPTH,
                    "include path deeper than the graph loader follows"
                );
            }
        }
        tree
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Loads a root entity and its include paths.
#[derive(Debug, Clone, Copy)]
pub struct GraphLoader<'c> {
    catalog: &'c SchemaCatalog,
    executor: QueryExecutor,
    max_sql_log_length: usize,
}

impl<'c> GraphLoader<'c> {
    pub fn new(catalog: &'c SchemaCatalog) -> Self {
        Self {
            catalog,
            executor: QueryExecutor::new(),
            max_sql_log_length: DEFAULT_SQL_LOG_LENGTH,
        }
    }

    pub fn executor(mut self, executor: QueryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn max_sql_log_length(mut self, len: usize) -> Self {
        self.max_sql_log_length = len;
        self
    }

    /// Load the root row and every include path; `None` when the root is absent.
    pub async fn load<C: GenericClient>(
        &self,
        conn: &C,
        profile: &ContextProfile,
        id: &EntityId,
        cancel: &CancellationToken,
    ) -> CtxResult<Option<EntityNode>> {
        let root = self.catalog.entity(&profile.root_entity)?;
        if !root.has_column(&root.primary_key) {
            return Err(CtxError::UnsupportedEntity(root.name.clone()));
        }

        let sql = select_by(root, &root.primary_key, "= $1")?;
        log_sql(&sql, self.max_sql_log_length, &profile.context_name);
        let rows = self.executor.query(conn, &sql, &[id], cancel).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let mut nodes = vec![EntityNode::from_row(root, FlatRow::from_row(row)?)];
        let tree = IncludeTree::from_paths(&profile.include_paths);
        self.attach(conn, &mut nodes, root, &tree, &profile.context_name, cancel)
            .await?;
        Ok(nodes.pop())
    }

    /// Load each navigation in `tree` for all `nodes` at once, then recurse.
    fn attach<'a, C: GenericClient>(
        &'a self,
        conn: &'a C,
        nodes: &'a mut [EntityNode],
        source: &'a EntityDef,
        tree: &'a IncludeTree,
        context: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, CtxResult<()>> {
        Box::pin(async move {
            for (name, subtree) in &tree.children {
                let nav = self.catalog.navigation(&source.name, name)?;
                let target = self.catalog.entity(&nav.target_entity)?;

                let (parent_key, child_key) = if nav.is_collection {
                    (&nav.principal_key_column, &nav.foreign_key_column)
                } else {
                    (&nav.foreign_key_column, &nav.principal_key_column)
                };

                let keys = distinct_keys(nodes, parent_key);
                let mut children = if keys.is_empty() {
                    Vec::new()
                } else {
                    let sql = select_by(target, child_key, "= ANY($1)")?;
                    log_sql(&sql, self.max_sql_log_length, context);
                    let rows = self.executor.query(conn, &sql, &[&keys], cancel).await?;
                    rows.iter()
                        .map(|row| Ok(EntityNode::from_row(target, FlatRow::from_row(row)?)))
                        .collect::<CtxResult<Vec<_>>>()?
                };

                if !subtree.children.is_empty() {
                    self.attach(conn, &mut children, target, subtree, context, cancel)
                        .await?;
                }

                distribute(nodes, name, nav, children);
            }
            Ok(())
        })
    }
}

/// Non-null key values of `column` across `nodes`, first-seen order.
fn distinct_keys(nodes: &[EntityNode], column: &str) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    nodes
        .iter()
        .filter_map(|n| n.field(column))
        .filter(|v| v.identity_key().is_some_and(|k| seen.insert(k)))
        .filter_map(EntityId::from_scalar)
        .collect()
}

fn distribute(nodes: &mut [EntityNode], name: &str, nav: &NavigationDef, children: Vec<EntityNode>) {
    let key_of = |node: &EntityNode, column: &str| {
        node.field(column).and_then(Scalar::identity_key)
    };

    if nav.is_collection {
        let mut by_parent: HashMap<String, Vec<EntityNode>> = HashMap::new();
        for child in children {
            if let Some(key) = key_of(&child, &nav.foreign_key_column) {
                by_parent.entry(key).or_default().push(child);
            }
        }
        for node in nodes.iter_mut() {
            let items = key_of(node, &nav.principal_key_column)
                .and_then(|k| by_parent.get(&k).cloned())
                .unwrap_or_default();
            node.navigations.insert(name.to_string(), Related::Many(items));
        }
    } else {
        let by_key: HashMap<String, EntityNode> = children
            .into_iter()
            .filter_map(|c| key_of(&c, &nav.principal_key_column).map(|k| (k, c)))
            .collect();
        for node in nodes.iter_mut() {
            let target = key_of(node, &nav.foreign_key_column)
                .and_then(|k| by_key.get(&k).cloned())
                .map(Box::new);
            node.navigations.insert(name.to_string(), Related::One(target));
        }
    }
}

/// `SELECT <all columns> FROM <table> WHERE <column> <predicate>`.
fn select_by(entity: &EntityDef, column: &str, predicate: &str) -> CtxResult<String> {
    let columns = entity
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<CtxResult<Vec<_>>>()?;
    if columns.is_empty() {
        return Err(CtxError::UnsupportedEntity(entity.name.clone()));
    }
    Ok(format!(
        "SELECT {} FROM {} WHERE {} {predicate}",
        columns.join(", "),
        quote_ident(&entity.table)?,
        quote_ident(column)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnType;
    use crate::test_fixtures::invoice_catalog;

    #[test]
    fn select_by_quotes_everything() {
        let catalog = invoice_catalog();
        let sql = select_by(
            catalog.entity("SampleInvoiceItem").unwrap(),
            "SampleInvoiceId",
            "= ANY($1)",
        )
        .unwrap();
        assert_eq!(
            sql,
            r#"SELECT "Id", "SampleInvoiceId", "Description", "Quantity", "UnitPrice", "ProductId" FROM "SampleInvoiceItems" WHERE "SampleInvoiceId" = ANY($1)"#
        );
    }

    #[test]
    fn select_by_rejects_unsafe_table_names() {
        let entity = EntityDef::new("Broken", "Items; DROP TABLE x").column("Id", ColumnType::Int);
        assert!(select_by(&entity, "Id", "= $1").unwrap_err().is_security());
    }

    #[test]
    fn default_node_has_null_id() {
        let node = EntityNode::default();
        assert!(node.id.is_null());
        assert!(node.fields.is_empty());
        assert_eq!(EntityNode::new("Customer", 7i64).id, Scalar::Int(7));
    }

    #[test]
    fn include_tree_merges_prefixes_and_caps_depth() {
        let tree = IncludeTree::from_paths(&[
            "Items".to_string(),
            "Items.Product".to_string(),
            "Customer".to_string(),
            "Customer.Address.Country".to_string(),
        ]);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children["Items"].children.len(), 1);
        let address = &tree.children["Customer"].children["Address"];
        assert!(address.children.is_empty());
    }

    #[test]
    fn distribute_groups_children_by_parent_key() {
        let catalog = invoice_catalog();
        let nav = catalog.navigation("SampleInvoice", "Items").unwrap();
        let mut parents = vec![
            EntityNode::new("SampleInvoice", 1i64).with_field("Id", 1i64),
            EntityNode::new("SampleInvoice", 2i64).with_field("Id", 2i64),
        ];
        let children = vec![
            EntityNode::new("SampleInvoiceItem", 10i64).with_field("SampleInvoiceId", 1i64),
            EntityNode::new("SampleInvoiceItem", 11i64).with_field("SampleInvoiceId", 1i64),
        ];
        distribute(&mut parents, "Items", nav, children);

        let Some(Related::Many(first)) = parents[0].navigation("Items") else {
            panic!("expected a collection");
        };
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].id, Scalar::Int(11));
        assert_eq!(parents[1].navigation("Items"), Some(&Related::Many(vec![])));
    }

    #[test]
    fn distribute_resolves_forward_references() {
        let catalog = invoice_catalog();
        let nav = catalog.navigation("SampleInvoice", "Customer").unwrap();
        let mut parents = vec![
            EntityNode::new("SampleInvoice", 1i64).with_field("CustomerId", 7i64),
            EntityNode::new("SampleInvoice", 2i64).with_field("CustomerId", Scalar::Null),
        ];
        let children = vec![EntityNode::new("Customer", 7i64).with_field("Id", 7i64)];
        distribute(&mut parents, "Customer", nav, children);

        assert!(matches!(parents[0].navigation("Customer"), Some(Related::One(Some(_)))));
        assert_eq!(parents[1].navigation("Customer"), Some(&Related::One(None)));
    }

    #[test]
    fn distinct_keys_skip_nulls_and_duplicates() {
        let nodes = vec![
            EntityNode::default().with_field("CustomerId", 7i64),
            EntityNode::default().with_field("CustomerId", Scalar::Null),
            EntityNode::default().with_field("CustomerId", 7i64),
            EntityNode::default().with_field("CustomerId", 8i64),
        ];
        assert_eq!(
            distinct_keys(&nodes, "CustomerId"),
            vec![EntityId::Int(7), EntityId::Int(8)]
        );
    }

    #[test]
    fn from_row_takes_id_from_primary_key() {
        let def = EntityDef::new("Line", "lines")
            .primary_key("LineId")
            .column("LineId", ColumnType::Int);
        let node = EntityNode::from_row(&def, FlatRow::new().with("LineId", 3i64));
        assert_eq!(node.id, Scalar::Int(3));
    }

    #[tokio::test]
    async fn entity_without_primary_key_column_is_unsupported() {
        struct Never;
        impl GenericClient for Never {
            async fn query(
                &self,
                _: &str,
                _: &[&(dyn tokio_postgres::types::ToSql + Sync)],
            ) -> CtxResult<Vec<tokio_postgres::Row>> {
                unreachable!("no query is issued for an unsupported entity")
            }
        }

        let catalog = SchemaCatalog::new()
            .with_entity(EntityDef::new("View", "report_view").column("Total", ColumnType::Int));
        let profile = ContextProfile::new("report", "View").allow("Total");
        let err = GraphLoader::new(&catalog)
            .load(&Never, &profile, &EntityId::Int(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CtxError::UnsupportedEntity(ref e) if e == "View"));
    }
}
