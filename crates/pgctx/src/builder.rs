//! Query builder: one parameterized `SELECT` per profile and root identifier.
//!
//! Clauses are assembled in dependency order. Joins are planned first because
//! they register the aliases the SELECT list resolves field prefixes against:
//!
//! 1. `root` is registered for the root entity.
//! 2. Standard include paths are resolved through the [`SchemaCatalog`], hop by
//!    hop, each hop joined as `LEFT JOIN` under the path alias (`Items`,
//!    `Items_Product`).
//! 3. Custom joins are emitted depth first; each alias is registered before its
//!    nested joins so they can reference it.
//! 4. The SELECT list starts with `root_Id`, then the synthetic `<alias>_Id`
//!    column for each referenced collection, then one column per allowed field.
//! 5. `WHERE "root"."<pk>" = $1` binds the root identifier.
//!
//! Every identifier goes through [`Ident`] before it is written; join keywords
//! and operators are parsed into closed enums. Any failure aborts the build and
//! no SQL is returned.
//!
//! # Example
//! ```ignore
//! use pgctx::{EntityId, QueryBuilder};
//!
//! let query = QueryBuilder::new(&catalog).build(&profile, &EntityId::from(invoice_id))?;
//! let rows = client.query(query.sql(), &query.params_ref()).await?;
//! ```

#[cfg(test)]
mod tests;

use crate::catalog::{EntityDef, SchemaCatalog};
use crate::error::{CtxError, CtxResult};
use crate::ident::Ident;
use crate::path::{
    FieldPath, ID_PROPERTY, ROOT_ALIAS, ROOT_ID_COLUMN, collection_id_column, include_alias,
};
use crate::profile::{CompareOp, ContextProfile, CustomJoin, JoinType};
use crate::value::EntityId;
use std::collections::HashSet;
use tokio_postgres::types::ToSql;

/// Default byte limit for SQL text in log events.
pub const DEFAULT_SQL_LOG_LENGTH: usize = 1000;

/// A bound parameter together with its logical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedParam {
    pub name: &'static str,
    pub value: EntityId,
}

/// Generated SQL and its parameters, ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    sql: String,
    params: Vec<NamedParam>,
}

impl BuiltQuery {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[NamedParam] {
        &self.params
    }

    /// Parameters in placeholder order, for `tokio_postgres` query methods.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| &p.value as &(dyn ToSql + Sync))
            .collect()
    }
}

/// Builds context queries against a schema catalog.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'c> {
    catalog: &'c SchemaCatalog,
    max_sql_log_length: usize,
}

impl<'c> QueryBuilder<'c> {
    pub fn new(catalog: &'c SchemaCatalog) -> Self {
        Self {
            catalog,
            max_sql_log_length: DEFAULT_SQL_LOG_LENGTH,
        }
    }

    /// Limit SQL text in log events to `len` bytes.
    pub fn max_sql_log_length(mut self, len: usize) -> Self {
        self.max_sql_log_length = len;
        self
    }

    pub fn build(&self, profile: &ContextProfile, id: &EntityId) -> CtxResult<BuiltQuery> {
        let root = self.catalog.entity(&profile.root_entity)?;
        let root_alias = Ident::parse(ROOT_ALIAS)?;
        let root_pk = Ident::parse(&root.primary_key)?;

        let mut scope = AliasScope::default();
        scope.register(root_alias.clone(), root)?;

        let mut joins = Vec::new();
        for path in &profile.include_paths {
            self.plan_include(root, path, &mut scope, &mut joins)?;
        }
        for join in &profile.custom_joins {
            self.plan_custom_join(join, &mut scope, &mut joins)?;
        }

        let columns = select_list(profile, &scope, &root_pk)?;

        let mut sql = String::from("SELECT\n    ");
        sql.push_str(&columns.join(",\n    "));
        sql.push_str("\nFROM ");
        Ident::parse(&root.table)?.write_sql(&mut sql);
        sql.push_str(" AS ");
        root_alias.write_sql(&mut sql);
        for join in &joins {
            sql.push('\n');
            sql.push_str(join);
        }
        sql.push_str("\nWHERE ");
        push_column(&mut sql, &root_alias, &root_pk);
        sql.push_str(" = $1");

        log_sql(&sql, self.max_sql_log_length, &profile.context_name);

        Ok(BuiltQuery {
            sql,
            params: vec![NamedParam {
                name: ID_PROPERTY,
                value: id.clone(),
            }],
        })
    }

    fn plan_include(
        &self,
        root: &'c EntityDef,
        path: &str,
        scope: &mut AliasScope<'c>,
        joins: &mut Vec<String>,
    ) -> CtxResult<()> {
        let segments = path
            .split('.')
            .map(Ident::parse)
            .collect::<CtxResult<Vec<_>>>()?;
        let hops = self.catalog.resolve_include(&root.name, path)?;

        let mut parent = Ident::parse(ROOT_ALIAS)?;
        for (i, hop) in hops.iter().enumerate() {
            let alias = Ident::parse(&include_alias(
                &segments[..=i]
                    .iter()
                    .map(Ident::as_str)
                    .collect::<Vec<_>>()
                    .join("."),
            ))?;

            // shared prefix of an earlier include, e.g. `Items` before `Items.Product`
            if scope.get(alias.as_str()).is_some() {
                parent = alias;
                continue;
            }

            let nav = hop.navigation;
            let fk = Ident::parse(&nav.foreign_key_column)?;
            let pk = Ident::parse(&nav.principal_key_column)?;

            let mut sql = String::from("LEFT JOIN ");
            Ident::parse(&hop.target.table)?.write_sql(&mut sql);
            sql.push_str(" AS ");
            alias.write_sql(&mut sql);
            sql.push_str(" ON ");
            if nav.is_collection {
                push_column(&mut sql, &parent, &pk);
                sql.push_str(" = ");
                push_column(&mut sql, &alias, &fk);
            } else {
                push_column(&mut sql, &parent, &fk);
                sql.push_str(" = ");
                push_column(&mut sql, &alias, &pk);
            }
            joins.push(sql);

            scope.register(alias.clone(), hop.target)?;
            parent = alias;
        }
        Ok(())
    }

    fn plan_custom_join(
        &self,
        join: &CustomJoin,
        scope: &mut AliasScope<'c>,
        joins: &mut Vec<String>,
    ) -> CtxResult<()> {
        let alias = Ident::parse(&join.alias)?;
        let join_type = JoinType::parse(&join.join_type).ok_or_else(|| {
            CtxError::security(format!("Join type not allowed: {}", join.join_type))
        })?;
        let op = CompareOp::parse(&join.condition.operator).ok_or_else(|| {
            CtxError::security(format!("Operator not allowed: {}", join.condition.operator))
        })?;

        let left = FieldPath::parse(&join.condition.left_field);
        let left_segments = left
            .property_segments()
            .into_iter()
            .map(Ident::parse)
            .collect::<CtxResult<Vec<_>>>()?;
        let right_column = Ident::parse(&join.condition.right_field)?;

        let target = self.catalog.entity(&join.target_entity)?;
        let table = Ident::parse(&target.table)?;

        let (left_alias, left_column) = match left_segments.split_last() {
            Some((column, [])) => (Ident::parse(ROOT_ALIAS)?, column.clone()),
            Some((column, prefix)) => {
                let name = prefix
                    .iter()
                    .map(Ident::as_str)
                    .collect::<Vec<_>>()
                    .join("_");
                if scope.get(&name).is_none() {
                    return Err(CtxError::validation(format!(
                        "Join '{}' references unknown alias '{name}' in '{}'",
                        join.alias, join.condition.left_field
                    )));
                }
                (Ident::parse(&name)?, column.clone())
            }
            None => {
                return Err(CtxError::validation(format!(
                    "Join '{}' has an empty left field",
                    join.alias
                )));
            }
        };

        let mut sql = format!("{join_type} JOIN ");
        table.write_sql(&mut sql);
        sql.push_str(" AS ");
        alias.write_sql(&mut sql);
        sql.push_str(" ON ");
        push_column(&mut sql, &left_alias, &left_column);
        sql.push(' ');
        sql.push_str(op.as_str());
        sql.push(' ');
        push_column(&mut sql, &alias, &right_column);
        joins.push(sql);

        scope.register(alias, target)?;

        for nested in &join.nested_joins {
            self.plan_custom_join(nested, scope, joins)?;
        }
        Ok(())
    }
}

fn select_list(
    profile: &ContextProfile,
    scope: &AliasScope<'_>,
    root_pk: &Ident,
) -> CtxResult<Vec<String>> {
    let root_alias = Ident::parse(ROOT_ALIAS)?;
    let mut columns = Vec::with_capacity(profile.allowed_fields.len() + 1);
    columns.push(select_column(
        &root_alias,
        root_pk,
        &Ident::parse(ROOT_ID_COLUMN)?,
    ));

    let mut collections = HashSet::new();
    for field in profile.field_paths() {
        for segment in field.property_segments() {
            Ident::parse(segment)?;
        }
        let column = Ident::parse(field.leaf())?;
        let result_alias = Ident::parse(&field.flat_alias())?;

        let alias = if field.is_root() {
            root_alias.clone()
        } else {
            let name = field
                .alias_candidates()
                .into_iter()
                .find(|candidate| scope.get(candidate).is_some())
                .ok_or_else(|| {
                    CtxError::validation(format!(
                        "Field '{}' does not resolve to an include path or join alias",
                        field.raw()
                    ))
                })?;
            Ident::parse(&name)?
        };

        if field.is_collection() && collections.insert(field.head().to_string()) {
            let head = field.head();
            let entity = scope.get(head).ok_or_else(|| {
                CtxError::validation(format!(
                    "Collection '{head}' in field '{}' is not an include path or join alias",
                    field.raw()
                ))
            })?;
            columns.push(select_column(
                &Ident::parse(head)?,
                &Ident::parse(&entity.primary_key)?,
                &Ident::parse(&collection_id_column(head))?,
            ));
        }

        columns.push(select_column(&alias, &column, &result_alias));
    }
    Ok(columns)
}

/// Aliases registered so far, in registration order.
#[derive(Default)]
struct AliasScope<'c> {
    entries: Vec<(Ident, &'c EntityDef)>,
}

impl<'c> AliasScope<'c> {
    fn register(&mut self, alias: Ident, entity: &'c EntityDef) -> CtxResult<()> {
        if self.get(alias.as_str()).is_some() {
            return Err(CtxError::validation(format!(
                "Alias '{alias}' is registered twice"
            )));
        }
        self.entries.push((alias, entity));
        Ok(())
    }

    fn get(&self, alias: &str) -> Option<&'c EntityDef> {
        self.entries
            .iter()
            .find(|(a, _)| a.as_str() == alias)
            .map(|(_, e)| *e)
    }
}

fn push_column(out: &mut String, alias: &Ident, column: &Ident) {
    alias.write_sql(out);
    out.push('.');
    column.write_sql(out);
}

fn select_column(alias: &Ident, column: &Ident, result_alias: &Ident) -> String {
    let mut out = String::new();
    push_column(&mut out, alias, column);
    out.push_str(" AS ");
    result_alias.write_sql(&mut out);
    out
}

/// Cut `sql` to at most `max_bytes`, respecting char boundaries.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

pub(crate) fn log_sql(sql: &str, max_len: usize, context: &str) {
    let shown = if sql.len() > max_len {
        format!("{}...", truncate_sql_bytes(sql, max_len))
    } else {
        sql.to_string()
    };
    tracing::debug!(target: "pgctx.sql", context, sql = %shown, "generated query");
}
