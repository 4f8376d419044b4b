//! Structural validation of custom join trees and whole profiles.
//!
//! Validation never stops at the first problem: every rule is evaluated and all
//! messages are returned together, so an admin surface can show a complete list
//! before a profile edit is ever used to build a query. Nothing here touches the
//! database or generates SQL.

#[cfg(test)]
mod tests;

use crate::catalog::SchemaCatalog;
use crate::error::{CtxError, CtxResult};
use crate::ident::is_safe_ident;
use crate::path::{FieldPath, ROOT_ALIAS, include_alias};
use crate::profile::{CompareOp, ContextProfile, CustomJoin, JoinType, count_joins};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Maximum nesting depth of a join tree (a top-level join alone is depth 1).
pub const MAX_JOIN_DEPTH: usize = 3;

/// Maximum number of custom joins in one profile, nested ones included.
pub const MAX_JOINS_PER_CONTEXT: usize = 10;

/// Complexity limits applied to custom joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinLimits {
    pub max_depth: usize,
    pub max_joins: usize,
}

impl Default for JoinLimits {
    fn default() -> Self {
        Self {
            max_depth: MAX_JOIN_DEPTH,
            max_joins: MAX_JOINS_PER_CONTEXT,
        }
    }
}

/// Accumulated validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new(errors: Vec<String>) -> Self {
        Self { errors }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    /// Turn a failed result into [`CtxError::InvalidJoins`] for use as a gate.
    pub fn into_result(self) -> CtxResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CtxError::InvalidJoins(self.errors))
        }
    }
}

/// Aliases already in scope before any custom join is considered.
#[derive(Debug, Clone)]
pub struct SchemaContext {
    reserved_aliases: Vec<String>,
}

impl Default for SchemaContext {
    fn default() -> Self {
        Self {
            reserved_aliases: vec![ROOT_ALIAS.to_string()],
        }
    }
}

impl SchemaContext {
    /// Only `root` is reserved.
    pub fn new() -> Self {
        Self::default()
    }

    /// `root` plus the alias of every include path of `profile`.
    pub fn for_profile(profile: &ContextProfile) -> Self {
        let mut ctx = Self::default();
        for path in &profile.include_paths {
            ctx = ctx.with_alias(include_alias(path));
        }
        ctx
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.reserved_aliases.push(alias.into());
        self
    }

    pub fn reserved_aliases(&self) -> &[String] {
        &self.reserved_aliases
    }
}

/// Validates custom join trees against naming, security and complexity rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinValidator {
    limits: JoinLimits,
}

impl JoinValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: JoinLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> JoinLimits {
        self.limits
    }

    /// Validate one join tree.
    pub fn validate(&self, join: &CustomJoin, ctx: &SchemaContext) -> ValidationResult {
        let mut errors = Vec::new();
        self.check_tree(join, &mut errors);
        check_alias_collisions(std::slice::from_ref(join), ctx, &mut errors);
        ValidationResult::new(errors)
    }

    /// Validate every join tree of a profile plus the profile-wide join count.
    pub fn validate_all(&self, joins: &[CustomJoin], ctx: &SchemaContext) -> ValidationResult {
        let mut errors = Vec::new();

        let total = count_joins(joins);
        if total > self.limits.max_joins {
            errors.push(format!(
                "Total joins ({total}) exceeds maximum of {}",
                self.limits.max_joins
            ));
        }

        for join in joins {
            self.check_tree(join, &mut errors);
        }
        check_alias_collisions(joins, ctx, &mut errors);

        ValidationResult::new(errors)
    }

    /// Node rules for the whole tree; depth is reported once, at the top.
    fn check_tree(&self, join: &CustomJoin, errors: &mut Vec<String>) {
        check_node(join, errors);

        let depth = join.depth();
        if depth > self.limits.max_depth {
            errors.push(format!(
                "Join depth {depth} exceeds maximum of {}",
                self.limits.max_depth
            ));
        }

        for nested in &join.nested_joins {
            check_nested(nested, errors);
        }
    }
}

fn check_nested(join: &CustomJoin, errors: &mut Vec<String>) {
    check_node(join, errors);
    for nested in &join.nested_joins {
        check_nested(nested, errors);
    }
}

fn check_node(join: &CustomJoin, errors: &mut Vec<String>) {
    if !is_safe_ident(&join.alias) {
        errors.push(format!(
            "Invalid alias '{}'. Use only letters, numbers, and underscores.",
            join.alias
        ));
    }

    if JoinType::parse(&join.join_type).is_none() {
        errors.push(format!(
            "Invalid join type '{}'. Use LEFT, INNER, or RIGHT.",
            join.join_type
        ));
    }

    if CompareOp::parse(&join.condition.operator).is_none() {
        errors.push(format!("Invalid operator '{}'", join.condition.operator));
    }
}

/// Aliases must be unique across the profile and distinct from reserved ones.
fn check_alias_collisions(joins: &[CustomJoin], ctx: &SchemaContext, errors: &mut Vec<String>) {
    fn walk<'a>(
        join: &'a CustomJoin,
        reserved: &HashSet<&str>,
        seen: &mut HashSet<&'a str>,
        errors: &mut Vec<String>,
    ) {
        let alias = join.alias.as_str();
        if reserved.contains(alias) {
            errors.push(format!(
                "Join alias '{alias}' collides with the root or an include path alias"
            ));
        } else if !seen.insert(alias) {
            errors.push(format!("Duplicate join alias '{alias}'"));
        }
        for nested in &join.nested_joins {
            walk(nested, reserved, seen, errors);
        }
    }

    let reserved: HashSet<&str> = ctx.reserved_aliases.iter().map(String::as_str).collect();
    let mut seen = HashSet::new();
    for join in joins {
        walk(join, &reserved, &mut seen, errors);
    }
}

/// Check the profile invariant: every include path and allowed field resolves.
///
/// Custom joins are validated with `validator`, and their target entities must
/// exist in the catalog.
pub fn validate_profile(
    profile: &ContextProfile,
    catalog: &SchemaCatalog,
    validator: &JoinValidator,
) -> ValidationResult {
    let mut result = ValidationResult::default();

    let Ok(root) = catalog.entity(&profile.root_entity) else {
        result.errors.push(format!(
            "Root entity '{}' is not registered",
            profile.root_entity
        ));
        return result;
    };

    // alias -> entity, for resolving field prefixes.
    let mut scopes: HashMap<String, &str> = HashMap::new();

    for path in &profile.include_paths {
        match catalog.resolve_include(&root.name, path) {
            Ok(hops) => {
                let segments: Vec<&str> = path.split('.').collect();
                for (i, hop) in hops.iter().enumerate() {
                    scopes.insert(segments[..=i].join("_"), hop.target.name.as_str());
                }
            }
            Err(err) => result
                .errors
                .push(format!("Include path '{path}' cannot be resolved: {err}")),
        }
    }

    fn collect_join_scopes<'a>(
        joins: &'a [CustomJoin],
        catalog: &SchemaCatalog,
        scopes: &mut HashMap<String, &'a str>,
        errors: &mut Vec<String>,
    ) {
        for join in joins {
            if catalog.contains(&join.target_entity) {
                scopes.insert(join.alias.clone(), join.target_entity.as_str());
            } else {
                errors.push(format!(
                    "Join '{}' targets unknown entity '{}'",
                    join.alias, join.target_entity
                ));
            }
            collect_join_scopes(&join.nested_joins, catalog, scopes, errors);
        }
    }
    collect_join_scopes(
        &profile.custom_joins,
        catalog,
        &mut scopes,
        &mut result.errors,
    );

    for field in profile.field_paths() {
        let entity = if field.is_root() {
            Some(root)
        } else {
            field
                .alias_candidates()
                .iter()
                .find_map(|alias| scopes.get(alias))
                .and_then(|name| catalog.entity(name).ok())
        };
        let resolved = entity.is_some_and(|e| e.has_column(field.leaf()));
        if !resolved {
            result.errors.push(unresolved_field(&field));
        }
    }

    result.merge(validator.validate_all(&profile.custom_joins, &SchemaContext::for_profile(profile)));
    result
}

fn unresolved_field(field: &FieldPath) -> String {
    format!("Allowed field '{}' cannot be resolved", field.raw())
}
