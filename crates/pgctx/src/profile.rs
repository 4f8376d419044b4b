//! Context profiles: the named, access-controlled view over one root entity.
//!
//! Profiles are persisted as camelCase JSON (lists and maps as JSON values,
//! custom joins as a recursive array) and are read-only to the rest of the
//! crate.

use crate::path::{FieldPath, is_path_prefix};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A named view: root entity, includes, allowed field paths and custom joins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub context_name: String,
    pub root_entity: String,
    pub include_paths: Vec<String>,
    pub allowed_fields: Vec<String>,
    /// Display labels keyed by field path. No effect on querying or shaping.
    pub labels: BTreeMap<String, String>,
    pub custom_joins: Vec<CustomJoin>,
}

impl ContextProfile {
    pub fn new(context_name: impl Into<String>, root_entity: impl Into<String>) -> Self {
        Self {
            context_name: context_name.into(),
            root_entity: root_entity.into(),
            ..Self::default()
        }
    }

    /// Add an include path.
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.include_paths.push(path.into());
        self
    }

    /// Add an allowed field path.
    pub fn allow(mut self, path: impl Into<String>) -> Self {
        self.allowed_fields.push(path.into());
        self
    }

    /// Add several allowed field paths.
    pub fn allow_all<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_fields.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Attach a display label to a path.
    pub fn label(mut self, path: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(path.into(), label.into());
        self
    }

    /// Add a top-level custom join.
    pub fn join(mut self, join: CustomJoin) -> Self {
        self.custom_joins.push(join);
        self
    }

    pub fn has_custom_joins(&self) -> bool {
        !self.custom_joins.is_empty()
    }

    /// Allowed fields parsed into [`FieldPath`]s, in declaration order.
    pub fn field_paths(&self) -> Vec<FieldPath> {
        self.allowed_fields.iter().map(|f| FieldPath::parse(f)).collect()
    }

    /// Whether a dotted property path (no `[]` markers) is an allowed field.
    pub fn allows(&self, property_path: &str) -> bool {
        self.allowed_fields
            .iter()
            .any(|f| FieldPath::parse(f).normalized() == property_path)
    }

    /// Whether a navigation path lies on some include path.
    ///
    /// `Items` is included by `Items.Product`; `Items.Product` is not included
    /// by `Items` alone.
    pub fn includes(&self, navigation_path: &str) -> bool {
        self.include_paths
            .iter()
            .any(|ip| is_path_prefix(navigation_path, ip))
    }

    /// Structural hash of everything that affects the generated query or shape.
    ///
    /// Labels are excluded. Cache keys include this value so an edited profile
    /// never hits a stale entry.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.root_entity.hash(&mut hasher);
        self.include_paths.hash(&mut hasher);
        self.allowed_fields.hash(&mut hasher);
        self.custom_joins.hash(&mut hasher);
        hasher.finish()
    }
}

/// A caller-defined join, possibly with nested joins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomJoin {
    pub alias: String,
    pub target_entity: String,
    /// Raw join keyword as stored; parsed with [`JoinType::parse`].
    pub join_type: String,
    pub condition: JoinCondition,
    pub nested_joins: Vec<CustomJoin>,
}

impl Default for CustomJoin {
    fn default() -> Self {
        Self {
            alias: String::new(),
            target_entity: String::new(),
            join_type: JoinType::Left.as_str().to_string(),
            condition: JoinCondition::default(),
            nested_joins: Vec::new(),
        }
    }
}

impl CustomJoin {
    pub fn new(alias: impl Into<String>, target_entity: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            target_entity: target_entity.into(),
            ..Self::default()
        }
    }

    /// Set the join condition.
    pub fn on(
        mut self,
        left_field: impl Into<String>,
        operator: impl Into<String>,
        right_field: impl Into<String>,
    ) -> Self {
        self.condition = JoinCondition {
            left_field: left_field.into(),
            right_field: right_field.into(),
            operator: operator.into(),
        };
        self
    }

    /// Set the join keyword (`LEFT`, `INNER`, `RIGHT`).
    pub fn join_type(mut self, join_type: impl Into<String>) -> Self {
        self.join_type = join_type.into();
        self
    }

    /// Add a nested join.
    pub fn nest(mut self, join: CustomJoin) -> Self {
        self.nested_joins.push(join);
        self
    }

    /// Longest root-to-leaf chain; a join without nesting has depth 1.
    pub fn depth(&self) -> usize {
        1 + self
            .nested_joins
            .iter()
            .map(CustomJoin::depth)
            .max()
            .unwrap_or(0)
    }

    /// Number of joins in this tree, this one included.
    pub fn node_count(&self) -> usize {
        1 + count_joins(&self.nested_joins)
    }
}

/// Total join count across a forest of join trees.
pub fn count_joins(joins: &[CustomJoin]) -> usize {
    joins.iter().map(CustomJoin::node_count).sum()
}

/// `leftField <operator> rightField`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinCondition {
    pub left_field: String,
    pub right_field: String,
    pub operator: String,
}

impl Default for JoinCondition {
    fn default() -> Self {
        Self {
            left_field: String::new(),
            right_field: String::new(),
            operator: CompareOp::Eq.as_str().to_string(),
        }
    }
}

/// Allowed join keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Left,
    Inner,
    Right,
}

impl JoinType {
    /// Case-insensitive parse; `None` for anything outside the whitelist.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LEFT" => Some(Self::Left),
            "INNER" => Some(Self::Inner),
            "RIGHT" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Inner => "INNER",
            Self::Right => "RIGHT",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allowed comparison operators for join conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
}

impl CompareOp {
    /// Exact-match parse against the fixed operator list.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Gte),
            "<=" => Some(Self::Lte),
            "LIKE" => Some(Self::Like),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Gte => ">=",
            Self::Lte => "<=",
            Self::Like => "LIKE",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
