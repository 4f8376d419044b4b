use super::{EntityDef, SchemaCatalog};
use crate::error::CtxResult;
use crate::path::{FieldPath, join_path};
use crate::profile::ContextProfile;
use serde::Serialize;

/// Navigation hops below the root that discovery descends into.
pub const MAX_FIELD_TREE_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Scalar,
    Navigation,
    Collection,
}

/// One entry of a profile's field tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldNode {
    pub name: String,
    pub path: String,
    pub label: String,
    pub kind: FieldKind,
    #[serde(rename = "type")]
    pub type_name: String,
    pub is_nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_entity: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldNode>,
}

/// The fields a profile exposes, as a tree for template authoring tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTree {
    pub context: String,
    pub root_entity: String,
    pub fields: Vec<FieldNode>,
}

impl FieldTree {
    /// Depth-first list of every node path.
    pub fn paths(&self) -> Vec<&str> {
        fn walk<'a>(nodes: &'a [FieldNode], out: &mut Vec<&'a str>) {
            for node in nodes {
                out.push(&node.path);
                walk(&node.fields, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.fields, &mut out);
        out
    }
}

impl SchemaCatalog {
    /// Discover the allowed fields and included navigations of a profile.
    pub fn field_tree(&self, profile: &ContextProfile) -> CtxResult<FieldTree> {
        let root = self.entity(&profile.root_entity)?;
        Ok(FieldTree {
            context: profile.context_name.clone(),
            root_entity: profile.root_entity.clone(),
            fields: self.fields_below(root, profile, "", 0)?,
        })
    }

    fn fields_below(
        &self,
        entity: &EntityDef,
        profile: &ContextProfile,
        prefix: &str,
        depth: usize,
    ) -> CtxResult<Vec<FieldNode>> {
        if depth > MAX_FIELD_TREE_DEPTH {
            return Ok(Vec::new());
        }

        let mut fields = Vec::new();

        for column in &entity.columns {
            let path = join_path(prefix, &column.name);
            if !profile.allows(&path) {
                continue;
            }
            fields.push(FieldNode {
                label: label_for(profile, &path, &column.name),
                name: column.name.clone(),
                path,
                kind: FieldKind::Scalar,
                type_name: column.ty.type_name().to_string(),
                is_nullable: column.nullable,
                target_entity: None,
                fields: Vec::new(),
            });
        }

        for navigation in &entity.navigations {
            let path = join_path(prefix, &navigation.name);
            if !profile.includes(&path) {
                continue;
            }
            let target = self.entity(&navigation.target_entity)?;
            let (kind, type_name) = if navigation.is_collection {
                (FieldKind::Collection, "Collection")
            } else {
                (FieldKind::Navigation, "Navigation")
            };
            fields.push(FieldNode {
                label: label_for(profile, &path, &navigation.name),
                name: navigation.name.clone(),
                fields: self.fields_below(target, profile, &path, depth + 1)?,
                path,
                kind,
                type_name: type_name.to_string(),
                is_nullable: !navigation.is_collection,
                target_entity: Some(target.name.clone()),
            });
        }

        Ok(fields)
    }
}

/// Label for a property path; labels may be keyed with or without `[]` markers.
fn label_for(profile: &ContextProfile, path: &str, default: &str) -> String {
    if let Some(label) = profile.labels.get(path) {
        return label.clone();
    }
    profile
        .labels
        .iter()
        .find(|(key, _)| FieldPath::parse(key).normalized() == path)
        .map(|(_, label)| label.clone())
        .unwrap_or_else(|| default.to_string())
}
