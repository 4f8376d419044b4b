use super::Shaper;
use crate::graph::{EntityNode, MAX_GRAPH_DEPTH, Related};
use crate::path::{ID_PROPERTY, is_path_prefix, join_path, paths_overlap};
use crate::profile::ContextProfile;
use crate::value::Value;
use std::collections::BTreeMap;

/// Prunes a loaded entity graph to a profile's allowed fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphShaper;

impl GraphShaper {
    pub fn new() -> Self {
        Self
    }
}

impl Shaper for GraphShaper {
    type Source = EntityNode;

    fn shape(&self, root: &EntityNode, profile: &ContextProfile) -> Option<Value> {
        let walk = Walk {
            profile,
            allowed: profile
                .field_paths()
                .iter()
                .map(|f| f.normalized())
                .collect(),
        };
        Some(Value::Object(walk.node(root, "", 0, true)))
    }
}

struct Walk<'p> {
    profile: &'p ContextProfile,
    /// Allowed fields as dotted property paths.
    allowed: Vec<String>,
}

impl Walk<'_> {
    fn node(
        &self,
        node: &EntityNode,
        prefix: &str,
        depth: usize,
        with_id: bool,
    ) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        if with_id && !node.id.is_null() {
            out.insert(ID_PROPERTY.to_string(), Value::Scalar(node.id.clone()));
        }

        for (name, value) in node.fields.columns() {
            let path = join_path(prefix, name);
            if !value.is_null() && self.allowed.contains(&path) {
                out.insert(name.to_string(), Value::Scalar(value.clone()));
            }
        }

        if depth >= MAX_GRAPH_DEPTH {
            return out;
        }

        for (name, related) in &node.navigations {
            let path = join_path(prefix, name);
            if !self.follows(&path) {
                continue;
            }
            match related {
                Related::One(Some(child)) => {
                    // an object whose allowed leaves are all NULL is omitted, like a NULL leaf
                    let child = self.node(child, &path, depth + 1, false);
                    if !child.is_empty() {
                        out.insert(name.clone(), Value::Object(child));
                    }
                }
                Related::One(None) => {}
                Related::Many(children) => {
                    let items = children
                        .iter()
                        .map(|c| Value::Object(self.node(c, &path, depth + 1, true)))
                        .collect();
                    out.insert(name.clone(), Value::List(items));
                }
            }
        }
        out
    }

    /// Descend when the path overlaps an include path and some allowed field
    /// lies below it.
    fn follows(&self, path: &str) -> bool {
        self.profile
            .include_paths
            .iter()
            .any(|ip| paths_overlap(path, ip))
            && self
                .allowed
                .iter()
                .any(|f| f != path && is_path_prefix(path, f))
    }
}
