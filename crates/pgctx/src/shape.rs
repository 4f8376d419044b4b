//! Result shaping: flat rows or a loaded entity graph into one [`Value`] tree.
//!
//! Two backends implement [`Shaper`]:
//! - [`FlatShaper`] folds the fan-out rows of a built query back into objects,
//!   deduplicating collection items by their `<alias>_Id` column.
//! - [`GraphShaper`] prunes an eagerly loaded [`EntityNode`](crate::graph::EntityNode)
//!   tree down to the profile's include paths and allowed fields.
//!
//! Both read field paths through [`FieldPath`](crate::path::FieldPath) and emit
//! `Id` on the root object and on every collection item, so for the same
//! underlying data they produce the same tree.

mod flat;
mod graph;


pub use flat::{FlatShaper, missing_columns, shape_rows};
pub use graph::GraphShaper;

use crate::profile::ContextProfile;
use crate::value::Value;
use std::collections::BTreeMap;

/// A shaping backend.
pub trait Shaper {
    type Source: ?Sized;

    /// Shape `source` for `profile`; `None` when there is nothing to shape.
    fn shape(&self, source: &Self::Source, profile: &ContextProfile) -> Option<Value>;
}

/// Set `value` at `segments` below `object`, creating intermediate objects.
///
/// An intermediate slot holding a non-object is replaced by an object.
fn set_path(object: &mut BTreeMap<String, Value>, segments: &[&str], value: Value) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let mut current = object;
    for segment in parents {
        let slot = current
            .entry((*segment).to_string())
            .or_insert_with(Value::object);
        if !matches!(slot, Value::Object(_)) {
            *slot = Value::object();
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }
    current.insert((*leaf).to_string(), value);
}
