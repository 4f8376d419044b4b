use super::{Shaper, set_path};
use crate::path::{FieldPath, ID_PROPERTY, ROOT_ID_COLUMN, collection_id_column};
use crate::profile::ContextProfile;
use crate::row::FlatRow;
use crate::value::{Scalar, Value};
use std::collections::{BTreeMap, HashMap};

/// Folds flat join rows into one nested object.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatShaper;

impl FlatShaper {
    pub fn new() -> Self {
        Self
    }
}

impl Shaper for FlatShaper {
    type Source = [FlatRow];

    fn shape(&self, rows: &[FlatRow], profile: &ContextProfile) -> Option<Value> {
        shape_rows(rows, profile)
    }
}

/// Collection items under one alias, in first-seen order.
#[derive(Default)]
struct Bucket {
    index: HashMap<String, usize>,
    items: Vec<BTreeMap<String, Value>>,
}

impl Bucket {
    fn item_mut(&mut self, id: &Scalar) -> Option<&mut BTreeMap<String, Value>> {
        let key = id.identity_key()?;
        let idx = *self.index.entry(key).or_insert_with(|| {
            let mut item = BTreeMap::new();
            item.insert(ID_PROPERTY.to_string(), Value::Scalar(id.clone()));
            self.items.push(item);
            self.items.len() - 1
        });
        self.items.get_mut(idx)
    }
}

/// Shape `rows` into one object; `None` when there are no rows.
pub fn shape_rows(rows: &[FlatRow], profile: &ContextProfile) -> Option<Value> {
    if rows.is_empty() {
        return None;
    }

    let fields = profile.field_paths();
    let mut root = BTreeMap::new();
    if let Some(id) = rows.iter().find_map(|r| r.get(ROOT_ID_COLUMN)) {
        root.insert(ID_PROPERTY.to_string(), Value::Scalar(id.clone()));
    }

    // collection alias -> items; Vec keeps alias order stable
    let mut buckets: Vec<(String, Bucket)> = Vec::new();

    for row in rows {
        for field in &fields {
            let Some(value) = row.get(&field.flat_alias()) else {
                continue;
            };

            if field.is_collection() {
                let head = field.head();
                let pos = match buckets.iter().position(|(alias, _)| alias == head) {
                    Some(pos) => pos,
                    None => {
                        buckets.push((head.to_string(), Bucket::default()));
                        buckets.len() - 1
                    }
                };
                let Some(id) = row.get(&collection_id_column(head)) else {
                    continue;
                };
                // the item exists even when all of its allowed fields are NULL
                let Some(item) = buckets[pos].1.item_mut(id) else {
                    continue;
                };
                if !value.is_null() {
                    set_path(item, &field.property_segments()[1..], Value::Scalar(value.clone()));
                }
                continue;
            }

            // NULL leaves are omitted, as the graph shaper does
            if value.is_null() {
                continue;
            }
            let value = Value::Scalar(value.clone());
            if field.is_root() {
                root.insert(field.leaf().to_string(), value);
            } else {
                set_path(&mut root, &field.property_segments(), value);
            }
        }
    }

    for (alias, bucket) in buckets {
        let items = bucket.items.into_iter().map(Value::Object).collect();
        root.insert(alias, Value::List(items));
    }
    Some(Value::Object(root))
}

/// Field paths whose flat column is missing from `row`.
///
/// Rows from the builder always carry every column; this is a diagnostic for
/// hand-written SQL fed to the shaper.
pub fn missing_columns<'p>(row: &FlatRow, fields: &'p [FieldPath]) -> Vec<&'p str> {
    fields
        .iter()
        .filter(|f| !row.contains(&f.flat_alias()))
        .map(FieldPath::raw)
        .collect()
}
