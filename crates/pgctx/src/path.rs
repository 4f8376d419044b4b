//! Field-path vocabulary shared by the query builder and both shapers.
//!
//! An allowed field is a dotted path:
//! - `Number`: a root scalar
//! - `Customer.Name`: a property reached through an include or custom join
//! - `Items[].Description`: a property of each item of a collection
//!
//! The flat column alias of a path is the path with `[]` removed and `.`
//! replaced by `_` (`Items[].Description` → `Items_Description`). The builder
//! selects under that alias and the flat shaper reads it back, so both must use
//! [`FieldPath::flat_alias`].

/// Alias of the root table in generated SQL.
pub const ROOT_ALIAS: &str = "root";

/// Result column always carrying the root identifier.
pub const ROOT_ID_COLUMN: &str = "root_Id";

/// Property name the identifier is exposed under in shaped objects.
pub const ID_PROPERTY: &str = "Id";

const COLLECTION_MARKER: &str = "[]";

/// A parsed allowed-field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            segments: raw.split('.').map(str::to_string).collect(),
        }
    }

    /// The path as written in the profile.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Segments as written, `[]` markers included.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Single-segment path addressing a root scalar.
    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// First segment carries the `[]` collection marker.
    pub fn is_collection(&self) -> bool {
        self.segments.len() > 1 && self.segments[0].ends_with(COLLECTION_MARKER)
    }

    /// First segment with any collection marker removed.
    pub fn head(&self) -> &str {
        strip_collection(&self.segments[0])
    }

    /// Final segment: the column / property name.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Segments with collection markers removed.
    pub fn property_segments(&self) -> Vec<&str> {
        self.segments.iter().map(|s| strip_collection(s)).collect()
    }

    /// Column alias used in the SELECT list and read back from flat rows.
    pub fn flat_alias(&self) -> String {
        flat_alias(&self.raw)
    }

    /// Dotted property path without collection markers (`Items.Description`).
    ///
    /// This is the form the graph shaper builds while walking an object.
    pub fn normalized(&self) -> String {
        self.property_segments().join(".")
    }

    /// Candidate join aliases for the path's prefix, longest first.
    ///
    /// `Items[].Product.Name` yields `Items_Product` then `Items`.
    pub fn alias_candidates(&self) -> Vec<String> {
        let props = self.property_segments();
        let prefix_len = props.len().saturating_sub(1);
        (1..=prefix_len)
            .rev()
            .map(|n| props[..n].join("_"))
            .collect()
    }
}

/// Flat column alias for a raw path.
pub fn flat_alias(raw: &str) -> String {
    raw.split('.')
        .collect::<Vec<_>>()
        .join("_")
        .replace(COLLECTION_MARKER, "")
}

/// Join alias for an include path (`Items.Product` → `Items_Product`).
pub fn include_alias(path: &str) -> String {
    path.replace('.', "_")
}

/// Synthetic column carrying a collection item's identifier.
pub fn collection_id_column(alias: &str) -> String {
    format!("{alias}_{ID_PROPERTY}")
}

/// Remove trailing collection markers from a segment.
pub fn strip_collection(segment: &str) -> &str {
    segment.trim_end_matches(['[', ']'])
}

/// Append a property name to a dotted prefix.
pub fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Whether `prefix` is a segment-wise prefix of `path` (or equal to it).
pub fn is_path_prefix(prefix: &str, path: &str) -> bool {
    let mut full = path.split('.');
    prefix.split('.').all(|seg| full.next() == Some(seg))
}

/// Whether one dotted path is a segment-wise prefix of the other.
///
/// `Items` overlaps `Items.Product` (either argument order); `Item` does not
/// overlap `Items`.
pub fn paths_overlap(a: &str, b: &str) -> bool {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (Some(l), Some(r)) if l == r => continue,
            (Some(_), Some(_)) => return false,
            _ => return true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_alias_strips_markers_and_dots() {
        assert_eq!(flat_alias("Number"), "Number");
        assert_eq!(flat_alias("Items[].Description"), "Items_Description");
        assert_eq!(flat_alias("Customer.Address.City"), "Customer_Address_City");
    }

    #[test]
    fn classifies_paths() {
        let root = FieldPath::parse("Number");
        assert!(root.is_root());
        assert!(!root.is_collection());

        let item = FieldPath::parse("Items[].Quantity");
        assert!(item.is_collection());
        assert_eq!(item.head(), "Items");
        assert_eq!(item.leaf(), "Quantity");
        assert_eq!(item.normalized(), "Items.Quantity");

        let nested = FieldPath::parse("Customer.Name");
        assert!(!nested.is_root());
        assert!(!nested.is_collection());
    }

    #[test]
    fn alias_candidates_longest_first() {
        let p = FieldPath::parse("Items[].Product.Name");
        assert_eq!(p.alias_candidates(), vec!["Items_Product", "Items"]);
        assert!(FieldPath::parse("Number").alias_candidates().is_empty());
    }

    #[test]
    fn overlap_is_segment_wise() {
        assert!(paths_overlap("Items", "Items.Product"));
        assert!(paths_overlap("Items.Product", "Items"));
        assert!(paths_overlap("Items", "Items"));
        assert!(!paths_overlap("Item", "Items"));
        assert!(!paths_overlap("Customer", "Items"));
    }

    #[test]
    fn prefix_is_directional() {
        assert!(is_path_prefix("Items", "Items.Product"));
        assert!(!is_path_prefix("Items.Product", "Items"));
        assert!(!is_path_prefix("Item", "Items"));
    }

    #[test]
    fn join_path_handles_empty_prefix() {
        assert_eq!(join_path("", "Number"), "Number");
        assert_eq!(join_path("Items", "Quantity"), "Items.Quantity");
    }
}
