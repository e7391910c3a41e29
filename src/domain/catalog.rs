//! Catalog domain types
//!
//! Everything that flows between the harvester, the extractor and the store:
//! entry references, raw and normalized attribute sets, and persisted records.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::column_normalizer::normalize;

/// Identity columns every catalog table carries. Attributes never use these names.
pub const BRAND_COLUMN: &str = "brand";
pub const MODEL_COLUMN: &str = "model";

/// The two listing taxonomies of the source site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Taxonomy {
    /// Primary items (camera bodies)
    Primary,
    /// Accessory items (lenses)
    Accessory,
}

/// How a nested sub-table inside a value cell collapses to one string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedTablePolicy {
    /// Every sub-cell, comma-joined, ignoring sub-row boundaries.
    Flatten,
    /// Sub-row cells joined with a space, then sub-rows comma-joined.
    GroupBySubRow,
}

impl Taxonomy {
    /// Leading datasheet rows that carry identity rather than attributes.
    pub const fn header_rows(self) -> usize {
        match self {
            Self::Primary => 1,
            Self::Accessory => 2,
        }
    }

    /// The two datasheet templates treat nested tables differently; kept as observed.
    pub const fn nested_table_policy(self) -> NestedTablePolicy {
        match self {
            Self::Primary => NestedTablePolicy::Flatten,
            Self::Accessory => NestedTablePolicy::GroupBySubRow,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Accessory => "accessory",
        }
    }
}

impl fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discoverable detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntryRef {
    /// Group (brand) the listing filed this entry under
    pub group: String,
    /// Absolute locator of the detail page
    pub source_ref: String,
}

impl CatalogEntryRef {
    pub fn new(group: impl Into<String>, source_ref: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            source_ref: source_ref.into(),
        }
    }
}

/// Harvest result: group → entry refs, both in the order the listing shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedRefs {
    groups: IndexMap<String, Vec<CatalogEntryRef>>,
}

impl GroupedRefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append refs to a group, creating it at the end if it is new.
    pub fn extend_group(&mut self, group: &str, refs: impl IntoIterator<Item = CatalogEntryRef>) {
        self.groups.entry(group.to_string()).or_default().extend(refs);
    }

    pub fn get(&self, group: &str) -> Option<&[CatalogEntryRef]> {
        self.groups.get(group).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[CatalogEntryRef])> {
        self.groups
            .iter()
            .map(|(group, refs)| (group.as_str(), refs.as_slice()))
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn total_refs(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// A value cell before joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Scalar(String),
    List(Vec<String>),
}

impl RawValue {
    /// Single string form; list parts are comma-joined.
    pub fn joined(&self) -> String {
        match self {
            Self::Scalar(text) => text.clone(),
            Self::List(parts) => parts.join(", "),
        }
    }
}

/// Ordered legend → value pairs from one datasheet. A repeated legend keeps its
/// first position and takes the later value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAttributeSet {
    entries: IndexMap<String, RawValue>,
}

impl RawAttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, label: impl Into<String>, value: RawValue) {
        self.entries.insert(label.into(), value);
    }

    pub fn get(&self, label: &str) -> Option<&RawValue> {
        self.entries.get(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.entries.iter().map(|(label, value)| (label.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Storage-safe column → value mapping for one record.
///
/// Column lookups are ASCII case-insensitive because SQLite identifiers are:
/// `Sensor` and `sensor` would land in the same physical column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedAttributeSet {
    entries: IndexMap<String, String>,
}

impl NormalizedAttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize every legend; drops empty names and the identity columns.
    pub fn from_raw(raw: &RawAttributeSet) -> Self {
        let mut set = Self::new();
        for (label, value) in raw.iter() {
            let column = normalize(label);
            if column.is_empty() {
                tracing::debug!("Dropping attribute with blank column name: {:?}", label);
                continue;
            }
            if is_identity_column(&column) {
                tracing::debug!("Dropping attribute '{}' that shadows an identity column", label);
                continue;
            }
            let value = value.joined();
            if value.trim().is_empty() {
                tracing::debug!("Dropping attribute '{}' with blank value", label);
                continue;
            }
            set.insert(column, value);
        }
        set
    }

    /// Insert or overwrite; an existing column keeps its original spelling and
    /// is not blanked by a later empty value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        let existing = self
            .entries
            .keys()
            .find(|known| known.eq_ignore_ascii_case(&column))
            .cloned();
        match existing {
            Some(known) => {
                if value.trim().is_empty() {
                    // A blank never replaces what an earlier legend supplied
                    return;
                }
                if known != column {
                    tracing::debug!("Column '{}' collides with '{}', keeping the latter name", column, known);
                }
                self.entries.insert(known, value);
            }
            None => {
                self.entries.insert(column, value);
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(column))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(column, value)| (column.as_str(), value.as_str()))
    }

    /// Entries worth writing: blank values never reach the store.
    pub fn non_blank(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(_, value)| !value.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for NormalizedAttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (column, value) in iter {
            set.insert(column, value);
        }
        set
    }
}

pub fn is_identity_column(column: &str) -> bool {
    column.eq_ignore_ascii_case(BRAND_COLUMN) || column.eq_ignore_ascii_case(MODEL_COLUMN)
}

/// Brand and model read from a datasheet's header rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductIdentity {
    pub brand: String,
    pub model: String,
}

impl ProductIdentity {
    /// Split "Nikon Z9" at the first space. A single word is the model and the
    /// brand falls back to the listing group.
    pub fn from_heading(heading: &str, fallback_brand: &str) -> Option<Self> {
        let heading = heading.trim();
        if heading.is_empty() {
            return None;
        }
        match heading.split_once(char::is_whitespace) {
            Some((brand, model)) if !model.trim().is_empty() => Some(Self {
                brand: brand.to_string(),
                model: model.trim().to_string(),
            }),
            _ => Some(Self {
                brand: fallback_brand.trim().to_string(),
                model: heading.to_string(),
            }),
        }
    }
}

/// One persisted product as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogRecord {
    pub brand: Option<String>,
    pub model: String,
    /// Non-null attribute columns
    pub attributes: BTreeMap<String, String>,
}

impl CatalogRecord {
    pub fn attribute(&self, column: &str) -> Option<&str> {
        self.attributes.get(column).map(String::as_str)
    }
}
