//! Domain module - catalog entities and pure transformations
//!
//! Nothing in here performs I/O: entry references, attribute sets, records and
//! the column-name normalizer that ties datasheet legends to storage columns.

pub mod catalog;
pub mod column_normalizer;

pub use catalog::{
    CatalogEntryRef, CatalogRecord, GroupedRefs, NestedTablePolicy, NormalizedAttributeSet,
    ProductIdentity, RawAttributeSet, RawValue, Taxonomy, BRAND_COLUMN, MODEL_COLUMN, is_identity_column,
};
pub use column_normalizer::normalize;
