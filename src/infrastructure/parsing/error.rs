//! Parsing error types
//!
//! Extraction errors are scoped to one datasheet row unless noted otherwise;
//! harvest errors are scoped to one listing page. Neither ever aborts a run.

use scraper::Selector;
use thiserror::Error;

use crate::domain::Taxonomy;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("row {row}: legend '{label}' has no value cell")]
    MissingValueCell { row: usize, label: String },

    #[error("row {row}: no cells")]
    EmptyRow { row: usize },

    /// Page-level: the datasheet table is absent.
    #[error("datasheet not found using selector '{selector}'")]
    MissingDatasheet { selector: String },

    /// Page-level: the header rows yield no brand/model.
    #[error("datasheet header carries no product identity")]
    MissingIdentity,
}

impl ExtractionError {
    /// Row-scoped errors skip a row; the others skip the whole entry.
    pub const fn is_row_scoped(&self) -> bool {
        matches!(self, Self::MissingValueCell { .. } | Self::EmptyRow { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarvestError {
    #[error("{taxonomy} listing: {labels} group labels but {containers} link containers")]
    StructuralMismatch {
        taxonomy: Taxonomy,
        labels: usize,
        containers: usize,
    },

    #[error("{taxonomy} listing: container '{selector}' not found")]
    ContainerMissing { taxonomy: Taxonomy, selector: String },

    #[error("listing URL '{url}' is not absolute: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid CSS selector '{selector}': {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// Compile one configured selector.
pub fn compile_selector(selector: &str) -> Result<Selector, SelectorError> {
    Selector::parse(selector).map_err(|e| SelectorError {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;
pub type HarvestResult<T> = Result<T, HarvestError>;
