//! Parsing contexts
//!
//! What a parser needs to know about the page besides its markup.

use crate::domain::{CatalogEntryRef, Taxonomy};

/// Context for a listing page
#[derive(Debug, Clone)]
pub struct ListingParseContext {
    pub taxonomy: Taxonomy,

    /// Listing locator, used to resolve relative links
    pub base_url: String,
}

impl ListingParseContext {
    pub fn new(taxonomy: Taxonomy, base_url: impl Into<String>) -> Self {
        Self {
            taxonomy,
            base_url: base_url.into(),
        }
    }
}

/// Context for a datasheet page
#[derive(Debug, Clone)]
pub struct DetailParseContext {
    pub taxonomy: Taxonomy,

    /// Datasheet locator
    pub url: String,

    /// Listing group; the brand when the heading is a single word
    pub group: String,
}

impl DetailParseContext {
    pub fn new(taxonomy: Taxonomy, url: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            taxonomy,
            url: url.into(),
            group: group.into(),
        }
    }

    pub fn for_entry(taxonomy: Taxonomy, entry: &CatalogEntryRef) -> Self {
        Self::new(taxonomy, entry.source_ref.clone(), entry.group.clone())
    }
}
