//! Selector configuration for listing and datasheet pages
//!
//! Defaults follow the source site's current templates. Everything is
//! overridable from the config file.

use serde::{Deserialize, Serialize};

use super::error::{SelectorError, compile_selector};
use crate::domain::Taxonomy;
use crate::infrastructure::config::source_site;

/// Main parsing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Primary item quick-access listing
    pub primary_listing: ListingSelectors,

    /// Accessory quick-access listing
    pub accessory_listing: ListingSelectors,

    /// Datasheet (detail page) layout, shared by both taxonomies
    pub detail: DetailSelectors,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            primary_listing: ListingSelectors::primary(),
            accessory_listing: ListingSelectors::accessory(),
            detail: DetailSelectors::default(),
        }
    }
}

impl ParsingConfig {
    pub const fn listing(&self, taxonomy: Taxonomy) -> &ListingSelectors {
        match taxonomy {
            Taxonomy::Primary => &self.primary_listing,
            Taxonomy::Accessory => &self.accessory_listing,
        }
    }

    /// Compile every selector once so a typo fails at startup, not mid-run.
    pub fn validate(&self) -> Result<(), SelectorError> {
        for listing in [&self.primary_listing, &self.accessory_listing] {
            listing.validate()?;
        }
        self.detail.validate()
    }
}

/// CSS selectors for a listing page.
///
/// Group labels and link containers are selected inside `container` as two
/// parallel sequences; the n-th label names the n-th container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// Listing page locator
    pub url: String,

    /// Element whose presence means the listing has rendered
    pub ready: String,

    /// Element holding all groups
    pub container: String,

    /// Group (brand) name nodes
    pub group_label: String,

    /// Per-group link container nodes
    pub group_links: String,

    /// Links inside a group container
    pub link: String,
}

impl ListingSelectors {
    pub fn primary() -> Self {
        Self {
            url: source_site::PRIMARY_LISTING_URL.to_string(),
            ready: ".schnellzugriff-links".to_string(),
            container: ".schnellzugriff-links".to_string(),
            group_label: ".schnellzugriff-hersteller".to_string(),
            group_links: ".schnellzugriff-produkt".to_string(),
            link: "a[href]".to_string(),
        }
    }

    /// The accessory template pairs each heading with the block after it.
    pub fn accessory() -> Self {
        Self {
            url: source_site::ACCESSORY_LISTING_URL.to_string(),
            ready: ".schnellzugriff-links".to_string(),
            container: ".schnellzugriff-links".to_string(),
            group_label: "h3".to_string(),
            group_links: "h3 + div".to_string(),
            link: "a[href]".to_string(),
        }
    }

    fn validate(&self) -> Result<(), SelectorError> {
        for selector in [&self.ready, &self.container, &self.group_label, &self.group_links, &self.link] {
            compile_selector(selector)?;
        }
        Ok(())
    }
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self::primary()
    }
}

/// CSS selectors for a datasheet page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailSelectors {
    /// Datasheet table; also the wait-for condition
    pub datasheet: String,

    /// Cell in the first header row holding "Brand Model"
    pub identity_cell: String,
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            datasheet: ".dkDataSheet".to_string(),
            identity_cell: ".colData1".to_string(),
        }
    }
}

impl DetailSelectors {
    fn validate(&self) -> Result<(), SelectorError> {
        compile_selector(&self.datasheet)?;
        compile_selector(&self.identity_cell)?;
        Ok(())
    }
}
