//! HTML parsing for listing and datasheet pages
//!
//! Parsers are synchronous and work on markup the render agent already fetched,
//! so no parsed document ever lives across an await point.

pub mod config;
pub mod context;
pub mod dom;
pub mod error;
pub mod link_harvester;
pub mod spec_extractor;

pub use config::{DetailSelectors, ListingSelectors, ParsingConfig};
pub use context::{DetailParseContext, ListingParseContext};
pub use error::{ExtractionError, HarvestError, SelectorError};
pub use link_harvester::LinkHarvester;
pub use spec_extractor::{DetailExtraction, RowOutcome, RowSkip, SkipReason, SpecExtractor};

use scraper::Html;

/// Parser trait with context support
pub trait ContextualParser {
    type Output;
    type Context;
    type Error;

    /// Parse an already-built document with contextual information
    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> Result<Self::Output, Self::Error>;
}
