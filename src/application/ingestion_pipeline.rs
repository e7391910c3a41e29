//! Catalog ingestion pipeline
//!
//! One sequential pass per taxonomy: open the listing, harvest grouped entry
//! references, then for every selected group fetch each datasheet, extract and
//! normalize its attributes, grow the table schema, and upsert the record.
//!
//! Entry failures (fetch timeouts, unreadable datasheets, rejected writes) are
//! logged and counted as skipped. A schema failure halts the run.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::run_report::RunReport;
use crate::domain::{CatalogEntryRef, GroupedRefs, NormalizedAttributeSet, ProductIdentity, Taxonomy};
use crate::infrastructure::config::{AppConfig, RunConfig, StoreConfig};
use crate::infrastructure::database_connection::DatabaseConnection;
use crate::infrastructure::parsing::context::{DetailParseContext, ListingParseContext};
use crate::infrastructure::parsing::error::{ExtractionError, SelectorError};
use crate::infrastructure::parsing::spec_extractor::SkipReason;
use crate::infrastructure::parsing::{LinkHarvester, ParsingConfig, SpecExtractor};
use crate::infrastructure::render_agent::{FetchError, RenderAgent};
use crate::infrastructure::schema_manager::{SchemaError, SchemaManager};
use crate::infrastructure::upsert_writer::{StoreError, UpsertWriter};

/// Where the pipeline is in its run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    HarvestingLinks(Taxonomy),
    ProcessingGroup {
        taxonomy: Taxonomy,
        group: String,
    },
    ProcessingEntry {
        taxonomy: Taxonomy,
        group: String,
        index: usize,
    },
    Done,
    /// Stopped by a schema failure
    Halted,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Run halted: {source}")]
    Halted {
        #[source]
        source: SchemaError,
        report: Box<RunReport>,
    },
}

impl PipelineError {
    /// Partial report of the work done before the failure
    pub fn report(&self) -> &RunReport {
        match self {
            Self::Halted { report, .. } => report,
        }
    }
}

/// Why a single entry was not stored
#[derive(Error, Debug)]
pub enum EntryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SchemaError> for EntryError {
    fn from(e: SchemaError) -> Self {
        Self::Store(StoreError::Schema(e))
    }
}

impl EntryError {
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(_) | Self::Extraction(_) => true,
            Self::Store(e) => e.is_recoverable(),
        }
    }
}

/// Settings the pipeline reads during a run
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub site: ParsingConfig,
    pub store: StoreConfig,
    pub run: RunConfig,
    /// Bound on every page load and wait
    pub timeout: Duration,
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            site: config.site.clone(),
            store: config.store.clone(),
            run: config.run.clone(),
            timeout: config.fetch.timeout(),
        }
    }
}

pub struct IngestionPipeline<A: RenderAgent> {
    agent: A,
    schema: SchemaManager,
    writer: UpsertWriter,
    harvester: LinkHarvester,
    extractor: SpecExtractor,
    settings: PipelineSettings,
    state: PipelineState,
}

impl<A: RenderAgent> IngestionPipeline<A> {
    pub fn new(
        agent: A,
        schema: SchemaManager,
        writer: UpsertWriter,
        settings: PipelineSettings,
    ) -> Result<Self, SelectorError> {
        Ok(Self {
            agent,
            schema,
            writer,
            harvester: LinkHarvester::with_config(&settings.site)?,
            extractor: SpecExtractor::with_config(&settings.site.detail)?,
            settings,
            state: PipelineState::Idle,
        })
    }

    /// Pipeline over a store connection, configured from `config`
    pub fn from_config(agent: A, database: &DatabaseConnection, config: &AppConfig) -> Result<Self, SelectorError> {
        Self::new(
            agent,
            database.schema_manager(),
            database.upsert_writer(),
            PipelineSettings::from(config),
        )
    }

    pub const fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Hand the agent back, e.g. to inspect a scripted session after a run.
    pub fn into_agent(self) -> A {
        self.agent
    }

    /// Run every enabled taxonomy to completion.
    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::new();
        let taxonomies = self.settings.run.taxonomies();
        info!(
            "🚀 Starting ingestion: {} (groups: {})",
            taxonomies
                .iter()
                .map(|t| t.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            self.describe_selection()
        );

        for taxonomy in taxonomies {
            if let Err(source) = self.run_taxonomy(taxonomy, &mut report).await {
                self.state = PipelineState::Halted;
                warn!("🛑 {}", source);
                report.halt(source.table(), source.column(), source.to_string());
                return Err(PipelineError::Halted {
                    source,
                    report: Box::new(report),
                });
            }
        }

        self.state = PipelineState::Done;
        report.finish();
        info!(
            "✅ Ingestion finished: {} processed, {} skipped",
            report.totals.processed, report.totals.skipped
        );
        Ok(report)
    }

    async fn run_taxonomy(&mut self, taxonomy: Taxonomy, report: &mut RunReport) -> Result<(), SchemaError> {
        let table = self.settings.store.table(taxonomy).to_string();
        self.schema.ensure_table(&table).await?;

        self.state = PipelineState::HarvestingLinks(taxonomy);
        let refs = self.harvest(taxonomy, report).await;
        info!("Harvested {} {} entries in {} groups", refs.total_refs(), taxonomy, refs.len());
        self.warn_missing_groups(taxonomy, &refs);

        for (group, entries) in refs.iter() {
            if !self.settings.run.is_selected(group) {
                debug!("Skipping unselected group '{}'", group);
                continue;
            }
            self.process_group(taxonomy, &table, group, entries, report).await?;
        }

        self.state = PipelineState::Idle;
        Ok(())
    }

    async fn harvest(&mut self, taxonomy: Taxonomy, report: &mut RunReport) -> GroupedRefs {
        let selectors = self.settings.site.listing(taxonomy);
        match self
            .agent
            .open_and_wait(&selectors.url, &selectors.ready, self.settings.timeout)
            .await
        {
            Ok(page) => {
                let context = ListingParseContext::new(taxonomy, page.locator);
                self.harvester.harvest(&page.html, &context)
            }
            Err(e) => {
                warn!("Could not load {} listing: {}", taxonomy, e);
                report.record_listing_failure(taxonomy, e.to_string());
                GroupedRefs::new()
            }
        }
    }

    async fn process_group(
        &mut self,
        taxonomy: Taxonomy,
        table: &str,
        group: &str,
        entries: &[CatalogEntryRef],
        report: &mut RunReport,
    ) -> Result<(), SchemaError> {
        self.state = PipelineState::ProcessingGroup {
            taxonomy,
            group: group.to_string(),
        };
        report.begin_group(taxonomy, group);
        info!("Processing {} group '{}' ({} entries)", taxonomy, group, entries.len());

        let total = entries.len();
        for (index, entry) in entries.iter().enumerate() {
            self.state = PipelineState::ProcessingEntry {
                taxonomy,
                group: group.to_string(),
                index,
            };

            match self.process_entry(taxonomy, table, entry, report).await {
                Ok(identity) => {
                    info!("[{}/{}] {} {}", index + 1, total, identity.brand, identity.model);
                    report.record_processed();
                }
                Err(EntryError::Store(StoreError::Schema(e))) => return Err(e),
                Err(e) => {
                    warn!("[{}/{}] Skipping {}: {}", index + 1, total, entry.source_ref, e);
                    report.record_skipped();
                }
            }

            self.state = PipelineState::ProcessingGroup {
                taxonomy,
                group: group.to_string(),
            };
        }
        Ok(())
    }

    /// fetch → extract → normalize → grow schema → upsert
    async fn process_entry(
        &mut self,
        taxonomy: Taxonomy,
        table: &str,
        entry: &CatalogEntryRef,
        report: &mut RunReport,
    ) -> Result<ProductIdentity, EntryError> {
        let page = self
            .agent
            .open_and_wait(&entry.source_ref, &self.settings.site.detail.datasheet, self.settings.timeout)
            .await?;

        let context = DetailParseContext::for_entry(taxonomy, entry);
        let extraction = self.extractor.extract(&page.html, &context)?;
        for skip in &extraction.skipped {
            match &skip.reason {
                SkipReason::Malformed(e) => debug!("Row {} of {}: {}", skip.row, entry.source_ref, e),
                reason => debug!("Row {} of {} ignored: {:?}", skip.row, entry.source_ref, reason),
            }
        }

        let attributes = NormalizedAttributeSet::from_raw(&extraction.attributes);
        let added = self
            .schema
            .ensure_columns(table, attributes.non_blank().map(|(column, _)| column))
            .await?;
        // Columns stay in the table even if the write below fails
        report.record_columns_added(added);
        self.writer
            .upsert(table, &extraction.identity.brand, &extraction.identity.model, &attributes)
            .await?;

        Ok(extraction.identity)
    }

    fn warn_missing_groups(&self, taxonomy: Taxonomy, refs: &GroupedRefs) {
        if self.settings.run.all_groups {
            return;
        }
        for selected in &self.settings.run.selected_groups {
            let present = refs
                .group_names()
                .any(|group| group.trim().eq_ignore_ascii_case(selected.trim()));
            if !present {
                warn!("Selected group '{}' is not on the {} listing", selected, taxonomy);
            }
        }
    }

    fn describe_selection(&self) -> String {
        if self.settings.run.all_groups {
            "all".to_string()
        } else if self.settings.run.selected_groups.is_empty() {
            "none".to_string()
        } else {
            self.settings
                .run
                .selected_groups
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}
