//! Application layer module
//!
//! Orchestrates the domain and infrastructure pieces into an ingestion run.

pub mod ingestion_pipeline;
pub mod run_report;

pub use ingestion_pipeline::{EntryError, IngestionPipeline, PipelineError, PipelineSettings, PipelineState};
pub use run_report::{GroupReport, HaltReport, ListingFailure, RunReport, RunTotals};
