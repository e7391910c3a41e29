//! Run outcome reporting
//!
//! Counts are kept per (taxonomy, group) in processing order. The report
//! serializes to JSON for `--json` output.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::Taxonomy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub taxonomy: Taxonomy,
    pub group: String,
    pub processed: usize,
    pub skipped: usize,
}

/// A listing that could not be harvested at all
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingFailure {
    pub taxonomy: Taxonomy,
    pub reason: String,
}

/// Why a run stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HaltReport {
    pub table: String,
    pub column: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    pub processed: usize,
    pub skipped: usize,
    pub columns_added: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub groups: Vec<GroupReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_listings: Vec<ListingFailure>,
    pub totals: RunTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halted: Option<HaltReport>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            groups: Vec::new(),
            failed_listings: Vec::new(),
            totals: RunTotals::default(),
            halted: None,
        }
    }

    /// Open a group; later counts go to the most recently opened group.
    pub fn begin_group(&mut self, taxonomy: Taxonomy, group: &str) {
        self.groups.push(GroupReport {
            taxonomy,
            group: group.to_string(),
            processed: 0,
            skipped: 0,
        });
    }

    pub fn record_processed(&mut self) {
        if let Some(current) = self.groups.last_mut() {
            current.processed += 1;
        }
        self.totals.processed += 1;
    }

    pub fn record_skipped(&mut self) {
        if let Some(current) = self.groups.last_mut() {
            current.skipped += 1;
        }
        self.totals.skipped += 1;
    }

    pub fn record_columns_added(&mut self, count: usize) {
        self.totals.columns_added += count;
    }

    pub fn record_listing_failure(&mut self, taxonomy: Taxonomy, reason: impl Into<String>) {
        self.failed_listings.push(ListingFailure {
            taxonomy,
            reason: reason.into(),
        });
    }

    pub fn halt(&mut self, table: &str, column: Option<&str>, message: impl Into<String>) {
        self.halted = Some(HaltReport {
            table: table.to_string(),
            column: column.map(str::to_string),
            message: message.into(),
        });
        self.finish();
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn group(&self, taxonomy: Taxonomy, group: &str) -> Option<&GroupReport> {
        self.groups
            .iter()
            .find(|g| g.taxonomy == taxonomy && g.group == group)
    }

    pub const fn is_halted(&self) -> bool {
        self.halted.is_some()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.groups {
            writeln!(
                f,
                "{:<9} {:<24} processed {:>5}  skipped {:>5}",
                group.taxonomy, group.group, group.processed, group.skipped
            )?;
        }
        for failure in &self.failed_listings {
            writeln!(f, "{} listing not harvested: {}", failure.taxonomy, failure.reason)?;
        }
        write!(
            f,
            "total: {} processed, {} skipped, {} new columns",
            self.totals.processed, self.totals.skipped, self.totals.columns_added
        )?;
        if let Some(halt) = &self.halted {
            write!(f, "\nHALTED on table '{}'", halt.table)?;
            if let Some(column) = &halt.column {
                write!(f, ", column '{column}'")?;
            }
            write!(f, ": {}", halt.message)?;
        }
        Ok(())
    }
}
