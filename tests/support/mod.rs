//! Shared fixtures for pipeline integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use catalog_ingest_lib::application::{IngestionPipeline, PipelineSettings};
use catalog_ingest_lib::infrastructure::config::source_site::{ACCESSORY_LISTING_URL, PRIMARY_LISTING_URL};
use catalog_ingest_lib::infrastructure::config::{AppConfig, RunConfig};
use catalog_ingest_lib::infrastructure::render_agent::page_contains;
use catalog_ingest_lib::infrastructure::{DatabaseConnection, FetchError, RenderAgent, RenderedPage};

pub const SITE: &str = "https://www.digitalkamera.de";

/// Render agent that serves canned markup and records every locator it opens
#[derive(Default)]
pub struct ScriptedAgent {
    pages: HashMap<String, String>,
    current: Option<RenderedPage>,
    pub opened: Vec<String>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, locator: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(locator.into(), html.into());
        self
    }

    pub fn was_opened(&self, locator: &str) -> bool {
        self.opened.iter().any(|l| l == locator)
    }
}

#[async_trait]
impl RenderAgent for ScriptedAgent {
    async fn open(&mut self, locator: &str) -> Result<RenderedPage, FetchError> {
        self.opened.push(locator.to_string());
        let Some(html) = self.pages.get(locator) else {
            self.current = None;
            return Err(FetchError::Timeout {
                locator: locator.to_string(),
                timeout_ms: 10_000,
            });
        };
        let page = RenderedPage::new(locator, html.clone());
        self.current = Some(page.clone());
        Ok(page)
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<RenderedPage, FetchError> {
        let page = self.current.clone().ok_or(FetchError::NoPageOpen)?;
        if page_contains(&page.html, selector)? {
            Ok(page)
        } else {
            Err(FetchError::WaitTimeout {
                locator: page.locator,
                selector: selector.to_string(),
                timeout_ms: timeout.as_millis(),
            })
        }
    }
}

/// A throwaway SQLite file; keep the `TempDir` alive for the test's duration.
pub async fn temp_store() -> Result<(TempDir, DatabaseConnection)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite:{}", dir.path().join("catalog.db").display());
    let database = DatabaseConnection::new(&url).await?;
    Ok((dir, database))
}

pub fn settings(run: RunConfig) -> PipelineSettings {
    let config = AppConfig {
        run,
        ..AppConfig::default()
    };
    PipelineSettings::from(&config)
}

pub fn pipeline(
    agent: ScriptedAgent,
    database: &DatabaseConnection,
    run: RunConfig,
) -> Result<IngestionPipeline<ScriptedAgent>> {
    Ok(IngestionPipeline::new(
        agent,
        database.schema_manager(),
        database.upsert_writer(),
        settings(run),
    )?)
}

pub fn select(groups: &[&str]) -> RunConfig {
    RunConfig {
        selected_groups: groups.iter().map(|g| (*g).to_string()).collect(),
        ..RunConfig::default()
    }
}

pub fn primary_listing_url() -> &'static str {
    PRIMARY_LISTING_URL
}

pub fn accessory_listing_url() -> &'static str {
    ACCESSORY_LISTING_URL
}

/// Primary listing; `groups` pairs a brand with its relative datasheet paths.
pub fn primary_listing(groups: &[(&str, &[&str])]) -> String {
    let mut body = String::new();
    for (brand, paths) in groups {
        body.push_str(&format!("<div class=\"schnellzugriff-hersteller\">{brand}</div>"));
        body.push_str("<div class=\"schnellzugriff-produkt\">");
        for path in *paths {
            body.push_str(&format!("<a href=\"{path}\">{path}</a> "));
        }
        body.push_str("</div>");
    }
    format!("<html><body><div class=\"schnellzugriff-links\">{body}</div></body></html>")
}

/// Accessory listing: each `h3` heading is followed by its link block.
pub fn accessory_listing(groups: &[(&str, &[&str])]) -> String {
    let mut body = String::new();
    for (brand, paths) in groups {
        body.push_str(&format!("<h3>{brand}</h3><div>"));
        for path in *paths {
            body.push_str(&format!("<a href=\"{path}\">{path}</a> "));
        }
        body.push_str("</div>");
    }
    format!("<html><body><div class=\"schnellzugriff-links\">{body}</div></body></html>")
}

/// Primary datasheet: one header row, then legend/value rows.
pub fn primary_datasheet(heading: &str, rows: &[(&str, &str)]) -> String {
    datasheet(&[heading], rows)
}

/// Accessory datasheet: two header rows, the first carrying the identity.
pub fn accessory_datasheet(heading: &str, rows: &[(&str, &str)]) -> String {
    datasheet(&[heading, "Datenblatt"], rows)
}

fn datasheet(headers: &[&str], rows: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for header in headers {
        body.push_str(&format!("<tr><td class=\"colData1\">{header}</td></tr>"));
    }
    for (legend, value) in rows {
        body.push_str(&format!("<tr><td>{legend}</td><td>{value}</td></tr>"));
    }
    format!("<html><body><div class=\"dkDataSheet\"><table>{body}</table></div></body></html>")
}

pub fn site_url(path: &str) -> String {
    format!("{SITE}{path}")
}
