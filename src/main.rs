use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;

use catalog_ingest_lib::application::{IngestionPipeline, RunReport};
use catalog_ingest_lib::cli::Cli;
use catalog_ingest_lib::infrastructure::{DatabaseConnection, HttpRenderAgent, init_logging_with_config};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode> {
    let config = cli.resolve_config().context("Failed to resolve configuration")?;
    init_logging_with_config(&config.logging)?;

    let database = DatabaseConnection::new(&config.store.database_url).await?;
    let agent = HttpRenderAgent::new(&config.fetch)?;
    let mut pipeline = IngestionPipeline::from_config(agent, &database, &config)?;

    let outcome = pipeline.run().await;
    database.close().await;

    match outcome {
        Ok(report) => {
            print_report(&report, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{}", e);
            print_report(e.report(), cli.json)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
