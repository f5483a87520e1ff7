use anyhow::Context;
use clap::Parser;

use pickflow_core::BatchId;
use pickflow_infra::{AppConfig, BatchQuery, JsonRpcStore};

mod args;
mod commands;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    pickflow_observability::init_with(cli.log_format, "info");

    let config = AppConfig::from_env().context("loading configuration")?;
    let store = JsonRpcStore::new(config.require_store()?.clone());

    let output = match cli.command {
        Commands::Report {
            date,
            state,
            limit,
            max_in_flight,
        } => {
            let query = BatchQuery {
                state,
                scheduled_on: date,
                limit,
            };
            let max_in_flight = max_in_flight.unwrap_or(config.max_in_flight);
            let reports = commands::report(store, &query, max_in_flight)
                .await
                .context("building batch report")?;
            tracing::info!(batches = reports.len(), "report ready");
            serde_json::to_string_pretty(&reports)?
        }
        Commands::Zones { batch, all } => {
            let overview = commands::zones(store, BatchId::new(batch), config.picking, all)
                .await
                .with_context(|| format!("loading zones of batch {batch}"))?;
            serde_json::to_string_pretty(&overview)?
        }
    };

    println!("{output}");
    Ok(())
}
