use std::sync::Arc;

use anyhow::Context;
use dining_by_friends::{GraphConfig, NeptuneGraph, NewPersonHandler};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .without_time()
        .init();

    let config = GraphConfig::from_env().context("loading Neptune configuration")?;
    let graph = NeptuneGraph::writer(&config);
    info!(endpoint = graph.url(), "new person lambda starting");

    lambda_runtime::run(NewPersonHandler::new(Arc::new(graph)))
        .await
        .map_err(|e| anyhow::anyhow!(e))
}
