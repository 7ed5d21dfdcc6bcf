//! rpcline: serves the built-in method sets over TCP until interrupted.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use rpcline::cli::Cli;
use rpcline::config::ServerConfig;
use rpcline::error::ServerError;
use rpcline::rpc::{bind, Calculator, Diagnostics, Server, DIAGNOSTICS_PREFIX};
use rpcline::telemetry;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let mut config = ServerConfig::from_env();
    cli.apply(&mut config);
    if let Some(reason) = config.validate() {
        return Err(ServerError::invalid_config(reason).into());
    }

    telemetry::initialise(&config).context("failed to initialise logging")?;

    let server = Server::new(&config);
    let calculators = server.register_handlers(Arc::new(Calculator::new()), &cli.prefix)?;
    let diagnostics = server.register_static::<Diagnostics>(DIAGNOSTICS_PREFIX)?;
    info!(
        methods = calculators + diagnostics,
        encoding = %config.encoding,
        "handlers registered"
    );

    let listener = bind(&config.listen).await?;
    let serving = tokio::spawn({
        let server = server.clone();
        async move { server.serve(listener).await }
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("interrupt received, shutting down");
    server.stop();

    serving.await.context("accept loop panicked")??;
    Ok(())
}
