//! The ontology-rosetta server binary.
//!
//! Wires the store, the node client, the ingest loop and the Rosetta HTTP
//! server together according to the chosen run mode: online (default),
//! `--offline`, or `--validate-store`.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use ont_core::Registry;
use ont_indexer::{index_blocks, validate_store, IndexConfig};
use ont_node_client::{NodeClient, RpcNodeClient};
use ont_rosetta::{router, Services};
use ont_store::Store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod args;
mod config;

use args::CliArgs;
use config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "Ontology Rosetta server");
    let cfg = ServerConfig::load(&args.server_config)?;
    let registry = Registry::new(cfg.currencies()?);
    let store = Arc::new(Store::open(&store_path(&args), registry)?);

    if args.validate_store {
        return run_validate_store(&args, &cfg, store).await;
    }
    if args.offline {
        return run_offline(&args, &cfg, store).await;
    }
    run_online(&args, &cfg, store).await
}

fn store_path(args: &CliArgs) -> PathBuf {
    args.data_dir.join(args.network.name()).join("store")
}

fn node_client(args: &CliArgs) -> Result<Arc<dyn NodeClient>> {
    let client = RpcNodeClient::new(
        args.node_rpc.clone(),
        Duration::from_secs(args.node_timeout),
    )
    .map_err(|err| anyhow!("failed to create node client: {err}"))?;
    Ok(Arc::new(client))
}

async fn run_offline(args: &CliArgs, cfg: &ServerConfig, store: Arc<Store>) -> Result<()> {
    let services = Arc::new(Services::new(store, None, args.network.name()));
    serve(cfg.port, services, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_online(args: &CliArgs, cfg: &ServerConfig, store: Arc<Store>) -> Result<()> {
    let node = node_client(args)?;
    let services = Arc::new(Services::new(
        Arc::clone(&store),
        Some(Arc::clone(&node)),
        args.network.name(),
    ));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut indexer = tokio::spawn(index_blocks(
        Arc::clone(&store),
        node,
        IndexConfig {
            wait: cfg.wait_time(),
            exit_early: false,
        },
        cancel_rx,
    ));

    let server = serve(cfg.port, services, async {
        let _ = tokio::signal::ctrl_c().await;
    });
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => result,
        outcome = &mut indexer => {
            let detail = match outcome {
                Ok(Err(err)) => format!("{err}"),
                Ok(Ok(())) => "indexer stopped unexpectedly".to_owned(),
                Err(err) => format!("indexer panicked: {err}"),
            };
            return Err(anyhow!("indexer terminated: {detail}"));
        }
    };

    info!("Shutting down");
    cancel_tx.send(true).ok();
    indexer
        .await
        .context("indexer panicked")?
        .context("indexer failed during shutdown")?;
    result
}

async fn run_validate_store(args: &CliArgs, cfg: &ServerConfig, store: Arc<Store>) -> Result<()> {
    let node = node_client(args)?;
    let (_cancel_tx, cancel_rx) = watch::channel(false);
    info!("Started indexing any missing blocks");
    index_blocks(
        Arc::clone(&store),
        Arc::clone(&node),
        IndexConfig {
            wait: cfg.wait_time(),
            exit_early: true,
        },
        cancel_rx,
    )
    .await
    .context("indexing failed")?;
    info!("Finished indexing blocks");
    validate_store(&store, node.as_ref())
        .await
        .context("store validation failed")?;
    Ok(())
}

async fn serve(
    port: u32,
    services: Arc<Services>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router(services);
    let listener = TcpListener::bind(("0.0.0.0", port as u16))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!(port, "Starting Rosetta server");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Rosetta server failed")
}
