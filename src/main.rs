use assetbridge::bridge::TransportBridgeServer;
use assetbridge::static_files::StaticAssetServer;
use assetbridge::{config, logger, server};
use std::sync::Arc;

/// Config file used when no path is given on the command line
const DEFAULT_CONFIG: &str = "config";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let cfg = config::Config::load_from(&config_path)?;
    logger::init(&cfg.logging).map_err(|e| e as Box<dyn std::error::Error>)?;

    // Worker count comes from config, the runtime default otherwise
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), Box<dyn std::error::Error>> {
    let assets = StaticAssetServer::new(cfg.static_files.clone())?;

    let mut bridge = TransportBridgeServer::new(cfg.bridge.clone(), Arc::new(assets))?;
    if cfg.logging.access_log {
        bridge = bridge.with_access_log(cfg.logging.access_log_format);
    }

    let listener = bridge.bind()?;
    logger::log_server_start(&listener.local_addr()?, &cfg);

    bridge
        .serve(listener, server::shutdown_signal(), cfg.server.shutdown_grace())
        .await?;
    Ok(())
}
