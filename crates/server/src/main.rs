//! agorad — run one Agora platform instance.
//!
//! Usage: `agorad [config.toml]`. With no file, configuration comes from
//! defaults plus `AGORA_INSTANCE_ID`. The single-node build runs over the
//! in-process KV store and bus; clustered deployments point the backend
//! traits at shared infrastructure.

use agora_core::Config;
use agora_server::Instance;
use std::process;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("agorad: {e}");
            process::exit(1);
        }
    };

    if config.kv_url.is_some() || config.bus_url.is_some() {
        warn!(
            target: "agora::server",
            "kv_url/bus_url are ignored by the single-node binary; backends are in-process"
        );
    }

    let (instance, _store) = match Instance::in_memory(config) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("agorad: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = instance.start().await {
        eprintln!("agorad: startup failed: {e}");
        process::exit(1);
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!(target: "agora::server", "interrupt received"),
        Err(e) => warn!(target: "agora::server", error = %e, "signal handler failed"),
    }
    instance.shutdown().await;
}

fn load_config() -> agora_core::Result<Config> {
    match std::env::args().nth(1) {
        Some(path) => Config::load(path),
        None => Config::from_toml_str(""),
    }
}
