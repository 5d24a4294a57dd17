//! corens application library

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use corens_api::AppState;
use corens_core::AppConfig;
use corens_registration::WorkflowEvent;
use corens_session::FileMarker;
use evm_client::{ContractBackend, Eip1193Wallet, EthersBackend, WalletProvider};

/// Environment variable naming the config file
const CONFIG_ENV: &str = "CORENS_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "corens.toml";

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Run the registry client until interrupted
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("corens=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    tracing::info!("Starting corens");

    let path = config_path();
    let config = AppConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.validate().context("invalid configuration")?;
    tracing::info!(
        "Registry {:?} / registrar {:?} on {} (chain {})",
        config.chain.registry,
        config.chain.registrar,
        config.chain.name,
        config.chain.chain_id
    );

    let provider: Option<Arc<dyn WalletProvider>> = match Eip1193Wallet::from_config(&config.wallet)? {
        Some(wallet) => Some(Arc::new(wallet)),
        None => {
            tracing::warn!("No wallet endpoint configured; registration is unavailable");
            None
        }
    };

    let public: Option<Arc<dyn ContractBackend>> =
        match EthersBackend::connect_http(&config.chain.rpc_url) {
            Ok(backend) => Some(Arc::new(backend)),
            Err(e) => {
                tracing::warn!("Public RPC unavailable: {}", e);
                None
            }
        };

    let marker = Arc::new(FileMarker::new(&config.wallet.state_dir));
    let port = config.api_port;
    let state = AppState::new(config, provider, public, marker)?;

    if let Some(snapshot) = state.session().restore().await {
        tracing::info!("Reconnected wallet {:?}", snapshot.address);
    }

    let mut events = state.workflow().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                WorkflowEvent::Registered { name, tx_hash } => {
                    tracing::info!("{} registered ({:?}); opening /domains/{}", name, tx_hash, name);
                }
            }
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    corens_api::start_server(state.clone(), port, shutdown).await?;

    state.session().shutdown();
    tracing::info!("corens stopped");
    Ok(())
}
