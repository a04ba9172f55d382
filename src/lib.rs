pub mod cli;
pub mod core;
pub mod poller;
pub mod providers;
pub mod state;
pub mod store;
pub mod valuation;

use crate::core::config::AppConfig;
use crate::core::{Holding, InstrumentCode, Store};
use crate::state::{AppState, STATE_COLLECTION};
use crate::store::KeyValueStore;
use crate::valuation::ValuationService;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Quote {
        codes: Vec<InstrumentCode>,
    },
    Indices,
    Watch {
        codes: Vec<InstrumentCode>,
        interval: Option<u64>,
        updates: Option<usize>,
    },
    FavoritesList,
    FavoritesAdd {
        code: InstrumentCode,
    },
    FavoritesRemove {
        code: InstrumentCode,
    },
    HoldingsList,
    HoldingsAdd {
        holding: Holding,
    },
    HoldingsUpdate {
        holding: Holding,
    },
    HoldingsRemove {
        code: InstrumentCode,
    },
    Reset,
}

async fn open_state(config: &AppConfig) -> Result<AppState> {
    let data_path = config.default_data_path()?;
    debug!("Opening state at {}", data_path.display());
    let store = KeyValueStore::open(&data_path)?;
    let collection = store.get_collection(STATE_COLLECTION)?;
    Ok(AppState::load(collection).await)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fundwatch starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let source = providers::quote_source_from_config(&config)?;
    let service = Arc::new(ValuationService::new(source));

    match command {
        AppCommand::Quote { codes } => {
            cli::quote::run(&service, &codes, &mut std::io::stdout()).await
        }
        AppCommand::Indices => cli::quote::run_indices(&service, &mut std::io::stdout()).await,
        AppCommand::Watch {
            codes,
            interval,
            updates,
        } => {
            let codes = if codes.is_empty() {
                open_state(&config).await?.favorites().to_vec()
            } else {
                codes
            };
            let interval = interval
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| config.refresh_interval());
            cli::watch::run(service, codes, interval, updates, &mut std::io::stdout()).await
        }
        AppCommand::FavoritesList => {
            let state = open_state(&config).await?;
            cli::favorites::list(&state, &service).await
        }
        AppCommand::FavoritesAdd { code } => {
            let mut state = open_state(&config).await?;
            cli::favorites::add(&mut state, code).await
        }
        AppCommand::FavoritesRemove { code } => {
            let mut state = open_state(&config).await?;
            cli::favorites::remove(&mut state, &code).await
        }
        AppCommand::HoldingsList => {
            let state = open_state(&config).await?;
            cli::holdings::list(&state, &service).await
        }
        AppCommand::HoldingsAdd { holding } => {
            let mut state = open_state(&config).await?;
            cli::holdings::add(&mut state, holding).await
        }
        AppCommand::HoldingsUpdate { holding } => {
            let mut state = open_state(&config).await?;
            cli::holdings::update(&mut state, holding).await
        }
        AppCommand::HoldingsRemove { code } => {
            let mut state = open_state(&config).await?;
            cli::holdings::remove(&mut state, &code).await
        }
        AppCommand::Reset => {
            let mut state = open_state(&config).await?;
            state.reset().await?;
            println!("Cleared favorites and holdings");
            Ok(())
        }
    }
}
