//! Favorites and holdings, the only durable user data.
//!
//! Both lists are read wholesale on [`AppState::load`] and rewritten together
//! in one batch after every mutation. A mutation only reaches the in-memory
//! lists once the write succeeded.

use crate::core::{Holding, InstrumentCode, KeyValueCollection};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const STATE_COLLECTION: &str = "app";
const FAVORITES_KEY: &str = "favorites";
const HOLDINGS_KEY: &str = "holdings";

pub struct AppState {
    collection: Arc<dyn KeyValueCollection>,
    favorites: Vec<InstrumentCode>,
    holdings: Vec<Holding>,
}

impl AppState {
    pub async fn load(collection: Arc<dyn KeyValueCollection>) -> Self {
        let favorites: Vec<InstrumentCode> = read_list(collection.as_ref(), FAVORITES_KEY).await;
        let holdings: Vec<Holding> = read_list(collection.as_ref(), HOLDINGS_KEY).await;
        let holdings: Vec<Holding> = holdings
            .into_iter()
            .filter(|h| match h.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Skipping invalid stored holding");
                    false
                }
            })
            .collect();
        debug!(
            favorites = favorites.len(),
            holdings = holdings.len(),
            "Loaded app state"
        );
        Self {
            collection,
            favorites,
            holdings,
        }
    }

    pub async fn save(&self) -> Result<()> {
        self.persist(&self.favorites, &self.holdings).await
    }

    async fn persist(&self, favorites: &[InstrumentCode], holdings: &[Holding]) -> Result<()> {
        for holding in holdings {
            holding.validate()?;
        }
        let entries = [
            (FAVORITES_KEY, encode_list(FAVORITES_KEY, favorites)?),
            (HOLDINGS_KEY, encode_list(HOLDINGS_KEY, holdings)?),
        ];
        self.collection
            .put_all(&entries)
            .await
            .context("Failed to save app state")?;
        debug!("Saved app state");
        Ok(())
    }

    async fn replace_favorites(&mut self, favorites: Vec<InstrumentCode>) -> Result<()> {
        self.persist(&favorites, &self.holdings).await?;
        self.favorites = favorites;
        Ok(())
    }

    async fn replace_holdings(&mut self, holdings: Vec<Holding>) -> Result<()> {
        self.persist(&self.favorites, &holdings).await?;
        self.holdings = holdings;
        Ok(())
    }

    pub fn favorites(&self) -> &[InstrumentCode] {
        &self.favorites
    }

    pub fn holdings(&self) -> &[Holding] {
        &self.holdings
    }

    pub fn is_favorite(&self, code: &InstrumentCode) -> bool {
        self.favorites.contains(code)
    }

    pub fn holding(&self, code: &InstrumentCode) -> Option<&Holding> {
        self.holdings.iter().find(|h| &h.code == code)
    }

    /// Returns `false` when the code already is a favorite.
    pub async fn add_favorite(&mut self, code: InstrumentCode) -> Result<bool> {
        if self.is_favorite(&code) {
            return Ok(false);
        }
        info!("Adding favorite {}", code);
        let mut favorites = self.favorites.clone();
        favorites.push(code);
        self.replace_favorites(favorites).await?;
        Ok(true)
    }

    /// Returns `false` when the code was not a favorite.
    pub async fn remove_favorite(&mut self, code: &InstrumentCode) -> Result<bool> {
        if !self.is_favorite(code) {
            return Ok(false);
        }
        info!("Removing favorite {}", code);
        let favorites = self
            .favorites
            .iter()
            .filter(|c| *c != code)
            .cloned()
            .collect();
        self.replace_favorites(favorites).await?;
        Ok(true)
    }

    pub async fn add_holding(&mut self, holding: Holding) -> Result<()> {
        holding.validate()?;
        if self.holding(&holding.code).is_some() {
            bail!(
                "A holding for {} already exists, update it instead",
                holding.code
            );
        }
        info!("Adding holding {}", holding.code);
        let mut holdings = self.holdings.clone();
        holdings.push(holding);
        self.replace_holdings(holdings).await
    }

    /// Replaces the holding with the same code. Returns `false` when not held.
    pub async fn update_holding(&mut self, holding: Holding) -> Result<bool> {
        holding.validate()?;
        let Some(index) = self.holdings.iter().position(|h| h.code == holding.code) else {
            return Ok(false);
        };
        info!("Updating holding {}", holding.code);
        let mut holdings = self.holdings.clone();
        holdings[index] = holding;
        self.replace_holdings(holdings).await?;
        Ok(true)
    }

    /// Returns `false` when the code was not held.
    pub async fn remove_holding(&mut self, code: &InstrumentCode) -> Result<bool> {
        if self.holding(code).is_none() {
            return Ok(false);
        }
        info!("Removing holding {}", code);
        let holdings = self
            .holdings
            .iter()
            .filter(|h| &h.code != code)
            .cloned()
            .collect();
        self.replace_holdings(holdings).await?;
        Ok(true)
    }

    /// Clears favorites and holdings.
    pub async fn reset(&mut self) -> Result<()> {
        info!("Resetting app state");
        self.persist(&[], &[]).await?;
        self.favorites.clear();
        self.holdings.clear();
        Ok(())
    }
}

/// A missing list loads as empty. Entries that fail to decode are skipped so
/// one bad record never takes the rest of the list with it.
async fn read_list<T: DeserializeOwned>(collection: &dyn KeyValueCollection, key: &str) -> Vec<T> {
    let bytes = match collection.get(key).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(key, error = %e, "Failed to load stored list");
            return Vec::new();
        }
    };
    let entries: Vec<serde_json::Value> = match serde_json::from_slice(&bytes) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(key, error = %e, "Stored list is corrupt, starting empty");
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(key, error = %e, "Skipping unreadable stored entry");
                None
            }
        })
        .collect()
}

fn encode_list<T: Serialize>(key: &str, list: &[T]) -> Result<Vec<u8>> {
    serde_json::to_vec(list).with_context(|| format!("Failed to encode {key}"))
}
