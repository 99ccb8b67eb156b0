//! Local persistence for settings, the wallet book and last-known snapshots
//!
//! Everything is plain JSON under one base directory. Reads tolerate missing
//! and corrupted files: the engine starts with "no prior data" instead of
//! failing.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::address::validate_address;
use crate::error::{StorageError, SyncError};
use crate::ledger::WalletSnapshot;
use crate::price::PriceSnapshot;

const SETTINGS_FILE: &str = "settings.json";
const WALLETS_FILE: &str = "wallets.json";
const PRICE_FILE: &str = "price.json";
const SNAPSHOTS_DIR: &str = "snapshots";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
}

impl Currency {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Usd => "$",
            Self::Eur => "€",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub wallet_address: String,
    pub hide_values: bool,
    pub currency: Currency,
    pub auto_refresh: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            wallet_address: String::new(),
            hide_values: false,
            currency: Currency::Usd,
            auto_refresh: true,
        }
    }
}

/// Named address in the wallet book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id: String,
    pub name: String,
    pub address: String,
}

/// Last-known wallet data for one address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedWallet {
    pub wallet: WalletSnapshot,
    pub price: Option<PriceSnapshot>,
}

#[derive(Clone, Debug)]
pub struct Storage {
    base_path: PathBuf,
    network: bitcoin::Network,
}

impl Storage {
    pub fn new(base_path: impl Into<PathBuf>, network: bitcoin::Network) -> Self {
        Self {
            base_path: base_path.into(),
            network,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_path
    }

    // ============================================================================
    // Settings
    // ============================================================================

    /// Load settings, falling back to defaults when absent or unreadable
    pub fn load_settings(&self) -> Settings {
        self.read_tolerant(&self.base_path.join(SETTINGS_FILE))
            .unwrap_or_default()
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        self.write_json(&self.base_path.join(SETTINGS_FILE), settings)
    }

    // ============================================================================
    // Last-known data
    // ============================================================================

    pub fn load_wallet(&self, address: &str) -> Option<PersistedWallet> {
        self.read_tolerant(&self.snapshot_path(address))
    }

    pub fn save_wallet(&self, persisted: &PersistedWallet) -> Result<(), StorageError> {
        self.write_json(&self.snapshot_path(&persisted.wallet.address), persisted)
    }

    pub fn load_price(&self) -> Option<PriceSnapshot> {
        self.read_tolerant(&self.base_path.join(PRICE_FILE))
    }

    pub fn save_price(&self, price: &PriceSnapshot) -> Result<(), StorageError> {
        self.write_json(&self.base_path.join(PRICE_FILE), price)
    }

    fn snapshot_path(&self, address: &str) -> PathBuf {
        let file: String = address
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        self.base_path
            .join(SNAPSHOTS_DIR)
            .join(format!("{}.json", file))
    }

    // ============================================================================
    // Wallet book
    // ============================================================================

    pub fn list_wallets(&self) -> Vec<WalletEntry> {
        self.read_tolerant(&self.base_path.join(WALLETS_FILE))
            .unwrap_or_default()
    }

    /// Add a named address; the name defaults to "Main"
    pub fn add_wallet(&self, name: &str, address: &str) -> Result<WalletEntry, SyncError> {
        validate_address(address, self.network)?;

        let mut wallets = self.list_wallets();
        let mut id = Utc::now().timestamp_millis();
        while wallets.iter().any(|w| w.id == id.to_string()) {
            id += 1;
        }

        let name = name.trim();
        let entry = WalletEntry {
            id: id.to_string(),
            name: if name.is_empty() { "Main" } else { name }.to_string(),
            address: address.trim().to_string(),
        };
        wallets.push(entry.clone());
        self.save_wallets(&wallets)?;

        log::info!("Added wallet '{}' ({})", entry.name, entry.address);
        Ok(entry)
    }

    /// Replace an entry's name and address; a blank name keeps the old one
    pub fn update_wallet(&self, updated: &WalletEntry) -> Result<WalletEntry, SyncError> {
        validate_address(&updated.address, self.network)?;

        let mut wallets = self.list_wallets();
        let slot = wallets
            .iter_mut()
            .find(|w| w.id == updated.id)
            .ok_or_else(|| StorageError::WalletNotFound(updated.id.clone()))?;
        let name = updated.name.trim();
        if !name.is_empty() {
            slot.name = name.to_string();
        }
        slot.address = updated.address.trim().to_string();
        let stored = slot.clone();
        self.save_wallets(&wallets)?;
        Ok(stored)
    }

    pub fn remove_wallet(&self, id: &str) -> Result<WalletEntry, StorageError> {
        let mut wallets = self.list_wallets();
        let index = wallets
            .iter()
            .position(|w| w.id == id)
            .ok_or_else(|| StorageError::WalletNotFound(id.to_string()))?;
        let removed = wallets.remove(index);
        self.save_wallets(&wallets)?;

        log::info!("Removed wallet '{}'", removed.name);
        Ok(removed)
    }

    pub fn find_wallet(&self, id: &str) -> Option<WalletEntry> {
        self.list_wallets().into_iter().find(|w| w.id == id)
    }

    fn save_wallets(&self, wallets: &[WalletEntry]) -> Result<(), StorageError> {
        self.write_json(&self.base_path.join(WALLETS_FILE), &wallets)
    }

    // ============================================================================
    // JSON helpers
    // ============================================================================

    fn read_tolerant<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        if !path.exists() {
            return None;
        }
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                log::warn!("Error loading stored data from {:?}: {}", path, e);
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring corrupted stored data in {:?}: {}", path, e);
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json)?;
        Ok(())
    }
}
