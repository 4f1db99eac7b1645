//! Provider bridge
//!
//! An EIP-1193 style surface: JSON request/response calls plus a stream of
//! account/chain change events. [`RpcWalletProvider`] talks JSON-RPC to a
//! wallet endpoint (Frame, a node with unlocked accounts, ...). JSON-RPC has
//! no push channel, so it watches `eth_accounts`/`eth_chainId` and emits an
//! event whenever either changes.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, ProviderError, Result};
use crate::poll::{spawn_poller, PollTask};

/// JSON-RPC "internal error"
const INTERNAL_ERROR_CODE: i64 = -32603;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Events a wallet emits on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
    Disconnect,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> std::result::Result<Value, ProviderError>;

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

pub type SharedProvider = Arc<dyn WalletProvider>;

// ============================================
// TYPED REQUESTS
// ============================================

fn malformed(method: &str, value: &Value) -> ProviderError {
    ProviderError::new(
        INTERNAL_ERROR_CODE,
        format!("{} returned an unexpected value: {}", method, value),
    )
}

fn parse_accounts(value: &Value) -> std::result::Result<Vec<Address>, ProviderError> {
    let list = value.as_array().ok_or_else(|| malformed("eth_accounts", value))?;
    list.iter()
        .map(|v| {
            v.as_str()
                .and_then(|s| s.parse::<Address>().ok())
                .ok_or_else(|| malformed("eth_accounts", v))
        })
        .collect()
}

fn parse_hex_u64(method: &str, value: &Value) -> std::result::Result<u64, ProviderError> {
    value
        .as_str()
        .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        .ok_or_else(|| malformed(method, value))
}

/// `eth_accounts` (never prompts)
pub async fn accounts(provider: &dyn WalletProvider) -> std::result::Result<Vec<Address>, ProviderError> {
    let value = provider.request("eth_accounts", json!([])).await?;
    parse_accounts(&value)
}

/// `eth_requestAccounts` (may prompt the user)
pub async fn request_accounts(provider: &dyn WalletProvider) -> std::result::Result<Vec<Address>, ProviderError> {
    let value = provider.request("eth_requestAccounts", json!([])).await?;
    parse_accounts(&value)
}

pub async fn chain_id(provider: &dyn WalletProvider) -> std::result::Result<u64, ProviderError> {
    let value = provider.request("eth_chainId", json!([])).await?;
    parse_hex_u64("eth_chainId", &value)
}

pub async fn balance(provider: &dyn WalletProvider, owner: Address) -> std::result::Result<U256, ProviderError> {
    let value = provider
        .request("eth_getBalance", json!([owner, "latest"]))
        .await?;
    value
        .as_str()
        .and_then(|s| U256::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        .ok_or_else(|| malformed("eth_getBalance", &value))
}

pub async fn switch_chain(provider: &dyn WalletProvider, hex_chain_id: &str) -> std::result::Result<(), ProviderError> {
    provider
        .request("wallet_switchEthereumChain", json!([{ "chainId": hex_chain_id }]))
        .await
        .map(|_| ())
}

pub async fn add_chain(provider: &dyn WalletProvider, params: Value) -> std::result::Result<(), ProviderError> {
    provider
        .request("wallet_addEthereumChain", params)
        .await
        .map(|_| ())
}

// ============================================
// JSON-RPC WALLET
// ============================================

pub struct RpcWalletProvider {
    provider: DynProvider,
    events: broadcast::Sender<ProviderEvent>,
    changes: ChangeWatcher,
}

impl RpcWalletProvider {
    pub fn connect(wallet_url: &str) -> Result<Arc<Self>> {
        let url: Url = wallet_url
            .parse()
            .map_err(|e| Error::Read(format!("invalid wallet URL '{}': {}", wallet_url, e)))?;

        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_http(url)
            .erased();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Arc::new(Self {
            provider,
            events,
            changes: ChangeWatcher::default(),
        }))
    }

    /// Start emitting change events by polling the wallet
    pub fn watch(self: &Arc<Self>, interval: Duration) -> PollTask {
        let this = Arc::clone(self);
        spawn_poller("wallet-events", interval, move |_| {
            let this = Arc::clone(&this);
            async move { this.check_for_changes().await }
        })
    }

    async fn check_for_changes(&self) {
        for event in self.changes.poll(self).await {
            // No receivers is fine
            let _ = self.events.send(event);
        }
    }
}

/// Turns successive `eth_accounts`/`eth_chainId` answers into change events
#[derive(Debug, Default)]
pub struct ChangeWatcher {
    last_seen: Mutex<(Vec<Address>, Option<u64>)>,
}

impl ChangeWatcher {
    /// Events since the previous poll. The first chain id seen is not a change.
    pub async fn poll(&self, provider: &dyn WalletProvider) -> Vec<ProviderEvent> {
        let current_accounts = match accounts(provider).await {
            Ok(a) => a,
            Err(e) => {
                debug!("Wallet poll failed: {}", e);
                return Vec::new();
            }
        };
        let current_chain = chain_id(provider).await.ok();

        let mut events = Vec::new();
        let Ok(mut last) = self.last_seen.lock() else {
            return events;
        };
        if last.0 != current_accounts {
            events.push(ProviderEvent::AccountsChanged(current_accounts.clone()));
            last.0 = current_accounts;
        }
        if current_chain.is_some() && last.1 != current_chain {
            if last.1.is_some() {
                events.extend(current_chain.map(ProviderEvent::ChainChanged));
            }
            last.1 = current_chain;
        }
        events
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    async fn request(&self, method: &str, params: Value) -> std::result::Result<Value, ProviderError> {
        self.provider
            .raw_request::<Value, Value>(method.to_string().into(), params)
            .await
            .map_err(|e| {
                let err = ProviderError::from(e);
                warn!("{} failed (code {}): {}", method, err.code, err.message);
                err
            })
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
