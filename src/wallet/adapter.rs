//! Wallet Adapter
//!
//! Owns the cached [`WalletState`]. The state only changes through
//! [`WalletUpdate`] messages produced here, from explicit actions
//! (connect, disconnect, switch) or from provider events.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use super::provider::{self, ProviderEvent, SharedProvider, WalletProvider};
use crate::error::{Error, ProviderError, Result};
use crate::networks;
use crate::notify::{Notification, Notifier};
use crate::poll::PollTask;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WalletState {
    pub is_connected: bool,
    pub address: Option<Address>,
    pub chain_id: Option<u64>,
    /// Native balance observed at the last sync
    pub balance: Option<U256>,
}

/// The only ways [`WalletState`] can change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletUpdate {
    Connected {
        address: Address,
        chain_id: u64,
        balance: Option<U256>,
    },
    ChainSwitched(u64),
    Disconnected,
}

impl WalletState {
    pub fn apply(&mut self, update: WalletUpdate) {
        match update {
            WalletUpdate::Connected { address, chain_id, balance } => {
                *self = WalletState {
                    is_connected: true,
                    address: Some(address),
                    chain_id: Some(chain_id),
                    balance,
                };
            }
            WalletUpdate::ChainSwitched(chain_id) => {
                if self.is_connected {
                    self.chain_id = Some(chain_id);
                    self.balance = None;
                }
            }
            WalletUpdate::Disconnected => *self = WalletState::default(),
        }
    }

    /// Connected account, or [`Error::WalletNotConnected`]
    pub fn account(&self) -> Result<Address> {
        match (self.is_connected, self.address) {
            (true, Some(address)) => Ok(address),
            _ => Err(Error::WalletNotConnected),
        }
    }
}

pub struct WalletAdapter {
    provider: Option<SharedProvider>,
    notifier: Arc<dyn Notifier>,
    state: watch::Sender<WalletState>,
}

impl WalletAdapter {
    pub fn new(provider: Option<SharedProvider>, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        let (state, _) = watch::channel(WalletState::default());
        Arc::new(Self { provider, notifier, state })
    }

    pub fn state(&self) -> WalletState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletState> {
        self.state.subscribe()
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    fn update(&self, update: WalletUpdate) {
        debug!("Wallet update: {:?}", update);
        self.state.send_modify(|s| s.apply(update));
    }

    fn provider(&self) -> Result<&dyn WalletProvider> {
        self.provider.as_deref().ok_or(Error::ProviderAbsent)
    }

    fn notify_missing_provider(&self) {
        self.notifier.notify(Notification::error(
            "Wallet not found",
            "Please configure a wallet provider (WALLET_RPC_URL) to use this application",
        ));
    }

    /// Pick up an already-authorized account without prompting
    pub async fn sync(&self) -> bool {
        let Ok(provider) = self.provider() else {
            debug!("No wallet provider, skipping sync");
            return false;
        };

        match self.read_connection(provider, false).await {
            Ok(Some((address, chain_id, balance))) => {
                self.update(WalletUpdate::Connected { address, chain_id, balance });
                true
            }
            Ok(None) => {
                if self.state.borrow().is_connected {
                    self.update(WalletUpdate::Disconnected);
                }
                false
            }
            Err(e) => {
                warn!("Error checking wallet connection: {}", e);
                false
            }
        }
    }

    async fn read_connection(
        &self,
        provider: &dyn WalletProvider,
        prompt: bool,
    ) -> std::result::Result<Option<(Address, u64, Option<U256>)>, ProviderError> {
        let accounts = if prompt {
            provider::request_accounts(provider).await?
        } else {
            provider::accounts(provider).await?
        };
        let Some(address) = accounts.first().copied() else {
            return Ok(None);
        };

        let chain_id = provider::chain_id(provider).await?;
        let balance = provider::balance(provider, address).await.ok();
        Ok(Some((address, chain_id, balance)))
    }

    /// Request account access and move the wallet onto `target_chain_id`
    pub async fn connect_wallet(&self, target_chain_id: Option<u64>) -> Result<WalletState> {
        let provider = match self.provider() {
            Ok(p) => p,
            Err(e) => {
                self.notify_missing_provider();
                return Err(e);
            }
        };

        match self.try_connect(provider, target_chain_id).await {
            Ok(state) => {
                self.notifier.notify(Notification::info(
                    "Wallet connected",
                    "Your wallet has been connected successfully",
                ));
                Ok(state)
            }
            Err(e) => {
                self.notifier
                    .notify(Notification::error("Connection failed", e.user_message()));
                Err(e)
            }
        }
    }

    async fn try_connect(
        &self,
        provider: &dyn WalletProvider,
        target_chain_id: Option<u64>,
    ) -> Result<WalletState> {
        let Some((address, mut chain_id, mut balance)) = self.read_connection(provider, true).await? else {
            return Err(ProviderError::new(4100, "No accounts authorized").into());
        };

        if let Some(target) = target_chain_id {
            if target != chain_id {
                self.ensure_chain(provider, target).await?;
                chain_id = target;
                balance = provider::balance(provider, address).await.ok();
            }
        }

        info!("Wallet connected: {} on chain {}", address, chain_id);
        self.update(WalletUpdate::Connected { address, chain_id, balance });
        Ok(self.state())
    }

    /// Switch, adding the chain first if the wallet does not know it
    async fn ensure_chain(&self, provider: &dyn WalletProvider, chain_id: u64) -> Result<()> {
        let hex_chain_id = format!("{:#x}", chain_id);
        match provider::switch_chain(provider, &hex_chain_id).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_unrecognized_chain() => {
                let network = networks::network(chain_id).ok_or(Error::UnsupportedChain { chain_id })?;
                info!("Adding {} to wallet", network.name);
                provider::add_chain(provider, network.add_chain_params()).await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn disconnect_wallet(&self) {
        self.update(WalletUpdate::Disconnected);
        self.notifier.notify(Notification::info(
            "Wallet disconnected",
            "Your wallet has been disconnected",
        ));
    }

    /// No-op when already on `chain_id`
    pub async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        if self.state.borrow().chain_id == Some(chain_id) {
            return Ok(());
        }

        let provider = match self.provider() {
            Ok(p) => p,
            Err(e) => {
                self.notify_missing_provider();
                return Err(e);
            }
        };

        match self.ensure_chain(provider, chain_id).await {
            Ok(()) => {
                self.update(WalletUpdate::ChainSwitched(chain_id));
                Ok(())
            }
            Err(e) => {
                self.notifier
                    .notify(Notification::error("Network switch failed", e.user_message()));
                Err(e)
            }
        }
    }

    pub async fn handle_event(&self, event: ProviderEvent) {
        debug!("Provider event: {:?}", event);
        match event {
            ProviderEvent::AccountsChanged(_) | ProviderEvent::ChainChanged(_) => {
                self.sync().await;
            }
            ProviderEvent::Disconnect => self.update(WalletUpdate::Disconnected),
        }
    }

    /// Consume provider events for as long as the returned handle lives
    pub fn listen(self: &Arc<Self>) -> Option<PollTask> {
        let mut events = self.provider.as_ref()?.subscribe();
        let adapter = Arc::clone(self);

        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => adapter.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Missed {} wallet events, resyncing", n);
                        adapter.sync().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Some(PollTask::from_handle("wallet-listener", handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UNRECOGNIZED_CHAIN_CODE;
    use crate::networks::{BASE_CHAIN_ID, CONFLUX_CHAIN_ID};
    use crate::testing::{FakeWallet, RecordingNotifier};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn account() -> Address {
        Address::repeat_byte(0x42)
    }

    fn adapter_with(wallet: Arc<FakeWallet>) -> (Arc<WalletAdapter>, Arc<RecordingNotifier>) {
        let notifier = RecordingNotifier::new();
        let provider: SharedProvider = wallet;
        (WalletAdapter::new(Some(provider), notifier.clone()), notifier)
    }

    #[test]
    fn test_state_messages() {
        let mut state = WalletState::default();
        state.apply(WalletUpdate::ChainSwitched(1030));
        assert_eq!(state, WalletState::default(), "switch without connection is ignored");

        state.apply(WalletUpdate::Connected { address: account(), chain_id: 8453, balance: None });
        state.apply(WalletUpdate::ChainSwitched(1030));
        assert_eq!(state.chain_id, Some(1030));
        assert_eq!(state.account().unwrap(), account());

        state.apply(WalletUpdate::Disconnected);
        assert!(!state.is_connected);
        assert!(state.account().is_err());
    }

    #[tokio::test]
    async fn test_connect_without_provider() {
        let notifier = RecordingNotifier::new();
        let adapter = WalletAdapter::new(None, notifier.clone());

        let err = assert_err!(adapter.connect_wallet(Some(CONFLUX_CHAIN_ID)).await);
        assert!(matches!(err, Error::ProviderAbsent));
        assert_eq!(notifier.titles(), vec!["Wallet not found"]);
        assert!(!adapter.state().is_connected);
    }

    #[tokio::test]
    async fn test_connect_switches_to_target_chain() {
        let wallet = FakeWallet::new(vec![account()], BASE_CHAIN_ID);
        wallet.know_chain(CONFLUX_CHAIN_ID);
        let (adapter, notifier) = adapter_with(wallet.clone());

        let state = assert_ok!(adapter.connect_wallet(Some(CONFLUX_CHAIN_ID)).await);
        assert!(state.is_connected);
        assert_eq!(state.chain_id, Some(CONFLUX_CHAIN_ID));
        assert!(wallet.methods().contains(&"wallet_switchEthereumChain".to_string()));
        assert!(!wallet.methods().contains(&"wallet_addEthereumChain".to_string()));
        assert_eq!(notifier.titles(), vec!["Wallet connected"]);
    }

    #[tokio::test]
    async fn test_connect_adds_unrecognized_chain() {
        let wallet = FakeWallet::new(vec![account()], BASE_CHAIN_ID);
        let (adapter, _) = adapter_with(wallet.clone());

        let state = assert_ok!(adapter.connect_wallet(Some(CONFLUX_CHAIN_ID)).await);
        assert_eq!(state.chain_id, Some(CONFLUX_CHAIN_ID));

        let methods = wallet.methods();
        let switch = methods.iter().position(|m| m == "wallet_switchEthereumChain").unwrap();
        let add = methods.iter().position(|m| m == "wallet_addEthereumChain").unwrap();
        assert!(switch < add);
    }

    #[tokio::test]
    async fn test_connect_surfaces_rejection() {
        let wallet = FakeWallet::new(vec![account()], CONFLUX_CHAIN_ID);
        wallet.fail("eth_requestAccounts", ProviderError::new(4001, "User rejected the request."));
        let (adapter, notifier) = adapter_with(wallet);

        let err = assert_err!(adapter.connect_wallet(None).await);
        assert!(matches!(err, Error::Provider(ref p) if p.is_user_rejection()));
        let last = notifier.last().unwrap();
        assert_eq!(last.title, "Connection failed");
        assert_eq!(last.description, "User rejected the request.");
    }

    #[tokio::test]
    async fn test_switch_failure_other_than_unrecognized() {
        let wallet = FakeWallet::new(vec![account()], BASE_CHAIN_ID);
        wallet.fail("wallet_switchEthereumChain", ProviderError::new(-32002, "Request pending"));
        let (adapter, _) = adapter_with(wallet.clone());

        assert_err!(adapter.connect_wallet(Some(CONFLUX_CHAIN_ID)).await);
        assert!(!wallet.methods().contains(&"wallet_addEthereumChain".to_string()));
        assert_ne!(UNRECOGNIZED_CHAIN_CODE, -32002);
    }

    #[tokio::test]
    async fn test_switch_chain_is_idempotent() {
        let wallet = FakeWallet::new(vec![account()], CONFLUX_CHAIN_ID);
        let (adapter, _) = adapter_with(wallet.clone());
        assert_ok!(adapter.connect_wallet(None).await);
        let before = wallet.methods().len();

        assert_ok!(adapter.switch_chain(CONFLUX_CHAIN_ID).await);
        assert_eq!(wallet.methods().len(), before);
    }

    #[tokio::test]
    async fn test_disconnect_clears_state() {
        let wallet = FakeWallet::new(vec![account()], CONFLUX_CHAIN_ID);
        let (adapter, notifier) = adapter_with(wallet);
        assert_ok!(adapter.connect_wallet(None).await);

        adapter.disconnect_wallet();
        assert_eq!(adapter.state(), WalletState::default());
        assert_eq!(notifier.last().unwrap().title, "Wallet disconnected");
    }

    #[tokio::test]
    async fn test_events_resync_state() {
        let wallet = FakeWallet::new(vec![account()], CONFLUX_CHAIN_ID);
        let (adapter, _) = adapter_with(wallet.clone());
        let _listener = adapter.listen().expect("provider present");
        let mut state_rx = adapter.subscribe();

        assert!(adapter.sync().await);
        assert_eq!(adapter.state().chain_id, Some(CONFLUX_CHAIN_ID));

        wallet.set_chain(BASE_CHAIN_ID);
        wallet.emit(ProviderEvent::ChainChanged(BASE_CHAIN_ID));

        let changed = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                state_rx.changed().await.unwrap();
                if state_rx.borrow().chain_id == Some(BASE_CHAIN_ID) {
                    break;
                }
            }
        })
        .await;
        assert!(changed.is_ok());

        wallet.set_accounts(vec![]);
        wallet.emit(ProviderEvent::AccountsChanged(vec![]));
        let disconnected = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                state_rx.changed().await.unwrap();
                if !state_rx.borrow().is_connected {
                    break;
                }
            }
        })
        .await;
        assert!(disconnected.is_ok());
    }
}
