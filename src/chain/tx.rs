//! Transaction Orchestrator
//!
//! Drives one write call through submit → confirm, reporting progress via
//! notifications and [`TxHooks`]. A loading flag is held from the start of
//! submission until the terminal outcome and blocks repeat submissions.

use std::sync::Arc;

use alloy_primitives::B256;
use tokio::sync::watch;
use tracing::{error, info};

use super::client::{SharedClient, TxReceipt, WriteRequest};
use crate::error::{Error, Result};
use crate::networks;
use crate::notify::{Notification, Notifier};

/// Callbacks fired while a transaction progresses.
///
/// `on_submitted` fires at most once and always before the terminal hook.
/// Exactly one of `on_success` / `on_error` fires per accepted invocation.
pub trait TxHooks: Sync {
    fn on_submitted(&self, _hash: &B256) {}
    fn on_success(&self, _receipt: &TxReceipt) {}
    fn on_error(&self, _error: &Error) {}
}

/// Hooks that do nothing
pub struct NoHooks;

impl TxHooks for NoHooks {}

/// Clears the loading flag however `execute` exits
struct LoadingGuard<'a>(&'a watch::Sender<bool>);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

pub struct TxOrchestrator {
    client: SharedClient,
    notifier: Arc<dyn Notifier>,
    loading: watch::Sender<bool>,
}

impl TxOrchestrator {
    pub fn new(client: SharedClient, notifier: Arc<dyn Notifier>) -> Self {
        let (loading, _) = watch::channel(false);
        Self { client, notifier, loading }
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Submit `request` and wait for its receipt.
    ///
    /// Returns [`Error::Busy`] without touching the chain if a previous
    /// invocation is still in flight. A reverted receipt is an error.
    pub async fn execute(&self, label: &str, request: WriteRequest, hooks: &dyn TxHooks) -> Result<TxReceipt> {
        let acquired = self.loading.send_if_modified(|loading| {
            if *loading {
                return false;
            }
            *loading = true;
            true
        });
        if !acquired {
            return Err(Error::Busy);
        }
        let _guard = LoadingGuard(&self.loading);

        let chain_id = request.chain_id;
        info!("{}: submitting to {} on chain {}", label, request.to, chain_id);

        // Submission failures never reach the confirm phase
        let hash = match self.client.send_transaction(request).await {
            Ok(hash) => hash,
            Err(e) => {
                error!("{}: submission failed: {}", label, e);
                self.notifier
                    .notify(Notification::error("Transaction failed", e.user_message()));
                hooks.on_error(&e);
                return Err(e);
            }
        };

        let mut description = format!("Transaction hash: {}", hash);
        if let Some(url) = networks::network(chain_id).and_then(|n| n.explorer_tx_url(&hash.to_string())) {
            description.push_str(&format!(" ({})", url));
        }
        self.notifier.notify(Notification::info("Transaction submitted", description));
        hooks.on_submitted(&hash);

        let outcome = match self.client.wait_for_receipt(chain_id, hash).await {
            Ok(receipt) if receipt.is_success() => Ok(receipt),
            Ok(_) => Err(Error::Reverted { hash }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(receipt) => {
                info!("{}: confirmed in block {:?}", label, receipt.block_number);
                self.notifier.notify(Notification::info(
                    "Transaction successful",
                    "Your transaction has been confirmed.",
                ));
                hooks.on_success(&receipt);
                Ok(receipt)
            }
            Err(e) => {
                error!("{}: {}", label, e);
                self.notifier
                    .notify(Notification::error("Transaction failed", e.user_message()));
                hooks.on_error(&e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::client::ReceiptStatus;
    use crate::error::ProviderError;
    use crate::testing::{FakeChain, RecordingNotifier};
    use alloy_primitives::{Address, Bytes, U256};
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    /// Records hook order and the loading flag seen at each hook
    struct Recorder {
        orchestrator_loading: watch::Receiver<bool>,
        events: Mutex<Vec<(&'static str, bool)>>,
    }

    impl Recorder {
        fn new(orch: &TxOrchestrator) -> Self {
            Self { orchestrator_loading: orch.subscribe_loading(), events: Mutex::new(Vec::new()) }
        }

        fn push(&self, name: &'static str) {
            let loading = *self.orchestrator_loading.borrow();
            self.events.lock().unwrap().push((name, loading));
        }

        fn names(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(|(n, _)| *n).collect()
        }
    }

    impl TxHooks for Recorder {
        fn on_submitted(&self, _hash: &B256) {
            self.push("submitted");
        }
        fn on_success(&self, _receipt: &TxReceipt) {
            self.push("success");
        }
        fn on_error(&self, _error: &Error) {
            self.push("error");
        }
    }

    fn request() -> WriteRequest {
        WriteRequest {
            chain_id: networks::CONFLUX_CHAIN_ID,
            from: Address::repeat_byte(0x42),
            to: Address::repeat_byte(0x14),
            data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
            value: U256::ZERO,
        }
    }

    fn setup() -> (Arc<FakeChain>, Arc<RecordingNotifier>, TxOrchestrator) {
        let chain = FakeChain::new();
        let notifier = RecordingNotifier::new();
        let orch = TxOrchestrator::new(chain.clone(), notifier.clone());
        (chain, notifier, orch)
    }

    #[tokio::test]
    async fn test_successful_transaction() {
        let (chain, notifier, orch) = setup();
        let hooks = Recorder::new(&orch);

        let receipt = assert_ok!(orch.execute("test", request(), &hooks).await);
        assert!(receipt.is_success());
        assert_eq!(hooks.names(), vec!["submitted", "success"]);
        assert_eq!(notifier.titles(), vec!["Transaction submitted", "Transaction successful"]);
        assert_eq!(chain.submissions().len(), 1);
        assert!(!orch.is_loading());
    }

    #[tokio::test]
    async fn test_loading_held_until_terminal_hook() {
        let (_chain, _notifier, orch) = setup();
        let hooks = Recorder::new(&orch);

        assert_ok!(orch.execute("test", request(), &hooks).await);
        let events = hooks.events.lock().unwrap().clone();
        assert!(events.iter().all(|(_, loading)| *loading));
        assert!(!orch.is_loading());
    }

    #[tokio::test]
    async fn test_reverted_receipt_fires_error_only() {
        let (chain, notifier, orch) = setup();
        chain.with(|s| s.receipt_status = Some(ReceiptStatus::Reverted));
        let hooks = Recorder::new(&orch);

        let err = assert_err!(orch.execute("test", request(), &hooks).await);
        assert!(matches!(err, Error::Reverted { .. }));
        assert_eq!(hooks.names(), vec!["submitted", "error"]);
        assert!(!orch.is_loading());
        let last = notifier.last().unwrap();
        assert_eq!(last.title, "Transaction failed");
        assert!(last.is_error());
    }

    #[tokio::test]
    async fn test_submission_error_skips_confirm() {
        let (chain, notifier, orch) = setup();
        chain.with(|s| {
            s.submit_error = Some(Error::Provider(ProviderError::new(
                4001,
                "User rejected the request. Contract Call: address: 0x14b2 function: xexchange",
            )))
        });
        let hooks = Recorder::new(&orch);

        assert_err!(orch.execute("test", request(), &hooks).await);
        assert_eq!(hooks.names(), vec!["error"]);
        assert_eq!(notifier.titles(), vec!["Transaction failed"]);
        assert_eq!(notifier.last().unwrap().description, "User rejected the request.");
        assert!(!orch.is_loading());
    }

    #[tokio::test]
    async fn test_empty_submission_error_uses_generic_message() {
        let (chain, notifier, orch) = setup();
        chain.with(|s| s.submit_error = Some(Error::Submit(String::new())));

        assert_err!(orch.execute("test", request(), &NoHooks).await);
        assert_eq!(
            notifier.last().unwrap().description,
            crate::notify::GENERIC_FAILURE
        );
    }

    #[tokio::test]
    async fn test_receipt_wait_failure() {
        let (chain, _notifier, orch) = setup();
        chain.with(|s| s.receipt_error = Some(Error::Confirm("timed out".into())));
        let hooks = Recorder::new(&orch);

        let err = assert_err!(orch.execute("test", request(), &hooks).await);
        assert!(matches!(err, Error::Confirm(_)));
        assert_eq!(hooks.names(), vec!["submitted", "error"]);
    }

    #[tokio::test]
    async fn test_busy_while_loading() {
        let (chain, _notifier, orch) = setup();
        orch.loading.send_replace(true);

        let err = assert_err!(orch.execute("test", request(), &NoHooks).await);
        assert!(matches!(err, Error::Busy));
        assert!(chain.submissions().is_empty());
        // A rejected call does not release someone else's lock
        assert!(orch.is_loading());
    }
}
