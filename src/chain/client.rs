//! Contract read/write interface
//!
//! [`ChainClient`] is the seam between the flows and the network: generic
//! view calls, native balances, transaction submission and receipt waiting.
//! [`RpcChainClient`] implements it with alloy HTTP providers: one read
//! provider per registered network, plus an optional wallet endpoint that
//! receives `eth_sendTransaction` (the wallet signs and fills gas).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, trace};
use url::Url;

use crate::config::Config;
use crate::error::{Error, ProviderError, Result};
use crate::networks;

pub type SharedClient = Arc<dyn ChainClient>;

/// A state-changing call, ready to hand to the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest {
    pub chain_id: u64,
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReceiptStatus {
    Success,
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub status: ReceiptStatus,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// `eth_call` against `to` on `chain_id`, returning raw return data
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> Result<Bytes>;

    async fn native_balance(&self, chain_id: u64, owner: Address) -> Result<U256>;

    /// Submit a transaction and return its hash without waiting
    async fn send_transaction(&self, request: WriteRequest) -> Result<B256>;

    /// Block until the receipt for `hash` is available
    async fn wait_for_receipt(&self, chain_id: u64, hash: B256) -> Result<TxReceipt>;
}

/// Encode `call`, run it as a view call and decode the return value
pub async fn read_call<C: SolCall>(
    client: &dyn ChainClient,
    chain_id: u64,
    to: Address,
    call: &C,
) -> Result<C::Return> {
    let output = client.call(chain_id, to, call.abi_encode().into()).await?;
    C::abi_decode_returns(&output).map_err(|e| Error::decode(C::SIGNATURE, e))
}

// ============================================
// RPC IMPLEMENTATION
// ============================================

pub struct RpcChainClient {
    readers: HashMap<u64, DynProvider>,
    wallet: Option<DynProvider>,
    receipt_poll_interval: Duration,
    receipt_timeout: Duration,
}

impl RpcChainClient {
    pub fn new(config: &Config) -> Result<Self> {
        let mut readers = HashMap::new();
        for chain_id in networks::supported_chain_ids() {
            if let Some(rpc_url) = config.rpc_url_for(chain_id) {
                let url = parse_url(&rpc_url)?;
                let provider = ProviderBuilder::new().connect_http(url).erased();
                debug!("Read provider for chain {}: {}", chain_id, rpc_url);
                readers.insert(chain_id, provider);
            }
        }

        let wallet = match config.wallet_rpc_url.as_deref() {
            Some(wallet_url) => {
                let url = parse_url(wallet_url)?;
                // The wallet fills nonce and gas itself
                let provider = ProviderBuilder::new()
                    .disable_recommended_fillers()
                    .connect_http(url)
                    .erased();
                Some(provider)
            }
            None => None,
        };

        Ok(Self {
            readers,
            wallet,
            receipt_poll_interval: Duration::from_secs(config.receipt_poll_secs),
            receipt_timeout: Duration::from_secs(config.receipt_timeout_secs),
        })
    }

    fn reader(&self, chain_id: u64) -> Result<&DynProvider> {
        self.readers
            .get(&chain_id)
            .ok_or(Error::UnsupportedChain { chain_id })
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    raw.parse::<Url>()
        .map_err(|e| Error::Read(format!("invalid RPC URL '{}': {}", raw, e)))
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn call(&self, chain_id: u64, to: Address, data: Bytes) -> Result<Bytes> {
        let provider = self.reader(chain_id)?;
        let tx = TransactionRequest::default().to(to).input(data.into());

        provider
            .call(tx)
            .await
            .map_err(|e| Error::Read(format!("eth_call to {} failed: {}", to, e)))
    }

    async fn native_balance(&self, chain_id: u64, owner: Address) -> Result<U256> {
        let provider = self.reader(chain_id)?;
        provider
            .get_balance(owner)
            .await
            .map_err(|e| Error::Read(format!("eth_getBalance failed: {}", e)))
    }

    async fn send_transaction(&self, request: WriteRequest) -> Result<B256> {
        let wallet = self.wallet.as_ref().ok_or(Error::ProviderAbsent)?;

        let tx = TransactionRequest::default()
            .from(request.from)
            .to(request.to)
            .input(request.data.into())
            .value(request.value);

        let pending = wallet
            .send_transaction(tx)
            .await
            .map_err(|e| Error::Provider(ProviderError::from(e)))?;

        let hash = *pending.tx_hash();
        info!("Submitted transaction {} on chain {}", hash, request.chain_id);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, chain_id: u64, hash: B256) -> Result<TxReceipt> {
        let provider = self.reader(chain_id)?;
        let poll_interval = self.receipt_poll_interval;

        let wait = async {
            loop {
                match provider.get_transaction_receipt(hash).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => {
                        trace!("Receipt for {} not yet available", hash);
                        tokio::time::sleep(poll_interval).await;
                    }
                    Err(e) => return Err(Error::Confirm(e.to_string())),
                }
            }
        };

        let receipt = tokio::time::timeout(self.receipt_timeout, wait)
            .await
            .map_err(|_| {
                Error::Confirm(format!(
                    "no receipt for {} after {:?}",
                    hash, self.receipt_timeout
                ))
            })??;

        Ok(TxReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            status: if receipt.status() {
                ReceiptStatus::Success
            } else {
                ReceiptStatus::Reverted
            },
        })
    }
}
