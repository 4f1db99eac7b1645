//! In-memory stand-ins for the wallet, the chain and the notifier

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::chain::abi::{IXRouter, IERC20};
use crate::chain::client::{ChainClient, ReceiptStatus, TxReceipt, WriteRequest};
use crate::error::{Error, ProviderError, Result, UNRECOGNIZED_CHAIN_CODE};
use crate::notify::{Notification, Notifier};
use crate::wallet::provider::{ProviderEvent, WalletProvider};

// ============================================
// NOTIFIER
// ============================================

#[derive(Default)]
pub struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.all().into_iter().map(|n| n.title).collect()
    }

    pub fn last(&self) -> Option<Notification> {
        self.all().pop()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

// ============================================
// WALLET
// ============================================

struct WalletInner {
    accounts: Vec<Address>,
    chain_id: u64,
    known_chains: HashSet<u64>,
    balance: U256,
    failures: HashMap<String, ProviderError>,
    methods: Vec<String>,
}

pub struct FakeWallet {
    inner: Mutex<WalletInner>,
    events: broadcast::Sender<ProviderEvent>,
}

impl FakeWallet {
    pub fn new(accounts: Vec<Address>, chain_id: u64) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            inner: Mutex::new(WalletInner {
                accounts,
                chain_id,
                known_chains: HashSet::from([chain_id]),
                balance: U256::ZERO,
                failures: HashMap::new(),
                methods: Vec::new(),
            }),
            events,
        })
    }

    pub fn know_chain(&self, chain_id: u64) {
        self.inner.lock().unwrap().known_chains.insert(chain_id);
    }

    pub fn fail(&self, method: &str, err: ProviderError) {
        self.inner.lock().unwrap().failures.insert(method.to_string(), err);
    }

    pub fn set_balance(&self, balance: U256) {
        self.inner.lock().unwrap().balance = balance;
    }

    pub fn set_chain(&self, chain_id: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.chain_id = chain_id;
        inner.known_chains.insert(chain_id);
    }

    pub fn set_accounts(&self, accounts: Vec<Address>) {
        self.inner.lock().unwrap().accounts = accounts;
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    pub fn methods(&self) -> Vec<String> {
        self.inner.lock().unwrap().methods.clone()
    }
}

fn requested_chain(params: &Value) -> Option<u64> {
    params[0]["chainId"]
        .as_str()
        .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
}

#[async_trait]
impl WalletProvider for FakeWallet {
    async fn request(&self, method: &str, params: Value) -> std::result::Result<Value, ProviderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.methods.push(method.to_string());

        if let Some(err) = inner.failures.get(method) {
            return Err(err.clone());
        }

        match method {
            "eth_accounts" | "eth_requestAccounts" => {
                let list: Vec<String> = inner.accounts.iter().map(|a| a.to_string()).collect();
                Ok(json!(list))
            }
            "eth_chainId" => Ok(json!(format!("{:#x}", inner.chain_id))),
            "eth_getBalance" => Ok(json!(format!("0x{:x}", inner.balance))),
            "wallet_switchEthereumChain" => {
                let target = requested_chain(&params)
                    .ok_or_else(|| ProviderError::new(-32602, "bad params"))?;
                if inner.known_chains.contains(&target) {
                    inner.chain_id = target;
                    Ok(Value::Null)
                } else {
                    Err(ProviderError::new(UNRECOGNIZED_CHAIN_CODE, "Unrecognized chain ID"))
                }
            }
            "wallet_addEthereumChain" => {
                let target = requested_chain(&params)
                    .ok_or_else(|| ProviderError::new(-32602, "bad params"))?;
                inner.known_chains.insert(target);
                inner.chain_id = target;
                Ok(Value::Null)
            }
            other => Err(ProviderError::new(-32601, format!("{} not supported", other))),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

// ============================================
// CHAIN
// ============================================

#[derive(Debug, Clone)]
pub struct FakeLp {
    pub price: U256,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
}

#[derive(Default)]
pub struct ChainState {
    pub native: HashMap<Address, U256>,
    /// (token, owner) -> balance
    pub balances: HashMap<(Address, Address), U256>,
    pub decimals: HashMap<Address, u8>,
    /// (token, owner, spender) -> allowance
    pub allowances: HashMap<(Address, Address, Address), U256>,
    /// amountOut = amountIn * num / den; `None` makes the estimate revert
    pub estimate_rate: Option<(u64, u64)>,
    pub pairs: HashMap<(Address, Address), Address>,
    pub lps: HashMap<Address, FakeLp>,
    /// Pools whose router reads fail
    pub failing_pools: HashSet<Address>,
    pub fail_all_reads: bool,
    pub submissions: Vec<WriteRequest>,
    pub submit_error: Option<Error>,
    pub receipt_status: Option<ReceiptStatus>,
    pub receipt_error: Option<Error>,
    pub calls: usize,
}

pub struct FakeChain {
    pub state: Mutex<ChainState>,
}

impl FakeChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { state: Mutex::new(ChainState::default()) })
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut ChainState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn submissions(&self) -> Vec<WriteRequest> {
        self.with(|s| s.submissions.clone())
    }

    pub fn submitted_selectors(&self) -> Vec<[u8; 4]> {
        self.submissions()
            .iter()
            .map(|w| [w.data[0], w.data[1], w.data[2], w.data[3]])
            .collect()
    }
}

fn read_err(msg: &str) -> Error {
    Error::Read(msg.to_string())
}

impl ChainState {
    fn lp(&self, lp: Address) -> Result<&FakeLp> {
        if self.failing_pools.contains(&lp) {
            return Err(read_err("execution reverted"));
        }
        self.lps.get(&lp).ok_or_else(|| read_err("unknown pool"))
    }

    fn answer(&self, to: Address, data: &[u8]) -> Result<Vec<u8>> {
        if self.fail_all_reads {
            return Err(read_err("connection refused"));
        }
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| read_err("empty calldata"))?;

        let decode = |e: alloy_sol_types::Error| Error::decode("fake call", e);

        if selector == IERC20::balanceOfCall::SELECTOR {
            let call = IERC20::balanceOfCall::abi_decode(data).map_err(decode)?;
            let value = self.balances.get(&(to, call.owner)).copied().unwrap_or_default();
            Ok(value.abi_encode())
        } else if selector == IERC20::decimalsCall::SELECTOR {
            let decimals = self.decimals.get(&to).ok_or_else(|| read_err("no decimals"))?;
            Ok(U256::from(*decimals).abi_encode())
        } else if selector == IERC20::allowanceCall::SELECTOR {
            let call = IERC20::allowanceCall::abi_decode(data).map_err(decode)?;
            let value = self
                .allowances
                .get(&(to, call.owner, call.spender))
                .copied()
                .unwrap_or_default();
            Ok(value.abi_encode())
        } else if selector == IXRouter::exchangeEstimateCall::SELECTOR {
            let call = IXRouter::exchangeEstimateCall::abi_decode(data).map_err(decode)?;
            let (num, den) = self.estimate_rate.ok_or_else(|| read_err("execution reverted"))?;
            let out = call.amountIn * U256::from(num) / U256::from(den);
            Ok(out.abi_encode())
        } else if selector == IXRouter::getPairCall::SELECTOR {
            let call = IXRouter::getPairCall::abi_decode(data).map_err(decode)?;
            let pair = self
                .pairs
                .get(&(call.tokenA, call.tokenB))
                .or_else(|| self.pairs.get(&(call.tokenB, call.tokenA)))
                .copied()
                .unwrap_or(Address::ZERO);
            Ok(pair.abi_encode())
        } else if selector == IXRouter::getLpPriceCall::SELECTOR {
            let call = IXRouter::getLpPriceCall::abi_decode(data).map_err(decode)?;
            Ok(self.lp(call.lp)?.price.abi_encode())
        } else if selector == IXRouter::getLpPairCall::SELECTOR {
            let call = IXRouter::getLpPairCall::abi_decode(data).map_err(decode)?;
            let lp = self.lp(call.lp)?;
            Ok((lp.token0, lp.token1).abi_encode_params())
        } else if selector == IXRouter::getLpReserveCall::SELECTOR {
            let call = IXRouter::getLpReserveCall::abi_decode(data).map_err(decode)?;
            let lp = self.lp(call.lp)?;
            Ok((lp.reserve0, lp.reserve1).abi_encode_params())
        } else {
            Err(read_err("unknown selector"))
        }
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn call(&self, _chain_id: u64, to: Address, data: Bytes) -> Result<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        state.answer(to, &data).map(Bytes::from)
    }

    async fn native_balance(&self, _chain_id: u64, owner: Address) -> Result<U256> {
        let state = self.state.lock().unwrap();
        if state.fail_all_reads {
            return Err(read_err("connection refused"));
        }
        Ok(state.native.get(&owner).copied().unwrap_or_default())
    }

    async fn send_transaction(&self, request: WriteRequest) -> Result<B256> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.submit_error.clone() {
            return Err(err);
        }

        // A confirmed approval raises the allowance
        let succeeds = state.receipt_status.unwrap_or(ReceiptStatus::Success) == ReceiptStatus::Success
            && state.receipt_error.is_none();
        if succeeds {
            if let Ok(approve) = IERC20::approveCall::abi_decode(&request.data) {
                state
                    .allowances
                    .insert((request.to, request.from, approve.spender), approve.amount);
            }
        }

        state.submissions.push(request);
        Ok(B256::with_last_byte(state.submissions.len() as u8))
    }

    async fn wait_for_receipt(&self, _chain_id: u64, hash: B256) -> Result<TxReceipt> {
        let state = self.state.lock().unwrap();
        if let Some(err) = state.receipt_error.clone() {
            return Err(err);
        }
        Ok(TxReceipt {
            transaction_hash: hash,
            block_number: Some(100),
            gas_used: 21_000,
            status: state.receipt_status.unwrap_or(ReceiptStatus::Success),
        })
    }
}
