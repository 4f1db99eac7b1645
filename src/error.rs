//! Error types for xswap
//!
//! Every error is scoped to the action that raised it. Nothing here is
//! fatal to the process and nothing is retried automatically.

use alloy_primitives::{Address, B256};
use thiserror::Error;

use crate::notify::truncate_error_message;

/// EIP-1193 "unrecognized chain" code returned by `wallet_switchEthereumChain`
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

/// EIP-1193 "user rejected request" code
pub const USER_REJECTED_CODE: i64 = 4001;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    /// No wallet bridge is configured or reachable
    #[error("Wallet not found. Please configure a wallet provider to use this application")]
    ProviderAbsent,

    /// The wallet rejected or failed a request
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// Action requires a connected wallet
    #[error("Wallet not connected")]
    WalletNotConnected,

    /// No router is configured for the chain
    #[error("Router contract not found for this network")]
    RouterNotFound { chain_id: u64 },

    /// Chain id missing from the registry
    #[error("Network {chain_id} not found")]
    UnsupportedChain { chain_id: u64 },

    /// `getPair` resolved to the zero address
    #[error("Liquidity pool does not exist for this pair")]
    PoolNotFound { token_a: Address, token_b: Address },

    /// Form validation failed before any call was made
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Both legs of a pair would reference the same contract
    #[error("{symbol} is already selected on the other side")]
    SameToken { symbol: String },

    /// No quote could be produced for the pair
    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    /// A previous transaction is still in flight
    #[error("A transaction is already in progress")]
    Busy,

    /// eth_call / eth_getBalance failed
    #[error("Read failed: {0}")]
    Read(String),

    /// eth_sendTransaction failed
    #[error("{0}")]
    Submit(String),

    /// Receipt reported `status = 0`
    #[error("Transaction {hash} reverted")]
    Reverted { hash: B256 },

    /// Receipt polling failed or timed out
    #[error("Transaction confirmation failed: {0}")]
    Confirm(String),

    #[error("Failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },
}

impl Error {
    /// Message suitable for a notification body
    pub fn user_message(&self) -> String {
        truncate_error_message(&self.to_string())
    }

    pub fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Decode { what, message: err.to_string() }
    }
}

/// Error returned by the wallet bridge, keeping the EIP-1193 code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == UNRECOGNIZED_CHAIN_CODE
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED_CODE
    }
}

impl From<alloy_transport::TransportError> for ProviderError {
    fn from(err: alloy_transport::TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => ProviderError::new(payload.code, payload.message.to_string()),
            None => ProviderError::new(-32603, err.to_string()),
        }
    }
}
