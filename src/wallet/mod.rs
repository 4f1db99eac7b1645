//! Wallet connection
//!
//! The provider bridge speaks EIP-1193 style requests and events; the
//! adapter keeps the session's view of the connected account in sync.

pub mod adapter;
pub mod provider;

pub use adapter::{WalletAdapter, WalletState, WalletUpdate};
pub use provider::{ProviderEvent, RpcWalletProvider, SharedProvider, WalletProvider};
