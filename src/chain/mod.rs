//! On-chain reads and writes
//!
//! - `abi`: contract interfaces and calldata builders
//! - `client`: the [`ChainClient`] seam and its alloy implementation
//! - `readers`: polled balance and allowance reads
//! - `tx`: submit → confirm orchestration

pub mod abi;
pub mod client;
pub mod readers;
pub mod tx;

pub use client::{ChainClient, ReceiptStatus, RpcChainClient, SharedClient, TxReceipt, WriteRequest};
pub use readers::{AllowanceReader, BalanceReader};
pub use tx::{NoHooks, TxHooks, TxOrchestrator};
