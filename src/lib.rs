//! xswap - swaps, liquidity and LP prices against the X router
//!
//! Supports Conflux eSpace (1030) and Base (8453). The wallet is reached
//! through a JSON-RPC endpoint that holds the user's accounts; reads go to
//! the public RPC of each network.

pub mod chain;
pub mod config;
pub mod error;
pub mod flows;
pub mod format;
pub mod networks;
pub mod notify;
pub mod poll;
pub mod session;
pub mod views;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
