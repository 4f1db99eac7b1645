//! Network and token registry
//!
//! Static, chain-id keyed metadata for the two supported networks:
//! - Conflux eSpace (1030)
//! - Base (8453)
//!
//! Every lookup returns `None` or an empty slice for an unknown chain id.

use alloy_primitives::{address, Address};
use serde::Serialize;

pub const CONFLUX_CHAIN_ID: u64 = 1030;
pub const BASE_CHAIN_ID: u64 = 8453;

/// Sentinel address used for the chain's native currency
pub const NATIVE_TOKEN_ADDRESS: Address = Address::ZERO;

/// Represents a token offered in the picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token {
    pub name: &'static str,
    pub symbol: &'static str,
    pub address: Address,
    pub decimals: u8,
    pub logo_uri: &'static str,
}

impl Token {
    /// Native currency has no contract, and therefore no allowance
    pub fn is_native(&self) -> bool {
        self.address == NATIVE_TOKEN_ADDRESS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NativeCurrency {
    pub name: &'static str,
    pub symbol: &'static str,
    pub decimals: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkInfo {
    pub chain_id: u64,
    pub name: &'static str,
    pub native_currency: NativeCurrency,
    pub rpc_urls: &'static [&'static str],
    pub explorer_urls: &'static [&'static str],
    pub tokens: &'static [Token],
    pub router: Address,
}

impl NetworkInfo {
    /// `0x`-prefixed chain id as wallets expect it
    pub fn hex_chain_id(&self) -> String {
        format!("{:#x}", self.chain_id)
    }

    /// Parameters for `wallet_addEthereumChain`
    pub fn add_chain_params(&self) -> serde_json::Value {
        serde_json::json!([{
            "chainId": self.hex_chain_id(),
            "chainName": self.name,
            "nativeCurrency": {
                "name": self.native_currency.name,
                "symbol": self.native_currency.symbol,
                "decimals": self.native_currency.decimals,
            },
            "rpcUrls": self.rpc_urls,
            "blockExplorerUrls": self.explorer_urls,
        }])
    }

    pub fn explorer_tx_url(&self, hash: &str) -> Option<String> {
        self.explorer_urls
            .first()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), hash))
    }
}

// ============================================
// CONFLUX eSPACE
// ============================================

const CONFLUX_TOKENS: &[Token] = &[
    Token {
        name: "Conflux",
        symbol: "CFX",
        address: NATIVE_TOKEN_ADDRESS,
        decimals: 18,
        logo_uri: "https://cryptologos.cc/logos/conflux-cfx-logo.png",
    },
    Token {
        name: "Wrapped Conflux",
        symbol: "WCFX",
        address: address!("14b2D3bC65e74DAE1030EAFd8ac30c533c976A9b"),
        decimals: 18,
        logo_uri: "https://cryptologos.cc/logos/conflux-cfx-logo.png",
    },
    Token {
        name: "cUSDT",
        symbol: "cUSDT",
        address: address!("fe97E85d13ABD9c1c33384E796F10B73905637cE"),
        decimals: 18,
        logo_uri: "https://cryptologos.cc/logos/tether-usdt-logo.png",
    },
];

// ============================================
// BASE
// ============================================

const BASE_TOKENS: &[Token] = &[
    Token {
        name: "Ether",
        symbol: "ETH",
        address: NATIVE_TOKEN_ADDRESS,
        decimals: 18,
        logo_uri: "https://cryptologos.cc/logos/ethereum-eth-logo.png",
    },
    Token {
        name: "Wrapped Ether",
        symbol: "WETH",
        address: address!("4200000000000000000000000000000000000006"),
        decimals: 18,
        logo_uri: "https://cryptologos.cc/logos/ethereum-eth-logo.png",
    },
    Token {
        name: "USD Coin",
        symbol: "USDC",
        address: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
        decimals: 6,
        logo_uri: "https://cryptologos.cc/logos/usd-coin-usdc-logo.png",
    },
    Token {
        name: "Dai Stablecoin",
        symbol: "DAI",
        address: address!("50c5725949A6F0c72E6C4a641F24049A917DB0Cb"),
        decimals: 18,
        logo_uri: "https://cryptologos.cc/logos/multi-collateral-dai-dai-logo.png",
    },
];

pub static NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        chain_id: CONFLUX_CHAIN_ID,
        name: "Conflux eSpace",
        native_currency: NativeCurrency { name: "Conflux", symbol: "CFX", decimals: 18 },
        rpc_urls: &["https://evm.confluxrpc.com"],
        explorer_urls: &["https://evm.confluxscan.io"],
        tokens: CONFLUX_TOKENS,
        router: address!("14b2D3bC65e74DAE1030EAFd8ac30c533c976A9b"),
    },
    NetworkInfo {
        chain_id: BASE_CHAIN_ID,
        name: "Base",
        native_currency: NativeCurrency { name: "Ether", symbol: "ETH", decimals: 18 },
        rpc_urls: &["https://mainnet.base.org"],
        explorer_urls: &["https://basescan.org"],
        tokens: BASE_TOKENS,
        router: address!("2626664c2603336E57B271c5C0b26F421741e481"),
    },
];

// ============================================
// LP POOLS (dashboard)
// ============================================

/// Chain the LP dashboard reads from
pub const LP_CHAIN_ID: u64 = CONFLUX_CHAIN_ID;

pub const LP_POOLS: [Address; 4] = [
    address!("c9931ef4a3e615c68f2cc500421933c42e289bf2"),
    address!("b39998b456287e26af80c629f804c4e32f2df19d"),
    address!("808678cb912d3f8719ea39a2db79b813e374ab0c"),
    address!("f850b3b01e0effbc08113e19a108894e7bd416e8"),
];

// ============================================
// LOOKUPS
// ============================================

pub fn network(chain_id: u64) -> Option<&'static NetworkInfo> {
    NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

pub fn router_address(chain_id: u64) -> Option<Address> {
    network(chain_id).map(|n| n.router)
}

pub fn tokens_for(chain_id: u64) -> &'static [Token] {
    network(chain_id).map(|n| n.tokens).unwrap_or(&[])
}

pub fn supported_chain_ids() -> Vec<u64> {
    NETWORKS.iter().map(|n| n.chain_id).collect()
}

/// Case-insensitive symbol lookup
pub fn find_token(chain_id: u64, symbol: &str) -> Option<Token> {
    tokens_for(chain_id)
        .iter()
        .find(|t| t.symbol.eq_ignore_ascii_case(symbol))
        .copied()
}

pub fn token_by_address(chain_id: u64, address: Address) -> Option<Token> {
    tokens_for(chain_id).iter().find(|t| t.address == address).copied()
}

/// Tokens offered by the picker: symbol matches `query` and the token is not
/// the one already selected on the other leg.
pub fn selectable_tokens(chain_id: u64, query: &str, other: Option<&Token>) -> Vec<Token> {
    let query = query.to_lowercase();
    tokens_for(chain_id)
        .iter()
        .filter(|t| t.symbol.to_lowercase().contains(&query))
        .filter(|t| other.map_or(true, |o| o.address != t.address))
        .copied()
        .collect()
}

/// First two tokens of the network, used to seed a fresh pair form
pub fn default_pair(chain_id: u64) -> (Option<Token>, Option<Token>) {
    let tokens = tokens_for(chain_id);
    (tokens.first().copied(), tokens.get(1).copied())
}
