//! Configuration for xswap
//!
//! Values come from the environment (with `.env` support) or from a TOML
//! file. Every key has a default, so an empty environment yields a usable
//! read-only session on Conflux eSpace.

use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::networks::{self, BASE_CHAIN_ID, CONFLUX_CHAIN_ID};

/// Basis points in 100%
pub const BPS_DENOMINATOR: u64 = 10_000;

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // ========== Network Settings ==========
    /// Chain the forms open on (1030 = Conflux eSpace)
    pub default_chain_id: u64,

    /// Override for the Conflux eSpace read RPC
    pub conflux_rpc_url: Option<String>,

    /// Override for the Base read RPC
    pub base_rpc_url: Option<String>,

    // ========== Wallet Settings ==========
    /// JSON-RPC endpoint of the wallet that holds the keys.
    /// Without it the session runs with no provider.
    pub wallet_rpc_url: Option<String>,

    // ========== Polling ==========
    /// Balance, allowance, wallet and LP price refresh
    pub poll_interval_secs: u64,

    /// Quote refresh while an amount is entered
    pub quote_interval_secs: u64,

    // ========== Trade Settings ==========
    /// Minimum-output tolerance in basis points (50 = 0.5%)
    pub slippage_bps: u64,

    /// Seconds from now until a swap expires
    pub deadline_secs: u64,

    /// Serve a static rate when the router cannot quote.
    /// Mock quotes are labelled as such wherever they are shown.
    pub allow_mock_quotes: bool,

    // ========== Confirmation ==========
    pub receipt_timeout_secs: u64,
    pub receipt_poll_secs: u64,
}

fn var_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    /// Build from any key/value source; missing or unparsable keys fall back
    /// to their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            // Network
            default_chain_id: var_or(&lookup, "DEFAULT_CHAIN_ID", defaults.default_chain_id),
            conflux_rpc_url: non_empty(&lookup, "CONFLUX_RPC_URL"),
            base_rpc_url: non_empty(&lookup, "BASE_RPC_URL"),

            // Wallet
            wallet_rpc_url: non_empty(&lookup, "WALLET_RPC_URL"),

            // Polling
            poll_interval_secs: var_or(&lookup, "POLL_INTERVAL_SECS", defaults.poll_interval_secs),
            quote_interval_secs: var_or(&lookup, "QUOTE_INTERVAL_SECS", defaults.quote_interval_secs),

            // Trade
            slippage_bps: var_or(&lookup, "SLIPPAGE_BPS", defaults.slippage_bps),
            deadline_secs: var_or(&lookup, "DEADLINE_SECS", defaults.deadline_secs),
            allow_mock_quotes: var_or(&lookup, "ALLOW_MOCK_QUOTES", defaults.allow_mock_quotes),

            // Confirmation
            receipt_timeout_secs: var_or(&lookup, "RECEIPT_TIMEOUT_SECS", defaults.receipt_timeout_secs),
            receipt_poll_secs: var_or(&lookup, "RECEIPT_POLL_SECS", defaults.receipt_poll_secs),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Read RPC for `chain_id`: the override if set, else the registry's first URL
    pub fn rpc_url_for(&self, chain_id: u64) -> Option<String> {
        let configured = match chain_id {
            CONFLUX_CHAIN_ID => self.conflux_rpc_url.clone(),
            BASE_CHAIN_ID => self.base_rpc_url.clone(),
            _ => None,
        };
        configured.or_else(|| {
            networks::network(chain_id)
                .and_then(|n| n.rpc_urls.first())
                .map(|u| u.to_string())
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn quote_interval(&self) -> Duration {
        Duration::from_secs(self.quote_interval_secs)
    }

    /// Share of the quote kept as minimum output, in basis points
    pub fn min_out_bps(&self) -> u64 {
        BPS_DENOMINATOR.saturating_sub(self.slippage_bps)
    }

    /// Validate configuration before opening a session
    pub fn validate(&self) -> Result<()> {
        if networks::network(self.default_chain_id).is_none() {
            return Err(eyre::eyre!(
                "DEFAULT_CHAIN_ID {} is not a supported network (expected one of {:?})",
                self.default_chain_id,
                networks::supported_chain_ids()
            ));
        }

        for (key, value) in [
            ("CONFLUX_RPC_URL", &self.conflux_rpc_url),
            ("BASE_RPC_URL", &self.base_rpc_url),
            ("WALLET_RPC_URL", &self.wallet_rpc_url),
        ] {
            if let Some(raw) = value {
                Url::parse(raw).map_err(|e| eyre::eyre!("Invalid {} '{}': {}", key, raw, e))?;
            }
        }

        if self.slippage_bps >= BPS_DENOMINATOR {
            return Err(eyre::eyre!(
                "SLIPPAGE_BPS must be below {} (currently {})",
                BPS_DENOMINATOR,
                self.slippage_bps
            ));
        }
        if self.poll_interval_secs == 0 || self.quote_interval_secs == 0 {
            return Err(eyre::eyre!("Polling intervals must be at least 1 second"));
        }
        if self.receipt_poll_secs == 0 || self.receipt_timeout_secs < self.receipt_poll_secs {
            return Err(eyre::eyre!(
                "RECEIPT_TIMEOUT_SECS ({}) must cover at least one RECEIPT_POLL_SECS ({})",
                self.receipt_timeout_secs,
                self.receipt_poll_secs
            ));
        }
        if self.deadline_secs == 0 {
            return Err(eyre::eyre!("DEADLINE_SECS must be positive"));
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let network_name = networks::network(self.default_chain_id)
            .map(|n| n.name)
            .unwrap_or("unknown");

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                  XSWAP - CONFIGURATION                     ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Default Network:   {:^40} ║", format!("{} ({})", network_name, self.default_chain_id));
        println!("║ Conflux RPC:       {:^40} ║", self.rpc_url_for(CONFLUX_CHAIN_ID).unwrap_or_default());
        println!("║ Base RPC:          {:^40} ║", self.rpc_url_for(BASE_CHAIN_ID).unwrap_or_default());
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ WALLET                                                     ║");
        println!("║ • Provider:        {:^40} ║",
            if self.wallet_rpc_url.is_some() { "✓ Configured" } else { "✗ Not Set" }
        );
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ TRADING                                                    ║");
        println!("║ • Slippage:        {:>38.2}% ║", self.slippage_bps as f64 / 100.0);
        println!("║ • Deadline:        {:>38}s ║", self.deadline_secs);
        println!("║ • Mock Quotes:     {:^40} ║",
            if self.allow_mock_quotes { "⚠ Allowed" } else { "✓ Disabled" }
        );
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ POLLING                                                    ║");
        println!("║ • Balances/LP:     {:>38}s ║", self.poll_interval_secs);
        println!("║ • Quotes:          {:>38}s ║", self.quote_interval_secs);
        println!("║ • Receipt Timeout: {:>38}s ║", self.receipt_timeout_secs);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_chain_id: CONFLUX_CHAIN_ID,
            conflux_rpc_url: None,
            base_rpc_url: None,
            wallet_rpc_url: None,
            poll_interval_secs: 10,
            quote_interval_secs: 10,
            slippage_bps: 50,
            deadline_secs: 1200,
            allow_mock_quotes: false,
            receipt_timeout_secs: 120,
            receipt_poll_secs: 2,
        }
    }
}

// ============================================
// TESTS
// ============================================
