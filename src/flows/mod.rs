//! Form state machines for the three views
//!
//! Each flow owns its form and is driven by a single task. Shared pieces
//! live here: the context a flow is built from, router quotes, and the
//! approval gate.

pub mod liquidity;
pub mod lp_price;
pub mod swap;

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use serde::Serialize;
use tracing::{debug, warn};

use crate::chain::abi::IXRouter;
use crate::chain::client::{read_call, ChainClient, SharedClient};
use crate::chain::readers;
use crate::chain::tx::TxOrchestrator;
use crate::config::{Config, BPS_DENOMINATOR};
use crate::error::{Error, Result};
use crate::format::{format_amount, parse_amount, to_fixed};
use crate::networks::{self, Token};
use crate::notify::{Notification, Notifier};
use crate::wallet::adapter::WalletAdapter;

pub use liquidity::LiquidityFlow;
pub use lp_price::LpPriceBoard;
pub use swap::SwapFlow;

/// Static rate used when the router cannot quote and mocks are allowed
pub const MOCK_RATE_NATIVE_CFX: f64 = 25.5;
pub const MOCK_RATE_DEFAULT: f64 = 0.039;

/// Trade parameters taken from [`Config`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeSettings {
    /// Share of the quote required as minimum output, in basis points
    pub min_out_bps: u64,
    pub deadline_secs: u64,
    pub allow_mock_quotes: bool,
}

impl TradeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_out_bps: config.min_out_bps(),
            deadline_secs: config.deadline_secs,
            allow_mock_quotes: config.allow_mock_quotes,
        }
    }
}

impl Default for TradeSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Everything a flow needs from the session
#[derive(Clone)]
pub struct FlowContext {
    pub client: SharedClient,
    pub wallet: Arc<WalletAdapter>,
    pub orchestrator: Arc<TxOrchestrator>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: TradeSettings,
}

impl FlowContext {
    /// Connected account, or [`Error::WalletNotConnected`]
    pub fn account(&self) -> Result<Address> {
        self.wallet.state().account()
    }

    pub fn is_connected(&self) -> bool {
        self.wallet.state().is_connected
    }

    pub(crate) fn reject(&self, title: &str, err: &Error) {
        self.notifier.notify(Notification::error(title, err.user_message()));
    }

    /// Notify a form validation failure with its bare message
    pub(crate) fn reject_input(&self, message: &str) -> Error {
        self.notifier.notify(Notification::error("Invalid input", message));
        Error::InvalidInput(message.to_string())
    }

    /// Make sure the wallet is on `chain_id` before a write
    pub(crate) async fn align_chain(&self, chain_id: u64) -> Result<()> {
        if self.wallet.state().chain_id != Some(chain_id) {
            self.wallet.switch_chain(chain_id).await?;
        }
        Ok(())
    }
}

// ============================================
// QUOTES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuoteSource {
    OnChain,
    Mock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub amount_out: U256,
    pub source: QuoteSource,
}

impl Quote {
    pub fn is_mock(&self) -> bool {
        self.source == QuoteSource::Mock
    }
}

pub fn mock_rate(token_in: &Token) -> f64 {
    if token_in.symbol == "CFX" {
        MOCK_RATE_NATIVE_CFX
    } else {
        MOCK_RATE_DEFAULT
    }
}

fn mock_quote(token_in: &Token, token_out: &Token, amount_in: U256) -> Result<Quote> {
    let amount: f64 = format_amount(amount_in, token_in.decimals)
        .parse()
        .map_err(|e| Error::QuoteUnavailable(format!("{}", e)))?;
    let out = to_fixed(amount * mock_rate(token_in), 6);
    Ok(Quote {
        amount_out: parse_amount(&out, token_out.decimals)?,
        source: QuoteSource::Mock,
    })
}

/// Router estimate for `amount_in`, falling back to the mock rate only when
/// `allow_mock` is set
pub async fn fetch_quote(
    client: &dyn ChainClient,
    chain_id: u64,
    token_in: &Token,
    token_out: &Token,
    amount_in: U256,
    allow_mock: bool,
) -> Result<Quote> {
    let router = networks::router_address(chain_id).ok_or(Error::RouterNotFound { chain_id })?;

    let estimate = read_call(
        client,
        chain_id,
        router,
        &IXRouter::exchangeEstimateCall {
            tokenIn: token_in.address,
            tokenOut: token_out.address,
            amountIn: amount_in,
        },
    )
    .await;

    match estimate {
        Ok(amount_out) => {
            debug!("Quote {} {} -> {} {}", amount_in, token_in.symbol, amount_out, token_out.symbol);
            Ok(Quote { amount_out, source: QuoteSource::OnChain })
        }
        Err(e) if allow_mock => {
            warn!("Router quote failed ({}), serving mock rate", e);
            mock_quote(token_in, token_out, amount_in)
        }
        Err(e) => Err(Error::QuoteUnavailable(e.to_string())),
    }
}

// ============================================
// APPROVAL GATE
// ============================================

/// Approval is needed only for a non-native token with a known allowance
/// below `amount`
pub fn needs_approval(token: &Token, allowance: Option<U256>, amount: U256) -> bool {
    !token.is_native() && allowance.map_or(false, |a| a < amount)
}

/// Allowance for the connected account, `None` when there is nothing to read.
/// A failed read is logged and returned so callers can keep what they had.
pub(crate) async fn current_allowance(ctx: &FlowContext, chain_id: u64, token: &Token) -> Result<Option<U256>> {
    let owner = ctx.account().ok();
    readers::fetch_allowance(ctx.client.as_ref(), Some(chain_id), Some(token), owner)
        .await
        .inspect_err(|e| warn!("Error getting {} allowance: {}", token.symbol, e))
}

/// A write on `token` needs a known allowance unless the token is native
pub(crate) fn require_known_allowance(token: &Token, allowance: Option<U256>) -> Result<()> {
    if token.is_native() || allowance.is_some() {
        return Ok(());
    }
    Err(Error::Read(format!("{} allowance is unknown, try again", token.symbol)))
}

/// Positive amount from a form field
pub(crate) fn positive_amount(raw: &str, decimals: u8) -> Option<U256> {
    parse_amount(raw, decimals).ok().filter(|a| !a.is_zero())
}

/// `quoted * bps / 10_000`
pub fn apply_bps(amount: U256, bps: u64) -> U256 {
    amount * U256::from(bps) / U256::from(BPS_DENOMINATOR)
}
