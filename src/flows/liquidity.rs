//! Liquidity Flow
//!
//! Two tokens, two approval gates checked in order (A, then B). Liquidity
//! is only added once neither leg needs approval and the router knows a pool
//! for the pair.

use alloy_primitives::{Address, U256};
use serde::Serialize;
use tracing::{info, warn};

use super::{
    current_allowance, fetch_quote, needs_approval, positive_amount, require_known_allowance,
    FlowContext, Quote,
};
use crate::chain::abi::{approve_calldata, lp_subscribe_calldata, IXRouter};
use crate::chain::client::{read_call, ChainClient, TxReceipt, WriteRequest};
use crate::chain::tx::TxHooks;
use crate::error::{Error, Result};
use crate::format::{format_amount, is_valid_amount_input};
use crate::networks::{self, Token};
use crate::notify::Notification;

const INVALID_LIQUIDITY_INPUT: &str = "Please enter valid amounts for both tokens";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Leg {
    A,
    B,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiquidityForm {
    pub chain_id: u64,
    pub token_a: Option<Token>,
    pub token_b: Option<Token>,
    pub amount_a: String,
    pub amount_b: String,
}

impl LiquidityForm {
    pub fn new(chain_id: u64) -> Self {
        let (token_a, token_b) = networks::default_pair(chain_id);
        Self {
            chain_id,
            token_a,
            token_b,
            amount_a: String::new(),
            amount_b: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiquidityStep {
    Approved { leg: Leg, receipt: TxReceipt },
    Added { pool: Address, receipt: TxReceipt },
}

/// Router pool for the pair, [`Error::PoolNotFound`] on the zero address
pub async fn resolve_pool(
    client: &dyn ChainClient,
    chain_id: u64,
    router: Address,
    token_a: &Token,
    token_b: &Token,
) -> Result<Address> {
    let pair = read_call(
        client,
        chain_id,
        router,
        &IXRouter::getPairCall { tokenA: token_a.address, tokenB: token_b.address },
    )
    .await?;

    if pair.is_zero() {
        return Err(Error::PoolNotFound { token_a: token_a.address, token_b: token_b.address });
    }
    Ok(pair)
}

pub struct LiquidityFlow {
    ctx: FlowContext,
    form: LiquidityForm,
    quote: Option<Quote>,
    allowance_a: Option<U256>,
    allowance_b: Option<U256>,
}

impl LiquidityFlow {
    pub fn new(ctx: FlowContext, chain_id: u64) -> Self {
        Self {
            ctx,
            form: LiquidityForm::new(chain_id),
            quote: None,
            allowance_a: None,
            allowance_b: None,
        }
    }

    pub fn form(&self) -> &LiquidityForm {
        &self.form
    }

    pub fn quote(&self) -> Option<Quote> {
        self.quote
    }

    pub fn set_chain(&mut self, chain_id: u64) {
        if self.form.chain_id != chain_id {
            self.form = LiquidityForm::new(chain_id);
            self.quote = None;
            self.allowance_a = None;
            self.allowance_b = None;
        }
    }

    pub fn select_token(&mut self, leg: Leg, token: Token) -> Result<()> {
        let other = match leg {
            Leg::A => self.form.token_b,
            Leg::B => self.form.token_a,
        };
        if other.map(|t| t.address) == Some(token.address) {
            return Err(Error::SameToken { symbol: token.symbol.to_string() });
        }
        match leg {
            Leg::A => {
                self.form.token_a = Some(token);
                self.allowance_a = None;
            }
            Leg::B => {
                self.form.token_b = Some(token);
                self.allowance_b = None;
            }
        }
        self.quote = None;
        self.form.amount_b.clear();
        Ok(())
    }

    pub fn choices(&self, leg: Leg, query: &str) -> Vec<Token> {
        let other = match leg {
            Leg::A => self.form.token_b,
            Leg::B => self.form.token_a,
        };
        networks::selectable_tokens(self.form.chain_id, query, other.as_ref())
    }

    pub fn set_amount_a(&mut self, value: &str) -> Result<()> {
        if !is_valid_amount_input(value) {
            return Err(Error::InvalidInput(format!("'{}' is not a valid amount", value)));
        }
        self.form.amount_a = value.to_string();
        self.quote = None;
        self.form.amount_b.clear();
        Ok(())
    }

    /// Manual override of the quoted side
    pub fn set_amount_b(&mut self, value: &str) -> Result<()> {
        if !is_valid_amount_input(value) {
            return Err(Error::InvalidInput(format!("'{}' is not a valid amount", value)));
        }
        self.form.amount_b = value.to_string();
        Ok(())
    }

    fn amounts(&self) -> Option<(Token, Token, U256, U256)> {
        let (a, b) = (self.form.token_a?, self.form.token_b?);
        let amount_a = positive_amount(&self.form.amount_a, a.decimals)?;
        let amount_b = positive_amount(&self.form.amount_b, b.decimals)?;
        Some((a, b, amount_a, amount_b))
    }

    /// First leg whose allowance is below its amount
    pub fn pending_approval(&self) -> Option<(Leg, Token)> {
        let (a, b) = (self.form.token_a?, self.form.token_b?);
        if let Some(amount) = positive_amount(&self.form.amount_a, a.decimals) {
            if needs_approval(&a, self.allowance_a, amount) {
                return Some((Leg::A, a));
            }
        }
        if let Some(amount) = positive_amount(&self.form.amount_b, b.decimals) {
            if needs_approval(&b, self.allowance_b, amount) {
                return Some((Leg::B, b));
            }
        }
        None
    }

    pub fn primary_action_label(&self) -> String {
        if !self.ctx.is_connected() {
            return "Connect Wallet".to_string();
        }
        if self.form.amount_a.is_empty() || self.form.amount_b.is_empty() {
            return "Enter Amounts".to_string();
        }
        match self.pending_approval() {
            Some((_, token)) => format!("Approve {}", token.symbol),
            None => "Add Liquidity".to_string(),
        }
    }

    /// Re-read both allowances; a failed read keeps the cached value
    pub async fn refresh_allowances(&mut self) {
        let chain_id = self.form.chain_id;
        if let Some(a) = self.form.token_a {
            if let Ok(allowance) = current_allowance(&self.ctx, chain_id, &a).await {
                self.allowance_a = allowance;
            }
        }
        if let Some(b) = self.form.token_b {
            if let Ok(allowance) = current_allowance(&self.ctx, chain_id, &b).await {
                self.allowance_b = allowance;
            }
        }
    }

    /// Quote amount B from amount A through the swap quote path
    pub async fn refresh_quote(&mut self) -> Result<Option<Quote>> {
        let (Some(a), Some(b)) = (self.form.token_a, self.form.token_b) else {
            return Ok(None);
        };
        let Some(amount_a) = positive_amount(&self.form.amount_a, a.decimals) else {
            self.quote = None;
            self.form.amount_b.clear();
            return Ok(None);
        };

        let quote = fetch_quote(
            self.ctx.client.as_ref(),
            self.form.chain_id,
            &a,
            &b,
            amount_a,
            self.ctx.settings.allow_mock_quotes,
        )
        .await;

        match quote {
            Ok(quote) => {
                self.form.amount_b = format_amount(quote.amount_out, b.decimals);
                self.quote = Some(quote);
                self.refresh_allowances().await;
                Ok(Some(quote))
            }
            Err(e) => {
                warn!("Could not quote {} for {}: {}", b.symbol, a.symbol, e);
                self.quote = None;
                Err(e)
            }
        }
    }

    /// Approve the first gated leg, or add liquidity when none is gated
    pub async fn execute(&mut self, hooks: &dyn TxHooks) -> Result<LiquidityStep> {
        let from = self.ctx.account()?;
        let chain_id = self.form.chain_id;

        let Some(router) = networks::router_address(chain_id) else {
            let err = Error::RouterNotFound { chain_id };
            self.ctx.reject("Transaction failed", &err);
            return Err(err);
        };

        let Some((token_a, token_b, amount_a, amount_b)) = self.amounts() else {
            return Err(self.ctx.reject_input(INVALID_LIQUIDITY_INPUT));
        };

        self.ctx.align_chain(chain_id).await?;

        // No approval is worth signing for a pair without a pool
        let pool = match resolve_pool(self.ctx.client.as_ref(), chain_id, router, &token_a, &token_b).await {
            Ok(pool) => pool,
            Err(e) => {
                self.ctx.reject("Transaction failed", &e);
                return Err(e);
            }
        };

        self.refresh_allowances().await;
        let known = require_known_allowance(&token_a, self.allowance_a)
            .and_then(|_| require_known_allowance(&token_b, self.allowance_b));
        if let Err(err) = known {
            self.ctx.reject("Transaction failed", &err);
            return Err(err);
        }

        if let Some((leg, token)) = self.pending_approval() {
            let amount = match leg {
                Leg::A => amount_a,
                Leg::B => amount_b,
            };
            info!("Approving {} for router {} (leg {:?})", token.symbol, router, leg);
            let request = WriteRequest {
                chain_id,
                from,
                to: token.address,
                data: approve_calldata(router, amount),
                value: U256::ZERO,
            };
            let receipt = self.ctx.orchestrator.execute("approve", request, hooks).await?;
            self.refresh_allowances().await;
            return Ok(LiquidityStep::Approved { leg, receipt });
        }

        // Native legs travel as value
        let value = [(token_a, amount_a), (token_b, amount_b)]
            .iter()
            .filter(|(t, _)| t.is_native())
            .fold(U256::ZERO, |acc, (_, amount)| acc + *amount);

        let request = WriteRequest {
            chain_id,
            from,
            to: router,
            data: lp_subscribe_calldata(pool, amount_a, amount_b),
            value,
        };
        let receipt = self.ctx.orchestrator.execute("add liquidity", request, hooks).await?;

        self.ctx.notifier.notify(Notification::info(
            "Liquidity added",
            format!(
                "Added {} {} and {} {} to the pool",
                self.form.amount_a, token_a.symbol, self.form.amount_b, token_b.symbol
            ),
        ));
        self.form.amount_a.clear();
        self.form.amount_b.clear();
        self.quote = None;
        Ok(LiquidityStep::Added { pool, receipt })
    }
}
