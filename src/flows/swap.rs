//! Swap Flow
//!
//! `Idle → Quoting → (NeedsApproval | ReadyToSwap) → Approving → ReadyToSwap
//! → Swapping → Idle`
//!
//! The primary action either approves the router for the input amount or
//! submits `xexchange`. An approval is its own transaction: after it lands
//! the flow is ready to swap and the caller triggers the action again.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    apply_bps, current_allowance, fetch_quote, needs_approval, positive_amount,
    require_known_allowance, FlowContext, Quote,
};
use crate::chain::abi::{approve_calldata, xexchange_calldata};
use crate::chain::client::{TxReceipt, WriteRequest};
use crate::chain::readers;
use crate::chain::tx::TxHooks;
use crate::error::{Error, Result};
use crate::format::{format_amount, is_valid_amount_input};
use crate::networks::{self, Token};
use crate::notify::Notification;
use crate::poll::{spawn_poller, PollTask};

const INVALID_SWAP_INPUT: &str = "Please enter a valid amount and select tokens";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwapPhase {
    Idle,
    Quoting,
    NeedsApproval,
    ReadyToSwap,
    Approving,
    Swapping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapForm {
    pub chain_id: u64,
    pub token_in: Option<Token>,
    pub token_out: Option<Token>,
    pub amount_in: String,
    pub amount_out: String,
}

impl SwapForm {
    /// Fresh form with the network's default pair
    pub fn new(chain_id: u64) -> Self {
        let (token_in, token_out) = networks::default_pair(chain_id);
        Self {
            chain_id,
            token_in,
            token_out,
            amount_in: String::new(),
            amount_out: String::new(),
        }
    }
}

/// What a primary action accomplished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapStep {
    Approved(TxReceipt),
    Swapped(TxReceipt),
}

/// Build the `xexchange` write.
///
/// `min_out = quoted_out * min_out_bps / 10_000` and the deadline is
/// `now_secs + deadline_secs`. A native input carries `amount_in` as value.
#[allow(clippy::too_many_arguments)]
pub fn build_swap_call(
    chain_id: u64,
    from: Address,
    router: Address,
    token_in: &Token,
    token_out: &Token,
    amount_in: U256,
    quoted_out: U256,
    min_out_bps: u64,
    deadline_secs: u64,
    now_secs: u64,
) -> WriteRequest {
    let min_out = apply_bps(quoted_out, min_out_bps);
    let deadline = U256::from(now_secs + deadline_secs);

    WriteRequest {
        chain_id,
        from,
        to: router,
        data: xexchange_calldata(token_in.address, token_out.address, amount_in, min_out, deadline),
        value: if token_in.is_native() { amount_in } else { U256::ZERO },
    }
}

pub fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// A flow shared between the caller and its quote timer
pub type SharedSwapFlow = Arc<Mutex<SwapFlow>>;

pub struct SwapFlow {
    ctx: FlowContext,
    form: SwapForm,
    phase: SwapPhase,
    quote: Option<Quote>,
    allowance: Option<U256>,
    balance: String,
}

impl SwapFlow {
    pub fn new(ctx: FlowContext, chain_id: u64) -> Self {
        Self {
            ctx,
            form: SwapForm::new(chain_id),
            phase: SwapPhase::Idle,
            quote: None,
            allowance: None,
            balance: readers::ZERO_BALANCE.to_string(),
        }
    }

    pub fn form(&self) -> &SwapForm {
        &self.form
    }

    pub fn phase(&self) -> SwapPhase {
        self.phase
    }

    pub fn quote(&self) -> Option<Quote> {
        self.quote
    }

    pub fn balance(&self) -> &str {
        &self.balance
    }

    /// Move the form to another network and reset it
    pub fn set_chain(&mut self, chain_id: u64) {
        if self.form.chain_id != chain_id {
            self.form = SwapForm::new(chain_id);
            self.reset_quote();
            self.allowance = None;
            self.balance = readers::ZERO_BALANCE.to_string();
        }
    }

    pub fn select_token_in(&mut self, token: Token) -> Result<()> {
        if self.form.token_out.map(|t| t.address) == Some(token.address) {
            return Err(Error::SameToken { symbol: token.symbol.to_string() });
        }
        self.form.token_in = Some(token);
        self.allowance = None;
        self.reset_quote();
        Ok(())
    }

    pub fn select_token_out(&mut self, token: Token) -> Result<()> {
        if self.form.token_in.map(|t| t.address) == Some(token.address) {
            return Err(Error::SameToken { symbol: token.symbol.to_string() });
        }
        self.form.token_out = Some(token);
        self.reset_quote();
        Ok(())
    }

    /// Tokens the picker offers for the input leg
    pub fn input_choices(&self, query: &str) -> Vec<Token> {
        networks::selectable_tokens(self.form.chain_id, query, self.form.token_out.as_ref())
    }

    pub fn output_choices(&self, query: &str) -> Vec<Token> {
        networks::selectable_tokens(self.form.chain_id, query, self.form.token_in.as_ref())
    }

    /// Exchange tokens and amounts in one step
    pub fn flip(&mut self) {
        let form = &mut self.form;
        std::mem::swap(&mut form.token_in, &mut form.token_out);
        std::mem::swap(&mut form.amount_in, &mut form.amount_out);
        self.quote = None;
        self.allowance = None;
        self.phase = SwapPhase::Idle;
    }

    /// Keystrokes that would make the field invalid are refused
    pub fn set_amount_in(&mut self, value: &str) -> Result<()> {
        if !is_valid_amount_input(value) {
            return Err(Error::InvalidInput(format!("'{}' is not a valid amount", value)));
        }
        self.form.amount_in = value.to_string();
        self.reset_quote();
        Ok(())
    }

    /// Fill the input with the whole balance
    pub fn set_max(&mut self) -> Result<()> {
        let balance = self.balance.clone();
        self.set_amount_in(&balance)
    }

    fn reset_quote(&mut self) {
        self.quote = None;
        self.form.amount_out.clear();
        self.phase = SwapPhase::Idle;
    }

    /// A failed read keeps the cached allowance
    async fn reload_allowance(&mut self, token: &Token) {
        if let Ok(allowance) = current_allowance(&self.ctx, self.form.chain_id, token).await {
            self.allowance = allowance;
        }
    }

    fn amount_in_units(&self) -> Option<U256> {
        let token = self.form.token_in?;
        positive_amount(&self.form.amount_in, token.decimals)
    }

    pub fn needs_approval(&self) -> bool {
        match (self.form.token_in, self.amount_in_units()) {
            (Some(token), Some(amount)) => needs_approval(&token, self.allowance, amount),
            _ => false,
        }
    }

    fn settle_phase(&mut self) {
        self.phase = if self.quote.is_none() {
            SwapPhase::Idle
        } else if self.needs_approval() {
            SwapPhase::NeedsApproval
        } else {
            SwapPhase::ReadyToSwap
        };
    }

    pub fn primary_action_label(&self) -> String {
        if !self.ctx.is_connected() {
            return "Connect Wallet".to_string();
        }
        if self.form.amount_in.is_empty() {
            return "Enter an Amount".to_string();
        }
        match self.form.token_in {
            Some(token) if self.needs_approval() => format!("Approve {}", token.symbol),
            _ => "Swap".to_string(),
        }
    }

    /// `1 CFX ≈ 25.500000 cUSDT`
    pub fn rate_display(&self) -> Option<String> {
        let (token_in, token_out) = (self.form.token_in?, self.form.token_out?);
        let amount_in: f64 = self.form.amount_in.parse().ok()?;
        let amount_out: f64 = self.form.amount_out.parse().ok()?;
        if amount_in <= 0.0 {
            return None;
        }
        let rate = format!("1 {} ≈ {:.6} {}", token_in.symbol, amount_out / amount_in, token_out.symbol);
        match self.quote {
            Some(q) if q.is_mock() => Some(format!("{} (mock)", rate)),
            _ => Some(rate),
        }
    }

    /// Re-read balance and allowance for the input token
    pub async fn refresh_reads(&mut self) {
        let Some(token) = self.form.token_in else {
            return;
        };
        let chain_id = self.form.chain_id;

        self.reload_allowance(&token).await;
        if let Ok(owner) = self.ctx.account() {
            match readers::fetch_balance(self.ctx.client.as_ref(), chain_id, &token, owner).await {
                Ok(balance) => self.balance = balance,
                Err(e) => warn!("Error getting {} balance: {}", token.symbol, e),
            }
        }
        if self.quote.is_some() {
            self.settle_phase();
        }
    }

    /// Quote the current amount. Clears the output when inputs are incomplete.
    pub async fn refresh_quote(&mut self) -> Result<Option<Quote>> {
        let (Some(token_in), Some(token_out), Some(amount_in)) =
            (self.form.token_in, self.form.token_out, self.amount_in_units())
        else {
            self.reset_quote();
            return Ok(None);
        };

        self.phase = SwapPhase::Quoting;
        let quote = fetch_quote(
            self.ctx.client.as_ref(),
            self.form.chain_id,
            &token_in,
            &token_out,
            amount_in,
            self.ctx.settings.allow_mock_quotes,
        )
        .await;

        match quote {
            Ok(quote) => {
                self.form.amount_out = format_amount(quote.amount_out, token_out.decimals);
                self.quote = Some(quote);
                self.reload_allowance(&token_in).await;
                self.settle_phase();
                Ok(Some(quote))
            }
            Err(e) => {
                self.reset_quote();
                Err(e)
            }
        }
    }

    /// Re-quote on a fixed timer so the output tracks the router while the
    /// inputs stay put
    pub fn spawn_quote_refresh(flow: &SharedSwapFlow, interval: Duration) -> PollTask {
        let flow = Arc::clone(flow);
        spawn_poller("swap-quote", interval, move |_| {
            let flow = Arc::clone(&flow);
            async move {
                let mut flow = flow.lock().await;
                if let Err(e) = flow.refresh_quote().await {
                    warn!("Quote refresh failed: {}", e);
                }
            }
        })
    }

    /// Run the primary action: approve when gated, swap otherwise
    pub async fn execute(&mut self, hooks: &dyn TxHooks) -> Result<SwapStep> {
        let result = self.try_execute(hooks).await;
        if result.is_err() {
            self.settle_phase();
        }
        result
    }

    async fn try_execute(&mut self, hooks: &dyn TxHooks) -> Result<SwapStep> {
        let from = self.ctx.account()?;
        let chain_id = self.form.chain_id;

        let Some(router) = networks::router_address(chain_id) else {
            let err = Error::RouterNotFound { chain_id };
            self.ctx.reject("Transaction failed", &err);
            return Err(err);
        };

        let (Some(token_in), Some(token_out), Some(amount_in)) =
            (self.form.token_in, self.form.token_out, self.amount_in_units())
        else {
            return Err(self.ctx.reject_input(INVALID_SWAP_INPUT));
        };

        if self.quote.is_none() {
            self.refresh_quote().await?;
        }
        let quote = self.quote.ok_or_else(|| Error::QuoteUnavailable("no quote".into()))?;
        if quote.is_mock() {
            let err = Error::QuoteUnavailable("a mock quote cannot back a swap".into());
            self.ctx.reject("Swap failed", &err);
            return Err(err);
        }

        self.ctx.align_chain(chain_id).await?;
        self.reload_allowance(&token_in).await;
        if let Err(err) = require_known_allowance(&token_in, self.allowance) {
            self.ctx.reject("Swap failed", &err);
            return Err(err);
        }

        if needs_approval(&token_in, self.allowance, amount_in) {
            self.phase = SwapPhase::Approving;
            info!("Approving {} {} for router {}", self.form.amount_in, token_in.symbol, router);
            let request = WriteRequest {
                chain_id,
                from,
                to: token_in.address,
                data: approve_calldata(router, amount_in),
                value: U256::ZERO,
            };
            let receipt = self.ctx.orchestrator.execute("approve", request, hooks).await?;

            self.reload_allowance(&token_in).await;
            self.settle_phase();
            return Ok(SwapStep::Approved(receipt));
        }

        self.phase = SwapPhase::Swapping;
        let request = build_swap_call(
            chain_id,
            from,
            router,
            &token_in,
            &token_out,
            amount_in,
            quote.amount_out,
            self.ctx.settings.min_out_bps,
            self.ctx.settings.deadline_secs,
            now_secs(),
        );
        debug!("Swap request: {:?}", request);
        let receipt = self.ctx.orchestrator.execute("swap", request, hooks).await?;

        self.ctx.notifier.notify(Notification::info(
            "Swap successful",
            format!(
                "Swapped {} {} for {} {}",
                self.form.amount_in, token_in.symbol, self.form.amount_out, token_out.symbol
            ),
        ));
        self.form.amount_in.clear();
        self.reset_quote();
        Ok(SwapStep::Swapped(receipt))
    }
}
