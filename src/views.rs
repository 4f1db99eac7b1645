//! Console views
//!
//! Rendering for the three routes plus the wallet/network panels, and the
//! drivers the CLI subcommands run.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::B256;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::chain::client::TxReceipt;
use crate::chain::readers::{self, AllowanceReader, BalanceReader};
use crate::chain::tx::TxHooks;
use crate::error::{Error, Result};
use crate::flows::liquidity::{LiquidityFlow, LiquidityStep};
use crate::flows::lp_price::{self, LpPriceBoard};
use crate::flows::swap::{SharedSwapFlow, SwapFlow, SwapStep};
use crate::format::{format_address, format_amount, format_currency, short_address};
use crate::networks::{self, Token, NETWORKS};
use crate::notify::Notification;
use crate::session::{AppSession, Route};
use crate::wallet::adapter::WalletState;

/// Upper bound on approve/execute rounds for one primary action
const MAX_STEPS: usize = 3;

fn header(title: &str) {
    println!();
    println!("{}", style("═══════════════════════════════════════════════════════════════").cyan());
    println!("{}", style(format!(" {}", title)).cyan().bold());
    println!("{}", style("═══════════════════════════════════════════════════════════════").cyan());
}

fn lookup_token(chain_id: u64, symbol: &str) -> Result<Token> {
    networks::find_token(chain_id, symbol).ok_or_else(|| {
        let known: Vec<_> = networks::tokens_for(chain_id).iter().map(|t| t.symbol).collect();
        Error::InvalidInput(format!("unknown token '{}' on chain {} (known: {})", symbol, chain_id, known.join(", ")))
    })
}

// ============================================
// CONFIRMATION SPINNER
// ============================================

/// Spinner shown between submission and the terminal outcome
pub struct ConfirmSpinner {
    bar: ProgressBar,
}

impl ConfirmSpinner {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(spinner_style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            bar.set_style(spinner_style);
        }
        bar.set_message(format!("{}: waiting for wallet...", label));
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl TxHooks for ConfirmSpinner {
    fn on_submitted(&self, hash: &B256) {
        self.bar.set_message(format!("Waiting for confirmation of {}", short_hash(hash)));
    }

    fn on_success(&self, receipt: &TxReceipt) {
        self.bar.finish_with_message(format!(
            "{} confirmed in block {}",
            short_hash(&receipt.transaction_hash),
            receipt.block_number.map(|b| b.to_string()).unwrap_or_else(|| "?".into())
        ));
    }

    fn on_error(&self, _error: &Error) {
        self.bar.finish_and_clear();
    }
}

impl Drop for ConfirmSpinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

fn short_hash(hash: &B256) -> String {
    format_address(&hash.to_string())
}

// ============================================
// PANELS
// ============================================

pub fn render_wallet(state: &WalletState) {
    if !state.is_connected {
        println!("  Wallet:  {}", style("not connected").yellow());
        return;
    }
    let network = state
        .chain_id
        .and_then(networks::network)
        .map(|n| n.name.to_string())
        .unwrap_or_else(|| format!("unsupported ({})", state.chain_id.unwrap_or_default()));
    let address = state.address.map(|a| short_address(&a)).unwrap_or_default();
    println!("  Wallet:  {} on {}", style(address).green(), network);
    if let (Some(balance), Some(net)) = (state.balance, state.chain_id.and_then(networks::network)) {
        let shown = format_amount(balance, net.native_currency.decimals);
        println!("  Balance: {} {}", format_currency(&shown), net.native_currency.symbol);
    }
}

pub fn render_networks() {
    header("NETWORKS");
    for net in NETWORKS {
        println!();
        println!("  {} {} ({})", style("●").green(), style(net.name).bold(), net.chain_id);
        println!("    Router:   {}", net.router);
        println!("    RPC:      {}", net.rpc_urls.join(", "));
        println!("    Explorer: {}", net.explorer_urls.join(", "));
        for token in net.tokens {
            let kind = if token.is_native() { "native".to_string() } else { short_address(&token.address) };
            println!("    • {:<6} {:<18} {:>2} decimals  {}", token.symbol, token.name, token.decimals, kind);
        }
    }
    println!();
}

pub fn render_not_found(route: &Route) {
    header("404");
    println!("  {} {}", style("Page not found:").red().bold(), route.path());
    println!("  Try one of: /, /liquidity, /lp-prices");
}

pub fn render_swap(flow: &SwapFlow) {
    let form = flow.form();
    let network = networks::network(form.chain_id).map(|n| n.name).unwrap_or("unknown network");
    header(&format!("SWAP · {}", network));

    let symbol = |t: Option<Token>| t.map(|t| t.symbol).unwrap_or("-");
    println!("  From: {:>24} {:<6} (balance {})", form.amount_in, symbol(form.token_in), format_currency(flow.balance()));
    println!("  To:   {:>24} {:<6}", form.amount_out, symbol(form.token_out));
    if let Some(rate) = flow.rate_display() {
        println!("  Rate: {}", style(rate).dim());
    }
    println!("  Phase: {:?}", flow.phase());
    println!("  [ {} ]", style(flow.primary_action_label()).bold());
}

pub fn render_liquidity(flow: &LiquidityFlow) {
    let form = flow.form();
    let network = networks::network(form.chain_id).map(|n| n.name).unwrap_or("unknown network");
    header(&format!("ADD LIQUIDITY · {}", network));

    let symbol = |t: Option<Token>| t.map(|t| t.symbol).unwrap_or("-");
    println!("  Token A: {:>24} {}", form.amount_a, symbol(form.token_a));
    println!("  Token B: {:>24} {}", form.amount_b, symbol(form.token_b));
    if flow.quote().map_or(false, |q| q.is_mock()) {
        println!("  {}", style("Amount B uses a mock rate").yellow());
    }
    println!("  [ {} ]", style(flow.primary_action_label()).bold());
}

pub fn render_lp_board(board: &LpPriceBoard) {
    header("LP TOKEN INFO");
    let chain_id = board.chain_id();

    for (pool, info) in board.snapshot() {
        let token0 = lp_price::token_symbol(chain_id, info.token0);
        let token1 = lp_price::token_symbol(chain_id, info.token1);
        let price = info
            .price
            .map(|p| format!("{:.4} {}/{}", p, token1, token0))
            .unwrap_or_else(|| "N/A".to_string());

        let delta = match info.delta() {
            Some((text, trend)) if info.price_change != Some(0.0) => trend.paint(text).to_string(),
            _ => String::new(),
        };

        println!();
        println!("  LP: {}   {} {}", short_address(&pool), style(price).bold(), delta);
        println!("    Token 0:   {}", lp_price::token_name(chain_id, info.token0));
        println!("    Token 1:   {}", lp_price::token_name(chain_id, info.token1));
        println!("    Reserve 0: {}", info.reserve0.as_deref().unwrap_or("-"));
        println!("    Reserve 1: {}", info.reserve1.as_deref().unwrap_or("-"));
    }
    println!();
}

// ============================================
// DRIVERS
// ============================================

async fn ensure_connected(session: &AppSession, chain_id: u64) -> Result<()> {
    if session.wallet().state().is_connected {
        return Ok(());
    }
    session.wallet().connect_wallet(Some(chain_id)).await.map(|_| ())
}

pub struct SwapArgs {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub chain_id: Option<u64>,
    pub quote_only: bool,
    pub watch: bool,
}

pub async fn run_swap(session: &AppSession, args: SwapArgs) -> Result<()> {
    let mut flow = session.swap_flow();
    let chain_id = args.chain_id.unwrap_or(flow.form().chain_id);
    flow.set_chain(chain_id);

    let token_in = lookup_token(chain_id, &args.from)?;
    let token_out = lookup_token(chain_id, &args.to)?;
    // Pick the output first when it collides with the default input
    if flow.form().token_in.map(|t| t.address) == Some(token_out.address) {
        flow.select_token_in(token_in)?;
        flow.select_token_out(token_out)?;
    } else {
        flow.select_token_out(token_out)?;
        flow.select_token_in(token_in)?;
    }

    if !args.quote_only {
        ensure_connected(session, chain_id).await?;
    }
    flow.refresh_reads().await;
    if args.amount.eq_ignore_ascii_case("max") {
        flow.set_max()?;
    } else {
        flow.set_amount_in(&args.amount)?;
    }

    if let Err(e) = flow.refresh_quote().await {
        session.notifier().notify(Notification::error("Quote unavailable", e.user_message()));
    }
    render_swap(&flow);
    if args.quote_only {
        if args.watch {
            watch_swap(session, flow).await;
        }
        return Ok(());
    }

    for _ in 0..MAX_STEPS {
        let spinner = ConfirmSpinner::new(&flow.primary_action_label());
        match flow.execute(&spinner).await? {
            SwapStep::Approved(_) => {
                info!("Approval confirmed, continuing with the swap");
                render_swap(&flow);
            }
            SwapStep::Swapped(receipt) => {
                if let Some(url) = networks::network(chain_id)
                    .and_then(|n| n.explorer_tx_url(&receipt.transaction_hash.to_string()))
                {
                    println!("  {}", style(url).underlined());
                }
                return Ok(());
            }
        }
    }
    warn!("Swap did not complete after {} steps", MAX_STEPS);
    Ok(())
}

pub struct LiquidityArgs {
    pub token_a: String,
    pub token_b: String,
    pub amount_a: String,
    pub amount_b: Option<String>,
    pub chain_id: Option<u64>,
}

pub async fn run_liquidity(session: &AppSession, args: LiquidityArgs) -> Result<()> {
    use crate::flows::liquidity::Leg;

    let mut flow = session.liquidity_flow();
    let chain_id = args.chain_id.unwrap_or(flow.form().chain_id);
    flow.set_chain(chain_id);

    let token_a = lookup_token(chain_id, &args.token_a)?;
    let token_b = lookup_token(chain_id, &args.token_b)?;
    if flow.form().token_a.map(|t| t.address) == Some(token_b.address) {
        flow.select_token(Leg::A, token_a)?;
        flow.select_token(Leg::B, token_b)?;
    } else {
        flow.select_token(Leg::B, token_b)?;
        flow.select_token(Leg::A, token_a)?;
    }

    ensure_connected(session, chain_id).await?;
    flow.set_amount_a(&args.amount_a)?;
    match &args.amount_b {
        Some(amount_b) => flow.set_amount_b(amount_b)?,
        None => {
            flow.refresh_quote().await?;
        }
    }
    flow.refresh_allowances().await;
    render_liquidity(&flow);

    for _ in 0..MAX_STEPS {
        let spinner = ConfirmSpinner::new(&flow.primary_action_label());
        match flow.execute(&spinner).await? {
            LiquidityStep::Approved { leg, .. } => {
                info!("Approval for leg {:?} confirmed", leg);
                render_liquidity(&flow);
            }
            LiquidityStep::Added { pool, .. } => {
                println!("  Liquidity added to pool {}", short_address(&pool));
                return Ok(());
            }
        }
    }
    warn!("Liquidity was not added after {} steps", MAX_STEPS);
    Ok(())
}

/// Keep the quote, balance and allowance fresh and redraw until Ctrl-C
async fn watch_swap(session: &AppSession, flow: SwapFlow) {
    let form = flow.form().clone();
    let owner = session.wallet().state().address;
    let balance = BalanceReader::new(session.client(), Some(form.chain_id), form.token_in, owner);
    let allowance = AllowanceReader::new(session.client(), Some(form.chain_id), form.token_in, owner);
    let shared: SharedSwapFlow = Arc::new(Mutex::new(flow));
    let _tasks = [
        balance.spawn(session.config().poll_interval()),
        allowance.spawn(session.config().poll_interval()),
        SwapFlow::spawn_quote_refresh(&shared, session.config().quote_interval()),
    ];

    let mut ticker = tokio::time::interval(session.config().quote_interval());
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                render_swap(&*shared.lock().await);
                let allowance = allowance
                    .value()
                    .map(|a| format_amount(a, form.token_in.map(|t| t.decimals).unwrap_or(18)))
                    .unwrap_or_else(|| "-".to_string());
                println!("  Balance: {}  Allowance: {}", format_currency(&balance.value()), allowance);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping quote watch");
                return;
            }
        }
    }
}

/// One refresh, or a live board until Ctrl-C when `watch` is set
pub async fn run_lp_prices(session: &AppSession, watch: bool) -> Result<()> {
    let board = session.lp_board();
    board.refresh_all().await;
    render_lp_board(&board);
    if !watch {
        return Ok(());
    }

    let interval = session.config().poll_interval();
    let _poller = board.spawn(interval);
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => render_lp_board(&board),
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping LP price watch");
                return Ok(());
            }
        }
    }
}

pub async fn run_balance(session: &AppSession, symbol: Option<String>, chain_id: Option<u64>) -> Result<()> {
    let state = session.wallet().state();
    let owner = state.account()?;
    let chain_id = chain_id.unwrap_or_else(|| session.active_chain_id());

    let tokens: Vec<Token> = match symbol {
        Some(symbol) => vec![lookup_token(chain_id, &symbol)?],
        None => networks::tokens_for(chain_id).to_vec(),
    };

    header("BALANCES");
    render_wallet(&state);
    let client = session.client();
    for token in tokens {
        let balance = readers::fetch_balance(client.as_ref(), chain_id, &token, owner)
            .await
            .unwrap_or_else(|e| {
                warn!("Error getting {} balance: {}", token.symbol, e);
                readers::ZERO_BALANCE.to_string()
            });
        println!("  {:<6} {}", token.symbol, format_currency(&balance));
    }
    Ok(())
}

/// Render a route without taking any action
pub async fn open_route(session: &AppSession, route: &Route) -> Result<()> {
    match route {
        Route::Swap => {
            let mut flow = session.swap_flow();
            flow.refresh_reads().await;
            render_wallet(&session.wallet().state());
            render_swap(&flow);
        }
        Route::Liquidity => {
            let mut flow = session.liquidity_flow();
            flow.refresh_allowances().await;
            render_wallet(&session.wallet().state());
            render_liquidity(&flow);
        }
        Route::LpPrices => run_lp_prices(session, false).await?,
        Route::NotFound(_) => render_not_found(route),
    }
    Ok(())
}
