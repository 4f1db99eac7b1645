//! Application session and routes
//!
//! An [`AppSession`] is built once per process and handed to whatever needs
//! the wallet, the chain client or the notifier. It owns the background
//! tasks (wallet watcher and event listener) and stops them when dropped.

use std::sync::Arc;

use tracing::{debug, info};

use crate::chain::client::{RpcChainClient, SharedClient};
use crate::chain::tx::TxOrchestrator;
use crate::config::Config;
use crate::error::Result;
use crate::flows::{FlowContext, LiquidityFlow, LpPriceBoard, SwapFlow, TradeSettings};
use crate::networks;
use crate::notify::Notifier;
use crate::poll::PollTask;
use crate::wallet::adapter::WalletAdapter;
use crate::wallet::provider::{RpcWalletProvider, SharedProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Swap,
    Liquidity,
    LpPrices,
    NotFound(String),
}

impl Route {
    /// `/` is the swap view; anything unknown is not found
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim();
        let normalized = if trimmed.len() > 1 {
            trimmed.trim_end_matches('/')
        } else {
            trimmed
        };
        match normalized {
            "" | "/" => Route::Swap,
            "/liquidity" => Route::Liquidity,
            "/lp-prices" => Route::LpPrices,
            other => Route::NotFound(other.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Route::Swap => "/",
            Route::Liquidity => "/liquidity",
            Route::LpPrices => "/lp-prices",
            Route::NotFound(path) => path,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Swap => "Swap",
            Route::Liquidity => "Add Liquidity",
            Route::LpPrices => "LP Token Info",
            Route::NotFound(_) => "Page not found",
        }
    }
}

pub struct AppSession {
    config: Config,
    client: SharedClient,
    wallet: Arc<WalletAdapter>,
    orchestrator: Arc<TxOrchestrator>,
    notifier: Arc<dyn Notifier>,
    tasks: Vec<PollTask>,
}

impl AppSession {
    /// Assemble a session from already-built parts; no tasks are started
    pub fn new(
        config: Config,
        client: SharedClient,
        provider: Option<SharedProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let wallet = WalletAdapter::new(provider, notifier.clone());
        let orchestrator = Arc::new(TxOrchestrator::new(client.clone(), notifier.clone()));
        Self { config, client, wallet, orchestrator, notifier, tasks: Vec::new() }
    }

    /// Connect to the configured endpoints, start watching the wallet and
    /// pick up an already-authorized account
    pub async fn open(config: Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let client: SharedClient = Arc::new(RpcChainClient::new(&config)?);

        let mut tasks = Vec::new();
        let provider: Option<SharedProvider> = match config.wallet_rpc_url.as_deref() {
            Some(url) => {
                let wallet = RpcWalletProvider::connect(url)?;
                tasks.push(wallet.watch(config.poll_interval()));
                let provider: SharedProvider = wallet;
                Some(provider)
            }
            None => {
                debug!("WALLET_RPC_URL not set, running without a wallet");
                None
            }
        };

        let mut session = Self::new(config, client, provider, notifier);
        session.tasks.extend(tasks);
        if let Some(listener) = session.wallet.listen() {
            session.keep(listener);
        }
        if session.wallet.sync().await {
            info!("Resumed wallet session: {:?}", session.wallet.state().address);
        }
        Ok(session)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> SharedClient {
        self.client.clone()
    }

    pub fn wallet(&self) -> &Arc<WalletAdapter> {
        &self.wallet
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }

    /// Keep a background task alive for the session's lifetime
    pub fn keep(&mut self, task: PollTask) {
        debug!("Session now owns {}", task.name());
        self.tasks.push(task);
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Connected wallet's chain when it is a supported one, else the default
    pub fn active_chain_id(&self) -> u64 {
        self.wallet
            .state()
            .chain_id
            .filter(|id| networks::network(*id).is_some())
            .unwrap_or(self.config.default_chain_id)
    }

    pub fn flow_context(&self) -> FlowContext {
        FlowContext {
            client: self.client.clone(),
            wallet: self.wallet.clone(),
            orchestrator: self.orchestrator.clone(),
            notifier: self.notifier.clone(),
            settings: TradeSettings::from_config(&self.config),
        }
    }

    pub fn swap_flow(&self) -> SwapFlow {
        SwapFlow::new(self.flow_context(), self.active_chain_id())
    }

    pub fn liquidity_flow(&self) -> LiquidityFlow {
        LiquidityFlow::new(self.flow_context(), self.active_chain_id())
    }

    pub fn lp_board(&self) -> Arc<LpPriceBoard> {
        LpPriceBoard::new(self.client.clone())
    }

    /// Stop every background task
    pub fn shutdown(self) {
        info!("Closing session ({} background tasks)", self.tasks.len());
    }
}
