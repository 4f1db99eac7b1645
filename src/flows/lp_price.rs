//! LP Price Display
//!
//! Polls price, pair and reserves for each configured pool through the
//! router. Pools are read concurrently and independently: a pool whose
//! reads fail keeps what it had and never holds up the others.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{utils::format_units, Address, U256};
use console::{style, StyledObject};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::chain::abi::IXRouter;
use crate::chain::client::{read_call, SharedClient};
use crate::error::{Error, Result};
use crate::format::{format_amount, format_price_delta, short_address};
use crate::networks::{self, LP_CHAIN_ID, LP_POOLS};
use crate::poll::{spawn_poller, PollTask};

/// Decimals of the router's LP price and reserve figures
pub const LP_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LpInfo {
    pub price: Option<f64>,
    pub token0: Option<Address>,
    pub token1: Option<Address>,
    pub reserve0: Option<String>,
    pub reserve1: Option<String>,
    pub last_price: Option<f64>,
    pub price_change: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaTrend {
    Up,
    Down,
    Flat,
}

impl DeltaTrend {
    pub fn of(delta: f64) -> Self {
        if delta > 0.0 {
            DeltaTrend::Up
        } else if delta < 0.0 {
            DeltaTrend::Down
        } else {
            DeltaTrend::Flat
        }
    }

    /// Green for up, red for down, dim otherwise
    pub fn paint(self, text: String) -> StyledObject<String> {
        match self {
            DeltaTrend::Up => style(text).green(),
            DeltaTrend::Down => style(text).red(),
            DeltaTrend::Flat => style(text).dim(),
        }
    }
}

impl LpInfo {
    /// Signed delta text and its trend, when there was a previous price
    pub fn delta(&self) -> Option<(String, DeltaTrend)> {
        self.price_change
            .map(|d| (format_price_delta(d), DeltaTrend::of(d)))
    }

    fn record_price(&mut self, price: f64) {
        if let Some(previous) = self.price {
            self.last_price = Some(previous);
            self.price_change = Some(price - previous);
        }
        self.price = Some(price);
    }
}

/// Registry name for an LP leg, else the shortened address
pub fn token_name(chain_id: u64, address: Option<Address>) -> String {
    match address {
        Some(a) => networks::token_by_address(chain_id, a)
            .map(|t| t.name.to_string())
            .unwrap_or_else(|| short_address(&a)),
        None => "-".to_string(),
    }
}

/// Registry symbol for an LP leg, else `???`
pub fn token_symbol(chain_id: u64, address: Option<Address>) -> String {
    address
        .and_then(|a| networks::token_by_address(chain_id, a))
        .map(|t| t.symbol.to_string())
        .unwrap_or_else(|| "???".to_string())
}

fn price_from_raw(raw: U256) -> Result<f64> {
    let text = format_units(raw, LP_DECIMALS).map_err(|e| Error::decode("getLpPrice", e))?;
    text.parse().map_err(|e| Error::decode("getLpPrice", e))
}

pub struct LpPriceBoard {
    client: SharedClient,
    chain_id: u64,
    pools: Vec<Address>,
    infos: Mutex<HashMap<Address, LpInfo>>,
}

impl LpPriceBoard {
    pub fn new(client: SharedClient) -> Arc<Self> {
        Self::with_pools(client, LP_CHAIN_ID, LP_POOLS.to_vec())
    }

    pub fn with_pools(client: SharedClient, chain_id: u64, pools: Vec<Address>) -> Arc<Self> {
        Arc::new(Self { client, chain_id, pools, infos: Mutex::new(HashMap::new()) })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn pools(&self) -> &[Address] {
        &self.pools
    }

    pub fn info(&self, pool: &Address) -> Option<LpInfo> {
        self.infos.lock().ok()?.get(pool).cloned()
    }

    /// Pools in display order with whatever is known about each
    pub fn snapshot(&self) -> Vec<(Address, LpInfo)> {
        let infos = match self.infos.lock() {
            Ok(infos) => infos.clone(),
            Err(_) => HashMap::new(),
        };
        self.pools
            .iter()
            .map(|p| (*p, infos.get(p).cloned().unwrap_or_default()))
            .collect()
    }

    /// One poll over every pool
    pub async fn refresh_all(&self) {
        join_all(self.pools.iter().map(|pool| self.refresh_pool(*pool))).await;
    }

    async fn refresh_pool(&self, pool: Address) {
        let Some(router) = networks::router_address(self.chain_id) else {
            warn!("No router on chain {}, skipping LP {}", self.chain_id, pool);
            return;
        };
        let client = self.client.as_ref();

        let price_call = IXRouter::getLpPriceCall { lp: pool };
        let pair_call = IXRouter::getLpPairCall { lp: pool };
        let reserve_call = IXRouter::getLpReserveCall { lp: pool };
        let (price, pair, reserves) = futures::join!(
            read_call(client, self.chain_id, router, &price_call),
            read_call(client, self.chain_id, router, &pair_call),
            read_call(client, self.chain_id, router, &reserve_call),
        );

        let Ok(mut infos) = self.infos.lock() else {
            return;
        };
        let info = infos.entry(pool).or_default();

        match price.and_then(price_from_raw) {
            Ok(p) => info.record_price(p),
            Err(e) => warn!("Error fetching LP price for {}: {}", pool, e),
        }
        match pair {
            Ok(pair) => {
                info.token0 = Some(pair.token0);
                info.token1 = Some(pair.token1);
            }
            Err(e) => warn!("Error fetching LP pair for {}: {}", pool, e),
        }
        match reserves {
            Ok(r) => {
                info.reserve0 = Some(format_amount(r.reserve0, LP_DECIMALS));
                info.reserve1 = Some(format_amount(r.reserve1, LP_DECIMALS));
            }
            Err(e) => warn!("Error fetching LP reserves for {}: {}", pool, e),
        }
        debug!("LP {} -> {:?}", pool, info);
    }

    pub fn spawn(self: &Arc<Self>, interval: Duration) -> PollTask {
        let board = Arc::clone(self);
        spawn_poller("lp-prices", interval, move |_| {
            let board = Arc::clone(&board);
            async move { board.refresh_all().await }
        })
    }
}
