//! Balance and allowance readers
//!
//! Both readers refresh on a fixed interval and publish into a
//! [`LatestValue`]. A failed read is logged and dropped: the previously
//! published value stays in place.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use tracing::{debug, warn};

use super::abi::IERC20;
use super::client::{read_call, ChainClient, SharedClient};
use crate::error::Result;
use crate::format::format_amount;
use crate::networks::{self, Token};
use crate::poll::{spawn_poller, LatestValue, PollTask};

/// Displayed when there is nothing to read
pub const ZERO_BALANCE: &str = "0";

// ============================================
// ONE-SHOT READS
// ============================================

pub async fn erc20_decimals(client: &dyn ChainClient, chain_id: u64, token: Address) -> Result<u8> {
    read_call(client, chain_id, token, &IERC20::decimalsCall {}).await
}

/// Formatted balance of `owner` in `token`
pub async fn fetch_balance(
    client: &dyn ChainClient,
    chain_id: u64,
    token: &Token,
    owner: Address,
) -> Result<String> {
    if token.is_native() {
        let raw = client.native_balance(chain_id, owner).await?;
        let decimals = networks::network(chain_id)
            .map(|n| n.native_currency.decimals)
            .unwrap_or(token.decimals);
        return Ok(format_amount(raw, decimals));
    }

    let raw = read_call(client, chain_id, token.address, &IERC20::balanceOfCall { owner }).await?;
    let decimals = erc20_decimals(client, chain_id, token.address).await?;
    Ok(format_amount(raw, decimals))
}

/// Allowance granted by `owner` to the chain's router.
///
/// `None` when any input is missing, the chain has no router, or the token is
/// native (there is nothing to approve).
pub async fn fetch_allowance(
    client: &dyn ChainClient,
    chain_id: Option<u64>,
    token: Option<&Token>,
    owner: Option<Address>,
) -> Result<Option<U256>> {
    let (Some(chain_id), Some(token), Some(owner)) = (chain_id, token, owner) else {
        return Ok(None);
    };
    if token.is_native() {
        return Ok(None);
    }
    let Some(router) = networks::router_address(chain_id) else {
        return Ok(None);
    };

    let allowance = read_call(
        client,
        chain_id,
        token.address,
        &IERC20::allowanceCall { owner, spender: router },
    )
    .await?;
    Ok(Some(allowance))
}

// ============================================
// POLLING READERS
// ============================================

pub struct BalanceReader {
    client: SharedClient,
    chain_id: Option<u64>,
    token: Option<Token>,
    owner: Option<Address>,
    latest: Arc<LatestValue<String>>,
}

impl BalanceReader {
    pub fn new(
        client: SharedClient,
        chain_id: Option<u64>,
        token: Option<Token>,
        owner: Option<Address>,
    ) -> Arc<Self> {
        Arc::new(Self { client, chain_id, token, owner, latest: LatestValue::new() })
    }

    /// Latest formatted balance, `"0"` until the first successful read
    pub fn value(&self) -> String {
        self.latest.get().unwrap_or_else(|| ZERO_BALANCE.to_string())
    }

    pub fn latest(&self) -> Arc<LatestValue<String>> {
        Arc::clone(&self.latest)
    }

    pub async fn refresh(&self) {
        let seq = self.latest.begin();
        let (Some(chain_id), Some(token), Some(owner)) = (self.chain_id, self.token.as_ref(), self.owner) else {
            self.latest.publish(seq, ZERO_BALANCE.to_string());
            return;
        };

        match fetch_balance(self.client.as_ref(), chain_id, token, owner).await {
            Ok(balance) => {
                debug!("{} balance of {}: {}", token.symbol, owner, balance);
                self.latest.publish(seq, balance);
            }
            Err(e) => warn!("Error getting {} balance: {}", token.symbol, e),
        }
    }

    pub fn spawn(self: &Arc<Self>, interval: Duration) -> PollTask {
        let reader = Arc::clone(self);
        spawn_poller("balance", interval, move |_| {
            let reader = Arc::clone(&reader);
            async move { reader.refresh().await }
        })
    }
}

pub struct AllowanceReader {
    client: SharedClient,
    chain_id: Option<u64>,
    token: Option<Token>,
    owner: Option<Address>,
    latest: Arc<LatestValue<U256>>,
}

impl AllowanceReader {
    pub fn new(
        client: SharedClient,
        chain_id: Option<u64>,
        token: Option<Token>,
        owner: Option<Address>,
    ) -> Arc<Self> {
        Arc::new(Self { client, chain_id, token, owner, latest: LatestValue::new() })
    }

    pub fn value(&self) -> Option<U256> {
        self.latest.get()
    }

    pub async fn refresh(&self) {
        let seq = self.latest.begin();
        match fetch_allowance(self.client.as_ref(), self.chain_id, self.token.as_ref(), self.owner).await {
            Ok(Some(allowance)) => {
                self.latest.publish(seq, allowance);
            }
            Ok(None) => self.latest.clear(seq),
            Err(e) => warn!("Error getting allowance: {}", e),
        }
    }

    pub fn spawn(self: &Arc<Self>, interval: Duration) -> PollTask {
        let reader = Arc::clone(self);
        spawn_poller("allowance", interval, move |_| {
            let reader = Arc::clone(&reader);
            async move { reader.refresh().await }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::networks::{find_token, router_address, CONFLUX_CHAIN_ID};
    use crate::testing::FakeChain;
    use tokio_test::assert_ok;

    fn owner() -> Address {
        Address::repeat_byte(0x42)
    }

    fn cusdt() -> Token {
        find_token(CONFLUX_CHAIN_ID, "cUSDT").unwrap()
    }

    #[tokio::test]
    async fn test_native_token_has_no_allowance() {
        let chain = FakeChain::new();
        for net in networks::NETWORKS {
            let native = net.tokens.iter().find(|t| t.is_native()).unwrap();
            let allowance = assert_ok!(
                fetch_allowance(chain.as_ref(), Some(net.chain_id), Some(native), Some(owner())).await
            );
            assert_eq!(allowance, None);
        }
        assert_eq!(chain.with(|s| s.calls), 0, "native allowance must not hit the chain");
    }

    #[tokio::test]
    async fn test_allowance_incomplete_inputs() {
        let chain = FakeChain::new();
        let token = cusdt();
        assert_eq!(assert_ok!(fetch_allowance(chain.as_ref(), None, Some(&token), Some(owner())).await), None);
        assert_eq!(assert_ok!(fetch_allowance(chain.as_ref(), Some(CONFLUX_CHAIN_ID), None, Some(owner())).await), None);
        assert_eq!(assert_ok!(fetch_allowance(chain.as_ref(), Some(CONFLUX_CHAIN_ID), Some(&token), None).await), None);
        assert_eq!(assert_ok!(fetch_allowance(chain.as_ref(), Some(9999), Some(&token), Some(owner())).await), None);
    }

    #[tokio::test]
    async fn test_allowance_reads_router_spender() {
        let chain = FakeChain::new();
        let token = cusdt();
        let router = router_address(CONFLUX_CHAIN_ID).unwrap();
        chain.with(|s| s.allowances.insert((token.address, owner(), router), U256::from(500u64)));

        let allowance = assert_ok!(
            fetch_allowance(chain.as_ref(), Some(CONFLUX_CHAIN_ID), Some(&token), Some(owner())).await
        );
        assert_eq!(allowance, Some(U256::from(500u64)));
    }

    #[tokio::test]
    async fn test_erc20_balance_uses_onchain_decimals() {
        let chain = FakeChain::new();
        let token = cusdt();
        chain.with(|s| {
            s.balances.insert((token.address, owner()), U256::from(2_500_000u64));
            s.decimals.insert(token.address, 6);
        });

        let balance = assert_ok!(fetch_balance(chain.as_ref(), CONFLUX_CHAIN_ID, &token, owner()).await);
        assert_eq!(balance, "2.5");
    }

    #[tokio::test]
    async fn test_native_balance() {
        let chain = FakeChain::new();
        let cfx = find_token(CONFLUX_CHAIN_ID, "CFX").unwrap();
        chain.with(|s| s.native.insert(owner(), U256::from(3u64) * U256::from(10u64).pow(U256::from(18))));

        let balance = assert_ok!(fetch_balance(chain.as_ref(), CONFLUX_CHAIN_ID, &cfx, owner()).await);
        assert_eq!(balance, "3");
    }

    #[tokio::test]
    async fn test_reader_keeps_previous_value_on_failure() {
        let chain = FakeChain::new();
        let cfx = find_token(CONFLUX_CHAIN_ID, "CFX").unwrap();
        chain.with(|s| s.native.insert(owner(), U256::from(10u64).pow(U256::from(18))));

        let reader = BalanceReader::new(chain.clone(), Some(CONFLUX_CHAIN_ID), Some(cfx), Some(owner()));
        reader.refresh().await;
        assert_eq!(reader.value(), "1");

        chain.with(|s| s.fail_all_reads = true);
        reader.refresh().await;
        assert_eq!(reader.value(), "1");
    }

    #[tokio::test]
    async fn test_reader_without_owner_shows_zero() {
        let chain = FakeChain::new();
        let reader = BalanceReader::new(chain, Some(CONFLUX_CHAIN_ID), Some(cusdt()), None);
        reader.refresh().await;
        assert_eq!(reader.value(), ZERO_BALANCE);
    }

    #[tokio::test]
    async fn test_allowance_reader_swallows_errors() {
        let chain = FakeChain::new();
        let token = cusdt();
        let router = router_address(CONFLUX_CHAIN_ID).unwrap();
        chain.with(|s| s.allowances.insert((token.address, owner(), router), U256::from(7u64)));

        let reader = AllowanceReader::new(chain.clone(), Some(CONFLUX_CHAIN_ID), Some(token), Some(owner()));
        reader.refresh().await;
        assert_eq!(reader.value(), Some(U256::from(7u64)));

        chain.with(|s| s.fail_all_reads = true);
        reader.refresh().await;
        assert_eq!(reader.value(), Some(U256::from(7u64)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_reader_refreshes_on_interval() {
        let chain = FakeChain::new();
        let cfx = find_token(CONFLUX_CHAIN_ID, "CFX").unwrap();
        let reader = BalanceReader::new(chain.clone(), Some(CONFLUX_CHAIN_ID), Some(cfx), Some(owner()));

        let task = reader.spawn(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(reader.value(), "0");

        chain.with(|s| s.native.insert(owner(), U256::from(10u64).pow(U256::from(18))));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(reader.value(), "1");
        task.stop();
    }
}
