//! Diagnostic tool - Check configuration and RPC reachability
//!
//! Run with: cargo run --bin diagnose

use std::time::Instant;

use alloy_primitives::Address;
use color_eyre::eyre::Result;
use console::style;

use xswap::chain::{ChainClient, RpcChainClient};
use xswap::config::Config;
use xswap::networks::NETWORKS;

fn section(title: &str) {
    println!("\n═══════════════════════════════════════════════════");
    println!("  {}", title);
    println!("═══════════════════════════════════════════════════\n");
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    println!("🔍 XSWAP DIAGNOSTIC CHECK");

    let config = Config::from_env()?;
    config.print_summary();

    section("CONFIGURATION");
    match config.validate() {
        Ok(()) => println!("  {} Config is valid", style("✅").green()),
        Err(e) => println!("  {} {}", style("❌").red(), e),
    }
    let wallet = config.wallet_rpc_url.as_deref().unwrap_or("NOT SET");
    println!("  WALLET_RPC_URL: {}", wallet);

    section("NETWORKS");
    let client = RpcChainClient::new(&config)?;
    let mut reachable = 0;
    for net in NETWORKS {
        let url = config.rpc_url_for(net.chain_id).unwrap_or_else(|| "NOT SET".to_string());
        let started = Instant::now();
        match client.native_balance(net.chain_id, Address::ZERO).await {
            Ok(_) => {
                reachable += 1;
                println!(
                    "  {} {} ({}) {} in {:?}",
                    style("✅").green(),
                    net.name,
                    net.chain_id,
                    url,
                    started.elapsed()
                );
            }
            Err(e) => println!("  {} {} ({}) {}: {}", style("❌").red(), net.name, net.chain_id, url, e),
        }
        println!("    └─ router {} | {} tokens", net.router, net.tokens.len());
    }

    section("STATUS");
    if reachable == NETWORKS.len() {
        println!("  ✅ All networks reachable");
    } else {
        println!("  ⚠️  {}/{} networks reachable", reachable, NETWORKS.len());
    }
    Ok(())
}
