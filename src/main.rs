//! xswap - DEX client for Conflux eSpace and Base
//!
//! Run with: cargo run -- --help

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use console::style;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xswap::config::Config;
use xswap::notify::ConsoleNotifier;
use xswap::session::{AppSession, Route};
use xswap::views::{self, LiquidityArgs, SwapArgs};

#[derive(Parser)]
#[command(name = "xswap", version, about = "Swap and add liquidity through the X router")]
struct Cli {
    /// TOML config file; environment variables are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Swap one token for another
    Swap {
        from: String,
        to: String,
        /// Amount of `from`, or "max"
        amount: String,
        #[arg(long)]
        chain: Option<u64>,
        /// Show the quote without sending anything
        #[arg(long)]
        quote_only: bool,
        /// With --quote-only, keep re-quoting until Ctrl-C
        #[arg(long, requires = "quote_only")]
        watch: bool,
    },
    /// Add liquidity to a pair
    Liquidity {
        token_a: String,
        token_b: String,
        amount_a: String,
        /// Quoted from the router when omitted
        #[arg(long)]
        amount_b: Option<String>,
        #[arg(long)]
        chain: Option<u64>,
    },
    /// Show LP prices on Conflux eSpace
    LpPrices {
        /// Keep polling until Ctrl-C
        #[arg(long)]
        watch: bool,
    },
    /// Render a route: /, /liquidity or /lp-prices
    Open {
        #[arg(default_value = "/")]
        route: String,
    },
    /// List supported networks and tokens
    Networks,
    /// Token balances of the connected account
    Balance {
        token: Option<String>,
        #[arg(long)]
        chain: Option<u64>,
    },
    /// Connect the wallet, optionally switching it to a chain
    Connect {
        #[arg(long)]
        chain: Option<u64>,
    },
    /// Forget the connected account
    Disconnect,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!("{}", style(" xswap - X router client").cyan().bold());
    println!(
        "{}",
        style("    Conflux eSpace | Base | Swap | Liquidity | LP prices").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            Config::from_file(path)?
        }
        None => Config::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("xswap=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Command::Networks = cli.command {
        views::render_networks();
        return Ok(());
    }

    print_banner();
    let config = load_config(cli.config.as_ref())?;
    config.print_summary();

    let session = AppSession::open(config, Arc::new(ConsoleNotifier)).await?;

    match cli.command {
        Command::Swap { from, to, amount, chain, quote_only, watch } => {
            let args = SwapArgs { from, to, amount, chain_id: chain, quote_only, watch };
            views::run_swap(&session, args).await?;
        }
        Command::Liquidity { token_a, token_b, amount_a, amount_b, chain } => {
            let args = LiquidityArgs { token_a, token_b, amount_a, amount_b, chain_id: chain };
            views::run_liquidity(&session, args).await?;
        }
        Command::LpPrices { watch } => views::run_lp_prices(&session, watch).await?,
        Command::Open { route } => views::open_route(&session, &Route::parse(&route)).await?,
        Command::Balance { token, chain } => views::run_balance(&session, token, chain).await?,
        Command::Connect { chain } => {
            let state = session.wallet().connect_wallet(chain).await?;
            views::render_wallet(&state);
        }
        Command::Disconnect => {
            session.wallet().disconnect_wallet();
            views::render_wallet(&session.wallet().state());
        }
        Command::Networks => {}
    }

    info!("Done");
    session.shutdown();
    Ok(())
}
