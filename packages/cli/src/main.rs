//! `vortex`: command-line client for Convex peers and `torus.exchange`.
//!
//! Every subcommand connects to the peer first (the handshake must pass).
//! The account is the one given by `--address`/`--seed`; without them a
//! demo account is provisioned on connect.
//!
//! Results are printed to stdout as JSON. Logs go to stderr and are
//! controlled with `RUST_LOG`.

use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use vortex::Address;
use vortex_client::{
    ClientConfig, ClientError, Credential, PeerClient, Side, SwapController, TokenRegistry,
    BALANCE_POLL_INTERVAL,
};

/// vortex: Convex peer client
///
/// Query and transact against a Convex peer, and trade on torus.exchange.
#[derive(Parser)]
#[command(name = "vortex", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Peer base URL.
    #[arg(long, global = true, env = "VORTEX_PEER_URL", value_name = "URL")]
    peer: Option<String>,

    /// Account to act as. Requires --seed.
    #[arg(long, global = true, env = "VORTEX_ADDRESS", value_name = "#N")]
    address: Option<Address>,

    /// Credential for --address.
    #[arg(long, global = true, env = "VORTEX_SEED", hide_env_values = true)]
    seed: Option<String>,

    /// Per-request deadline in milliseconds.
    #[arg(long, global = true, env = "VORTEX_TIMEOUT_MS", value_name = "MS")]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the connection test and report peer status.
    Status,

    /// Evaluate Convex Lisp source read-only.
    Query {
        source: String,
        /// Evaluate as this account instead of the session account.
        #[arg(long = "as", value_name = "#N")]
        as_address: Option<Address>,
    },

    /// Submit Convex Lisp source as a transaction.
    Transact { source: String },

    /// Native balance in copper.
    Balance { address: Option<Address> },

    /// Account record from the peer.
    Account { address: Option<Address> },

    /// convex.fungible balance of HOLDER in TOKEN, in raw units.
    TokenBalance {
        token: Address,
        holder: Option<Address>,
    },

    /// Send copper.
    Transfer { to: Address, amount: u64 },

    /// Send raw units of a fungible token.
    TransferToken {
        token: Address,
        to: Address,
        amount: u64,
    },

    /// Spend CVX on TOKEN.
    Buy { token: Address, cvx: f64 },

    /// Sell TOKEN for CVX.
    Sell { token: Address, tokens: f64 },

    /// Buy CVX, paying in TOKEN.
    BuyCvx { token: Address, tokens: f64 },

    /// Sell CVX for TOKEN.
    SellCvx { token: Address, cvx: f64 },

    /// Market state for TOKEN.
    Market { token: Address },

    /// Tokens received for spending CVX.
    Price { token: Address, cvx: f64 },

    /// Add liquidity to TOKEN's market.
    AddLiquidity {
        token: Address,
        cvx: f64,
        tokens: f64,
    },

    /// Withdraw raw liquidity shares from TOKEN's market.
    RemoveLiquidity { token: Address, shares: u64 },

    /// Open a market for TOKEN with initial reserves.
    CreateMarket {
        token: Address,
        cvx: f64,
        tokens: f64,
    },

    /// Swap between CVX and a listed token.
    ///
    /// Examples:
    ///   vortex swap 2.5 --list PAI=#99
    ///   vortex swap 10 --from PAI --to CVX --list PAI=#99
    Swap {
        amount: f64,
        #[command(flatten)]
        pair: PairArgs,
    },

    /// Print pair balances periodically until interrupted.
    Watch {
        /// Seconds between updates.
        #[arg(long, default_value_t = BALANCE_POLL_INTERVAL.as_secs())]
        interval_secs: u64,
        #[command(flatten)]
        pair: PairArgs,
    },
}

#[derive(Args)]
struct PairArgs {
    #[arg(long, default_value = "CVX")]
    from: String,

    #[arg(long, default_value = "PAI")]
    to: String,

    /// Token address on this network, as SYMBOL=#N. Repeatable.
    #[arg(long = "list", value_name = "SYMBOL=#N", value_parser = parse_listing)]
    listings: Vec<(String, Address)>,
}

#[derive(Serialize)]
struct StatusReport {
    peer: String,
    connected: bool,
    exchange_available: bool,
    address: Option<Address>,
}

/// Log filter used when `RUST_LOG` is unset. Events from this binary are
/// logged under the `vortex` target, shared with the core crate.
const DEFAULT_LOG_FILTER: &str = "vortex_client=info,vortex=info";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = build_config(&cli.global);

    if let Err(e) = run(cli.command, config).await {
        eprintln!("vortex: {e}");
        process::exit(1);
    }
}

/// Environment defaults, overridden by flags.
fn build_config(args: &GlobalArgs) -> ClientConfig {
    let mut config = ClientConfig::from_env().unwrap_or_else(|e| fatal(&e.to_string()));
    if let Some(peer) = &args.peer {
        debug!("cli: peer overridden: {peer}");
        config.peer_url = peer.clone();
    }
    if let Some(ms) = args.timeout_ms {
        debug!("cli: timeout overridden: {ms}ms");
        config.timeout = Duration::from_millis(ms);
    }
    if args.address.is_some() {
        config.address = args.address;
    }
    if let Some(seed) = &args.seed {
        config.credential = Some(Credential::new(seed.clone()));
    }
    if config.address.is_some() != config.credential.is_some() {
        fatal("--address and --seed must be given together");
    }
    match config.address {
        Some(address) => info!("cli: peer {} as {address}", config.peer_url),
        None => info!("cli: peer {}, provisioning an account", config.peer_url),
    }
    config
}

async fn run(command: Command, config: ClientConfig) -> Result<(), ClientError> {
    let account = config.account();
    let client = PeerClient::connect(config, account).await?;

    match command {
        Command::Status => print_json(&StatusReport {
            peer: client.endpoints().base().to_string(),
            connected: client.is_connected(),
            exchange_available: client.exchange_available(),
            address: client.address(),
        }),

        Command::Query { source, as_address } => {
            let address = match as_address {
                Some(a) => a,
                None => client.address().unwrap_or(Address::FALLBACK),
            };
            print_json(&client.query(&source, address).await?);
        }

        Command::Transact { source } => {
            print_json(&client.transact(&source).await?);
        }

        Command::Balance { address } => {
            let address = target(&client, address);
            print_json(&client.get_balance(address).await);
        }

        Command::Account { address } => {
            let address = target(&client, address);
            print_json(&client.get_account_info(address).await);
        }

        Command::TokenBalance { token, holder } => {
            let holder = target(&client, holder);
            print_json(&client.get_token_balance(token, holder).await?);
        }

        Command::Transfer { to, amount } => {
            print_json(&client.transfer(to, amount).await?);
        }

        Command::TransferToken { token, to, amount } => {
            print_json(&client.transfer_token(token, to, amount).await?);
        }

        Command::Buy { token, cvx } => {
            print_json(&client.buy_tokens(token, cvx).await?);
        }

        Command::Sell { token, tokens } => {
            print_json(&client.sell_tokens(token, tokens).await?);
        }

        Command::BuyCvx { token, tokens } => {
            print_json(&client.buy_cvx(token, tokens).await?);
        }

        Command::SellCvx { token, cvx } => {
            print_json(&client.sell_cvx(token, cvx).await?);
        }

        Command::Market { token } => {
            let viewer = client.address().unwrap_or(Address::FALLBACK);
            print_json(&client.get_market(token, viewer).await);
        }

        Command::Price { token, cvx } => {
            let viewer = client.address().unwrap_or(Address::FALLBACK);
            print_json(&client.get_buy_price(token, cvx, viewer).await?);
        }

        Command::AddLiquidity { token, cvx, tokens } => {
            print_json(&client.add_liquidity(token, cvx, tokens).await?);
        }

        Command::RemoveLiquidity { token, shares } => {
            print_json(&client.remove_liquidity(token, shares).await?);
        }

        Command::CreateMarket { token, cvx, tokens } => {
            print_json(&client.create_market(token, cvx, tokens).await?);
        }

        Command::Swap { amount, pair } => {
            let controller = swap_controller(client, &pair);
            match controller.execute_swap(amount).await {
                Ok(result) => print_json(&result),
                Err(e) => {
                    eprintln!("vortex: {e}");
                    process::exit(1);
                }
            }
            if let Some(view) = controller.update_balances().await {
                print_json(&view);
            }
        }

        Command::Watch {
            interval_secs,
            pair,
        } => {
            let controller = swap_controller(client, &pair);
            let (tx, mut rx) = mpsc::channel(4);
            let interval = Duration::from_secs(interval_secs.max(1));

            let poll = controller.poll_balances(interval, tx);
            tokio::pin!(poll);
            loop {
                tokio::select! {
                    _ = &mut poll => break,
                    Some(view) = rx.recv() => print_json(&view),
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            controller.disconnect();
        }
    }
    Ok(())
}

/// `explicit`, or the session account.
fn target(client: &PeerClient, explicit: Option<Address>) -> Address {
    explicit
        .or_else(|| client.address())
        .unwrap_or(Address::FALLBACK)
}

fn swap_controller(client: PeerClient, pair: &PairArgs) -> SwapController<PeerClient> {
    let registry = pair
        .listings
        .iter()
        .fold(TokenRegistry::default(), |registry, (symbol, address)| {
            registry.with_address(symbol, *address)
        });
    let controller = SwapController::new(std::sync::Arc::new(client), registry);
    for (side, symbol) in [(Side::From, &pair.from), (Side::To, &pair.to)] {
        if let Err(e) = controller.select_token(side, symbol) {
            fatal(&e.to_string());
        }
    }
    controller
}

/// Parse `SYMBOL=#N`.
fn parse_listing(raw: &str) -> Result<(String, Address), String> {
    let (symbol, address) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SYMBOL=#N, got {raw:?}"))?;
    if symbol.is_empty() {
        return Err(format!("missing symbol in {raw:?}"));
    }
    let address = Address::parse(address).map_err(|e| e.to_string())?;
    Ok((symbol.to_ascii_uppercase(), address))
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => fatal(&format!("failed to encode output: {e}")),
    }
}

/// Print an error message to stderr and exit with code 2.
fn fatal(msg: &str) -> ! {
    eprintln!("vortex: {}", msg);
    process::exit(2);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_log_filter_covers_cli() {
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
        assert_eq!(module_path!().split("::").next(), Some("vortex"));
        assert!(DEFAULT_LOG_FILTER
            .split(',')
            .any(|directive| directive == "vortex=info"));
    }

    #[test]
    fn parses_listing() {
        assert_eq!(
            parse_listing("pai=#99").unwrap(),
            ("PAI".to_string(), Address::new(99))
        );
        assert!(parse_listing("PAI").is_err());
        assert!(parse_listing("=#99").is_err());
        assert!(parse_listing("PAI=ninety").is_err());
    }

    #[test]
    fn parses_swap_with_listings() {
        let cli = Cli::try_parse_from([
            "vortex", "swap", "2.5", "--from", "PAI", "--to", "CVX", "--list", "PAI=#99",
        ])
        .unwrap();
        match cli.command {
            Command::Swap { amount, pair } => {
                assert_eq!(amount, 2.5);
                assert_eq!(pair.from, "PAI");
                assert_eq!(pair.listings, vec![("PAI".to_string(), Address::new(99))]);
            }
            _ => panic!("expected swap"),
        }
    }

    #[test]
    fn addresses_accept_marker_or_bare_number() {
        let cli = Cli::try_parse_from(["vortex", "transfer", "#13", "1000"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Transfer { to, amount: 1000 } if to == Address::new(13)
        ));

        let cli = Cli::try_parse_from(["vortex", "balance", "13"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Balance { address: Some(a) } if a == Address::new(13)
        ));
    }

    #[test]
    fn rejects_malformed_address() {
        assert!(Cli::try_parse_from(["vortex", "market", "alice"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vortex",
            "status",
            "--peer",
            "http://localhost:8080",
            "--timeout-ms",
            "500",
        ])
        .unwrap();
        assert_eq!(cli.global.peer.as_deref(), Some("http://localhost:8080"));
        assert_eq!(cli.global.timeout_ms, Some(500));
    }
}
