mod logging;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rand::seq::SliceRandom;
use tracing::info;

use chain_dash::FinalizedTransaction;
use wallet_core::commands::parse_payout;
use wallet_core::{data_dir, CoinSort, PayOptions, WalletConfig, WalletError, WalletStore};

#[derive(Parser, Debug)]
#[command(name = "dashwallet")]
#[command(version)]
#[command(about = "Denominated, stamp-padded Dash transactions")]
struct Cli {
    /// Wallet data directory (default: $DASHWALLET_DATA or the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of a report
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show fee bounds for a number of inputs and outputs
    Appraise {
        inputs: usize,
        /// Defaults to the number of inputs
        outputs: Option<usize>,
    },
    /// Show the balance of each account and the total
    Balances,
    /// List coins with their face value and stamps
    Coins {
        #[arg(long)]
        account: Option<String>,
        /// Sort keys in order: wallet, amount (or satoshis), addr
        #[arg(long, value_delimiter = ',', value_parser = sort_arg)]
        sort: Vec<CoinSort>,
    },
    /// Re-denominate coins into fresh addresses of one account
    Denominate {
        /// Comma separated coins, as addr:txid:vout prefixes
        coins: String,
        /// Receiving account (default: the configured change account)
        #[arg(long)]
        account: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Pay an amount, or the full value of some coins, to a contact or account
    Pay {
        handle: String,
        /// A decimal amount, or comma separated coins to send in full
        amount_or_coins: String,
        /// Another payee in the same transaction, as handle=amount
        #[arg(long = "payout", value_parser = payout_arg)]
        payouts: Vec<(String, String)>,
        /// Spend only these coins
        #[arg(long)]
        coins: Option<String>,
        /// Spend coins from these accounts
        #[arg(long, value_delimiter = ',')]
        accounts: Option<Vec<String>>,
        #[arg(long)]
        change_account: Option<String>,
        /// Send leftover value back as change outputs
        #[arg(long)]
        allow_change: bool,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Write the finalized transaction here for the signer
    #[arg(long)]
    out: Option<PathBuf>,
    /// Randomize output order
    #[arg(long)]
    shuffle: bool,
    /// Plan and print, but leave the wallet untouched
    #[arg(long)]
    dry_run: bool,
}

fn payout_arg(s: &str) -> Result<(String, String), String> {
    parse_payout(s).map_err(|e| e.to_string())
}

fn sort_arg(s: &str) -> Result<CoinSort, String> {
    s.parse().map_err(|e: WalletError| e.to_string())
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let internal = err
                .downcast_ref::<WalletError>()
                .is_some_and(WalletError::is_internal);
            if internal {
                eprintln!("this is a bug: the transaction books did not balance; nothing was saved");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let dir = data_dir(cli.data_dir.as_deref());
    let json = cli.json;

    match cli.command {
        Command::Appraise { inputs, outputs } => {
            let report = wallet_core::appraise(inputs, outputs)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report::Appraisal(&report));
            }
        }
        Command::Balances => {
            let config = WalletConfig::load(&dir)?;
            let store = WalletStore::open(&dir, config.allow_reuse)?;
            let balances = wallet_core::balances(&store, &store.own_accounts())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&balances)?);
            } else {
                print!("{}", report::Balances(&balances));
            }
        }
        Command::Coins { account, sort } => {
            let config = WalletConfig::load(&dir)?;
            let store = WalletStore::open(&dir, config.allow_reuse)?;
            let listing = wallet_core::list_coins(&store, &config, account.as_deref(), &sort)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                let coins = report::Coins {
                    listing: &listing,
                    stamp_size: config.stamp_size,
                };
                print!("{coins}");
            }
        }
        Command::Denominate {
            coins,
            account,
            output,
        } => {
            let config = WalletConfig::load(&dir)?;
            let mut store = WalletStore::open(&dir, config.allow_reuse)?;
            let tx = wallet_core::denominate(&mut store, &config, &coins, account.as_deref())?;
            finish(tx, &output, &store, json)?;
        }
        Command::Pay {
            handle,
            amount_or_coins,
            payouts,
            coins,
            accounts,
            change_account,
            allow_change,
            output,
        } => {
            let config = WalletConfig::load(&dir)?;
            let mut store = WalletStore::open(&dir, config.allow_reuse)?;
            let opts = PayOptions {
                handle,
                amount_or_coins,
                extra_payouts: payouts,
                coins,
                accounts,
                change_account,
                allow_change,
            };
            let tx = wallet_core::pay(&mut store, &config, &opts)?;
            finish(tx, &output, &store, json)?;
        }
    }
    Ok(())
}

/// Report the finalized transaction, hand it to the signer as JSON, and
/// only then commit the address cursors.
fn finish(
    mut tx: FinalizedTransaction,
    output: &OutputArgs,
    store: &WalletStore,
    json: bool,
) -> anyhow::Result<()> {
    if output.shuffle {
        tx.outputs.shuffle(&mut rand::thread_rng());
    }

    let doc = serde_json::to_string_pretty(&tx)?;
    if !json {
        print!("{}", report::Transaction(&tx));
    }
    match &output.out {
        Some(path) if !output.dry_run => {
            std::fs::write(path, &doc)
                .with_context(|| format!("cannot write transaction to {}", path.display()))?;
            info!(path = %path.display(), "wrote unsigned transaction");
        }
        _ => println!("{doc}"),
    }

    if output.dry_run {
        info!("dry run, wallet not updated");
        return Ok(());
    }
    store
        .save()
        .with_context(|| format!("cannot save wallet {}", store.path().display()))
}
