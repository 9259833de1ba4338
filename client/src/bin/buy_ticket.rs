//! Buy lottery tickets with the configured account.

use anyhow::{bail, Context, Result};
use clap::Parser;
use lottery_client::{config::require_private_key, Config, Wallet};
use lottery_types::{EntryFunction, TicketQuantity, TransactionOutcome};
use std::{num::NonZeroU64, path::PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Buy tickets in the on-chain lottery")]
struct Args {
    /// Number of tickets to buy
    #[arg(default_value = "1")]
    quantity: NonZeroU64,

    /// YAML config file (reads LOTTERY_* environment variables when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Signer private key hex
    #[arg(long)]
    private_key: Option<String>,

    /// Path to file with signer private key hex
    #[arg(long)]
    private_key_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("load configuration")?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .init();

    let key = require_private_key(args.private_key, args.private_key_file)
        .context("signer private key required")?;
    let client = config.client().context("create node client")?;
    let wallet = config
        .wallet(client.clone(), &key)
        .context("load signer")?;
    let quantity = TicketQuantity::from(args.quantity);
    info!(
        network = %config.network,
        account = %wallet.address(),
        %quantity,
        "buying tickets"
    );

    let payload = EntryFunction::buy_ticket(config.module_address, quantity.get());
    let hash = wallet
        .sign_and_submit(payload)
        .await
        .context("submit purchase")?;
    println!("Submitted: {hash}");

    match client
        .wait_for_transaction(&hash)
        .await
        .context("await confirmation")?
    {
        TransactionOutcome::Confirmed(hash) => {
            println!("Bought {quantity} ticket(s) ({})", hash.short());
            println!("{}", config.explorer_url(&hash));
            Ok(())
        }
        TransactionOutcome::Failed(reason) => bail!("purchase failed: {reason}"),
    }
}
