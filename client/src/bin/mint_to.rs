//! Mint payment tokens to an account (requires the token admin key).

use anyhow::{bail, Context, Result};
use clap::Parser;
use lottery_client::{config::require_private_key, Config, Wallet};
use lottery_types::{AccountAddress, EntryFunction, TransactionOutcome};
use std::path::PathBuf;
use tracing::info;

const DEFAULT_MINT_AMOUNT: u64 = 100_000_000;

#[derive(Parser, Debug)]
#[command(author, version, about = "Mint lottery payment tokens to an account")]
struct Args {
    /// Account receiving the tokens
    recipient: AccountAddress,

    /// Raw amount to mint
    #[arg(default_value_t = DEFAULT_MINT_AMOUNT)]
    amount: u64,

    /// YAML config file (reads LOTTERY_* environment variables when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Admin private key hex
    #[arg(long)]
    private_key: Option<String>,

    /// Path to file with admin private key hex
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
        .context("admin private key required")?;
    let client = config.client().context("create node client")?;
    let wallet = config.wallet(client.clone(), &key).context("load admin signer")?;
    info!(
        admin = %wallet.address(),
        recipient = %args.recipient,
        amount = args.amount,
        "minting tokens"
    );

    let payload = EntryFunction::mint_to(
        config.module_address,
        &config.token_module,
        args.recipient,
        args.amount,
    );
    let hash = wallet.sign_and_submit(payload).await.context("submit mint")?;
    println!("Submitted: {hash}");

    match client
        .wait_for_transaction(&hash)
        .await
        .context("await confirmation")?
    {
        TransactionOutcome::Confirmed(hash) => {
            println!("Minted {} to {}", args.amount, args.recipient);
            println!("{}", config.explorer_url(&hash));
            Ok(())
        }
        TransactionOutcome::Failed(reason) => bail!("mint failed: {reason}"),
    }
}
