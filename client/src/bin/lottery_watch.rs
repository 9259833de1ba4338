//! Follow the lottery board and optionally buy tickets.
//!
//! Without a signer key the board is shown read-only.

use anyhow::{Context, Result};
use clap::Parser;
use lottery_client::{
    config::require_private_key, Config, ConfigError, GameState, Notification, Session,
};
use lottery_types::{format_amount, Countdown, TicketQuantity};
use std::{num::NonZeroU64, path::PathBuf, sync::Arc};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Watch the on-chain lottery")]
struct Args {
    /// YAML config file (reads LOTTERY_* environment variables when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Buy this many tickets once the board has loaded
    #[arg(long)]
    buy: Option<NonZeroU64>,

    /// Signer private key hex
    #[arg(long)]
    private_key: Option<String>,

    /// Path to file with signer private key hex
    #[arg(long)]
    private_key_file: Option<String>,
}

fn log_board(state: &GameState, countdown: Option<Countdown>) {
    let Some(snapshot) = state.snapshot.as_ref() else {
        info!("waiting for game state");
        return;
    };
    let countdown = countdown
        .map(|countdown| countdown.to_string())
        .unwrap_or_else(|| "-".to_string());
    let balance = state
        .balance
        .map(|balance| format_amount(balance.into(), state.decimals))
        .unwrap_or_else(|| "-".to_string());
    info!(
        prize_pool = %format_amount(snapshot.prize_pool_raw.into(), state.decimals),
        ticket_price = %format_amount(snapshot.ticket_price_raw.into(), state.decimals),
        players = snapshot.player_count,
        %countdown,
        %balance,
        "board"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).context("load configuration")?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .init();

    let key = match require_private_key(args.private_key, args.private_key_file) {
        Ok(key) => Some(key),
        Err(ConfigError::Missing(_)) if args.buy.is_none() => None,
        Err(err) => return Err(err).context("signer private key required"),
    };
    let client = config.client().context("create node client")?;
    let wallet = key
        .map(|key| config.wallet(client.clone(), &key))
        .transpose()
        .context("load signer")?;

    let (session, mut notifications) = Session::start(
        config.session_config(),
        Arc::new(client),
        wallet.map(Arc::new),
    );
    let session = Arc::new(session);

    if let Some(quantity) = args.buy {
        let session = session.clone();
        tokio::spawn(async move {
            let mut state = session.subscribe_state();
            if state.wait_for(|state| state.snapshot.is_some()).await.is_err() {
                return;
            }
            if let Err(rejected) = session.buy(TicketQuantity::from(quantity)).await {
                warn!(%rejected, "purchase not started");
            }
        });
    }

    let mut countdown = session.subscribe_countdown();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(notification) = notifications.recv() => match notification {
                Notification::Purchased { quantity, short_hash } => {
                    println!("Bought {quantity} ticket(s) ({short_hash})");
                }
                Notification::PurchaseFailed { reason } => {
                    println!("Purchase failed: {reason}");
                }
            },
            changed = countdown.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *countdown.borrow_and_update();
                log_board(&session.state(), current);
            }
        }
    }
    match Arc::try_unwrap(session) {
        Ok(mut session) => {
            if let Err(err) = session.shutdown_and_wait().await {
                warn!(error = %err, "refresh task ended abnormally");
            }
        }
        // A purchase still holds the session; stop the timers and exit.
        Err(session) => session.shutdown(),
    }
    Ok(())
}
