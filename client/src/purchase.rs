//! Ticket purchases.
//!
//! At most one purchase may be in flight per [Purchaser]. A confirmed
//! purchase triggers a cache refresh; the cache is never edited locally to
//! anticipate the result.

use crate::{GameStateCache, Ledger, Result, Wallet};
use lottery_types::{AccountAddress, EntryFunction, TicketQuantity, TransactionOutcome};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One-shot feedback for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Purchased {
        quantity: TicketQuantity,
        short_hash: String,
    },
    PurchaseFailed {
        reason: String,
    },
}

/// Reasons a purchase was not attempted.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    #[error("a purchase is already in progress")]
    Busy,
    #[error("no wallet connected")]
    NotConnected,
}

/// Holds the busy flag for the duration of a purchase.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Purchaser<L: Ledger, W: Wallet> {
    ledger: Arc<L>,
    wallet: Option<Arc<W>>,
    cache: Arc<GameStateCache<L>>,
    module: AccountAddress,
    busy: AtomicBool,
    notifications: mpsc::Sender<Notification>,
}

impl<L: Ledger, W: Wallet> Purchaser<L, W> {
    pub fn new(
        ledger: Arc<L>,
        wallet: Option<Arc<W>>,
        cache: Arc<GameStateCache<L>>,
        notifications: mpsc::Sender<Notification>,
    ) -> Self {
        let module = cache.config().module;
        Self {
            ledger,
            wallet,
            cache,
            module,
            busy: AtomicBool::new(false),
            notifications,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn account(&self) -> Option<AccountAddress> {
        self.wallet.as_ref().map(|wallet| wallet.address())
    }

    /// Buy `quantity` tickets and wait for the outcome.
    ///
    /// Returns [Rejected::Busy] immediately, without submitting anything,
    /// while another purchase from this instance is unresolved.
    pub async fn buy(
        &self,
        quantity: TicketQuantity,
    ) -> std::result::Result<TransactionOutcome, Rejected> {
        let wallet = self.wallet.as_ref().ok_or(Rejected::NotConnected)?;
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!(%quantity, "purchase rejected, another is in flight");
            return Err(Rejected::Busy);
        };

        let outcome = match self.submit_and_confirm(wallet, quantity).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%quantity, error = %err, "purchase failed");
                TransactionOutcome::Failed(err.user_message())
            }
        };

        match &outcome {
            TransactionOutcome::Confirmed(hash) => {
                info!(%quantity, %hash, "tickets purchased");
                self.notify(Notification::Purchased {
                    quantity,
                    short_hash: hash.short(),
                });
                self.cache.refresh().await;
            }
            TransactionOutcome::Failed(reason) => {
                warn!(%quantity, %reason, "purchase not confirmed");
                self.notify(Notification::PurchaseFailed {
                    reason: reason.clone(),
                });
            }
        }
        Ok(outcome)
    }

    async fn submit_and_confirm(
        &self,
        wallet: &W,
        quantity: TicketQuantity,
    ) -> Result<TransactionOutcome> {
        let payload = EntryFunction::buy_ticket(self.module, quantity.get());
        let hash = wallet.sign_and_submit(payload).await?;
        debug!(%hash, "purchase submitted, awaiting confirmation");
        self.ledger.wait_for_transaction(&hash).await
    }

    fn notify(&self, notification: Notification) {
        if let Err(err) = self.notifications.try_send(notification) {
            debug!(error = %err, "notification dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::{CacheConfig, DEFAULT_DECIMALS},
        mocks::{game_resource, MockLedger, MockWallet},
    };
    use lottery_types::{FunctionId, TransactionHash};
    use std::time::Duration;

    fn module() -> AccountAddress {
        "0xabc".parse().unwrap()
    }

    fn player() -> AccountAddress {
        "0xbeef".parse().unwrap()
    }

    struct Harness {
        ledger: Arc<MockLedger>,
        cache: Arc<GameStateCache<MockLedger>>,
        purchaser: Arc<Purchaser<MockLedger, MockWallet>>,
        notifications: mpsc::Receiver<Notification>,
    }

    fn harness(connected: bool) -> Harness {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, 1_700_000_000));
        ledger.set_balance(player(), MockLedger::asset(), 100_000_000);
        let wallet = connected.then(|| Arc::new(MockWallet::new(ledger.clone(), player())));
        let cache = Arc::new(GameStateCache::new(
            ledger.clone(),
            CacheConfig {
                module: module(),
                account: wallet.as_ref().map(|w| w.address()),
                default_decimals: DEFAULT_DECIMALS,
            },
        ));
        let (tx, notifications) = mpsc::channel(16);
        let purchaser = Arc::new(Purchaser::new(ledger.clone(), wallet, cache.clone(), tx));
        Harness {
            ledger,
            cache,
            purchaser,
            notifications,
        }
    }

    #[tokio::test]
    async fn test_confirmed_purchase_refreshes_cache() {
        let mut h = harness(true);
        h.cache.refresh().await;
        let before = h.cache.snapshot().unwrap();

        let outcome = h.purchaser.buy(TicketQuantity::clamped(3)).await.unwrap();
        let TransactionOutcome::Confirmed(hash) = outcome else {
            panic!("expected confirmation");
        };

        let submitted = h.ledger.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(
            submitted[0].function,
            FunctionId::buy_ticket(module()).to_string()
        );
        assert_eq!(submitted[0].arguments, vec![serde_json::json!("3")]);

        // Refreshed from the ledger, not edited locally.
        let state = h.cache.state();
        let after = state.snapshot.unwrap();
        assert!(after.player_count >= before.player_count);
        assert_eq!(after.player_count, 3);
        assert_eq!(after.prize_pool_raw, 6_000_000);
        assert_eq!(state.balance, Some(94_000_000));

        assert_eq!(
            h.notifications.recv().await,
            Some(Notification::Purchased {
                quantity: TicketQuantity::clamped(3),
                short_hash: hash.short(),
            })
        );
        assert!(!h.purchaser.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_buy_while_in_flight_is_busy() {
        let h = harness(true);
        h.ledger.set_confirm_delay(Duration::from_secs(2));

        let first = {
            let purchaser = h.purchaser.clone();
            tokio::spawn(async move { purchaser.buy(TicketQuantity::clamped(1)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.purchaser.is_busy());

        let second = h.purchaser.buy(TicketQuantity::clamped(5)).await;
        assert_eq!(second, Err(Rejected::Busy));
        assert_eq!(h.ledger.submitted().len(), 1);

        let first = first.await.unwrap().unwrap();
        assert!(first.is_confirmed());
        assert!(!h.purchaser.is_busy());

        // Free again once resolved.
        let third = h.purchaser.buy(TicketQuantity::clamped(2)).await.unwrap();
        assert!(third.is_confirmed());
        assert_eq!(h.ledger.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_submission_reports_failure() {
        let mut h = harness(true);
        h.cache.refresh().await;
        let before = h.cache.state();
        let reads = h.ledger.resource_reads();
        h.ledger.reject_next_submission();

        let outcome = h.purchaser.buy(TicketQuantity::default()).await.unwrap();
        assert_eq!(
            outcome,
            TransactionOutcome::Failed("could not sign transaction".to_string())
        );
        assert_eq!(
            h.notifications.recv().await,
            Some(Notification::PurchaseFailed {
                reason: "could not sign transaction".to_string(),
            })
        );
        assert_eq!(h.cache.state(), before);
        assert_eq!(h.ledger.resource_reads(), reads);
        assert!(!h.purchaser.is_busy());
        assert!(h.ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_aborted_transaction_is_not_retried() {
        let mut h = harness(true);
        h.ledger
            .abort_next_submission("transaction aborted (E_GAME_CLOSED)");

        let outcome = h.purchaser.buy(TicketQuantity::default()).await.unwrap();
        assert_eq!(
            outcome,
            TransactionOutcome::Failed("transaction aborted (E_GAME_CLOSED)".to_string())
        );
        assert!(matches!(
            h.notifications.recv().await,
            Some(Notification::PurchaseFailed { .. })
        ));
        assert_eq!(h.ledger.submitted().len(), 1);
        assert!(!h.purchaser.is_busy());
    }

    #[tokio::test]
    async fn test_disconnected_buy_is_rejected() {
        let h = harness(false);
        assert_eq!(
            h.purchaser.buy(TicketQuantity::default()).await,
            Err(Rejected::NotConnected)
        );
        assert!(h.ledger.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_purchase_releases_busy_flag() {
        let h = harness(true);
        h.ledger.set_confirm_delay(Duration::from_secs(60));

        let purchase = {
            let purchaser = h.purchaser.clone();
            tokio::spawn(async move { purchaser.buy(TicketQuantity::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(h.purchaser.is_busy());

        purchase.abort();
        let _ = purchase.await;
        assert!(!h.purchaser.is_busy());
    }

    #[test]
    fn test_short_hash_in_notification() {
        let hash = TransactionHash::new("0x5f3e9a1b");
        assert_eq!(hash.short(), "0x5f3e...");
    }
}
