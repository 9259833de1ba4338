//! A live view of the lottery.
//!
//! A [Session] owns the two periodic activities: the network refresh
//! (every 5 seconds by default) and the countdown tick (every second). Both
//! stop when the session is shut down or dropped. Work still in flight at that
//! point may finish, but its results are discarded.

use crate::{
    cache::{CacheConfig, DEFAULT_DECIMALS},
    GameState, GameStateCache, Ledger, Notification, Purchaser, Rejected, Refresh, Wallet,
};
use lottery_types::{AccountAddress, Countdown, TicketQuantity, TransactionOutcome};
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tokio::{
    sync::{mpsc, watch},
    task::{JoinError, JoinHandle},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info};

const NOTIFICATION_CAPACITY: usize = 64;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub module: AccountAddress,
    pub default_decimals: u8,
    pub refresh_interval: Duration,
    pub countdown_tick: Duration,
}

impl SessionConfig {
    pub fn new(module: AccountAddress) -> Self {
        Self {
            module,
            default_decimals: DEFAULT_DECIMALS,
            refresh_interval: Duration::from_secs(5),
            countdown_tick: Duration::from_secs(1),
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub struct Session<L: Ledger, W: Wallet> {
    cache: Arc<GameStateCache<L>>,
    purchaser: Arc<Purchaser<L, W>>,
    countdown: watch::Receiver<Option<Countdown>>,
    stop: watch::Sender<bool>,
    refresh_task: JoinHandle<()>,
    countdown_task: JoinHandle<()>,
}

impl<L: Ledger, W: Wallet> Session<L, W> {
    /// Start refreshing and ticking. Must be called within a tokio runtime.
    pub fn start(
        config: SessionConfig,
        ledger: Arc<L>,
        wallet: Option<Arc<W>>,
    ) -> (Self, mpsc::Receiver<Notification>) {
        let cache = Arc::new(GameStateCache::new(
            ledger.clone(),
            CacheConfig {
                module: config.module,
                account: wallet.as_ref().map(|wallet| wallet.address()),
                default_decimals: config.default_decimals,
            },
        ));
        let (notifications, receiver) = mpsc::channel(NOTIFICATION_CAPACITY);
        let purchaser = Arc::new(Purchaser::new(ledger, wallet, cache.clone(), notifications));
        let (countdown_tx, countdown) = watch::channel(None);
        let (stop, stopped) = watch::channel(false);

        let refresh_task = tokio::spawn(Self::refresh_loop(
            cache.clone(),
            stopped,
            config.refresh_interval,
        ));
        let countdown_task = tokio::spawn(Self::countdown_loop(
            cache.clone(),
            countdown_tx,
            config.countdown_tick,
        ));
        info!(
            module = %config.module,
            refresh_interval = ?config.refresh_interval,
            "lottery session started"
        );

        (
            Self {
                cache,
                purchaser,
                countdown,
                stop,
                refresh_task,
                countdown_task,
            },
            receiver,
        )
    }

    /// Refresh on every tick until stopped. A refresh already running when
    /// the stop arrives is not cancelled; the cache discards its result.
    async fn refresh_loop(
        cache: Arc<GameStateCache<L>>,
        mut stopped: watch::Receiver<bool>,
        period: Duration,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stopped.changed() => break,
            }
            if !cache.is_alive() {
                break;
            }
            if let Refresh::Stale = cache.refresh_if_idle().await {
                debug!("refresh produced no new snapshot");
            }
        }
        debug!("refresh stopped");
    }

    async fn countdown_loop(
        cache: Arc<GameStateCache<L>>,
        countdown: watch::Sender<Option<Countdown>>,
        period: Duration,
    ) {
        let mut state = cache.subscribe();
        drop(cache);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let derived = state
                .borrow_and_update()
                .snapshot
                .as_ref()
                .map(|snapshot| Countdown::derive(snapshot, now_secs()));
            countdown.send_replace(derived);
        }
        debug!("countdown stopped");
    }

    /// Latest committed game state.
    pub fn state(&self) -> GameState {
        self.cache.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<GameState> {
        self.cache.subscribe()
    }

    /// Latest countdown; `None` until the first snapshot arrives.
    pub fn countdown(&self) -> Option<Countdown> {
        *self.countdown.borrow()
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<Option<Countdown>> {
        self.countdown.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.purchaser.is_busy()
    }

    pub fn account(&self) -> Option<AccountAddress> {
        self.purchaser.account()
    }

    pub async fn refresh(&self) -> Refresh {
        self.cache.refresh().await
    }

    pub async fn buy(&self, quantity: TicketQuantity) -> Result<TransactionOutcome, Rejected> {
        self.purchaser.buy(quantity).await
    }

    /// Stop timers and discard any results that land afterwards.
    pub fn shutdown(&self) {
        self.cache.close();
        self.stop.send_replace(true);
        self.countdown_task.abort();
    }

    /// Shut down and wait for the refresh task to exit, including any
    /// refresh it was running. Call at most once.
    pub async fn shutdown_and_wait(&mut self) -> Result<(), JoinError> {
        self.shutdown();
        (&mut self.refresh_task).await
    }
}

impl<L: Ledger, W: Wallet> Drop for Session<L, W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{game_resource, MockLedger, MockWallet};
    use lottery_types::{format_amount, total_cost};

    fn module() -> AccountAddress {
        "0xabc".parse().unwrap()
    }

    fn player() -> AccountAddress {
        "0xbeef".parse().unwrap()
    }

    fn start(
        ledger: &Arc<MockLedger>,
        connected: bool,
    ) -> (Session<MockLedger, MockWallet>, mpsc::Receiver<Notification>) {
        let wallet = connected.then(|| Arc::new(MockWallet::new(ledger.clone(), player())));
        Session::start(SessionConfig::new(module()), ledger.clone(), wallet)
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_on_interval() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, now_secs()));
        let (session, _notifications) = start(&ledger, false);

        // First tick fires immediately.
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ledger.resource_reads(), 1);
        assert!(session.state().snapshot.is_some());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ledger.resource_reads(), 2);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ledger.resource_reads(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_follows_snapshot() {
        let ledger = Arc::new(MockLedger::new(module()));
        let (session, _notifications) = start(&ledger, false);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(session.countdown(), None);

        ledger.set_game(game_resource(2_000_000, 600, now_secs()));
        session.refresh().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        let Some(Countdown::Remaining(remaining)) = session.countdown() else {
            panic!("expected remaining time");
        };
        assert!(remaining <= Duration::from_secs(600));
        assert!(remaining >= Duration::from_secs(595));

        // An epoch that already ended is reported as imminent, not negative.
        ledger.set_game(game_resource(2_000_000, 600, now_secs() - 601));
        session.refresh().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(session.countdown(), Some(Countdown::DrawImminent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_in_flight_refresh() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, now_secs()));
        ledger.set_read_delay(Duration::from_millis(100));
        let (mut session, _notifications) = start(&ledger, false);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(ledger.resource_reads(), 1);
        session.shutdown();

        // The in-flight read runs to completion, then the loop exits
        // without being cancelled.
        let finished = tokio::time::timeout(Duration::from_secs(1), session.shutdown_and_wait())
            .await
            .expect("refresh task should stop after the in-flight read");
        assert!(finished.is_ok());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(session.state().snapshot.is_none());
        assert_eq!(ledger.resource_reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_while_idle_stops_refresh_loop() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, now_secs()));
        let (mut session, _notifications) = start(&ledger, false);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ledger.resource_reads(), 1);

        let finished = tokio::time::timeout(Duration::from_secs(1), session.shutdown_and_wait())
            .await
            .expect("refresh task should stop before the next tick");
        assert!(finished.is_ok());
        assert_eq!(ledger.resource_reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchase_through_session() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, now_secs()));
        ledger.set_balance(player(), MockLedger::asset(), 10_000_000);
        let (session, mut notifications) = start(&ledger, true);
        tokio::time::sleep(Duration::from_millis(1)).await;

        let state = session.state();
        let snapshot = state.snapshot.clone().unwrap();
        assert_eq!(state.balance, Some(10_000_000));

        // Quantity entry: defaults to 1, floors at 1, increments to 2, then 3.
        let quantity = TicketQuantity::default();
        assert_eq!(quantity.decrement().get(), 1);
        let quantity = quantity.increment();
        assert_eq!(quantity.get(), 2);
        let quantity = quantity.increment();
        let total = total_cost(snapshot.ticket_price_raw, quantity.get());
        assert_eq!(format_amount(total, state.decimals), "6");

        let outcome = session.buy(quantity).await.unwrap();
        assert!(outcome.is_confirmed());
        assert!(matches!(
            notifications.recv().await,
            Some(Notification::Purchased { .. })
        ));

        let state = session.state();
        assert_eq!(state.snapshot.unwrap().player_count, 3);
        assert_eq!(state.balance, Some(4_000_000));
        assert_eq!(session.account(), Some(player()));
    }
}
