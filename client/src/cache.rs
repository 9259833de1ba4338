//! Locally cached view of the lottery game and the player's balance.
//!
//! The cache is the only writer of game state. Each refresh resolves the
//! game account, reads the `LotteryGame` resource, and publishes a whole new
//! [GameState] on a watch channel, so readers never see a partial update.
//! Failures leave the previous state in place: stale data is preferred over
//! a blank board.

use crate::{client::first_u64, Error, Ledger, Result};
use lottery_types::{lottery_resource_type, AccountAddress, GameSnapshot, ViewRequest};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex as StdMutex,
    },
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, warn};

/// Decimals assumed for the payment asset until the ledger says otherwise.
pub const DEFAULT_DECIMALS: u8 = 6;

#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Address that published the lottery module.
    pub module: AccountAddress,
    /// Connected account, if any. Balances are only fetched when set.
    pub account: Option<AccountAddress>,
    pub default_decimals: u8,
}

/// Latest committed client-side state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameState {
    pub snapshot: Option<Arc<GameSnapshot>>,
    /// Raw balance of the payment asset held by the connected account.
    pub balance: Option<u64>,
    /// Decimals of the snapshot's payment asset.
    pub decimals: u8,
}

impl GameState {
    fn empty(decimals: u8) -> Self {
        Self {
            snapshot: None,
            balance: None,
            decimals,
        }
    }
}

/// Result of a refresh attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Refresh {
    /// A new snapshot was fetched and committed.
    Fresh(Arc<GameSnapshot>),
    /// Nothing new: the fetch failed, was skipped, or arrived after teardown.
    Stale,
}

pub struct GameStateCache<L: Ledger> {
    ledger: Arc<L>,
    config: CacheConfig,
    state: watch::Sender<GameState>,
    in_flight: Mutex<()>,
    decimals: StdMutex<HashMap<AccountAddress, u8>>,
    alive: Arc<AtomicBool>,
}

impl<L: Ledger> GameStateCache<L> {
    pub fn new(ledger: Arc<L>, config: CacheConfig) -> Self {
        let (state, _) = watch::channel(GameState::empty(config.default_decimals));
        Self {
            ledger,
            config,
            state,
            in_flight: Mutex::new(()),
            decimals: StdMutex::new(HashMap::new()),
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> GameState {
        self.state.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Arc<GameSnapshot>> {
        self.state.borrow().snapshot.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Stop committing results. Fetches already in flight finish, but their
    /// results are discarded.
    pub fn close(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Refresh now, waiting for any fetch already in flight to finish first
    /// so the result reflects everything that happened before this call.
    pub async fn refresh(&self) -> Refresh {
        let _guard = self.in_flight.lock().await;
        self.refresh_locked().await
    }

    /// Refresh unless a fetch is already running (timer path).
    pub async fn refresh_if_idle(&self) -> Refresh {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("refresh already in flight, skipping");
            return Refresh::Stale;
        };
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Refresh {
        if !self.is_alive() {
            return Refresh::Stale;
        }

        let fetched = match self.fetch_snapshot().await {
            Ok(snapshot) => Some(Arc::new(snapshot)),
            Err(err) => {
                warn!(error = %err, "game state fetch failed, keeping cached snapshot");
                None
            }
        };

        let current = self.state();
        let Some(snapshot) = fetched.clone().or(current.snapshot.clone()) else {
            return Refresh::Stale;
        };
        let decimals = self.resolve_decimals(snapshot.asset_metadata).await;
        let balance = match self.config.account {
            Some(account) => Some(self.fetch_balance(account, snapshot.asset_metadata).await),
            None => None,
        };

        if !self.is_alive() {
            debug!("discarding refresh after teardown");
            return Refresh::Stale;
        }
        self.state.send_replace(GameState {
            snapshot: Some(snapshot),
            balance,
            decimals,
        });

        match fetched {
            Some(snapshot) => {
                debug!(
                    prize_pool = snapshot.prize_pool_raw,
                    players = snapshot.player_count,
                    next_draw_at = snapshot.next_draw_at(),
                    "game state refreshed"
                );
                Refresh::Fresh(snapshot)
            }
            None => Refresh::Stale,
        }
    }

    async fn fetch_snapshot(&self) -> Result<GameSnapshot> {
        let module = self.config.module;
        let result = self
            .ledger
            .view(&ViewRequest::get_game_address(module))
            .await?;
        let game_address: AccountAddress = result
            .first()
            .and_then(|value| value.as_str())
            .and_then(|value| value.parse().ok())
            .ok_or(Error::UnexpectedResponse)?;
        let data = self
            .ledger
            .account_resource(game_address, &lottery_resource_type(module))
            .await?;
        Ok(GameSnapshot::from_resource(data)?)
    }

    async fn fetch_balance(&self, account: AccountAddress, asset: AccountAddress) -> u64 {
        let result = self.ledger.view(&ViewRequest::balance(account, asset)).await;
        match result.and_then(|values| first_u64(&values)) {
            Ok(balance) => balance,
            Err(err) => {
                warn!(%account, error = %err, "balance fetch failed, showing zero");
                0
            }
        }
    }

    /// Decimals of `asset`, read from its metadata once and then cached.
    async fn resolve_decimals(&self, asset: AccountAddress) -> u8 {
        let known = self
            .decimals
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&asset)
            .copied();
        if let Some(decimals) = known {
            return decimals;
        }

        let result = self.ledger.view(&ViewRequest::decimals(asset)).await;
        let decimals = result
            .and_then(|values| first_u64(&values))
            .and_then(|value| u8::try_from(value).map_err(|_| Error::UnexpectedResponse));
        match decimals {
            Ok(decimals) => {
                self.decimals
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .insert(asset, decimals);
                decimals
            }
            Err(err) => {
                warn!(%asset, error = %err, "asset decimals unavailable, using default");
                self.config.default_decimals
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{game_resource, MockLedger};
    use std::time::Duration;

    fn module() -> AccountAddress {
        "0xabc".parse().unwrap()
    }

    fn player() -> AccountAddress {
        "0xbeef".parse().unwrap()
    }

    fn cache(
        ledger: &Arc<MockLedger>,
        account: Option<AccountAddress>,
    ) -> GameStateCache<MockLedger> {
        GameStateCache::new(
            ledger.clone(),
            CacheConfig {
                module: module(),
                account,
                default_decimals: DEFAULT_DECIMALS,
            },
        )
    }

    #[tokio::test]
    async fn test_refresh_populates_state() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, 1_700_000_000));
        ledger.set_decimals(MockLedger::asset(), 8);
        ledger.set_balance(player(), MockLedger::asset(), 50_000_000);
        let cache = cache(&ledger, Some(player()));

        let Refresh::Fresh(snapshot) = cache.refresh().await else {
            panic!("expected fresh snapshot");
        };
        assert_eq!(snapshot.ticket_price_raw, 2_000_000);

        let state = cache.state();
        assert_eq!(state.snapshot, Some(snapshot));
        assert_eq!(state.balance, Some(50_000_000));
        assert_eq!(state.decimals, 8);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cached_snapshot() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, 1_700_000_000));
        let cache = cache(&ledger, None);

        assert!(matches!(cache.refresh().await, Refresh::Fresh(_)));
        let before = cache.snapshot().unwrap();

        ledger.fail_reads(true);
        assert_eq!(cache.refresh().await, Refresh::Stale);
        let after = cache.snapshot().unwrap();
        assert_eq!(*before, *after);
    }

    #[tokio::test]
    async fn test_failed_first_refresh_leaves_cache_empty() {
        let ledger = Arc::new(MockLedger::new(module()));
        let cache = cache(&ledger, Some(player()));

        assert_eq!(cache.refresh().await, Refresh::Stale);
        let state = cache.state();
        assert!(state.snapshot.is_none());
        assert!(state.balance.is_none());
    }

    #[tokio::test]
    async fn test_malformed_resource_is_stale() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, 1_700_000_000));
        let cache = cache(&ledger, None);
        cache.refresh().await;

        let mut malformed = game_resource(2_000_000, 600, 1_700_000_000);
        malformed["prize_pool"] = serde_json::json!({ "unexpected": true });
        ledger.set_game(malformed);
        assert_eq!(cache.refresh().await, Refresh::Stale);
        assert_eq!(cache.snapshot().unwrap().prize_pool_raw, 0);
    }

    #[tokio::test]
    async fn test_balance_failure_reads_as_zero() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, 1_700_000_000));
        ledger.set_balance(player(), MockLedger::asset(), 10);
        let cache = cache(&ledger, Some(player()));
        cache.refresh().await;
        assert_eq!(cache.state().balance, Some(10));

        ledger.fail_balance(true);
        cache.refresh().await;
        let state = cache.state();
        assert_eq!(state.balance, Some(0));
        assert!(state.snapshot.is_some());
    }

    #[tokio::test]
    async fn test_decimals_resolved_once_per_asset() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, 1_700_000_000));
        ledger.set_decimals(MockLedger::asset(), 8);
        let cache = cache(&ledger, None);

        cache.refresh().await;
        cache.refresh().await;
        cache.refresh().await;
        assert_eq!(ledger.decimals_reads(), 1);
        assert_eq!(cache.state().decimals, 8);
    }

    #[tokio::test]
    async fn test_decimals_fall_back_to_default() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, 1_700_000_000));
        let cache = cache(&ledger, None);

        cache.refresh().await;
        assert_eq!(cache.state().decimals, DEFAULT_DECIMALS);

        // Not cached on failure: picked up once available.
        ledger.set_decimals(MockLedger::asset(), 8);
        cache.refresh().await;
        assert_eq!(cache.state().decimals, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_timer_refreshes_collapse() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, 1_700_000_000));
        ledger.set_read_delay(Duration::from_millis(100));
        let cache = Arc::new(cache(&ledger, None));

        let (first, second) = tokio::join!(cache.refresh_if_idle(), cache.refresh_if_idle());
        assert!(matches!(first, Refresh::Fresh(_)));
        assert_eq!(second, Refresh::Stale);
        assert_eq!(ledger.resource_reads(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_refresh_waits_and_sees_latest() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, 1_700_000_000));
        ledger.set_read_delay(Duration::from_millis(100));
        let cache = Arc::new(cache(&ledger, None));

        let timer = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh_if_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // State changes while the timer fetch is in flight.
        ledger.add_players(2);
        let explicit = cache.refresh().await;
        let Refresh::Fresh(snapshot) = explicit else {
            panic!("expected fresh snapshot");
        };
        assert_eq!(snapshot.player_count, 2);
        assert!(matches!(timer.await.unwrap(), Refresh::Fresh(_)));
        assert_eq!(ledger.resource_reads(), 2);
        assert_eq!(cache.snapshot().unwrap().player_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_after_close_are_discarded() {
        let ledger = Arc::new(MockLedger::new(module()));
        ledger.set_game(game_resource(2_000_000, 600, 1_700_000_000));
        ledger.set_read_delay(Duration::from_millis(100));
        let cache = Arc::new(cache(&ledger, None));

        let pending = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.close();

        assert_eq!(pending.await.unwrap(), Refresh::Stale);
        assert!(cache.snapshot().is_none());
        assert_eq!(cache.refresh().await, Refresh::Stale);
    }
}
