//! In-memory ledger and wallet for tests.
//!
//! `MockLedger` plays the contract: confirmed `buy_ticket` calls add the
//! buyer to the player list, grow the prize pool, and debit the buyer.

use crate::{Error, Ledger, Result, Wallet};
use lottery_types::{
    game::parse_u64, lottery_resource_type, AccountAddress, EntryFunction, FunctionId,
    TransactionHash, TransactionOutcome, ViewRequest,
};
use serde_json::{json, Value as JsonValue};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::time::sleep;

/// Build a `LotteryGame` resource with an empty pool and no players.
pub fn game_resource(price_ticket: u64, epoch: u64, last_time: u64) -> JsonValue {
    json!({
        "price_ticket": price_ticket.to_string(),
        "prize_pool": "0",
        "players": { "data": [] },
        "epoch": epoch.to_string(),
        "last_time": last_time.to_string(),
        "asset_metadata": { "inner": MockLedger::asset().to_string() },
    })
}

/// What the next submission should do.
#[derive(Clone, Debug)]
enum NextSubmission {
    Accept,
    Reject,
    Abort(String),
}

struct Pending {
    sender: AccountAddress,
    payload: EntryFunction,
    abort: Option<String>,
}

#[derive(Default)]
struct MockState {
    game: Option<JsonValue>,
    balances: HashMap<(AccountAddress, AccountAddress), u64>,
    decimals: HashMap<AccountAddress, u8>,
    fail_reads: bool,
    fail_balance: bool,
    read_delay: Duration,
    confirm_delay: Duration,
    next_submission: Option<NextSubmission>,
    submitted: Vec<EntryFunction>,
    pending: HashMap<TransactionHash, Pending>,
    resource_reads: usize,
    decimals_reads: usize,
}

pub struct MockLedger {
    module: AccountAddress,
    game_address: AccountAddress,
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new(module: AccountAddress) -> Self {
        Self {
            module,
            game_address: "0x6a6d65".parse().unwrap(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Payment asset used by [game_resource].
    pub fn asset() -> AccountAddress {
        "0xa55e7".parse().unwrap()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_game(&self, resource: JsonValue) {
        self.with_state(|s| s.game = Some(resource));
    }

    pub fn set_balance(&self, owner: AccountAddress, asset: AccountAddress, amount: u64) {
        self.with_state(|s| s.balances.insert((owner, asset), amount));
    }

    pub fn set_decimals(&self, asset: AccountAddress, decimals: u8) {
        self.with_state(|s| s.decimals.insert(asset, decimals));
    }

    pub fn fail_reads(&self, fail: bool) {
        self.with_state(|s| s.fail_reads = fail);
    }

    pub fn fail_balance(&self, fail: bool) {
        self.with_state(|s| s.fail_balance = fail);
    }

    /// Delay applied to every resource read.
    pub fn set_read_delay(&self, delay: Duration) {
        self.with_state(|s| s.read_delay = delay);
    }

    /// Delay before a submitted transaction commits.
    pub fn set_confirm_delay(&self, delay: Duration) {
        self.with_state(|s| s.confirm_delay = delay);
    }

    /// Make the next submission fail before reaching the chain.
    pub fn reject_next_submission(&self) {
        self.with_state(|s| s.next_submission = Some(NextSubmission::Reject));
    }

    /// Make the next submitted transaction abort with `vm_status`.
    pub fn abort_next_submission(&self, reason: &str) {
        self.with_state(|s| s.next_submission = Some(NextSubmission::Abort(reason.to_string())));
    }

    /// Append `count` anonymous players to the game.
    pub fn add_players(&self, count: usize) {
        self.with_state(|s| {
            if let Some(players) = s
                .game
                .as_mut()
                .and_then(|game| game["players"]["data"].as_array_mut())
            {
                players.extend((0..count).map(|_| json!("0x0")));
            }
        });
    }

    pub fn submitted(&self) -> Vec<EntryFunction> {
        self.with_state(|s| s.submitted.clone())
    }

    pub fn resource_reads(&self) -> usize {
        self.with_state(|s| s.resource_reads)
    }

    pub fn decimals_reads(&self) -> usize {
        self.with_state(|s| s.decimals_reads)
    }

    fn submit(&self, sender: AccountAddress, payload: EntryFunction) -> Result<TransactionHash> {
        self.with_state(|s| {
            let next = s.next_submission.take().unwrap_or(NextSubmission::Accept);
            if matches!(next, NextSubmission::Reject) {
                return Err(Error::Signing("user rejected the request".to_string()));
            }
            s.submitted.push(payload.clone());
            let hash = TransactionHash::new(format!("0x{:064x}", s.submitted.len()));
            let abort = match next {
                NextSubmission::Abort(reason) => Some(reason),
                _ => None,
            };
            s.pending.insert(
                hash.clone(),
                Pending {
                    sender,
                    payload,
                    abort,
                },
            );
            Ok(hash)
        })
    }

    fn apply_purchase(state: &mut MockState, buyer: AccountAddress, quantity: u64) {
        let Some(game) = state.game.as_mut() else {
            return;
        };
        let price = parse_u64(&game["price_ticket"]).unwrap_or(0);
        let cost = price.saturating_mul(quantity);
        let pool = parse_u64(&game["prize_pool"]).unwrap_or(0);
        game["prize_pool"] = json!(pool.saturating_add(cost).to_string());
        if let Some(players) = game["players"]["data"].as_array_mut() {
            players.extend((0..quantity).map(|_| json!(buyer.to_string())));
        }
        let balance = state.balances.entry((buyer, Self::asset())).or_insert(0);
        *balance = balance.saturating_sub(cost);
    }
}

impl Ledger for MockLedger {
    async fn view(&self, request: &ViewRequest) -> Result<Vec<JsonValue>> {
        let function = request.function.as_str();
        self.with_state(|s| {
            if s.fail_reads {
                return Err(Error::Failed(reqwest::StatusCode::SERVICE_UNAVAILABLE));
            }
            if function == FunctionId::get_game_address(self.module).to_string() {
                return Ok(vec![json!(self.game_address.to_string())]);
            }
            let address_arg = |index: usize| -> Result<AccountAddress> {
                request
                    .arguments
                    .get(index)
                    .and_then(JsonValue::as_str)
                    .and_then(|s| s.parse().ok())
                    .ok_or(Error::UnexpectedResponse)
            };
            if function == FunctionId::primary_store_balance().to_string() {
                if s.fail_balance {
                    return Err(Error::Failed(reqwest::StatusCode::BAD_REQUEST));
                }
                let owner = address_arg(0)?;
                let asset = address_arg(1)?;
                let balance = s.balances.get(&(owner, asset)).copied().unwrap_or(0);
                return Ok(vec![json!(balance.to_string())]);
            }
            if function == FunctionId::asset_decimals().to_string() {
                s.decimals_reads += 1;
                let asset = address_arg(0)?;
                return match s.decimals.get(&asset) {
                    Some(decimals) => Ok(vec![json!(decimals)]),
                    None => Err(Error::NotFound(function.to_string())),
                };
            }
            Err(Error::NotFound(function.to_string()))
        })
    }

    async fn account_resource(
        &self,
        address: AccountAddress,
        resource_type: &str,
    ) -> Result<JsonValue> {
        let delay = self.with_state(|s| {
            s.resource_reads += 1;
            s.read_delay
        });
        if !delay.is_zero() {
            sleep(delay).await;
        }
        self.with_state(|s| {
            if s.fail_reads {
                return Err(Error::Failed(reqwest::StatusCode::SERVICE_UNAVAILABLE));
            }
            if address != self.game_address || resource_type != lottery_resource_type(self.module)
            {
                return Err(Error::NotFound(resource_type.to_string()));
            }
            s.game
                .clone()
                .ok_or_else(|| Error::NotFound(resource_type.to_string()))
        })
    }

    async fn wait_for_transaction(&self, hash: &TransactionHash) -> Result<TransactionOutcome> {
        let delay = self.with_state(|s| s.confirm_delay);
        if !delay.is_zero() {
            sleep(delay).await;
        }
        self.with_state(|s| {
            let pending = s.pending.remove(hash).ok_or(Error::ConfirmationTimeout(hash.clone()))?;
            if let Some(reason) = pending.abort {
                return Ok(TransactionOutcome::Failed(reason));
            }
            if pending.payload.function == FunctionId::buy_ticket(self.module).to_string() {
                let quantity = pending.payload.arguments.first().and_then(parse_u64).unwrap_or(0);
                Self::apply_purchase(s, pending.sender, quantity);
            }
            Ok(TransactionOutcome::Confirmed(hash.clone()))
        })
    }
}

/// Wallet that submits straight into a [MockLedger].
pub struct MockWallet {
    ledger: Arc<MockLedger>,
    address: AccountAddress,
}

impl MockWallet {
    pub fn new(ledger: Arc<MockLedger>, address: AccountAddress) -> Self {
        Self { ledger, address }
    }
}

impl Wallet for MockWallet {
    fn address(&self) -> AccountAddress {
        self.address
    }

    async fn sign_and_submit(&self, payload: EntryFunction) -> Result<TransactionHash> {
        self.ledger.submit(self.address, payload)
    }
}
