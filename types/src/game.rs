//! Point-in-time view of the lottery game resource.

use crate::AccountAddress;
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed game resource: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("game epoch must be positive")]
    ZeroEpoch,
}

/// Snapshot of the on-chain `LotteryGame` resource.
///
/// Never mutated by the client: each successful fetch replaces it wholesale.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameSnapshot {
    pub ticket_price_raw: u64,
    pub prize_pool_raw: u64,
    pub epoch_seconds: u64,
    pub last_draw_timestamp: u64,
    pub asset_metadata: AccountAddress,
    pub player_count: u64,
}

impl GameSnapshot {
    /// Decode the `data` object of the resource.
    pub fn from_resource(data: JsonValue) -> Result<Self, DecodeError> {
        let raw: RawLotteryGame = serde_json::from_value(data)?;
        if raw.epoch == 0 {
            return Err(DecodeError::ZeroEpoch);
        }
        Ok(Self {
            ticket_price_raw: raw.price_ticket,
            prize_pool_raw: raw.prize_pool,
            epoch_seconds: raw.epoch,
            last_draw_timestamp: raw.last_time,
            asset_metadata: raw.asset_metadata.inner,
            player_count: raw.players.len() as u64,
        })
    }

    /// Unix time (seconds) at which the current epoch ends.
    pub fn next_draw_at(&self) -> u64 {
        self.last_draw_timestamp.saturating_add(self.epoch_seconds)
    }
}

#[derive(Deserialize)]
struct RawLotteryGame {
    #[serde(deserialize_with = "u64_from_json")]
    price_ticket: u64,
    #[serde(deserialize_with = "u64_from_json")]
    prize_pool: u64,
    players: Players,
    #[serde(deserialize_with = "u64_from_json")]
    epoch: u64,
    #[serde(deserialize_with = "u64_from_json")]
    last_time: u64,
    asset_metadata: ObjectRef,
}

#[derive(Deserialize)]
struct ObjectRef {
    inner: AccountAddress,
}

// Plain vectors render as arrays; wrapped collections as `{ "data": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Players {
    List(Vec<JsonValue>),
    Wrapped { data: Vec<JsonValue> },
}

impl Players {
    fn len(&self) -> usize {
        match self {
            Players::List(list) => list.len(),
            Players::Wrapped { data } => data.len(),
        }
    }
}

/// Parse a ledger integer, which is rendered as a decimal string for `u64`
/// and wider and as a JSON number for narrower types.
pub fn parse_u64(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::String(s) => s.parse().ok(),
        JsonValue::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn u64_from_json<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = JsonValue::deserialize(deserializer)?;
    parse_u64(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("expected unsigned integer, got {value}")))
}
