//! Time remaining until the next draw.

use crate::GameSnapshot;
use std::{fmt, time::Duration};

/// Display state of the draw countdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Countdown {
    /// Time left in the current epoch.
    Remaining(Duration),
    /// The epoch has elapsed. Only the contract can execute the draw, so
    /// this is purely informational.
    DrawImminent,
}

impl Countdown {
    /// Derive the countdown from a snapshot and the current Unix time.
    pub fn derive(snapshot: &GameSnapshot, now_secs: u64) -> Self {
        match snapshot.next_draw_at().checked_sub(now_secs) {
            Some(remaining) if remaining > 0 => {
                Countdown::Remaining(Duration::from_secs(remaining))
            }
            _ => Countdown::DrawImminent,
        }
    }

    pub fn is_imminent(&self) -> bool {
        matches!(self, Countdown::DrawImminent)
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Countdown::Remaining(remaining) => {
                let secs = remaining.as_secs();
                write!(f, "{}m {:02}s", secs / 60, secs % 60)
            }
            Countdown::DrawImminent => f.write_str("draw imminent"),
        }
    }
}
