//! Ticket quantity entry.

use std::{fmt, num::NonZeroU64};

/// A requested ticket quantity, always at least one.
///
/// User input is clamped rather than rejected: text without a positive
/// leading integer becomes the minimum, and values past `u64::MAX` saturate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TicketQuantity(NonZeroU64);

impl TicketQuantity {
    pub const MIN: Self = Self(NonZeroU64::MIN);

    /// Clamp an integer into a valid quantity.
    pub fn clamped(value: i128) -> Self {
        match u64::try_from(value).ok().and_then(NonZeroU64::new) {
            Some(n) => Self(n),
            None if value > i128::from(u64::MAX) => Self(NonZeroU64::MAX),
            None => Self::MIN,
        }
    }

    /// Parse user-entered text, clamping invalid entries to the minimum.
    ///
    /// Only the leading integer counts, so `"2.5"` reads as 2 and `"5abc"`
    /// as 5.
    pub fn parse_clamped(input: &str) -> Self {
        let input = input.trim_start();
        let (negative, unsigned) = match input.as_bytes().first() {
            Some(b'-') => (true, &input[1..]),
            Some(b'+') => (false, &input[1..]),
            _ => (false, input),
        };
        let digits = unsigned
            .find(|c: char| !c.is_ascii_digit())
            .map_or(unsigned, |end| &unsigned[..end]);
        if digits.is_empty() || negative {
            return Self::MIN;
        }
        match digits.parse::<u64>() {
            Ok(value) => Self::clamped(i128::from(value)),
            // Only digits remain, so the sole failure is overflow.
            Err(_) => Self(NonZeroU64::MAX),
        }
    }

    pub fn increment(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Decrement, never going below one.
    pub fn decrement(self) -> Self {
        Self::clamped(i128::from(self.get()) - 1)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl Default for TicketQuantity {
    fn default() -> Self {
        Self::MIN
    }
}

impl From<NonZeroU64> for TicketQuantity {
    fn from(value: NonZeroU64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TicketQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
