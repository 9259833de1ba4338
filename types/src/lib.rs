//! Domain values shared by the lottery client: addresses, Move
//! identifiers, game snapshots, and the pure display derivations built on
//! them.

pub mod address;
pub mod amount;
pub mod countdown;
pub mod function;
pub mod game;
pub mod ticket;
pub mod transaction;

pub use address::{AccountAddress, AddressError};
pub use amount::{format_amount, total_cost};
pub use countdown::Countdown;
pub use function::{lottery_resource_type, EntryFunction, FunctionId, ViewRequest};
pub use game::{DecodeError, GameSnapshot};
pub use ticket::TicketQuantity;
pub use transaction::{TransactionHash, TransactionOutcome};
