//! Move function and resource identifiers used by the lottery client.

use crate::AccountAddress;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

/// Name of the lottery Move module.
pub const LOTTERY_MODULE: &str = "lottery";

/// Name of the lottery game resource struct.
pub const LOTTERY_RESOURCE: &str = "LotteryGame";

/// Type argument for fungible asset metadata objects.
pub const FUNGIBLE_ASSET_METADATA: &str = "0x1::fungible_asset::Metadata";

/// A fully qualified Move function (`<address>::<module>::<name>`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionId {
    pub address: AccountAddress,
    pub module: String,
    pub name: String,
}

impl FunctionId {
    pub fn new(address: AccountAddress, module: &str, name: &str) -> Self {
        Self {
            address,
            module: module.to_string(),
            name: name.to_string(),
        }
    }

    /// `<module>::lottery::get_game_address`
    pub fn get_game_address(module: AccountAddress) -> Self {
        Self::new(module, LOTTERY_MODULE, "get_game_address")
    }

    /// `<module>::lottery::buy_ticket`
    pub fn buy_ticket(module: AccountAddress) -> Self {
        Self::new(module, LOTTERY_MODULE, "buy_ticket")
    }

    /// `<module>::<token_module>::mint_to`
    pub fn mint_to(module: AccountAddress, token_module: &str) -> Self {
        Self::new(module, token_module, "mint_to")
    }

    /// `0x1::primary_fungible_store::balance`
    pub fn primary_store_balance() -> Self {
        Self::new(AccountAddress::ONE, "primary_fungible_store", "balance")
    }

    /// `0x1::fungible_asset::decimals`
    pub fn asset_decimals() -> Self {
        Self::new(AccountAddress::ONE, "fungible_asset", "decimals")
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}::{}",
            self.address.to_short_string(),
            self.module,
            self.name
        )
    }
}

/// Fully qualified type of the lottery game resource.
pub fn lottery_resource_type(module: AccountAddress) -> String {
    format!(
        "{}::{LOTTERY_MODULE}::{LOTTERY_RESOURCE}",
        module.to_short_string()
    )
}

/// Body of a view call (`POST /view`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewRequest {
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<JsonValue>,
}

impl ViewRequest {
    pub fn new(
        function: &FunctionId,
        type_arguments: Vec<String>,
        arguments: Vec<JsonValue>,
    ) -> Self {
        Self {
            function: function.to_string(),
            type_arguments,
            arguments,
        }
    }

    pub fn get_game_address(module: AccountAddress) -> Self {
        Self::new(
            &FunctionId::get_game_address(module),
            vec![],
            vec![JsonValue::String(module.to_string())],
        )
    }

    pub fn balance(owner: AccountAddress, asset: AccountAddress) -> Self {
        Self::new(
            &FunctionId::primary_store_balance(),
            vec![FUNGIBLE_ASSET_METADATA.to_string()],
            vec![
                JsonValue::String(owner.to_string()),
                JsonValue::String(asset.to_string()),
            ],
        )
    }

    pub fn decimals(asset: AccountAddress) -> Self {
        Self::new(
            &FunctionId::asset_decimals(),
            vec![FUNGIBLE_ASSET_METADATA.to_string()],
            vec![JsonValue::String(asset.to_string())],
        )
    }
}

/// An entry function call, in the ledger's JSON payload shape.
///
/// Integer arguments wider than 32 bits are encoded as decimal strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntryFunction {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: String,
    pub type_arguments: Vec<String>,
    pub arguments: Vec<JsonValue>,
}

impl EntryFunction {
    pub fn new(function: &FunctionId, arguments: Vec<JsonValue>) -> Self {
        Self {
            kind: "entry_function_payload".to_string(),
            function: function.to_string(),
            type_arguments: vec![],
            arguments,
        }
    }

    /// Purchase `quantity` tickets (the sole argument).
    pub fn buy_ticket(module: AccountAddress, quantity: u64) -> Self {
        Self::new(
            &FunctionId::buy_ticket(module),
            vec![JsonValue::String(quantity.to_string())],
        )
    }

    /// Mint `amount` raw units of the payment token to `recipient`.
    pub fn mint_to(
        module: AccountAddress,
        token_module: &str,
        recipient: AccountAddress,
        amount: u64,
    ) -> Self {
        Self::new(
            &FunctionId::mint_to(module, token_module),
            vec![
                JsonValue::String(recipient.to_string()),
                JsonValue::String(amount.to_string()),
            ],
        )
    }
}
