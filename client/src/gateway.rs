//! Seams between the client core and the ledger.
//!
//! The cache and purchase orchestrator only see these traits, so the REST
//! [Client] and the in-memory mocks are interchangeable.

use crate::{Client, Result};
use lottery_types::{
    AccountAddress, EntryFunction, TransactionHash, TransactionOutcome, ViewRequest,
};
use serde_json::Value as JsonValue;
use std::future::Future;

/// Read access to ledger state plus transaction confirmation.
pub trait Ledger: Send + Sync + 'static {
    /// Execute a view function and return its result values.
    fn view(&self, request: &ViewRequest) -> impl Future<Output = Result<Vec<JsonValue>>> + Send;

    /// Fetch the `data` object of a typed resource at `address`.
    fn account_resource(
        &self,
        address: AccountAddress,
        resource_type: &str,
    ) -> impl Future<Output = Result<JsonValue>> + Send;

    /// Wait for a submitted transaction to commit.
    fn wait_for_transaction(
        &self,
        hash: &TransactionHash,
    ) -> impl Future<Output = Result<TransactionOutcome>> + Send;
}

/// A connected account able to sign and submit transactions.
pub trait Wallet: Send + Sync + 'static {
    fn address(&self) -> AccountAddress;

    fn sign_and_submit(
        &self,
        payload: EntryFunction,
    ) -> impl Future<Output = Result<TransactionHash>> + Send;
}

impl Ledger for Client {
    async fn view(&self, request: &ViewRequest) -> Result<Vec<JsonValue>> {
        Client::view(self, request).await
    }

    async fn account_resource(
        &self,
        address: AccountAddress,
        resource_type: &str,
    ) -> Result<JsonValue> {
        Client::account_resource(self, address, resource_type).await
    }

    async fn wait_for_transaction(&self, hash: &TransactionHash) -> Result<TransactionOutcome> {
        Client::wait_for_transaction(self, hash).await
    }
}
