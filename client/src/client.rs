//! HTTP client for the ledger REST API.

use crate::backoff::{jittered_backoff, next_backoff};
use crate::{Error, Result};
use lottery_types::{
    game::parse_u64, AccountAddress, TransactionHash, TransactionOutcome, ViewRequest,
};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

/// Retry behavior for HTTP requests.
///
/// Reads are always eligible for retry; requests with side effects are only
/// retried when `retry_non_idempotent` is set.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub retry_non_idempotent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            retry_non_idempotent: false,
        }
    }
}

/// How long to poll for a submitted transaction to commit.
#[derive(Clone, Debug)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Client for a ledger full node (`.../v1/`).
#[derive(Clone)]
pub struct Client {
    pub(crate) base_url: Url,
    pub(crate) http_client: reqwest::Client,
    retry_policy: RetryPolicy,
    confirmation: ConfirmationPolicy,
}

#[derive(Deserialize)]
struct AccountInfo {
    sequence_number: String,
}

#[derive(Deserialize)]
struct GasEstimate {
    gas_estimate: u64,
}

#[derive(Deserialize)]
struct ResourceEnvelope {
    data: JsonValue,
}

#[derive(Deserialize)]
struct PendingTransaction {
    hash: TransactionHash,
}

impl Client {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidScheme(scheme.to_string())),
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            base_url,
            http_client,
            retry_policy: RetryPolicy::default(),
            confirmation: ConfirmationPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_confirmation_policy(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidScheme(self.base_url.scheme().to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_error(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request()
    }

    /// Send a request, retrying transient failures.
    ///
    /// Returns the response for successful and `404` statuses; every other
    /// status becomes [Error::FailedWithBody].
    async fn send_with_retry(
        &self,
        method: Method,
        url: Url,
        body: Option<&JsonValue>,
        idempotent: bool,
    ) -> Result<reqwest::Response> {
        let policy = &self.retry_policy;
        let retries_allowed = idempotent || policy.retry_non_idempotent;
        let max_attempts = if retries_allowed {
            policy.max_attempts.max(1)
        } else {
            1
        };
        let mut backoff = policy.initial_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.http_client.request(method.clone(), url.clone());
            if let Some(body) = body {
                request = request.json(body);
            }
            let last_attempt = attempt >= max_attempts;
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || status == StatusCode::NOT_FOUND {
                        return Ok(response);
                    }
                    if !last_attempt && Self::is_retryable_status(status) {
                        debug!(%method, %url, %status, attempt, "retrying request");
                    } else {
                        let text = response.text().await.unwrap_or_default();
                        return Err(Error::FailedWithBody {
                            status,
                            body: format!("{method} {url}: {text}"),
                        });
                    }
                }
                Err(err) => {
                    if last_attempt || !Self::is_retryable_error(&err) {
                        return Err(err.into());
                    }
                    debug!(%method, %url, attempt, error = %err, "retrying request");
                }
            }
            let delay = jittered_backoff(&mut rand::thread_rng(), backoff);
            sleep(delay).await;
            backoff = next_backoff(backoff, policy.max_backoff);
        }
    }

    pub(crate) async fn get_with_retry(&self, url: Url) -> Result<reqwest::Response> {
        self.send_with_retry(Method::GET, url, None, true).await
    }

    pub(crate) async fn post_json_with_retry(
        &self,
        url: Url,
        body: &JsonValue,
        idempotent: bool,
    ) -> Result<reqwest::Response> {
        self.send_with_retry(Method::POST, url, Some(body), idempotent)
            .await
    }

    /// Execute a view function.
    pub async fn view(&self, request: &ViewRequest) -> Result<Vec<JsonValue>> {
        let url = self.endpoint(&["view"])?;
        let body = serde_json::to_value(request)?;
        let response = self.post_json_with_retry(url, &body, true).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(request.function.clone()));
        }
        Ok(response.json().await?)
    }

    /// Fetch the `data` of a resource stored at `address`.
    pub async fn account_resource(
        &self,
        address: AccountAddress,
        resource_type: &str,
    ) -> Result<JsonValue> {
        let address_hex = address.to_string();
        let url = self.endpoint(&["accounts", address_hex.as_str(), "resource", resource_type])?;
        let response = self.get_with_retry(url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("{resource_type} at {address}")));
        }
        let envelope: ResourceEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    pub async fn account_sequence_number(&self, address: AccountAddress) -> Result<u64> {
        let address_hex = address.to_string();
        let url = self.endpoint(&["accounts", address_hex.as_str()])?;
        let response = self.get_with_retry(url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("account {address}")));
        }
        let info: AccountInfo = response.json().await?;
        info.sequence_number
            .parse()
            .map_err(|_| Error::UnexpectedResponse)
    }

    pub async fn estimate_gas_price(&self) -> Result<u64> {
        let url = self.endpoint(&["estimate_gas_price"])?;
        let response = self.get_with_retry(url).await?;
        if !response.status().is_success() {
            return Err(Error::Failed(response.status()));
        }
        let estimate: GasEstimate = response.json().await?;
        Ok(estimate.gas_estimate)
    }

    /// Ask the node for the bytes to sign for an unsigned transaction request.
    pub async fn encode_submission<T: Serialize>(&self, request: &T) -> Result<Vec<u8>> {
        let url = self.endpoint(&["transactions", "encode_submission"])?;
        let body = serde_json::to_value(request)?;
        let response = self.post_json_with_retry(url, &body, true).await?;
        if !response.status().is_success() {
            return Err(Error::Failed(response.status()));
        }
        let encoded: String = response.json().await?;
        hex::decode(encoded.trim_start_matches("0x")).map_err(|_| Error::UnexpectedResponse)
    }

    /// Submit a signed transaction request.
    pub async fn submit_signed<T: Serialize>(&self, request: &T) -> Result<TransactionHash> {
        let url = self.endpoint(&["transactions"])?;
        let body = serde_json::to_value(request)?;
        let response = self.post_json_with_retry(url, &body, false).await?;
        if !response.status().is_success() {
            return Err(Error::Failed(response.status()));
        }
        let pending: PendingTransaction = response.json().await?;
        Ok(pending.hash)
    }

    /// Look up a transaction. `None` when the node has not seen it yet.
    pub async fn transaction_by_hash(&self, hash: &TransactionHash) -> Result<Option<JsonValue>> {
        let url = self.endpoint(&["transactions", "by_hash", hash.as_str()])?;
        let response = self.get_with_retry(url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.json().await?))
    }

    /// Poll until the transaction commits or the confirmation timeout elapses.
    pub async fn wait_for_transaction(&self, hash: &TransactionHash) -> Result<TransactionOutcome> {
        let poll = self.poll_until_committed(hash);
        match tokio::time::timeout(self.confirmation.timeout, poll).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%hash, timeout = ?self.confirmation.timeout, "confirmation timed out");
                Err(Error::ConfirmationTimeout(hash.clone()))
            }
        }
    }

    async fn poll_until_committed(&self, hash: &TransactionHash) -> Result<TransactionOutcome> {
        loop {
            match self.transaction_by_hash(hash).await? {
                Some(txn) if !is_pending(&txn) => return Ok(committed_outcome(hash, &txn)),
                _ => {
                    debug!(%hash, "transaction pending");
                    sleep(self.confirmation.poll_interval).await;
                }
            }
        }
    }
}

fn is_pending(txn: &JsonValue) -> bool {
    txn.get("type").and_then(JsonValue::as_str) == Some("pending_transaction")
}

fn committed_outcome(hash: &TransactionHash, txn: &JsonValue) -> TransactionOutcome {
    if txn.get("success").and_then(JsonValue::as_bool) == Some(true) {
        return TransactionOutcome::Confirmed(hash.clone());
    }
    let vm_status = txn
        .get("vm_status")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    TransactionOutcome::Failed(abort_reason(vm_status))
}

/// Reduce a VM status to a short reason (`transaction aborted (E_CODE)`).
pub(crate) fn abort_reason(vm_status: &str) -> String {
    if !vm_status.starts_with("Move abort") {
        return "transaction failed on chain".to_string();
    }
    let code = vm_status
        .split(": ")
        .nth(1)
        .map(|code| code.split('(').next().unwrap_or(code).trim())
        .filter(|code| !code.is_empty());
    match code {
        Some(code) => format!("transaction aborted ({code})"),
        None => "transaction aborted".to_string(),
    }
}

/// Read the first element of a view result as an integer.
pub(crate) fn first_u64(result: &[JsonValue]) -> Result<u64> {
    result
        .first()
        .and_then(parse_u64)
        .ok_or(Error::UnexpectedResponse)
}
