//! Key-file wallet that signs locally.

use crate::{Client, Error, Result, Wallet};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use lottery_types::{AccountAddress, EntryFunction, TransactionHash};
use serde::Serialize;
use sha3::{Digest, Sha3_256};
use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::debug;

/// Prefix some tools put in front of exported ed25519 private keys.
const KEY_PREFIX: &str = "ed25519-priv-";

/// Authentication scheme byte for a single ed25519 public key.
const ED25519_SCHEME: u8 = 0x00;

#[derive(Clone, Debug, Serialize)]
struct TransactionRequest {
    sender: String,
    sequence_number: String,
    max_gas_amount: String,
    gas_unit_price: String,
    expiration_timestamp_secs: String,
    payload: EntryFunction,
}

#[derive(Serialize)]
struct Ed25519Authenticator {
    #[serde(rename = "type")]
    kind: &'static str,
    public_key: String,
    signature: String,
}

#[derive(Serialize)]
struct SignedTransactionRequest {
    #[serde(flatten)]
    request: TransactionRequest,
    signature: Ed25519Authenticator,
}

/// An account whose ed25519 key is held in memory.
///
/// The signing message is obtained from the node (`encode_submission`), so
/// the wallet never needs to know the ledger's binary transaction format.
pub struct LocalWallet {
    client: Client,
    signing_key: SigningKey,
    address: AccountAddress,
    max_gas_amount: u64,
    expiration: Duration,
}

impl LocalWallet {
    pub fn new(client: Client, signing_key: SigningKey, address: AccountAddress) -> Self {
        Self {
            client,
            signing_key,
            address,
            max_gas_amount: 20_000,
            expiration: Duration::from_secs(60),
        }
    }

    /// Build from a hex private key (`0x` and `ed25519-priv-` prefixes allowed).
    pub fn from_hex(client: Client, key_hex: &str, address: AccountAddress) -> Result<Self> {
        let signing_key = decode_signing_key(key_hex)?;
        Ok(Self::new(client, signing_key, address))
    }

    /// Build from a hex private key, signing as the key's own account.
    pub fn from_hex_derived(client: Client, key_hex: &str) -> Result<Self> {
        let signing_key = decode_signing_key(key_hex)?;
        let address = derive_address(&signing_key.verifying_key());
        Ok(Self::new(client, signing_key, address))
    }

    pub fn with_max_gas_amount(mut self, max_gas_amount: u64) -> Self {
        self.max_gas_amount = max_gas_amount;
        self
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn public_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.signing_key.verifying_key().to_bytes()))
    }

    async fn build_request(&self, payload: EntryFunction) -> Result<TransactionRequest> {
        let sequence_number = self.client.account_sequence_number(self.address).await?;
        let gas_unit_price = self.client.estimate_gas_price().await?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(TransactionRequest {
            sender: self.address.to_string(),
            sequence_number: sequence_number.to_string(),
            max_gas_amount: self.max_gas_amount.to_string(),
            gas_unit_price: gas_unit_price.to_string(),
            expiration_timestamp_secs: now.saturating_add(self.expiration.as_secs()).to_string(),
            payload,
        })
    }
}

impl Wallet for LocalWallet {
    fn address(&self) -> AccountAddress {
        self.address
    }

    async fn sign_and_submit(&self, payload: EntryFunction) -> Result<TransactionHash> {
        let request = self.build_request(payload).await?;
        let message = self.client.encode_submission(&request).await?;
        let signature = self.signing_key.sign(&message);
        debug!(
            sender = %self.address,
            sequence_number = %request.sequence_number,
            function = %request.payload.function,
            "submitting signed transaction"
        );
        let signed = SignedTransactionRequest {
            request,
            signature: Ed25519Authenticator {
                kind: "ed25519_signature",
                public_key: self.public_key_hex(),
                signature: format!("0x{}", hex::encode(signature.to_bytes())),
            },
        };
        self.client.submit_signed(&signed).await
    }
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}

/// Address of the account created for `key`: `sha3_256(public_key || 0x00)`.
pub fn derive_address(key: &VerifyingKey) -> AccountAddress {
    let mut hasher = Sha3_256::new();
    hasher.update(key.as_bytes());
    hasher.update([ED25519_SCHEME]);
    AccountAddress::new(hasher.finalize().into())
}

pub fn decode_signing_key(key_hex: &str) -> Result<SigningKey> {
    let trimmed = key_hex.trim();
    let trimmed = trimmed.strip_prefix(KEY_PREFIX).unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(trimmed).map_err(|_| Error::Signing("invalid private key hex".into()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::Signing("private key must be 32 bytes".into()))?;
    Ok(SigningKey::from_bytes(&bytes))
}
