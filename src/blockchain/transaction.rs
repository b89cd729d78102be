use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::crypto::{sha256_digest, verify_signature, Address, DigitalSignature, KeyPair};

/// Errors that can occur during transaction operations
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    #[error("You cannot sign transactions for other wallets (signer {signer})")]
    Authorization { signer: Address },

    #[error("No signature found on transaction")]
    MissingSignature,
}

/// Represents a value transfer in the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address; `None` for newly minted value
    pub sender: Option<Address>,

    /// Receiver's address
    pub receiver: Address,

    /// Amount being transferred
    pub amount: f64,

    /// Free-text annotation
    #[serde(default)]
    pub memo: String,

    /// Signature over the content hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transfer
    ///
    /// # Arguments
    ///
    /// * `sender` - The address of the sender
    /// * `receiver` - The address of the receiver
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// A new Transaction instance with an empty memo
    pub fn new(sender: Address, receiver: Address, amount: f64) -> Self {
        Transaction {
            sender: Some(sender),
            receiver,
            amount,
            memo: String::new(),
            signature: None,
        }
    }

    /// Creates a mint transaction (genesis allocation or mining reward)
    pub fn new_mint(receiver: Address, amount: f64) -> Self {
        Transaction {
            sender: None,
            receiver,
            amount,
            memo: String::new(),
            signature: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    /// Checks if the transaction mints new value
    pub fn is_mint(&self) -> bool {
        self.sender.is_none()
    }

    fn content_digest(&self) -> [u8; 32] {
        // Excludes the signature, which is computed over this digest.
        let data = serde_json::json!({
            "sender": self.sender,
            "receiver": self.receiver,
            "amount": self.amount,
            "memo": self.memo,
        });

        sha256_digest(data.to_string().as_bytes())
    }

    /// Hash of the economically meaningful fields (sender, receiver, amount, memo)
    pub fn compute_content_hash(&self) -> String {
        hex::encode(self.content_digest())
    }

    /// Signs the transaction with the sender's key pair
    ///
    /// Signing again replaces the previous signature.
    ///
    /// # Arguments
    ///
    /// * `key_pair` - The key pair whose address must equal `sender`
    ///
    /// # Returns
    ///
    /// `TransactionError::Authorization` if the key pair does not own the sender address
    pub fn sign(&mut self, key_pair: &KeyPair) -> Result<(), TransactionError> {
        if self.sender.as_ref() != Some(key_pair.address()) {
            return Err(TransactionError::Authorization {
                signer: key_pair.address().clone(),
            });
        }

        self.signature = Some(key_pair.sign_digest(&self.content_digest()));

        Ok(())
    }

    /// Checks the transaction's signature
    ///
    /// Mint transactions are valid without a signature. For transfers the
    /// signature must verify against the sender over the current content hash;
    /// an address or signature that cannot be decoded does not verify.
    pub fn is_valid(&self) -> Result<bool, TransactionError> {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => return Ok(true),
        };

        let signature = self
            .signature
            .as_ref()
            .ok_or(TransactionError::MissingSignature)?;

        match verify_signature(&self.content_digest(), signature, sender) {
            Ok(valid) => Ok(valid),
            Err(err) => {
                debug!("Signature of transaction from {} does not decode: {}", sender, err);
                Ok(false)
            }
        }
    }
}
