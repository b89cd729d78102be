use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, All, Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Shared secp256k1 context, built once on first use.
static SECP256K1: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// SHA-256 of `data`.
///
/// Transaction content hashes and block hashes both go through this function,
/// so the two halves of the hash chain always agree on the algorithm.
pub fn sha256_digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 of `data` as a lowercase hexadecimal string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256_digest(data))
}

/// Represents a wallet address (uncompressed secp256k1 public key in hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Address(hex::encode(public_key.serialize_uncompressed()))
    }

    /// Converts the address back to a public key
    pub fn to_public_key(&self) -> Result<PublicKey, CryptoError> {
        let bytes = hex::decode(&self.0).map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        PublicKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = Address(s.to_string());
        address.to_public_key()?;
        Ok(address)
    }
}

/// Represents a detached ECDSA signature (DER encoding in hex)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(hex::encode(signature.serialize_der().to_vec()))
    }

    /// Converts the digital signature to a signature
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = hex::decode(&self.0).map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        Signature::from_der(&bytes).map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

/// A secp256k1 key pair and the address derived from it
#[derive(Debug, Clone)]
pub struct KeyPair {
    secret_key: SecretKey,
    public_key: PublicKey,
    address: Address,
}

impl KeyPair {
    /// Generates a new key pair from the OS random number generator
    pub fn generate() -> Self {
        Self::from_secret_key(SecretKey::new(&mut OsRng))
    }

    fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1, &secret_key);
        let address = Address::from_public_key(&public_key);

        KeyPair {
            secret_key,
            public_key,
            address,
        }
    }

    /// Restores a key pair from a hex-encoded 32-byte secret key
    ///
    /// # Arguments
    ///
    /// * `secret_hex` - The secret key, as produced by [`KeyPair::export_secret_hex`]
    ///
    /// # Returns
    ///
    /// The key pair, or an error if the hex or the scalar is invalid
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret_hex).map_err(|e| CryptoError::DecodingError(e.to_string()))?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        Ok(Self::from_secret_key(secret_key))
    }

    /// Gets the key pair's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the key pair's public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Signs a 32-byte message digest with the private key
    pub fn sign_digest(&self, digest: &[u8; 32]) -> DigitalSignature {
        let message = Message::from_digest(*digest);
        let signature = SECP256K1.sign_ecdsa(&message, &self.secret_key);
        DigitalSignature::from_signature(&signature)
    }

    /// Exports the secret key as hex
    pub fn export_secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }
}

/// Verifies a signature over a message digest against an address
///
/// Returns `Ok(false)` for a well-formed signature that does not match, and
/// an error when the address or signature cannot be decoded at all.
pub fn verify_signature(
    digest: &[u8; 32],
    signature: &DigitalSignature,
    address: &Address,
) -> Result<bool, CryptoError> {
    let public_key = address.to_public_key()?;
    let signature = signature.to_signature()?;
    let message = Message::from_digest(*digest);

    Ok(SECP256K1.verify_ecdsa(&message, &signature, &public_key).is_ok())
}
