//! Identity model for chainbbs.
//!
//! A session always carries two identities: `self`, derived from a local
//! passphrase by the transport, and `owner`, the board's canonical
//! identity taken from the published discovery record (or equal to `self`
//! when the board has no record yet). Both are immutable once resolved.

use crate::{BoardError, Result};

/// Length of an uncompressed public key in bytes.
pub const UNCOMPRESSED_KEY_LEN: usize = 65;

/// Length of a compressed public key in bytes.
pub const COMPRESSED_KEY_LEN: usize = 33;

/// A ledger public key, either compressed (33 bytes, leading `0x02` or
/// `0x03`) or uncompressed (65 bytes, leading `0x04`).
///
/// Any other shape is rejected at construction, so holding a `PublicKey`
/// implies the bytes already passed the shape check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Create a public key from raw bytes, validating the shape.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if Self::is_valid_shape(&bytes) {
            Ok(Self(bytes))
        } else {
            Err(BoardError::Validation(format!(
                "not a recognized public key shape ({} bytes)",
                bytes.len()
            )))
        }
    }

    /// Check whether raw bytes have a recognized public key shape.
    pub fn is_valid_shape(bytes: &[u8]) -> bool {
        match bytes.first() {
            Some(0x04) => bytes.len() == UNCOMPRESSED_KEY_LEN,
            Some(0x02) | Some(0x03) => bytes.len() == COMPRESSED_KEY_LEN,
            _ => false,
        }
    }

    /// Decode a public key from a base58 string.
    ///
    /// Returns `None` for strings that do not decode or decode to an
    /// unrecognized shape; the caller treats such records as absent.
    pub fn from_base58(s: &str) -> Option<Self> {
        let bytes = bs58::decode(s).into_vec().ok()?;
        Self::from_bytes(bytes).ok()
    }

    /// Encode this key as a base58 string.
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Serialized key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is a compressed key.
    pub fn is_compressed(&self) -> bool {
        self.0.len() == COMPRESSED_KEY_LEN
    }
}

/// A resolved session identity.
///
/// Produced once during session startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// The identity's public key.
    pub public_key: PublicKey,
    /// Whether this session's `self` key is the board owner's key.
    pub is_owner: bool,
}

impl Identity {
    /// Resolve the pair of session identities from the self key and the
    /// owner key discovered (or defaulted) during record resolution.
    pub fn resolve(self_key: &PublicKey, owner_key: &PublicKey) -> Identity {
        Identity {
            public_key: owner_key.clone(),
            is_owner: self_key == owner_key,
        }
    }
}
