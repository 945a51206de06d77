//! Payload framing, chunking and reassembly.

use crate::identity::PublicKey;
use crate::{BoardError, Result};

use super::script::OutputScript;

/// Fixed chunk size; one fake multisig output is produced per chunk.
pub const CHUNK_SIZE: usize = 128;

/// Fixed subchunk size; one fake key is produced per subchunk.
pub const SUBCHUNK_SIZE: usize = 64;

/// Size of the big-endian length prefix framing the payload.
const LENGTH_PREFIX_LEN: usize = 4;

/// Tag byte for a short (32-byte) fake key, mimicking a compressed key.
const TAG_SHORT: u8 = 0x02;

/// Tag byte for a long (64-byte) fake key, mimicking an uncompressed key.
const TAG_LONG: u8 = 0x04;

/// A payload encoded into cover scripts.
#[derive(Debug, Clone)]
pub struct EncodedMessage {
    /// Total serialized size of all cover scripts, in bytes. The fee
    /// engine consumes this without re-deriving it.
    pub byte_size: usize,
    /// One cover script per 128-byte chunk, in payload order. Never
    /// empty: even an empty payload produces one chunk for its length
    /// prefix.
    pub outputs: Vec<OutputScript>,
}

impl EncodedMessage {
    /// Number of chunk outputs.
    pub fn chunk_count(&self) -> usize {
        self.outputs.len()
    }
}

/// Encode a compressed payload body into cover scripts.
///
/// The body is framed with a 4-byte big-endian length, sliced into
/// 128-byte chunks and 64-byte subchunks, and each subchunk is padded
/// with trailing zeros to 32 or 64 bytes and tagged so it reads as a
/// compressed or uncompressed public key.
pub fn encode(body: &[u8], owner: &PublicKey) -> EncodedMessage {
    let mut framed = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
    framed.extend_from_slice(&(body.len() as u32).to_be_bytes());
    framed.extend_from_slice(body);

    let outputs: Vec<OutputScript> = framed
        .chunks(CHUNK_SIZE)
        .map(|chunk| {
            let keys = chunk.chunks(SUBCHUNK_SIZE).map(fake_key).collect();
            OutputScript::multisig_cover(keys, owner)
        })
        .collect();

    let byte_size = outputs.iter().map(OutputScript::serialized_len).sum();
    EncodedMessage { byte_size, outputs }
}

/// Dress a subchunk up as a public key.
fn fake_key(subchunk: &[u8]) -> Vec<u8> {
    let (tag, padded_len) = if subchunk.len() < 32 {
        (TAG_SHORT, 32)
    } else {
        (TAG_LONG, 64)
    };

    let mut key = Vec::with_capacity(1 + padded_len);
    key.push(tag);
    key.extend_from_slice(subchunk);
    key.resize(1 + padded_len, 0);
    key
}

/// Reassemble a payload body from a transaction's output scripts.
///
/// Outputs that are not message-carrying multisigs addressed to `owner`
/// are ignored. `Ok(None)` means the transaction simply carries no
/// message; `Err(MalformedMessage)` means message-shaped outputs were
/// present but did not reassemble into a complete frame.
pub fn decode<'a, I>(outputs: I, owner: &PublicKey) -> Result<Option<Vec<u8>>>
where
    I: IntoIterator<Item = &'a OutputScript>,
{
    let mut data = Vec::new();
    let mut matched = false;

    for script in outputs {
        if let Some(keys) = script.message_keys(owner) {
            matched = true;
            for key in keys {
                // Strip the tag byte; the padding stays and is cut off
                // by the length prefix below.
                data.extend_from_slice(&key[1..]);
            }
        }
    }

    if !matched {
        return Ok(None);
    }

    if data.len() < LENGTH_PREFIX_LEN {
        return Err(BoardError::MalformedMessage);
    }
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    prefix.copy_from_slice(&data[..LENGTH_PREFIX_LEN]);
    let len = u32::from_be_bytes(prefix) as usize;

    let body = &data[LENGTH_PREFIX_LEN..];
    if body.len() < len {
        return Err(BoardError::MalformedMessage);
    }

    Ok(Some(body[..len].to_vec()))
}
