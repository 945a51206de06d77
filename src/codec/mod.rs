//! Message codec for chainbbs.
//!
//! Posts travel the ledger disguised as bare multisig outputs: the
//! serialized, compressed payload is framed with a length prefix, sliced
//! into chunks, and each chunk is dressed up as a set of fake public keys
//! inside a nominally valid `k-of-(k+1)` multisig script whose final key
//! is the board owner's real key. The scripts pass the transport's
//! standard validity checks and are never redeemed.
//!
//! Everything in this module is a pure function of its inputs; no state
//! is kept between calls.

mod message;
mod script;

pub use message::{decode, encode, EncodedMessage, CHUNK_SIZE, SUBCHUNK_SIZE};
pub use script::{OutputScript, ScriptOp};

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::{BoardError, Result};

/// Compress a payload body with zlib at maximum compression.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress a payload body.
///
/// Failure means the message bytes did not survive the trip intact and
/// the transaction is skipped as malformed.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|_| BoardError::MalformedMessage)?;
    Ok(out)
}
