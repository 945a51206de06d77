//! Post model for chainbbs.
//!
//! A post is the decoded form of one message-carrying ledger
//! transaction. Everything except `replies` is immutable after
//! decoding; `replies` is populated only by the thread builder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::identity::PublicKey;
use crate::transport::{LedgerTx, TxId};
use crate::{BoardError, Result};

/// Title used when the content yields no usable first line.
pub const UNTITLED: &str = "(untitled)";

/// Attribution of a post to its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    /// The board owner posted this.
    Owner,
    /// A foreign sender, identified by their first input address.
    Address(String),
    /// The transport could not attribute the transaction's inputs.
    Unknown,
}

/// The wire payload carried inside a message, before compression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPayload {
    /// Post body text.
    pub content: String,
    /// Full transaction hash being replied to, in internal hex order.
    #[serde(rename = "replyTo", skip_serializing_if = "Option::is_none", default)]
    pub reply_to: Option<String>,
}

/// A decoded post.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Transaction hash in display hex; uniquely identifies the post.
    pub hash: String,
    /// Post author.
    pub author: Author,
    /// Best-known post time.
    pub timestamp: DateTime<Utc>,
    /// Title derived from the content's first line.
    pub title: String,
    /// Post body text.
    pub content: String,
    /// Display-hex hash of the post this one replies to, if any.
    pub reply_to: Option<String>,
    /// Direct replies, filled in by the thread builder.
    pub replies: Vec<Post>,
}

impl Post {
    /// Decode a post from a scanned ledger transaction.
    ///
    /// `Ok(None)` means the transaction carries no message for this
    /// board. `Err(MalformedMessage)` covers truncated frames, bodies
    /// that fail decompression or parsing, and unusable `replyTo`
    /// hashes; callers skip such transactions.
    pub fn from_ledger_tx(
        tx: &LedgerTx,
        owner: &PublicKey,
        owner_address: &str,
    ) -> Result<Option<Post>> {
        let body = match codec::decode(tx.outputs.iter().map(|o| &o.script), owner)? {
            Some(body) => body,
            None => return Ok(None),
        };

        let json = codec::decompress(&body)?;
        let payload: PostPayload =
            serde_json::from_slice(&json).map_err(|_| BoardError::MalformedMessage)?;
        if payload.content.is_empty() {
            return Err(BoardError::MalformedMessage);
        }

        let reply_to = match payload.reply_to.as_deref() {
            Some(s) => Some(
                TxId::from_internal_hex(s)
                    .ok_or(BoardError::MalformedMessage)?
                    .display_hex(),
            ),
            None => None,
        };

        let author = if tx.spends_owner_funds {
            Author::Owner
        } else {
            match &tx.sender {
                None => Author::Unknown,
                // The surrounding transactions may not all be known yet;
                // an address match still identifies the owner.
                Some(addr) if addr == owner_address => Author::Owner,
                Some(addr) => Author::Address(addr.clone()),
            }
        };

        Ok(Some(Post {
            hash: tx.txid.display_hex(),
            author,
            timestamp: tx.timestamp,
            title: derive_title(&payload.content),
            content: payload.content,
            reply_to,
            replies: Vec::new(),
        }))
    }
}

/// Derive a post title from its content: the first line, with an
/// optional leading `# ` marker stripped.
pub fn derive_title(content: &str) -> String {
    let first = content.lines().next().unwrap_or("");
    let first = first.strip_prefix("# ").unwrap_or(first).trim();
    if first.is_empty() {
        UNTITLED.to_string()
    } else {
        first.to_string()
    }
}
