//! Discovery record handling for chainbbs.
//!
//! A board binds a human-readable domain to its owner key through a DNS
//! TXT record with the fixed grammar `bt=v1 <base58-public-key>
//! <ISO-8601-timestamp>`. Parsing is deliberately permissive about
//! whitespace around the `=` sign; anything that does not match the
//! grammar, or carries a key of an unrecognized shape, is treated as if
//! no record existed at all.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::identity::PublicKey;

/// Grammar version accepted by this implementation.
const RECORD_VERSION: &str = "v1";

/// A parsed board discovery record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardRecord {
    /// The board owner's public key.
    pub public_key: PublicKey,
    /// Declared creation time of the board; used as the scan epoch.
    pub created_at: DateTime<Utc>,
}

impl BoardRecord {
    /// Create a record for a freshly-owned board.
    pub fn new(public_key: PublicKey, created_at: DateTime<Utc>) -> Self {
        Self {
            public_key,
            created_at,
        }
    }

    /// Parse a TXT record string.
    ///
    /// Returns `None` when the string does not match the `bt=v1` grammar
    /// or the embedded key has an unrecognized shape.
    pub fn parse(record: &str) -> Option<Self> {
        let record = record.trim();

        // Accept `bt=v1`, `bt = v1` and everything in between.
        let rest = record.strip_prefix("bt")?.trim_start();
        let rest = rest.strip_prefix('=')?.trim_start();
        let rest = rest.strip_prefix(RECORD_VERSION)?;

        // The version token must end exactly at a whitespace boundary.
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }

        let mut fields = rest.split_whitespace();
        let key = fields.next()?;
        let timestamp = fields.next()?;
        if fields.next().is_some() {
            return None;
        }

        let public_key = PublicKey::from_base58(key)?;
        let created_at = DateTime::parse_from_rfc3339(timestamp)
            .ok()?
            .with_timezone(&Utc);

        Some(Self {
            public_key,
            created_at,
        })
    }

    /// Format this record into its publishable TXT string.
    pub fn format(&self) -> String {
        format!(
            "bt={} {} {}",
            RECORD_VERSION,
            self.public_key.to_base58(),
            self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

/// Pick the first valid record out of a set of resolved TXT strings.
///
/// A domain may publish unrelated TXT records next to its board record;
/// those simply never parse.
pub fn first_valid(records: &[String]) -> Option<BoardRecord> {
    records.iter().find_map(|r| BoardRecord::parse(r))
}
