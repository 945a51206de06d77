//! Output script model.
//!
//! Scripts are kept at the level the codec needs: an ordered list of
//! pushes and opcodes, with a byte-accurate serialized size so the fee
//! engine never has to re-derive what the codec already knows.

use crate::identity::PublicKey;

/// A single script item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    /// A small-integer opcode (`OP_1` through `OP_16`).
    Num(u8),
    /// A data push.
    Push(Vec<u8>),
    /// The `OP_CHECKMULTISIG` opcode.
    CheckMultisig,
}

impl ScriptOp {
    /// Serialized size of this item in bytes.
    ///
    /// Small integers and `OP_CHECKMULTISIG` are single opcodes; a data
    /// push costs one length byte plus the data (all pushes produced
    /// here are well under the 76-byte direct-push limit).
    pub fn serialized_len(&self) -> usize {
        match self {
            ScriptOp::Num(_) => 1,
            ScriptOp::Push(data) => 1 + data.len(),
            ScriptOp::CheckMultisig => 1,
        }
    }
}

/// An output script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputScript {
    ops: Vec<ScriptOp>,
}

impl OutputScript {
    /// Build a fake `1-of-(k+1)` bare multisig script carrying `data_keys`
    /// as its first keys and the owner's real key last.
    ///
    /// The owner key being last makes the script redeemable by the owner
    /// alone, which keeps it shaped like an ordinary multisig while the
    /// data keys are opaque padding as far as the ledger is concerned.
    pub fn multisig_cover(data_keys: Vec<Vec<u8>>, owner: &PublicKey) -> Self {
        let total = data_keys.len() + 1;
        let mut ops = Vec::with_capacity(total + 3);
        ops.push(ScriptOp::Num(1));
        for key in data_keys {
            ops.push(ScriptOp::Push(key));
        }
        ops.push(ScriptOp::Push(owner.as_bytes().to_vec()));
        ops.push(ScriptOp::Num(total as u8));
        ops.push(ScriptOp::CheckMultisig);
        Self { ops }
    }

    /// Script items in order.
    pub fn ops(&self) -> &[ScriptOp] {
        &self.ops
    }

    /// Serialized script size in bytes.
    pub fn serialized_len(&self) -> usize {
        self.ops.iter().map(ScriptOp::serialized_len).sum()
    }

    /// If this script is a message-carrying multisig whose final key is
    /// `owner`, return the data keys in script order.
    ///
    /// Scripts of any other shape, and multisigs addressed to a different
    /// key, return `None`; a transaction may carry unrelated outputs.
    pub fn message_keys(&self, owner: &PublicKey) -> Option<Vec<&[u8]>> {
        if self.ops.len() < 4 {
            return None;
        }
        match self.ops.first() {
            Some(ScriptOp::Num(m)) if *m >= 1 => {}
            _ => return None,
        }
        if self.ops.last() != Some(&ScriptOp::CheckMultisig) {
            return None;
        }

        let keys: Vec<&[u8]> = self.ops[1..self.ops.len() - 2]
            .iter()
            .map(|op| match op {
                ScriptOp::Push(data) => Some(data.as_slice()),
                _ => None,
            })
            .collect::<Option<_>>()?;

        match self.ops[self.ops.len() - 2] {
            ScriptOp::Num(n) if n as usize == keys.len() => {}
            _ => return None,
        }

        match keys.split_last() {
            Some((last, data_keys)) if *last == owner.as_bytes() => Some(data_keys.to_vec()),
            _ => None,
        }
    }
}
