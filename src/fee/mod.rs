//! Transaction funding and fee negotiation for chainbbs.
//!
//! Given an encoded message, the engine selects spendable inputs and
//! sizes a minimal sufficient fee, balancing the transaction so that no
//! output ever lands between zero and the dust floor. It mutates no
//! shared state: callers hand it a snapshot of available inputs and get
//! back a complete plan or a structured failure.

mod engine;

pub use engine::plan;

use serde::Deserialize;

use crate::codec::OutputScript;
use crate::identity::PublicKey;
use crate::transport::SpendableInput;

/// Where a below-dust leftover is folded instead of becoming an
/// unrelayable change output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangePolicy {
    /// Fold into the last substantive output: the author payment when
    /// present, otherwise the final message chunk output.
    #[default]
    LastSubstantive,
    /// Always fold into the final message chunk output, even when an
    /// author payment is present.
    LastChunk,
}

/// Economic parameters for planning.
#[derive(Debug, Clone)]
pub struct FeeParams {
    /// Minimum relayable output value.
    pub dust: u64,
    /// Fee per started kilobyte of maximum signed transaction size.
    pub fee_rate: u64,
    /// Below-dust leftover handling.
    pub change_policy: ChangePolicy,
}

/// Destination of a planned output.
#[derive(Debug, Clone)]
pub enum OutputTarget {
    /// A message chunk cover script, emitted verbatim.
    Message(OutputScript),
    /// A standard payment to the holder of a key, materialized into an
    /// address script by the external signer.
    PayTo(PublicKey),
}

/// A planned transaction output.
#[derive(Debug, Clone)]
pub struct PlannedOutput {
    /// Output value.
    pub value: u64,
    /// Output destination.
    pub target: OutputTarget,
}

/// A funded, balanced transaction plan, ready for the external signer.
#[derive(Debug, Clone)]
pub struct FundingPlan {
    /// Inputs to consume, in selection order.
    pub inputs: Vec<SpendableInput>,
    /// Outputs in order: message chunks, then the author payment if any,
    /// then change if any.
    pub outputs: Vec<PlannedOutput>,
    /// Fee implied by the plan.
    pub fee: u64,
    /// Value returned to the poster's own wallet; zero when the leftover
    /// was folded or there was none.
    pub change: u64,
}

impl FundingPlan {
    /// Total value consumed from inputs.
    pub fn total_input(&self) -> u64 {
        self.inputs.iter().map(|i| i.value).sum()
    }

    /// Total value across all outputs.
    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }
}
