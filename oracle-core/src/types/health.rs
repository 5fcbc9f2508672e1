use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Chain;

/// What a runner last did. Persisted so a restarted node resumes from
/// `block_height`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerServiceStatus {
    /// Unique runner name, e.g. `sepolia-monitor`
    pub name: String,
    /// Whether the runner is scheduled at all
    pub enabled: bool,
    /// Last block height the runner reached
    pub block_height: u64,
    /// When the last tick finished
    pub last_run_at: DateTime<Utc>,
    /// When the next tick is due
    pub next_run_at: DateTime<Utc>,
}

/// Health of every runner of one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainServiceHealth {
    /// The chain
    pub chain: Chain,
    /// Monitor status, `None` when disabled
    pub message_monitor: Option<RunnerServiceStatus>,
    /// Signer status, `None` when disabled
    pub message_signer: Option<RunnerServiceStatus>,
    /// Relayer status, `None` when disabled
    pub message_relayer: Option<RunnerServiceStatus>,
}
