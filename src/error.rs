//! Provisioning error types.

use alloy::primitives::{Address, U256};
use tapioca_ledger::LedgerError;

use crate::artifacts::ArtifactError;
use crate::dispatch::DispatchError;
use crate::liquidity::RatioError;

/// Liquidation queue parameters that the queue contract would reject.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueConfigError {
    #[error("close-to-min bid {close_to_min} is below the minimum bid {min}")]
    CloseToMinBelowMin { min: U256, close_to_min: U256 },
    #[error("default bid {default} is below the close-to-min bid {close_to_min}")]
    DefaultBelowCloseToMin { close_to_min: U256, default: U256 },
}

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Ratio(#[from] RatioError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("invalid liquidation queue config: {0}")]
    QueueConfig(#[from] QueueConfigError),
    #[error("asset ids must be non-zero and distinct, got asset {asset} and collateral {collateral}")]
    InvalidAssetIds { asset: U256, collateral: U256 },
    #[error("registerMixologist on {bar} emitted no RegisterMixologist event")]
    MissingCloneEvent { bar: Address },
    #[error("batched call {index} to {target} failed: {reason}")]
    BatchCallFailed {
        index: usize,
        target: Address,
        reason: String,
    },
    #[error("ledger reported no signer accounts")]
    NoSigners,
    #[error("market {market} reports liquidation queue {actual}, expected {expected}")]
    QueueNotApplied {
        market: Address,
        expected: Address,
        actual: Address,
    },
}
