//! Ledger access for fixture provisioning.
//!
//! This crate defines the boundary between the provisioning harness and
//! the chain it provisions:
//!
//! - [`Ledger`] -- the minimal set of operations the harness needs:
//!   listing signers, deploying compiled contracts, view calls,
//!   confirmed transactions, and the dev-node controls (reset, balance
//!   override, time travel). Every state-changing method resolves only
//!   once the ledger has confirmed the effect.
//!
//! - [`LedgerExt`] -- typed helpers over [`Ledger`] that encode `sol!`
//!   calls and decode their return data.
//!
//! [`rpc::RpcLedger`] implements the trait against a JSON-RPC dev node
//! (anvil or hardhat) using bytecode from [`artifact::ArtifactStore`].

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, Log, TxHash, U256};
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;

pub mod artifact;
pub mod revert;
pub mod rpc;

/// Errors that can occur during ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("transaction error: {0}")]
    Transaction(#[from] alloy::providers::PendingTransactionError),
    #[error("transport error: {0}")]
    Transport(#[from] alloy::transports::RpcError<alloy::transports::TransportErrorKind>),
    #[error("{note} reverted: {reason}")]
    Reverted { note: String, reason: String },
    #[error("transaction {tx_hash} reverted ({note})")]
    RevertedOnChain { tx_hash: TxHash, note: String },
    #[error("deployment of {contract} confirmed without a contract address")]
    MissingContractAddress { contract: String },
    #[error("failed to decode return data: {0}")]
    Decode(#[from] alloy::sol_types::Error),
    #[error(transparent)]
    Artifact(#[from] artifact::ArtifactStoreError),
    #[error("node returned no latest block")]
    MissingLatestBlock,
}

/// A confirmed contract deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployed {
    pub address: Address,
    pub tx_hash: TxHash,
}

/// A confirmed state-changing transaction and the logs it emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub tx_hash: TxHash,
    pub logs: Vec<Log>,
}

impl Confirmation {
    /// Decodes every `E` emitted by `emitter` in this transaction.
    ///
    /// Logs from other contracts, or with a different signature, are
    /// skipped.
    pub fn events<E: SolEvent>(&self, emitter: Address) -> Vec<E> {
        self.logs
            .iter()
            .filter(|log| log.address == emitter)
            .filter_map(|log| E::decode_log_data(&log.data).ok())
            .collect()
    }
}

/// Sequential access to a ledger.
///
/// Implementations must not return from `deploy` or `send` before the
/// effect is confirmed: callers read addresses and state produced by one
/// call in the very next one.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Accounts the ledger will sign for, deployer first.
    async fn signers(&self) -> Result<Vec<Address>, LedgerError>;

    /// Deploys the compiled contract named `contract` with ABI-encoded
    /// constructor arguments.
    async fn deploy(
        &self,
        from: Address,
        contract: &str,
        constructor_args: Bytes,
    ) -> Result<Deployed, LedgerError>;

    /// Executes a read-only call and returns the raw return data.
    async fn call(
        &self,
        from: Address,
        contract: Address,
        calldata: Bytes,
    ) -> Result<Bytes, LedgerError>;

    /// Submits a transaction and waits for its confirmation.
    ///
    /// `note` is a human-readable description used for logging and in
    /// revert errors.
    async fn send(
        &self,
        from: Address,
        contract: Address,
        calldata: Bytes,
        note: &str,
    ) -> Result<Confirmation, LedgerError>;

    /// Restores the ledger to a clean state.
    async fn reset(&self) -> Result<(), LedgerError>;

    /// Overrides the native balance of `account`.
    async fn set_balance(&self, account: Address, amount: U256) -> Result<(), LedgerError>;

    /// Moves the ledger clock forward by `seconds` and mines a block.
    async fn advance_time(&self, seconds: u64) -> Result<(), LedgerError>;

    /// Timestamp of the latest block, in seconds.
    async fn latest_timestamp(&self) -> Result<u64, LedgerError>;
}

#[async_trait]
impl<T: Ledger> Ledger for Arc<T> {
    async fn signers(&self) -> Result<Vec<Address>, LedgerError> {
        (**self).signers().await
    }

    async fn deploy(
        &self,
        from: Address,
        contract: &str,
        constructor_args: Bytes,
    ) -> Result<Deployed, LedgerError> {
        (**self).deploy(from, contract, constructor_args).await
    }

    async fn call(
        &self,
        from: Address,
        contract: Address,
        calldata: Bytes,
    ) -> Result<Bytes, LedgerError> {
        (**self).call(from, contract, calldata).await
    }

    async fn send(
        &self,
        from: Address,
        contract: Address,
        calldata: Bytes,
        note: &str,
    ) -> Result<Confirmation, LedgerError> {
        (**self).send(from, contract, calldata, note).await
    }

    async fn reset(&self) -> Result<(), LedgerError> {
        (**self).reset().await
    }

    async fn set_balance(&self, account: Address, amount: U256) -> Result<(), LedgerError> {
        (**self).set_balance(account, amount).await
    }

    async fn advance_time(&self, seconds: u64) -> Result<(), LedgerError> {
        (**self).advance_time(seconds).await
    }

    async fn latest_timestamp(&self) -> Result<u64, LedgerError> {
        (**self).latest_timestamp().await
    }
}

/// Typed `sol!` call helpers for any [`Ledger`].
#[async_trait]
pub trait LedgerExt: Ledger {
    /// Runs `call` as a view call and decodes its return value.
    async fn view<C>(
        &self,
        from: Address,
        contract: Address,
        call: C,
    ) -> Result<C::Return, LedgerError>
    where
        C: SolCall + Send + 'static,
        C::Return: Send,
    {
        let output = self.call(from, contract, call.abi_encode().into()).await?;
        Ok(C::abi_decode_returns(&output)?)
    }

    /// Submits `call` as a confirmed transaction.
    async fn submit<C>(
        &self,
        from: Address,
        contract: Address,
        call: C,
        note: &str,
    ) -> Result<Confirmation, LedgerError>
    where
        C: SolCall + Send + 'static,
    {
        self.send(from, contract, call.abi_encode().into(), note)
            .await
    }
}

impl<T: Ledger + ?Sized> LedgerExt for T {}

#[cfg(test)]
mod tests {
    use alloy::primitives::{LogData, address};
    use alloy::sol;

    use super::*;

    sol! {
        event Registered(address indexed location);
        event Unrelated(uint256 value);
    }

    fn log_from(emitter: Address, data: LogData) -> Log {
        Log {
            address: emitter,
            data,
        }
    }

    #[test]
    fn events_decodes_matching_emitter_only() {
        let emitter = address!("0x1111111111111111111111111111111111111111");
        let other = address!("0x2222222222222222222222222222222222222222");
        let location = address!("0x3333333333333333333333333333333333333333");

        let confirmation = Confirmation {
            tx_hash: TxHash::ZERO,
            logs: vec![
                log_from(other, Registered { location: other }.encode_log_data()),
                log_from(emitter, Registered { location }.encode_log_data()),
            ],
        };

        let events = confirmation.events::<Registered>(emitter);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].location, location);
    }

    #[test]
    fn events_skips_other_signatures() {
        let emitter = address!("0x1111111111111111111111111111111111111111");

        let confirmation = Confirmation {
            tx_hash: TxHash::ZERO,
            logs: vec![log_from(
                emitter,
                Unrelated {
                    value: U256::from(7),
                }
                .encode_log_data(),
            )],
        };

        assert!(confirmation.events::<Registered>(emitter).is_empty());
    }
}
