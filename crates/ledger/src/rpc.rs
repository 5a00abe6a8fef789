//! JSON-RPC ledger backed by an alloy provider.
//!
//! `RpcLedger` submits unsigned transactions and lets the node sign them,
//! so every `from` address must be an account the node controls. On
//! anvil, [`RpcLedger::auto_impersonate`] makes that true for arbitrary
//! addresses. Reset, balance override and time travel use dev-node RPC
//! methods and are unavailable on persistent networks.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::ext::AnvilApi as _;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use crate::artifact::ArtifactStore;
use crate::revert::handle_rpc_error;
use crate::{Confirmation, Deployed, Ledger, LedgerError};

pub struct RpcLedger<P> {
    provider: P,
    artifacts: ArtifactStore,
    required_confirmations: u64,
}

impl<P> RpcLedger<P> {
    /// Creates a new `RpcLedger` with the given provider, artifact index
    /// and confirmation count.
    pub fn new(provider: P, artifacts: ArtifactStore, required_confirmations: u64) -> Self {
        Self {
            provider,
            artifacts,
            required_confirmations,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl RpcLedger<()> {
    /// Connects to the node at `rpc_url` over HTTP.
    pub fn connect_http(
        rpc_url: Url,
        artifacts: ArtifactStore,
        required_confirmations: u64,
    ) -> RpcLedger<impl Provider + Clone + 'static> {
        let provider = ProviderBuilder::new().connect_http(rpc_url);

        RpcLedger::new(provider, artifacts, required_confirmations)
    }
}

impl<P> RpcLedger<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    /// Chain id reported by the node.
    pub async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(self.provider.get_chain_id().await?)
    }

    /// Lets the node sign for any sender (anvil only).
    pub async fn auto_impersonate(&self) -> Result<(), LedgerError> {
        self.provider.anvil_auto_impersonate_account(true).await?;
        Ok(())
    }

    async fn confirm(
        &self,
        tx: TransactionRequest,
        note: &str,
    ) -> Result<TransactionReceipt, LedgerError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|err| handle_rpc_error(err, note))?;

        info!(tx_hash = %pending.tx_hash(), note, "Transaction submitted");

        let receipt = pending
            .with_required_confirmations(self.required_confirmations)
            .get_receipt()
            .await?;

        if !receipt.status() {
            return Err(LedgerError::RevertedOnChain {
                tx_hash: receipt.transaction_hash,
                note: note.to_string(),
            });
        }

        info!(tx_hash = %receipt.transaction_hash, note, "Transaction confirmed");

        Ok(receipt)
    }
}

#[async_trait]
impl<P> Ledger for RpcLedger<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    async fn signers(&self) -> Result<Vec<Address>, LedgerError> {
        Ok(self.provider.get_accounts().await?)
    }

    async fn deploy(
        &self,
        from: Address,
        contract: &str,
        constructor_args: Bytes,
    ) -> Result<Deployed, LedgerError> {
        let mut code = self.artifacts.bytecode(contract)?.to_vec();
        code.extend_from_slice(&constructor_args);

        let tx = TransactionRequest::default()
            .from(from)
            .with_deploy_code(code);

        let note = format!("deploy {contract}");
        let receipt = self.confirm(tx, &note).await?;

        let address =
            receipt
                .contract_address
                .ok_or_else(|| LedgerError::MissingContractAddress {
                    contract: contract.to_string(),
                })?;

        Ok(Deployed {
            address,
            tx_hash: receipt.transaction_hash,
        })
    }

    async fn call(
        &self,
        from: Address,
        contract: Address,
        calldata: Bytes,
    ) -> Result<Bytes, LedgerError> {
        debug!(%contract, "View call");

        let tx = TransactionRequest::default()
            .from(from)
            .to(contract)
            .input(calldata.into());

        self.provider
            .call(tx)
            .await
            .map_err(|err| handle_rpc_error(err, "view call"))
    }

    async fn send(
        &self,
        from: Address,
        contract: Address,
        calldata: Bytes,
        note: &str,
    ) -> Result<Confirmation, LedgerError> {
        info!(%from, %contract, note, "Submitting contract call");

        let tx = TransactionRequest::default()
            .from(from)
            .to(contract)
            .input(calldata.into());

        let receipt = self.confirm(tx, note).await?;

        Ok(Confirmation {
            tx_hash: receipt.transaction_hash,
            logs: receipt
                .inner
                .logs()
                .iter()
                .map(|log| log.inner.clone())
                .collect(),
        })
    }

    async fn reset(&self) -> Result<(), LedgerError> {
        self.provider.anvil_reset(None).await?;
        Ok(())
    }

    async fn set_balance(&self, account: Address, amount: U256) -> Result<(), LedgerError> {
        self.provider.anvil_set_balance(account, amount).await?;
        Ok(())
    }

    async fn advance_time(&self, seconds: u64) -> Result<(), LedgerError> {
        self.provider.anvil_increase_time(seconds).await?;
        self.provider.anvil_mine(Some(1), None).await?;
        Ok(())
    }

    async fn latest_timestamp(&self) -> Result<u64, LedgerError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or(LedgerError::MissingLatestBlock)?;

        Ok(block.header.timestamp)
    }
}
