//! Standalone BeachBar deployment against an existing YieldBox.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::Address;
use tapioca_ledger::{Ledger, LedgerExt};
use tracing::info;

use crate::artifacts::{ArtifactRegistry, DeploymentSummary, names};
use crate::bindings::IBeachBar;
use crate::config::NetworkConstants;
use crate::contracts::ContractKind;
use crate::error::ProvisionError;
use crate::provision::deploy_contract;

/// Deploys `BeachBar(yield_box, tap)` from the first signer and points
/// its fee recipients at the network's configured addresses.
///
/// Returns the summary to hand to the deployment registry.
pub async fn deploy_beach_bar<L: Ledger + ?Sized>(
    ledger: &L,
    yield_box: Address,
    constants: &NetworkConstants,
) -> Result<DeploymentSummary, ProvisionError> {
    let deployer = ledger
        .signers()
        .await?
        .first()
        .copied()
        .ok_or(ProvisionError::NoSigners)?;

    let mut artifacts = ArtifactRegistry::new();
    let bar = deploy_contract(
        ledger,
        &mut artifacts,
        deployer,
        names::BAR,
        ContractKind::BeachBar,
        vec![
            DynSolValue::Address(yield_box),
            DynSolValue::Address(constants.tap_address),
        ],
    )
    .await?;

    ledger
        .submit(
            deployer,
            bar,
            IBeachBar::setFeeToCall {
                feeTo_: constants.fee_to,
            },
            "set feeTo",
        )
        .await?;
    ledger
        .submit(
            deployer,
            bar,
            IBeachBar::setFeeVeTapCall {
                feeVeTap_: constants.fee_ve_to,
            },
            "set feeVeTap",
        )
        .await?;

    info!(%bar, %yield_box, fee_to = %constants.fee_to, "BeachBar deployed");
    Ok(artifacts.summary())
}
