use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use tapioca_ledger::{Ledger, LedgerExt};

use super::{provisioned, reserve_of};
use crate::artifacts::{ArtifactError, ArtifactRegistry, names};
use crate::bindings::{IBeachBar, ILiquidationQueue, IMixologist, IOracleMock};
use crate::contracts::ContractKind;
use crate::dispatch::ModuleDispatchEncoder;
use crate::error::ProvisionError;
use crate::fixture::FixtureUtils;
use crate::liquidation_queue::{
    LiquidationQueueConfig, apply_liquidation_queue, read_liquidation_queue_meta,
};
use crate::liquidity::ether;
use crate::modules::ModuleRegistry;
use crate::provision::{ProvisionParams, Provisioner};
use crate::simulated::SimulatedLedger;

#[test_log::test(tokio::test)]
async fn weth_usdc_pool_is_seeded_at_oracle_price() {
    let (ledger, fixture) = provisioned().await;

    let usdc_reserve = reserve_of(&ledger, fixture.pools.weth_usdc, fixture.tokens.usdc).await;
    let weth_reserve = reserve_of(&ledger, fixture.pools.weth_usdc, fixture.tokens.weth).await;

    assert_eq!(usdc_reserve, ether(1_000_000_000));
    assert_eq!(weth_reserve, ether(1_000_000));
}

#[test_log::test(tokio::test)]
async fn weth_tap_pool_is_seeded_one_to_one() {
    let (ledger, fixture) = provisioned().await;

    let tap_reserve = reserve_of(&ledger, fixture.pools.weth_tap, fixture.tokens.tap).await;
    let weth_reserve = reserve_of(&ledger, fixture.pools.weth_tap, fixture.tokens.weth).await;

    assert_eq!(tap_reserve, weth_reserve);
    assert_eq!(tap_reserve, ether(1_000_000));
}

#[test_log::test(tokio::test)]
async fn oracle_reports_configured_price() {
    let (ledger, fixture) = provisioned().await;

    let rate = ledger
        .view(fixture.deployer, fixture.oracle, IOracleMock::rateCall {})
        .await
        .unwrap();

    assert_eq!(rate, ether(1000));
}

#[test_log::test(tokio::test)]
async fn market_clone_is_wired_to_registered_assets() {
    let (ledger, fixture) = provisioned().await;
    let deployer = fixture.deployer;

    assert!(!fixture.market.is_zero());
    assert_ne!(fixture.market, fixture.medium_risk_mc);
    assert_ne!(fixture.asset_ids.asset(), fixture.asset_ids.collateral());

    let asset_id = ledger
        .view(deployer, fixture.market, IMixologist::assetIdCall {})
        .await
        .unwrap();
    let collateral_id = ledger
        .view(deployer, fixture.market, IMixologist::collateralIdCall {})
        .await
        .unwrap();
    let bar = ledger
        .view(deployer, fixture.market, IMixologist::beachBarCall {})
        .await
        .unwrap();

    assert_eq!(asset_id, fixture.asset_ids.asset());
    assert_eq!(collateral_id, fixture.asset_ids.collateral());
    assert_eq!(bar, fixture.bar);
}

#[test_log::test(tokio::test)]
async fn controller_holds_swapper_and_fee_recipients() {
    let (ledger, fixture) = provisioned().await;
    let deployer = fixture.deployer;

    let enabled = ledger
        .view(
            deployer,
            fixture.bar,
            IBeachBar::swappersCall {
                swapper: fixture.multi_swapper,
            },
        )
        .await
        .unwrap();
    let fee_to = ledger
        .view(deployer, fixture.bar, IBeachBar::feeToCall {})
        .await
        .unwrap();
    let fee_ve_tap = ledger
        .view(deployer, fixture.bar, IBeachBar::feeVeTapCall {})
        .await
        .unwrap();

    assert!(enabled);
    assert_eq!(fee_to, fixture.fees.fee_to);
    assert_eq!(fee_ve_tap, fixture.fees.fee_ve_tap);
    assert_ne!(fee_to, fee_ve_tap);
}

#[test_log::test(tokio::test)]
async fn liquidation_queue_parameters_read_back_exactly() {
    let (ledger, fixture) = provisioned().await;

    let meta = read_liquidation_queue_meta(
        ledger.as_ref(),
        fixture.deployer,
        fixture.liquidation_queue,
    )
    .await
    .unwrap();

    assert_eq!(meta.activationTime, U256::from(600));
    assert_eq!(meta.minBidAmount, ether(200));
    assert_eq!(meta.closeToMinBidAmount, ether(202));
    assert_eq!(meta.defaultBidAmount, ether(400));
    assert_eq!(meta.feeCollector, fixture.queue_config.fee_collector());
    assert_eq!(meta, fixture.queue_config.to_meta());

    let installed = ledger
        .view(fixture.deployer, fixture.market, IMixologist::liquidationQueueCall {})
        .await
        .unwrap();
    let owner = ledger
        .view(fixture.deployer, fixture.liquidation_queue, ILiquidationQueue::mixologistCall {})
        .await
        .unwrap();

    assert_eq!(installed, fixture.liquidation_queue);
    assert_eq!(owner, fixture.market);
}

#[test_log::test(tokio::test)]
async fn replacement_queue_is_applied_through_the_controller() {
    let (ledger, fixture) = provisioned().await;
    let deployer = fixture.deployer;

    let queue = ledger
        .deploy(deployer, ContractKind::LiquidationQueue.artifact_name(), Bytes::new())
        .await
        .unwrap()
        .address;
    let config = LiquidationQueueConfig::builder()
        .activation_delay(U256::from(1200))
        .min_bid_amount(ether(50))
        .close_to_min_bid_amount(ether(60))
        .default_bid_amount(ether(70))
        .fee_collector(Address::with_last_byte(0xfc))
        .build()
        .unwrap();

    apply_liquidation_queue(
        ledger.as_ref(),
        &ModuleDispatchEncoder::default(),
        deployer,
        fixture.bar,
        fixture.market,
        queue,
        &config,
    )
    .await
    .unwrap();

    let meta = read_liquidation_queue_meta(ledger.as_ref(), deployer, queue)
        .await
        .unwrap();
    assert_eq!(meta, config.to_meta());
}

#[test_log::test(tokio::test)]
async fn reinitializing_a_queue_reports_the_failed_call() {
    let (ledger, fixture) = provisioned().await;

    let error = apply_liquidation_queue(
        ledger.as_ref(),
        &ModuleDispatchEncoder::default(),
        fixture.deployer,
        fixture.bar,
        fixture.market,
        fixture.liquidation_queue,
        &fixture.queue_config,
    )
    .await
    .unwrap_err();

    match error {
        ProvisionError::BatchCallFailed {
            index,
            target,
            reason,
        } => {
            assert_eq!(index, 0);
            assert_eq!(target, fixture.market);
            assert!(reason.contains("LQ: Initialized"), "unexpected reason: {reason}");
        }
        other => panic!("expected a failed batch call, got {other:?}"),
    }
}

#[test_log::test(tokio::test)]
async fn every_deployment_is_recorded_once() {
    let (_ledger, fixture) = provisioned().await;

    let expected = [
        names::ORACLE,
        names::WETH,
        names::USDC,
        names::TAP,
        names::URI_BUILDER,
        names::YIELD_BOX,
        names::BAR,
        names::UNI_FACTORY,
        names::UNI_ROUTER,
        names::WETH_USDC_PAIR,
        names::WETH_TAP_PAIR,
        names::MULTI_SWAPPER,
        names::MEDIUM_RISK_MC,
        names::LENDING_BORROWING_MODULE,
        names::LIQUIDATION_MODULE,
        names::SETTER_MODULE,
        names::MARKET,
        names::LIQUIDATION_QUEUE,
        names::HELPER,
        names::USDO_TO_WETH_BIDDER,
    ];

    let recorded: Vec<_> = fixture
        .artifacts
        .all()
        .iter()
        .map(|artifact| artifact.name.as_str())
        .collect();
    assert_eq!(recorded, expected);

    assert_eq!(fixture.artifacts.address(names::MARKET).unwrap(), fixture.market);
    assert_eq!(
        fixture.artifacts.address(names::LIQUIDATION_MODULE).unwrap(),
        fixture.modules.liquidation
    );
}

#[test_log::test(tokio::test)]
async fn rerun_starts_from_a_clean_registry() {
    let ledger = Arc::new(SimulatedLedger::new());
    let mut provisioner = Provisioner::new(Arc::clone(&ledger), ModuleRegistry::standard());

    let first = provisioner.provision(false).await.unwrap();
    let second = provisioner.provision(false).await.unwrap();

    assert_eq!(first.artifacts.len(), second.artifacts.len());
    assert_eq!(provisioner.artifacts().len(), second.artifacts.len());
}

#[test_log::test(tokio::test)]
async fn extra_account_is_funded_outside_staging() {
    let (ledger, fixture) = provisioned().await;

    assert!(!fixture.staging);
    assert_eq!(ledger.ether_balance(fixture.eoa1), ether(100_000));
}

#[test_log::test(tokio::test)]
async fn staging_keeps_existing_state_and_skips_funding() {
    let ledger = Arc::new(SimulatedLedger::new());
    let deployer = ledger.signers().await.unwrap()[0];
    ledger
        .deploy(deployer, ContractKind::OracleMock.artifact_name(), Bytes::new())
        .await
        .unwrap();

    let fixture = Provisioner::new(Arc::clone(&ledger), ModuleRegistry::standard())
        .provision(true)
        .await
        .unwrap();

    assert!(fixture.staging);
    assert_eq!(ledger.ether_balance(fixture.eoa1), U256::ZERO);
    assert_eq!(ledger.contract_count(), fixture.artifacts.len() + 1);
    assert_ne!(fixture.oracle, deployer.create(0));
}

#[test_log::test(tokio::test)]
async fn custom_params_change_pool_seeding() {
    let ledger = Arc::new(SimulatedLedger::new());
    let params = ProvisionParams::builder()
        .oracle_price(ether(2000))
        .pool_base_amount(ether(10))
        .build();

    let fixture = Provisioner::new(Arc::clone(&ledger), ModuleRegistry::standard())
        .with_params(params)
        .provision(false)
        .await
        .unwrap();

    let usdc_reserve = reserve_of(&ledger, fixture.pools.weth_usdc, fixture.tokens.usdc).await;
    assert_eq!(usdc_reserve, ether(20_000));
}

#[test_log::test(tokio::test)]
async fn utilities_need_a_provisioned_registry() {
    let ledger = Arc::new(SimulatedLedger::new());
    let deployer = ledger.signers().await.unwrap()[0];

    let error = FixtureUtils::bind(
        ledger,
        &ArtifactRegistry::new(),
        ModuleRegistry::standard(),
        deployer,
        ProvisionParams::default(),
    )
    .err()
    .unwrap();

    assert_eq!(error, ArtifactError::NotFound(names::WETH.to_string()));
}
