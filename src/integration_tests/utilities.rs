use alloy::primitives::{Bytes, U256};
use alloy::sol_types::SolValue;
use tapioca_ledger::{Ledger, LedgerExt};

use super::{collateral_share, provisioned, reserve_of};
use crate::artifacts::{ArtifactError, names};
use crate::bindings::{IBeachBar, IERC20Mock, IMixologist, IUniswapV2Factory, IYieldBox};
use crate::error::ProvisionError;
use crate::fixture::ActingAs;
use crate::liquidity::ether;

#[test_log::test(tokio::test)]
async fn collateral_deposit_credits_the_converted_share() {
    let (ledger, fixture) = provisioned().await;
    let deployer = fixture.deployer;
    let amount = U256::from(500);

    fixture.utils.approve_all(ActingAs::Default).await.unwrap();

    let expected = ledger
        .view(
            deployer,
            fixture.yield_box,
            IYieldBox::toShareCall {
                assetId: fixture.asset_ids.collateral(),
                amount,
                roundUp: false,
            },
        )
        .await
        .unwrap();
    let before = collateral_share(&ledger, fixture.market, deployer).await;

    let added = fixture
        .utils
        .deposit_and_add_collateral(amount, ActingAs::Default)
        .await
        .unwrap();

    let after = collateral_share(&ledger, fixture.market, deployer).await;
    assert_eq!(after - before, expected);
    assert_eq!(added, expected);
}

#[test_log::test(tokio::test)]
async fn init_contracts_lends_the_seed_share() {
    let (ledger, fixture) = provisioned().await;

    let share = fixture.utils.init_contracts().await.unwrap();

    let lent = ledger
        .view(
            fixture.deployer,
            fixture.market,
            IMixologist::balanceOfCall {
                user: fixture.deployer,
            },
        )
        .await
        .unwrap();
    assert!(!share.is_zero());
    assert_eq!(lent, share);
}

#[test_log::test(tokio::test)]
async fn asset_deposit_increases_market_balance() {
    let (ledger, fixture) = provisioned().await;
    let deployer = fixture.deployer;
    let amount = ether(5);

    fixture.utils.approve_all(ActingAs::Default).await.unwrap();
    ledger
        .submit(
            deployer,
            fixture.tokens.weth,
            IERC20Mock::freeMintCall { amount },
            "mint weth",
        )
        .await
        .unwrap();

    let lent_balance = IMixologist::balanceOfCall { user: deployer };
    let before = ledger
        .view(deployer, fixture.market, lent_balance.clone())
        .await
        .unwrap();

    let share = fixture
        .utils
        .deposit_and_add_asset(amount, ActingAs::Default)
        .await
        .unwrap();

    let after = ledger
        .view(deployer, fixture.market, lent_balance)
        .await
        .unwrap();
    assert!(after > before);
    assert_eq!(after - before, share);
}

#[test_log::test(tokio::test)]
async fn usdo_is_registered_and_seeded_against_weth() {
    let (ledger, mut fixture) = provisioned().await;

    let usdo = fixture.utils.deploy_and_set_usdo().await.unwrap();

    let registered = ledger
        .view(fixture.deployer, fixture.bar, IBeachBar::usdoTokenCall {})
        .await
        .unwrap();
    assert_eq!(registered, usdo);

    let pair = fixture.utils.add_usdo_weth_liquidity(usdo).await.unwrap();

    assert_eq!(reserve_of(&ledger, pair, usdo).await, ether(1_000_000_000));
    assert_eq!(
        reserve_of(&ledger, pair, fixture.tokens.weth).await,
        ether(1_000_000)
    );

    let artifacts = fixture.utils.artifacts();
    assert_eq!(artifacts.address(names::USDO).unwrap(), usdo);
    assert_eq!(artifacts.address(names::USDO_WETH_PAIR).unwrap(), pair);
    assert!(fixture.artifacts.address(names::USDO).is_err());
}

#[test_log::test(tokio::test)]
async fn curve_bidder_stack_is_deployed_and_recorded() {
    let (_ledger, mut fixture) = provisioned().await;

    let usdo = fixture.utils.deploy_and_set_usdo().await.unwrap();
    let bidder = fixture
        .utils
        .deploy_curve_stable_to_usdo_bidder(usdo)
        .await
        .unwrap();

    assert_ne!(bidder.pool, bidder.swapper);
    assert_ne!(bidder.swapper, bidder.bidder);
    assert_ne!(bidder.pool, bidder.bidder);

    let artifacts = fixture.utils.artifacts();
    assert_eq!(artifacts.address(names::CURVE_POOL).unwrap(), bidder.pool);
    assert_eq!(artifacts.address(names::CURVE_SWAPPER).unwrap(), bidder.swapper);
    assert_eq!(
        artifacts.address(names::STABLE_TO_USDO_BIDDER).unwrap(),
        bidder.bidder
    );
}

#[test_log::test(tokio::test)]
async fn time_travel_advances_the_clock() {
    let (ledger, fixture) = provisioned().await;
    let before = ledger.timestamp();

    fixture.utils.time_travel(3600).await.unwrap();

    assert_eq!(ledger.timestamp(), before + 3600);
}

#[test_log::test(tokio::test)]
async fn utilities_act_for_another_account() {
    let (ledger, fixture) = provisioned().await;
    let eoa1 = fixture.eoa1;
    let amount = U256::from(10_000);

    ledger
        .submit(
            fixture.deployer,
            fixture.tokens.usdc,
            IERC20Mock::transferCall { to: eoa1, amount },
            "fund eoa1",
        )
        .await
        .unwrap();

    fixture.utils.approve_all(ActingAs::As(eoa1)).await.unwrap();
    fixture
        .utils
        .deposit_and_add_collateral(amount, ActingAs::As(eoa1))
        .await
        .unwrap();

    assert!(collateral_share(&ledger, fixture.market, eoa1).await > U256::ZERO);
    assert_eq!(
        collateral_share(&ledger, fixture.market, fixture.deployer).await,
        U256::ZERO
    );
}

#[test_log::test(tokio::test)]
async fn collateral_deposit_without_approval_reverts() {
    let (_ledger, fixture) = provisioned().await;

    let result = fixture
        .utils
        .deposit_and_add_collateral(U256::from(500), ActingAs::Default)
        .await;

    assert!(result.is_err());
}

#[test_log::test(tokio::test)]
async fn pool_seeding_after_time_travel_uses_the_ledger_clock() {
    let (ledger, mut fixture) = provisioned().await;

    fixture.utils.time_travel(120_000).await.unwrap();
    let usdo = fixture.utils.deploy_and_set_usdo().await.unwrap();
    let pair = fixture.utils.add_usdo_weth_liquidity(usdo).await.unwrap();

    assert_eq!(reserve_of(&ledger, pair, usdo).await, ether(1_000_000_000));
}

#[test_log::test(tokio::test)]
async fn usdo_liquidity_can_be_added_twice() {
    let (ledger, mut fixture) = provisioned().await;
    let usdo = fixture.utils.deploy_and_set_usdo().await.unwrap();

    let first = fixture.utils.add_usdo_weth_liquidity(usdo).await.unwrap();
    let second = fixture.utils.add_usdo_weth_liquidity(usdo).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(reserve_of(&ledger, first, usdo).await, ether(2_000_000_000));

    let recorded = fixture
        .utils
        .artifacts()
        .all()
        .iter()
        .filter(|artifact| artifact.name == names::USDO_WETH_PAIR)
        .count();
    assert_eq!(recorded, 1);
}

#[test_log::test(tokio::test)]
async fn seeding_a_second_usdo_pool_is_rejected_before_touching_the_ledger() {
    let (ledger, mut fixture) = provisioned().await;
    let usdo = fixture.utils.deploy_and_set_usdo().await.unwrap();
    fixture.utils.add_usdo_weth_liquidity(usdo).await.unwrap();

    let other = ledger
        .deploy(
            fixture.deployer,
            "ERC20Mock",
            Bytes::from((ether(1),).abi_encode_params()),
        )
        .await
        .unwrap()
        .address;
    let error = fixture
        .utils
        .add_usdo_weth_liquidity(other)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        ProvisionError::Artifact(ArtifactError::Duplicate(ref name)) if name == names::USDO_WETH_PAIR
    ));
    let pair = ledger
        .view(
            fixture.deployer,
            fixture.pools.factory,
            IUniswapV2Factory::getPairCall {
                tokenA: fixture.tokens.weth,
                tokenB: other,
            },
        )
        .await
        .unwrap();
    assert!(pair.is_zero());
}
