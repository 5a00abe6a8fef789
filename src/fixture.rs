//! The provisioned fixture and the utilities bound to it.

use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use tapioca_ledger::{Ledger, LedgerExt};
use tracing::info;

use crate::artifacts::{ArtifactError, ArtifactRegistry, names};
use crate::bindings::{
    IBeachBar, IERC20Mock, IMixologist, IMixologistLendingBorrowing, IUniswapV2Factory, IYieldBox,
};
use crate::contracts::ContractKind;
use crate::dispatch::ModuleDispatchEncoder;
use crate::error::ProvisionError;
use crate::liquidation_queue::LiquidationQueueConfig;
use crate::liquidity::PriceRatioCalculator;
use crate::modules::{ModuleId, ModuleRegistry};
use crate::provision::{ProvisionParams, deadline_after, deploy_contract, seed_pool};

/// Coins in the Curve stable pool.
const CURVE_STABLE_COINS: u64 = 2;

/// Whose account a utility acts from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActingAs {
    /// The deployer account.
    #[default]
    Default,
    As(Address),
}

impl ActingAs {
    pub fn resolve(self, deployer: Address) -> Address {
        match self {
            Self::Default => deployer,
            Self::As(account) => account,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tokens {
    pub weth: Address,
    pub usdc: Address,
    pub tap: Address,
}

/// YieldBox ids of the market's asset (WETH) and collateral (USDC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetIds {
    asset: U256,
    collateral: U256,
}

impl AssetIds {
    /// Both ids must be assigned (non-zero) and distinct.
    pub fn new(asset: U256, collateral: U256) -> Result<Self, ProvisionError> {
        if asset.is_zero() || collateral.is_zero() || asset == collateral {
            return Err(ProvisionError::InvalidAssetIds { asset, collateral });
        }

        Ok(Self { asset, collateral })
    }

    pub fn asset(&self) -> U256 {
        self.asset
    }

    pub fn collateral(&self) -> U256 {
        self.collateral
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pools {
    pub factory: Address,
    pub router: Address,
    pub weth_usdc: Address,
    pub weth_tap: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleAddresses {
    pub lending_borrowing: Address,
    pub liquidation: Address,
    pub setter: Address,
}

impl ModuleAddresses {
    pub fn get(&self, module: ModuleId) -> Option<Address> {
        match module {
            ModuleId::Base => None,
            ModuleId::LendingBorrowing => Some(self.lending_borrowing),
            ModuleId::Liquidation => Some(self.liquidation),
            ModuleId::Setter => Some(self.setter),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRecipients {
    pub fee_to: Address,
    pub fee_ve_tap: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveBidder {
    pub pool: Address,
    pub swapper: Address,
    pub bidder: Address,
}

/// Everything one provisioning run produced.
pub struct Fixture<L> {
    pub deployer: Address,
    pub eoa1: Address,
    pub staging: bool,
    pub oracle: Address,
    pub tokens: Tokens,
    pub asset_ids: AssetIds,
    pub uri_builder: Address,
    pub yield_box: Address,
    pub bar: Address,
    pub pools: Pools,
    pub multi_swapper: Address,
    pub medium_risk_mc: Address,
    pub modules: ModuleAddresses,
    pub market: Address,
    pub fees: FeeRecipients,
    pub liquidation_queue: Address,
    pub queue_config: LiquidationQueueConfig,
    pub helper: Address,
    pub usdo_to_weth_bidder: Address,
    pub artifacts: ArtifactRegistry,
    pub utils: FixtureUtils<L>,
}

/// Convenience operations over a provisioned artifact set.
///
/// Deployments made through the utilities are recorded in the utilities'
/// own copy of the registry, see [`FixtureUtils::artifacts`].
pub struct FixtureUtils<L> {
    ledger: Arc<L>,
    encoder: ModuleDispatchEncoder,
    calculator: PriceRatioCalculator,
    params: ProvisionParams,
    deployer: Address,
    weth: Address,
    usdc: Address,
    yield_box: Address,
    bar: Address,
    market: Address,
    factory: Address,
    router: Address,
    artifacts: ArtifactRegistry,
}

impl<L: Ledger> FixtureUtils<L> {
    /// Binds the utilities to the contracts recorded in `artifacts`.
    pub fn bind(
        ledger: Arc<L>,
        artifacts: &ArtifactRegistry,
        modules: ModuleRegistry,
        deployer: Address,
        params: ProvisionParams,
    ) -> Result<Self, ArtifactError> {
        Ok(Self {
            ledger,
            encoder: ModuleDispatchEncoder::new(modules),
            calculator: PriceRatioCalculator::new(),
            params,
            deployer,
            weth: artifacts.address(names::WETH)?,
            usdc: artifacts.address(names::USDC)?,
            yield_box: artifacts.address(names::YIELD_BOX)?,
            bar: artifacts.address(names::BAR)?,
            market: artifacts.address(names::MARKET)?,
            factory: artifacts.address(names::UNI_FACTORY)?,
            router: artifacts.address(names::UNI_ROUTER)?,
            artifacts: artifacts.clone(),
        })
    }

    /// The bound artifact set plus anything deployed through the utilities.
    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.artifacts
    }

    async fn asset_id(&self) -> Result<U256, ProvisionError> {
        Ok(self
            .ledger
            .view(self.deployer, self.market, IMixologist::assetIdCall {})
            .await?)
    }

    async fn collateral_id(&self) -> Result<U256, ProvisionError> {
        Ok(self
            .ledger
            .view(self.deployer, self.market, IMixologist::collateralIdCall {})
            .await?)
    }

    /// Unlimited USDC and WETH allowances for the vault, and vault
    /// approval for the market.
    pub async fn approve_all(&self, acting: ActingAs) -> Result<(), ProvisionError> {
        let who = acting.resolve(self.deployer);

        for token in [self.usdc, self.weth] {
            self.ledger
                .submit(
                    who,
                    token,
                    IERC20Mock::approveCall {
                        spender: self.yield_box,
                        amount: U256::MAX,
                    },
                    "approve yieldBox",
                )
                .await?;
        }

        self.ledger
            .submit(
                who,
                self.yield_box,
                IYieldBox::setApprovalForAllCall {
                    operator: self.market,
                    approved: true,
                },
                "approve market on yieldBox",
            )
            .await?;

        info!(%who, "Approved vault and market");
        Ok(())
    }

    /// Deposits `amount` WETH into the vault and lends the resulting
    /// share to the market. Returns the share lent.
    pub async fn deposit_and_add_asset(
        &self,
        amount: U256,
        acting: ActingAs,
    ) -> Result<U256, ProvisionError> {
        let who = acting.resolve(self.deployer);
        let asset_id = self.asset_id().await?;

        let share = self
            .ledger
            .view(
                who,
                self.yield_box,
                IYieldBox::toShareCall {
                    assetId: asset_id,
                    amount,
                    roundUp: false,
                },
            )
            .await?;

        self.ledger
            .submit(
                who,
                self.yield_box,
                IYieldBox::depositAssetCall {
                    assetId: asset_id,
                    from: who,
                    to: who,
                    amount: U256::ZERO,
                    share,
                },
                "deposit asset",
            )
            .await?;

        self.ledger
            .submit(
                who,
                self.market,
                IMixologist::addAssetCall {
                    from: who,
                    to: who,
                    skim: false,
                    share,
                },
                "add asset",
            )
            .await?;

        info!(%who, %amount, %share, "Lent asset to market");
        Ok(share)
    }

    /// Deposits `amount` USDC and adds the account's whole collateral
    /// balance to the market through the lending module. Returns the
    /// share added.
    pub async fn deposit_and_add_collateral(
        &self,
        amount: U256,
        acting: ActingAs,
    ) -> Result<U256, ProvisionError> {
        let who = acting.resolve(self.deployer);
        let collateral_id = self.collateral_id().await?;

        self.ledger
            .submit(
                who,
                self.yield_box,
                IYieldBox::depositAssetCall {
                    assetId: collateral_id,
                    from: who,
                    to: who,
                    amount,
                    share: U256::ZERO,
                },
                "deposit collateral",
            )
            .await?;

        let share = self
            .ledger
            .view(
                who,
                self.yield_box,
                IYieldBox::balanceOfCall {
                    owner: who,
                    assetId: collateral_id,
                },
            )
            .await?;

        let calldata = self.encoder.encode_module_call(
            ModuleId::LendingBorrowing,
            &IMixologistLendingBorrowing::addCollateralCall {
                from: who,
                to: who,
                skim: false,
                share,
            },
        );
        self.ledger
            .send(who, self.market, calldata, "add collateral")
            .await?;

        info!(%who, %amount, %share, "Added collateral to market");
        Ok(share)
    }

    pub async fn time_travel(&self, seconds: u64) -> Result<(), ProvisionError> {
        self.ledger.advance_time(seconds).await?;
        info!(seconds, "Advanced ledger clock");
        Ok(())
    }

    /// Seeds the market with 1000 wei of WETH lent by the deployer.
    pub async fn init_contracts(&self) -> Result<U256, ProvisionError> {
        let amount = U256::from(1000);
        let asset_id = self.asset_id().await?;
        let deployer = self.deployer;

        self.ledger
            .submit(deployer, self.weth, IERC20Mock::freeMintCall { amount }, "mint weth")
            .await?;

        let share = self
            .ledger
            .view(
                deployer,
                self.yield_box,
                IYieldBox::toShareCall {
                    assetId: asset_id,
                    amount,
                    roundUp: false,
                },
            )
            .await?;

        self.ledger
            .submit(
                deployer,
                self.weth,
                IERC20Mock::approveCall {
                    spender: self.yield_box,
                    amount,
                },
                "approve yieldBox",
            )
            .await?;

        self.ledger
            .submit(
                deployer,
                self.yield_box,
                IYieldBox::depositAssetCall {
                    assetId: asset_id,
                    from: deployer,
                    to: deployer,
                    amount: U256::ZERO,
                    share,
                },
                "deposit asset",
            )
            .await?;

        self.ledger
            .submit(
                deployer,
                self.yield_box,
                IYieldBox::setApprovalForAllCall {
                    operator: self.market,
                    approved: true,
                },
                "approve market on yieldBox",
            )
            .await?;

        self.ledger
            .submit(
                deployer,
                self.market,
                IMixologist::addAssetCall {
                    from: deployer,
                    to: deployer,
                    skim: false,
                    share,
                },
                "add asset",
            )
            .await?;

        info!(%share, "Market seeded with initial asset");
        Ok(share)
    }

    /// Deploys the USDO stable token and registers it on the controller.
    pub async fn deploy_and_set_usdo(&mut self) -> Result<Address, ProvisionError> {
        let usdo = deploy_contract(
            self.ledger.as_ref(),
            &mut self.artifacts,
            self.deployer,
            names::USDO,
            ContractKind::ERC20Mock,
            vec![DynSolValue::Uint(self.params.token_initial_supply, 256)],
        )
        .await?;

        self.ledger
            .submit(
                self.deployer,
                self.bar,
                IBeachBar::setUsdoTokenCall { usdoToken_: usdo },
                "set usdo token",
            )
            .await?;

        info!(%usdo, "USDO registered on controller");
        Ok(usdo)
    }

    /// Seeds a WETH/USDO pool at the oracle price. Returns the pair.
    ///
    /// Repeated calls add liquidity to the same pair; the pair is recorded
    /// on the first call only.
    pub async fn add_usdo_weth_liquidity(
        &mut self,
        usdo: Address,
    ) -> Result<Address, ProvisionError> {
        let recorded = self.artifacts.address(names::USDO_WETH_PAIR).ok();
        if let Some(recorded) = recorded {
            if self.weth_pair(usdo).await? != recorded {
                return Err(ArtifactError::Duplicate(names::USDO_WETH_PAIR.to_string()).into());
            }
        }

        let plan = self
            .calculator
            .plan_liquidity(self.params.oracle_price, self.params.pool_base_amount)?;
        let deadline = deadline_after(self.ledger.as_ref(), self.params.deadline_margin).await?;

        seed_pool(
            self.ledger.as_ref(),
            self.deployer,
            self.router,
            self.weth,
            usdo,
            &plan,
            deadline,
        )
        .await?;

        let pair = self.weth_pair(usdo).await?;
        if recorded.is_none() {
            self.artifacts
                .record(names::USDO_WETH_PAIR, ContractKind::UniswapV2Pair, pair, vec![])?;
        }

        info!(%pair, quote = %plan.quote_amount, "Seeded WETH/USDO pool");
        Ok(pair)
    }

    async fn weth_pair(&self, token: Address) -> Result<Address, ProvisionError> {
        Ok(self
            .ledger
            .view(
                self.deployer,
                self.factory,
                IUniswapV2Factory::getPairCall {
                    tokenA: self.weth,
                    tokenB: token,
                },
            )
            .await?)
    }

    /// Deploys the Curve pool mock, its swapper and the stable-to-USDO
    /// bidder for the market.
    pub async fn deploy_curve_stable_to_usdo_bidder(
        &mut self,
        usdo: Address,
    ) -> Result<CurveBidder, ProvisionError> {
        let ledger = self.ledger.as_ref();

        let pool = deploy_contract(
            ledger,
            &mut self.artifacts,
            self.deployer,
            names::CURVE_POOL,
            ContractKind::CurvePoolMock,
            vec![DynSolValue::Address(usdo), DynSolValue::Address(self.usdc)],
        )
        .await?;

        let swapper = deploy_contract(
            ledger,
            &mut self.artifacts,
            self.deployer,
            names::CURVE_SWAPPER,
            ContractKind::CurveSwapper,
            vec![DynSolValue::Address(pool), DynSolValue::Address(self.bar)],
        )
        .await?;

        let bidder = deploy_contract(
            ledger,
            &mut self.artifacts,
            self.deployer,
            names::STABLE_TO_USDO_BIDDER,
            ContractKind::CurveStableToUsdoBidder,
            vec![
                DynSolValue::Address(swapper),
                DynSolValue::Address(self.market),
                DynSolValue::Uint(U256::from(CURVE_STABLE_COINS), 256),
            ],
        )
        .await?;

        Ok(CurveBidder {
            pool,
            swapper,
            bidder,
        })
    }
}
