//! Fixture provisioning.
//!
//! [`Provisioner::provision`] brings a ledger from empty to a fully wired
//! lending market: oracle, tokens, vault, controller, pools, swapper,
//! market template and modules, one WETH/USDC market clone, fee
//! recipients, the liquidation queue and the auxiliary bidders. Every
//! step waits for confirmation before the next one starts and the first
//! failure aborts the run.

use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolValue;
use tapioca_ledger::{Ledger, LedgerExt};
use tracing::{debug, info};

use crate::artifacts::{ArtifactRegistry, names};
use crate::bindings::{
    IBeachBar, IERC20Mock, IOracleMock, IUniswapV2Factory, IUniswapV2Router02, IYieldBox,
    MixologistInitData,
};
use crate::contracts::ContractKind;
use crate::dispatch::ModuleDispatchEncoder;
use crate::error::ProvisionError;
use crate::fixture::{
    AssetIds, FeeRecipients, Fixture, FixtureUtils, ModuleAddresses, Pools, Tokens,
};
use crate::liquidation_queue::{LiquidationQueueConfig, apply_liquidation_queue};
use crate::liquidity::{LiquidityPlan, PRICE_UNIT, PriceRatioCalculator, ether};
use crate::modules::ModuleRegistry;

/// YieldBox `TokenType.ERC20`.
const ERC20_TOKEN_TYPE: u8 = 1;

/// Seconds added to the current time for router deadlines.
pub const DEFAULT_DEADLINE_MARGIN: u64 = 60_000;

/// Risk tier a market template is registered under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RiskTier {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskTier {
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }
}

/// Amounts and knobs of a provisioning run.
#[derive(Debug, Clone, bon::Builder)]
pub struct ProvisionParams {
    /// WETH price in USDC, 18 decimals.
    #[builder(default = ether(1000))]
    pub oracle_price: U256,
    /// WETH supplied to each seeded pool.
    #[builder(default = ether(1_000_000))]
    pub pool_base_amount: U256,
    /// Initial supply of every `ERC20Mock`.
    #[builder(default = ether(1_000_000_000))]
    pub token_initial_supply: U256,
    #[builder(default = ether(100_000))]
    pub eoa_funding: U256,
    #[builder(default = DEFAULT_DEADLINE_MARGIN)]
    pub deadline_margin: u64,
    #[builder(default)]
    pub risk_tier: RiskTier,
}

impl Default for ProvisionParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Router deadline `margin` seconds past the ledger's latest block.
pub(crate) async fn deadline_after<L: Ledger + ?Sized>(
    ledger: &L,
    margin: u64,
) -> Result<U256, ProvisionError> {
    let now = ledger.latest_timestamp().await?;
    Ok(U256::from(now.saturating_add(margin)))
}

fn random_address() -> Address {
    PrivateKeySigner::random().address()
}

/// Deploys `kind` from `from` and records it under `name`.
pub(crate) async fn deploy_contract<L: Ledger + ?Sized>(
    ledger: &L,
    artifacts: &mut ArtifactRegistry,
    from: Address,
    name: &str,
    kind: ContractKind,
    args: Vec<DynSolValue>,
) -> Result<Address, ProvisionError> {
    let encoded: Bytes = DynSolValue::Tuple(args.clone()).abi_encode_params().into();

    let deployed = ledger.deploy(from, kind.artifact_name(), encoded).await?;
    artifacts.record(name, kind, deployed.address, args)?;

    info!(artifact = name, contract = %kind, address = %deployed.address, "Deployed");
    Ok(deployed.address)
}

/// Mints both sides of `plan` to `who` and supplies them in full through
/// the router, creating the pair if needed.
pub(crate) async fn seed_pool<L: Ledger + ?Sized>(
    ledger: &L,
    who: Address,
    router: Address,
    base_token: Address,
    quote_token: Address,
    plan: &LiquidityPlan,
    deadline: U256,
) -> Result<(), ProvisionError> {
    for (token, amount) in [
        (base_token, plan.base_amount),
        (quote_token, plan.quote_amount),
    ] {
        ledger
            .submit(who, token, IERC20Mock::freeMintCall { amount }, "mint pool liquidity")
            .await?;
        ledger
            .submit(
                who,
                token,
                IERC20Mock::approveCall {
                    spender: router,
                    amount,
                },
                "approve router",
            )
            .await?;
    }

    ledger
        .submit(
            who,
            router,
            IUniswapV2Router02::addLiquidityCall {
                tokenA: base_token,
                tokenB: quote_token,
                amountADesired: plan.base_amount,
                amountBDesired: plan.quote_amount,
                amountAMin: plan.base_amount,
                amountBMin: plan.quote_amount,
                to: who,
                deadline,
            },
            "add liquidity",
        )
        .await?;

    Ok(())
}

struct Vault {
    uri_builder: Address,
    yield_box: Address,
}

struct Helpers {
    helper: Address,
    usdo_to_weth_bidder: Address,
}

/// Sequences the deployments of one fixture.
pub struct Provisioner<L> {
    ledger: Arc<L>,
    modules: ModuleRegistry,
    encoder: ModuleDispatchEncoder,
    calculator: PriceRatioCalculator,
    params: ProvisionParams,
    artifacts: ArtifactRegistry,
}

impl<L: Ledger> Provisioner<L> {
    pub fn new(ledger: Arc<L>, modules: ModuleRegistry) -> Self {
        Self {
            ledger,
            modules,
            encoder: ModuleDispatchEncoder::new(modules),
            calculator: PriceRatioCalculator::new(),
            params: ProvisionParams::default(),
            artifacts: ArtifactRegistry::new(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: ProvisionParams) -> Self {
        self.params = params;
        self
    }

    /// Contracts recorded by the current (or last) run.
    pub fn artifacts(&self) -> &ArtifactRegistry {
        &self.artifacts
    }

    /// Provisions a fresh fixture.
    ///
    /// With `staging` the ledger is not reset and `eoa1` is left unfunded,
    /// for runs against a shared network.
    pub async fn provision(&mut self, staging: bool) -> Result<Fixture<L>, ProvisionError> {
        self.artifacts.clear();

        if staging {
            info!("Staging run, keeping existing ledger state");
        } else {
            self.ledger.reset().await?;
            info!("Ledger reset");
        }

        let deployer = self.deployer().await?;
        info!(%deployer, staging, "Provisioning fixture");

        let oracle = self.deploy_oracle(deployer).await?;
        let tokens = self.deploy_tokens(deployer).await?;
        let vault = self.deploy_vault(deployer).await?;
        let bar = self.deploy_beach_bar(deployer, vault.yield_box, tokens.tap).await?;

        self.register_assets(deployer, vault.yield_box, &tokens).await?;
        let asset_ids = self.read_asset_ids(deployer, vault.yield_box, &tokens).await?;

        let pools = self.deploy_pools(deployer, &tokens).await?;
        let multi_swapper = self.deploy_multi_swapper(deployer, bar, &pools).await?;
        let medium_risk_mc = self.register_master_contract(deployer, bar).await?;
        let modules = self.deploy_modules(deployer).await?;

        let init = MixologistInitData {
            beachBar: bar,
            asset: tokens.weth,
            assetId: asset_ids.asset(),
            collateral: tokens.usdc,
            collateralId: asset_ids.collateral(),
            oracle,
            collateralSwapPath: vec![tokens.usdc, tokens.weth],
            tapSwapPath: vec![tokens.weth, tokens.tap],
            lendingBorrowingModule: modules.lending_borrowing,
            liquidationModule: modules.liquidation,
            setterModule: modules.setter,
        };
        let market = self
            .register_market(deployer, bar, medium_risk_mc, &init)
            .await?;

        let fees = self.set_fee_recipients(deployer, bar).await?;

        let queue_config = LiquidationQueueConfig::builder()
            .fee_collector(random_address())
            .build()?;
        let liquidation_queue = self
            .deploy_liquidation_queue(deployer, bar, market, &queue_config)
            .await?;

        let eoa1 = self.fund_eoa(staging).await?;
        let helpers = self.deploy_helpers(deployer, multi_swapper, market).await?;

        let utils = FixtureUtils::bind(
            Arc::clone(&self.ledger),
            &self.artifacts,
            self.modules,
            deployer,
            self.params.clone(),
        )?;

        info!(artifacts = self.artifacts.len(), %market, "Fixture provisioned");

        Ok(Fixture {
            deployer,
            eoa1,
            staging,
            oracle,
            tokens,
            asset_ids,
            uri_builder: vault.uri_builder,
            yield_box: vault.yield_box,
            bar,
            pools,
            multi_swapper,
            medium_risk_mc,
            modules,
            market,
            fees,
            liquidation_queue,
            queue_config,
            helper: helpers.helper,
            usdo_to_weth_bidder: helpers.usdo_to_weth_bidder,
            artifacts: self.artifacts.clone(),
            utils,
        })
    }

    async fn deployer(&self) -> Result<Address, ProvisionError> {
        self.ledger
            .signers()
            .await?
            .first()
            .copied()
            .ok_or(ProvisionError::NoSigners)
    }

    async fn deploy(
        &mut self,
        from: Address,
        name: &str,
        kind: ContractKind,
        args: Vec<DynSolValue>,
    ) -> Result<Address, ProvisionError> {
        deploy_contract(self.ledger.as_ref(), &mut self.artifacts, from, name, kind, args).await
    }

    async fn deploy_oracle(&mut self, deployer: Address) -> Result<Address, ProvisionError> {
        let oracle = self
            .deploy(deployer, names::ORACLE, ContractKind::OracleMock, vec![])
            .await?;

        self.ledger
            .submit(
                deployer,
                oracle,
                IOracleMock::setCall {
                    rate: self.params.oracle_price,
                },
                "set oracle price",
            )
            .await?;

        info!(%oracle, price = %self.params.oracle_price, "Oracle priced");
        Ok(oracle)
    }

    async fn deploy_tokens(&mut self, deployer: Address) -> Result<Tokens, ProvisionError> {
        let supply = DynSolValue::Uint(self.params.token_initial_supply, 256);

        let weth = self
            .deploy(deployer, names::WETH, ContractKind::WETH9Mock, vec![])
            .await?;
        let usdc = self
            .deploy(deployer, names::USDC, ContractKind::ERC20Mock, vec![supply.clone()])
            .await?;
        let tap = self
            .deploy(deployer, names::TAP, ContractKind::ERC20Mock, vec![supply])
            .await?;

        Ok(Tokens { weth, usdc, tap })
    }

    async fn deploy_vault(&mut self, deployer: Address) -> Result<Vault, ProvisionError> {
        let uri_builder = self
            .deploy(deployer, names::URI_BUILDER, ContractKind::YieldBoxURIBuilder, vec![])
            .await?;

        let yield_box = self
            .deploy(
                deployer,
                names::YIELD_BOX,
                ContractKind::YieldBox,
                vec![
                    DynSolValue::Address(Address::ZERO),
                    DynSolValue::Address(uri_builder),
                ],
            )
            .await?;

        Ok(Vault {
            uri_builder,
            yield_box,
        })
    }

    async fn deploy_beach_bar(
        &mut self,
        deployer: Address,
        yield_box: Address,
        tap: Address,
    ) -> Result<Address, ProvisionError> {
        self.deploy(
            deployer,
            names::BAR,
            ContractKind::BeachBar,
            vec![DynSolValue::Address(yield_box), DynSolValue::Address(tap)],
        )
        .await
    }

    async fn register_assets(
        &self,
        deployer: Address,
        yield_box: Address,
        tokens: &Tokens,
    ) -> Result<(), ProvisionError> {
        for token in [tokens.weth, tokens.usdc] {
            self.ledger
                .submit(
                    deployer,
                    yield_box,
                    IYieldBox::registerAssetCall {
                        tokenType: ERC20_TOKEN_TYPE,
                        contractAddress: token,
                        strategy: Address::ZERO,
                        tokenId: U256::ZERO,
                    },
                    "register asset",
                )
                .await?;
        }

        Ok(())
    }

    async fn read_asset_ids(
        &self,
        deployer: Address,
        yield_box: Address,
        tokens: &Tokens,
    ) -> Result<AssetIds, ProvisionError> {
        let id_of = |token| IYieldBox::idsCall {
            tokenType: ERC20_TOKEN_TYPE,
            contractAddress: token,
            strategy: Address::ZERO,
            tokenId: U256::ZERO,
        };

        let asset = self.ledger.view(deployer, yield_box, id_of(tokens.weth)).await?;
        let collateral = self.ledger.view(deployer, yield_box, id_of(tokens.usdc)).await?;

        let ids = AssetIds::new(asset, collateral)?;
        info!(asset = %ids.asset(), collateral = %ids.collateral(), "Asset ids assigned");
        Ok(ids)
    }

    async fn deploy_pools(
        &mut self,
        deployer: Address,
        tokens: &Tokens,
    ) -> Result<Pools, ProvisionError> {
        let factory = self
            .deploy(
                deployer,
                names::UNI_FACTORY,
                ContractKind::UniswapV2Factory,
                vec![DynSolValue::Address(random_address())],
            )
            .await?;

        let router = self
            .deploy(
                deployer,
                names::UNI_ROUTER,
                ContractKind::UniswapV2Router02,
                vec![DynSolValue::Address(factory), DynSolValue::Address(Address::ZERO)],
            )
            .await?;

        self.ledger
            .submit(
                deployer,
                factory,
                IUniswapV2Factory::createPairCall {
                    tokenA: tokens.weth,
                    tokenB: tokens.usdc,
                },
                "create WETH/USDC pair",
            )
            .await?;

        let base = self.params.pool_base_amount;
        let weth_usdc_plan = self
            .calculator
            .plan_liquidity(self.params.oracle_price, base)?;
        let weth_tap_plan = self.calculator.plan_liquidity(PRICE_UNIT, base)?;

        let deadline = deadline_after(self.ledger.as_ref(), self.params.deadline_margin).await?;
        let mut pools = Pools {
            factory,
            router,
            weth_usdc: Address::ZERO,
            weth_tap: Address::ZERO,
        };

        pools.weth_usdc = self
            .seed_recorded_pool(
                deployer,
                &pools,
                names::WETH_USDC_PAIR,
                tokens.weth,
                tokens.usdc,
                &weth_usdc_plan,
                deadline,
            )
            .await?;
        pools.weth_tap = self
            .seed_recorded_pool(
                deployer,
                &pools,
                names::WETH_TAP_PAIR,
                tokens.weth,
                tokens.tap,
                &weth_tap_plan,
                deadline,
            )
            .await?;

        Ok(pools)
    }

    #[allow(clippy::too_many_arguments)]
    async fn seed_recorded_pool(
        &mut self,
        deployer: Address,
        pools: &Pools,
        name: &str,
        base: Address,
        quote: Address,
        plan: &LiquidityPlan,
        deadline: U256,
    ) -> Result<Address, ProvisionError> {
        seed_pool(
            self.ledger.as_ref(),
            deployer,
            pools.router,
            base,
            quote,
            plan,
            deadline,
        )
        .await?;

        let pair = self
            .ledger
            .view(
                deployer,
                pools.factory,
                IUniswapV2Factory::getPairCall {
                    tokenA: base,
                    tokenB: quote,
                },
            )
            .await?;
        self.artifacts
            .record(name, ContractKind::UniswapV2Pair, pair, vec![])?;

        info!(
            artifact = name,
            %pair,
            base = %plan.base_amount,
            quote = %plan.quote_amount,
            "Seeded pool"
        );
        Ok(pair)
    }

    async fn deploy_multi_swapper(
        &mut self,
        deployer: Address,
        bar: Address,
        pools: &Pools,
    ) -> Result<Address, ProvisionError> {
        let pair_code_hash = self
            .ledger
            .view(deployer, pools.factory, IUniswapV2Factory::pairCodeHashCall {})
            .await?;
        debug!(%pair_code_hash, "Read pair code hash");

        let swapper = self
            .deploy(
                deployer,
                names::MULTI_SWAPPER,
                ContractKind::MultiSwapper,
                vec![
                    DynSolValue::Address(pools.factory),
                    DynSolValue::Address(bar),
                    DynSolValue::FixedBytes(pair_code_hash, 32),
                ],
            )
            .await?;

        self.ledger
            .submit(
                deployer,
                bar,
                IBeachBar::setSwapperCall {
                    swapper,
                    enable: true,
                },
                "enable swapper",
            )
            .await?;

        Ok(swapper)
    }

    async fn register_master_contract(
        &mut self,
        deployer: Address,
        bar: Address,
    ) -> Result<Address, ProvisionError> {
        let template = self
            .deploy(deployer, names::MEDIUM_RISK_MC, ContractKind::BaseMixologist, vec![])
            .await?;

        self.ledger
            .submit(
                deployer,
                bar,
                IBeachBar::registerMasterContractCall {
                    mc: template,
                    contractType: self.params.risk_tier.as_u8(),
                },
                "register master contract",
            )
            .await?;

        info!(%template, tier = ?self.params.risk_tier, "Market template registered");
        Ok(template)
    }

    async fn deploy_modules(
        &mut self,
        deployer: Address,
    ) -> Result<ModuleAddresses, ProvisionError> {
        let lending_borrowing = self
            .deploy(
                deployer,
                names::LENDING_BORROWING_MODULE,
                ContractKind::MixologistLendingBorrowing,
                vec![],
            )
            .await?;
        let liquidation = self
            .deploy(
                deployer,
                names::LIQUIDATION_MODULE,
                ContractKind::MixologistLiquidation,
                vec![],
            )
            .await?;
        let setter = self
            .deploy(deployer, names::SETTER_MODULE, ContractKind::MixologistSetter, vec![])
            .await?;

        Ok(ModuleAddresses {
            lending_borrowing,
            liquidation,
            setter,
        })
    }

    /// Clones `template` through the controller. The clone address comes
    /// from the controller's `RegisterMixologist` event in the receipt.
    async fn register_market(
        &mut self,
        deployer: Address,
        bar: Address,
        template: Address,
        init: &MixologistInitData,
    ) -> Result<Address, ProvisionError> {
        let payload: Bytes = init.abi_encode_params().into();

        let confirmation = self
            .ledger
            .submit(
                deployer,
                bar,
                IBeachBar::registerMixologistCall {
                    mc: template,
                    data: payload.clone(),
                    useCreate2: true,
                },
                "register mixologist",
            )
            .await?;

        let market = confirmation
            .events::<IBeachBar::RegisterMixologist>(bar)
            .last()
            .map(|event| event.location)
            .filter(|market| !market.is_zero())
            .ok_or(ProvisionError::MissingCloneEvent { bar })?;

        self.artifacts.record(
            names::MARKET,
            ContractKind::BaseMixologist,
            market,
            vec![DynSolValue::Bytes(payload.to_vec())],
        )?;

        info!(%market, %template, "Market registered");
        Ok(market)
    }

    async fn set_fee_recipients(
        &self,
        deployer: Address,
        bar: Address,
    ) -> Result<FeeRecipients, ProvisionError> {
        let fees = FeeRecipients {
            fee_to: random_address(),
            fee_ve_tap: random_address(),
        };

        self.ledger
            .submit(
                deployer,
                bar,
                IBeachBar::setFeeToCall {
                    feeTo_: fees.fee_to,
                },
                "set feeTo",
            )
            .await?;
        self.ledger
            .submit(
                deployer,
                bar,
                IBeachBar::setFeeVeTapCall {
                    feeVeTap_: fees.fee_ve_tap,
                },
                "set feeVeTap",
            )
            .await?;

        info!(fee_to = %fees.fee_to, fee_ve_tap = %fees.fee_ve_tap, "Fee recipients set");
        Ok(fees)
    }

    async fn deploy_liquidation_queue(
        &mut self,
        deployer: Address,
        bar: Address,
        market: Address,
        config: &LiquidationQueueConfig,
    ) -> Result<Address, ProvisionError> {
        let queue = self
            .deploy(
                deployer,
                names::LIQUIDATION_QUEUE,
                ContractKind::LiquidationQueue,
                vec![],
            )
            .await?;

        apply_liquidation_queue(
            self.ledger.as_ref(),
            &self.encoder,
            deployer,
            bar,
            market,
            queue,
            config,
        )
        .await?;

        Ok(queue)
    }

    async fn fund_eoa(&self, staging: bool) -> Result<Address, ProvisionError> {
        let eoa = random_address();

        if !staging {
            self.ledger
                .set_balance(eoa, self.params.eoa_funding)
                .await?;
            info!(%eoa, funding = %self.params.eoa_funding, "Funded extra account");
        }

        Ok(eoa)
    }

    async fn deploy_helpers(
        &mut self,
        deployer: Address,
        multi_swapper: Address,
        market: Address,
    ) -> Result<Helpers, ProvisionError> {
        let helper = self
            .deploy(deployer, names::HELPER, ContractKind::MixologistHelper, vec![])
            .await?;

        let usdo_to_weth_bidder = self
            .deploy(
                deployer,
                names::USDO_TO_WETH_BIDDER,
                ContractKind::UniUsdoToWethBidder,
                vec![
                    DynSolValue::Address(multi_swapper),
                    DynSolValue::Address(market),
                ],
            )
            .await?;

        Ok(Helpers {
            helper,
            usdo_to_weth_bidder,
        })
    }
}
