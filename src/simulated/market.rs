//! Mixologist market clones and the liquidation queue.

use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolInterface, SolValue};

use super::{Contract, Exec, World, require, revert};
use crate::bindings::ILiquidationQueue::{self, ILiquidationQueueCalls};
use crate::bindings::IMixologist::IMixologistCalls;
use crate::bindings::IMixologistLendingBorrowing::IMixologistLendingBorrowingCalls;
use crate::bindings::IMixologistSetter::IMixologistSetterCalls;
use crate::bindings::{LiquidationQueueMeta, MixologistInitData};
use crate::dispatch::ModuleDispatchEncoder;
use crate::modules::ModuleId;

#[derive(Debug, Clone)]
struct MarketConfig {
    bar: Address,
    yield_box: Address,
    asset_id: U256,
    collateral_id: U256,
    lending_borrowing: Address,
    liquidation: Address,
    setter: Address,
}

impl MarketConfig {
    fn module(&self, module: ModuleId) -> Option<Address> {
        match module {
            ModuleId::Base => None,
            ModuleId::LendingBorrowing => Some(self.lending_borrowing),
            ModuleId::Liquidation => Some(self.liquidation),
            ModuleId::Setter => Some(self.setter),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct Market {
    config: Option<MarketConfig>,
    user_collateral_share: HashMap<Address, U256>,
    total_collateral_share: U256,
    balances: HashMap<Address, U256>,
    total_fraction: U256,
    total_asset_share: U256,
    liquidation_queue: Address,
}

impl Market {
    fn config(&self) -> Exec<&MarketConfig> {
        match &self.config {
            Some(config) => Ok(config),
            None => revert("Mixologist: not initialized"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct LiquidationQueue {
    meta: Option<LiquidationQueueMeta>,
    mixologist: Address,
}

impl World {
    pub(super) fn market_call(
        &mut self,
        sender: Address,
        target: Address,
        data: &[u8],
    ) -> Exec<Bytes> {
        let Ok(call) = IMixologistCalls::abi_decode(data) else {
            return revert("Mixologist: unknown function");
        };

        match call {
            IMixologistCalls::init(call) => {
                self.market_init(target, &call.data)?;
                Ok(Bytes::new())
            }
            IMixologistCalls::executeModule(call) => {
                let result = self.market_execute_module(sender, target, &call.data)?;
                Ok(result.abi_encode().into())
            }
            IMixologistCalls::addAsset(call) => {
                require(call.from == sender, "Mixologist: not approved")?;
                require(!call.skim, "Mixologist: skim not supported")?;

                let config = self.market(target)?.config()?.clone();
                self.yield_box_transfer(
                    config.yield_box,
                    target,
                    call.from,
                    target,
                    config.asset_id,
                    call.share,
                )?;

                let market = self.market_mut(target)?;
                let fraction = if market.total_asset_share.is_zero() {
                    call.share
                } else {
                    call.share * market.total_fraction / market.total_asset_share
                };
                market.total_asset_share += call.share;
                market.total_fraction += fraction;
                *market.balances.entry(call.to).or_default() += fraction;

                Ok(fraction.abi_encode().into())
            }
            IMixologistCalls::assetId(_) => {
                let market = self.market(target)?;
                let id = market.config.as_ref().map_or(U256::ZERO, |c| c.asset_id);
                Ok(id.abi_encode().into())
            }
            IMixologistCalls::collateralId(_) => {
                let market = self.market(target)?;
                let id = market
                    .config
                    .as_ref()
                    .map_or(U256::ZERO, |c| c.collateral_id);
                Ok(id.abi_encode().into())
            }
            IMixologistCalls::userCollateralShare(call) => {
                let share = self
                    .market(target)?
                    .user_collateral_share
                    .get(&call.user)
                    .copied()
                    .unwrap_or_default();
                Ok(share.abi_encode().into())
            }
            IMixologistCalls::totalCollateralShare(_) => {
                Ok(self.market(target)?.total_collateral_share.abi_encode().into())
            }
            IMixologistCalls::balanceOf(call) => {
                let fraction = self
                    .market(target)?
                    .balances
                    .get(&call.user)
                    .copied()
                    .unwrap_or_default();
                Ok(fraction.abi_encode().into())
            }
            IMixologistCalls::liquidationQueue(_) => {
                Ok(self.market(target)?.liquidation_queue.abi_encode().into())
            }
            IMixologistCalls::beachBar(_) => {
                let market = self.market(target)?;
                let bar = market.config.as_ref().map_or(Address::ZERO, |c| c.bar);
                Ok(bar.abi_encode().into())
            }
        }
    }

    fn market_init(&mut self, market: Address, data: &[u8]) -> Exec<()> {
        require(
            self.market(market)?.config.is_none(),
            "Mixologist: already initialized",
        )?;

        let Ok(init) = MixologistInitData::abi_decode_params(data) else {
            return revert("Mixologist: invalid init data");
        };

        let yield_box = self.beach_bar(init.beachBar)?.yield_box();
        let vault = self.yield_box(yield_box)?;

        require(
            !init.assetId.is_zero() && !init.collateralId.is_zero(),
            "Mixologist: asset id not set",
        )?;
        require(
            init.assetId != init.collateralId,
            "Mixologist: asset and collateral ids collide",
        )?;
        require(
            vault.token_of(init.assetId)? == init.asset,
            "Mixologist: asset id mismatch",
        )?;
        require(
            vault.token_of(init.collateralId)? == init.collateral,
            "Mixologist: collateral id mismatch",
        )?;
        require(
            matches!(self.contracts.get(&init.oracle), Some(Contract::Oracle(_))),
            "Mixologist: oracle not set",
        )?;
        require(
            init.collateralSwapPath.len() >= 2 && init.tapSwapPath.len() >= 2,
            "Mixologist: swap path too short",
        )?;

        for (module, address) in [
            (ModuleId::LendingBorrowing, init.lendingBorrowingModule),
            (ModuleId::Liquidation, init.liquidationModule),
            (ModuleId::Setter, init.setterModule),
        ] {
            let deployed = match self.contracts.get(&address) {
                Some(Contract::Module(deployed)) => Some(*deployed),
                _ => None,
            };
            require(deployed == Some(module), "Mixologist: module mismatch")?;
        }

        self.market_mut(market)?.config = Some(MarketConfig {
            bar: init.beachBar,
            yield_box,
            asset_id: init.assetId,
            collateral_id: init.collateralId,
            lending_borrowing: init.lendingBorrowingModule,
            liquidation: init.liquidationModule,
            setter: init.setterModule,
        });

        Ok(())
    }

    /// Routes a tagged payload to the module in its slot. Modules run in
    /// the market's context, so `sender` is the original caller.
    fn market_execute_module(
        &mut self,
        sender: Address,
        market: Address,
        payload: &[u8],
    ) -> Exec<Bytes> {
        let config = self.market(market)?.config()?.clone();

        let Ok(payload) = ModuleDispatchEncoder::new(self.modules).decode_module_payload(payload)
        else {
            return revert("Mixologist: invalid module payload");
        };

        if config.module(payload.module).is_none() {
            return revert("Mixologist: module not set");
        }

        match payload.module {
            ModuleId::LendingBorrowing => {
                let Ok(call) = IMixologistLendingBorrowingCalls::abi_decode(&payload.inner) else {
                    return revert("MixologistLendingBorrowing: unknown function");
                };

                match call {
                    IMixologistLendingBorrowingCalls::addCollateral(call) => {
                        self.market_add_collateral(
                            sender, market, &config, call.from, call.to, call.skim, call.share,
                        )?;
                    }
                }
            }
            ModuleId::Setter => {
                let Ok(call) = IMixologistSetterCalls::abi_decode(&payload.inner) else {
                    return revert("MixologistSetter: unknown function");
                };

                match call {
                    IMixologistSetterCalls::setLiquidationQueue(call) => {
                        require(sender == config.bar, "Ownable: caller is not the owner")?;

                        let init = ILiquidationQueue::initCall {
                            liquidationQueueMeta: call.liquidationQueueMeta,
                            mixologist: market,
                        }
                        .abi_encode();
                        self.execute(market, call.liquidationQueue, &init)?;

                        self.market_mut(market)?.liquidation_queue = call.liquidationQueue;
                    }
                }
            }
            ModuleId::Liquidation | ModuleId::Base => {
                return revert("Mixologist: module call not supported");
            }
        }

        Ok(Bytes::new())
    }

    #[allow(clippy::too_many_arguments)]
    fn market_add_collateral(
        &mut self,
        sender: Address,
        market: Address,
        config: &MarketConfig,
        from: Address,
        to: Address,
        skim: bool,
        share: U256,
    ) -> Exec<()> {
        let vault = self.yield_box(config.yield_box)?;
        require(vault.is_approved(from, sender), "Mixologist: not approved")?;

        if skim {
            let held = vault.balance_of(market, config.collateral_id);
            let total = self.market(market)?.total_collateral_share;
            require(held >= total + share, "Mixologist: too much")?;
        } else {
            self.yield_box_transfer(
                config.yield_box,
                market,
                from,
                market,
                config.collateral_id,
                share,
            )?;
        }

        let state = self.market_mut(market)?;
        *state.user_collateral_share.entry(to).or_default() += share;
        state.total_collateral_share += share;
        Ok(())
    }

    pub(super) fn liquidation_queue_call(
        &mut self,
        sender: Address,
        target: Address,
        data: &[u8],
    ) -> Exec<Bytes> {
        let Ok(call) = ILiquidationQueueCalls::abi_decode(data) else {
            return revert("LiquidationQueue: unknown function");
        };

        match call {
            ILiquidationQueueCalls::init(call) => {
                require(call.mixologist == sender, "LQ: caller is not the mixologist")?;

                let queue = self.liquidation_queue_mut(target)?;
                require(queue.meta.is_none(), "LQ: Initialized")?;

                queue.meta = Some(call.liquidationQueueMeta);
                queue.mixologist = call.mixologist;
                Ok(Bytes::new())
            }
            ILiquidationQueueCalls::liquidationQueueMeta(_) => {
                let meta = self
                    .liquidation_queue(target)?
                    .meta
                    .clone()
                    .unwrap_or_default();

                Ok((
                    meta.activationTime,
                    meta.minBidAmount,
                    meta.closeToMinBidAmount,
                    meta.defaultBidAmount,
                    meta.feeCollector,
                    meta.bidExecutionSwapper,
                    meta.usdoSwapper,
                )
                    .abi_encode_params()
                    .into())
            }
            ILiquidationQueueCalls::mixologist(_) => {
                Ok(self.liquidation_queue(target)?.mixologist.abi_encode().into())
            }
        }
    }
}
