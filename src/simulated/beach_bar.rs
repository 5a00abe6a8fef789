//! BeachBar controller.

use std::collections::{HashMap, HashSet};

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::{Revert as RevertData, SolError, SolInterface, SolValue};

use super::{Contract, Exec, Revert, World, require, revert};
use crate::bindings::IBeachBar::{IBeachBarCalls, RegisterMixologist};

const NOT_OWNER: &str = "Ownable: caller is not the owner";

/// Highest value of the controller's risk tier enum (low, medium, high).
const MAX_CONTRACT_TYPE: u8 = 2;

#[derive(Debug, Clone)]
pub(super) struct BeachBar {
    owner: Address,
    yield_box: Address,
    swappers: HashSet<Address>,
    master_contracts: HashMap<Address, u8>,
    mixologists: Vec<Address>,
    fee_to: Address,
    fee_ve_tap: Address,
    usdo: Address,
}

impl BeachBar {
    pub(super) fn new(owner: Address, yield_box: Address) -> Self {
        Self {
            owner,
            yield_box,
            swappers: HashSet::new(),
            master_contracts: HashMap::new(),
            mixologists: Vec::new(),
            fee_to: Address::ZERO,
            fee_ve_tap: Address::ZERO,
            usdo: Address::ZERO,
        }
    }

    pub(super) fn yield_box(&self) -> Address {
        self.yield_box
    }

    fn only_owner(&self, sender: Address) -> Exec<()> {
        require(sender == self.owner, NOT_OWNER)
    }
}

impl World {
    pub(super) fn beach_bar_call(
        &mut self,
        sender: Address,
        target: Address,
        data: &[u8],
    ) -> Exec<Bytes> {
        let Ok(call) = IBeachBarCalls::abi_decode(data) else {
            return revert("BeachBar: unknown function");
        };

        match call {
            IBeachBarCalls::setSwapper(call) => {
                let bar = self.beach_bar_mut(target)?;
                bar.only_owner(sender)?;

                if call.enable {
                    bar.swappers.insert(call.swapper);
                } else {
                    bar.swappers.remove(&call.swapper);
                }
                Ok(Bytes::new())
            }
            IBeachBarCalls::swappers(call) => Ok(self
                .beach_bar(target)?
                .swappers
                .contains(&call.swapper)
                .abi_encode()
                .into()),
            IBeachBarCalls::registerMasterContract(call) => {
                require(
                    matches!(self.contracts.get(&call.mc), Some(Contract::MasterMixologist)),
                    "BeachBar: not a master contract",
                )?;

                let bar = self.beach_bar_mut(target)?;
                bar.only_owner(sender)?;
                require(
                    call.contractType <= MAX_CONTRACT_TYPE,
                    "BeachBar: invalid contract type",
                )?;
                require(
                    !bar.master_contracts.contains_key(&call.mc),
                    "BeachBar: MC already registered",
                )?;

                bar.master_contracts.insert(call.mc, call.contractType);
                Ok(Bytes::new())
            }
            IBeachBarCalls::registerMixologist(call) => {
                let bar = self.beach_bar(target)?;
                bar.only_owner(sender)?;
                require(
                    bar.master_contracts.contains_key(&call.mc),
                    "BeachBar: MC not registered",
                )?;

                let yield_box = bar.yield_box;
                let clone = self.yield_box_deploy(yield_box, call.mc, call.data, call.useCreate2)?;

                self.beach_bar_mut(target)?.mixologists.push(clone);
                self.emit_event(target, &RegisterMixologist { location: clone });
                Ok(Bytes::new())
            }
            IBeachBarCalls::executeMixologistFn(call) => {
                let (success, result) =
                    self.execute_mixologist_fn(sender, target, &call.mc, &call.data)?;
                Ok((success, result).abi_encode_params().into())
            }
            IBeachBarCalls::setFeeTo(call) => {
                let bar = self.beach_bar_mut(target)?;
                bar.only_owner(sender)?;
                bar.fee_to = call.feeTo_;
                Ok(Bytes::new())
            }
            IBeachBarCalls::setFeeVeTap(call) => {
                let bar = self.beach_bar_mut(target)?;
                bar.only_owner(sender)?;
                bar.fee_ve_tap = call.feeVeTap_;
                Ok(Bytes::new())
            }
            IBeachBarCalls::setUsdoToken(call) => {
                let bar = self.beach_bar_mut(target)?;
                bar.only_owner(sender)?;
                bar.usdo = call.usdoToken_;
                Ok(Bytes::new())
            }
            IBeachBarCalls::feeTo(_) => Ok(self.beach_bar(target)?.fee_to.abi_encode().into()),
            IBeachBarCalls::feeVeTap(_) => {
                Ok(self.beach_bar(target)?.fee_ve_tap.abi_encode().into())
            }
            IBeachBarCalls::usdoToken(_) => Ok(self.beach_bar(target)?.usdo.abi_encode().into()),
            IBeachBarCalls::owner(_) => Ok(self.beach_bar(target)?.owner.abi_encode().into()),
        }
    }

    /// Calls each registered market in turn with the controller as
    /// sender. A failing market call is reported in its slot and does
    /// not revert the batch.
    fn execute_mixologist_fn(
        &mut self,
        sender: Address,
        bar: Address,
        markets: &[Address],
        calls: &[Bytes],
    ) -> Exec<(Vec<bool>, Vec<Bytes>)> {
        let controller = self.beach_bar(bar)?;
        controller.only_owner(sender)?;
        require(markets.len() == calls.len(), "BeachBar: length mismatch")?;

        for market in markets {
            require(
                controller.mixologists.contains(market),
                "BeachBar: MX not registered",
            )?;
        }

        let mut success = Vec::with_capacity(calls.len());
        let mut result = Vec::with_capacity(calls.len());

        for (market, call) in markets.iter().zip(calls) {
            match self.try_execute(bar, *market, call) {
                Ok(output) => {
                    success.push(true);
                    result.push(output);
                }
                Err(Revert(reason)) => {
                    success.push(false);
                    result.push(RevertData { reason }.abi_encode().into());
                }
            }
        }

        Ok((success, result))
    }
}
