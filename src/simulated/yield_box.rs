//! YieldBox vault: asset registry, share accounting and clone factory.

use std::collections::{HashMap, HashSet};

use alloy::primitives::{Address, Bytes, U256, keccak256};
use alloy::sol_types::{SolCall, SolInterface, SolValue};

use super::market::Market;
use super::{Contract, Exec, World, require, revert};
use crate::bindings::IMixologist;
use crate::bindings::IYieldBox::{IYieldBoxCalls, LogDeploy};

/// ERC20 token type in YieldBox's `TokenType` enum.
const TOKEN_TYPE_ERC20: u8 = 1;

/// Virtual share offset YieldBox adds to every asset to resist
/// share-price manipulation on empty vaults.
const SHARE_OFFSET: U256 = U256::from_limbs([100_000_000, 0, 0, 0]);

#[derive(Debug, Clone, PartialEq, Eq)]
struct AssetKey {
    token_type: u8,
    contract: Address,
    strategy: Address,
    token_id: U256,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    amount: U256,
    shares: U256,
}

#[derive(Debug, Clone, Default)]
pub(super) struct YieldBox {
    assets: Vec<AssetKey>,
    totals: HashMap<U256, Totals>,
    balances: HashMap<(Address, U256), U256>,
    approvals: HashSet<(Address, Address)>,
    clones: HashMap<Address, Vec<Address>>,
}

fn mul_div(value: U256, numerator: U256, denominator: U256, round_up: bool) -> Exec<U256> {
    let Some(product) = value.checked_mul(numerator) else {
        return revert("YieldBox: overflow");
    };

    let quotient = product / denominator;

    if round_up && quotient * denominator < product {
        Ok(quotient + U256::from(1))
    } else {
        Ok(quotient)
    }
}

impl YieldBox {
    fn id_of(&self, key: &AssetKey) -> U256 {
        self.assets
            .iter()
            .position(|asset| asset == key)
            .map_or(U256::ZERO, |index| U256::from(index + 1))
    }

    fn asset(&self, asset_id: U256) -> Exec<&AssetKey> {
        let index = usize::try_from(asset_id).unwrap_or(usize::MAX);

        match index.checked_sub(1).and_then(|index| self.assets.get(index)) {
            Some(asset) => Ok(asset),
            None => revert("YieldBox: asset not registered"),
        }
    }

    pub(super) fn token_of(&self, asset_id: U256) -> Exec<Address> {
        Ok(self.asset(asset_id)?.contract)
    }

    pub(super) fn balance_of(&self, owner: Address, asset_id: U256) -> U256 {
        self.balances
            .get(&(owner, asset_id))
            .copied()
            .unwrap_or_default()
    }

    pub(super) fn is_approved(&self, owner: Address, operator: Address) -> bool {
        owner == operator || self.approvals.contains(&(owner, operator))
    }

    fn to_share(&self, asset_id: U256, amount: U256, round_up: bool) -> Exec<U256> {
        let totals = self.totals.get(&asset_id).copied().unwrap_or_default();
        mul_div(
            amount,
            totals.shares + SHARE_OFFSET,
            totals.amount + U256::from(1),
            round_up,
        )
    }

    fn to_amount(&self, asset_id: U256, share: U256, round_up: bool) -> Exec<U256> {
        let totals = self.totals.get(&asset_id).copied().unwrap_or_default();
        mul_div(
            share,
            totals.amount + U256::from(1),
            totals.shares + SHARE_OFFSET,
            round_up,
        )
    }

    fn move_shares(&mut self, from: Address, to: Address, asset_id: U256, share: U256) -> Exec<()> {
        let balance = self.balance_of(from, asset_id);
        require(balance >= share, "YieldBox: insufficient balance")?;

        self.balances.insert((from, asset_id), balance - share);
        *self.balances.entry((to, asset_id)).or_default() += share;
        Ok(())
    }
}

impl World {
    pub(super) fn yield_box_call(
        &mut self,
        sender: Address,
        target: Address,
        data: &[u8],
    ) -> Exec<Bytes> {
        let Ok(call) = IYieldBoxCalls::abi_decode(data) else {
            return revert("YieldBox: unknown function");
        };

        match call {
            IYieldBoxCalls::registerAsset(call) => {
                require(
                    call.tokenType == TOKEN_TYPE_ERC20,
                    "YieldBox: only ERC20 assets are supported",
                )?;
                self.token(call.contractAddress)?;

                let key = AssetKey {
                    token_type: call.tokenType,
                    contract: call.contractAddress,
                    strategy: call.strategy,
                    token_id: call.tokenId,
                };
                let yield_box = self.yield_box_mut(target)?;

                let mut asset_id = yield_box.id_of(&key);
                if asset_id.is_zero() {
                    yield_box.assets.push(key);
                    asset_id = U256::from(yield_box.assets.len());
                }

                Ok(asset_id.abi_encode().into())
            }
            IYieldBoxCalls::ids(call) => {
                let key = AssetKey {
                    token_type: call.tokenType,
                    contract: call.contractAddress,
                    strategy: call.strategy,
                    token_id: call.tokenId,
                };
                Ok(self.yield_box(target)?.id_of(&key).abi_encode().into())
            }
            IYieldBoxCalls::toShare(call) => {
                let share = self
                    .yield_box(target)?
                    .to_share(call.assetId, call.amount, call.roundUp)?;
                Ok(share.abi_encode().into())
            }
            IYieldBoxCalls::toAmount(call) => {
                let amount = self
                    .yield_box(target)?
                    .to_amount(call.assetId, call.share, call.roundUp)?;
                Ok(amount.abi_encode().into())
            }
            IYieldBoxCalls::depositAsset(call) => {
                let (amount, share) = self.yield_box_deposit(
                    sender,
                    target,
                    call.assetId,
                    call.from,
                    call.to,
                    call.amount,
                    call.share,
                )?;
                Ok((amount, share).abi_encode_params().into())
            }
            IYieldBoxCalls::balanceOf(call) => Ok(self
                .yield_box(target)?
                .balance_of(call.owner, call.assetId)
                .abi_encode()
                .into()),
            IYieldBoxCalls::setApprovalForAll(call) => {
                let yield_box = self.yield_box_mut(target)?;
                if call.approved {
                    yield_box.approvals.insert((sender, call.operator));
                } else {
                    yield_box.approvals.remove(&(sender, call.operator));
                }
                Ok(Bytes::new())
            }
            IYieldBoxCalls::isApprovedForAll(call) => Ok(self
                .yield_box(target)?
                .approvals
                .contains(&(call.owner, call.operator))
                .abi_encode()
                .into()),
            IYieldBoxCalls::transfer(call) => {
                self.yield_box_transfer(
                    target,
                    sender,
                    call.from,
                    call.to,
                    call.assetId,
                    call.share,
                )?;
                Ok(Bytes::new())
            }
            IYieldBoxCalls::deploy(call) => {
                let clone =
                    self.yield_box_deploy(target, call.masterContract, call.data, call.useCreate2)?;
                Ok(clone.abi_encode().into())
            }
            IYieldBoxCalls::clonesOf(call) => {
                let index = usize::try_from(call.index).unwrap_or(usize::MAX);
                let clone = self
                    .yield_box(target)?
                    .clones
                    .get(&call.masterContract)
                    .and_then(|clones| clones.get(index))
                    .copied();

                match clone {
                    Some(clone) => Ok(clone.abi_encode().into()),
                    None => revert("YieldBox: clone index out of bounds"),
                }
            }
            IYieldBoxCalls::clonesOfCount(call) => {
                let count = self
                    .yield_box(target)?
                    .clones
                    .get(&call.masterContract)
                    .map_or(0, Vec::len);
                Ok(U256::from(count).abi_encode().into())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn yield_box_deposit(
        &mut self,
        sender: Address,
        yield_box: Address,
        asset_id: U256,
        from: Address,
        to: Address,
        amount: U256,
        share: U256,
    ) -> Exec<(U256, U256)> {
        let vault = self.yield_box(yield_box)?;
        require(vault.is_approved(from, sender), "YieldBox: Not approved")?;

        let token = vault.token_of(asset_id)?;
        let (amount, share) = if share.is_zero() {
            (amount, vault.to_share(asset_id, amount, false)?)
        } else {
            (vault.to_amount(asset_id, share, true)?, share)
        };
        require(!share.is_zero(), "YieldBox: cannot deposit 0")?;

        self.token_transfer_from(token, yield_box, from, yield_box, amount)?;

        let vault = self.yield_box_mut(yield_box)?;
        let totals = vault.totals.entry(asset_id).or_default();
        totals.amount += amount;
        totals.shares += share;
        *vault.balances.entry((to, asset_id)).or_default() += share;

        Ok((amount, share))
    }

    /// Share transfer issued by `operator`.
    pub(super) fn yield_box_transfer(
        &mut self,
        yield_box: Address,
        operator: Address,
        from: Address,
        to: Address,
        asset_id: U256,
        share: U256,
    ) -> Exec<()> {
        let vault = self.yield_box_mut(yield_box)?;
        require(vault.is_approved(from, operator), "YieldBox: Not approved")?;
        vault.move_shares(from, to, asset_id, share)
    }

    /// Clones `master` and initializes the clone with `data`.
    pub(super) fn yield_box_deploy(
        &mut self,
        yield_box: Address,
        master: Address,
        data: Bytes,
        use_create2: bool,
    ) -> Exec<Address> {
        require(
            matches!(self.contracts.get(&master), Some(Contract::MasterMixologist)),
            "BoringFactory: No masterContract",
        )?;

        let clone = if use_create2 {
            yield_box.create2(keccak256(&data), keccak256(master))
        } else {
            self.next_create_address(yield_box)
        };
        require(
            !self.contracts.contains_key(&clone),
            "BoringFactory: clone already deployed",
        )?;

        self.contracts.insert(clone, Contract::Market(Market::default()));
        self.yield_box_mut(yield_box)?
            .clones
            .entry(master)
            .or_default()
            .push(clone);

        let init = IMixologist::initCall { data: data.clone() }.abi_encode();
        self.execute(yield_box, clone, &init)?;

        self.emit_event(
            yield_box,
            &LogDeploy {
                masterContract: master,
                data,
                cloneAddress: clone,
            },
        );

        Ok(clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_deposit_mints_offset_shares() {
        let vault = YieldBox::default();
        let asset_id = U256::from(1);

        let share = vault.to_share(asset_id, U256::from(500), false).unwrap();

        assert_eq!(share, U256::from(500) * SHARE_OFFSET);
        assert_eq!(vault.to_amount(asset_id, share, false).unwrap(), U256::from(500));
    }

    #[test]
    fn rounding_direction_is_respected() {
        let mut vault = YieldBox::default();
        let asset_id = U256::from(1);
        vault.totals.insert(
            asset_id,
            Totals {
                amount: U256::from(2),
                shares: U256::from(3) * SHARE_OFFSET,
            },
        );

        let down = vault.to_amount(asset_id, U256::from(1), false).unwrap();
        let up = vault.to_amount(asset_id, U256::from(1), true).unwrap();

        assert_eq!(down, U256::ZERO);
        assert_eq!(up, U256::from(1));
    }

    #[test]
    fn unregistered_asset_is_rejected() {
        let vault = YieldBox::default();

        assert!(vault.token_of(U256::ZERO).is_err());
        assert!(vault.token_of(U256::from(1)).is_err());
    }
}
