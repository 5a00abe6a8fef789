//! Mock ERC20 tokens and the price oracle.

use std::collections::HashMap;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{SolInterface, SolValue};

use super::{Exec, World, require, revert};
use crate::bindings::IERC20Mock::IERC20MockCalls;
use crate::bindings::IOracleMock::IOracleMockCalls;

#[derive(Debug, Clone, Default)]
pub(super) struct Oracle {
    rate: U256,
}

#[derive(Debug, Clone, Default)]
pub(super) struct Token {
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl Token {
    pub(super) fn with_supply(holder: Address, supply: U256) -> Self {
        let mut token = Self::default();
        token.mint(holder, supply);
        token
    }

    pub(super) fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn mint(&mut self, to: Address, amount: U256) {
        self.total_supply = self.total_supply.saturating_add(amount);
        *self.balances.entry(to).or_default() += amount;
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> Exec<()> {
        let balance = self.balance_of(from);
        require(balance >= amount, "ERC20: transfer amount exceeds balance")?;

        self.balances.insert(from, balance - amount);
        *self.balances.entry(to).or_default() += amount;
        Ok(())
    }

    fn spend_allowance(&mut self, owner: Address, spender: Address, amount: U256) -> Exec<()> {
        let allowance = self
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default();

        if allowance == U256::MAX {
            return Ok(());
        }

        require(allowance >= amount, "ERC20: insufficient allowance")?;
        self.allowances.insert((owner, spender), allowance - amount);
        Ok(())
    }
}

impl World {
    pub(super) fn oracle_call(&mut self, target: Address, data: &[u8]) -> Exec<Bytes> {
        let Ok(call) = IOracleMockCalls::abi_decode(data) else {
            return revert("OracleMock: unknown function");
        };

        match call {
            IOracleMockCalls::set(call) => {
                self.oracle_mut(target)?.rate = call.rate;
                Ok(Bytes::new())
            }
            IOracleMockCalls::rate(_) => Ok(self.oracle(target)?.rate.abi_encode().into()),
        }
    }

    pub(super) fn token_call(
        &mut self,
        sender: Address,
        target: Address,
        data: &[u8],
    ) -> Exec<Bytes> {
        let Ok(call) = IERC20MockCalls::abi_decode(data) else {
            return revert("ERC20Mock: unknown function");
        };

        match call {
            IERC20MockCalls::freeMint(call) => {
                self.token_mut(target)?.mint(sender, call.amount);
                Ok(Bytes::new())
            }
            IERC20MockCalls::approve(call) => {
                self.token_mut(target)?
                    .allowances
                    .insert((sender, call.spender), call.amount);
                Ok(true.abi_encode().into())
            }
            IERC20MockCalls::transfer(call) => {
                self.token_transfer(target, sender, call.to, call.amount)?;
                Ok(true.abi_encode().into())
            }
            IERC20MockCalls::transferFrom(call) => {
                self.token_transfer_from(target, sender, call.from, call.to, call.amount)?;
                Ok(true.abi_encode().into())
            }
            IERC20MockCalls::balanceOf(call) => {
                Ok(self.token(target)?.balance_of(call.account).abi_encode().into())
            }
            IERC20MockCalls::allowance(call) => {
                let allowance = self
                    .token(target)?
                    .allowances
                    .get(&(call.owner, call.spender))
                    .copied()
                    .unwrap_or_default();
                Ok(allowance.abi_encode().into())
            }
            IERC20MockCalls::totalSupply(_) => {
                Ok(self.token(target)?.total_supply.abi_encode().into())
            }
        }
    }

    pub(super) fn token_transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Exec<()> {
        self.token_mut(token)?.move_balance(from, to, amount)
    }

    /// `transferFrom` as issued by `spender`.
    pub(super) fn token_transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Exec<()> {
        let token = self.token_mut(token)?;

        if spender != from {
            token.spend_allowance(from, spender, amount)?;
        }

        token.move_balance(from, to, amount)
    }

    pub(super) fn token_balance(&self, token: Address, account: Address) -> Exec<U256> {
        Ok(self.token(token)?.balance_of(account))
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use alloy::sol_types::SolCall;

    use super::*;
    use crate::bindings::{IERC20Mock, IOracleMock};
    use crate::contracts::ContractKind;

    const ALICE: Address = address!("0x0000000000000000000000000000000000000001");
    const BOB: Address = address!("0x0000000000000000000000000000000000000002");

    fn deploy_token(world: &mut World) -> Address {
        world
            .deploy(ALICE, ContractKind::WETH9Mock, &[])
            .unwrap()
    }

    #[test]
    fn free_mint_credits_sender() {
        let mut world = World::default();
        let token = deploy_token(&mut world);

        world
            .execute(BOB, token, &IERC20Mock::freeMintCall { amount: U256::from(7) }.abi_encode())
            .unwrap();

        assert_eq!(world.token_balance(token, BOB).unwrap(), U256::from(7));
        assert_eq!(world.token(token).unwrap().total_supply, U256::from(7));
    }

    #[test]
    fn transfer_from_requires_allowance() {
        let mut world = World::default();
        let token = deploy_token(&mut world);
        world.token_mut(token).unwrap().mint(ALICE, U256::from(100));

        assert!(world.token_transfer_from(token, BOB, ALICE, BOB, U256::from(10)).is_err());

        world
            .execute(
                ALICE,
                token,
                &IERC20Mock::approveCall {
                    spender: BOB,
                    amount: U256::from(10),
                }
                .abi_encode(),
            )
            .unwrap();
        world
            .token_transfer_from(token, BOB, ALICE, BOB, U256::from(10))
            .unwrap();

        assert_eq!(world.token_balance(token, BOB).unwrap(), U256::from(10));
        assert!(world.token_transfer_from(token, BOB, ALICE, BOB, U256::from(1)).is_err());
    }

    #[test]
    fn max_allowance_is_not_consumed() {
        let mut world = World::default();
        let token = deploy_token(&mut world);
        world.token_mut(token).unwrap().mint(ALICE, U256::from(100));
        world
            .token_mut(token)
            .unwrap()
            .allowances
            .insert((ALICE, BOB), U256::MAX);

        world
            .token_transfer_from(token, BOB, ALICE, BOB, U256::from(60))
            .unwrap();

        assert_eq!(
            world.token(token).unwrap().allowances[&(ALICE, BOB)],
            U256::MAX
        );
    }

    #[test]
    fn oracle_stores_rate() {
        let mut world = World::default();
        let oracle = world.deploy(ALICE, ContractKind::OracleMock, &[]).unwrap();

        world
            .execute(ALICE, oracle, &IOracleMock::setCall { rate: U256::from(42) }.abi_encode())
            .unwrap();
        let rate = world
            .execute(ALICE, oracle, &IOracleMock::rateCall {}.abi_encode())
            .unwrap();

        assert_eq!(U256::abi_decode(&rate).unwrap(), U256::from(42));
    }
}
