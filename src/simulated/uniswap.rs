//! UniswapV2 factory, router and constant-product pairs.

use std::collections::HashMap;

use alloy::primitives::{Address, B256, Bytes, U256, keccak256};
use alloy::sol_types::{SolInterface, SolValue};

use super::{Contract, Exec, World, require, revert};
use crate::bindings::IUniswapV2Factory::IUniswapV2FactoryCalls;
use crate::bindings::IUniswapV2Pair::IUniswapV2PairCalls;
use crate::bindings::IUniswapV2Router02::{IUniswapV2Router02Calls, addLiquidityCall};

/// LP tokens burned on the first mint of every pair.
const MINIMUM_LIQUIDITY: U256 = U256::from_limbs([1000, 0, 0, 0]);

fn pair_code_hash() -> B256 {
    keccak256(b"UniswapV2Pair")
}

fn max_reserve() -> U256 {
    (U256::from(1) << 112) - U256::from(1)
}

/// Babylonian square root, rounded down.
fn sqrt(y: U256) -> U256 {
    if y > U256::from(3) {
        let mut z = y;
        let mut x = y / U256::from(2) + U256::from(1);
        while x < z {
            z = x;
            x = (y / x + x) / U256::from(2);
        }
        z
    } else if y.is_zero() {
        U256::ZERO
    } else {
        U256::from(1)
    }
}

#[derive(Debug, Clone, Default)]
pub(super) struct Factory {
    pairs: HashMap<(Address, Address), Address>,
}

impl Factory {
    fn get_pair(&self, token_a: Address, token_b: Address) -> Address {
        self.pairs
            .get(&(token_a, token_b))
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Router {
    pub(super) factory: Address,
}

#[derive(Debug, Clone)]
pub(super) struct Pair {
    token0: Address,
    token1: Address,
    reserve0: U256,
    reserve1: U256,
    block_timestamp_last: u32,
    total_supply: U256,
    balances: HashMap<Address, U256>,
}

impl Pair {
    fn new(token0: Address, token1: Address) -> Self {
        Self {
            token0,
            token1,
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            block_timestamp_last: 0,
            total_supply: U256::ZERO,
            balances: HashMap::new(),
        }
    }

    fn reserves_for(&self, token_a: Address) -> (U256, U256) {
        if token_a == self.token0 {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        }
    }

    fn mint_lp(&mut self, to: Address, amount: U256) {
        self.total_supply += amount;
        *self.balances.entry(to).or_default() += amount;
    }
}

impl World {
    pub(super) fn factory_call(&mut self, target: Address, data: &[u8]) -> Exec<Bytes> {
        let Ok(call) = IUniswapV2FactoryCalls::abi_decode(data) else {
            return revert("UniswapV2Factory: unknown function");
        };

        match call {
            IUniswapV2FactoryCalls::createPair(call) => {
                let pair = self.create_pair(target, call.tokenA, call.tokenB)?;
                Ok(pair.abi_encode().into())
            }
            IUniswapV2FactoryCalls::getPair(call) => Ok(self
                .factory(target)?
                .get_pair(call.tokenA, call.tokenB)
                .abi_encode()
                .into()),
            IUniswapV2FactoryCalls::pairCodeHash(_) => Ok(pair_code_hash().abi_encode().into()),
        }
    }

    fn create_pair(
        &mut self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Exec<Address> {
        require(token_a != token_b, "UniswapV2: IDENTICAL_ADDRESSES")?;
        let (token0, token1) = if token_a < token_b {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        require(!token0.is_zero(), "UniswapV2: ZERO_ADDRESS")?;
        require(
            self.factory(factory)?.get_pair(token0, token1).is_zero(),
            "UniswapV2: PAIR_EXISTS",
        )?;

        let salt = keccak256((token0, token1).abi_encode_packed());
        let pair = factory.create2(salt, pair_code_hash());

        self.contracts
            .insert(pair, Contract::Pair(Pair::new(token0, token1)));

        let pairs = &mut self.factory_mut(factory)?.pairs;
        pairs.insert((token0, token1), pair);
        pairs.insert((token1, token0), pair);

        Ok(pair)
    }

    pub(super) fn router_call(
        &mut self,
        sender: Address,
        target: Address,
        data: &[u8],
    ) -> Exec<Bytes> {
        let Ok(call) = IUniswapV2Router02Calls::abi_decode(data) else {
            return revert("UniswapV2Router: unknown function");
        };

        match call {
            IUniswapV2Router02Calls::addLiquidity(call) => {
                let (amount_a, amount_b, liquidity) = self.add_liquidity(sender, target, &call)?;
                Ok((amount_a, amount_b, liquidity).abi_encode_params().into())
            }
        }
    }

    fn add_liquidity(
        &mut self,
        sender: Address,
        router: Address,
        call: &addLiquidityCall,
    ) -> Exec<(U256, U256, U256)> {
        require(
            call.deadline >= U256::from(self.timestamp),
            "UniswapV2Router: EXPIRED",
        )?;

        let factory = match self.contracts.get(&router) {
            Some(Contract::Router(router)) => router.factory,
            _ => return revert("UniswapV2Router: not a router"),
        };

        let mut pair = self.factory(factory)?.get_pair(call.tokenA, call.tokenB);
        if pair.is_zero() {
            pair = self.create_pair(factory, call.tokenA, call.tokenB)?;
        }

        let (reserve_a, reserve_b) = self.pair(pair)?.reserves_for(call.tokenA);

        let (amount_a, amount_b) = if reserve_a.is_zero() && reserve_b.is_zero() {
            (call.amountADesired, call.amountBDesired)
        } else {
            let amount_b_optimal = call.amountADesired * reserve_b / reserve_a;
            if amount_b_optimal <= call.amountBDesired {
                require(
                    amount_b_optimal >= call.amountBMin,
                    "UniswapV2Router: INSUFFICIENT_B_AMOUNT",
                )?;
                (call.amountADesired, amount_b_optimal)
            } else {
                let amount_a_optimal = call.amountBDesired * reserve_a / reserve_b;
                require(
                    amount_a_optimal >= call.amountAMin,
                    "UniswapV2Router: INSUFFICIENT_A_AMOUNT",
                )?;
                (amount_a_optimal, call.amountBDesired)
            }
        };

        self.token_transfer_from(call.tokenA, router, sender, pair, amount_a)?;
        self.token_transfer_from(call.tokenB, router, sender, pair, amount_b)?;

        let liquidity = self.pair_mint(pair, call.to)?;

        Ok((amount_a, amount_b, liquidity))
    }

    /// Mints LP tokens for whatever the pair holds above its reserves.
    fn pair_mint(&mut self, pair: Address, to: Address) -> Exec<U256> {
        let state = self.pair(pair)?;
        let (token0, token1) = (state.token0, state.token1);
        let (reserve0, reserve1) = (state.reserve0, state.reserve1);
        let total_supply = state.total_supply;

        let balance0 = self.token_balance(token0, pair)?;
        let balance1 = self.token_balance(token1, pair)?;
        let amount0 = balance0 - reserve0;
        let amount1 = balance1 - reserve1;

        let liquidity = if total_supply.is_zero() {
            let Some(product) = amount0.checked_mul(amount1) else {
                return revert("UniswapV2: OVERFLOW");
            };
            sqrt(product).saturating_sub(MINIMUM_LIQUIDITY)
        } else {
            (amount0 * total_supply / reserve0).min(amount1 * total_supply / reserve1)
        };
        require(!liquidity.is_zero(), "UniswapV2: INSUFFICIENT_LIQUIDITY_MINTED")?;
        require(
            balance0 <= max_reserve() && balance1 <= max_reserve(),
            "UniswapV2: OVERFLOW",
        )?;

        // Truncation to uint32 matches the pair's own timestamp storage.
        let timestamp = (self.timestamp % (1 << 32)) as u32;

        let state = self.pair_mut(pair)?;
        if total_supply.is_zero() {
            state.mint_lp(Address::ZERO, MINIMUM_LIQUIDITY);
        }
        state.mint_lp(to, liquidity);
        state.reserve0 = balance0;
        state.reserve1 = balance1;
        state.block_timestamp_last = timestamp;

        Ok(liquidity)
    }

    pub(super) fn pair_call(&mut self, target: Address, data: &[u8]) -> Exec<Bytes> {
        let Ok(call) = IUniswapV2PairCalls::abi_decode(data) else {
            return revert("UniswapV2Pair: unknown function");
        };

        let pair = self.pair(target)?;

        match call {
            IUniswapV2PairCalls::token0(_) => Ok(pair.token0.abi_encode().into()),
            IUniswapV2PairCalls::token1(_) => Ok(pair.token1.abi_encode().into()),
            IUniswapV2PairCalls::getReserves(_) => Ok((
                pair.reserve0,
                pair.reserve1,
                U256::from(pair.block_timestamp_last),
            )
                .abi_encode_params()
                .into()),
        }
    }
}
