//! Liquidity bootstrap amounts.
//!
//! Pools are seeded by minting both sides of the pair and supplying them
//! in full, so the initial pool price is exactly `quote / base`. Prices
//! are quote-per-base with 18 decimals.

use alloy::primitives::U256;

/// One unit of price (10^18).
pub const PRICE_UNIT: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// `whole` tokens of an 18-decimal asset.
pub fn ether(whole: u64) -> U256 {
    U256::from(whole) * PRICE_UNIT
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RatioError {
    #[error("quote amount for {base_amount} base at price {target_price} overflows")]
    Overflow {
        target_price: U256,
        base_amount: U256,
    },
}

/// Paired amounts for seeding a pool at `target_price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityPlan {
    pub base_amount: U256,
    pub quote_amount: U256,
    pub target_price: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRatioCalculator {
    price_unit: U256,
}

impl PriceRatioCalculator {
    pub const fn new() -> Self {
        Self {
            price_unit: PRICE_UNIT,
        }
    }

    /// Formula: quote = base * target_price / 10^18, truncated.
    ///
    /// The product is taken before dividing so fractional prices keep
    /// their precision; truncation means the plan never mints more quote
    /// than the price implies.
    pub fn plan_liquidity(
        &self,
        target_price: U256,
        base_amount: U256,
    ) -> Result<LiquidityPlan, RatioError> {
        let numerator = base_amount
            .checked_mul(target_price)
            .ok_or(RatioError::Overflow {
                target_price,
                base_amount,
            })?;

        Ok(LiquidityPlan {
            base_amount,
            quote_amount: numerator / self.price_unit,
            target_price,
        })
    }

    pub fn price_unit(&self) -> U256 {
        self.price_unit
    }
}

impl Default for PriceRatioCalculator {
    fn default() -> Self {
        Self::new()
    }
}
