//! Liquidation queue parameters and their installation on a market.
//!
//! A market only accepts its queue through the Setter module, and only
//! from the controller, so the call travels as
//! `bar.executeMixologistFn([market], [executeModule((Setter, setLiquidationQueue(..)))])`.

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use tapioca_ledger::revert::revert_reason;
use tapioca_ledger::{Ledger, LedgerError, LedgerExt};
use tracing::{debug, info};

use crate::bindings::{
    IBeachBar, ILiquidationQueue, IMixologist, IMixologistSetter, LiquidationQueueMeta,
};
use crate::dispatch::{DispatchError, ModuleDispatchEncoder};
use crate::error::{ProvisionError, QueueConfigError};
use crate::liquidity::ether;
use crate::modules::ModuleId;

/// Seconds a bid waits before it can be executed.
pub const DEFAULT_ACTIVATION_DELAY: u64 = 600;

/// Validated liquidation queue parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationQueueConfig {
    activation_delay: U256,
    min_bid_amount: U256,
    close_to_min_bid_amount: U256,
    default_bid_amount: U256,
    fee_collector: Address,
    bid_swapper: Address,
    settlement_swapper: Address,
}

#[bon::bon]
impl LiquidationQueueConfig {
    #[builder]
    pub fn new(
        #[builder(default = U256::from(DEFAULT_ACTIVATION_DELAY))] activation_delay: U256,
        #[builder(default = ether(200))] min_bid_amount: U256,
        #[builder(default = ether(202))] close_to_min_bid_amount: U256,
        #[builder(default = ether(400))] default_bid_amount: U256,
        fee_collector: Address,
        #[builder(default)] bid_swapper: Address,
        #[builder(default)] settlement_swapper: Address,
    ) -> Result<Self, QueueConfigError> {
        if close_to_min_bid_amount < min_bid_amount {
            return Err(QueueConfigError::CloseToMinBelowMin {
                min: min_bid_amount,
                close_to_min: close_to_min_bid_amount,
            });
        }

        if default_bid_amount < close_to_min_bid_amount {
            return Err(QueueConfigError::DefaultBelowCloseToMin {
                close_to_min: close_to_min_bid_amount,
                default: default_bid_amount,
            });
        }

        Ok(Self {
            activation_delay,
            min_bid_amount,
            close_to_min_bid_amount,
            default_bid_amount,
            fee_collector,
            bid_swapper,
            settlement_swapper,
        })
    }
}

impl LiquidationQueueConfig {
    pub fn activation_delay(&self) -> U256 {
        self.activation_delay
    }

    pub fn min_bid_amount(&self) -> U256 {
        self.min_bid_amount
    }

    pub fn close_to_min_bid_amount(&self) -> U256 {
        self.close_to_min_bid_amount
    }

    pub fn default_bid_amount(&self) -> U256 {
        self.default_bid_amount
    }

    pub fn fee_collector(&self) -> Address {
        self.fee_collector
    }

    pub fn to_meta(&self) -> LiquidationQueueMeta {
        LiquidationQueueMeta {
            activationTime: self.activation_delay,
            minBidAmount: self.min_bid_amount,
            closeToMinBidAmount: self.close_to_min_bid_amount,
            defaultBidAmount: self.default_bid_amount,
            feeCollector: self.fee_collector,
            bidExecutionSwapper: self.bid_swapper,
            usdoSwapper: self.settlement_swapper,
        }
    }
}

/// Installs `queue` on `market` with `config`, acting as the controller
/// owner.
///
/// The batch is dry-run first so a failing inner call surfaces with its
/// revert reason rather than as a silent `false` in the receipt. After
/// confirmation the market must report `queue` as its liquidation queue.
pub async fn apply_liquidation_queue<L: Ledger + ?Sized>(
    ledger: &L,
    encoder: &ModuleDispatchEncoder,
    owner: Address,
    bar: Address,
    market: Address,
    queue: Address,
    config: &LiquidationQueueConfig,
) -> Result<(), ProvisionError> {
    let call = encoder.encode_module_call(
        ModuleId::Setter,
        &IMixologistSetter::setLiquidationQueueCall {
            liquidationQueue: queue,
            liquidationQueueMeta: config.to_meta(),
        },
    );
    let batch = encoder.encode_batch(&[market], &[call])?;

    let dry_run = ledger.call(owner, bar, batch.clone()).await?;
    let outcome = IBeachBar::executeMixologistFnCall::abi_decode_returns(&dry_run)
        .map_err(DispatchError::from)?;

    if let Some(index) = outcome.success.iter().position(|success| !success) {
        let reason = outcome
            .result
            .get(index)
            .map_or_else(|| "no result returned".to_string(), |data| revert_reason(data));

        return Err(ProvisionError::BatchCallFailed {
            index,
            target: market,
            reason,
        });
    }

    let confirmation = ledger
        .send(owner, bar, batch, "set liquidation queue")
        .await?;
    debug!(tx_hash = %confirmation.tx_hash, "Liquidation queue batch confirmed");

    let actual = ledger
        .view(owner, market, IMixologist::liquidationQueueCall {})
        .await?;

    if actual != queue {
        return Err(ProvisionError::QueueNotApplied {
            market,
            expected: queue,
            actual,
        });
    }

    info!(%market, %queue, min_bid = %config.min_bid_amount, "Liquidation queue installed");
    Ok(())
}

/// Reads the parameters a queue was initialized with.
pub async fn read_liquidation_queue_meta<L: Ledger + ?Sized>(
    ledger: &L,
    from: Address,
    queue: Address,
) -> Result<LiquidationQueueMeta, LedgerError> {
    let meta = ledger
        .view(from, queue, ILiquidationQueue::liquidationQueueMetaCall {})
        .await?;

    Ok(LiquidationQueueMeta {
        activationTime: meta.activationTime,
        minBidAmount: meta.minBidAmount,
        closeToMinBidAmount: meta.closeToMinBidAmount,
        defaultBidAmount: meta.defaultBidAmount,
        feeCollector: meta.feeCollector,
        bidExecutionSwapper: meta.bidExecutionSwapper,
        usdoSwapper: meta.usdoSwapper,
    })
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;

    const COLLECTOR: Address = address!("0x00000000000000000000000000000000000000c0");

    #[test]
    fn defaults_match_fixture_parameters() {
        let config = LiquidationQueueConfig::builder()
            .fee_collector(COLLECTOR)
            .build()
            .unwrap();

        let meta = config.to_meta();
        assert_eq!(meta.activationTime, U256::from(600));
        assert_eq!(meta.minBidAmount, ether(200));
        assert_eq!(meta.closeToMinBidAmount, ether(202));
        assert_eq!(meta.defaultBidAmount, ether(400));
        assert_eq!(meta.feeCollector, COLLECTOR);
        assert_eq!(meta.bidExecutionSwapper, Address::ZERO);
        assert_eq!(meta.usdoSwapper, Address::ZERO);
    }

    #[test]
    fn close_to_min_below_min_is_rejected() {
        let error = LiquidationQueueConfig::builder()
            .fee_collector(COLLECTOR)
            .min_bid_amount(ether(300))
            .build()
            .unwrap_err();

        assert_eq!(
            error,
            QueueConfigError::CloseToMinBelowMin {
                min: ether(300),
                close_to_min: ether(202),
            }
        );
    }

    #[test]
    fn default_below_close_to_min_is_rejected() {
        let error = LiquidationQueueConfig::builder()
            .fee_collector(COLLECTOR)
            .default_bid_amount(ether(201))
            .build()
            .unwrap_err();

        assert_eq!(
            error,
            QueueConfigError::DefaultBelowCloseToMin {
                close_to_min: ether(202),
                default: ether(201),
            }
        );
    }

    #[test]
    fn equal_thresholds_are_accepted() {
        let config = LiquidationQueueConfig::builder()
            .fee_collector(COLLECTOR)
            .min_bid_amount(ether(10))
            .close_to_min_bid_amount(ether(10))
            .default_bid_amount(ether(10))
            .build()
            .unwrap();

        assert_eq!(config.default_bid_amount(), config.min_bid_amount());
    }
}
