//! Deployable contract kinds and their compiled artifact names.

use std::fmt;
use std::str::FromStr;

/// Every contract the fixture deploys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    OracleMock,
    ERC20Mock,
    WETH9Mock,
    YieldBoxURIBuilder,
    YieldBox,
    BeachBar,
    UniswapV2Factory,
    UniswapV2Router02,
    UniswapV2Pair,
    MultiSwapper,
    BaseMixologist,
    MixologistLendingBorrowing,
    MixologistLiquidation,
    MixologistSetter,
    LiquidationQueue,
    MixologistHelper,
    UniUsdoToWethBidder,
    CurvePoolMock,
    CurveSwapper,
    CurveStableToUsdoBidder,
}

impl ContractKind {
    pub const ALL: [Self; 20] = [
        Self::OracleMock,
        Self::ERC20Mock,
        Self::WETH9Mock,
        Self::YieldBoxURIBuilder,
        Self::YieldBox,
        Self::BeachBar,
        Self::UniswapV2Factory,
        Self::UniswapV2Router02,
        Self::UniswapV2Pair,
        Self::MultiSwapper,
        Self::BaseMixologist,
        Self::MixologistLendingBorrowing,
        Self::MixologistLiquidation,
        Self::MixologistSetter,
        Self::LiquidationQueue,
        Self::MixologistHelper,
        Self::UniUsdoToWethBidder,
        Self::CurvePoolMock,
        Self::CurveSwapper,
        Self::CurveStableToUsdoBidder,
    ];

    /// Contract name as it appears in the compiled artifacts.
    pub const fn artifact_name(self) -> &'static str {
        match self {
            Self::OracleMock => "OracleMock",
            Self::ERC20Mock => "ERC20Mock",
            Self::WETH9Mock => "WETH9Mock",
            Self::YieldBoxURIBuilder => "YieldBoxURIBuilder",
            Self::YieldBox => "YieldBox",
            Self::BeachBar => "BeachBar",
            Self::UniswapV2Factory => "UniswapV2Factory",
            Self::UniswapV2Router02 => "UniswapV2Router02",
            Self::UniswapV2Pair => "UniswapV2Pair",
            Self::MultiSwapper => "MultiSwapper",
            Self::BaseMixologist => "BaseMixologist",
            Self::MixologistLendingBorrowing => "MixologistLendingBorrowing",
            Self::MixologistLiquidation => "MixologistLiquidation",
            Self::MixologistSetter => "MixologistSetter",
            Self::LiquidationQueue => "LiquidationQueue",
            Self::MixologistHelper => "MixologistHelper",
            Self::UniUsdoToWethBidder => "UniUsdoToWethBidder",
            Self::CurvePoolMock => "CurvePoolMock",
            Self::CurveSwapper => "CurveSwapper",
            Self::CurveStableToUsdoBidder => "CurveStableToUsdoBidder",
        }
    }
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.artifact_name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown contract kind: {0}")]
pub struct UnknownContractKind(pub String);

impl FromStr for ContractKind {
    type Err = UnknownContractKind;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.artifact_name() == name)
            .ok_or_else(|| UnknownContractKind(name.to_string()))
    }
}
