//! In-memory record of the contracts deployed during one provisioning run.
//!
//! Artifacts are keyed by a logical name (several contracts share a
//! compiled artifact, e.g. the USDC and TAP mocks are both `ERC20Mock`).
//! The registry is append-only; a fresh run starts from [`ArtifactRegistry::clear`].

use alloy::dyn_abi::DynSolValue;
use alloy::hex;
use alloy::primitives::Address;
use serde::Serialize;
use serde_json::Value;

use crate::contracts::ContractKind;

/// Logical artifact names used by the fixture.
pub mod names {
    pub const ORACLE: &str = "wethUsdcOracle";
    pub const WETH: &str = "weth";
    pub const USDC: &str = "usdc";
    pub const TAP: &str = "tap";
    pub const URI_BUILDER: &str = "uriBuilder";
    pub const YIELD_BOX: &str = "yieldBox";
    pub const BAR: &str = "bar";
    pub const UNI_FACTORY: &str = "uniFactory";
    pub const UNI_ROUTER: &str = "uniRouter";
    pub const WETH_USDC_PAIR: &str = "wethUsdcPair";
    pub const WETH_TAP_PAIR: &str = "wethTapPair";
    pub const MULTI_SWAPPER: &str = "multiSwapper";
    pub const MEDIUM_RISK_MC: &str = "mediumRiskMC";
    pub const LENDING_BORROWING_MODULE: &str = "mixologistLendingBorrowingModule";
    pub const LIQUIDATION_MODULE: &str = "mixologistLiquidationModule";
    pub const SETTER_MODULE: &str = "mixologistSetterModule";
    pub const MARKET: &str = "wethUsdcMixologist";
    pub const LIQUIDATION_QUEUE: &str = "liquidationQueue";
    pub const HELPER: &str = "mixologistHelper";
    pub const USDO_TO_WETH_BIDDER: &str = "usdoToWethBidder";
    pub const USDO: &str = "usdo";
    pub const USDO_WETH_PAIR: &str = "wethUsdoPair";
    pub const CURVE_POOL: &str = "curvePoolMock";
    pub const CURVE_SWAPPER: &str = "curveSwapper";
    pub const STABLE_TO_USDO_BIDDER: &str = "stableToUsdoBidder";
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    #[error("no artifact named {0} was recorded in this run")]
    NotFound(String),
    #[error("artifact {0} was already recorded in this run")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub name: String,
    pub contract: ContractKind,
    pub address: Address,
    pub constructor_args: Vec<DynSolValue>,
}

#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    artifacts: Vec<Artifact>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        name: &str,
        contract: ContractKind,
        address: Address,
        constructor_args: Vec<DynSolValue>,
    ) -> Result<&Artifact, ArtifactError> {
        if self.artifacts.iter().any(|artifact| artifact.name == name) {
            return Err(ArtifactError::Duplicate(name.to_string()));
        }

        self.artifacts.push(Artifact {
            name: name.to_string(),
            contract,
            address,
            constructor_args,
        });

        self.artifacts
            .last()
            .ok_or_else(|| ArtifactError::NotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Result<&Artifact, ArtifactError> {
        self.artifacts
            .iter()
            .find(|artifact| artifact.name == name)
            .ok_or_else(|| ArtifactError::NotFound(name.to_string()))
    }

    pub fn address(&self, name: &str) -> Result<Address, ArtifactError> {
        self.get(name).map(|artifact| artifact.address)
    }

    /// Artifacts in recording order.
    pub fn all(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn clear(&mut self) {
        self.artifacts.clear();
    }

    pub fn summary(&self) -> DeploymentSummary {
        DeploymentSummary(
            self.artifacts
                .iter()
                .map(|artifact| DeploymentEntry {
                    name: artifact.name.clone(),
                    contract: artifact.contract.artifact_name(),
                    address: artifact.address,
                    meta: DeploymentMeta {
                        constructor_arguments: artifact
                            .constructor_args
                            .iter()
                            .map(abi_value_to_json)
                            .collect(),
                    },
                })
                .collect(),
        )
    }
}

/// Deployment list handed to the external deployment registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeploymentSummary(pub Vec<DeploymentEntry>);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentEntry {
    pub name: String,
    pub contract: &'static str,
    pub address: Address,
    pub meta: DeploymentMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentMeta {
    pub constructor_arguments: Vec<Value>,
}

impl DeploymentSummary {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Integers are rendered as decimal strings so 256-bit values survive
/// JSON number precision limits.
fn abi_value_to_json(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(flag) => Value::Bool(*flag),
        DynSolValue::Int(int, _) => Value::String(int.to_string()),
        DynSolValue::Uint(uint, _) => Value::String(uint.to_string()),
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(hex::encode_prefixed(&word[..*size]))
        }
        DynSolValue::Bytes(bytes) => Value::String(hex::encode_prefixed(bytes)),
        DynSolValue::String(string) => Value::String(string.clone()),
        DynSolValue::Array(values)
        | DynSolValue::FixedArray(values)
        | DynSolValue::Tuple(values) => {
            Value::Array(values.iter().map(abi_value_to_json).collect())
        }
        other => Value::String(format!("{other:?}")),
    }
}
