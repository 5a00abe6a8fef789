//! Module dispatch encoding.
//!
//! Configuration calls reach a market's logic modules through three
//! nested layers, outermost first:
//!
//! 1. `executeModule(bytes)` calldata on the market,
//! 2. the ABI parameter pair `(uint256 moduleSlot, bytes innerCall)`,
//! 3. the module function's own calldata (selector plus arguments).
//!
//! Admin-only module calls are additionally batched through
//! `BeachBar.executeMixologistFn(address[], bytes[])` so the market sees
//! the controller as the caller.

use alloy::dyn_abi::{DynSolValue, JsonAbiExt};
use alloy::json_abi::Function;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::{SolCall, SolValue};

use crate::bindings::{IBeachBar, IMixologist};
use crate::modules::{ModuleError, ModuleId, ModuleRegistry};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("invalid function signature {signature}: {reason}")]
    Signature { signature: String, reason: String },
    #[error("arguments do not match {signature}: {reason}")]
    Arguments { signature: String, reason: String },
    #[error("batch has {targets} targets but {calls} calls")]
    BatchLengthMismatch { targets: usize, calls: usize },
    #[error("malformed dispatch payload: {0}")]
    Decode(#[from] alloy::sol_types::Error),
    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// A module call before it is wrapped for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPayload {
    pub module: ModuleId,
    pub inner: Bytes,
}

#[derive(Debug, Clone, Copy)]
pub struct ModuleDispatchEncoder {
    registry: ModuleRegistry,
}

impl ModuleDispatchEncoder {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self { registry }
    }

    /// Calldata for a typed module function call.
    pub fn encode_inner<C: SolCall>(&self, call: &C) -> Bytes {
        call.abi_encode().into()
    }

    /// Calldata for a function given by its human-readable signature,
    /// e.g. `addCollateral(address,address,bool,uint256)`.
    pub fn encode_signature(
        &self,
        signature: &str,
        args: &[DynSolValue],
    ) -> Result<Bytes, DispatchError> {
        let function = Function::parse(signature).map_err(|err| DispatchError::Signature {
            signature: signature.to_string(),
            reason: err.to_string(),
        })?;

        let calldata = function
            .abi_encode_input(args)
            .map_err(|err| DispatchError::Arguments {
                signature: signature.to_string(),
                reason: err.to_string(),
            })?;

        Ok(calldata.into())
    }

    /// Tags `inner` with the slot of `module`.
    pub fn wrap_for_module(&self, module: ModuleId, inner: &Bytes) -> Bytes {
        (self.registry.slot(module), inner.clone())
            .abi_encode_params()
            .into()
    }

    pub fn encode_payload(&self, payload: &DispatchPayload) -> Bytes {
        self.wrap_for_module(payload.module, &payload.inner)
    }

    /// `executeModule(payload)` calldata for the market.
    pub fn wrap_for_execution(&self, payload: &Bytes) -> Bytes {
        IMixologist::executeModuleCall {
            data: payload.clone(),
        }
        .abi_encode()
        .into()
    }

    /// All three layers in one go.
    pub fn encode_module_call<C: SolCall>(&self, module: ModuleId, call: &C) -> Bytes {
        let payload = self.wrap_for_module(module, &self.encode_inner(call));
        self.wrap_for_execution(&payload)
    }

    /// `executeMixologistFn(targets, calls)` calldata for the controller.
    pub fn encode_batch(
        &self,
        targets: &[Address],
        calls: &[Bytes],
    ) -> Result<Bytes, DispatchError> {
        if targets.len() != calls.len() {
            return Err(DispatchError::BatchLengthMismatch {
                targets: targets.len(),
                calls: calls.len(),
            });
        }

        Ok(IBeachBar::executeMixologistFnCall {
            mc: targets.to_vec(),
            data: calls.to_vec(),
        }
        .abi_encode()
        .into())
    }

    pub fn decode_module_payload(&self, data: &[u8]) -> Result<DispatchPayload, DispatchError> {
        let (slot, inner) = <(U256, Bytes)>::abi_decode_params(data)?;

        Ok(DispatchPayload {
            module: self.registry.module_at(slot)?,
            inner,
        })
    }

    /// Extracts the payload argument of `executeModule` calldata.
    pub fn decode_execution(&self, calldata: &[u8]) -> Result<Bytes, DispatchError> {
        Ok(IMixologist::executeModuleCall::abi_decode(calldata)?.data)
    }
}

impl Default for ModuleDispatchEncoder {
    fn default() -> Self {
        Self::new(ModuleRegistry::standard())
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, address};
    use proptest::prelude::*;

    use super::*;
    use crate::bindings::{
        IMixologistLendingBorrowing, IMixologistSetter, LiquidationQueueMeta,
    };

    fn arb_module() -> impl Strategy<Value = ModuleId> {
        prop::sample::select(ModuleId::ALL.to_vec())
    }

    fn arb_bytes() -> impl Strategy<Value = Bytes> {
        prop::collection::vec(any::<u8>(), 0..256).prop_map(Bytes::from)
    }

    fn arb_address() -> impl Strategy<Value = Address> {
        any::<[u8; 20]>().prop_map(Address::from)
    }

    proptest! {
        #[test]
        fn module_payload_round_trips(module in arb_module(), inner in arb_bytes()) {
            let encoder = ModuleDispatchEncoder::default();

            let wrapped = encoder.wrap_for_module(module, &inner);
            let decoded = encoder.decode_module_payload(&wrapped).unwrap();

            prop_assert_eq!(decoded, DispatchPayload { module, inner });
        }

        #[test]
        fn execution_round_trips(payload in arb_bytes()) {
            let encoder = ModuleDispatchEncoder::default();

            let calldata = encoder.wrap_for_execution(&payload);

            prop_assert_eq!(encoder.decode_execution(&calldata).unwrap(), payload);
        }

        #[test]
        fn typed_and_signature_encodings_agree(
            from in arb_address(),
            to in arb_address(),
            skim in any::<bool>(),
            share in any::<u128>(),
        ) {
            let encoder = ModuleDispatchEncoder::default();

            let typed = encoder.encode_inner(&IMixologistLendingBorrowing::addCollateralCall {
                from,
                to,
                skim,
                share: U256::from(share),
            });
            let dynamic = encoder
                .encode_signature(
                    "addCollateral(address,address,bool,uint256)",
                    &[
                        DynSolValue::Address(from),
                        DynSolValue::Address(to),
                        DynSolValue::Bool(skim),
                        DynSolValue::Uint(U256::from(share), 256),
                    ],
                )
                .unwrap();

            prop_assert_eq!(typed, dynamic);
        }
    }

    #[test]
    fn nesting_order_is_execution_then_module_then_call() {
        let encoder = ModuleDispatchEncoder::default();
        let queue = address!("0x00000000000000000000000000000000000000aa");
        let call = IMixologistSetter::setLiquidationQueueCall {
            liquidationQueue: queue,
            liquidationQueueMeta: LiquidationQueueMeta {
                activationTime: U256::from(600),
                minBidAmount: U256::from(200),
                closeToMinBidAmount: U256::from(202),
                defaultBidAmount: U256::from(400),
                feeCollector: Address::ZERO,
                bidExecutionSwapper: Address::ZERO,
                usdoSwapper: Address::ZERO,
            },
        };

        let calldata = encoder.encode_module_call(ModuleId::Setter, &call);

        assert_eq!(&calldata[..4], IMixologist::executeModuleCall::SELECTOR.as_slice());

        let payload = encoder
            .decode_module_payload(&encoder.decode_execution(&calldata).unwrap())
            .unwrap();
        assert_eq!(payload.module, ModuleId::Setter);

        let decoded =
            IMixologistSetter::setLiquidationQueueCall::abi_decode(&payload.inner).unwrap();
        assert_eq!(decoded, call);
    }

    #[test]
    fn module_tag_uses_registry_slot() {
        let encoder = ModuleDispatchEncoder::default();

        let wrapped = encoder.wrap_for_module(ModuleId::LendingBorrowing, &Bytes::new());

        assert_eq!(U256::from_be_slice(&wrapped[..32]), U256::from(1));
    }

    #[test]
    fn unknown_slot_fails_to_decode() {
        let encoder = ModuleDispatchEncoder::default();
        let wrapped: Bytes = (U256::from(9), Bytes::new()).abi_encode_params().into();

        assert!(matches!(
            encoder.decode_module_payload(&wrapped).unwrap_err(),
            DispatchError::Module(ModuleError::UnknownSlot(_))
        ));
    }

    #[test]
    fn batch_rejects_mismatched_lengths() {
        let encoder = ModuleDispatchEncoder::default();

        let error = encoder
            .encode_batch(&[Address::ZERO, Address::ZERO], &[Bytes::new()])
            .unwrap_err();

        assert!(matches!(
            error,
            DispatchError::BatchLengthMismatch { targets: 2, calls: 1 }
        ));
    }

    #[test]
    fn batch_round_trips() {
        let encoder = ModuleDispatchEncoder::default();
        let market = address!("0x00000000000000000000000000000000000000bb");
        let inner = encoder.wrap_for_execution(&Bytes::from_static(&[1, 2, 3]));

        let calldata = encoder.encode_batch(&[market], &[inner.clone()]).unwrap();
        let decoded = IBeachBar::executeMixologistFnCall::abi_decode(&calldata).unwrap();

        assert_eq!(decoded.mc, vec![market]);
        assert_eq!(decoded.data, vec![inner]);
    }

    #[test]
    fn bad_signature_is_reported() {
        let encoder = ModuleDispatchEncoder::default();

        assert!(matches!(
            encoder.encode_signature("addCollateral(address,", &[]).unwrap_err(),
            DispatchError::Signature { .. }
        ));
        assert!(matches!(
            encoder
                .encode_signature("addCollateral(address)", &[DynSolValue::Bool(true)])
                .unwrap_err(),
            DispatchError::Arguments { .. }
        ));
    }
}
