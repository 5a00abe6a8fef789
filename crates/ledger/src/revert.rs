//! Revert data decoding.
//!
//! Turns raw revert payloads into readable reasons: `Error(string)` and
//! `Panic(uint256)` are decoded, anything else is rendered as hex.

use alloy::hex;
use alloy::transports::{RpcError, TransportErrorKind};
use tracing::debug;

use crate::LedgerError;

/// Renders revert data as a human-readable reason.
pub fn revert_reason(data: &[u8]) -> String {
    if data.is_empty() {
        return "empty revert data".to_string();
    }

    alloy::sol_types::decode_revert_reason(data).unwrap_or_else(|| hex::encode_prefixed(data))
}

/// Converts an RPC failure into a [`LedgerError`], decoding revert data
/// when the node returned any.
pub fn handle_rpc_error(err: RpcError<TransportErrorKind>, note: &str) -> LedgerError {
    // Wrap in alloy::contract::Error to reuse its revert data extraction
    let contract_err = alloy::contract::Error::TransportError(err);

    if let Some(revert_data) = contract_err.as_revert_data() {
        return LedgerError::Reverted {
            note: note.to_string(),
            reason: revert_reason(revert_data.as_ref()),
        };
    }

    debug!(note, "RPC error carried no revert data");

    match contract_err {
        alloy::contract::Error::TransportError(err) => LedgerError::Transport(err),
        other => LedgerError::Reverted {
            note: note.to_string(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use alloy::sol_types::{Revert, SolError};

    use super::*;

    #[test]
    fn decodes_error_string() {
        let data = Revert {
            reason: "Ownable: caller is not the owner".to_string(),
        }
        .abi_encode();

        assert!(revert_reason(&data).contains("Ownable: caller is not the owner"));
    }

    #[test]
    fn renders_unknown_selector_as_hex() {
        let data = [0xff, 0xff, 0xff, 0xff];

        assert_eq!(revert_reason(&data), "0xffffffff");
    }

    #[test]
    fn empty_data_is_reported() {
        assert_eq!(revert_reason(&[]), "empty revert data");
    }
}
