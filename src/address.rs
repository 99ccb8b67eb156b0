use bitcoin::address::NetworkUnchecked;
use bitcoin::Address;

use crate::error::SyncError;

pub const INVALID_ADDRESS_MESSAGE: &str = "Invalid BTC address format";

/// Check that `address` is a well-formed address for `network`
///
/// Legacy, nested SegWit, native SegWit and Taproot encodings are accepted.
pub fn validate_address(address: &str, network: bitcoin::Network) -> Result<(), SyncError> {
    address
        .trim()
        .parse::<Address<NetworkUnchecked>>()
        .ok()
        .and_then(|unchecked| unchecked.require_network(network).ok())
        .map(|_| ())
        .ok_or_else(|| SyncError::Validation(INVALID_ADDRESS_MESSAGE.to_string()))
}
