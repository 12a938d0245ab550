/// Sentinel returned by sponsor lookups when a wallet has no further
/// sponsor; also where every upward chain walk terminates.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Minimal shape check used at the API boundary. The chain only hands us
/// `0x`-prefixed hex strings; anything else is rejected before tree work.
pub fn is_wallet_address(address: &str) -> bool {
    address.starts_with("0x")
}
