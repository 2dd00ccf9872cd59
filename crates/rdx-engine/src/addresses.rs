//! Deposit address assignment.
//!
//! Every non-reward asset gets one random address when the wallet is
//! opened: a chain prefix followed by 20 random bytes in hex.

use std::collections::BTreeMap;

use rdx_types::Asset;

/// Chain prefix for an asset's deposit addresses.
fn address_prefix(asset: &str) -> &'static str {
    match asset {
        "BTC" => "bc1",
        "PI" => "pi",
        _ => "0x",
    }
}

/// Fresh address for `asset`.
#[must_use]
pub fn new_deposit_address(asset: &str) -> String {
    let body: [u8; 20] = rand::random();
    format!("{}{}", address_prefix(asset), hex::encode(body))
}

/// One address per supported asset, skipping the reward asset.
#[must_use]
pub fn generate_deposit_addresses(supported: &[Asset], reward_asset: &str) -> BTreeMap<Asset, String> {
    supported
        .iter()
        .filter(|asset| asset.as_str() != reward_asset)
        .map(|asset| (asset.clone(), new_deposit_address(asset)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_is_hex(address: &str, prefix: &str) -> bool {
        let body = address.strip_prefix(prefix).unwrap_or_default();
        body.len() == 40 && body.chars().all(|c| c.is_ascii_hexdigit())
    }

    #[test]
    fn prefixes_follow_chain() {
        assert!(body_is_hex(&new_deposit_address("BTC"), "bc1"));
        assert!(body_is_hex(&new_deposit_address("ETH"), "0x"));
        assert!(body_is_hex(&new_deposit_address("USDT"), "0x"));
        assert!(body_is_hex(&new_deposit_address("PI"), "pi"));
    }

    #[test]
    fn reward_asset_is_skipped() {
        let assets: Vec<Asset> = ["BTC", "ETH", "RDX"].iter().map(ToString::to_string).collect();
        let addresses = generate_deposit_addresses(&assets, "RDX");
        assert_eq!(addresses.len(), 2);
        assert!(!addresses.contains_key("RDX"));
    }

    #[test]
    fn addresses_differ() {
        assert_ne!(new_deposit_address("ETH"), new_deposit_address("ETH"));
    }
}
