//! Display names for well-known EVM chains

use corens_core::ChainId;

const KNOWN_NETWORKS: &[(ChainId, &str)] = &[
    (1, "Ethereum Mainnet"),
    (10, "OP Mainnet"),
    (56, "BNB Smart Chain"),
    (137, "Polygon"),
    (1114, "CoreTestnet2"),
    (1115, "Core Testnet"),
    (1116, "Core Mainnet"),
    (8453, "Base"),
    (17000, "Holesky"),
    (42161, "Arbitrum One"),
    (43114, "Avalanche C-Chain"),
    (11155111, "Sepolia"),
];

/// Display name for a chain id, if it is a known network
pub fn network_name(chain_id: ChainId) -> Option<&'static str> {
    KNOWN_NETWORKS
        .iter()
        .find(|(id, _)| *id == chain_id)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_networks() {
        assert_eq!(network_name(1), Some("Ethereum Mainnet"));
        assert_eq!(network_name(1114), Some("CoreTestnet2"));
        assert_eq!(network_name(999_999), None);
    }
}
