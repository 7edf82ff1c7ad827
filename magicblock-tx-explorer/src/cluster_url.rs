// Cluster URL Aliases
pub const DEFAULT_CLUSTER: &str = "devnet";
pub const MAINNET_URL: &str = "https://api.mainnet-beta.solana.com/";
pub const DEVNET_URL: &str = "https://api.devnet.solana.com/";
pub const TESTNET_URL: &str = "https://api.testnet.solana.com/";
pub const LOCALHOST_URL: &str = "http://127.0.0.1:8899/";

/// Resolves the well known cluster names to their RPC URL, anything else
/// is treated as a URL.
pub fn resolve_cluster_url(url_or_alias: &str) -> String {
    match url_or_alias.trim() {
        "mainnet" | "mainnet-beta" => MAINNET_URL,
        "devnet" => DEVNET_URL,
        "testnet" => TESTNET_URL,
        "localhost" | "local" | "development" => LOCALHOST_URL,
        url => url,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_resolve_to_urls() {
        assert_eq!(resolve_cluster_url("mainnet-beta"), MAINNET_URL);
        assert_eq!(resolve_cluster_url("mainnet"), MAINNET_URL);
        assert_eq!(resolve_cluster_url(DEFAULT_CLUSTER), DEVNET_URL);
        assert_eq!(resolve_cluster_url("testnet"), TESTNET_URL);
        assert_eq!(resolve_cluster_url("local"), LOCALHOST_URL);
    }

    #[test]
    fn test_urls_are_kept() {
        let url = "https://rpc.example.com:8899";
        assert_eq!(resolve_cluster_url(url), url);
    }
}
