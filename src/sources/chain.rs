use std::collections::HashSet;

/// Per-chain parameters of a wallet scan: which asset profits are measured in
/// and which tokens are never replayed.
#[derive(Debug, Clone)]
pub struct ChainProfile {
    pub chain: String,
    pub counter_asset_symbol: String,
    /// Quote assets an event must be priced in to be replayed.
    pub quote_addresses: HashSet<String>,
    /// Base, stable and infrastructure tokens skipped before replay.
    pub excluded_tokens: HashSet<String>,
    /// EVM addresses are case-insensitive.
    pub case_insensitive: bool,
}

const SOL_QUOTES: &[&str] = &[
    "So11111111111111111111111111111111111111111",
    "So11111111111111111111111111111111111111112",
];

const SOL_EXCLUDED: &[&str] = &[
    "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", // USDC
    "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", // USDT
    "4k3Dyjzvzp8eMZWUXbBCjEvwSkkk59S5iCNLY3QrkX6R", // RAY
    "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN",
    "27G8MtK7VtTcCHkpASjSDdkWWYfoqT6ggEuKidVJidD4",
    "J1toso1uCk3RLmjorhTtrVwY9HJ7X8V9yYac6Y7kGCPn", // JitoSOL
    "hntyVP6YFm1Hg25TN9WGLqM12b8TQmcknKrdu1oxWux",
    "EKpQGSJtjMFqKZ9KQanSqYXRcF8fBopzLHYxdM65zcjm",
    "So11111111111111111111111111111111111111111",
    "So11111111111111111111111111111111111111112",
];

const WETH: &str = "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2";

const ETH_EXCLUDED: &[&str] = &[
    WETH,
    "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48", // USDC
    "0xdac17f958d2ee523a2206206994597c13d831ec7", // USDT
];

impl ChainProfile {
    pub fn solana() -> Self {
        Self {
            chain: "sol".into(),
            counter_asset_symbol: "SOL".into(),
            quote_addresses: SOL_QUOTES.iter().map(|s| s.to_string()).collect(),
            excluded_tokens: SOL_EXCLUDED.iter().map(|s| s.to_string()).collect(),
            case_insensitive: false,
        }
    }

    pub fn ethereum() -> Self {
        Self {
            chain: "eth".into(),
            counter_asset_symbol: "ETH".into(),
            quote_addresses: HashSet::from([WETH.to_string()]),
            excluded_tokens: ETH_EXCLUDED.iter().map(|s| s.to_string()).collect(),
            case_insensitive: true,
        }
    }

    pub fn from_chain(chain: &str) -> Option<Self> {
        match chain.to_lowercase().as_str() {
            "sol" | "solana" => Some(Self::solana()),
            "eth" | "ethereum" => Some(Self::ethereum()),
            _ => None,
        }
    }

    pub fn with_excluded<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for token in extra {
            let token = self.normalize(&token.into());
            self.excluded_tokens.insert(token);
        }
        self
    }

    pub fn normalize(&self, address: &str) -> String {
        if self.case_insensitive {
            address.to_lowercase()
        } else {
            address.to_string()
        }
    }

    pub fn is_excluded(&self, token_address: &str) -> bool {
        self.excluded_tokens.contains(&self.normalize(token_address))
    }

    /// Events with no reported quote asset are trusted as-is.
    pub fn accepts_quote(&self, quote_address: Option<&str>) -> bool {
        match quote_address {
            Some(addr) => self.quote_addresses.contains(&self.normalize(addr)),
            None => true,
        }
    }
}
