use serde::{Deserialize, Serialize};

use common::FundamentalTier;

const QUOTE_ASSETS: [&str; 5] = ["USDT", "USDC", "FDUSD", "BUSD", "USD"];

/// Per-tier numeric policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierValues {
    pub s: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl TierValues {
    pub fn get(&self, tier: FundamentalTier) -> f64 {
        match tier {
            FundamentalTier::S => self.s,
            FundamentalTier::A => self.a,
            FundamentalTier::B => self.b,
            FundamentalTier::C => self.c,
        }
    }
}

/// Static asset classification. Loaded once, never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierTable {
    pub s_tier: Vec<String>,
    pub a_tier: Vec<String>,
    /// Substrings marking speculative / meme assets.
    pub c_patterns: Vec<String>,
    /// Stop-loss distance in ATR multiples.
    pub stop_multipliers: TierValues,
    /// Maximum allocation as a percentage of the base position.
    pub max_allocation_pct: TierValues,
}

impl Default for TierTable {
    fn default() -> Self {
        let list = |xs: &[&str]| -> Vec<String> { xs.iter().map(|s| s.to_string()).collect() };
        Self {
            s_tier: list(&["BTC", "ETH"]),
            a_tier: list(&[
                "BNB", "SOL", "XRP", "ADA", "AVAX", "LINK", "DOT", "TRX", "TON", "LTC", "ATOM", "NEAR",
                "MATIC", "POL",
            ]),
            c_patterns: list(&["DOGE", "SHIB", "PEPE", "FLOKI", "BONK", "WIF", "MEME", "INU", "BABY", "1000"]),
            stop_multipliers: TierValues { s: 2.5, a: 2.0, b: 1.5, c: 1.0 },
            max_allocation_pct: TierValues { s: 100.0, a: 80.0, b: 60.0, c: 30.0 },
        }
    }
}

impl TierTable {
    /// S and A lists win over everything; then the speculative flag or a C
    /// pattern; everything else is B.
    pub fn classify(&self, symbol: &str, is_speculative: bool) -> FundamentalTier {
        let base = base_asset(symbol);
        let listed = |list: &[String]| list.iter().any(|s| s.eq_ignore_ascii_case(&base));

        if listed(&self.s_tier) {
            FundamentalTier::S
        } else if listed(&self.a_tier) {
            FundamentalTier::A
        } else if is_speculative
            || self
                .c_patterns
                .iter()
                .any(|p| base.contains(&p.to_ascii_uppercase()))
        {
            FundamentalTier::C
        } else {
            FundamentalTier::B
        }
    }

    pub fn stop_multiplier(&self, tier: FundamentalTier) -> f64 {
        self.stop_multipliers.get(tier)
    }

    pub fn max_allocation_pct(&self, tier: FundamentalTier) -> f64 {
        self.max_allocation_pct.get(tier)
    }
}

/// `"btcusdt"` → `"BTC"`.
fn base_asset(symbol: &str) -> String {
    let upper = symbol.trim().to_ascii_uppercase();
    QUOTE_ASSETS
        .iter()
        .find_map(|q| upper.strip_suffix(q).filter(|b| !b.is_empty()))
        .unwrap_or(upper.as_str())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_list() {
        let table = TierTable::default();
        assert_eq!(table.classify("BTCUSDT", false), FundamentalTier::S);
        assert_eq!(table.classify("solusdc", false), FundamentalTier::A);
        assert_eq!(table.classify("1000PEPEUSDT", false), FundamentalTier::C);
        assert_eq!(table.classify("ARBUSDT", false), FundamentalTier::B);
    }

    #[test]
    fn speculative_flag_demotes_unlisted_only() {
        let table = TierTable::default();
        assert_eq!(table.classify("ARBUSDT", true), FundamentalTier::C);
        assert_eq!(table.classify("ETHUSDT", true), FundamentalTier::S);
    }

    #[test]
    fn s_tier_stops_are_wider_than_c_tier() {
        let table = TierTable::default();
        assert!(table.stop_multiplier(FundamentalTier::S) > table.stop_multiplier(FundamentalTier::C));
        assert_eq!(table.max_allocation_pct(FundamentalTier::C), 30.0);
    }

    #[test]
    fn quote_suffix_is_stripped() {
        assert_eq!(base_asset("ethfdusd"), "ETH");
        assert_eq!(base_asset("USDT"), "USDT");
    }
}
