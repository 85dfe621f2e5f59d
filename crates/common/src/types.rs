use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One closed OHLCV bar. Series are always ordered oldest → newest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// True when every price field is finite and the bar is internally consistent.
    pub fn is_well_formed(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
            && self.high >= self.low
            && self.volume >= 0.0
    }
}

/// Candle interval understood by candle sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M15 => "15m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Interval {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "15m" => Ok(Interval::M15),
            "1h" => Ok(Interval::H1),
            "4h" => Ok(Interval::H4),
            "1d" => Ok(Interval::D1),
            other => Err(crate::Error::Config(format!("unsupported interval '{other}'"))),
        }
    }
}

/// Side of a trade opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for LONG, -1 for SHORT. Multiplies price offsets in the trade direction.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Directional output of a single strategy runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Long,
    Short,
    Neutral,
}

impl Signal {
    pub fn side(&self) -> Option<Side> {
        match self {
            Signal::Long => Some(Side::Long),
            Signal::Short => Some(Side::Short),
            Signal::Neutral => None,
        }
    }
}

impl From<Side> for Signal {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => Signal::Long,
            Side::Short => Signal::Short,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Long => write!(f, "LONG"),
            Signal::Short => write!(f, "SHORT"),
            Signal::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Coarse market-state classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Trending,
    Ranging,
    Volatile,
    Extreme,
}

impl Regime {
    pub const ALL: [Regime; 4] = [
        Regime::Trending,
        Regime::Ranging,
        Regime::Volatile,
        Regime::Extreme,
    ];
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Regime::Trending => write!(f, "TRENDING"),
            Regime::Ranging => write!(f, "RANGING"),
            Regime::Volatile => write!(f, "VOLATILE"),
            Regime::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// Static fundamental-quality classification of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundamentalTier {
    S,
    A,
    B,
    C,
}

impl std::fmt::Display for FundamentalTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FundamentalTier::S => write!(f, "S"),
            FundamentalTier::A => write!(f, "A"),
            FundamentalTier::B => write!(f, "B"),
            FundamentalTier::C => write!(f, "C"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskType {
    Normal,
    Volatility,
    Manipulation,
}

impl std::fmt::Display for RiskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskType::Normal => write!(f, "NORMAL"),
            RiskType::Volatility => write!(f, "VOLATILITY"),
            RiskType::Manipulation => write!(f, "MANIPULATION"),
        }
    }
}

/// Global market-risk flag, computed once per scan cycle from the reference
/// asset and shared read-only with every per-asset evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRisk {
    pub level: RiskLevel,
    pub note: String,
    pub risk_type: RiskType,
}

impl MarketRisk {
    pub fn normal() -> Self {
        Self {
            level: RiskLevel::Low,
            note: "Market conditions normal".to_string(),
            risk_type: RiskType::Normal,
        }
    }
}

/// Regime of the reference asset as seen by the macro layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum MacroRegime {
    Bull,
    Bear,
    #[default]
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum DominanceTrend {
    Rising,
    Falling,
    #[default]
    Flat,
}

/// Optional macro snapshot. Only ever scales final scores, never inverts them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MacroContext {
    pub reference_regime: MacroRegime,
    pub dominance_trend: DominanceTrend,
    pub stablecoin_dominance_trend: DominanceTrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryZone {
    pub low: f64,
    pub high: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfits {
    pub tp1: f64,
    pub tp2: f64,
    pub tp3: f64,
}

/// One rung of the DCA ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcaEntry {
    pub price: f64,
    /// Share of the total position in percent.
    pub allocation_pct: f64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeProfitLevel {
    pub price: f64,
    /// Fraction of the position closed at this level (0..1).
    pub exit_fraction: f64,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopSource {
    AtrTier,
    HarmonicStructure,
}

/// Three-entry laddered execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcaPlan {
    pub side: Side,
    pub entries: [DcaEntry; 3],
    pub average_entry: f64,
    pub stop_loss: f64,
    pub stop_source: StopSource,
    pub take_profits: [TakeProfitLevel; 3],
    pub reward_risk: f64,
    pub red_flags: Vec<String>,
}

impl DcaPlan {
    pub fn entry_zone(&self) -> EntryZone {
        let prices = self.entries.iter().map(|e| e.price);
        EntryZone {
            low: prices.clone().fold(f64::INFINITY, f64::min),
            high: prices.fold(f64::NEG_INFINITY, f64::max),
        }
    }

    pub fn targets(&self) -> TakeProfits {
        TakeProfits {
            tp1: self.take_profits[0].price,
            tp2: self.take_profits[1].price,
            tp3: self.take_profits[2].price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityMetrics {
    pub regime: Regime,
    pub strategy: String,
    pub tier: FundamentalTier,
    pub detection_price: f64,
    pub rsi: f64,
    pub adx: f64,
    pub rvol: f64,
    pub atr: f64,
    pub z_score: f64,
    pub reward_risk: f64,
}

/// Terminal artifact of a scan: created once per qualifying asset per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    pub symbol: String,
    pub side: Side,
    pub confidence_score: f64,
    pub entry_zone: EntryZone,
    pub stop_loss: f64,
    pub take_profits: TakeProfits,
    pub dca_plan: DcaPlan,
    pub metrics: OpportunityMetrics,
    pub technical_reasoning: String,
    /// Close time of the candle the opportunity was detected on.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_round_trips_through_str() {
        for s in ["15m", "1h", "4h", "1d"] {
            let interval: Interval = s.parse().unwrap();
            assert_eq!(interval.as_str(), s);
        }
        assert!("3w".parse::<Interval>().is_err());
    }

    #[test]
    fn side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Long).unwrap(), "\"LONG\"");
        assert_eq!(serde_json::to_string(&RiskType::Manipulation).unwrap(), "\"MANIPULATION\"");
    }

    #[test]
    fn side_converts_to_matching_signal() {
        for side in [Side::Long, Side::Short] {
            assert_eq!(Signal::from(side).side(), Some(side));
        }
    }

    #[test]
    fn malformed_candle_is_detected() {
        let c = Candle {
            open: 1.0,
            high: 0.5,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
            timestamp: Utc::now(),
        };
        assert!(!c.is_well_formed());
    }
}
