use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use common::{Candle, CandleSource, Error, Interval, Result, Side};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

const KLINE_LIMIT: usize = 500;
const DEPTH_LIMIT: usize = 100;
const MAX_ATTEMPTS: u32 = 3;
/// A depth level must hold this multiple of the mean level size to count as a wall.
const WALL_FACTOR: f64 = 3.0;

/// Public-market-data client for Binance spot. No API key required.
pub struct BinanceCandleSource {
    base_url: String,
    http: Client,
}

impl BinanceCandleSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// GET with exponential backoff on transport errors and 5xx responses.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &str) -> Result<T> {
        let url = format!("{}{path}?{query}", self.base_url);
        let mut backoff = Duration::from_millis(250);
        let mut attempt = 1;

        loop {
            let result = self.http.get(&url).send().await;
            let retryable = match result {
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
                    if status.is_success() {
                        return Ok(serde_json::from_str(&body)?);
                    }
                    if !status.is_server_error() {
                        return Err(Error::Exchange(format!("HTTP {status}: {body}")));
                    }
                    Error::Exchange(format!("HTTP {status}: {body}"))
                }
                Err(e) => Error::Http(e.to_string()),
            };

            if attempt >= MAX_ATTEMPTS {
                return Err(retryable);
            }
            warn!(path, attempt, error = %retryable, backoff = ?backoff, "Binance request failed, retrying");
            tokio::time::sleep(backoff).await;
            backoff *= 2;
            attempt += 1;
        }
    }
}

#[async_trait]
impl CandleSource for BinanceCandleSource {
    async fn fetch_candles(&self, symbol: &str, interval: Interval) -> Result<Vec<Candle>> {
        let rows: Vec<Vec<Value>> = self
            .get_json(
                "/api/v3/klines",
                &format!("symbol={symbol}&interval={interval}&limit={KLINE_LIMIT}"),
            )
            .await?;
        let now_ms = Utc::now().timestamp_millis();
        let candles = parse_klines(&rows, now_ms)?;
        debug!(symbol, %interval, count = candles.len(), "Fetched klines");
        Ok(candles)
    }

    async fn current_price(&self, symbol: &str) -> Result<f64> {
        let ticker: PriceTicker = self
            .get_json("/api/v3/ticker/price", &format!("symbol={symbol}"))
            .await?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|e| Error::Exchange(format!("bad ticker price '{}': {e}", ticker.price)))
    }

    async fn order_book_wall(&self, symbol: &str, side: Side) -> Result<Option<f64>> {
        let depth: DepthResponse = self
            .get_json("/api/v3/depth", &format!("symbol={symbol}&limit={DEPTH_LIMIT}"))
            .await?;
        // Resistance to a long sits in the asks; to a short, in the bids.
        let levels = match side {
            Side::Long => &depth.asks,
            Side::Short => &depth.bids,
        };
        Ok(largest_wall(levels))
    }
}

/// Closed klines only; the still-forming bar (close time in the future) is
/// dropped. Timestamps are bar close times.
fn parse_klines(rows: &[Vec<Value>], now_ms: i64) -> Result<Vec<Candle>> {
    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        let close_ms = row
            .get(6)
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::Exchange("kline missing close time".into()))?;
        if close_ms >= now_ms {
            continue;
        }
        let field = |i: usize, name: &str| -> Result<f64> {
            row.get(i)
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| Error::Exchange(format!("kline field '{name}' malformed")))
        };
        let timestamp = Utc
            .timestamp_millis_opt(close_ms)
            .single()
            .ok_or_else(|| Error::Exchange(format!("kline close time {close_ms} out of range")))?;
        candles.push(Candle {
            open: field(1, "open")?,
            high: field(2, "high")?,
            low: field(3, "low")?,
            close: field(4, "close")?,
            volume: field(5, "volume")?,
            timestamp,
        });
    }
    Ok(candles)
}

fn largest_wall(levels: &[(String, String)]) -> Option<f64> {
    let parsed: Vec<(f64, f64)> = levels
        .iter()
        .filter_map(|(p, q)| Some((p.parse().ok()?, q.parse().ok()?)))
        .collect();
    if parsed.is_empty() {
        return None;
    }
    let mean = parsed.iter().map(|(_, q)| q).sum::<f64>() / parsed.len() as f64;
    parsed
        .into_iter()
        .filter(|&(_, q)| q >= mean * WALL_FACTOR)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(price, _)| price)
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PriceTicker {
    price: String,
}

#[derive(Deserialize)]
struct DepthResponse {
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const KLINES: &str = r#"[
        [1704067200000, "42000.1", "42100.0", "41950.5", "42050.0", "12.5", 1704070799999, "0", 100, "0", "0", "0"],
        [1704070800000, "42050.0", "42200.0", "42000.0", "42150.0", "8.25", 1704074399999, "0", 80, "0", "0", "0"]
    ]"#;

    #[test]
    fn parses_closed_klines() {
        let rows: Vec<Vec<Value>> = serde_json::from_str(KLINES).unwrap();
        let candles = parse_klines(&rows, 1_704_080_000_000).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 42000.1);
        assert_eq!(candles[1].volume, 8.25);
        assert_eq!(candles[1].timestamp.timestamp_millis(), 1_704_074_399_999);
    }

    #[test]
    fn drops_forming_bar() {
        let rows: Vec<Vec<Value>> = serde_json::from_str(KLINES).unwrap();
        let candles = parse_klines(&rows, 1_704_072_000_000).unwrap();
        assert_eq!(candles.len(), 1);
    }

    #[test]
    fn malformed_field_is_an_error() {
        let rows: Vec<Vec<Value>> =
            serde_json::from_str(r#"[[0, "x", "1", "1", "1", "1", 1, "0", 1, "0", "0", "0"]]"#).unwrap();
        assert!(matches!(parse_klines(&rows, 10), Err(Error::Exchange(_))));
    }

    #[test]
    fn wall_needs_outsized_level() {
        let level = |p: &str, q: &str| (p.to_string(), q.to_string());
        let flat = vec![level("100", "1"), level("101", "1.2"), level("102", "0.9")];
        assert_eq!(largest_wall(&flat), None);

        let mut walled = flat;
        walled.extend((0..6).map(|i| level(&format!("10{}", i + 3), "1")));
        walled.push(level("110", "40"));
        assert_eq!(largest_wall(&walled), Some(110.0));
    }
}
