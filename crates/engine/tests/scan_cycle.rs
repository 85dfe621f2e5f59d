use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};

use common::{Candle, CandleSource, Error, Interval, Result, Side};
use engine::{Pipeline, PipelineConfig, ScanResult, ScanService, ScanSettings, Scanner};

const REFERENCE: &str = "BTCUSDT";

fn uptrend(n: usize, start: f64) -> Vec<Candle> {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = start + i as f64;
            Candle {
                open: close - 0.5,
                high: close + 0.25,
                low: close - 0.75,
                close,
                volume: 1_000.0,
                timestamp: t0 + ChronoDuration::hours(i as i64),
            }
        })
        .collect()
}

#[derive(Default)]
struct MockSource {
    candles: HashMap<String, Vec<Candle>>,
    prices: HashMap<String, f64>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    reference_fetches: AtomicUsize,
}

impl MockSource {
    fn with(mut self, symbol: &str, candles: Vec<Candle>) -> Self {
        if let Some(last) = candles.last() {
            self.prices.insert(symbol.to_string(), last.close);
        }
        self.candles.insert(symbol.to_string(), candles);
        self
    }

    fn failing(mut self, symbol: &str) -> Self {
        self.failing.insert(symbol.to_string());
        self
    }
}

#[async_trait]
impl CandleSource for MockSource {
    async fn fetch_candles(&self, symbol: &str, _interval: Interval) -> Result<Vec<Candle>> {
        if symbol == REFERENCE {
            self.reference_fetches.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(symbol) {
            return Err(Error::Http(format!("connection reset fetching {symbol}")));
        }
        self.candles
            .get(symbol)
            .cloned()
            .ok_or_else(|| Error::Exchange(format!("unknown symbol {symbol}")))
    }

    async fn current_price(&self, symbol: &str) -> Result<f64> {
        self.prices
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::Exchange(format!("no ticker for {symbol}")))
    }

    async fn order_book_wall(&self, _symbol: &str, _side: Side) -> Result<Option<f64>> {
        Err(Error::Http("depth endpoint down".into()))
    }
}

/// Defaults everywhere except the ranker floor, so the synthetic trend is
/// judged on staleness and failures alone.
fn lenient_pipeline() -> Arc<Pipeline> {
    let cfg = PipelineConfig::from_toml_str(
        r#"
        [ranker]
        min_score = 0.0
        min_reward_risk = 0.0
        "#,
    )
    .unwrap();
    Arc::new(Pipeline::from_config(cfg).unwrap())
}

fn settings(symbols: &[&str]) -> ScanSettings {
    ScanSettings {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        reference_symbol: REFERENCE.to_string(),
        interval: Interval::H4,
    }
}

#[tokio::test]
async fn unreachable_reference_fails_the_cycle() {
    let source = MockSource::default()
        .with("ARBUSDT", uptrend(300, 100.0))
        .failing(REFERENCE);
    let scanner = Scanner::new(Arc::new(source), lenient_pipeline(), settings(&["ARBUSDT"]));

    let err = scanner.run_cycle(1).await.unwrap_err();
    assert!(matches!(err, Error::DataSourceUnavailable(_)), "got {err}");
}

#[tokio::test]
async fn failing_and_short_assets_are_excluded() {
    let source = MockSource::default()
        .with(REFERENCE, uptrend(300, 40_000.0))
        .with("ARBUSDT", uptrend(300, 100.0))
        .with("NEWUSDT", uptrend(120, 5.0))
        .failing("BADUSDT");
    let scanner = Scanner::new(
        Arc::new(source),
        lenient_pipeline(),
        settings(&["ARBUSDT", "BADUSDT", "NEWUSDT"]),
    );

    let report = scanner.run_cycle(7).await.unwrap();
    assert_eq!(report.cycle_id, 7);
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.opportunities.len(), 1);

    let opp = &report.opportunities[0];
    assert_eq!(opp.symbol, "ARBUSDT");
    assert_eq!(opp.side, Side::Long);
    assert_eq!(opp.timestamp, uptrend(300, 100.0)[299].timestamp);
    let sizes: f64 = opp.dca_plan.entries.iter().map(|e| e.allocation_pct).sum();
    assert!((sizes - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn six_percent_drift_removes_the_opportunity() {
    let candles = uptrend(300, 100.0);
    let last = candles[299].close;
    let mut source = MockSource::default()
        .with(REFERENCE, uptrend(300, 40_000.0))
        .with("ARBUSDT", candles);
    source.prices.insert("ARBUSDT".into(), last * 1.06);

    let scanner = Scanner::new(Arc::new(source), lenient_pipeline(), settings(&["ARBUSDT"]));
    let report = scanner.run_cycle(1).await.unwrap();
    assert_eq!(report.evaluated, 1);
    assert!(report.opportunities.is_empty());
}

#[tokio::test]
async fn identical_inputs_rank_identically() {
    let source = Arc::new(
        MockSource::default()
            .with(REFERENCE, uptrend(300, 40_000.0))
            .with("ARBUSDT", uptrend(300, 100.0))
            .with("OPUSDT", uptrend(300, 50.0)),
    );
    let scanner = Scanner::new(source, lenient_pipeline(), settings(&["ARBUSDT", "OPUSDT"]));
    let a = scanner.run_cycle(1).await.unwrap();
    let b = scanner.run_cycle(2).await.unwrap();
    assert_eq!(a.opportunities, b.opportunities);
    assert_eq!(a.market_risk, b.market_risk);
}

#[tokio::test]
async fn requests_during_a_scan_coalesce_into_one_follow_up() {
    let source = Arc::new(MockSource {
        delay: Some(Duration::from_millis(50)),
        ..MockSource::default()
            .with(REFERENCE, uptrend(300, 40_000.0))
            .with("ARBUSDT", uptrend(300, 100.0))
    });
    let scanner = Scanner::new(source.clone(), lenient_pipeline(), settings(&["ARBUSDT"]));
    let (service, handle) = ScanService::new(scanner);
    tokio::spawn(service.run());

    for _ in 0..3 {
        handle.request_scan().await;
    }

    let mut results = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(ScanResult::Completed(report)) = results.borrow_and_update().clone() {
                if report.cycle_id == 2 {
                    break;
                }
            }
            results.changed().await.unwrap();
        }
    })
    .await
    .expect("second cycle never published");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(source.reference_fetches.load(Ordering::SeqCst), 2);

    handle.shutdown().await;
}
