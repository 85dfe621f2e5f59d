pub mod analyzer;
pub mod binance;
pub mod pipeline;
pub mod ranker;
pub mod scanner;
pub mod service;

pub use analyzer::{Analysis, MarketEnrichment};
pub use binance::BinanceCandleSource;
pub use pipeline::{Pipeline, PipelineConfig};
pub use ranker::{Candidate, HigherTimeframe, OpportunityRanker, RankerConfig};
pub use scanner::{derive_macro_context, CycleContext, ScanReport, ScanSettings, Scanner};
pub use service::{ScanCommand, ScanHandle, ScanResult, ScanService, ServiceState};
