pub mod rest;

pub use rest::{BinanceCandleSource, DEFAULT_BASE_URL};
