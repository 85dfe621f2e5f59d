use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Insufficient data for {symbol}: have {have} candles, need {need}")]
    InsufficientData {
        symbol: String,
        have: usize,
        need: usize,
    },

    /// The scan cycle could not run at all (e.g. reference asset unreachable).
    /// Distinct from an empty opportunity list.
    #[error("Data source unavailable: {0}")]
    DataSourceUnavailable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<Vec<u64>> {
        Ok(serde_json::from_str(body)?)
    }

    #[test]
    fn malformed_body_surfaces_as_json_error() {
        assert!(matches!(parse("[1, 2"), Err(Error::Json(_))));
        assert_eq!(parse("[1, 2]").unwrap(), vec![1, 2]);
    }

    #[test]
    fn insufficient_data_names_the_symbol() {
        let e = Error::InsufficientData {
            symbol: "ARBUSDT".into(),
            have: 120,
            need: 200,
        };
        assert_eq!(e.to_string(), "Insufficient data for ARBUSDT: have 120 candles, need 200");
    }
}
