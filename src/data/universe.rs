//! # Asset Universe
//!
//! $$
//! \mathcal{U} = \{a : a \in \operatorname{dom}(\text{ticker} \mapsto \text{CIK})\}
//! $$
//!
//! Set of tradable tickers taken from a ticker to CIK reference mapping. Only used
//! to validate and restrict requested tickers before retrieval.

use std::collections::BTreeMap;

use anyhow::bail;
use anyhow::Result;
use tracing::warn;

#[derive(Clone, Debug, Default)]
pub struct AssetUniverse {
  ticker_to_cik: BTreeMap<String, String>,
}

fn normalize(ticker: &str) -> String {
  ticker.trim().to_uppercase()
}

impl AssetUniverse {
  pub fn from_pairs<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
  {
    Self {
      ticker_to_cik: pairs
        .into_iter()
        .map(|(k, v)| (normalize(k.as_ref()), v.into()))
        .collect(),
    }
  }

  /// Parse `ticker,cik` lines. A leading header row and blank lines are ignored.
  pub fn from_csv_str(text: &str) -> Result<Self> {
    let mut ticker_to_cik = BTreeMap::new();

    for (lineno, line) in text.lines().enumerate() {
      let line = line.trim();
      if line.is_empty() {
        continue;
      }

      let Some((ticker, cik)) = line.split_once(',') else {
        bail!("line {}: expected 'ticker,cik', got '{line}'", lineno + 1);
      };
      let (ticker, cik) = (ticker.trim(), cik.trim());
      if lineno == 0 && ticker.eq_ignore_ascii_case("ticker") {
        continue;
      }
      if ticker.is_empty() || cik.is_empty() {
        bail!("line {}: empty ticker or cik", lineno + 1);
      }

      ticker_to_cik.insert(normalize(ticker), cik.to_string());
    }

    Ok(Self { ticker_to_cik })
  }

  pub fn len(&self) -> usize {
    self.ticker_to_cik.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ticker_to_cik.is_empty()
  }

  pub fn contains(&self, ticker: &str) -> bool {
    self.ticker_to_cik.contains_key(&normalize(ticker))
  }

  pub fn cik(&self, ticker: &str) -> Option<&str> {
    self.ticker_to_cik.get(&normalize(ticker)).map(String::as_str)
  }

  pub fn tickers(&self) -> impl Iterator<Item = &str> {
    self.ticker_to_cik.keys().map(String::as_str)
  }

  /// Keep the requested tickers that belong to the universe, in request order.
  pub fn restrict<T: AsRef<str>>(&self, tickers: &[T]) -> Vec<String> {
    let mut kept = Vec::with_capacity(tickers.len());
    for ticker in tickers {
      let ticker = normalize(ticker.as_ref());
      if !self.ticker_to_cik.contains_key(&ticker) {
        warn!(ticker = %ticker, "ticker not in universe, skipping");
        continue;
      }
      if !kept.contains(&ticker) {
        kept.push(ticker);
      }
    }
    kept
  }
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use super::*;

  #[test]
  #[traced_test]
  fn restrict_drops_unknown_tickers() {
    let universe = AssetUniverse::from_pairs([("AAPL", "0000320193"), ("MSFT", "0000789019")]);

    let kept = universe.restrict(&["msft", "XXXX", "AAPL", "MSFT"]);
    assert_eq!(kept, vec!["MSFT".to_string(), "AAPL".to_string()]);
    assert!(logs_contain("XXXX"));
  }

  #[test]
  fn parses_mapping_csv() {
    let universe = AssetUniverse::from_csv_str("ticker,cik\nAAPL,0000320193\n\n nvda , 0001045810\n").unwrap();

    assert_eq!(universe.len(), 2);
    assert_eq!(universe.cik("NVDA"), Some("0001045810"));
    assert!(universe.contains("aapl"));
    assert_eq!(universe.tickers().collect::<Vec<_>>(), vec!["AAPL", "NVDA"]);
  }

  #[test]
  fn malformed_mapping_line_is_rejected() {
    assert!(AssetUniverse::from_csv_str("AAPL 0000320193").is_err());
    assert!(AssetUniverse::from_csv_str("AAPL,").is_err());
  }
}
