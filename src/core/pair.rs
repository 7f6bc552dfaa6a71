//! Currency pair routing key
//!
//! A pair is stored normalized (uppercase) so that equality and hashing
//! ignore the casing used by whichever exchange produced it.

use std::fmt;
use std::str::FromStr;

use crate::RouterError;

/// Crypto instrument with a base currency and a quote currency
///
/// The base currency is listed first (BTC in BTC/USD).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair {
    base: String,
    quote: String,
}

impl Pair {
    /// Create a new pair with both currencies uppercased
    pub fn new(base: &str, quote: &str) -> Self {
        Self {
            base: base.trim().to_uppercase(),
            quote: quote.trim().to_uppercase(),
        }
    }

    /// Base currency (BTC in BTC/USD)
    #[inline]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote currency (USD in BTC/USD)
    #[inline]
    pub fn quote_currency(&self) -> &str {
        &self.quote
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Pair {
    type Err = RouterError;

    /// Parse `"BASE/QUOTE"` in any casing
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None)
                if !base.trim().is_empty() && !quote.trim().is_empty() =>
            {
                Ok(Self::new(base, quote))
            }
            _ => Err(RouterError::InvalidPair(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_normalizes_case() {
        let pair = Pair::new("btc", "Usd");
        assert_eq!(pair.base(), "BTC");
        assert_eq!(pair.quote_currency(), "USD");
        assert_eq!(pair, Pair::new("BTC", "USD"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Pair::new("eth", "btc").to_string(), "ETH/BTC");
    }

    #[test]
    fn test_parse() {
        let pair: Pair = "ltc/usd".parse().unwrap();
        assert_eq!(pair, Pair::new("LTC", "USD"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("BTCUSD".parse::<Pair>().is_err());
        assert!("BTC/".parse::<Pair>().is_err());
        assert!("/USD".parse::<Pair>().is_err());
        assert!("BTC/USD/EUR".parse::<Pair>().is_err());
    }

    proptest! {
        #[test]
        fn prop_equality_ignores_case(base in "[a-zA-Z]{2,6}", quote in "[a-zA-Z]{2,6}") {
            let lower = Pair::new(&base.to_lowercase(), &quote.to_lowercase());
            let upper = Pair::new(&base.to_uppercase(), &quote.to_uppercase());
            prop_assert_eq!(&lower, &upper);

            let parsed: Pair = lower.to_string().parse().unwrap();
            prop_assert_eq!(parsed, upper);
        }
    }
}
