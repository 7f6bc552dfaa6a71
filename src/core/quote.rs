//! Quote update messages
//!
//! Quotes arrive already formatted for display; the routers only look at
//! the pair and the update kind.

use super::Pair;

/// Exchange a price quote comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeId {
    Coinbase,
    Bitfinex,
    HitBtc,
}

impl ExchangeId {
    /// Lowercase name for logging
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Coinbase => "coinbase",
            Self::Bitfinex => "bitfinex",
            Self::HitBtc => "hitbtc",
        }
    }
}

/// Quote data for one pair, kept as display strings
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub exchange: Option<ExchangeId>,
    pub pair: Pair,
    pub price: String,
    pub change: String,
    pub change_perc: String,
    pub size: String,
    pub bid: String,
    pub ask: String,
    pub low: String,
    pub high: String,
    pub open: String,
    pub volume: String,
}

impl Quote {
    /// Quote carrying only the pair identity
    ///
    /// Used for Flash events, where the consumer needs nothing but the key.
    pub fn for_pair(pair: Pair) -> Self {
        Self {
            exchange: None,
            pair,
            price: String::new(),
            change: String::new(),
            change_perc: String::new(),
            size: String::new(),
            bid: String::new(),
            ask: String::new(),
            low: String::new(),
            high: String::new(),
            open: String::new(),
            volume: String::new(),
        }
    }
}

/// How the consumer should apply an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// Snapshot from a REST call, applied by the consumer directly
    Init,
    /// A trade occurred; highlights the price and resets the debounce
    Trade,
    /// Non-trade field update; no effect on highlight state
    Ticker,
    /// Synthetic: clear the highlight for this pair
    Flash,
}

/// Quote update routed from producers to the consumer
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateMsg {
    pub quote: Quote,
    pub kind: UpdateKind,
}

impl UpdateMsg {
    pub fn new(quote: Quote, kind: UpdateKind) -> Self {
        Self { quote, kind }
    }

    /// Synthetic highlight-clear for `pair`
    pub fn flash(pair: Pair) -> Self {
        Self {
            quote: Quote::for_pair(pair),
            kind: UpdateKind::Flash,
        }
    }

    /// Routing key
    #[inline]
    pub fn pair(&self) -> &Pair {
        &self.quote.pair
    }
}
