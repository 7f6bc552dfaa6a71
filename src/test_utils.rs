//! Test helpers for building pairs, updates and trades

use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::core::{ExchangeId, Pair, Quote, Trade, UpdateKind, UpdateMsg};

pub fn btc_usd() -> Pair {
    Pair::new("BTC", "USD")
}

pub fn eth_usd() -> Pair {
    Pair::new("ETH", "USD")
}

fn quote(pair: Pair, price: &str) -> Quote {
    let mut quote = Quote::for_pair(pair);
    quote.exchange = Some(ExchangeId::HitBtc);
    quote.price = price.to_string();
    quote
}

pub fn trade_update(pair: Pair, price: &str) -> UpdateMsg {
    UpdateMsg::new(quote(pair, price), UpdateKind::Trade)
}

pub fn ticker_update(pair: Pair, price: &str) -> UpdateMsg {
    UpdateMsg::new(quote(pair, price), UpdateKind::Ticker)
}

pub fn trade(pair: Pair, id: u64) -> Trade {
    Trade {
        pair,
        id,
        price: "6500.00".to_string(),
        size: "0.01".to_string(),
        time: OffsetDateTime::UNIX_EPOCH,
    }
}

/// Everything currently buffered in `rx`, without waiting
pub fn drain<T>(rx: &mut mpsc::Receiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}
