//! Trade history messages

use std::str::FromStr;

use rust_decimal::Decimal;
use time::OffsetDateTime;

use super::Pair;

/// Individual trade, formatted for the history list
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub pair: Pair,
    /// Exchange trade id. Monotonic, but may repeat or go backwards across
    /// reconnects.
    pub id: u64,
    pub price: String,
    pub size: String,
    pub time: OffsetDateTime,
}

impl Trade {
    /// Trade that only identifies a history row by id
    pub fn placeholder(pair: Pair, id: u64) -> Self {
        Self {
            pair,
            id,
            price: String::new(),
            size: String::new(),
            time: OffsetDateTime::UNIX_EPOCH,
        }
    }

    /// Parse the display price, if it is numeric
    pub fn price_decimal(&self) -> Option<Decimal> {
        Decimal::from_str(&self.price).ok()
    }

    /// Direction of this trade relative to the previous price
    pub fn tick_against(&self, previous: Decimal) -> Tick {
        match self.price_decimal() {
            Some(price) if price > previous => Tick::Up,
            Some(price) if price < previous => Tick::Down,
            _ => Tick::Unchanged,
        }
    }
}

/// Price movement of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Up,
    Down,
    Unchanged,
}

/// Kind of history update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryUpdKind {
    /// New trade to add to the history list
    HistoryUpd,
    /// Remove the highlight from the row with this trade id
    HistoryHighlightUpd,
}

/// Update for the trade history list
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryUpdMsg {
    pub kind: HistoryUpdKind,
    pub trade: Trade,
}

impl HistoryUpdMsg {
    pub fn trade(trade: Trade) -> Self {
        Self {
            kind: HistoryUpdKind::HistoryUpd,
            trade,
        }
    }

    pub fn clear_highlight(pair: Pair, id: u64) -> Self {
        Self {
            kind: HistoryUpdKind::HistoryHighlightUpd,
            trade: Trade::placeholder(pair, id),
        }
    }
}
