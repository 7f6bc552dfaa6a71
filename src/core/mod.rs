//! Core message types shared by producers, routers and the consumer
//!
//! - Pair: normalized routing key
//! - Quote / UpdateMsg: watchlist updates
//! - Trade / HistoryUpdMsg: trade history updates

pub mod pair;
pub mod quote;
pub mod trade;

pub use pair::Pair;
pub use quote::{ExchangeId, Quote, UpdateKind, UpdateMsg};
pub use trade::{HistoryUpdKind, HistoryUpdMsg, Tick, Trade};
