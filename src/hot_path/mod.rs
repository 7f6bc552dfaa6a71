//! Routing path - every update passes through here
//!
//! This module contains the routing automata:
//! - Quote routing with per-pair debounce lanes
//! - Trade history filtering with delayed highlight clears

pub mod history;
pub mod lane;
pub mod routing;

pub use history::{HistoryFilter, HistoryRouter, Verdict};
pub use lane::{Debounce, LaneState, TimerOutcome};
pub use routing::{LaneTable, QuoteRouter};
