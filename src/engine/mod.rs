//! Betting engine: odds normalization, market bridging, value evaluation,
//! stake sizing and the sequential queue worker.

pub mod bridge;
pub mod devig;
pub mod evaluate;
pub mod mappings;
pub mod stake;
pub mod worker;

pub use worker::{BotSession, SessionStatus};
