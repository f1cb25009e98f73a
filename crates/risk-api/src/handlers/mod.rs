//! HTTP request handlers.

pub mod breaker;
pub mod health;
pub mod mistakes;
pub mod rules;
pub mod sizing;
