//! Core domain types for the PropDesk risk engine.

pub mod account;
pub mod audit;
pub mod mistake;
pub mod trade;

pub use account::*;
pub use audit::*;
pub use mistake::*;
pub use trade::*;
