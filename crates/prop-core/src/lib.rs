//! PropDesk Core Library
//!
//! Shared domain types, the prop-firm rule catalog, and the storage layer for
//! the PropDesk trading risk engine.

pub mod config;
pub mod db;
pub mod error;
pub mod rules;
pub mod store;
pub mod types;

pub use error::{Error, Result};
