//! PropDesk: Prop-Firm Trading Risk Control Engine
//!
//! This is the root crate that provides benchmark access to the internal modules.
//! For actual functionality, use the individual crates directly:
//!
//! - `prop-core`: Domain types, firm rule catalog, configuration, storage
//! - `risk-engine`: Position sizing, circuit breaker, mistake detection, alerts
//! - `risk-monitor`: Scheduled circuit-breaker sweep binary
//! - `risk-api`: REST API server with OpenAPI docs

// Re-export for benchmarks
pub use prop_core as core;
pub use risk_engine as engine;
