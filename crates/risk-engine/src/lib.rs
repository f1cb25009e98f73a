//! Risk Engine
//!
//! Position sizing, the daily circuit breaker, and behavioral mistake
//! detection for prop-firm trading accounts.

pub mod alerts;
pub mod circuit_breaker;
pub mod engine;
pub mod mistake_detector;
pub mod position_sizer;

pub use alerts::{
    AlertDispatcher, AlertKind, AlertMessage, AlertOutbox, PushAlerter, RecordingAlerter,
};
pub use circuit_breaker::{BreakerDecision, BreakerEffect, CircuitBreakerResult};
pub use engine::{RiskEngine, SizeRequest};
pub use mistake_detector::{DetectorConfig, DetectorSettings};
pub use position_sizer::RiskComputation;
