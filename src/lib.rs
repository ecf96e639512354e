//! Floodgate - Per-Key Admission Control
//!
//! This crate implements an in-process, per-key rate limiting engine with
//! two interchangeable admission-control algorithms — sliding-window
//! counting and token-bucket — constructed through a validating factory
//! and exposed behind a single polymorphic contract. A named-limiter
//! registry lets calling code throttle against configured limiter names
//! instead of holding instances itself.

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LimiterConfig, LimiterKind, RegistryConfig};
pub use error::{FloodgateError, Result};
pub use ratelimit::Limiter;
pub use registry::LimiterRegistry;
