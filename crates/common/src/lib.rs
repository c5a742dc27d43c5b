//! Shared infrastructure for the LTZF admin client crates.
//!
//! Two concerns live here:
//! - `cache`: the process-wide response cache with TTL expiry and a
//!   subscribe/notify layer, shared by every dispatched request
//! - `time`: a clock abstraction so TTL behavior is testable without
//!   sleeping

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod cache;
pub mod time;

pub use cache::{CacheConfig, CacheStats, ResponseCache, SubscriptionId};
pub use time::{Clock, MockClock, SystemClock};
