//! Turnstile - in-process admission control
//!
//! Admits or rejects each unit of work for a caller identity, enforcing a
//! service-wide quota and a per-identity quota over a sliding window. State
//! lives in memory and is scoped to a single process.

pub mod admission;
pub mod config;
pub mod error;
pub mod grpc;
