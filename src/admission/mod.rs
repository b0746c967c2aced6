//! Admission control over global and per-identity sliding windows.

mod controller;
mod decision;
mod eviction;
mod identity;
mod window;

pub use controller::{AdmissionController, DEFAULT_WINDOW, GLOBAL_LIMIT, SCOPE_LIMIT};
pub use decision::{Decision, QuotaUsage, Rejection, Scope, StatusReport, ThrottleDetail};
pub use eviction::spawn_idle_eviction;
pub use identity::Identity;
pub use window::{TimeWindow, TimestampLog};
