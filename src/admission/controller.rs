//! Core admission controller.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::decision::{Decision, QuotaUsage, Rejection, Scope, StatusReport};
use super::identity::Identity;
use super::window::{TimeWindow, TimestampLog};
use crate::config::AdmissionConfig;
use crate::error::Result;

/// Default service-wide limit per window.
pub const GLOBAL_LIMIT: u64 = 100;
/// Default per-identity limit per window.
pub const SCOPE_LIMIT: u64 = 10;
/// Default window.
pub const DEFAULT_WINDOW: TimeWindow = TimeWindow::Minute;

/// Global log and scope registry, always locked together.
#[derive(Debug, Default)]
struct AdmissionState {
    global: TimestampLog,
    scopes: HashMap<Identity, TimestampLog>,
}

/// Admits or rejects work against a global and a per-identity quota.
///
/// Every check runs its purge, threshold comparison and recording under a
/// single lock, so concurrent callers can never both take the last slot.
/// Share one instance behind an `Arc`.
pub struct AdmissionController {
    state: Mutex<AdmissionState>,
    global_limit: u64,
    identity_limit: u64,
    window: TimeWindow,
}

impl AdmissionController {
    /// Create a controller with the default limits (100 global, 10 per identity, 1 minute).
    pub fn new() -> Self {
        Self::with_limits(GLOBAL_LIMIT, SCOPE_LIMIT, DEFAULT_WINDOW)
    }

    /// Create a controller from configuration.
    pub fn with_config(config: &AdmissionConfig) -> Self {
        Self::with_limits(config.global_limit, config.identity_limit, config.window)
    }

    pub fn with_limits(global_limit: u64, identity_limit: u64, window: TimeWindow) -> Self {
        Self {
            state: Mutex::new(AdmissionState::default()),
            global_limit,
            identity_limit,
            window,
        }
    }

    pub fn global_limit(&self) -> u64 {
        self.global_limit
    }

    pub fn identity_limit(&self) -> u64 {
        self.identity_limit
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Admit or reject one unit of work for `identity`, recording it if admitted.
    pub fn check_and_record(&self, identity: &str) -> Result<Decision> {
        self.check_with(identity, Instant::now)
    }

    /// Same as [`check_and_record`](Self::check_and_record) with an explicit clock reading.
    pub fn check_and_record_at(&self, identity: &str, now: Instant) -> Result<Decision> {
        self.check_with(identity, || now)
    }

    fn check_with(&self, identity: &str, clock: impl FnOnce() -> Instant) -> Result<Decision> {
        let identity = Identity::new(identity)?;
        let window = self.window.duration();

        let mut state = self.state.lock();
        // Read under the lock so concurrent callers record in clock order.
        let now = clock();
        let AdmissionState { global, scopes } = &mut *state;

        global.purge(now, window);
        let scope_log = scopes.entry(identity.clone()).or_insert_with(|| {
            debug!(identity = %identity, "Tracking new identity");
            TimestampLog::new()
        });
        scope_log.purge(now, window);

        let global_count = global.len() as u64;
        let identity_count = scope_log.len() as u64;

        trace!(
            identity = %identity,
            global_count,
            identity_count,
            "Checking admission"
        );

        // Global first, so a double breach always reports the global scope.
        if global_count >= self.global_limit {
            debug!(
                identity = %identity,
                limit = self.global_limit,
                "Service-wide quota exceeded"
            );
            return Ok(Decision::Rejected(self.rejection(Scope::Global, None)));
        }

        if identity_count >= self.identity_limit {
            debug!(
                identity = %identity,
                current = identity_count,
                limit = self.identity_limit,
                "Identity quota exceeded"
            );
            return Ok(Decision::Rejected(
                self.rejection(Scope::PerIdentity, Some(identity_count)),
            ));
        }

        global.record(now);
        scope_log.record(now);
        Ok(Decision::Admitted)
    }

    /// Report usage of both quotas for `identity` without recording anything.
    pub fn status(&self, identity: &str) -> Result<StatusReport> {
        self.status_with(identity, Instant::now)
    }

    /// Same as [`status`](Self::status) with an explicit clock reading.
    ///
    /// Stale entries are purged on the way. An identity that was never seen
    /// is reported as empty and is not added to the registry.
    pub fn status_at(&self, identity: &str, now: Instant) -> Result<StatusReport> {
        self.status_with(identity, || now)
    }

    fn status_with(&self, identity: &str, clock: impl FnOnce() -> Instant) -> Result<StatusReport> {
        let identity = Identity::new(identity)?;
        let window = self.window.duration();

        let mut state = self.state.lock();
        let now = clock();
        let AdmissionState { global, scopes } = &mut *state;

        global.purge(now, window);
        let identity_count = match scopes.get_mut(&identity) {
            Some(log) => {
                log.purge(now, window);
                log.len() as u64
            }
            None => 0,
        };

        Ok(StatusReport {
            global: QuotaUsage::new(global.len() as u64, self.global_limit, self.window),
            identity: QuotaUsage::new(identity_count, self.identity_limit, self.window),
        })
    }

    /// Drop registry entries whose logs have fully expired.
    ///
    /// Returns the number of identities removed. A removed identity behaves
    /// exactly like one never seen.
    pub fn evict_idle(&self) -> usize {
        self.evict_with(Instant::now)
    }

    pub fn evict_idle_at(&self, now: Instant) -> usize {
        self.evict_with(|| now)
    }

    fn evict_with(&self, clock: impl FnOnce() -> Instant) -> usize {
        let window = self.window.duration();
        let mut state = self.state.lock();
        let now = clock();

        let before = state.scopes.len();
        state.scopes.retain(|_, log| {
            log.purge(now, window);
            !log.is_empty()
        });
        before - state.scopes.len()
    }

    /// Number of identities currently held in the registry.
    pub fn identity_count(&self) -> usize {
        self.state.lock().scopes.len()
    }

    fn rejection(&self, scope: Scope, current: Option<u64>) -> Rejection {
        let limit = match scope {
            Scope::Global => self.global_limit,
            Scope::PerIdentity => self.identity_limit,
        };
        Rejection {
            scope,
            retry_after: self.retry_after(),
            limit,
            current,
            window: self.window,
        }
    }

    fn retry_after(&self) -> Duration {
        self.window.duration()
    }
}

impl Default for AdmissionController {
    fn default() -> Self {
        Self::new()
    }
}
