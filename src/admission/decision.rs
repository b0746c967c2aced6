//! Admission outcomes and quota usage reports.

use serde::Serialize;
use std::time::Duration;

use super::window::TimeWindow;
use crate::error::QuotaExceeded;

/// Which quota a decision refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// All callers combined
    Global,
    /// One specific caller
    PerIdentity,
}

impl Scope {
    /// Short label surfaced to throttled callers.
    pub fn error_label(&self) -> &'static str {
        match self {
            Scope::Global => "Service-wide rate limit exceeded",
            Scope::PerIdentity => "User rate limit exceeded",
        }
    }
}

/// Result of a single admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The event was recorded against both quotas
    Admitted,
    /// Nothing was recorded
    Rejected(Rejection),
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted)
    }

    /// Convert into a `Result` so callers can propagate rejections with `?`.
    pub fn into_result(self) -> std::result::Result<(), QuotaExceeded> {
        match self {
            Decision::Admitted => Ok(()),
            Decision::Rejected(rejection) => Err(rejection.into()),
        }
    }
}

/// Details of a rejected admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The quota that triggered the rejection
    pub scope: Scope,
    /// How long the caller should wait before retrying
    pub retry_after: Duration,
    /// The configured limit of the triggering scope
    pub limit: u64,
    /// Caller's usage in the current window; per-identity rejections only
    pub current: Option<u64>,
    /// Window the limit applies to
    pub window: TimeWindow,
}

impl Rejection {
    /// Build the throttling body the caller-facing layer returns.
    pub fn throttle_detail(&self) -> ThrottleDetail {
        let unit = self.window.unit();
        let message = match self.scope {
            Scope::Global => format!(
                "The service has reached its limit of {} requests per {}. Please try again later.",
                self.limit, unit
            ),
            Scope::PerIdentity => format!(
                "You have reached your limit of {} requests per {}. Please try again later.",
                self.limit, unit
            ),
        };

        let per_identity = self.scope == Scope::PerIdentity;
        ThrottleDetail {
            error: self.scope.error_label().to_string(),
            message,
            retry_after: self.retry_after.as_secs(),
            current_usage: if per_identity { self.current } else { None },
            limit: per_identity.then_some(self.limit),
        }
    }
}

impl From<Rejection> for QuotaExceeded {
    fn from(rejection: Rejection) -> Self {
        match rejection.scope {
            Scope::Global => QuotaExceeded::Global {
                limit: rejection.limit,
                retry_after: rejection.retry_after,
            },
            Scope::PerIdentity => QuotaExceeded::Identity {
                limit: rejection.limit,
                current: rejection.current.unwrap_or(rejection.limit),
                retry_after: rejection.retry_after,
            },
        }
    }
}

/// Body of a throttling response (HTTP 429 or equivalent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThrottleDetail {
    pub error: String,
    pub message: String,
    /// Seconds
    pub retry_after: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_usage: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl ThrottleDetail {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Usage of one quota at the time of a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    pub current: u64,
    pub limit: u64,
    pub remaining: u64,
    #[serde(serialize_with = "serialize_window")]
    pub window: TimeWindow,
}

impl QuotaUsage {
    pub(crate) fn new(current: u64, limit: u64, window: TimeWindow) -> Self {
        Self {
            current,
            limit,
            remaining: limit.saturating_sub(current),
            window,
        }
    }
}

fn serialize_window<S: serde::Serializer>(window: &TimeWindow, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&window.label())
}

/// Snapshot of both quotas for one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub global: QuotaUsage,
    #[serde(rename = "user")]
    pub identity: QuotaUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_rejection() -> Rejection {
        Rejection {
            scope: Scope::PerIdentity,
            retry_after: Duration::from_secs(60),
            limit: 10,
            current: Some(10),
            window: TimeWindow::Minute,
        }
    }

    #[test]
    fn test_identity_throttle_detail() {
        let detail = identity_rejection().throttle_detail();

        assert_eq!(detail.error, "User rate limit exceeded");
        assert_eq!(
            detail.message,
            "You have reached your limit of 10 requests per minute. Please try again later."
        );
        assert_eq!(detail.retry_after, 60);
        assert_eq!(detail.current_usage, Some(10));
        assert_eq!(detail.limit, Some(10));
    }

    #[test]
    fn test_global_throttle_detail_omits_usage() {
        let rejection = Rejection {
            scope: Scope::Global,
            retry_after: Duration::from_secs(60),
            limit: 100,
            current: None,
            window: TimeWindow::Minute,
        };

        let json: serde_json::Value =
            serde_json::from_str(&rejection.throttle_detail().to_json().unwrap()).unwrap();

        assert_eq!(json["error"], "Service-wide rate limit exceeded");
        assert_eq!(
            json["message"],
            "The service has reached its limit of 100 requests per minute. Please try again later."
        );
        assert_eq!(json["retry_after"], 60);
        assert!(json.get("current_usage").is_none());
        assert!(json.get("limit").is_none());
    }

    #[test]
    fn test_into_result() {
        assert!(Decision::Admitted.into_result().is_ok());

        let err = Decision::Rejected(identity_rejection()).into_result().unwrap_err();
        assert_eq!(
            err,
            QuotaExceeded::Identity {
                limit: 10,
                current: 10,
                retry_after: Duration::from_secs(60),
            }
        );
    }

    #[test]
    fn test_quota_usage_remaining_saturates() {
        let usage = QuotaUsage::new(12, 10, TimeWindow::Minute);
        assert_eq!(usage.remaining, 0);

        let usage = QuotaUsage::new(3, 10, TimeWindow::Minute);
        assert_eq!(usage.remaining, 7);
    }

    #[test]
    fn test_status_report_json_shape() {
        let report = StatusReport {
            global: QuotaUsage::new(4, 100, TimeWindow::Minute),
            identity: QuotaUsage::new(4, 10, TimeWindow::Minute),
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["global"]["remaining"], 96);
        assert_eq!(json["user"]["limit"], 10);
        assert_eq!(json["user"]["window"], "1 minute");
    }
}
