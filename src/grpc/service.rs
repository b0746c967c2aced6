//! Admission service implementation.

use std::sync::Arc;
use std::time::Duration;
use tonic::{Request, Response, Status};
use tracing::{debug, info, instrument, warn};

use super::proto::turnstile::v1::{
    admission_service_server::AdmissionService,
    admit_response::Code,
    rejection::Scope as ProtoScope,
    AdmitRequest, AdmitResponse, QuotaUsage as ProtoQuotaUsage, Rejection as ProtoRejection,
    StatusRequest, StatusResponse,
};

use crate::admission::{AdmissionController, Decision, QuotaUsage, Rejection, Scope};
use crate::error::TurnstileError;

/// Implementation of the `turnstile.v1.AdmissionService` gRPC interface.
///
/// Translates controller decisions into throttling responses; a rejection is
/// a normal `OVER_LIMIT` response, not a gRPC error.
pub struct AdmissionServiceImpl {
    controller: Arc<AdmissionController>,
}

impl AdmissionServiceImpl {
    /// Create a new AdmissionServiceImpl around a shared controller.
    pub fn new(controller: Arc<AdmissionController>) -> Self {
        Self { controller }
    }
}

#[tonic::async_trait]
impl AdmissionService for AdmissionServiceImpl {
    #[instrument(skip(self, request), fields(identity = %request.get_ref().identity))]
    async fn admit(
        &self,
        request: Request<AdmitRequest>,
    ) -> Result<Response<AdmitResponse>, Status> {
        let req = request.into_inner();

        let decision = self
            .controller
            .check_and_record(&req.identity)
            .map_err(to_status)?;

        let response = match decision {
            Decision::Admitted => AdmitResponse {
                code: Code::Ok.into(),
                rejection: None,
            },
            Decision::Rejected(rejection) => {
                info!(
                    identity = %req.identity,
                    scope = ?rejection.scope,
                    limit = rejection.limit,
                    "Request throttled"
                );
                AdmitResponse {
                    code: Code::OverLimit.into(),
                    rejection: Some(rejection_to_proto(&rejection)?),
                }
            }
        };

        debug!(code = ?response.code(), "Admission decision made");

        Ok(Response::new(response))
    }

    #[instrument(skip(self, request), fields(identity = %request.get_ref().identity))]
    async fn get_status(
        &self,
        request: Request<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        let req = request.into_inner();

        let report = self.controller.status(&req.identity).map_err(to_status)?;

        Ok(Response::new(StatusResponse {
            global: Some(usage_to_proto(&report.global)),
            identity: Some(usage_to_proto(&report.identity)),
        }))
    }
}

fn to_status(err: TurnstileError) -> Status {
    match err {
        TurnstileError::InvalidIdentity => {
            warn!("Received admission request with empty identity");
            Status::invalid_argument("identity is required")
        }
        other => Status::internal(other.to_string()),
    }
}

fn rejection_to_proto(rejection: &Rejection) -> Result<ProtoRejection, Status> {
    let detail = rejection.throttle_detail();
    let raw_body = detail
        .to_json()
        .map_err(|e| Status::internal(format!("failed to encode throttle detail: {e}")))?;

    let scope = match rejection.scope {
        Scope::Global => ProtoScope::Global,
        Scope::PerIdentity => ProtoScope::Identity,
    };

    Ok(ProtoRejection {
        scope: scope.into(),
        error: detail.error,
        message: detail.message,
        retry_after: Some(to_proto_duration(rejection.retry_after)),
        limit: rejection.limit,
        current_usage: detail.current_usage,
        raw_body: raw_body.into_bytes(),
    })
}

fn usage_to_proto(usage: &QuotaUsage) -> ProtoQuotaUsage {
    ProtoQuotaUsage {
        current: usage.current,
        limit: usage.limit,
        remaining: usage.remaining,
        window: Some(to_proto_duration(usage.window.duration())),
    }
}

fn to_proto_duration(duration: Duration) -> prost_types::Duration {
    prost_types::Duration {
        seconds: duration.as_secs() as i64,
        nanos: duration.subsec_nanos() as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::TimeWindow;

    fn service_with_limits(global: u64, identity: u64) -> AdmissionServiceImpl {
        let controller = Arc::new(AdmissionController::with_limits(global, identity, TimeWindow::Minute));
        AdmissionServiceImpl::new(controller)
    }

    fn admit_request(identity: &str) -> Request<AdmitRequest> {
        Request::new(AdmitRequest {
            identity: identity.to_string(),
        })
    }

    #[tokio::test]
    async fn test_empty_identity_rejected() {
        let service = service_with_limits(100, 10);

        let status = tokio_test::assert_err!(service.admit(admit_request("")).await);
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let result = service
            .get_status(Request::new(StatusRequest {
                identity: String::new(),
            }))
            .await;
        assert_eq!(result.unwrap_err().code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_valid_request_returns_ok() {
        let service = service_with_limits(100, 10);

        let response = service.admit(admit_request("alice")).await.unwrap().into_inner();
        assert_eq!(response.code(), Code::Ok);
        assert!(response.rejection.is_none());
    }

    #[tokio::test]
    async fn test_identity_over_limit_carries_throttle_detail() {
        let service = service_with_limits(100, 2);

        for _ in 0..2 {
            service.admit(admit_request("alice")).await.unwrap();
        }
        let response = service.admit(admit_request("alice")).await.unwrap().into_inner();

        assert_eq!(response.code(), Code::OverLimit);
        let rejection = response.rejection.unwrap();
        assert_eq!(rejection.scope(), ProtoScope::Identity);
        assert_eq!(rejection.error, "User rate limit exceeded");
        assert_eq!(rejection.limit, 2);
        assert_eq!(rejection.current_usage, Some(2));
        assert_eq!(rejection.retry_after.unwrap().seconds, 60);

        let body: serde_json::Value = serde_json::from_slice(&rejection.raw_body).unwrap();
        assert_eq!(body["retry_after"], 60);
        assert_eq!(body["current_usage"], 2);
        assert_eq!(body["limit"], 2);
    }

    #[tokio::test]
    async fn test_global_over_limit() {
        let service = service_with_limits(1, 10);

        service.admit(admit_request("alice")).await.unwrap();
        let response = service.admit(admit_request("bob")).await.unwrap().into_inner();

        assert_eq!(response.code(), Code::OverLimit);
        let rejection = response.rejection.unwrap();
        assert_eq!(rejection.scope(), ProtoScope::Global);
        assert_eq!(rejection.error, "Service-wide rate limit exceeded");
        assert_eq!(rejection.current_usage, None);
    }

    #[tokio::test]
    async fn test_status_reports_both_scopes() {
        let service = service_with_limits(100, 10);
        service.admit(admit_request("alice")).await.unwrap();
        service.admit(admit_request("bob")).await.unwrap();

        let status = service
            .get_status(Request::new(StatusRequest {
                identity: "alice".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();

        let global = status.global.unwrap();
        assert_eq!(global.current, 2);
        assert_eq!(global.remaining, 98);
        assert_eq!(global.window.unwrap().seconds, 60);

        let identity = status.identity.unwrap();
        assert_eq!(identity.current, 1);
        assert_eq!(identity.limit, 10);
        assert_eq!(identity.remaining, 9);
    }
}
