//! Hold cancellation.
//!
//! A cancellation is validated locally, then the stored hold is read so the
//! outgoing payload can carry the hold's own `requestDate` and pickup
//! location, and finally the merged payload is submitted. Whatever the
//! backend answers to the submission is relayed unchanged.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::backend::{HoldBackend, UpstreamResponse, with_timeout};
use crate::error::{BackendError, EdgeError};
use crate::model::{CancellationPayload, HoldCancellationRequest};

pub struct HoldCancellationOrchestrator {
    holds: Arc<dyn HoldBackend>,
    request_timeout: Duration,
}

impl HoldCancellationOrchestrator {
    pub fn new(holds: Arc<dyn HoldBackend>, request_timeout: Duration) -> Self {
        Self {
            holds,
            request_timeout,
        }
    }

    /// Cancels `hold_id` on behalf of the internal patron `patron_id`.
    ///
    /// Validation failures make no backend call. A non-404 failure reading the
    /// hold is returned as [`EdgeError::Upstream`] carrying the backend's response.
    pub async fn cancel(
        &self,
        tenant: &str,
        patron_id: &str,
        hold_id: &str,
        request: HoldCancellationRequest,
    ) -> Result<UpstreamResponse, EdgeError> {
        if patron_id.trim().is_empty() {
            return Err(EdgeError::validation("patron id is required"));
        }
        request.validate(hold_id)?;

        let hold = with_timeout(self.request_timeout, self.holds.fetch_hold(tenant, hold_id))
            .await
            .map_err(|e| match e {
                BackendError::NotFound => EdgeError::hold_not_found(hold_id),
                BackendError::Timeout => EdgeError::upstream_timeout("hold lookup"),
                other => {
                    tracing::warn!(
                        tenant = %tenant,
                        hold_id = %hold_id,
                        error = %other,
                        "Hold lookup failed"
                    );
                    EdgeError::from(other)
                }
            })?;

        let payload = CancellationPayload::merge(hold, request, OffsetDateTime::now_utc());

        let response = with_timeout(
            self.request_timeout,
            self.holds.submit_cancellation(tenant, patron_id, hold_id, &payload),
        )
        .await
        .map_err(|e| match e {
            BackendError::Timeout => EdgeError::upstream_timeout("hold cancellation"),
            other => {
                tracing::warn!(
                    tenant = %tenant,
                    hold_id = %hold_id,
                    error = %other,
                    "Hold cancellation failed"
                );
                EdgeError::Backend(other.to_string())
            }
        })?;

        tracing::info!(
            tenant = %tenant,
            hold_id = %hold_id,
            status = response.status,
            "Hold cancellation submitted"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use time::macros::datetime;
    use tokio_test::assert_err;

    use super::*;
    use crate::model::HoldRecord;

    const HOLD: &str = "8a8f1c4e-2d3b-4a5f-9e6d-7c8b9a0f1e2d";
    const REASON: &str = "75187e8d-e25a-47a7-89ad-23ba612338de";
    const USER: &str = "d1a2b3c4-5e6f-4a7b-8c9d-0e1f2a3b4c5d";
    const PATRON: &str = "1f0e4c3b-aaaa-4bbb-8ccc-123456789abc";

    /// Records every call and answers with canned results.
    struct RecordingHolds {
        fetch: Result<HoldRecord, BackendError>,
        submit: Result<UpstreamResponse, BackendError>,
        delay: Option<Duration>,
        fetched: Mutex<Vec<(String, String)>>,
        submitted: Mutex<Vec<(String, String, CancellationPayload)>>,
    }

    impl RecordingHolds {
        fn new(
            fetch: Result<HoldRecord, BackendError>,
            submit: Result<UpstreamResponse, BackendError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                fetch,
                submit,
                delay: None,
                fetched: Mutex::new(Vec::new()),
                submitted: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.fetched.lock().unwrap().len() + self.submitted.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HoldBackend for RecordingHolds {
        async fn fetch_hold(
            &self,
            tenant: &str,
            hold_id: &str,
        ) -> Result<HoldRecord, BackendError> {
            self.fetched
                .lock()
                .unwrap()
                .push((tenant.to_string(), hold_id.to_string()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.fetch.clone()
        }

        async fn submit_cancellation(
            &self,
            tenant: &str,
            patron_id: &str,
            _hold_id: &str,
            payload: &CancellationPayload,
        ) -> Result<UpstreamResponse, BackendError> {
            self.submitted.lock().unwrap().push((
                tenant.to_string(),
                patron_id.to_string(),
                payload.clone(),
            ));
            self.submit.clone()
        }
    }

    fn stored_hold() -> HoldRecord {
        HoldRecord {
            id: HOLD.to_string(),
            pickup_service_point_id: Some("sp-main".to_string()),
            request_date: "2024-02-10T09:30:00.000+0000".to_string(),
        }
    }

    fn request() -> HoldCancellationRequest {
        HoldCancellationRequest {
            hold_id: HOLD.to_string(),
            cancellation_reason_id: REASON.to_string(),
            canceled_by_user_id: USER.to_string(),
            cancellation_additional_information: None,
            canceled_date: Some(datetime!(2024-03-01 12:00 UTC)),
        }
    }

    fn orchestrator(holds: Arc<RecordingHolds>) -> HoldCancellationOrchestrator {
        HoldCancellationOrchestrator::new(holds, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_cancel_submits_merged_payload() {
        let accepted =
            UpstreamResponse::json(200, &json!({"id": HOLD, "status": "Closed - Cancelled"}));
        let holds = RecordingHolds::new(Ok(stored_hold()), Ok(accepted.clone()));
        let mut request = request();
        request.cancellation_additional_information = Some("no longer needed".to_string());

        let response = orchestrator(holds.clone())
            .cancel("diku", PATRON, HOLD, request)
            .await
            .unwrap();
        assert_eq!(response, accepted);

        let fetched = holds.fetched.lock().unwrap();
        assert_eq!(fetched.as_slice(), &[("diku".to_string(), HOLD.to_string())]);

        let submitted = holds.submitted.lock().unwrap();
        let (tenant, patron, payload) = &submitted[0];
        assert_eq!(tenant, "diku");
        assert_eq!(patron, PATRON);
        assert_eq!(payload.request_id, HOLD);
        assert_eq!(payload.pickup_location_id.as_deref(), Some("sp-main"));
        assert_eq!(payload.request_date, "2024-02-10T09:30:00.000+0000");
        assert_eq!(payload.canceled_date, datetime!(2024-03-01 12:00 UTC));
        assert_eq!(payload.cancellation_reason_id, REASON);
        assert_eq!(payload.canceled_by_user_id, USER);
        assert_eq!(
            payload.cancellation_additional_information.as_deref(),
            Some("no longer needed")
        );
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_backend_calls() {
        let holds =
            RecordingHolds::new(Ok(stored_hold()), Ok(UpstreamResponse::new(200, None, "")));
        let orchestrator = orchestrator(holds.clone());

        let mut bad_reason = request();
        bad_reason.cancellation_reason_id = "not-a-uuid".to_string();
        let err = assert_err!(orchestrator.cancel("diku", PATRON, HOLD, bad_reason).await);
        assert!(matches!(err, EdgeError::ValidationFailed(_)));

        let other_hold = "00000000-0000-4000-8000-000000000001";
        let err =
            assert_err!(orchestrator.cancel("diku", PATRON, other_hold, request()).await);
        assert!(matches!(err, EdgeError::ValidationFailed(_)));

        let err = assert_err!(orchestrator.cancel("diku", "", HOLD, request()).await);
        assert!(matches!(err, EdgeError::ValidationFailed(_)));

        assert_eq!(holds.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_hold() {
        let holds = RecordingHolds::new(
            Err(BackendError::NotFound),
            Ok(UpstreamResponse::new(200, None, "")),
        );

        let err = assert_err!(
            orchestrator(holds.clone())
                .cancel("diku", PATRON, HOLD, request())
                .await
        );
        assert!(matches!(err, EdgeError::HoldNotFound { ref hold_id } if hold_id == HOLD));
        assert!(holds.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hold_lookup_failure_is_passed_through() {
        let forbidden = UpstreamResponse::new(
            403,
            Some("text/plain".into()),
            "Access requires permission",
        );
        let holds = RecordingHolds::new(
            Err(BackendError::Status(forbidden.clone())),
            Ok(UpstreamResponse::new(200, None, "")),
        );

        let err = assert_err!(
            orchestrator(holds.clone())
                .cancel("diku", PATRON, HOLD, request())
                .await
        );
        assert!(matches!(err, EdgeError::Upstream(ref r) if *r == forbidden));
        assert!(holds.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_submission_is_returned_verbatim() {
        let rejected = UpstreamResponse::json(
            422,
            &json!({"errors": [{"message": "Request already closed"}]}),
        );
        let holds = RecordingHolds::new(Ok(stored_hold()), Ok(rejected.clone()));

        let response = orchestrator(holds)
            .cancel("diku", PATRON, HOLD, request())
            .await
            .unwrap();
        assert_eq!(response, rejected);
    }

    #[tokio::test]
    async fn test_submit_transport_failure() {
        let holds = RecordingHolds::new(
            Ok(stored_hold()),
            Err(BackendError::Transport("connection reset".into())),
        );

        let err =
            assert_err!(orchestrator(holds).cancel("diku", PATRON, HOLD, request()).await);
        assert!(matches!(err, EdgeError::Backend(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_hold_lookup_times_out() {
        let holds = Arc::new(RecordingHolds {
            fetch: Ok(stored_hold()),
            submit: Ok(UpstreamResponse::new(200, None, "")),
            delay: Some(Duration::from_secs(60)),
            fetched: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
        });

        let err = assert_err!(
            orchestrator(holds.clone())
                .cancel("diku", PATRON, HOLD, request())
                .await
        );
        assert!(matches!(err, EdgeError::UpstreamTimeout { operation: "hold lookup" }));
        assert!(holds.submitted.lock().unwrap().is_empty());
    }
}
