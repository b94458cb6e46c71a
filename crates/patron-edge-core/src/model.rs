//! Hold cancellation request, the backend hold record, and the merged payload.
//!
//! Other patron-account bodies (account, loans, charges) are relayed as
//! opaque JSON and have no types here.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::EdgeError;

/// Cancellation submitted by the edge client.
///
/// Required ids default to empty so a missing field is reported by
/// [`validate`](Self::validate) instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldCancellationRequest {
    #[serde(default)]
    pub hold_id: String,

    #[serde(default)]
    pub cancellation_reason_id: String,

    #[serde(default)]
    pub canceled_by_user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_additional_information: Option<String>,

    /// Defaults to the time of submission when omitted.
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub canceled_date: Option<OffsetDateTime>,
}

impl HoldCancellationRequest {
    /// Checks required ids and that the body refers to `path_hold_id`.
    pub fn validate(&self, path_hold_id: &str) -> Result<(), EdgeError> {
        let path_hold = parse_uuid("path holdId", path_hold_id)?;
        let body_hold = parse_uuid("holdId", &self.hold_id)?;
        parse_uuid("cancellationReasonId", &self.cancellation_reason_id)?;
        parse_uuid("canceledByUserId", &self.canceled_by_user_id)?;

        if path_hold != body_hold {
            return Err(EdgeError::validation(format!(
                "holdId {} does not match hold {} in the request path",
                self.hold_id, path_hold_id
            )));
        }
        Ok(())
    }
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, EdgeError> {
    if value.trim().is_empty() {
        return Err(EdgeError::validation(format!("{field} is required")));
    }
    Uuid::parse_str(value)
        .map_err(|_| EdgeError::validation(format!("{field} is not a valid UUID: {value}")))
}

/// The backend's record of an existing hold. Unlisted fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_service_point_id: Option<String>,

    /// Kept as the backend wrote it; only ever copied back.
    pub request_date: String,
}

/// Cancellation sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationPayload {
    pub request_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_location_id: Option<String>,

    pub request_date: String,

    pub cancellation_reason_id: String,

    pub canceled_by_user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_additional_information: Option<String>,

    #[serde(with = "time::serde::rfc3339")]
    pub canceled_date: OffsetDateTime,
}

impl CancellationPayload {
    /// Combines the stored hold with the caller's cancellation details.
    pub fn merge(hold: HoldRecord, request: HoldCancellationRequest, now: OffsetDateTime) -> Self {
        Self {
            request_id: hold.id,
            pickup_location_id: hold.pickup_service_point_id,
            request_date: hold.request_date,
            cancellation_reason_id: request.cancellation_reason_id,
            canceled_by_user_id: request.canceled_by_user_id,
            cancellation_additional_information: request.cancellation_additional_information,
            canceled_date: request.canceled_date.unwrap_or(now),
        }
    }
}
