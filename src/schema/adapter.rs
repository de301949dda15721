//! Adapter for converting the wire payload into a `WebhookDelivery`
//!
//! Validation is limited to structure: required fields must be present,
//! timestamps must be integers and no interval may end before it starts.
//! Timestamps are otherwise trusted as platform-supplied epoch milliseconds.

use crate::error::TraceError;
use crate::schema::wire::*;
use crate::types::{ContactSighting, ProximityInterval, TracedDevice, WebhookDelivery};
use chrono::DateTime;

/// Earliest accepted epoch (0001-01-01T00:00:00Z)
pub const MIN_EPOCH_MS: i64 = -62_135_596_800_000;

/// Latest accepted epoch (9999-12-31T23:59:59.999Z)
pub const MAX_EPOCH_MS: i64 = 253_402_300_799_999;

/// A single structural problem found in a delivery
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadIssue {
    #[error("{path}: missing required field `{field}`")]
    MissingField { path: String, field: &'static str },

    #[error("{path}: `{field}` is not an integer: {value:?}")]
    NotAnInteger {
        path: String,
        field: &'static str,
        value: String,
    },

    #[error("{path}: end_time {end_ms} is before start_time {start_ms}")]
    EndBeforeStart {
        path: String,
        start_ms: i64,
        end_ms: i64,
    },

    #[error("{path}: `{field}` {value} is outside the supported epoch range")]
    OutOfRange {
        path: String,
        field: &'static str,
        value: i64,
    },

    #[error("{path}: user_name {value:?} cannot be used as a directory name")]
    UnsafeUserName { path: String, value: String },

    #[error("invalid JSON: {0}")]
    Json(String),
}

/// Adapter for converting webhook JSON to the typed delivery model
pub struct DeliveryAdapter;

impl DeliveryAdapter {
    /// Parse and validate a raw delivery, failing on the first problem
    pub fn parse(raw_json: &str) -> Result<WebhookDelivery, TraceError> {
        let envelope: WireEnvelope = serde_json::from_str(raw_json)?;
        Self::to_delivery(&envelope)
    }

    /// Convert an already-deserialized envelope
    pub fn to_delivery(envelope: &WireEnvelope) -> Result<WebhookDelivery, TraceError> {
        let mut issues = Vec::new();
        match convert_envelope(envelope, &mut issues) {
            Some(delivery) if issues.is_empty() => Ok(delivery),
            _ => Err(TraceError::MalformedPayload(
                issues
                    .first()
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "unrecognised payload".to_string()),
            )),
        }
    }

    /// Collect every structural problem in a raw delivery
    pub fn validate(raw_json: &str) -> Vec<PayloadIssue> {
        let envelope: WireEnvelope = match serde_json::from_str(raw_json) {
            Ok(envelope) => envelope,
            Err(e) => return vec![PayloadIssue::Json(e.to_string())],
        };
        let mut issues = Vec::new();
        convert_envelope(&envelope, &mut issues);
        issues
    }
}

/// Parse a raw webhook body into a validated delivery
pub fn parse_delivery(raw_json: &str) -> Result<WebhookDelivery, TraceError> {
    DeliveryAdapter::parse(raw_json)
}

/// List every structural problem in a raw webhook body (empty when valid)
pub fn validate_delivery(raw_json: &str) -> Vec<PayloadIssue> {
    DeliveryAdapter::validate(raw_json)
}

fn require<'a, T>(
    value: &'a Option<T>,
    path: &str,
    field: &'static str,
    issues: &mut Vec<PayloadIssue>,
) -> Option<&'a T> {
    if value.is_none() {
        issues.push(PayloadIssue::MissingField {
            path: path.to_string(),
            field,
        });
    }
    value.as_ref()
}

fn require_integer(
    value: &Option<WireInteger>,
    path: &str,
    field: &'static str,
    issues: &mut Vec<PayloadIssue>,
) -> Option<i64> {
    let raw = require(value, path, field, issues)?;
    let parsed = raw.as_i64();
    if parsed.is_none() {
        issues.push(PayloadIssue::NotAnInteger {
            path: path.to_string(),
            field,
            value: raw.raw(),
        });
    }
    parsed
}

/// Integer field holding an epoch in milliseconds within the supported range
fn require_epoch(
    value: &Option<WireInteger>,
    path: &str,
    field: &'static str,
    issues: &mut Vec<PayloadIssue>,
) -> Option<i64> {
    let epoch_ms = require_integer(value, path, field, issues)?;
    let representable = (MIN_EPOCH_MS..=MAX_EPOCH_MS).contains(&epoch_ms)
        && DateTime::from_timestamp_millis(epoch_ms).is_some();
    if !representable {
        issues.push(PayloadIssue::OutOfRange {
            path: path.to_string(),
            field,
            value: epoch_ms,
        });
        return None;
    }
    Some(epoch_ms)
}

/// The user name becomes a single directory name under the output root
fn is_safe_user_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

fn convert_envelope(
    envelope: &WireEnvelope,
    issues: &mut Vec<PayloadIssue>,
) -> Option<WebhookDelivery> {
    let details = require(&envelope.details, "$", "details", issues)?;
    let path = "details";

    let user_name = require(&details.user_name, path, "user_name", issues).filter(|name| {
        let safe = is_safe_user_name(name);
        if !safe {
            issues.push(PayloadIssue::UnsafeUserName {
                path: path.to_string(),
                value: name.to_string(),
            });
        }
        safe
    });
    let time_resolution = require_integer(&details.time_resolution, path, "time_resolution", issues);
    let number_days = require_integer(&details.number_days, path, "number_days", issues);
    let start_ms = require_epoch(&details.start_time, path, "start_time", issues);
    let end_ms = require_epoch(&details.end_time, path, "end_time", issues);
    let client_proximity = require(&details.client_proximity, path, "client_proximity", issues);

    // Convert every device even after an earlier failure so validation sees all issues
    let devices: Vec<Option<TracedDevice>> = client_proximity
        .map(|list| {
            list.iter()
                .enumerate()
                .map(|(idx, device)| {
                    convert_device(device, &format!("details.client_proximity[{idx}]"), issues)
                })
                .collect()
        })
        .unwrap_or_default();

    Some(WebhookDelivery {
        user_name: user_name?.clone(),
        time_resolution: time_resolution?,
        number_days: number_days?,
        start_ms: start_ms?,
        end_ms: end_ms?,
        devices: devices.into_iter().collect::<Option<Vec<_>>>()?,
    })
}

fn convert_device(
    device: &WireClientProximity,
    path: &str,
    issues: &mut Vec<PayloadIssue>,
) -> Option<TracedDevice> {
    let mac_address = require(&device.mac_address, path, "mac_address", issues);
    let client_info = require(&device.client_info, path, "client_info", issues);

    let intervals: Vec<Option<ProximityInterval>> = client_info
        .map(|slices| {
            slices
                .iter()
                .enumerate()
                .map(|(idx, slice)| {
                    convert_slice(slice, &format!("{path}.client_info[{idx}]"), issues)
                })
                .collect()
        })
        .unwrap_or_default();

    Some(TracedDevice {
        mac_address: mac_address?.clone(),
        intervals: intervals.into_iter().collect::<Option<Vec<_>>>()?,
    })
}

fn convert_slice(
    slice: &WireTimeSlice,
    path: &str,
    issues: &mut Vec<PayloadIssue>,
) -> Option<ProximityInterval> {
    let location = require(&slice.location, path, "location", issues);
    let start_ms = require_epoch(&slice.start_time, path, "start_time", issues);
    let end_ms = require_epoch(&slice.end_time, path, "end_time", issues);
    let users_info = require(&slice.users_info, path, "users_info", issues);

    let contacts: Vec<Option<ContactSighting>> = users_info
        .map(|users| {
            users
                .iter()
                .enumerate()
                .map(|(idx, user)| {
                    convert_user(user, &format!("{path}.users_info[{idx}]"), issues)
                })
                .collect()
        })
        .unwrap_or_default();

    let (start_ms, end_ms) = (start_ms?, end_ms?);
    if end_ms < start_ms {
        issues.push(PayloadIssue::EndBeforeStart {
            path: path.to_string(),
            start_ms,
            end_ms,
        });
        return None;
    }

    Some(ProximityInterval {
        location: location?.clone(),
        start_ms,
        end_ms,
        contacts: contacts.into_iter().collect::<Option<Vec<_>>>()?,
    })
}

fn convert_user(
    user: &WireUserInfo,
    path: &str,
    issues: &mut Vec<PayloadIssue>,
) -> Option<ContactSighting> {
    let contact_mac = require(&user.client_mac, path, "client_mac", issues);
    let contact_user = require(&user.client_user, path, "client_user", issues);
    let contact_type = require(&user.client_type, path, "client_type", issues);

    Some(ContactSighting {
        contact_mac: contact_mac?.clone(),
        contact_user: contact_user?.clone(),
        contact_type: contact_type?.clone(),
    })
}
