//! Webhook payload as delivered by the platform
//!
//! Every field is optional at this layer so that the adapter can report
//! exactly which required field is missing, with its JSON path. Epoch
//! timestamps arrive as either integers or decimal strings.

use serde::{Deserialize, Serialize};

/// Event type the webhook subscription is registered for
pub const PROXIMITY_EVENT_ID: &str = "NETWORK-CLIENTS-3-506";

/// Integer field that may be encoded as a JSON number or a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireInteger {
    Integer(i64),
    Text(String),
}

impl WireInteger {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireInteger::Integer(i) => Some(*i),
            WireInteger::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn raw(&self) -> String {
        match self {
            WireInteger::Integer(i) => i.to_string(),
            WireInteger::Text(s) => s.clone(),
        }
    }
}

/// Top-level webhook body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireEnvelope {
    pub details: Option<WireDetails>,
}

/// Proximity computation result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireDetails {
    pub user_name: Option<String>,
    pub time_resolution: Option<WireInteger>,
    pub number_days: Option<WireInteger>,
    pub start_time: Option<WireInteger>,
    pub end_time: Option<WireInteger>,
    pub client_proximity: Option<Vec<WireClientProximity>>,
}

/// Intervals for one traced wireless client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireClientProximity {
    pub mac_address: Option<String>,
    pub client_info: Option<Vec<WireTimeSlice>>,
}

/// One time-slice at one location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireTimeSlice {
    pub location: Option<String>,
    pub start_time: Option<WireInteger>,
    pub end_time: Option<WireInteger>,
    pub users_info: Option<Vec<WireUserInfo>>,
}

/// A co-located client. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireUserInfo {
    pub client_mac: Option<String>,
    pub client_user: Option<String>,
    pub client_type: Option<String>,
}
