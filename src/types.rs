//! Core types for the proximity-trace pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: validated proximity intervals, per-contact exposure totals, dwell
//! intervals and the per-device report that bundles them.

use serde::{Deserialize, Serialize};

/// One wireless client seen at the same location as the traced device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSighting {
    /// MAC address of the contact (identity key)
    pub contact_mac: String,
    /// Username reported for the contact
    pub contact_user: String,
    /// Device type reported for the contact
    pub contact_type: String,
}

/// One reporting time-slice for a traced device at one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProximityInterval {
    /// Floor/location name
    pub location: String,
    /// Slice start (epoch milliseconds)
    pub start_ms: i64,
    /// Slice end (epoch milliseconds, never before `start_ms`)
    pub end_ms: i64,
    /// Co-located contacts, in the order the platform listed them
    pub contacts: Vec<ContactSighting>,
}

impl ProximityInterval {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Intervals reported for a single traced device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracedDevice {
    pub mac_address: String,
    pub intervals: Vec<ProximityInterval>,
}

/// A complete webhook delivery for one proximity computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    /// User the proximity computation was triggered for
    pub user_name: String,
    /// Reporting resolution requested from the platform (minutes)
    pub time_resolution: i64,
    /// Number of days searched
    pub number_days: i64,
    /// Search window start (epoch milliseconds)
    pub start_ms: i64,
    /// Search window end (epoch milliseconds)
    pub end_ms: i64,
    /// Per-device interval lists, in delivery order
    pub devices: Vec<TracedDevice>,
}

impl WebhookDelivery {
    pub fn interval_count(&self) -> usize {
        self.devices.iter().map(|d| d.intervals.len()).sum()
    }
}

/// Total time a contact spent near the traced device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactExposure {
    pub contact_mac: String,
    /// Taken from the most recently processed sighting
    pub contact_user: String,
    /// Taken from the most recently processed sighting
    pub contact_type: String,
    /// Sum of interval durations over every sighting (milliseconds)
    pub total_duration_ms: i64,
    /// Number of sighting entries that contributed to the total
    pub sightings: u32,
}

/// A maximal contiguous span at one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwellInterval {
    pub location: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

impl DwellInterval {
    pub fn duration_ms(&self) -> i64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Derived reports for one traced device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracedDeviceReport {
    pub mac_address: String,
    /// Sorted by `total_duration_ms`, descending
    pub exposures: Vec<ContactExposure>,
    /// Chronological
    pub dwell: Vec<DwellInterval>,
}

/// Interval ordering applied before dwell coalescing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalOrdering {
    /// Stable sort by `start_ms` ascending
    #[default]
    SortByStart,
    /// Trust the delivery order as chronological
    AsReceived,
}
