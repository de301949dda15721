//! Contact exposure aggregation
//!
//! Folds the proximity intervals of one traced device into the total time
//! each distinct contact spent near it.

use crate::types::{ContactExposure, ProximityInterval};
use std::collections::HashMap;

/// Aggregator for per-contact exposure totals
pub struct ContactAggregator;

impl ContactAggregator {
    /// Aggregate exposure per contact, longest exposure first.
    ///
    /// Every sighting entry adds its interval's full duration to the contact,
    /// so a MAC listed twice in one interval is counted twice. Contact user and
    /// type come from the last sighting processed. Ties keep the order in which
    /// contacts were first encountered.
    pub fn aggregate(intervals: &[ProximityInterval]) -> Vec<ContactExposure> {
        let mut exposures: Vec<ContactExposure> = Vec::new();
        let mut index_by_mac: HashMap<&str, usize> = HashMap::new();

        for interval in intervals {
            let duration_ms = interval.duration_ms();

            for sighting in &interval.contacts {
                let idx = *index_by_mac
                    .entry(sighting.contact_mac.as_str())
                    .or_insert_with(|| {
                        exposures.push(ContactExposure {
                            contact_mac: sighting.contact_mac.clone(),
                            contact_user: String::new(),
                            contact_type: String::new(),
                            total_duration_ms: 0,
                            sightings: 0,
                        });
                        exposures.len() - 1
                    });

                let exposure = &mut exposures[idx];
                exposure.total_duration_ms = exposure.total_duration_ms.saturating_add(duration_ms);
                exposure.sightings += 1;
                exposure.contact_user.clone_from(&sighting.contact_user);
                exposure.contact_type.clone_from(&sighting.contact_type);
            }
        }

        // Exposures are only created from a sighting
        assert!(
            exposures.iter().all(|e| e.sightings > 0),
            "contact exposure without any sighting"
        );

        // Stable: equal totals stay in first-encounter order
        exposures.sort_by(|a, b| b.total_duration_ms.cmp(&a.total_duration_ms));
        exposures
    }
}

/// Aggregate exposure per contact for one traced device
pub fn aggregate_contacts(intervals: &[ProximityInterval]) -> Vec<ContactExposure> {
    ContactAggregator::aggregate(intervals)
}
