//! Dwell-time coalescing
//!
//! Merges the traced device's time-slices into maximal contiguous runs at a
//! single location. Input order is taken as chronological; callers that
//! cannot guarantee that should sort first (see [`order_intervals`]).

use crate::error::TraceError;
use crate::types::{DwellInterval, IntervalOrdering, ProximityInterval};

/// Coalescer for per-location dwell intervals
pub struct DwellCoalescer;

impl DwellCoalescer {
    /// Coalesce intervals into dwell runs.
    ///
    /// A slice extends the current run only when it is at the same location
    /// and starts exactly where the run ends. Any gap or location change
    /// closes the run. Fails with `EmptyIntervalSet` when there is nothing to
    /// seed the first run from.
    pub fn coalesce(
        mac_address: &str,
        intervals: &[ProximityInterval],
    ) -> Result<Vec<DwellInterval>, TraceError> {
        let (first, rest) = intervals
            .split_first()
            .ok_or_else(|| TraceError::EmptyIntervalSet {
                mac_address: mac_address.to_string(),
            })?;

        let mut dwell = Vec::new();
        let mut run = DwellInterval {
            location: first.location.clone(),
            start_ms: first.start_ms,
            end_ms: first.end_ms,
        };

        for interval in rest {
            if interval.location == run.location && interval.start_ms == run.end_ms {
                run.end_ms = interval.end_ms;
            } else {
                let next = DwellInterval {
                    location: interval.location.clone(),
                    start_ms: interval.start_ms,
                    end_ms: interval.end_ms,
                };
                dwell.push(std::mem::replace(&mut run, next));
            }
        }

        dwell.push(run);
        Ok(dwell)
    }
}

/// Coalesce one device's intervals into dwell runs
pub fn coalesce_dwell(
    mac_address: &str,
    intervals: &[ProximityInterval],
) -> Result<Vec<DwellInterval>, TraceError> {
    DwellCoalescer::coalesce(mac_address, intervals)
}

/// Apply the configured ordering to one device's intervals
pub fn order_intervals(
    intervals: &[ProximityInterval],
    ordering: IntervalOrdering,
) -> Vec<ProximityInterval> {
    let mut ordered = intervals.to_vec();
    if ordering == IntervalOrdering::SortByStart {
        ordered.sort_by_key(|i| i.start_ms);
    }
    ordered
}
