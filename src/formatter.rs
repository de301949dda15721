//! Report formatting
//!
//! Renders exposure totals and dwell intervals into report lines. Durations
//! stay in milliseconds through aggregation and are converted to
//! `D:HH:MM:SS` only here, truncating to whole seconds.

use crate::error::TraceError;
use crate::types::{ContactExposure, DwellInterval};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Display format for local timestamps
pub const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used for the receipt-time part of a delivery directory name
pub const DIRECTORY_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const SECONDS_PER_DAY: i64 = 86_400;

/// Resolve an IANA timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, TraceError> {
    name.parse::<Tz>()
        .map_err(|_| TraceError::InvalidTimezone(name.to_string()))
}

/// Format a millisecond duration as `D:HH:MM:SS`.
///
/// Sub-second remainders are discarded, never rounded.
pub fn format_duration(duration_ms: i64) -> String {
    let total_secs = duration_ms.max(0) / 1000;
    let days = total_secs / SECONDS_PER_DAY;
    let hours = (total_secs % SECONDS_PER_DAY) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{days}:{hours:02}:{minutes:02}:{seconds:02}")
}

/// Format an epoch-millisecond instant as local time in `tz`
pub fn format_local(epoch_ms: i64, tz: &Tz) -> Result<String, TraceError> {
    let utc = Utc
        .timestamp_opt(epoch_ms.div_euclid(1000), 0)
        .single()
        .ok_or_else(|| {
            TraceError::MalformedPayload(format!("timestamp out of range: {epoch_ms}"))
        })?;
    Ok(utc.with_timezone(tz).format(LOCAL_TIME_FORMAT).to_string())
}

/// Strip separator characters from a MAC address for use in file names
pub fn mac_file_stem(mac_address: &str) -> String {
    mac_address
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect()
}

/// Directory name for one delivery: `{user}-{YYYYmmdd-HHMMSS}` in local time
pub fn delivery_dir_name(user_name: &str, received_at: DateTime<Utc>, tz: &Tz) -> String {
    format!(
        "{}-{}",
        user_name,
        received_at.with_timezone(tz).format(DIRECTORY_STAMP_FORMAT)
    )
}

/// One line of the proximity total-time report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureLine {
    pub client_mac: String,
    pub client_user: String,
    pub client_type: String,
    pub total_time: String,
    pub sightings: u32,
}

/// One line of the dwell-time report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwellLine {
    pub location: String,
    pub start_time: String,
    pub end_time: String,
    pub duration: String,
}

/// Encoder for newline-delimited report artifacts
#[derive(Debug, Clone)]
pub struct ReportEncoder {
    timezone: Tz,
}

impl ReportEncoder {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> &Tz {
        &self.timezone
    }

    pub fn encode_exposure(&self, exposure: &ContactExposure) -> ExposureLine {
        ExposureLine {
            client_mac: exposure.contact_mac.clone(),
            client_user: exposure.contact_user.clone(),
            client_type: exposure.contact_type.clone(),
            total_time: format_duration(exposure.total_duration_ms),
            sightings: exposure.sightings,
        }
    }

    pub fn encode_dwell(&self, dwell: &DwellInterval) -> Result<DwellLine, TraceError> {
        Ok(DwellLine {
            location: dwell.location.clone(),
            start_time: format_local(dwell.start_ms, &self.timezone)?,
            end_time: format_local(dwell.end_ms, &self.timezone)?,
            duration: format_duration(dwell.duration_ms()),
        })
    }

    /// Render the exposure report, one JSON record per line
    pub fn exposure_report(&self, exposures: &[ContactExposure]) -> Result<String, TraceError> {
        let lines = exposures
            .iter()
            .map(|e| serde_json::to_string(&self.encode_exposure(e)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(join_lines(lines))
    }

    /// Render the dwell report, one JSON record per line, chronological
    pub fn dwell_report(&self, dwell: &[DwellInterval]) -> Result<String, TraceError> {
        let mut lines = Vec::with_capacity(dwell.len());
        for interval in dwell {
            lines.push(serde_json::to_string(&self.encode_dwell(interval)?)?);
        }
        Ok(join_lines(lines))
    }
}

fn join_lines(lines: Vec<String>) -> String {
    if lines.is_empty() {
        return String::new();
    }
    lines.join("\n") + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(8_000), "0:00:00:08");
        assert_eq!(format_duration(0), "0:00:00:00");
        assert_eq!(format_duration(3_599_999), "0:00:59:59");
        assert_eq!(format_duration(90_061_000), "1:01:01:01");
        assert_eq!(format_duration(14 * 86_400_000), "14:00:00:00");
    }

    #[test]
    fn test_format_duration_truncates() {
        assert_eq!(format_duration(8_999), "0:00:00:08");
    }

    #[test]
    fn test_format_local_utc_and_pacific() {
        // 2021-02-08T16:00:00Z
        let ms = 1_612_800_000_000;
        assert_eq!(format_local(ms, &chrono_tz::UTC).unwrap(), "2021-02-08 16:00:00");
        assert_eq!(
            format_local(ms, &chrono_tz::America::Los_Angeles).unwrap(),
            "2021-02-08 08:00:00"
        );
    }

    #[test]
    fn test_format_local_drops_milliseconds() {
        let ms = 1_612_800_000_999;
        assert_eq!(format_local(ms, &chrono_tz::UTC).unwrap(), "2021-02-08 16:00:00");
    }

    #[test]
    fn test_parse_timezone() {
        assert!(parse_timezone("America/Los_Angeles").is_ok());
        assert!(matches!(
            parse_timezone("Mars/Olympus_Mons"),
            Err(TraceError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_mac_file_stem() {
        assert_eq!(mac_file_stem("a4:83:e7:11:22:33"), "a483e7112233");
        assert_eq!(mac_file_stem("a483.e711.2233"), "a483e7112233");
        assert_eq!(mac_file_stem("A4-83-E7-11-22-33"), "A483E7112233");
    }

    #[test]
    fn test_delivery_dir_name() {
        let received = Utc.with_ymd_and_hms(2021, 2, 8, 16, 4, 5).unwrap();
        assert_eq!(
            delivery_dir_name("gabiz", received, &chrono_tz::UTC),
            "gabiz-20210208-160405"
        );
        assert_eq!(
            delivery_dir_name("gabiz", received, &chrono_tz::America::Los_Angeles),
            "gabiz-20210208-080405"
        );
    }

    #[test]
    fn test_exposure_report_lines() {
        let encoder = ReportEncoder::new(chrono_tz::UTC);
        let exposures = vec![
            ContactExposure {
                contact_mac: "aa:bb".to_string(),
                contact_user: "alice".to_string(),
                contact_type: "phone".to_string(),
                total_duration_ms: 8_000,
                sightings: 2,
            },
            ContactExposure {
                contact_mac: "cc:dd".to_string(),
                contact_user: "bob".to_string(),
                contact_type: "laptop".to_string(),
                total_duration_ms: 1_000,
                sightings: 1,
            },
        ];

        let report = encoder.exposure_report(&exposures).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(report.ends_with('\n'));

        let first: ExposureLine = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.client_mac, "aa:bb");
        assert_eq!(first.total_time, "0:00:00:08");
        assert_eq!(first.sightings, 2);
    }

    #[test]
    fn test_dwell_report_lines() {
        let encoder = ReportEncoder::new(chrono_tz::UTC);
        let dwell = vec![DwellInterval {
            location: "Global/SJC/Floor1".to_string(),
            start_ms: 1_612_800_000_000,
            end_ms: 1_612_801_800_000,
        }];

        let report = encoder.dwell_report(&dwell).unwrap();
        let line: DwellLine = serde_json::from_str(report.trim_end()).unwrap();
        assert_eq!(
            line,
            DwellLine {
                location: "Global/SJC/Floor1".to_string(),
                start_time: "2021-02-08 16:00:00".to_string(),
                end_time: "2021-02-08 16:30:00".to_string(),
                duration: "0:00:30:00".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_report_is_empty_file() {
        let encoder = ReportEncoder::new(chrono_tz::UTC);
        assert_eq!(encoder.exposure_report(&[]).unwrap(), "");
    }
}
