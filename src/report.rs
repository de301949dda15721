//! Report persistence
//!
//! Writes one directory per delivery with two newline-delimited artifacts per
//! traced device, and keeps the append-only raw payload audit log.
//!
//! Reports are best-effort: devices written before a failure stay on disk and
//! nothing is rolled back. The audit log is appended before any
//! transformation, so a failed delivery can always be reprocessed from it.

use crate::error::TraceError;
use crate::formatter::{delivery_dir_name, mac_file_stem, ReportEncoder};
use crate::types::TracedDeviceReport;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// File name prefix of the contact exposure report
pub const EXPOSURE_REPORT_PREFIX: &str = "proximity_total_time_";

/// File name prefix of the dwell-time report
pub const DWELL_REPORT_PREFIX: &str = "dwell_total_time_";

/// Exposure report file name for a traced device
pub fn exposure_report_name(mac_address: &str) -> String {
    format!("{EXPOSURE_REPORT_PREFIX}{}.txt", mac_file_stem(mac_address))
}

/// Dwell report file name for a traced device
pub fn dwell_report_name(mac_address: &str) -> String {
    format!("{DWELL_REPORT_PREFIX}{}.txt", mac_file_stem(mac_address))
}

/// Writer for per-delivery report directories
#[derive(Debug, Clone)]
pub struct ReportWriter {
    output_dir: PathBuf,
    encoder: ReportEncoder,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, encoder: ReportEncoder) -> Self {
        Self {
            output_dir: output_dir.into(),
            encoder,
        }
    }

    /// Create the directory for one delivery.
    ///
    /// The leaf is created exclusively: a second delivery for the same user
    /// within the same second fails instead of overwriting the first. The
    /// name must be a single plain component directly under the output root.
    pub fn create_delivery_dir(
        &self,
        user_name: &str,
        received_at: DateTime<Utc>,
    ) -> Result<PathBuf, TraceError> {
        let name = delivery_dir_name(user_name, received_at, self.encoder.timezone());
        let mut components = Path::new(&name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) || name.contains(['/', '\\'])
        {
            return Err(TraceError::MalformedPayload(format!(
                "user_name {user_name:?} does not form a directory name under the output root"
            )));
        }

        fs::create_dir_all(&self.output_dir).map_err(|e| TraceError::io(&self.output_dir, e))?;

        let dir = self.output_dir.join(name);
        fs::create_dir(&dir).map_err(|e| TraceError::io(&dir, e))?;

        debug!(dir = %dir.display(), "created delivery directory");
        Ok(dir)
    }

    /// Write both artifacts for one device, exposure report first.
    ///
    /// Both reports are rendered before anything touches the disk.
    pub fn write_device(
        &self,
        dir: &Path,
        report: &TracedDeviceReport,
    ) -> Result<Vec<PathBuf>, TraceError> {
        let exposure = self.encoder.exposure_report(&report.exposures)?;
        let dwell = self.encoder.dwell_report(&report.dwell)?;

        let exposure_path = dir.join(exposure_report_name(&report.mac_address));
        fs::write(&exposure_path, exposure).map_err(|e| TraceError::io(&exposure_path, e))?;

        let dwell_path = dir.join(dwell_report_name(&report.mac_address));
        fs::write(&dwell_path, dwell).map_err(|e| TraceError::io(&dwell_path, e))?;

        debug!(
            mac_address = %report.mac_address,
            contacts = report.exposures.len(),
            dwell_intervals = report.dwell.len(),
            "wrote device reports"
        );
        Ok(vec![exposure_path, dwell_path])
    }
}

/// Append-only log of every raw payload received
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one payload as a single line
    pub fn append(&self, raw_json: &str) -> Result<(), TraceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TraceError::io(parent, e))?;
        }

        let line = single_line(raw_json);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TraceError::io(&self.path, e))?;
        writeln!(file, "{line}").map_err(|e| TraceError::io(&self.path, e))?;
        Ok(())
    }
}

fn single_line(raw_json: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw_json) {
        Ok(value) => value.to_string(),
        // Keep unparseable payloads too, flattened so one line stays one delivery
        Err(_) => raw_json.replace(['\r', '\n'], " "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContactExposure, DwellInterval};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn writer(root: &Path) -> ReportWriter {
        ReportWriter::new(root, ReportEncoder::new(chrono_tz::UTC))
    }

    fn sample_report() -> TracedDeviceReport {
        TracedDeviceReport {
            mac_address: "a4:83:e7:11:22:33".to_string(),
            exposures: vec![ContactExposure {
                contact_mac: "aa:bb".to_string(),
                contact_user: "alice".to_string(),
                contact_type: "phone".to_string(),
                total_duration_ms: 8_000,
                sightings: 2,
            }],
            dwell: vec![DwellInterval {
                location: "Floor1".to_string(),
                start_ms: 1_612_800_000_000,
                end_ms: 1_612_800_900_000,
            }],
        }
    }

    #[test]
    fn test_report_names() {
        assert_eq!(
            exposure_report_name("a4:83:e7:11:22:33"),
            "proximity_total_time_a483e7112233.txt"
        );
        assert_eq!(
            dwell_report_name("a4:83:e7:11:22:33"),
            "dwell_total_time_a483e7112233.txt"
        );
    }

    #[test]
    fn test_write_device_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = writer(tmp.path());
        let received = Utc.with_ymd_and_hms(2021, 2, 8, 16, 4, 5).unwrap();

        let dir = writer.create_delivery_dir("gabiz", received).unwrap();
        assert_eq!(dir, tmp.path().join("gabiz-20210208-160405"));

        let paths = writer.write_device(&dir, &sample_report()).unwrap();
        assert_eq!(
            paths,
            vec![
                dir.join("proximity_total_time_a483e7112233.txt"),
                dir.join("dwell_total_time_a483e7112233.txt"),
            ]
        );

        let exposure = fs::read_to_string(&paths[0]).unwrap();
        assert!(exposure.contains("\"total_time\":\"0:00:00:08\""));
        let dwell = fs::read_to_string(&paths[1]).unwrap();
        assert!(dwell.contains("\"start_time\":\"2021-02-08 16:00:00\""));
        assert!(dwell.contains("\"end_time\":\"2021-02-08 16:15:00\""));
    }

    #[test]
    fn test_delivery_dir_collision_is_io_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = writer(tmp.path());
        let received = Utc.with_ymd_and_hms(2021, 2, 8, 16, 4, 5).unwrap();

        writer.create_delivery_dir("gabiz", received).unwrap();
        let err = writer.create_delivery_dir("gabiz", received).unwrap_err();
        assert!(matches!(err, TraceError::IoFailure { .. }));
    }

    #[test]
    fn test_delivery_dir_stays_under_output_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("out");
        let writer = writer(&root);
        let received = Utc.with_ymd_and_hms(2021, 2, 9, 10, 30, 0).unwrap();

        for user in ["../escaped", "team/alice", "team\\alice"] {
            let err = writer.create_delivery_dir(user, received).unwrap_err();
            assert!(matches!(err, TraceError::MalformedPayload(_)), "{user}");
        }

        // Rejected before anything was created
        assert!(!root.exists());
        assert!(!tmp.path().join("escaped-20210209-103000").exists());
    }

    #[test]
    fn test_unwritable_directory_is_io_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = writer(tmp.path());
        let missing = tmp.path().join("does-not-exist");

        let err = writer.write_device(&missing, &sample_report()).unwrap_err();
        match err {
            TraceError::IoFailure { path, .. } => {
                assert_eq!(path, missing.join("proximity_total_time_a483e7112233.txt"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_audit_log_appends_single_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let log = AuditLog::new(tmp.path().join("logs").join("client_proximity_data.log"));

        log.append("{\n  \"details\": {}\n}").unwrap();
        log.append("not\njson").unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![r#"{"details":{}}"#, "not json"]);
    }
}
