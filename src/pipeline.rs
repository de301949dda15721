//! Pipeline orchestration
//!
//! This module provides the public API for proximity-trace. It orchestrates
//! one webhook delivery from raw JSON to report files on disk.

use crate::aggregator::ContactAggregator;
use crate::config::TraceConfig;
use crate::dwell::{order_intervals, DwellCoalescer};
use crate::error::TraceError;
use crate::formatter::ReportEncoder;
use crate::report::{AuditLog, ReportWriter};
use crate::schema::DeliveryAdapter;
use crate::types::{IntervalOrdering, TracedDevice, TracedDeviceReport, WebhookDelivery};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Process one webhook delivery and write its reports.
///
/// # Arguments
/// * `raw_json` - Webhook body as received
/// * `config` - Output directory, timezone and ordering settings
///
/// # Returns
/// Paths of the written report files, exposure then dwell for each device
///
/// # Example
/// ```ignore
/// let paths = process_delivery(&body, &TraceConfig::default())?;
/// ```
pub fn process_delivery(raw_json: &str, config: &TraceConfig) -> Result<Vec<PathBuf>, TraceError> {
    let processor = DeliveryProcessor::new(config.clone())?;
    Ok(processor.process(raw_json)?.written)
}

/// Result of a fully processed delivery
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    /// Identifier attached to this delivery's log events
    pub delivery_id: Uuid,
    pub user_name: String,
    pub received_at: DateTime<Utc>,
    /// Directory holding this delivery's reports
    pub directory: PathBuf,
    /// Every report file written, in device order
    pub written: Vec<PathBuf>,
    pub devices: Vec<DeviceSummary>,
}

/// Per-device counts for a processed delivery
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub mac_address: String,
    pub intervals: usize,
    pub contacts: usize,
    pub dwell_intervals: usize,
}

/// Processor holding validated configuration.
///
/// Holds no mutable state, so one processor can serve concurrent deliveries.
#[derive(Debug, Clone)]
pub struct DeliveryProcessor {
    config: TraceConfig,
    writer: ReportWriter,
    audit_log: Option<AuditLog>,
}

impl DeliveryProcessor {
    /// Validate the configuration and build a processor
    pub fn new(config: TraceConfig) -> Result<Self, TraceError> {
        let timezone = config.validate()?;
        let writer = ReportWriter::new(config.output_dir.clone(), ReportEncoder::new(timezone));
        let audit_log = config.audit_log_path().map(AuditLog::new);

        Ok(Self {
            config,
            writer,
            audit_log,
        })
    }

    /// Process a delivery received now
    pub fn process(&self, raw_json: &str) -> Result<DeliveryOutcome, TraceError> {
        self.process_at(raw_json, Utc::now())
    }

    /// Process a delivery with an explicit receipt time.
    ///
    /// Pipeline stages:
    /// 1. AuditLog - append the raw payload
    /// 2. DeliveryAdapter - parse and validate
    /// 3. ContactAggregator / DwellCoalescer - per-device reports
    /// 4. ReportWriter - delivery directory and artifacts
    pub fn process_at(
        &self,
        raw_json: &str,
        received_at: DateTime<Utc>,
    ) -> Result<DeliveryOutcome, TraceError> {
        let delivery_id = Uuid::new_v4();

        // Stage 1: Audit before anything can fail on content
        if let Some(audit_log) = &self.audit_log {
            audit_log.append(raw_json)?;
        }

        // Stage 2: Parse
        let delivery = DeliveryAdapter::parse(raw_json).inspect_err(|e| {
            warn!(%delivery_id, error = %e, "rejected proximity delivery");
        })?;

        info!(
            %delivery_id,
            user_name = %delivery.user_name,
            devices = delivery.devices.len(),
            intervals = delivery.interval_count(),
            time_resolution = delivery.time_resolution,
            number_days = delivery.number_days,
            window_start_ms = delivery.start_ms,
            window_end_ms = delivery.end_ms,
            "received proximity delivery"
        );

        // Stages 3 and 4, one device at a time
        let directory = self
            .writer
            .create_delivery_dir(&delivery.user_name, received_at)?;

        let mut written = Vec::new();
        let mut devices = Vec::new();
        for device in &delivery.devices {
            let report = self
                .analyze_device(device)
                .and_then(|report| {
                    written.extend(self.writer.write_device(&directory, &report)?);
                    Ok(report)
                })
                .inspect_err(|e| {
                    warn!(
                        %delivery_id,
                        mac_address = %device.mac_address,
                        written = written.len(),
                        error = %e,
                        "delivery failed; earlier device reports are kept"
                    );
                })?;

            devices.push(DeviceSummary {
                mac_address: report.mac_address,
                intervals: device.intervals.len(),
                contacts: report.exposures.len(),
                dwell_intervals: report.dwell.len(),
            });
        }

        info!(
            %delivery_id,
            directory = %directory.display(),
            files = written.len(),
            "proximity reports completed"
        );

        Ok(DeliveryOutcome {
            delivery_id,
            user_name: delivery.user_name,
            received_at,
            directory,
            written,
            devices,
        })
    }

    /// Compute every device's reports without touching the filesystem
    pub fn analyze(&self, delivery: &WebhookDelivery) -> Result<Vec<TracedDeviceReport>, TraceError> {
        delivery
            .devices
            .iter()
            .map(|device| self.analyze_device(device))
            .collect()
    }

    /// Compute exposure and dwell reports for one traced device
    pub fn analyze_device(&self, device: &TracedDevice) -> Result<TracedDeviceReport, TraceError> {
        analyze_device(device, self.config.interval_ordering)
    }
}

/// Compute exposure and dwell reports for one traced device.
///
/// Contact totals use the delivery order; only the dwell input is reordered.
pub fn analyze_device(
    device: &TracedDevice,
    ordering: IntervalOrdering,
) -> Result<TracedDeviceReport, TraceError> {
    let exposures = ContactAggregator::aggregate(&device.intervals);

    let ordered = order_intervals(&device.intervals, ordering);
    let dwell = DwellCoalescer::coalesce(&device.mac_address, &ordered)?;

    debug!(
        mac_address = %device.mac_address,
        intervals = device.intervals.len(),
        contacts = exposures.len(),
        dwell_intervals = dwell.len(),
        "analyzed traced device"
    );

    Ok(TracedDeviceReport {
        mac_address: device.mac_address.clone(),
        exposures,
        dwell,
    })
}
