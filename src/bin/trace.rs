//! Trace CLI - Command-line interface for proximity-trace
//!
//! Commands:
//! - process: Turn one webhook delivery into report files
//! - analyze: Print the reports for a delivery without writing files
//! - validate: Check a delivery against the webhook schema
//! - schema: Print the accepted webhook schema

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use proximity_trace::formatter::{DwellLine, ExposureLine, ReportEncoder};
use proximity_trace::schema::PROXIMITY_EVENT_ID;
use proximity_trace::types::IntervalOrdering;
use proximity_trace::{
    parse_delivery, validate_delivery, DeliveryProcessor, TraceConfig, TraceError, TRACE_VERSION,
};

/// Trace - Contact-tracing reports from proximity webhook deliveries
#[derive(Parser)]
#[command(name = "trace")]
#[command(version = TRACE_VERSION)]
#[command(about = "Turn proximity webhook deliveries into contact-tracing reports", long_about = None)]
struct Cli {
    /// Log filter directive (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one delivery and write its report files
    Process {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// YAML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory under which the delivery directory is created
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Timezone for report timestamps (IANA format, e.g., "America/Los_Angeles")
        #[arg(long)]
        timezone: Option<String>,

        /// Trust the delivery order instead of sorting intervals by start time
        #[arg(long)]
        keep_order: bool,

        /// Do not append the raw payload to the audit log
        #[arg(long)]
        no_audit: bool,
    },

    /// Print per-device reports without writing files
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Timezone for report timestamps
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Trust the delivery order instead of sorting intervals by start time
        #[arg(long)]
        keep_order: bool,
    },

    /// Validate a delivery against the webhook schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the webhook payload JSON schema
    Schema,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one device per line)
    Ndjson,
    /// JSON array of devices
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .init();
}

fn run(cli: Cli) -> Result<(), TraceCliError> {
    match cli.command {
        Commands::Process {
            input,
            config,
            output_dir,
            timezone,
            keep_order,
            no_audit,
        } => {
            let mut config = match config {
                Some(path) => TraceConfig::from_file(&path)?,
                None => TraceConfig::default(),
            };
            if let Some(output_dir) = output_dir {
                config.output_dir = output_dir;
            }
            if let Some(timezone) = timezone {
                config.timezone = timezone;
            }
            if keep_order {
                config.interval_ordering = IntervalOrdering::AsReceived;
            }
            if no_audit {
                config.audit_log = false;
            }
            cmd_process(&input, config)
        }

        Commands::Analyze {
            input,
            output_format,
            timezone,
            keep_order,
        } => cmd_analyze(&input, output_format, timezone, keep_order),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Schema => {
            println!("{}", get_webhook_json_schema());
            Ok(())
        }
    }
}

fn cmd_process(input: &Path, config: TraceConfig) -> Result<(), TraceCliError> {
    let raw = read_input(input)?;
    let processor = DeliveryProcessor::new(config)?;
    let outcome = processor.process(&raw)?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn cmd_analyze(
    input: &Path,
    output_format: OutputFormat,
    timezone: String,
    keep_order: bool,
) -> Result<(), TraceCliError> {
    let raw = read_input(input)?;
    let config = TraceConfig {
        timezone,
        interval_ordering: if keep_order {
            IntervalOrdering::AsReceived
        } else {
            IntervalOrdering::SortByStart
        },
        audit_log: false,
        ..TraceConfig::default()
    };
    let encoder = ReportEncoder::new(config.validate()?);
    let processor = DeliveryProcessor::new(config)?;

    let delivery = parse_delivery(&raw)?;
    let mut devices = Vec::new();
    for report in processor.analyze(&delivery)? {
        devices.push(AnalyzedDevice {
            mac_address: report.mac_address.clone(),
            proximity_total_time: report
                .exposures
                .iter()
                .map(|e| encoder.encode_exposure(e))
                .collect(),
            dwell_total_time: report
                .dwell
                .iter()
                .map(|d| encoder.encode_dwell(d))
                .collect::<Result<_, _>>()?,
        });
    }

    print!("{}", format_output(&devices, &output_format)?);
    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), TraceCliError> {
    let raw = read_input(input)?;
    let issues = validate_delivery(&raw);

    let report = ValidationReport {
        valid: issues.is_empty(),
        issues: issues.iter().map(|i| i.to_string()).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Valid:  {}", report.valid);
        println!("Issues: {}", report.issues.len());

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for issue in &report.issues {
                println!("  - {}", issue);
            }
        }
    }

    if report.valid {
        Ok(())
    } else {
        Err(TraceCliError::ValidationFailed(report.issues.len()))
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, TraceCliError> {
    if input.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(TraceCliError::NoInput);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn format_output(devices: &[AnalyzedDevice], format: &OutputFormat) -> Result<String, TraceCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for device in devices {
                lines.push(serde_json::to_string(device)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(devices)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(devices)? + "\n"),
    }
}

fn get_webhook_json_schema() -> String {
    let epoch = serde_json::json!({
        "type": ["integer", "string"],
        "description": "Epoch milliseconds"
    });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "proximity webhook delivery",
        "description": format!("Payload delivered for event {}", PROXIMITY_EVENT_ID),
        "type": "object",
        "required": ["details"],
        "properties": {
            "details": {
                "type": "object",
                "required": ["user_name", "time_resolution", "number_days", "start_time", "end_time", "client_proximity"],
                "properties": {
                    "user_name": { "type": "string" },
                    "time_resolution": { "type": ["integer", "string"] },
                    "number_days": { "type": ["integer", "string"] },
                    "start_time": epoch,
                    "end_time": epoch,
                    "client_proximity": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["mac_address", "client_info"],
                            "properties": {
                                "mac_address": { "type": "string" },
                                "client_info": {
                                    "type": "array",
                                    "items": {
                                        "type": "object",
                                        "required": ["location", "start_time", "end_time", "users_info"],
                                        "properties": {
                                            "location": { "type": "string" },
                                            "start_time": epoch,
                                            "end_time": epoch,
                                            "users_info": {
                                                "type": "array",
                                                "items": {
                                                    "type": "object",
                                                    "required": ["client_mac", "client_user", "client_type"],
                                                    "additionalProperties": false,
                                                    "properties": {
                                                        "client_mac": { "type": "string" },
                                                        "client_user": { "type": "string" },
                                                        "client_type": { "type": "string" }
                                                    }
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum TraceCliError {
    Io(io::Error),
    Trace(TraceError),
    Json(serde_json::Error),
    NoInput,
    ValidationFailed(usize),
}

impl From<io::Error> for TraceCliError {
    fn from(e: io::Error) -> Self {
        TraceCliError::Io(e)
    }
}

impl From<TraceError> for TraceCliError {
    fn from(e: TraceError) -> Self {
        TraceCliError::Trace(e)
    }
}

impl From<serde_json::Error> for TraceCliError {
    fn from(e: serde_json::Error) -> Self {
        TraceCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<TraceCliError> for CliError {
    fn from(e: TraceCliError) -> Self {
        match e {
            TraceCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            TraceCliError::Trace(e) => {
                let hint = match &e {
                    TraceError::MalformedPayload(_) => "Run 'trace validate' for details",
                    TraceError::EmptyIntervalSet { .. } => {
                        "Every traced device needs at least one interval"
                    }
                    TraceError::IoFailure { .. } => {
                        "The raw payload is in the audit log; reprocess once the path is writable"
                    }
                    TraceError::InvalidTimezone(_) => "Use an IANA name such as America/Los_Angeles",
                    TraceError::Config(_) => "Check the configuration file",
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            TraceCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            TraceCliError::NoInput => CliError {
                code: "NO_INPUT".to_string(),
                message: "stdin is a terminal, expected a piped payload".to_string(),
                hint: Some("Pipe the webhook body or pass --input <file>".to_string()),
            },
            TraceCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} issues found in payload", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct AnalyzedDevice {
    mac_address: String,
    proximity_total_time: Vec<ExposureLine>,
    dwell_total_time: Vec<DwellLine>,
}

#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    issues: Vec<String>,
}
