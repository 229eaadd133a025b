//! focuswatch CLI
//!
//! Commands:
//! - score: Score sensor snapshots into focus results
//! - doctor: Check configuration and on-device attendance files
//! - pending: List attendance records waiting for resend
//! - config: Print the default device configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use focuswatch::platform::{AttendanceStore, JsonFileStore};
use focuswatch::{
    DeviceConfig, DeviceError, FocusData, FocusEngine, FocusSession, SensorData,
    FOCUSWATCH_VERSION, PRODUCER_NAME,
};

/// focuswatch - focus scoring and attendance for classroom wearables
#[derive(Parser)]
#[command(name = "focuswatch")]
#[command(version = FOCUSWATCH_VERSION)]
#[command(about = "Score wearable sensor snapshots and inspect attendance state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score sensor snapshots (SensorData JSON) into focus results
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Device configuration file (defaults apply when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the session summary to stderr after scoring
        #[arg(long)]
        summary: bool,
    },

    /// Check configuration and attendance files
    Doctor {
        /// Device configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory holding day_state.json and pending.json
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List attendance records queued for resend
    Pending {
        /// Directory holding pending.json
        #[arg(long)]
        data_dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default device configuration
    Config,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one snapshot per line)
    Ndjson,
    /// JSON array of snapshots
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one result per line)
    Ndjson,
    /// JSON array of results
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable; `RUST_LOG` overrides the level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), FocusCliError> {
    match cli.command {
        Commands::Score {
            input,
            output,
            input_format,
            output_format,
            config,
            summary,
        } => cmd_score(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            summary,
        ),
        Commands::Doctor {
            config,
            data_dir,
            json,
        } => cmd_doctor(config.as_deref(), data_dir.as_deref(), json),
        Commands::Pending { data_dir, json } => cmd_pending(&data_dir, json),
        Commands::Config => cmd_config(),
    }
}

fn load_config(path: Option<&Path>) -> Result<DeviceConfig, FocusCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(DeviceConfig::from_json(&json)?)
        }
        None => Ok(DeviceConfig::default()),
    }
}

fn parse_snapshots(input: &str, format: &InputFormat) -> Result<Vec<SensorData>, FocusCliError> {
    match format {
        InputFormat::Json => Ok(serde_json::from_str(input)?),
        InputFormat::Ndjson => input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str(line.trim()).map_err(|e| {
                    FocusCliError::ParseError(format!("line {}: {}", index + 1, e))
                })
            })
            .collect(),
    }
}

fn cmd_score(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    summary: bool,
) -> Result<(), FocusCliError> {
    let config = load_config(config)?;

    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let snapshots = parse_snapshots(&input_data, &input_format)?;
    if snapshots.is_empty() {
        return Err(FocusCliError::NoSnapshots);
    }
    debug!(count = snapshots.len(), "scoring snapshots");

    let engine = FocusEngine::new(config.focus);
    let mut session = FocusSession::new(config.session.window_size);
    let results: Vec<FocusData> = snapshots
        .iter()
        .map(|data| {
            let focus = engine.calculate_focus_score(data);
            session.record(data, &focus);
            focus
        })
        .collect();

    let output_data = format_output(&results, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
        io::stdout().flush()?;
    } else {
        fs::write(output, output_data)?;
    }

    if summary {
        eprintln!("{}", serde_json::to_string_pretty(&session.summary())?);
    }
    Ok(())
}

fn format_output(results: &[FocusData], format: &OutputFormat) -> Result<String, FocusCliError> {
    Ok(match format {
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for focus in results {
                out.push_str(&serde_json::to_string(focus)?);
                out.push('\n');
            }
            out
        }
        OutputFormat::Json => serde_json::to_string(results)? + "\n",
        OutputFormat::JsonPretty => serde_json::to_string_pretty(results)? + "\n",
    })
}

fn cmd_doctor(
    config: Option<&Path>,
    data_dir: Option<&Path>,
    json: bool,
) -> Result<(), FocusCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck::ok(
        "version",
        format!("focuswatch version {}", FOCUSWATCH_VERSION),
    ));

    match config {
        Some(path) => checks.push(match load_config(Some(path)) {
            Ok(cfg) => DoctorCheck::ok(
                "config",
                format!(
                    "Config valid (student {}, class {})",
                    cfg.identity.student_id, cfg.identity.class_id
                ),
            ),
            Err(e) => DoctorCheck::error("config", CliError::from(e).message),
        }),
        None => checks.push(DoctorCheck::warning(
            "config",
            "No config given, defaults in use".to_string(),
        )),
    }

    if let Some(dir) = data_dir {
        checks.extend(check_data_dir(dir));
    }

    checks.push(if atty::is(atty::Stream::Stdin) {
        DoctorCheck::ok("stdin", "stdin is a TTY (interactive mode)".to_string())
    } else {
        DoctorCheck::ok("stdin", "stdin is a pipe (ready for score)".to_string())
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FOCUSWATCH_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("focuswatch Doctor Report");
        println!("========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(FocusCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_data_dir(dir: &Path) -> Vec<DoctorCheck> {
    if !dir.is_dir() {
        return vec![DoctorCheck::error(
            "data_dir",
            format!("{} is not a directory", dir.display()),
        )];
    }

    let store = match JsonFileStore::open(dir) {
        Ok(store) => store,
        Err(e) => return vec![DoctorCheck::error("data_dir", e.to_string())],
    };

    let day_state = match store.load_day_state() {
        Ok(Some(state)) => match state.last_marked_day() {
            Some(day) => DoctorCheck::ok("day_state", format!("Last marked on {}", day)),
            None => DoctorCheck::ok("day_state", "Never marked".to_string()),
        },
        Ok(None) => DoctorCheck::warning("day_state", "No day state file yet".to_string()),
        Err(e) => DoctorCheck::error("day_state", format!("Unreadable day state: {}", e)),
    };

    let pending = match store.load_pending_records() {
        Ok(records) if records.is_empty() => {
            DoctorCheck::ok("pending", "No records waiting for resend".to_string())
        }
        Ok(records) => DoctorCheck::warning(
            "pending",
            format!("{} record(s) waiting for resend", records.len()),
        ),
        Err(e) => DoctorCheck::error("pending", format!("Unreadable pending queue: {}", e)),
    };

    vec![day_state, pending]
}

fn cmd_pending(data_dir: &Path, json: bool) -> Result<(), FocusCliError> {
    let store = JsonFileStore::open(data_dir)?;
    let records = store.load_pending_records()?;
    info!(count = records.len(), "loaded pending records");

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No pending attendance records");
        return Ok(());
    }
    println!("Pending attendance records");
    println!("==========================");
    for pending in &records {
        println!(
            "  {} student={} class={} tag={} at={} attempts={}",
            pending.id,
            pending.record.student_id,
            pending.record.class_id,
            pending.record.nfc_tag_id,
            pending.record.timestamp,
            pending.attempts
        );
    }
    Ok(())
}

fn cmd_config() -> Result<(), FocusCliError> {
    println!("{}", DeviceConfig::default().to_json()?);
    Ok(())
}

#[derive(Debug)]
enum FocusCliError {
    Io(io::Error),
    Device(DeviceError),
    Json(serde_json::Error),
    ParseError(String),
    NoSnapshots,
    DoctorFailed,
}

impl From<io::Error> for FocusCliError {
    fn from(e: io::Error) -> Self {
        FocusCliError::Io(e)
    }
}

impl From<DeviceError> for FocusCliError {
    fn from(e: DeviceError) -> Self {
        FocusCliError::Device(e)
    }
}

impl From<serde_json::Error> for FocusCliError {
    fn from(e: serde_json::Error) -> Self {
        FocusCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FocusCliError> for CliError {
    fn from(e: FocusCliError) -> Self {
        match e {
            FocusCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FocusCliError::Device(DeviceError::InvalidConfig(msg)) => CliError {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Run 'focuswatch config' for a valid starting point".to_string()),
            },
            FocusCliError::Device(e) => CliError {
                code: "DEVICE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'focuswatch doctor' for details".to_string()),
            },
            FocusCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FocusCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some(
                    "Each snapshot needs heartRate, steps, movementCount, interactionCount and timestamp"
                        .to_string(),
                ),
            },
            FocusCliError::NoSnapshots => CliError {
                code: "NO_SNAPSHOTS".to_string(),
                message: "No sensor snapshots found in input".to_string(),
                hint: Some("Ensure input is not empty".to_string()),
            },
            FocusCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn ok(name: &str, message: String) -> Self {
        Self::new(name, CheckStatus::Ok, message)
    }

    fn warning(name: &str, message: String) -> Self {
        Self::new(name, CheckStatus::Warning, message)
    }

    fn error(name: &str, message: String) -> Self {
        Self::new(name, CheckStatus::Error, message)
    }

    fn new(name: &str, status: CheckStatus, message: String) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
