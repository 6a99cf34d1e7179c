//! Archetype CLI - Command-line interface for the visitor archetype classifier
//!
//! Commands:
//! - classify: Classify a file of visitor events (batch mode)
//! - run: Classify streaming input from stdin (streaming mode)
//! - validate: Validate visitor event schema
//! - config: Print the default classifier configuration
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uuid::Uuid;

use visitor_archetypes::schema::{self, VisitorEvent, SCHEMA_VERSION};
use visitor_archetypes::{
    ArchetypeClassifier, ClassificationOutcome, ClassifierConfig, ClassifierError, Verdict,
    CLASSIFIER_VERSION, PRODUCER_NAME,
};

/// Archetype - Deterministic behavioral classifier for visitor sessions
#[derive(Parser)]
#[command(name = "archetype")]
#[command(author = "Synheart AI Inc")]
#[command(version = CLASSIFIER_VERSION)]
#[command(about = "Classify visitor sessions into behavioral archetypes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify visitor events, one outcome per session (batch mode)
    Classify {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Classifier configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Load sessions from file before classifying
        #[arg(long)]
        load_sessions: Option<PathBuf>,

        /// Save sessions to file after classifying
        #[arg(long)]
        save_sessions: Option<PathBuf>,
    },

    /// Classify streaming NDJSON events from stdin (streaming mode)
    Run {
        /// Classifier configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Load sessions from file
        #[arg(long)]
        load_sessions: Option<PathBuf>,

        /// Save sessions to file on exit
        #[arg(long)]
        save_sessions: Option<PathBuf>,

        /// Flush output after each record (`--flush false` to buffer)
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        flush: bool,
    },

    /// Validate visitor event schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the default classifier configuration
    Config,

    /// Diagnose configuration and environment
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one outcome per line)
    Ndjson,
    /// JSON array of outcomes
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("ARCHETYPE_LOG", "warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ArchetypeCliError> {
    match cli.command {
        Commands::Classify {
            input,
            output,
            input_format,
            output_format,
            config,
            load_sessions,
            save_sessions,
        } => cmd_classify(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            load_sessions.as_deref(),
            save_sessions.as_deref(),
        ),

        Commands::Run {
            config,
            load_sessions,
            save_sessions,
            flush,
        } => cmd_run(
            config.as_deref(),
            load_sessions.as_deref(),
            save_sessions.as_deref(),
            flush,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Config => cmd_config(),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn cmd_classify(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    load_sessions: Option<&Path>,
    save_sessions: Option<&Path>,
) -> Result<(), ArchetypeCliError> {
    let input_data = read_input(input)?;
    let events = parse_events(&input_data, &input_format)?;

    if events.is_empty() {
        return Err(ArchetypeCliError::NoEvents);
    }

    let classifier = build_classifier(config, load_sessions)?;
    let report = classifier.classify_all(&events);

    if let Some(sessions_path) = save_sessions {
        fs::write(sessions_path, classifier.save_sessions()?)?;
    }

    let output_data = format_output(&report.outcomes, &output_format)?;

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    // Accepted sessions are already written; the exit status still reports the rest
    if !report.is_clean() {
        for rejection in &report.rejections {
            warn!("session {} rejected: {}", rejection.session_id, rejection.error);
        }
        return Err(ArchetypeCliError::SessionsRejected(report.rejections.len()));
    }

    Ok(())
}

fn cmd_run(
    config: Option<&Path>,
    load_sessions: Option<&Path>,
    save_sessions: Option<&Path>,
    flush: bool,
) -> Result<(), ArchetypeCliError> {
    let classifier = build_classifier(config, load_sessions)?;
    info!("classifier instance {} reading events from stdin", Uuid::new_v4());

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut last_verdicts: HashMap<String, Verdict> = HashMap::new();

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        // A bad event only loses itself; the stream keeps going
        let outcome = match classifier.ingest_json(trimmed) {
            Ok(Some(outcome)) => outcome,
            Ok(None) => continue,
            Err(e) => {
                warn!("skipping line {}: {}", line_num + 1, e);
                continue;
            }
        };

        let previous = last_verdicts.insert(outcome.session_id.clone(), outcome.verdict);
        if previous != Some(outcome.verdict) {
            writeln!(stdout, "{}", serde_json::to_string(&outcome)?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    stdout.flush()?;

    if let Some(sessions_path) = save_sessions {
        fs::write(sessions_path, classifier.save_sessions()?)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), ArchetypeCliError> {
    let input_data = read_input(input)?;
    let events = parse_events(&input_data, &input_format)?;

    let rejections = schema::validate_events(&events);

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_events: events.len(),
        valid_events: events.len() - rejections.len(),
        invalid_events: rejections.len(),
        errors: rejections
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                session_id: r.session_id.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report ({})", report.schema_version);
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Session {} (index {}): {}", err.session_id, err.index, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(ArchetypeCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_config() -> Result<(), ArchetypeCliError> {
    println!("{}", ClassifierConfig::default().to_json()?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), ArchetypeCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "classifier_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Classifier version {}", CLASSIFIER_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    if let Some(config_path) = config {
        checks.push(check_config_file(config_path));
    } else {
        let defaults = ClassifierConfig::default();
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Using default configuration (threshold {})",
                defaults.confidence_threshold
            ),
        });
    }

    // Check stdin is available (for streaming mode)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: CLASSIFIER_VERSION.to_string(),
        instance_id: Uuid::new_v4().to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Archetype Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("Instance: {}", report.instance_id);
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ArchetypeCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_config_file(path: &Path) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Configuration file does not exist".to_string(),
        };
    }

    match fs::read_to_string(path) {
        Ok(content) => match ClassifierConfig::from_json(&content) {
            Ok(config) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Configuration valid (threshold {}, {} reference sequences, {} marker paths)",
                    config.confidence_threshold,
                    config.reference_sequences.len(),
                    config.marker_paths.len()
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid configuration: {}", e),
            },
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read configuration file: {}", e),
        },
    }
}

// Helper functions

fn read_input(input: &Path) -> Result<String, ArchetypeCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_events(input_data: &str, format: &InputFormat) -> Result<Vec<VisitorEvent>, ArchetypeCliError> {
    let events = match format {
        InputFormat::Ndjson => schema::parse_ndjson(input_data)?,
        InputFormat::Json => schema::parse_array(input_data)?,
    };
    Ok(events)
}

fn build_classifier(
    config: Option<&Path>,
    load_sessions: Option<&Path>,
) -> Result<ArchetypeClassifier, ArchetypeCliError> {
    let mut classifier = match config {
        Some(path) => {
            let config = ClassifierConfig::from_json(&fs::read_to_string(path)?)?;
            ArchetypeClassifier::with_config(config)?
        }
        None => ArchetypeClassifier::new(),
    };

    if let Some(sessions_path) = load_sessions {
        classifier.load_sessions(&fs::read_to_string(sessions_path)?)?;
        info!("loaded {} sessions", classifier.session_count());
    }

    Ok(classifier)
}

fn format_output(outcomes: &[ClassificationOutcome], format: &OutputFormat) -> Result<String, ArchetypeCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for outcome in outcomes {
                lines.push(serde_json::to_string(outcome)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(outcomes)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(outcomes)?),
    }
}

// Error types

#[derive(Debug)]
enum ArchetypeCliError {
    Io(io::Error),
    Classifier(ClassifierError),
    Json(serde_json::Error),
    NoEvents,
    SessionsRejected(usize),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for ArchetypeCliError {
    fn from(e: io::Error) -> Self {
        ArchetypeCliError::Io(e)
    }
}

impl From<ClassifierError> for ArchetypeCliError {
    fn from(e: ClassifierError) -> Self {
        ArchetypeCliError::Classifier(e)
    }
}

impl From<serde_json::Error> for ArchetypeCliError {
    fn from(e: serde_json::Error) -> Self {
        ArchetypeCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ArchetypeCliError> for CliError {
    fn from(e: ArchetypeCliError) -> Self {
        match e {
            ArchetypeCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ArchetypeCliError::Classifier(e) => classifier_error(e),
            ArchetypeCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ArchetypeCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            ArchetypeCliError::SessionsRejected(count) => CliError {
                code: "SESSIONS_REJECTED".to_string(),
                message: format!("{} sessions were rejected; the rest were classified", count),
                hint: Some("Run 'archetype validate' to locate the offending events".to_string()),
            },
            ArchetypeCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            ArchetypeCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

fn classifier_error(e: ClassifierError) -> CliError {
    let (code, hint) = match &e {
        ClassifierError::InvalidEvent(_) => ("INVALID_EVENT", "Run 'archetype validate' for details"),
        ClassifierError::ParseError(_) | ClassifierError::JsonError(_) => {
            ("PARSE_ERROR", "Ensure input matches the visitor.event.v1 schema")
        }
        ClassifierError::ConfigError(_) => ("CONFIG_ERROR", "Run 'archetype doctor --config <file>'"),
        ClassifierError::DuplicateSession(_) | ClassifierError::SessionNotFound(_) => {
            ("SESSION_ERROR", "Check the sessions file passed to --load-sessions")
        }
    };
    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint.to_string()),
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    session_id: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    instance_id: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
