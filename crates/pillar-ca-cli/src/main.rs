use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use pillar_ca::{
    DatacenterResolver, DistributionError, DistributionResolver, GlobPredicateEvaluator,
};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_request, optional_env_value, CliConfig};

const STATUS_SCHEMA: &str = "pillar-ca-status-v1";
const STATUS_PREFIX: &str = "PILLAR_CA_STATUS\t";

const ENV_STATUS_PATH: &str = "PILLAR_CA_STATUS_PATH";
const ENV_LOG_LEVEL: &str = "PILLAR_CA_LOG_LEVEL";

/// Resolve the certificates a requester is owed and print the delivery document.
#[derive(Debug, Parser)]
#[command(name = "pillar-ca", version, about, long_about = None)]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, env = "PILLAR_CA_CONFIG")]
    config: PathBuf,

    /// Distribution request file (JSON), or `-` for stdin
    #[arg(long, env = "PILLAR_CA_REQUEST", default_value = "-")]
    request: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitClass {
    Ok,
    ConfigInvalid,
    RequestInvalid,
    DistributionFailed,
}

impl ExitClass {
    fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::ConfigInvalid => 20,
            Self::RequestInvalid => 21,
            Self::DistributionFailed => 22,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::ConfigInvalid => "config_invalid",
            Self::RequestInvalid => "request_invalid",
            Self::DistributionFailed => "distribution_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RunOutcome {
    class: ExitClass,
    detail: Option<String>,
}

impl RunOutcome {
    fn ok(detail: impl Into<String>) -> Self {
        Self {
            class: ExitClass::Ok,
            detail: Some(detail.into()),
        }
    }

    fn error(class: ExitClass, detail: impl Into<String>) -> Self {
        Self {
            class,
            detail: Some(detail.into()),
        }
    }

    fn exit_code(&self) -> i32 {
        self.class.code()
    }

    fn status_record(&self) -> StatusRecord {
        StatusRecord::new(
            "exit",
            if self.class == ExitClass::Ok {
                "ok"
            } else {
                "error"
            },
            self.exit_code(),
            self.class.label(),
            self.detail.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct StatusRecord {
    schema: &'static str,
    stage: &'static str,
    outcome: &'static str,
    exit_code: i32,
    exit_class: &'static str,
    unix_ms: u128,
    detail: Option<String>,
}

impl StatusRecord {
    fn new(
        stage: &'static str,
        outcome: &'static str,
        exit_code: i32,
        exit_class: &'static str,
        detail: Option<String>,
    ) -> Self {
        Self {
            schema: STATUS_SCHEMA,
            stage,
            outcome,
            exit_code,
            exit_class,
            unix_ms: now_unix_ms(),
            detail,
        }
    }
}

#[derive(Debug, Default)]
struct StatusEmitter {
    status_file: Option<Mutex<BufWriter<File>>>,
}

impl StatusEmitter {
    fn from_env() -> Self {
        let path = match optional_env_value(ENV_STATUS_PATH, env::var(ENV_STATUS_PATH)) {
            Ok(Some(path)) => path,
            Ok(None) => return Self::default(),
            Err(error) => {
                eprintln!("ignoring {ENV_STATUS_PATH}: {error}");
                return Self::default();
            }
        };

        let status_file = match open_status_file(&path) {
            Ok(file) => Some(Mutex::new(BufWriter::new(file))),
            Err(error) => {
                eprintln!("failed to open status stream file {path}: {error}");
                None
            }
        };
        Self { status_file }
    }

    fn emit(&self, record: StatusRecord) {
        let json = match serde_json::to_string(&record) {
            Ok(value) => value,
            Err(error) => {
                eprintln!("failed to serialize status record: {error}");
                return;
            }
        };

        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "{STATUS_PREFIX}{json}");
        let _ = stderr.flush();

        if let Some(status_file) = self.status_file.as_ref() {
            let Ok(mut writer) = status_file.lock() else {
                return;
            };
            let _ = writeln!(writer, "{json}");
            let _ = writer.flush();
        }
    }
}

fn main() {
    init_tracing();
    let cli = match Cli::try_parse() {
        Ok(cli) => Ok(cli),
        Err(error)
            if matches!(
                error.kind(),
                ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion
            ) =>
        {
            error.exit()
        }
        Err(error) => Err(error.to_string()),
    };

    let status_emitter = StatusEmitter::from_env();
    status_emitter.emit(StatusRecord::new(
        "startup",
        "in_progress",
        0,
        "ok",
        Some("resolving certificate distribution".to_string()),
    ));

    let outcome = match cli {
        Ok(cli) => run(&cli),
        Err(detail) => RunOutcome::error(ExitClass::ConfigInvalid, detail.trim_end()),
    };
    status_emitter.emit(outcome.status_record());
    std::process::exit(outcome.exit_code());
}

fn init_tracing() {
    let filter = match optional_env_value(ENV_LOG_LEVEL, env::var(ENV_LOG_LEVEL)) {
        Ok(Some(directives)) => EnvFilter::try_new(directives)
            .unwrap_or_else(|_| EnvFilter::new("info")),
        _ => EnvFilter::new("info"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: &Cli) -> RunOutcome {
    let mut config = match CliConfig::load(&cli.config) {
        Ok(config) => config,
        Err(error) => return RunOutcome::error(ExitClass::ConfigInvalid, error.to_string()),
    };
    if let Err(error) = config.apply_env_overrides() {
        return RunOutcome::error(ExitClass::ConfigInvalid, error.to_string());
    }

    let resolver = match DistributionResolver::new(GlobPredicateEvaluator, config.distribution) {
        Ok(resolver) => resolver,
        Err(error) => return RunOutcome::error(ExitClass::ConfigInvalid, error.to_string()),
    };
    let datacenters = DatacenterResolver::new(GlobPredicateEvaluator, config.datacenters);

    let request = match load_request(&cli.request) {
        Ok(request) => request,
        Err(error) => return RunOutcome::error(ExitClass::RequestInvalid, error.to_string()),
    };

    let bundle = match resolver.resolve(&request) {
        Ok(bundle) => bundle,
        Err(error @ DistributionError::InvalidRequest(_)) => {
            return RunOutcome::error(ExitClass::RequestInvalid, error.to_string())
        }
        Err(error) => {
            return RunOutcome::error(
                ExitClass::DistributionFailed,
                format!("{}: {error}", error.code()),
            )
        }
    };

    let mut document = bundle.to_pillar();
    if let (Some(assignment), Value::Object(fields)) =
        (datacenters.resolve(&request.requester), &mut document)
    {
        fields.insert("dc".to_string(), Value::String(assignment.dc));
    }

    let rendered = match serde_json::to_string_pretty(&document) {
        Ok(rendered) => rendered,
        Err(error) => {
            return RunOutcome::error(ExitClass::DistributionFailed, error.to_string())
        }
    };
    let mut stdout = io::stdout().lock();
    if let Err(error) = writeln!(stdout, "{rendered}").and_then(|()| stdout.flush()) {
        return RunOutcome::error(ExitClass::DistributionFailed, error.to_string());
    }

    let snapshot = resolver.metrics_snapshot();
    RunOutcome::ok(format!(
        "delivered {} certificate(s) to {}; {} artifact(s) written",
        bundle.certificates.len(),
        request.requester.id,
        snapshot.artifacts_written
    ))
}

fn open_status_file(path: &str) -> io::Result<File> {
    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn now_unix_ms() -> u128 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_millis(),
        Err(_) => 0,
    }
}
