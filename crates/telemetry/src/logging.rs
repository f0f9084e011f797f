use serde::{Deserialize, Serialize};
use std::env;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Keeps the file appender's background writer alive for the process lifetime
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    /// One JSON object per line, for log shippers
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub service_name: String,
    pub service_version: String,
    pub node_id: Option<String>,
    pub environment: String,
    pub span_events: bool,
    /// Mirror every event as JSON into `<dir>/<service>.log`, rotated daily
    pub file_dir: Option<String>,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(false)
}

impl LogConfig {
    /// Read `LOG_FORMAT`, `SERVICE_VERSION`, `NODE_ID`, `ENVIRONMENT`,
    /// `LOG_SPAN_EVENTS` and `LOG_TO_FILE` / `LOG_DIR`.
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let file_dir = if env_flag("LOG_TO_FILE") {
            Some(env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string()))
        } else {
            None
        };

        Self {
            format: LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_default()),
            service_name: service_name.into(),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            node_id: env::var("NODE_ID").ok(),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            span_events: env_flag("LOG_SPAN_EVENTS"),
            file_dir,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file_logging(mut self, dir: impl Into<String>) -> Self {
        self.file_dir = Some(dir.into());
        self
    }

    fn fmt_span(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn log_file_name(&self) -> String {
        format!("{}.log", self.service_name)
    }
}

/// `RUST_LOG` if set, otherwise `info`, with the HTTP and S3 client internals quietened
fn env_filter() -> EnvFilter {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    ["hyper=warn", "aws_smithy_runtime=warn", "aws_config=warn"]
        .into_iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(filter, |filter, directive| filter.add_directive(directive))
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn stdout_layer(config: &LogConfig) -> BoxedLayer {
    let spans = config.fmt_span();
    match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_span_events(spans)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_span_events(spans).boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_span_events(spans)
            .with_line_number(true)
            .boxed(),
    }
}

fn file_layer(config: &LogConfig) -> Option<BoxedLayer> {
    let dir = config.file_dir.as_deref()?;
    let appender = tracing_appender::rolling::daily(dir, config.log_file_name());
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    Some(
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_span_events(config.fmt_span())
            .with_writer(writer)
            .boxed(),
    )
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_structured_logging(config: LogConfig) {
    let layers: Vec<BoxedLayer> = std::iter::once(stdout_layer(&config))
        .chain(file_layer(&config))
        .collect();

    if tracing_subscriber::registry()
        .with(layers)
        .with(env_filter())
        .try_init()
        .is_err()
    {
        return;
    }

    tracing::info!(
        service.name = %config.service_name,
        service.version = %config.service_version,
        node_id = ?config.node_id,
        environment = %config.environment,
        format = ?config.format,
        log_dir = ?config.file_dir,
        "logging initialized"
    );
}

pub fn init_with_service(service_name: impl Into<String>) {
    init_structured_logging(LogConfig::from_env(service_name));
}
