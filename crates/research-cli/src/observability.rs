use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const LEVEL_VAR: &str = "DEEP_RESEARCH_LOG_LEVEL";
const JSON_PATH_VAR: &str = "DEEP_RESEARCH_JSON_LOG_PATH";
const DEFAULT_FILTER: &str = "warn";

/// Where log lines go. Stdout is reserved for the panel and results.
#[derive(Debug, PartialEq, Eq)]
enum LogTarget {
    Stderr,
    JsonFile { dir: PathBuf, file_name: String },
}

impl LogTarget {
    fn from_path(raw: Option<String>) -> Self {
        let Some(raw) = raw.filter(|p| !p.trim().is_empty()) else {
            return Self::Stderr;
        };
        let path = PathBuf::from(raw);
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
            return Self::Stderr;
        };
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        Self::JsonFile { dir, file_name }
    }
}

/// Filter directive: the dedicated variable, then `RUST_LOG`, then `warn`.
fn filter_directive(level: Option<String>, rust_log: Option<String>) -> String {
    level
        .into_iter()
        .chain(rust_log)
        .find(|d| EnvFilter::try_new(d).is_ok())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Installs the global subscriber once per process.
pub fn init_observability() {
    INIT.get_or_init(|| {
        let directive = filter_directive(
            std::env::var(LEVEL_VAR).ok(),
            std::env::var("RUST_LOG").ok(),
        );
        let env_filter = EnvFilter::new(directive);
        match LogTarget::from_path(std::env::var(JSON_PATH_VAR).ok()) {
            LogTarget::JsonFile { dir, file_name } => {
                let _ = std::fs::create_dir_all(&dir);
                let writer = tracing_appender::rolling::never(dir, file_name);
                let json_layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(false)
                    .with_writer(writer);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(json_layer)
                    .try_init();
            }
            LogTarget::Stderr => {
                let console_layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init();
            }
        }
    });
}
