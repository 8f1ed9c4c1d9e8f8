//! Logging configuration with optional file rotation

use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default level when RUST_LOG does not say otherwise
    pub level: Level,

    /// Log to a daily-rotated file
    pub file_path: Option<PathBuf>,

    /// Log to stderr
    pub stderr: bool,

    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            file_path: None,
            stderr: true,
            json: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(rust_log) = std::env::var("RUST_LOG") {
            if rust_log.contains("trace") {
                config.level = Level::TRACE;
            } else if rust_log.contains("debug") {
                config.level = Level::DEBUG;
            } else if rust_log.contains("info") {
                config.level = Level::INFO;
            } else if rust_log.contains("warn") {
                config.level = Level::WARN;
            } else if rust_log.contains("error") {
                config.level = Level::ERROR;
            }
        }

        if let Ok(log_file) = std::env::var("IQUA_LOG_FILE") {
            config.file_path = Some(PathBuf::from(log_file));
        }

        if let Ok(log_stderr) = std::env::var("IQUA_LOG_STDERR") {
            config.stderr = log_stderr.to_lowercase() != "false";
        }

        if let Ok(log_json) = std::env::var("IQUA_LOG_JSON") {
            config.json = log_json.to_lowercase() == "true";
        }

        config
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn format_layer<W>(writer: W, ansi: bool, json: bool) -> BoxedLayer
where
    W: for<'a> fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    if json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_ansi(ansi)
            .with_writer(writer)
            .boxed()
    }
}

/// Initialize logging with the given configuration
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.stderr {
        layers.push(format_layer(std::io::stderr, true, config.json));
    }

    if let Some(file_path) = config.file_path {
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file_appender = tracing_appender::rolling::daily(
            file_path
                .parent()
                .unwrap_or_else(|| std::path::Path::new(".")),
            file_path
                .file_name()
                .unwrap_or_else(|| std::ffi::OsStr::new("iqua-softener.log")),
        );
        layers.push(format_layer(file_appender, false, config.json));
    }

    let subscriber = tracing_subscriber::registry()
        .with(layers)
        .with(env_filter);

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_log_config_from_env() {
        temp_env::with_vars(
            [
                ("RUST_LOG", Some("iqua_softener=debug")),
                ("IQUA_LOG_FILE", Some("/tmp/iqua/poller.log")),
                ("IQUA_LOG_STDERR", Some("false")),
                ("IQUA_LOG_JSON", None),
            ],
            || {
                let config = LogConfig::from_env();
                assert_eq!(config.level, Level::DEBUG);
                assert_eq!(config.file_path, Some(PathBuf::from("/tmp/iqua/poller.log")));
                assert!(!config.stderr);
                assert!(!config.json);
            },
        );
    }

    #[test]
    #[serial]
    fn test_info_filter_wins_over_quieter_directives() {
        temp_env::with_var("RUST_LOG", Some("info,reqwest=warn"), || {
            assert_eq!(LogConfig::from_env().level, Level::INFO);
        });
    }
}
