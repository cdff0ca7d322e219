//! Centralized logging for scene runtimes
//!
//! Provides a custom formatter for tracing that:
//! - Formats thread IDs as #N instead of ThreadId(N)
//! - Extracts `scene_id` and `system` fields to display as `scene-id::system:`
//! - Strips common prefixes from targets for cleaner output
//! - Filters external dependency logs based on `SCENE_LOGDEPS` environment variable
//!
//! # Environment Variables
//!
//! - `SCENE_LOGDEPS`: Set to `1` to enable logging from external dependencies (tokio, etc.).
//!   Default is `0` which only shows logs from the scene crates.
//!
//! # Usage
//!
//! ```rust,ignore
//! use scene_log::{init_logging, LogConfig};
//! use tracing::Level;
//!
//! let config = LogConfig::new("scene_runtime::").with_level(Level::INFO);
//! init_logging(config)?;
//!
//! // Or with file logging
//! let file = std::fs::File::create("scene.log")?;
//! let config = LogConfig::new("scene_runtime::")
//!     .with_log_file(file)
//!     .with_level(Level::DEBUG);
//! init_logging(config)?;
//! ```

use std::fmt as std_fmt;
use std::io::Write;
use tracing::Level;
use tracing::field::Field;
use tracing_subscriber::field::Visit;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields, format::Writer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// Crates whose logs are shown when dependency logging is off
const SCENE_CRATES: &[&str] = &["scene_runtime", "scene_protocol", "scene_schema", "scene_log"];

/// Field extractor for scene_id, system, and message fields
///
/// Used by the custom formatter to detect system-related log messages
/// and format them as `scene-id::system: message`.
#[derive(Default)]
pub struct FieldExtractor {
    pub scene_id: Option<String>,
    pub system: Option<String>,
    pub message: Option<String>,
}

impl FieldExtractor {
    fn set(&mut self, name: &str, value: String) {
        match name {
            "scene_id" => self.scene_id = Some(value),
            "system" => self.system = Some(value),
            "message" => self.message = Some(value),
            _ => {}
        }
    }
}

impl Visit for FieldExtractor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.set(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std_fmt::Debug) {
        self.set(
            field.name(),
            format!("{:?}", value).trim_matches('"').to_string(),
        );
    }
}

/// Custom event formatter for scene runtimes
///
/// Features:
/// - Thread IDs displayed as #N instead of ThreadId(N)
/// - System logs formatted as `scene-id::system: message`
/// - Configurable ANSI color support
/// - Configurable target prefix stripping
pub struct CustomFormatter<T> {
    timer: T,
    ansi: bool,
    /// Prefix to strip from log targets (e.g., "scene_runtime::")
    strip_prefix: Option<String>,
}

impl<T> CustomFormatter<T> {
    pub fn new(timer: T, ansi: bool) -> Self {
        Self {
            timer,
            ansi,
            strip_prefix: None,
        }
    }

    /// Set the prefix to strip from log targets
    pub fn with_strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    /// Target as shown in the log line, empty when it should be hidden
    fn display_target<'t>(&self, target: &'t str) -> &'t str {
        let Some(prefix) = &self.strip_prefix else {
            return target;
        };

        let app_name = prefix.trim_end_matches("::");
        if target == app_name {
            return "";
        }

        target.strip_prefix(prefix.as_str()).unwrap_or(target)
    }
}

impl<T: Clone> Clone for CustomFormatter<T> {
    fn clone(&self) -> Self {
        Self {
            timer: self.timer.clone(),
            ansi: self.ansi,
            strip_prefix: self.strip_prefix.clone(),
        }
    }
}

impl<S, N, T> FormatEvent<S, N> for CustomFormatter<T>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    T: fmt::time::FormatTime,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std_fmt::Result {
        let metadata = event.metadata();

        let (dim_start, dim_end) = if self.ansi {
            ("\x1b[2m", "\x1b[0m")
        } else {
            ("", "")
        };
        let (level_color, level_str) = match *metadata.level() {
            Level::ERROR => (if self.ansi { "\x1b[31m" } else { "" }, "ERROR"),
            Level::WARN => (if self.ansi { "\x1b[33m" } else { "" }, " WARN"),
            Level::INFO => (if self.ansi { "\x1b[32m" } else { "" }, " INFO"),
            Level::DEBUG => (if self.ansi { "\x1b[34m" } else { "" }, "DEBUG"),
            Level::TRACE => (if self.ansi { "\x1b[35m" } else { "" }, "TRACE"),
        };
        let color_end = if self.ansi { "\x1b[0m" } else { "" };

        write!(writer, "{}", dim_start)?;
        self.timer.format_time(&mut writer)?;
        write!(writer, "{} ", dim_end)?;

        write!(writer, "{}{}{} ", level_color, level_str, color_end)?;

        let thread_id = format!("{:?}", std::thread::current().id());
        if let Some(num) = thread_id
            .strip_prefix("ThreadId(")
            .and_then(|s| s.strip_suffix(")"))
            .and_then(|s| s.parse::<u64>().ok())
        {
            write!(writer, "#{:03} ", num)?;
        }

        let mut extractor = FieldExtractor::default();
        event.record(&mut extractor);

        // Events emitted on behalf of a system read as "scene-id::system: message"
        if let (Some(scene_id), Some(system)) = (&extractor.scene_id, &extractor.system) {
            write!(writer, "{}{}::{}{}: ", dim_start, scene_id, system, dim_end)?;
            if let Some(msg) = &extractor.message {
                write!(writer, "{}", msg)?;
            }
        } else {
            let display_target = self.display_target(metadata.target());
            if !display_target.is_empty() {
                write!(writer, "{}{}{}: ", dim_start, display_target, dim_end)?;
            }
            ctx.field_format().format_fields(writer.by_ref(), event)?;
        }

        writeln!(writer)
    }
}

/// Create a timer with custom format
///
/// Uses format: `[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:4]`
pub fn create_custom_timer()
-> OffsetTime<&'static [time::format_description::BorrowedFormatItem<'static>]> {
    use time::macros::format_description;

    let format =
        format_description!("[year]/[month]/[day] [hour]:[minute]:[second].[subsecond digits:4]");
    let offset = time::UtcOffset::current_local_offset().unwrap_or(time::UtcOffset::UTC);
    OffsetTime::new(offset, format)
}

/// Check if dependency logging is enabled via SCENE_LOGDEPS environment variable
pub fn is_dependency_logging_enabled() -> bool {
    std::env::var("SCENE_LOGDEPS")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Parse a level name as used in configuration files
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Build the filter directive for dependency logging
///
/// Without dependency logging only the scene crates log, everything else is off.
pub fn build_filter_directives(level: Level, log_deps: bool) -> String {
    let level_str = match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    };

    if log_deps {
        return level_str.to_string();
    }

    let mut directives = String::from("off");
    for krate in SCENE_CRATES {
        directives.push_str(&format!(",{}={}", krate, level_str));
    }
    directives
}

/// Detect if ANSI colors should be used based on environment
///
/// Disabled when stdout is not a TTY, when NO_COLOR is set or TERM=dumb.
pub fn should_use_ansi() -> bool {
    atty::is(atty::Stream::Stdout)
        && std::env::var("NO_COLOR").is_err()
        && std::env::var("TERM").map(|t| t != "dumb").unwrap_or(true)
}

/// Logging configuration
pub struct LogConfig<W: Write + Send + 'static = std::fs::File> {
    /// Prefix to strip from log targets (e.g., "scene_runtime::")
    pub strip_prefix: String,
    /// Whether to use ANSI color codes (auto-detected if None)
    pub use_ansi: Option<bool>,
    /// Minimum log level
    pub level: Level,
    /// Optional file to write logs to
    pub log_file: Option<W>,
}

impl<W: Write + Send + 'static> LogConfig<W> {
    pub fn new(strip_prefix: impl Into<String>) -> Self {
        Self {
            strip_prefix: strip_prefix.into(),
            use_ansi: None,
            level: Level::INFO,
            log_file: None,
        }
    }

    pub fn with_ansi(mut self, use_ansi: bool) -> Self {
        self.use_ansi = Some(use_ansi);
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_log_file(mut self, file: W) -> Self {
        self.log_file = Some(file);
        self
    }
}

/// Initialize the global subscriber
///
/// `RUST_LOG` overrides the default filter directives. Fails if a global
/// subscriber is already installed.
pub fn init_logging<W: Write + Send + 'static>(
    config: LogConfig<W>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::EnvFilter;

    let timer = create_custom_timer();
    let use_ansi = config.use_ansi.unwrap_or_else(should_use_ansi);
    let log_deps = is_dependency_logging_enabled();
    let filter_directives = build_filter_directives(config.level, log_deps);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&filter_directives));

    let formatter_stdout =
        CustomFormatter::new(timer.clone(), use_ansi).with_strip_prefix(&config.strip_prefix);

    let file_layer = config.log_file.map(|file| {
        let formatter_file =
            CustomFormatter::new(timer, false).with_strip_prefix(&config.strip_prefix);
        tracing_subscriber::fmt::layer()
            .event_format(formatter_file)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(formatter_stdout)
                .with_ansi(use_ansi)
                .with_writer(std::io::stdout),
        )
        .with(file_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

/// Initialize logging to stdout only
pub fn init_logging_simple(
    strip_prefix: impl Into<String>,
    level: Level,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config: LogConfig<std::fs::File> = LogConfig::new(strip_prefix).with_level(level);
    init_logging(config)
}
