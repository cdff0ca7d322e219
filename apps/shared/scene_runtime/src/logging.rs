//! Logging setup driven by the session configuration
//!
//! Thin wrapper over `scene_log`: the configured `log_level` becomes the
//! default filter and targets are shown without the `scene_runtime::` prefix.
//! Systems and event handlers log with `scene_id` and `system` fields, which
//! the formatter prints as `scene-id::system:`.

use scene_log::{LogConfig, init_logging};
use std::fs::File;

use crate::config::SessionConfig;

pub type InitResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Install the global subscriber, logging to stdout
pub fn init_from_config(config: &SessionConfig) -> InitResult {
    init_logging(log_config(config))
}

/// Install the global subscriber, logging to stdout and to `file`
pub fn init_from_config_with_file(config: &SessionConfig, file: File) -> InitResult {
    init_logging(log_config(config).with_log_file(file))
}

fn log_config(config: &SessionConfig) -> LogConfig<File> {
    LogConfig::new("scene_runtime::").with_level(config.level())
}
