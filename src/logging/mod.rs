//! Structured logging via `tracing`.
//!
//! Library code only emits events; a binary (or a test) installs the
//! subscriber once with [`init_tracing`]. `RUST_LOG` overrides the
//! configured filter when set.

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq)]
pub struct TracingConfig {
    pub default_level: Level,
    pub module_filters: Vec<(&'static str, Level)>,
    pub show_targets: bool,
    pub show_file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            module_filters: vec![
                // per-level generation events stay at debug
                ("delve_core::generation", Level::INFO),
                ("delve_core::hotreload", Level::DEBUG),
            ],
            show_targets: true,
            show_file_line: false,
        }
    }
}

impl TracingConfig {
    pub fn to_env_filter_string(&self) -> String {
        let mut parts = vec![self.default_level.as_str().to_ascii_lowercase()];
        for (module, level) in &self.module_filters {
            parts.push(format!("{module}={}", level.as_str().to_ascii_lowercase()));
        }
        parts.join(",")
    }
}

static TRACING_INIT: Once = Once::new();

pub fn init_tracing_default() {
    init_tracing(&TracingConfig::default());
}

/// Install the global subscriber. The first call wins.
pub fn init_tracing(config: &TracingConfig) {
    let filter_str = config.to_env_filter_string();
    let (show_targets, show_file_line) = (config.show_targets, config.show_file_line);
    TRACING_INIT.call_once(move || {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(show_targets)
            .with_file(show_file_line)
            .with_line_number(show_file_line)
            .compact();

        // a test harness may already have installed one
        let _ = subscriber.try_init();
    });
}

/// Keeps a named span entered until dropped
pub struct TimingSpan {
    _span: tracing::span::EnteredSpan,
}

impl TimingSpan {
    pub fn new(name: &str) -> Self {
        let span = tracing::info_span!("operation", name = name);
        Self {
            _span: span.entered(),
        }
    }
}
