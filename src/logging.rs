//! Unified structured logging.
//!
//! Compact timestamped output. Precedence, highest first: `RUST_LOG`,
//! `LOG_LEVEL`, then `logging.level` from the config file.
//!
//! # Environment Variables
//!
//! ```bash
//! RUST_LOG=debug codex-index index build
//! RUST_LOG=engine=trace,optimizer=debug codex-index query
//! LOG_LEVEL=debug codex-index index build
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Initializes logging from configuration. Safe to call multiple times; only
/// the first call takes effect.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let level = effective_level(config);

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(EnvFilter::new(&level));

        if config.json {
            let json_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_filter(EnvFilter::new(&level));
            tracing_subscriber::registry().with(json_layer).init();
        } else {
            tracing_subscriber::registry().with(fmt_layer).init();
        }
    });
}

/// `RUST_LOG` wins outright (it's a full `EnvFilter` directive string, not
/// just a level); `LOG_LEVEL` is the next override; `config.level` is the
/// fallback.
fn effective_level(config: &LoggingConfig) -> String {
    std::env::var("RUST_LOG")
        .or_else(|_| std::env::var("LOG_LEVEL"))
        .unwrap_or_else(|_| config.level.clone())
}

/// Initializes logging with the default (`info`) level.
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Logs an event tagged with the component that raised it.
///
/// ```ignore
/// log_event!("engine", "reindexed", "{}", path.display());
/// ```
#[macro_export]
macro_rules! log_event {
    ($handler:expr, $event:expr) => {
        tracing::info!("[{}] {}", $handler, $event)
    };
    ($handler:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $handler, $event, format!($($arg)*))
    };
}

/// Debug-only variant of [`log_event!`].
#[macro_export]
macro_rules! debug_event {
    ($handler:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $handler, $event)
    };
    ($handler:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $handler, $event, format!($($arg)*))
    };
}
