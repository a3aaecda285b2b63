//! Logging initialization for presence hosts.
//!
//! `PRESENCE_LOG` selects the verbosity of the presence crates only: the
//! installed filter scopes the chosen level to the `fleet_presence_*`
//! targets and leaves everything else at warn, so an embedding host that
//! wants full control can skip this entirely and install its own
//! subscriber first.

use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static INIT: OnceLock<()> = OnceLock::new();

/// Tracing targets covering the presence crates.
const PRESENCE_TARGETS: [&str; 2] = ["fleet_presence_core", "fleet_presence_agent"];

/// Default level for targets outside the presence crates.
const OTHER_TARGETS_LEVEL: Level = Level::WARN;

fn parse_level(raw: &str) -> Level {
    match raw.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize process-level tracing output from `PRESENCE_LOG`.
///
/// This is safe to call multiple times; only the first call installs the
/// subscriber, and installation loses to any subscriber the host set up
/// earlier. It is intentionally best-effort and never returns an error.
pub fn init() {
    if INIT.get().is_some() {
        return;
    }
    let level = parse_level(&std::env::var("PRESENCE_LOG").unwrap_or_else(|_| "info".to_string()));
    let filter = Targets::new()
        .with_default(OTHER_TARGETS_LEVEL)
        .with_targets(PRESENCE_TARGETS.iter().map(|target| (*target, level)));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .try_init();
    let _ = INIT.set(());
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level_known_names() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("Error"), Level::ERROR);
        assert_eq!(parse_level("info"), Level::INFO);
    }

    #[test]
    fn test_parse_level_falls_back_to_info() {
        assert_eq!(parse_level(""), Level::INFO);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init(); // second call must be a no-op, not a panic or error
    }
}
