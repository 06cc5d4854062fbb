//! # huddle-logging
//!
//! Global `tracing` subscriber setup for the relay binary, plus an in-memory
//! capture layer that tests use to assert on emitted events.
//!
//! Output always goes to stderr. `RUST_LOG` takes precedence over the
//! configured level.

#![deny(unsafe_code)]

pub mod capture;

pub use capture::{CapturedEvent, CapturedLogs, capture_logs};

use huddle_settings::LogFormat;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Build the filter: `RUST_LOG` if set and valid, otherwise `level`.
///
/// An unparseable `level` falls back to `info`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Thread-local stderr subscriber for the window before settings are
/// loaded, so warnings about the settings themselves are not lost.
///
/// Shows `warn` and above unless `RUST_LOG` says otherwise. Drop the guard
/// before calling [`init_subscriber`].
pub fn bootstrap_subscriber() -> DefaultGuard {
    bootstrap_subscriber_with_writer(std::io::stderr)
}

/// [`bootstrap_subscriber`] writing to `writer`.
pub fn bootstrap_subscriber_with_writer<W>(writer: W) -> DefaultGuard
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_filter("warn"))
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .compact()
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_subscriber(level: &str, format: LogFormat) {
    let filter = build_filter(level);

    match format {
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .compact();
            let _ = subscriber.try_init();
        }
        LogFormat::Json => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true);
            let _ = subscriber.try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_is_idempotent() {
        init_subscriber("warn", LogFormat::Compact);
        init_subscriber("debug", LogFormat::Json);
    }

    #[derive(Clone, Default)]
    struct SharedBuf(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    #[test]
    fn bootstrap_shows_settings_warnings() {
        let buf = SharedBuf::default();
        let guard = bootstrap_subscriber_with_writer({
            let buf = buf.clone();
            move || buf.clone()
        });
        let mut settings = huddle_settings::HuddleSettings::default();
        huddle_settings::loader::apply_overrides_from(&mut settings, |name| {
            (name == "HUDDLE_PORT").then(|| "not-a-port".to_string())
        });
        drop(guard);
        tracing::warn!("after the guard");

        let text = buf.text();
        assert!(text.contains("HUDDLE_PORT"), "{text}");
        assert!(text.contains("ignoring"), "{text}");
        assert!(!text.contains("after the guard"));
        assert_eq!(settings.server.port, 8787);
    }

    #[test]
    fn bad_level_falls_back() {
        let filter = build_filter("not a [valid directive");
        assert!(!filter.to_string().is_empty());
    }
}
