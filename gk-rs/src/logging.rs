//! Tracing subscriber installation for the binary.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_FILTER: &str = "gk=info";

/// Pick the filter directive: `--debug` wins, then `RUST_LOG`, then the
/// config's `log_filter`, then [`DEFAULT_FILTER`].
pub fn filter_directive(debug: bool, rust_log: Option<&str>, configured: Option<&str>) -> String {
    if debug {
        return "gk=debug".to_owned();
    }
    rust_log
        .filter(|s| !s.trim().is_empty())
        .or(configured)
        .unwrap_or(DEFAULT_FILTER)
        .to_owned()
}

/// Install the global subscriber, writing to stderr so replies on stdout
/// stay clean.  Calling it twice is harmless.
pub fn init(debug: bool, configured: Option<&str>) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directive = filter_directive(debug, rust_log.as_deref(), configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence() {
        assert_eq!(filter_directive(true, Some("warn"), Some("error")), "gk=debug");
        assert_eq!(filter_directive(false, Some("warn"), Some("error")), "warn");
        assert_eq!(filter_directive(false, Some(" "), Some("error")), "error");
        assert_eq!(filter_directive(false, None, None), DEFAULT_FILTER);
    }
}
