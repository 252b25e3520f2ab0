use crate::config::Config;
use std::io;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Output goes to stderr so stdout only carries
/// the printed dashboard.
pub fn init_logging(config: &Config) {
    let directive = filter_directive(
        config.debug,
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
        std::env::var("SCALABEL_LOG_LEVEL").ok(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Picks the filter directive: `--debug` wins, then `RUST_LOG`, then
/// `SCALABEL_LOG_LEVEL`, then `info`.
fn filter_directive(debug: bool, rust_log: Option<String>, level: Option<String>) -> String {
    if debug {
        return "debug".to_string();
    }
    let set = |value: &String| !value.trim().is_empty();
    rust_log
        .filter(set)
        .or_else(|| level.filter(set))
        .unwrap_or_else(|| "info".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_overrides_rust_log() {
        assert_eq!(
            filter_directive(true, Some("warn".to_string()), Some("error".to_string())),
            "debug"
        );
    }

    #[test]
    fn rust_log_beats_the_project_level() {
        assert_eq!(
            filter_directive(
                false,
                Some("scalabel_dashboard=trace".to_string()),
                Some("warn".to_string())
            ),
            "scalabel_dashboard=trace"
        );
        assert_eq!(filter_directive(false, None, Some("warn".to_string())), "warn");
    }

    #[test]
    fn falls_back_to_info() {
        assert_eq!(filter_directive(false, None, None), "info");
        assert_eq!(filter_directive(false, Some(" ".to_string()), None), "info");
        assert_eq!(
            filter_directive(false, Some(String::new()), Some("warn".to_string())),
            "warn"
        );
    }
}
