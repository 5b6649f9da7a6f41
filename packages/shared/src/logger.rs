//! Logging setup utilities for the Hanashi gateway.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the default filter directive used when `RUST_LOG` is not set.
///
/// Every target gets the same level, with `tower_http` included so the
/// request trace layer is visible at the same verbosity.
pub fn default_filter(targets: &[&str], default_log_level: &str) -> String {
    targets
        .iter()
        .chain(std::iter::once(&"tower_http"))
        .map(|target| format!("{}={}", target.replace('-', "_"), default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `targets` - Crate / binary names to enable (e.g., `["hanashi-server"]`)
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use hanashi_shared::logger::setup_logger;
///
/// setup_logger(&["hanashi-server"], "debug");
/// ```
pub fn setup_logger(targets: &[&str], default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(targets, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_normalizes_target_names() {
        // テスト項目: ハイフンを含むターゲット名がアンダースコアに正規化される
        // given (前提条件):
        let targets = ["hanashi-server"];

        // when (操作):
        let filter = default_filter(&targets, "info");

        // then (期待する結果):
        assert_eq!(filter, "hanashi_server=info,tower_http=info");
    }

    #[test]
    fn test_default_filter_with_multiple_targets() {
        // テスト項目: 複数ターゲットが同じレベルで連結される
        // given (前提条件):
        let targets = ["hanashi-server", "hanashi-shared"];

        // when (操作):
        let filter = default_filter(&targets, "debug");

        // then (期待する結果):
        assert_eq!(
            filter,
            "hanashi_server=debug,hanashi_shared=debug,tower_http=debug"
        );
    }
}
