//! Logging setup shared by the Parley binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// The filter covers the Parley library crates and the calling binary.
/// `RUST_LOG` overrides it completely when set.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "parley-server", "parley-client")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use parley_shared::logger::setup_logger;
///
/// setup_logger("parley-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the default `EnvFilter` directive string.
fn default_filter(binary_name: &str, level: &str) -> String {
    let mut targets = vec!["parley_shared", "parley_server", "parley_client"]
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let binary_target = binary_name.replace('-', "_");
    if !targets.contains(&binary_target) {
        targets.push(binary_target);
    }

    targets
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_does_not_repeat_library_binary() {
        // テスト項目: バイナリ名がライブラリ名と同じ場合は重複しない
        // given (前提条件):
        let binary_name = "parley-server";

        // when (操作):
        let filter = default_filter(binary_name, "debug");

        // then (期待する結果):
        assert_eq!(
            filter,
            "parley_shared=debug,parley_server=debug,parley_client=debug"
        );
    }

    #[test]
    fn test_default_filter_appends_other_binary() {
        // テスト項目: ライブラリ以外のバイナリ名はフィルタに追加される
        // given (前提条件):
        let binary_name = "relay-probe";

        // when (操作):
        let filter = default_filter(binary_name, "info");

        // then (期待する結果):
        assert!(filter.ends_with(",relay_probe=info"));
        assert!(filter.starts_with("parley_shared=info"));
    }
}
