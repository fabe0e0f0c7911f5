use std::env;
use std::sync::Once;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Initialize logging for a host application.
///
/// `RUST_LOG` wins when set; otherwise `level` is used with this crate at debug.
/// Fails instead of panicking when a global subscriber is already installed.
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)?.add_directive("slv_appearance=debug".parse()?),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(true),
        )
        .try_init()?;

    tracing::info!("Logging initialized with level: {}", level);
    tracing::info!("Backtrace enabled: {}", env::var("RUST_BACKTRACE").map(|v| v == "1").unwrap_or(false));
    Ok(())
}

static TEST_LOGGING: Once = Once::new();

/// Route logs through the test harness writer. Safe to call from every test.
pub fn init_test_logging() {
    TEST_LOGGING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slv_appearance=debug"));
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer().with_target(true))
            .try_init();
    });
}

/// Log host information for debugging
pub fn log_system_info() {
    tracing::info!("=== System Information ===");
    tracing::info!("OS: {}", std::env::consts::OS);
    tracing::info!("Architecture: {}", std::env::consts::ARCH);
    tracing::info!("Crate Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("========================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_is_an_error_not_a_panic() {
        init_test_logging();
        init_test_logging();
        assert!(init_logging("info").is_err());
    }
}
