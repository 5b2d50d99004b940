use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{LedgerError, Result};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `log_level` when set. Calling this again after a
/// subscriber is installed is a no-op.
pub fn init_tracing(log_level: &str) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level).map_err(|e| LedgerError::Configuration {
            message: format!("invalid log level {:?}: {}", log_level, e),
        })?,
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .try_init();

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init_tracing("debug").is_ok());
        assert!(init_tracing("info").is_ok());
    }
}
