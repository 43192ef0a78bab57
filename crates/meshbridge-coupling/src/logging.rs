//! Logging setup for drivers, examples and tests.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a fmt subscriber filtering at `level` (e.g. `"info"` or
/// `"meshbridge=debug"`).
///
/// `RUST_LOG` overrides the given level. Calling this again after a
/// subscriber is installed does nothing; the return value tells whether this
/// call installed it.
pub fn init(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init("debug");
        assert!(!init("info"));
    }
}
