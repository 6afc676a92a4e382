//! Logger setup for hosts embedding the middleware.

use log::LevelFilter;

/// Initializes `env_logger`.
///
/// `RUST_LOG` is honoured when set; otherwise the filter defaults to `warn`, so the
/// missing-router warning is visible out of the box. An explicit `level` overrides
/// both. Calling this again, or after the host installed its own logger, is a no-op.
pub fn init_logger(level: Option<LevelFilter>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.try_init().ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_twice_is_harmless() {
        init_logger(Some(LevelFilter::Off));
        init_logger(None);
    }
}
