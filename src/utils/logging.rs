//! Logger installation for applications embedding peercrypt.

use crate::utils::LoggingConfig;

/// Install `env_logger` as the global logger.
///
/// `RUST_LOG` wins over the configured level. Calling this more than once is
/// harmless; later calls leave the installed logger in place and return `false`.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.level));

    if config.timestamps {
        builder.format_timestamp_secs();
    } else {
        builder.format_timestamp(None);
    }

    builder.try_init().is_ok()
}
