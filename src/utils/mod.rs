//! Utility modules for configuration, error handling and logging.

pub mod config;
pub mod errors;
pub mod logging;

pub use config::*;
pub use errors::*;
pub use logging::init_logging;
