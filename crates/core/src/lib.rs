pub mod config;
pub mod errors;
pub mod time;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use errors::{AgentError, ToolInputError};
pub use time::{Slot, MAX_DURATION_MINUTES, SLOT_DATETIME_FORMAT};
