pub mod config;
pub mod errors;
pub mod logging;

pub use config::{
    ApiConfig, AppConfig, AuthConfig, BeatConfig, ConfigError, ConfigResult, ConfigValidator,
    DatabaseConfig, LogConfig, LogLevel, OutputFormat, TelegramConfig,
};
pub use errors::*;

/// 统一的Result类型
pub type HabitResult<T> = std::result::Result<T, HabitError>;
