use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    models::{ApiConfig, AuthConfig, BeatConfig, DatabaseConfig, LogConfig, TelegramConfig},
    ConfigError, ConfigResult, ConfigValidator,
};

const ENV_PREFIX: &str = "HABITS";

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/habits.toml",
    "habits.toml",
    "/etc/habits/config.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub beat: BeatConfig,
    pub telegram: TelegramConfig,
    pub logging: LogConfig,
}

impl AppConfig {
    /// 加载配置：默认值 → TOML 文件 → `HABITS_` 环境变量
    ///
    /// 显式指定的文件必须存在；未指定时按默认路径查找第一个存在的文件。
    pub fn load(config_path: Option<&str>) -> ConfigResult<Self> {
        let mut builder = ConfigBuilder::builder()
            .add_source(ConfigBuilder::try_from(&AppConfig::default())?);

        match config_path {
            Some(path) => {
                if !Path::new(path).exists() {
                    return Err(ConfigError::File(format!("配置文件不存在: {path}")));
                }
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
            None => {
                if let Some(path) = DEFAULT_CONFIG_PATHS
                    .iter()
                    .find(|path| Path::new(path).exists())
                {
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> ConfigResult<Self> {
        let config: AppConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.api.validate()?;
        self.auth.validate()?;
        self.beat.validate()?;
        self.telegram.validate()?;

        if self.beat.enabled && self.telegram.bot_token.is_none() {
            return Err(ConfigError::Validation(
                "beat.enabled requires telegram.bot_token".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LogLevel, OutputFormat};
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.beat.enabled);
        assert_eq!(config.beat.utc_offset_minutes, 180);
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [database]
            url = "sqlite::memory:"
            max_connections = 1
            min_connections = 1
            connection_timeout_seconds = 5
            idle_timeout_seconds = 60

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        assert!(config.database.is_in_memory());
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, OutputFormat::Json);
        assert_eq!(config.api.bind_address, "0.0.0.0:8000");
    }

    #[test]
    fn test_beat_requires_bot_token() {
        let result = AppConfig::from_toml(
            r#"
            [beat]
            enabled = true
            tick_interval_seconds = 30
            utc_offset_minutes = 0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [api]
            enabled = false
            bind_address = "127.0.0.1:9000"
            cors_enabled = false
            cors_origins = []
            request_timeout_seconds = 10
            "#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = AppConfig::load(Some(&path)).unwrap();
        assert!(!config.api.enabled);
        assert_eq!(config.api.bind_address, "127.0.0.1:9000");
        assert_eq!(config.database.url, "sqlite://habits.db");
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load(Some("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::File(_))));
    }

    #[test]
    fn test_toml_roundtrip_keeps_secret_section() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("[auth]"));
        assert!(text.contains("jwt_secret"));
    }
}
