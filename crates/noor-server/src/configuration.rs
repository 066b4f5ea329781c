use std::net::SocketAddr;

use config::{Config, Environment};
use noor::providers::configs::{OpenAiProviderConfig, ProviderConfig};
use serde::Deserialize;

use crate::error::{to_env_var, ConfigError};

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Failed to parse socket address")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_provider_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default = "default_image_model")]
        image_model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<i32>,
    },
}

impl ProviderSettings {
    pub fn into_config(self) -> ProviderConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                image_model,
                temperature,
                max_tokens,
            } => ProviderConfig::OpenAi(OpenAiProviderConfig {
                host,
                api_key,
                model,
                image_model,
                temperature,
                max_tokens,
            }),
        }
    }
}

/// Request budgets per caller IP: chat is cheap and frequent, image
/// generation is expensive and rare.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitSettings {
    #[serde(default = "default_chat_per_minute")]
    pub chat_per_minute: u32,
    #[serde(default = "default_image_per_hour")]
    pub image_per_hour: u32,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            chat_per_minute: default_chat_per_minute(),
            image_per_hour: default_image_per_hour(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsSettings {
    /// Comma-separated list of origins allowed to call the proxy.
    #[serde(default)]
    pub allowed_origins: String,
}

impl CorsSettings {
    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub limits: LimitSettings,
    #[serde(default)]
    pub cors: CorsSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("provider.host", default_provider_host())?
            .set_default("provider.model", default_model())?
            .set_default("provider.image_model", default_image_model())?
            .set_default("limits.chat_per_minute", default_chat_per_minute() as i64)?
            .set_default("limits.image_per_hour", default_image_per_hour() as i64)?
            .set_default("cors.allowed_origins", "")?
            .add_source(
                Environment::with_prefix("NOOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("configuration error: {:?}", &err);

                // Handle both NotFound and missing field message variants
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else if let config::ConfigError::NotFound(field) = &err {
                    Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_provider_host() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_chat_per_minute() -> u32 {
    30
}

fn default_image_per_hour() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("NOOR_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();
        env::set_var("NOOR_PROVIDER__TYPE", "openai");
        env::set_var("NOOR_PROVIDER__API_KEY", "test-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(settings.limits.chat_per_minute, 30);
        assert_eq!(settings.limits.image_per_hour, 5);
        assert!(settings.cors.origins().is_empty());

        let ProviderSettings::OpenAi {
            host,
            api_key,
            model,
            image_model,
            temperature,
            max_tokens,
        } = settings.provider;
        assert_eq!(host, "https://api.openai.com");
        assert_eq!(api_key, "test-key");
        assert_eq!(model, "gpt-4o-mini");
        assert_eq!(image_model, "gpt-image-1");
        assert_eq!(temperature, None);
        assert_eq!(max_tokens, None);

        env::remove_var("NOOR_PROVIDER__TYPE");
        env::remove_var("NOOR_PROVIDER__API_KEY");
    }

    #[test]
    #[serial]
    fn test_missing_api_key_names_the_env_var() {
        clean_env();
        env::set_var("NOOR_PROVIDER__TYPE", "openai");

        let err = Settings::new().unwrap_err();
        match err {
            ConfigError::MissingEnvVar { env_var } => {
                assert_eq!(env_var, "NOOR_PROVIDER__API_KEY");
            }
            other => panic!("expected MissingEnvVar, got {other:?}"),
        }

        env::remove_var("NOOR_PROVIDER__TYPE");
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("NOOR_SERVER__PORT", "8080");
        env::set_var("NOOR_PROVIDER__TYPE", "openai");
        env::set_var("NOOR_PROVIDER__API_KEY", "test-key");
        env::set_var("NOOR_LIMITS__CHAT_PER_MINUTE", "10");
        env::set_var(
            "NOOR_CORS__ALLOWED_ORIGINS",
            "https://noor.app, http://localhost:5173",
        );

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.limits.chat_per_minute, 10);
        assert_eq!(
            settings.cors.origins(),
            vec![
                "https://noor.app".to_string(),
                "http://localhost:5173".to_string()
            ]
        );

        env::remove_var("NOOR_SERVER__PORT");
        env::remove_var("NOOR_PROVIDER__TYPE");
        env::remove_var("NOOR_PROVIDER__API_KEY");
        env::remove_var("NOOR_LIMITS__CHAT_PER_MINUTE");
        env::remove_var("NOOR_CORS__ALLOWED_ORIGINS");
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }
}
