use super::schema::AppConfig;
use crate::error::{ConfigError, Result};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use std::path::Path;

pub async fn load_from_env_or_file() -> Result<AppConfig> {
    let config: AppConfig = Figment::new()
        // Try to load from various config files
        .merge(Toml::file("plughost.toml"))
        .merge(Json::file("plughost.json"))
        .merge(Yaml::file("plughost.yaml"))
        .merge(Yaml::file("plughost.yml"))
        // Override with environment variables (PLUGHOST_ prefix)
        .merge(Env::prefixed("PLUGHOST_").split("_"))
        .extract()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;

    validate(&config)?;
    let config = apply_env_substitutions(config)?;

    Ok(config)
}

pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PLUGHOST_").split("_"))
            .extract(),
        Some("json") => Figment::new()
            .merge(Json::file(path))
            .merge(Env::prefixed("PLUGHOST_").split("_"))
            .extract(),
        Some("yaml") | Some("yml") => Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("PLUGHOST_").split("_"))
            .extract(),
        _ => {
            return Err(ConfigError::Parse(
                "Unsupported config file format. Use .toml, .json, .yaml, or .yml".into(),
            )
            .into())
        }
    };

    let config = config.map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&config)?;
    let config = apply_env_substitutions(config)?;

    Ok(config)
}

pub fn validate(config: &AppConfig) -> Result<()> {
    if config.port == 0 {
        return Err(ConfigError::MissingField("port".into()).into());
    }

    if config.name.is_empty() {
        return Err(ConfigError::Validation("Application name must not be empty".into()).into());
    }

    if config.rate_limit.enabled {
        if config.rate_limit.max_requests == 0 {
            return Err(ConfigError::Validation(
                "rateLimit.maxRequests must be greater than 0".into(),
            )
            .into());
        }
        if config.rate_limit.window_secs == 0 {
            return Err(ConfigError::Validation(
                "rateLimit.windowSecs must be greater than 0".into(),
            )
            .into());
        }
    }

    if config.cors.enabled && config.cors.allowed_origins.is_empty() {
        return Err(ConfigError::Validation(
            "cors.allowedOrigins must not be empty when CORS is enabled".into(),
        )
        .into());
    }

    if config.health.timeout_ms == 0 {
        return Err(ConfigError::Validation("health.timeoutMs must be greater than 0".into()).into());
    }

    if config.graceful_shutdown.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "gracefulShutdown.timeoutMs must be greater than 0".into(),
        )
        .into());
    }

    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => {
            return Err(ConfigError::Validation(format!("Unknown logging level: {other}")).into())
        }
    }

    Ok(())
}

fn apply_env_substitutions(mut config: AppConfig) -> Result<AppConfig> {
    config.name = substitute_env_vars(&config.name)?;
    config.host = substitute_env_vars(&config.host)?;

    for origin in &mut config.cors.allowed_origins {
        *origin = substitute_env_vars(origin)?;
    }

    Ok(config)
}

fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                // Support default values (e.g., ${VAR:-default})
                if let Some((name, default)) = var_name.split_once(":-") {
                    match std::env::var(name) {
                        Ok(value) => result = result.replace(&cap[0], &value),
                        Err(_) => result = result.replace(&cap[0], default),
                    }
                } else {
                    return Err(ConfigError::EnvVar(format!(
                        "Environment variable '{var_name}' not found"
                    ))
                    .into());
                }
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use figment::providers::{Format, Toml};

    #[test]
    fn test_env_substitution() {
        std::env::set_var("PLUGHOST_TEST_VAR", "test_value");

        let result = substitute_env_vars("Hello ${PLUGHOST_TEST_VAR}!").unwrap();
        assert_eq!(result, "Hello test_value!");

        let result = substitute_env_vars("${PLUGHOST_MISSING:-default}").unwrap();
        assert_eq!(result, "default");

        std::env::remove_var("PLUGHOST_TEST_VAR");
    }

    #[test]
    fn test_missing_env_var_is_an_error() {
        let result = substitute_env_vars("${PLUGHOST_DEFINITELY_MISSING}");
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::EnvVar(_)))
        ));
    }

    #[test]
    fn test_missing_port_fails_fast() {
        let config: AppConfig = Figment::new()
            .merge(Toml::string("name = \"svc\""))
            .extract()
            .unwrap();

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::MissingField(ref field))) if field == "port"
        ));
    }

    #[test]
    fn test_defaults_applied() {
        let config: AppConfig = Figment::new()
            .merge(Toml::string("port = 8080"))
            .extract()
            .unwrap();

        validate(&config).unwrap();
        assert_eq!(config.name, "plughost");
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert!(!config.cors.enabled);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.graceful_shutdown.timeout_ms, 30000);
        assert_eq!(config.health.path, "health");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config: AppConfig = Figment::new()
            .merge(Toml::string("port = 8080\nnotAKey = true"))
            .extract()
            .unwrap();

        validate(&config).unwrap();
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_rate_limit_validation() {
        let config: AppConfig = Figment::new()
            .merge(Toml::string(
                "port = 8080\n[rateLimit]\nenabled = true\nmaxRequests = 0",
            ))
            .extract()
            .unwrap();

        assert!(validate(&config).is_err());
    }
}
