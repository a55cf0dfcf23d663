use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub code_runner_url: String,
    pub code_runner_timeout_secs: u64,
    pub codewars_base_url: String,
    pub api_rps: u32,
    pub public_rps: u32,
    pub session_sweep_secs: u64,
    pub cors_origins: Vec<String>,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let code_runner_url = get_env("CODE_RUNNER_URL")?;
        url::Url::parse(&code_runner_url)
            .map_err(|e| Error::Config(format!("Invalid value for CODE_RUNNER_URL: {}", e)))?;

        let codewars_base_url = get_env_or("CODEWARS_BASE_URL", "https://www.codewars.com/api/v1".to_string())?;
        url::Url::parse(&codewars_base_url)
            .map_err(|e| Error::Config(format!("Invalid value for CODEWARS_BASE_URL: {}", e)))?;

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_or("DATABASE_MAX_CONNECTIONS", 20)?,
            jwt_secret: get_env("JWT_SECRET")?,
            code_runner_url: code_runner_url.trim_end_matches('/').to_string(),
            code_runner_timeout_secs: get_env_or("CODE_RUNNER_TIMEOUT_SECS", 15)?,
            codewars_base_url: codewars_base_url.trim_end_matches('/').to_string(),
            api_rps: get_env_or("API_RPS", 50)?,
            public_rps: get_env_or("PUBLIC_RPS", 20)?,
            session_sweep_secs: get_env_or("SESSION_SWEEP_SECS", 30)?,
            cors_origins: parse_origins(&get_env_or(
                "CORS_ORIGINS",
                "http://localhost:5173".to_string(),
            )?),
            log_format: get_env_or("LOG_FORMAT", LogFormat::Text)?,
        })
    }
}

/// Comma-separated list; trailing slashes are dropped so values match the `Origin` header.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/'))
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses_known_values() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("TEXT".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        assert_eq!(
            parse_origins("http://localhost:5173/, https://app.example.com ,,"),
            vec!["http://localhost:5173", "https://app.example.com"]
        );
    }

    #[test]
    fn get_env_or_falls_back_to_default() {
        env::remove_var("SMARTRECRUITER_TEST_UNSET_VAR");
        let value: u32 = get_env_or("SMARTRECRUITER_TEST_UNSET_VAR", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn get_env_or_rejects_garbage() {
        env::set_var("SMARTRECRUITER_TEST_BAD_NUMBER", "abc");
        let value: Result<u32> = get_env_or("SMARTRECRUITER_TEST_BAD_NUMBER", 7);
        assert!(matches!(value, Err(Error::Config(_))));
    }
}
