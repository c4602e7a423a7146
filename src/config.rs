use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub generation_model: String,
    pub rephrase_model: String,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub max_source_chars: usize,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            openai_api_key: env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            openai_base_url: get_env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            generation_model: get_env_or("GENERATION_MODEL", "gpt-4"),
            rephrase_model: get_env_or("REPHRASE_MODEL", "gpt-3.5-turbo"),
            cors_origins: parse_origins(&get_env_or(
                "CORS_ORIGINS",
                "http://localhost:4200,https://localhost:4200",
            )),
            max_upload_bytes: get_env_parse_or("MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            max_source_chars: get_env_parse_or("MAX_SOURCE_CHARS", 4000)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
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
    use super::parse_origins;

    #[test]
    fn origins_are_split_and_trimmed() {
        let origins = parse_origins(" http://a.test , ,https://b.test");
        assert_eq!(origins, vec!["http://a.test", "https://b.test"]);
    }
}
