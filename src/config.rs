use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

/// Which completed attempt feeds an enrollment's final grade when a quiz has
/// been retaken. The source platform never pinned this down, so it is a
/// deployment knob rather than a hardcoded rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradePolicy {
    Best,
    Latest,
}

impl std::str::FromStr for GradePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(GradePolicy::Best),
            "latest" => Ok(GradePolicy::Latest),
            other => Err(format!("unknown grade policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub certificate_signing_secret: String,
    pub certificate_base_url: String,
    pub allow_certificate_reissue: bool,
    pub grade_policy: GradePolicy,
    pub public_rps: u32,
    pub api_rps: u32,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let certificate_base_url = get_env("CERTIFICATE_BASE_URL")?;
        url::Url::parse(&certificate_base_url).map_err(|e| {
            Error::Config(format!("Invalid CERTIFICATE_BASE_URL: {}", e))
        })?;

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
            jwt_secret: get_env("JWT_SECRET")?,
            certificate_signing_secret: get_env("CERTIFICATE_SIGNING_SECRET")?,
            certificate_base_url: certificate_base_url.trim_end_matches('/').to_string(),
            allow_certificate_reissue: get_env_parse_or("ALLOW_CERTIFICATE_REISSUE", false)?,
            grade_policy: get_env_parse_or("GRADE_POLICY", GradePolicy::Best)?,
            public_rps: get_env_parse_or("PUBLIC_RPS", 50)?,
            api_rps: get_env_parse_or("API_RPS", 100)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
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
