use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const ONE_DAY: u64 = 24 * 60 * 60;

/// Runtime settings of the lucky draw server
///
/// The defaults are the values the application ships with; each field can be
/// overridden through a `LUCKY_DRAW_*` environment variable.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on (`LUCKY_DRAW_ADDR`)
    pub bind_addr: SocketAddr,

    /// Directory holding the entries snapshot (`LUCKY_DRAW_UPLOAD_DIR`)
    pub upload_dir: PathBuf,

    /// Directory served under `/static` (`LUCKY_DRAW_STATIC_DIR`)
    pub static_dir: PathBuf,

    /// How long an idle session is kept (`LUCKY_DRAW_SESSION_DAYS`)
    pub session_lifetime: Duration,

    /// Mark the session cookie `Secure`; turn on behind HTTPS (`LUCKY_DRAW_SECURE_COOKIES`)
    pub secure_cookies: bool,

    /// Skip the first sheet row as a column title (`LUCKY_DRAW_HEADER_ROW`)
    pub header_row: bool,

    /// Largest accepted request body in bytes (`LUCKY_DRAW_MAX_UPLOAD_BYTES`)
    pub max_upload_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
            session_lifetime: Duration::from_secs(7 * ONE_DAY),
            secure_cookies: false,
            header_row: false,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(addr) = parse_var(&lookup, "LUCKY_DRAW_ADDR")? {
            config.bind_addr = addr;
        }
        if let Some(dir) = lookup("LUCKY_DRAW_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("LUCKY_DRAW_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(days) = parse_var::<u64, _>(&lookup, "LUCKY_DRAW_SESSION_DAYS")? {
            config.session_lifetime = Duration::from_secs(days * ONE_DAY);
        }
        if let Some(secure) = parse_flag(&lookup, "LUCKY_DRAW_SECURE_COOKIES")? {
            config.secure_cookies = secure;
        }
        if let Some(header) = parse_flag(&lookup, "LUCKY_DRAW_HEADER_ROW")? {
            config.header_row = header;
        }
        if let Some(bytes) = parse_var(&lookup, "LUCKY_DRAW_MAX_UPLOAD_BYTES")? {
            config.max_upload_bytes = bytes;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

fn parse_flag<F>(lookup: &F, key: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::Invalid { key, value }),
        },
    }
}
