use std::path::PathBuf;
use std::time;
use url::Url;
use crate::errors::WatcherError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const DISCOGS_BASE_URL: &str = "https://api.discogs.com/";

/// Name of the persisted entry holding the tracked release ids
pub const STORE_KEY: &str = "discogsReleaseIds";
pub const STORE_DIR: &str = "./data";

/// Wrapper over env::var that treats blank values as unset
fn env_optional(s: &str) -> Option<String> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => None,
    }
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

///
/// Configuration for the discogs catalog api
///
#[derive(Clone)]
pub struct DiscogsConfig {
    pub base_url: Url,          // https://api.discogs.com/
    pub token: Option<String>,  // personal access token, optional
    pub user_agent: String
}

// token stays out of debug output
impl std::fmt::Debug for DiscogsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscogsConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &self.token.as_ref().map(|_| "<set>"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn build_discogs(
    base_url: Option<String>,
    token: Option<String>,
    user_agent: Option<String>
) -> Result<DiscogsConfig, WatcherError> {
    let base_url = base_url.unwrap_or_else(|| DISCOGS_BASE_URL.to_string());

    let mut base_url = Url::parse(&base_url)
        .map_err(|e| WatcherError::Config(
            format!("DISCOGS_BASE_URL invalid {e}")
        ))?;

    ensure_https(&base_url).map_err(WatcherError::Config)?;
    ensure_trailing_slash(&mut base_url);

    let user_agent = user_agent.unwrap_or_else(||
        format!("discogs-watcher/{}", env!("CARGO_PKG_VERSION"))
    );

    Ok( DiscogsConfig { base_url, token, user_agent } )
}

///
/// Configuration for Http timeouts, pooling, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS
        }
    }
}

///
/// Configuration for where tracked ids are persisted
///
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub key: String
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(STORE_DIR),
            key: STORE_KEY.to_string()
        }
    }
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<LogFormat> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json"   => Some(LogFormat::Json),
            _ => None
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "warn,discogs_watcher=info,reqwest=warn".to_string(),
            format: LogFormat::Pretty,
            with_ansi: true,
            include_file_line: false,
            include_target: true
        }
    }
}

fn build_logging(format: Option<String>) -> Result<LoggingConfig, WatcherError> {
    let mut logging = LoggingConfig::default();
    if let Some(s) = format {
        logging.format = LogFormat::parse(&s)
            .ok_or_else(|| WatcherError::Config(
                format!("WATCHER_LOG_FORMAT invalid: {s}")
            ))?;
        logging.include_file_line = logging.format == LogFormat::Json;
    }
    Ok(logging)
}

///
/// AppConfig which is built once and handed to the store and fetcher
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub discogs: DiscogsConfig,
    pub http: HttpConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, WatcherError> {
    dotenvy::dotenv().ok();

    let discogs = build_discogs(
        env_optional("DISCOGS_BASE_URL"),
        env_optional("DISCOGS_TOKEN"),
        env_optional("DISCOGS_USER_AGENT")
    )?;
    let http    = HttpConfig::default();
    let mut store = StoreConfig::default();
    if let Some(dir) = env_optional("WATCHER_STORE_DIR") {
        store.root = PathBuf::from(dir);
    }
    let logging = build_logging(env_optional("WATCHER_LOG_FORMAT"))?;

    Ok( AppConfig { discogs, http, store, logging } )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discogs_defaults() {
        let cfg = build_discogs(None, None, None).unwrap();
        assert_eq!(cfg.base_url.as_str(), DISCOGS_BASE_URL);
        assert_eq!(cfg.base_url.host_str(), Some("api.discogs.com"));
        assert!(cfg.token.is_none());
        assert!(cfg.user_agent.starts_with("discogs-watcher/"));
    }

    #[test]
    fn discogs_base_url_gets_trailing_slash() {
        let cfg = build_discogs(
            Some("https://example.org/api".to_string()), None, None
        ).unwrap();
        assert_eq!(cfg.base_url.as_str(), "https://example.org/api/");
    }

    #[test]
    fn discogs_rejects_plain_http() {
        let err = build_discogs(
            Some("http://api.discogs.com/".to_string()), None, None
        ).unwrap_err();
        assert!(matches!(err, WatcherError::Config(_)));
    }

    #[test]
    fn debug_output_hides_token() {
        let cfg = build_discogs(None, Some("secret".to_string()), None).unwrap();
        let printed = format!("{cfg:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("<set>"));
    }

    #[test]
    fn log_format_parses() {
        assert_eq!(build_logging(None).unwrap().format, LogFormat::Pretty);
        let json = build_logging(Some("JSON".to_string())).unwrap();
        assert_eq!(json.format, LogFormat::Json);
        assert!(json.include_file_line);
        assert!(build_logging(Some("xml".to_string())).is_err());
    }
}
