use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::SolverError;

pub const DEFAULT_REQUEST_URL: &str = "https://rucaptcha.com/in.php";
pub const DEFAULT_RESULT_URL: &str = "https://rucaptcha.com/res.php";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Restricts which characters the worker may type for an image captcha.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NumericMode {
    #[default]
    Any,
    NumbersOnly,
    LettersOnly,
    NumbersOrLetters,
    NumbersAndLetters,
}

impl NumericMode {
    pub fn code(&self) -> u8 {
        match self {
            Self::Any => 0,
            Self::NumbersOnly => 1,
            Self::LettersOnly => 2,
            Self::NumbersOrLetters => 3,
            Self::NumbersAndLetters => 4,
        }
    }
}

/// Alphabet of the captcha text.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Any,
    Cyrillic,
    Latin,
}

impl Language {
    pub fn code(&self) -> u8 {
        match self {
            Self::Any => 0,
            Self::Cyrillic => 1,
            Self::Latin => 2,
        }
    }
}

/// Hints forwarded to the worker with an image captcha.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SolveHints {
    /// Answer contains two or more words.
    pub phrase: bool,
    /// Answer is case sensitive.
    pub case_sensitive: bool,
    pub numeric: NumericMode,
    /// 0 means no bound.
    pub min_length: u8,
    /// 0 means no bound.
    pub max_length: u8,
    pub language: Language,
}

/// Settings shared by every solve call. Read-only once built.
#[derive(Clone)]
pub struct SolverConfig {
    pub api_key: String,
    pub request_url: String,
    pub result_url: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub hints: SolveHints,
    /// Give up after this many poll requests. `None` polls until a
    /// terminal reply arrives.
    pub max_poll_attempts: Option<u32>,
    /// Overall budget for the polling stage of one solve.
    pub solve_timeout: Option<Duration>,
    /// Fail after this many consecutive unrecognized poll replies.
    /// `None` keeps polling through them.
    pub malformed_limit: Option<u32>,
}

impl std::fmt::Debug for SolverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverConfig")
            .field("api_key", &"[REDACTED]")
            .field("request_url", &self.request_url)
            .field("result_url", &self.result_url)
            .field("poll_interval", &self.poll_interval)
            .field("http_timeout", &self.http_timeout)
            .field("hints", &self.hints)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("solve_timeout", &self.solve_timeout)
            .field("malformed_limit", &self.malformed_limit)
            .finish()
    }
}

impl SolverConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            request_url: DEFAULT_REQUEST_URL.to_string(),
            result_url: DEFAULT_RESULT_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            hints: SolveHints::default(),
            max_poll_attempts: None,
            solve_timeout: None,
            malformed_limit: None,
        }
    }

    pub fn with_endpoints(mut self, request_url: impl Into<String>, result_url: impl Into<String>) -> Self {
        self.request_url = request_url.into();
        self.result_url = result_url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_hints(mut self, hints: SolveHints) -> Self {
        self.hints = hints;
        self
    }

    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = Some(attempts);
        self
    }

    pub fn with_solve_timeout(mut self, timeout: Duration) -> Self {
        self.solve_timeout = Some(timeout);
        self
    }

    pub fn with_malformed_limit(mut self, limit: u32) -> Self {
        self.malformed_limit = Some(limit);
        self
    }

    /// Build from `RUCAPTCHA_*` environment variables. Missing optional
    /// values fall back to defaults; unparseable ones are logged and ignored.
    pub fn from_env() -> Self {
        let api_key = env::var("RUCAPTCHA_API_KEY").unwrap_or_else(|_| {
            tracing::warn!("RUCAPTCHA_API_KEY not set, solver will reject every call");
            String::new()
        });

        let mut config = Self::new(api_key);
        if let Ok(url) = env::var("RUCAPTCHA_REQUEST_URL") {
            config.request_url = url;
        }
        if let Ok(url) = env::var("RUCAPTCHA_RESULT_URL") {
            config.result_url = url;
        }
        if let Some(secs) = env_number::<u64>("RUCAPTCHA_POLL_INTERVAL_SECS") {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = env_number::<u64>("RUCAPTCHA_TIMEOUT_SECS") {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_number::<u64>("RUCAPTCHA_SOLVE_TIMEOUT_SECS") {
            config.solve_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(polls) = env_number::<u32>("RUCAPTCHA_MAX_POLLS") {
            config.max_poll_attempts = Some(polls);
        }
        config
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SolverError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| SolverError::Config(format!("bad config file: {e}")))?;
        Ok(file.into())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SolverError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SolverError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Load from the TOML file named by `RUCAPTCHA_CONFIG`, or from the
    /// environment when it is unset.
    pub fn load() -> Result<Self, SolverError> {
        match env::var("RUCAPTCHA_CONFIG") {
            Ok(path) => Self::from_file(path),
            Err(_) => Ok(Self::from_env()),
        }
    }

    pub fn validate(&self) -> Result<(), SolverError> {
        if self.api_key.trim().is_empty() {
            return Err(SolverError::Config("api key is empty".to_string()));
        }
        if self.request_url.is_empty() || self.result_url.is_empty() {
            return Err(SolverError::Config("endpoint url is empty".to_string()));
        }
        let SolveHints {
            min_length,
            max_length,
            ..
        } = self.hints;
        if min_length > 0 && max_length > 0 && min_length > max_length {
            return Err(SolverError::Config(format!(
                "min_length {min_length} exceeds max_length {max_length}"
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(SolverError::Config(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.max_poll_attempts == Some(0) {
            return Err(SolverError::Config(
                "max_poll_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = raw, "ignoring non-numeric setting");
            None
        }
    }
}

/// On-disk TOML layout. Durations are whole seconds.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_key: String,
    request_url: Option<String>,
    result_url: Option<String>,
    poll_interval_secs: Option<u64>,
    http_timeout_secs: Option<u64>,
    solve_timeout_secs: Option<u64>,
    max_poll_attempts: Option<u32>,
    malformed_limit: Option<u32>,
    #[serde(default)]
    hints: SolveHints,
}

impl From<ConfigFile> for SolverConfig {
    fn from(file: ConfigFile) -> Self {
        let mut config = SolverConfig::new(file.api_key).with_hints(file.hints);
        if let Some(url) = file.request_url {
            config.request_url = url;
        }
        if let Some(url) = file.result_url {
            config.result_url = url;
        }
        if let Some(secs) = file.poll_interval_secs {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = file.http_timeout_secs {
            config.http_timeout = Duration::from_secs(secs);
        }
        config.solve_timeout = file.solve_timeout_secs.map(Duration::from_secs);
        config.max_poll_attempts = file.max_poll_attempts;
        config.malformed_limit = file.malformed_limit;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_rucaptcha() {
        let config = SolverConfig::new("key");
        assert_eq!(config.request_url, DEFAULT_REQUEST_URL);
        assert_eq!(config.result_url, DEFAULT_RESULT_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_poll_attempts, None);
        assert_eq!(config.solve_timeout, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_api_key_rejected() {
        let err = SolverConfig::new("  ").validate().unwrap_err();
        assert!(matches!(err, SolverError::Config(_)));
    }

    #[test]
    fn inverted_length_bounds_rejected() {
        let config = SolverConfig::new("key").with_hints(SolveHints {
            min_length: 8,
            max_length: 4,
            ..SolveHints::default()
        });
        assert!(matches!(config.validate(), Err(SolverError::Config(_))));
    }

    #[test]
    fn zero_poll_attempts_rejected() {
        let config = SolverConfig::new("key").with_max_poll_attempts(0);
        assert!(matches!(config.validate(), Err(SolverError::Config(_))));
    }

    #[test]
    fn zero_poll_interval_rejected() {
        let config = SolverConfig::new("key").with_poll_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(SolverError::Config(ref m)) if m.contains("poll_interval")));
    }

    #[test]
    fn debug_redacts_api_key() {
        let debug = format!("{:?}", SolverConfig::new("super-secret-key"));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn toml_full() {
        let config = SolverConfig::from_toml_str(
            r#"
            api_key = "abc"
            request_url = "http://localhost/in.php"
            result_url = "http://localhost/res.php"
            poll_interval_secs = 2
            solve_timeout_secs = 180
            max_poll_attempts = 30

            [hints]
            phrase = true
            numeric = "numbers_only"
            min_length = 4
            max_length = 6
            language = "latin"
            "#,
        )
        .unwrap();

        assert_eq!(config.api_key, "abc");
        assert_eq!(config.request_url, "http://localhost/in.php");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
        assert_eq!(config.solve_timeout, Some(Duration::from_secs(180)));
        assert_eq!(config.max_poll_attempts, Some(30));
        assert!(config.hints.phrase);
        assert!(!config.hints.case_sensitive);
        assert_eq!(config.hints.numeric, NumericMode::NumbersOnly);
        assert_eq!(config.hints.language, Language::Latin);
        assert_eq!(config.hints.max_length, 6);
    }

    #[test]
    fn toml_minimal_uses_defaults() {
        let config = SolverConfig::from_toml_str(r#"api_key = "abc""#).unwrap();
        assert_eq!(config.result_url, DEFAULT_RESULT_URL);
        assert_eq!(config.hints, SolveHints::default());
    }

    #[test]
    fn toml_unknown_field_rejected() {
        let err = SolverConfig::from_toml_str("api_key = \"a\"\nbogus = 1").unwrap_err();
        assert!(matches!(err, SolverError::Config(_)));
    }

    #[test]
    fn hint_codes() {
        assert_eq!(NumericMode::Any.code(), 0);
        assert_eq!(NumericMode::NumbersAndLetters.code(), 4);
        assert_eq!(Language::Cyrillic.code(), 1);
    }
}
