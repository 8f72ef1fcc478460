//! Application settings.
//!
//! One immutable [`Settings`] struct is built at startup, either from
//! defaults or from environment variables. Validation never aborts on a
//! non-critical field: bad values fall back to their defaults and the
//! problem is reported in a warning list the caller can surface.

use crate::constants::timing;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Browser engines the driver layer can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    Edge,
    Chrome,
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserType {
    /// Parse a configured browser name; `None` for unknown/empty input so
    /// the UI can prompt instead of guessing.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "edge" => Some(Self::Edge),
            "chrome" => Some(Self::Chrome),
            "chromium" => Some(Self::Chromium),
            "firefox" => Some(Self::Firefox),
            "webkit" => Some(Self::Webkit),
            _ => None,
        }
    }

    /// The underlying engine the driver has to launch.
    pub fn engine(&self) -> &'static str {
        match self {
            Self::Edge | Self::Chrome | Self::Chromium => "chromium",
            Self::Firefox => "firefox",
            Self::Webkit => "webkit",
        }
    }

    /// Distribution channel for chromium-family browsers.
    pub fn channel(&self) -> Option<&'static str> {
        match self {
            Self::Edge => Some("msedge"),
            Self::Chrome => Some("chrome"),
            _ => None,
        }
    }
}

/// Viewport dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Browser launch/attach settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    /// Requested browser; `None` means the front-end should prompt.
    pub browser_type: Option<BrowserType>,
    pub headless: bool,
    pub cdp_port: u16,
    pub viewport: Viewport,
    pub user_agent: String,
    pub attach_existing: bool,
    pub data_dir: PathBuf,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            browser_type: None,
            headless: false,
            cdp_port: 9222,
            viewport: Viewport::default(),
            user_agent: String::new(),
            attach_existing: false,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Platform (LinkedIn-style site) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    pub email: String,
    pub password: String,
    #[serde(with = "duration_millis")]
    pub default_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub min_delay: Duration,
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            default_timeout: Duration::from_millis(10_000),
            min_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(3_000),
            max_retries: 3,
        }
    }
}

/// Log verbosity for the front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Debug,
}

/// System-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSettings {
    pub debug_mode: bool,
    pub log_level: LogLevel,
    pub data_dir: PathBuf,
    pub max_retries: u32,
    #[serde(with = "duration_millis")]
    pub retry_delay: Duration,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            debug_mode: false,
            log_level: LogLevel::Info,
            data_dir: PathBuf::from("./data"),
            max_retries: 3,
            retry_delay: Duration::from_millis(1_000),
        }
    }
}

/// Telemetry sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub storage_path: PathBuf,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_path: PathBuf::from("./data/telemetry"),
        }
    }
}

/// Strategy for CAPTCHA challenges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptchaHandler {
    #[default]
    Manual,
    External,
}

/// CAPTCHA settings; the external solver key comes from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptchaSettings {
    pub handler: CaptchaHandler,
    pub api_key: String,
}

/// Immutable application settings, constructed once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub browser: BrowserSettings,
    pub platform: PlatformSettings,
    pub system: SystemSettings,
    pub telemetry: TelemetrySettings,
    pub captcha: CaptchaSettings,
}

impl Settings {
    /// Build settings from environment variables, collecting warnings for
    /// every value that had to fall back to a default.
    pub fn from_env() -> (Self, Vec<String>) {
        let mut warnings = Vec::new();
        let mut settings = Settings::default();

        if let Some(raw) = env_var("BROWSER_TYPE") {
            settings.browser.browser_type = BrowserType::parse(&raw);
            if settings.browser.browser_type.is_none() {
                warnings.push(format!(
                    "Unrecognised BROWSER_TYPE '{}'. Browser selection will be prompted.",
                    raw
                ));
            }
        }
        if let Some(raw) = env_var("BROWSER_HEADLESS") {
            settings.browser.headless = parse_bool(&raw);
        }
        if let Some(raw) = env_var("CDP_PORT") {
            match raw.parse() {
                Ok(port) => settings.browser.cdp_port = port,
                Err(_) => warnings.push("Invalid CDP_PORT value. Using default: 9222".into()),
            }
        }
        if let Some(raw) = env_var("VIEWPORT_WIDTH") {
            match raw.parse() {
                Ok(w) => settings.browser.viewport.width = w,
                Err(_) => warnings.push("Invalid VIEWPORT_WIDTH value. Using default: 1280".into()),
            }
        }
        if let Some(raw) = env_var("VIEWPORT_HEIGHT") {
            match raw.parse() {
                Ok(h) => settings.browser.viewport.height = h,
                Err(_) => warnings.push("Invalid VIEWPORT_HEIGHT value. Using default: 720".into()),
            }
        }
        if let Some(raw) = env_var("USER_AGENT") {
            settings.browser.user_agent = raw;
        }
        if let Some(raw) = env_var("ATTACH_EXISTING") {
            settings.browser.attach_existing = parse_bool(&raw);
        }
        if let Some(raw) = env_var("DATA_DIR") {
            let expanded = expand_path(&raw);
            settings.browser.data_dir = expanded.clone();
            settings.system.data_dir = expanded.clone();
            settings.telemetry.storage_path = expanded.join("telemetry");
        }

        if let Some(raw) = env_var("LINKEDIN_EMAIL") {
            settings.platform.email = raw;
        }
        if let Some(raw) = env_var("LINKEDIN_PASSWORD") {
            settings.platform.password = raw;
        }
        if let Some(raw) = env_var("LINKEDIN_TIMEOUT") {
            match raw.parse::<u64>() {
                Ok(ms) => settings.platform.default_timeout = Duration::from_millis(ms),
                Err(_) => {
                    warnings.push("Invalid LINKEDIN_TIMEOUT value. Using default: 10000".into())
                }
            }
        }
        let min_delay = env_var("LINKEDIN_MIN_DELAY").and_then(|v| parse_secs(&v));
        let max_delay = env_var("LINKEDIN_MAX_DELAY").and_then(|v| parse_secs(&v));
        match (min_delay, max_delay) {
            (Some(min), Some(max)) if min > max => {
                warnings.push("MIN_DELAY is greater than MAX_DELAY. Swapping values.".into());
                settings.platform.min_delay = max;
                settings.platform.max_delay = min;
            }
            (min, max) => {
                if let Some(min) = min {
                    settings.platform.min_delay = min;
                }
                if let Some(max) = max {
                    settings.platform.max_delay = max;
                }
            }
        }
        if let Some(raw) = env_var("LINKEDIN_MAX_RETRIES") {
            match raw.parse() {
                Ok(n) => settings.platform.max_retries = n,
                Err(_) => {
                    warnings.push("Invalid LINKEDIN_MAX_RETRIES value. Using default: 3".into())
                }
            }
        }

        if let Some(raw) = env_var("DEBUG_MODE") {
            settings.system.debug_mode = parse_bool(&raw);
        }
        if let Some(raw) = env_var("LOG_LEVEL") {
            settings.system.log_level = match raw.trim().to_ascii_uppercase().as_str() {
                "DEBUG" => LogLevel::Debug,
                "INFO" => LogLevel::Info,
                other => {
                    warnings.push(format!("Unknown LOG_LEVEL '{}'. Using INFO.", other));
                    LogLevel::Info
                }
            };
        }
        if let Some(raw) = env_var("MAX_RETRIES") {
            match raw.parse() {
                Ok(n) => settings.system.max_retries = n,
                Err(_) => warnings.push("Invalid MAX_RETRIES value. Using default: 3".into()),
            }
        }
        if let Some(raw) = env_var("RETRY_DELAY") {
            match parse_secs(&raw) {
                Some(d) => settings.system.retry_delay = d,
                None => warnings.push("Invalid RETRY_DELAY value. Using default: 1.0".into()),
            }
        }

        if let Some(raw) = env_var("TELEMETRY_ENABLED") {
            settings.telemetry.enabled = parse_bool(&raw);
        }
        if let Some(raw) = env_var("TELEMETRY_STORAGE_PATH") {
            settings.telemetry.storage_path = expand_path(&raw);
        }

        if let Some(raw) = env_var("CAPTCHA_HANDLER") {
            settings.captcha.handler = match raw.trim().to_ascii_lowercase().as_str() {
                "external" => CaptchaHandler::External,
                "manual" => CaptchaHandler::Manual,
                other => {
                    warnings.push(format!("Unknown CAPTCHA_HANDLER '{}'. Using manual.", other));
                    CaptchaHandler::Manual
                }
            };
        }
        settings.captcha.api_key = env_var("API_KEY").unwrap_or_default();
        if settings.captcha.handler == CaptchaHandler::External
            && settings.captcha.api_key.is_empty()
        {
            warnings.push(
                "CAPTCHA_HANDLER=external but API_KEY is not set. Falling back to manual.".into(),
            );
            settings.captcha.handler = CaptchaHandler::Manual;
        }

        warnings.extend(settings.normalise());
        (settings, warnings)
    }

    /// Re-check invariants on an already-built settings value.
    ///
    /// Returns warnings; only truly critical problems (no data dir at all)
    /// are errors elsewhere.
    pub fn normalise(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.platform.min_delay > self.platform.max_delay {
            warnings.push("MIN_DELAY is greater than MAX_DELAY. Swapping values.".into());
            std::mem::swap(&mut self.platform.min_delay, &mut self.platform.max_delay);
        }
        if self.system.data_dir.as_os_str().is_empty() {
            warnings.push("No data_dir specified, using './data'".into());
            self.system.data_dir = PathBuf::from("./data");
        }
        if self.platform.max_retries == 0 {
            warnings.push("max_retries of 0 would never attempt the flow. Using 1.".into());
            self.platform.max_retries = 1;
        }
        warnings
    }

    /// The effective retry policy for whole flows.
    pub fn flow_retry_policy(&self) -> crate::retry::RetryPolicy {
        crate::retry::RetryPolicy::new(
            self.platform.max_retries,
            timing::BASE_RETRY_DELAY,
            timing::RETRY_BACKOFF_FACTOR,
        )
    }

    /// Create the persisted-state layout under `data_dir`.
    pub fn ensure_data_dirs(&self) -> Result<()> {
        let base = &self.system.data_dir;
        for sub in ["logs", "cookies", "screenshots", "profiles"] {
            create_dir(&base.join(sub))?;
        }
        create_dir(&self.telemetry.storage_path.join("events"))?;
        create_dir(&self.telemetry.storage_path.join("metrics"))?;
        Ok(())
    }

    /// Directory for activity logs.
    pub fn logs_dir(&self) -> PathBuf {
        self.system.data_dir.join("logs")
    }

    /// Directory for the profile store.
    pub fn profiles_dir(&self) -> PathBuf {
        self.system.data_dir.join("profiles")
    }
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .map_err(|e| Error::Config(format!("failed to create '{}': {}", path.display(), e)))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

fn parse_secs(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|s| *s >= 0.0 && s.is_finite())
        .map(Duration::from_secs_f64)
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(de)?))
    }
}
