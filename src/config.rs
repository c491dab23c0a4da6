use crate::constants::*;
use crate::error::{ReportError, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Runtime configuration: defaults, then an optional TOML file, then env.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub google: GoogleConfig,
    pub paths: PathsConfig,
    pub classify: ClassifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub username: Option<String>,
    /// Only ever read from the environment.
    #[serde(skip)]
    pub password: Option<Secret>,
    pub headless: bool,
    pub webdriver_url: String,
    pub login_url: String,
    pub scripted_activities: Vec<u32>,
    pub timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            headless: true,
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            scripted_activities: vec![PARKING_PATROL_ACTIVITY, ALL_ACTIVITIES],
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub credentials_file: PathBuf,
    pub token_file: PathBuf,
    pub target_folder: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            target_folder: DEFAULT_TARGET_FOLDER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub reports_dir: PathBuf,
    pub data_lake_dir: Option<PathBuf>,
    pub db_file: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from(DEFAULT_REPORTS_DIR),
            data_lake_dir: None,
            db_file: PathBuf::from(DEFAULT_DB_FILE),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl PathsConfig {
    pub fn data_lake_dir(&self) -> PathBuf {
        self.data_lake_dir
            .clone()
            .unwrap_or_else(|| self.reports_dir.join(DATA_LAKE_SUBDIR))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub hours_threshold: f64,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            hours_threshold: DEFAULT_HOURS_THRESHOLD,
        }
    }
}

/// A credential that never shows up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Config {
    /// Load configuration. An explicit `path` must exist; otherwise
    /// `ov_reports.toml` is read when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ReportError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment-style overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OV_USERNAME") {
            self.portal.username = Some(v);
        }
        if let Some(v) = get("OV_PASSWORD") {
            self.portal.password = Some(Secret::new(v));
        }
        if let Some(v) = get("OV_HEADLESS") {
            self.portal.headless = matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1");
        }
        if let Some(v) = get("OV_WEBDRIVER_URL") {
            self.portal.webdriver_url = v;
        }
        if let Some(v) = get("OV_LOGIN_URL") {
            self.portal.login_url = v;
        }
        if let Some(v) = get("GDRIVE_CREDENTIALS_FILE") {
            self.google.credentials_file = PathBuf::from(v);
        }
        if let Some(v) = get("GOOGLE_TOKEN_FILE") {
            self.google.token_file = PathBuf::from(v);
        }
        if let Some(v) = get("GDRIVE_TARGET_FOLDER") {
            self.google.target_folder = v;
        }
        if let Some(v) = get("REPORTS_DIR") {
            self.paths.reports_dir = PathBuf::from(v);
        }
        if let Some(v) = get("DATA_LAKE_DIR") {
            self.paths.data_lake_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("DB_FILE") {
            self.paths.db_file = PathBuf::from(v);
        }
        if let Some(v) = get("LOG_DIR") {
            self.paths.log_dir = PathBuf::from(v);
        }
        if let Some(v) = get("HOURS_THRESHOLD") {
            self.classify.hours_threshold = v.trim().parse().map_err(|_| {
                ReportError::Config(format!("HOURS_THRESHOLD must be a number, got '{}'", v))
            })?;
        }
        Ok(())
    }

    /// Portal credentials, required only when the browser step runs.
    pub fn portal_credentials(&self) -> Result<(&str, &Secret)> {
        match (&self.portal.username, &self.portal.password) {
            (Some(user), Some(pass)) => Ok((user.as_str(), pass)),
            _ => Err(ReportError::Config(
                "Please set the OV_USERNAME and OV_PASSWORD environment variables.".to_string(),
            )),
        }
    }
}
