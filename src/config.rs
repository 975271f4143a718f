use crate::constants;
use crate::error::{DashboardError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Europe::Helsinki;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Connection settings for the LimeSurvey RemoteControl 2 API, read from the
/// process environment (provisioned from the env file at startup).
#[derive(Debug, Clone)]
pub struct SurveyConfig {
    pub api_url: String,
    pub username: String,
    pub password: String,
    pub survey_id: u32,
    /// A response is considered complete once `lastpage` reaches this value.
    pub lastpage_threshold: i64,
}

impl SurveyConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_url: require_var("LIMESURVEY_URL")?,
            username: require_var("LIMESURVEY_USERNAME")?,
            password: require_var("LIMESURVEY_PASSWORD")?,
            survey_id: int_var("LIMESURVEY_SURVEY_ID", 0)?,
            lastpage_threshold: int_var("LIMESURVEY_LASTPAGE", 0)?,
        })
    }
}

fn require_var(name: &str) -> Result<String> {
    env::var(name).map_err(|_| DashboardError::Config(format!("{} is not set", name)))
}

fn int_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| DashboardError::Config(format!("{} is not an integer: '{}'", name, raw))),
        Err(_) => Ok(default),
    }
}

/// One charted survey question: the response column code and its display label.
#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub code: String,
    pub label: String,
}

/// Presentation settings for the dashboard, loaded from `dashboard.toml`.
/// A missing file falls back to compiled defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_title_wrap")]
    pub title_wrap: usize,
    #[serde(default = "default_tick_wrap")]
    pub tick_wrap: usize,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_refresh_throttle")]
    pub refresh_throttle_secs: u64,
    /// Directory holding the snapshot file; system temp dir when unset.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Default cutoff as local Helsinki time, `YYYY-MM-DD HH:MM`.
    #[serde(default = "default_cutoff")]
    pub default_cutoff: String,
    #[serde(default = "default_questions")]
    pub questions: Vec<Question>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            title_wrap: default_title_wrap(),
            tick_wrap: default_tick_wrap(),
            refresh_interval_secs: default_refresh_interval(),
            refresh_throttle_secs: default_refresh_throttle(),
            cache_dir: None,
            default_cutoff: default_cutoff(),
            questions: default_questions(),
        }
    }
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: DashboardConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Cutoff to apply when a request carries none, parsed from
    /// `default_cutoff` as Helsinki local time.
    pub fn default_cutoff_utc(&self) -> Result<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(&self.default_cutoff, "%Y-%m-%d %H:%M")
            .map_err(|e| {
                DashboardError::Config(format!(
                    "default_cutoff '{}' is not 'YYYY-MM-DD HH:MM': {}",
                    self.default_cutoff, e
                ))
            })?;
        let local = Helsinki
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| {
                DashboardError::Config(format!(
                    "default_cutoff '{}' does not exist in Europe/Helsinki",
                    self.default_cutoff
                ))
            })?;
        Ok(local.with_timezone(&Utc))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

fn default_title() -> String {
    "Haaga-Helia LimeSurvey Dashboard".to_string()
}

fn default_title_wrap() -> usize {
    constants::TITLE_WRAP
}

fn default_tick_wrap() -> usize {
    constants::TICK_WRAP
}

fn default_refresh_interval() -> u64 {
    constants::REFRESH_INTERVAL_SECS
}

fn default_refresh_throttle() -> u64 {
    constants::REFRESH_THROTTLE_SECS
}

fn default_cutoff() -> String {
    "2025-05-20 18:00".to_string()
}

fn default_questions() -> Vec<Question> {
    [
        ("lastpage", "Last Page Reached"),
        ("is_completed", "Completed Survey"),
        ("q1age", "Age"),
        ("q1gender", "Gender"),
        ("q3edu", "Education Level"),
        ("q4lang", "Language Skill"),
        ("q5reading", "Reading Skill"),
        ("q6onlinenews", "Online News Capacity"),
        ("q7readfreq", "Frequency of Reading"),
    ]
    .iter()
    .map(|(code, label)| Question {
        code: code.to_string(),
        label: label.to_string(),
    })
    .collect()
}
