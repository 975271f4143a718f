//! Launch and presentation defaults shared across the codebase.

/// Entry point served when `--app` is not given.
pub const DEFAULT_ENTRY_POINT: &str = "app:server";

/// Worker threads sharing the listener.
pub const DEFAULT_WORKERS: usize = 4;

/// Bind address for the dashboard listener.
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Environment file applied before the runtime starts.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Dashboard presentation config file.
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.toml";

/// Max characters per line for question titles.
pub const TITLE_WRAP: usize = 60;

/// Max characters per line for answer options.
pub const TICK_WRAP: usize = 20;

/// Background poll interval between snapshot refreshes.
pub const REFRESH_INTERVAL_SECS: u64 = 15 * 60;

/// Minimum spacing between manual refreshes.
pub const REFRESH_THROTTLE_SECS: u64 = 60;

/// Snapshot file name inside the cache directory.
pub const SNAPSHOT_FILE_NAME: &str = "survey_cache.json";

/// Response columns that are identity/metadata, never charted as answers.
pub const RESERVED_COLUMNS: &[&str] = &["id", "token", "startdate"];
