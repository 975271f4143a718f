use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Base64 decoding failed: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("LimeSurvey API error: {message}")]
    Api { message: String },

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Entry point error: {0}")]
    EntryPoint(String),

    #[error("Server error: {0}")]
    Server(#[from] hyper::Error),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
