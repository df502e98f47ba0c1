/// Error types for the shared infrastructure of the deal finder.
///
/// These cover persistence and cache backends. Provider and parsing failures
/// belong to the server crate and never surface through `CommonError`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis unavailable")]
    RedisUnavailable,

    #[error("settings io error: {0}")]
    SettingsIo(#[from] std::io::Error),

    #[error("settings format error: {0}")]
    SettingsFormat(#[from] serde_json::Error),

    #[error("settings save failed: {0}")]
    SettingsSave(String),
}
