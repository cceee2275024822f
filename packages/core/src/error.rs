use thiserror::Error;

/// Unified application error.
///
/// This ensures all layers (config, network, cache, parsing)
/// fail in a predictable and debuggable way.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
