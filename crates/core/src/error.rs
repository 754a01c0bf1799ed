#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },
    #[error(transparent)]
    Types(#[from] greenpass_types::TypesError),
}

pub type PassResult<T> = std::result::Result<T, PassError>;
