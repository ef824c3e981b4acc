use thiserror::Error;
use volgauge_core::{
    ConfigError, EngineError, ProviderError, ResolveError, StoreError, ValidationError,
    WarehouseError,
};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<EngineError> for CliError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::Configuration(error) => Self::Config(error),
            EngineError::Store(error) => Self::Store(error),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Resolve(_) => 2,
            Self::Config(_) => 3,
            Self::Store(_) => 4,
            Self::Warehouse(_) => 4,
            Self::Serialization(_) => 5,
            Self::Provider(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
