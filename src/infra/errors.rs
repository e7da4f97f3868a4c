// src/infra/errors.rs - Error types for DataPilot

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataPilotError {
    // Configuration errors (fatal at startup)
    #[error("Missing credential for '{provider}': set {env_vars} or llm.api_key in config")]
    MissingCredential {
        provider: String,
        env_vars: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    // Backend errors (fatal to the run, never retried)
    #[error("Provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    // Infra
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
