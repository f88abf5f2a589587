use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input: {0}")]
    Input(String),

    #[error("unbound function input: {0}")]
    Lookup(String),

    #[error("external tool failed: {0}")]
    ExternalTool(String),
}

pub type Result<T> = std::result::Result<T, SynthError>;
