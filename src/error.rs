use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenumberError>;

#[derive(Error, Debug)]
pub enum RenumberError {
    /// The slot pool cannot hold every node. Raised before any placement.
    #[error("Slot pool too small: {needed} nodes need slots but only {available} are available")]
    Structural { needed: usize, available: usize },

    #[error("Duplicate node identifier: {0}")]
    DuplicateNode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RenumberError {
    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    /// Fatal errors abort a run; everything else the engine reports is best effort.
    pub fn is_structural(&self) -> bool {
        matches!(self, RenumberError::Structural { .. })
    }
}
