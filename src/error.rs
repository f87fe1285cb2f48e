use crate::types::{Group, UserId};

/// Errors raised while building a compatibility model or running a simulation
#[derive(Debug, thiserror::Error)]
pub enum MarketError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No like probability for {user} -> {candidate}")]
    MissingProbability { user: UserId, candidate: UserId },

    #[error("Unknown user: {0}")]
    UnknownUser(UserId),

    #[error("User {0} appears more than once in the population")]
    DuplicateUser(UserId),

    #[error("Group {0:?} has no users")]
    EmptyGroup(Group),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MarketError>;
