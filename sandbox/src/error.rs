#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("id already in use: {0}")]
    DuplicateId(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot {op} {id}: state is {state}")]
    InvalidState {
        id: String,
        op: &'static str,
        state: String,
    },

    #[error("persistence failed: {0}")]
    PersistenceFailure(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SandboxError {
    pub fn invalid_state(id: &str, op: &'static str, state: impl std::fmt::Display) -> Self {
        Self::InvalidState {
            id: id.to_owned(),
            op,
            state: state.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SandboxError>;
