#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("ERR {0}")]
    Generic(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgCount(String),

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR value is not an integer or out of range")]
    NotInteger,

    #[error("ERR value is not a valid float")]
    NotFloat,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR syntax error")]
    SyntaxError,

    #[error("ERR {0}")]
    OptionConflict(String),

    #[error("ERR {0}")]
    LimitExceeded(String),

    #[error("ERR operation cancelled")]
    Cancelled,

    #[error("ERR internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Render the error the way it appears on the wire, minus the leading `-`.
    pub fn to_resp_error(&self) -> String {
        format!("{self}")
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, StoreError::Cancelled)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
