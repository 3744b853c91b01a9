/// Error types for connection and transaction management
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLx or from a driver adapter
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// `create_engine` / `init_engine` was called a second time
    #[error("Engine is already initialized")]
    EngineAlreadyInitialized,

    /// A connection was requested before any engine was installed
    #[error("Engine is not initialized")]
    EngineNotInitialized,

    /// The current task is not inside `with_connection` / `with_transaction`
    #[error("No database context is active in the current task")]
    NoContext,

    /// `ExecutionContext::init` was called on an initialized context
    #[error("Database context is already initialized")]
    ContextAlreadyInitialized,

    /// Commit or rollback was requested before any cursor opened a connection
    #[error("No connection has been opened in the current context")]
    NoConnection,

    /// A scalar select returned a row without exactly one column
    #[error("Expected only one column, found {0}")]
    MultipleColumns(usize),

    /// A record has no column with the requested name
    #[error("Column `{0}` not found")]
    ColumnNotFound(String),

    /// A value could not be converted to the requested Rust type
    #[error("Expected {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error comes from misuse of the engine or the context rather
    /// than from the database itself.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::EngineAlreadyInitialized
                | Error::EngineNotInitialized
                | Error::NoContext
                | Error::ContextAlreadyInitialized
                | Error::NoConnection
                | Error::Config(_)
        )
    }
}

/// Result type alias for database operations
pub type Result<T> = std::result::Result<T, Error>;
