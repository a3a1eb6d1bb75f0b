use thiserror::Error;

/// Result type for docbulk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error source carried by remote and provisioning failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for docbulk operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors while enumerating or reading the document corpus
    #[error("Corpus error at {path}: {message}")]
    Corpus { path: String, message: String },

    /// A remote call failed with a non-retryable error
    #[error("{operation} '{resource}' failed: {source}")]
    Remote {
        operation: String,
        resource: String,
        #[source]
        source: BoxError,
    },

    /// Script registration stopped partway; earlier scripts stay registered
    #[error("Failed to register {kind} '{id}' on collection '{collection}': {source}")]
    ScriptRegistration {
        kind: String,
        id: String,
        collection: String,
        #[source]
        source: BoxError,
    },

    /// The remote batch-insert procedure broke its progress contract
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: BoxError,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a corpus error
    pub fn corpus(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corpus {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a remote failure for `operation` against `resource`
    pub fn remote<E>(operation: impl Into<String>, resource: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Remote {
            operation: operation.into(),
            resource: resource.into(),
            source: Box::new(source),
        }
    }

    /// Creates a script registration error
    pub fn script_registration<E>(
        kind: impl Into<String>,
        id: impl Into<String>,
        collection: impl Into<String>,
        source: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ScriptRegistration {
            kind: kind.into(),
            id: id.into(),
            collection: collection.into(),
            source: Box::new(source),
        }
    }

    /// Creates a protocol violation error
    pub fn protocol_violation(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    /// Creates an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}
