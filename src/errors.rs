//! Relation Membership Error Hierarchy
//!
//! Defines the error types returned by the relation, membership, settings
//! and scope-watch layers, categorized by the layer that produced them.
//!
//! Foreseeable conditions (a service that is not part of a relation, a
//! settings document that does not exist, a duplicate join) are always
//! returned, never panicked on. They are usually wrapped in
//! [`Error::Context`] naming the unit and relation involved; use
//! [`Error::root`] or the `is_*` helpers to classify them.

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (storage, serialization, background tasks)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Relation model and membership protocol violations
    #[error(transparent)]
    Relation(#[from] RelationError),

    /// An error annotated with the operation that was attempted
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    /// Unrecoverable failures caused by corrupted state
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Storage layer
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    // Serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures while opening the database
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Embedded database errors
    #[error("Embedded database error: {0}")]
    DbError(String),

    /// A transaction assertion did not hold; nothing was applied
    #[error("Transaction aborted on {collection}/{id}")]
    TransactionAborted { collection: &'static str, id: String },

    /// The store has been closed or cannot currently serve requests
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

// Serialization is classified separately (documents are stored in two encodings)
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("Bincode serialization failed: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RelationError {
    /// The service (or the service owning a unit) is not an endpoint of the relation
    #[error("service {service:?} is not a member of {relation:?}")]
    NotMember { service: String, relation: String },

    /// A resolvable endpoint has no counterpart endpoint in the relation
    #[error("no endpoints of {relation:?} relate to service {service:?}")]
    NoRelatedEndpoints { relation: String, service: String },

    /// The relation document no longer exists
    #[error("relation {relation:?} not found")]
    RelationNotFound { relation: String },

    /// A document other than the relation itself is absent
    #[error("{0} not found")]
    NotFound(String),

    /// A membership marker already exists for the unit in this scope
    #[error("unit {unit:?} has already joined relation {relation:?}")]
    DuplicateMembership { unit: String, relation: String },

    /// A relation with the same key has already been created
    #[error("relation {relation:?} already exists")]
    AlreadyExists { relation: String },

    /// The endpoints cannot form a relation
    #[error("invalid endpoints for relation: {0}")]
    InvalidEndpoints(String),

    /// Unit names must be `<service>/<number>` and free of key separators
    #[error("invalid unit name {0:?}")]
    InvalidUnitName(String),

    /// A role string outside the closed set of relation roles
    #[error("unknown relation role {0:?}")]
    UnknownRole(String),

    /// A scope string outside the closed set of relation scopes
    #[error("unknown relation scope {0:?}")]
    UnknownScope(String),
}

impl Error {
    /// Wraps `self` with a description of the attempted operation.
    pub fn context(
        self,
        context: impl Into<String>,
    ) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping any context wrappers.
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// True when a document (relation, settings, address) does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Error::Relation(RelationError::NotFound(_)) | Error::Relation(RelationError::RelationNotFound { .. })
        )
    }

    /// True when the relation itself is gone, as opposed to some other document.
    pub fn is_relation_not_found(&self) -> bool {
        matches!(self.root(), Error::Relation(RelationError::RelationNotFound { .. }))
    }

    pub fn is_not_member(&self) -> bool {
        matches!(self.root(), Error::Relation(RelationError::NotMember { .. }))
    }

    pub fn is_duplicate_membership(&self) -> bool {
        matches!(self.root(), Error::Relation(RelationError::DuplicateMembership { .. }))
    }

    /// True when a transaction assertion failed and nothing was written.
    pub fn is_txn_aborted(&self) -> bool {
        matches!(
            self.root(),
            Error::System(SystemError::Storage(StorageError::TransactionAborted { .. }))
        )
    }

    /// True for transient store failures that the caller may retry.
    ///
    /// Structural failures (aborted assertions, duplicate membership,
    /// not-a-member, corrupt documents) are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Error::System(SystemError::Storage(
                StorageError::IoError(_) | StorageError::DbError(_) | StorageError::Unavailable(_)
            )) | Error::System(SystemError::TaskFailed(_))
        )
    }
}

/// Attaches an operation description to the error branch of a `Result`.
pub(crate) trait ResultExt<T> {
    fn context_with<F, S>(
        self,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context_with<F, S>(
        self,
        f: F,
    ) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

// ============== Conversion Implementations ============== //
impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<SerializationError> for Error {
    fn from(e: SerializationError) -> Self {
        Error::System(SystemError::Serialization(e))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        SerializationError::Bincode(e).into()
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        SerializationError::Json(e).into()
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        StorageError::DbError(err.to_string()).into()
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        SystemError::TaskFailed(err).into()
    }
}
