/// A requested attribute cannot be used the way the caller asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A "show attribute" is not declared listable.
    NotListable(String),
    /// A sort/group attribute does not name a mapped property.
    UnknownAttribute(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::NotListable(attr) => write!(f, "Property is not listable: {attr}"),
            ValidationError::UnknownAttribute(attr) => write!(f, "Unknown attribute: {attr}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors that can occur in the data layer.
#[derive(Debug)]
pub enum DataError {
    /// A model type is missing its table binding, its key column, or a
    /// many-to-many intermediary.
    Configuration(String),
    Validation(ValidationError),
    /// Cascading child statements failed; the enclosing transaction was rolled back.
    CompositionFailure(Box<DataError>),
    /// A filter could not be serialized into a cache key.
    CacheOperation(String),
    NotFound(String),
    Database(Box<dyn std::error::Error + Send + Sync>),
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by backend crates (e.g. `relmap-data-sqlx`) to wrap
    /// driver-specific errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        DataError::Configuration(msg.into())
    }

    pub fn composition(err: DataError) -> Self {
        match err {
            already @ DataError::CompositionFailure(_) => already,
            other => DataError::CompositionFailure(Box::new(other)),
        }
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
            DataError::Validation(err) => write!(f, "Validation error: {err}"),
            DataError::CompositionFailure(err) => write!(f, "Composition failure: {err}"),
            DataError::CacheOperation(msg) => write!(f, "Cache operation error: {msg}"),
            DataError::NotFound(msg) => write!(f, "Not found: {msg}"),
            DataError::Database(err) => write!(f, "Database error: {err}"),
            DataError::Other(msg) => write!(f, "Data error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            DataError::Validation(err) => Some(err),
            DataError::CompositionFailure(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<ValidationError> for DataError {
    fn from(err: ValidationError) -> Self {
        DataError::Validation(err)
    }
}
