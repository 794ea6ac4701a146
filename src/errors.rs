use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectGraphError {
    #[error("schema error: {0}")]
    Schema(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("referential integrity: {0}")]
    Referential(String),
    #[error("detached entity: {0}")]
    DetachedEntity(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("store timeout: {0}")]
    StoreTimeout(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ObjectGraphError {
    pub fn schema<T: Into<String>>(msg: T) -> Self {
        ObjectGraphError::Schema(msg.into())
    }

    pub fn type_mismatch<T: Into<String>>(msg: T) -> Self {
        ObjectGraphError::TypeMismatch(msg.into())
    }

    pub fn referential<T: Into<String>>(msg: T) -> Self {
        ObjectGraphError::Referential(msg.into())
    }

    pub fn detached<T: Into<String>>(msg: T) -> Self {
        ObjectGraphError::DetachedEntity(msg.into())
    }

    pub fn unavailable<T: Into<String>>(msg: T) -> Self {
        ObjectGraphError::StoreUnavailable(msg.into())
    }

    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        ObjectGraphError::StoreTimeout(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ObjectGraphError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        ObjectGraphError::InvalidInput(msg.into())
    }
}
