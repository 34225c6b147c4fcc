use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    /// Carries the driver's message verbatim.
    #[error("database error: {0}")]
    Database(String),

    #[error("duplicate migration id registered: {0}")]
    DuplicateId(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
