use thiserror::Error;

#[derive(Debug, Error)]
pub enum SerialError {
    #[error("open {port}: {message}")]
    Open { port: String, message: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, SerialError>;
