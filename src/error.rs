pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object reference not set to an instance of an object")]
    NullReference,

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("object synchronization method was called from an unsynchronized block of code")]
    SynchronizationLock,

    #[error("the operation was canceled")]
    OperationCanceled,

    #[error("config error: {0}")]
    Config(String),

    #[error("thread pool not initialized")]
    NotInitialized,

    #[error("thread spawn failed: {0}")]
    ThreadSpawn(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_operation<S: Into<String>>(msg: S) -> Self {
        Error::InvalidOperation(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn thread_spawn<S: Into<String>>(msg: S) -> Self {
        Error::ThreadSpawn(msg.into())
    }
}
