use std::fmt;

/// The own result type where the error part is a async friendly error.
pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand of a boxed Send, Sync error.
pub type Error = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A record couldn't be committed, read or enumerated.
    Storage,
    /// The queue service has been shut down, or its event loop is gone.
    Closed,
    /// Anything which isn't a `QueueError` originally.
    Internal,
}

#[derive(Debug)]
pub struct QueueError {
    pub kind: ErrorKind,
    pub text: String,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.text)
    }
}

impl std::error::Error for QueueError {}

impl<T> From<QueueError> for Result<T> {
    fn from(value: QueueError) -> Self {
        Err(Box::new(value))
    }
}

impl ErrorKind {
    pub fn into_error(self, text: &str) -> QueueError {
        QueueError {
            kind: self,
            text: text.to_owned(),
        }
    }

    pub fn into_result<T>(self, text: &str) -> Result<T> {
        self.into_error(text).into()
    }
}

/// Helper to create storage errors, the text usually contains the path and the io error.
pub fn storage_error<T>(text: &str) -> Result<T> {
    ErrorKind::Storage.into_result(text)
}

pub fn closed_error<T>() -> Result<T> {
    ErrorKind::Closed.into_result("queue service is closed")
}

/// Converts all errors as `QueueError`. Unknown errors are wrapped as internal errors.
pub fn to_queue_error(err: Error) -> QueueError {
    match err.downcast::<QueueError>() {
        Ok(qe) => *qe,
        Err(e) => QueueError {
            kind: ErrorKind::Internal,
            text: format!("Internal error: {e}"),
        },
    }
}
