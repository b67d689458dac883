use core::fmt;

/// Errors returned by [`CallbackRegistry`](crate::CallbackRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyError {
    /// The callback carries no observer, or the handle was issued by a
    /// different registry.
    InvalidArgument,
    /// The handle was never registered here or has already been removed.
    NotFound,
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::NotFound => write!(f, "callback already removed or never registered"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for NotifyError {}

pub type NotifyResult<T> = Result<T, NotifyError>;
