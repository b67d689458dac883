use ot_notify::NotifyError;
use ot_worker::WorkerError;
use thiserror::Error;

/// Failure reported by the engine. Passed through to callers untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("failed")]
    Failed,
    #[error("busy")]
    Busy,
    #[error("invalid arguments")]
    InvalidArgs,
    #[error("security")]
    Security,
    #[error("invalid state")]
    InvalidState,
    #[error("not found")]
    NotFound,
    #[error("error {0}")]
    Other(u8),
}

impl EngineError {
    /// Numeric engine error code, as printed in log lines.
    pub fn code(self) -> u8 {
        match self {
            Self::Failed => 1,
            Self::Busy => 5,
            Self::InvalidArgs => 7,
            Self::Security => 8,
            Self::InvalidState => 13,
            Self::NotFound => 23,
            Self::Other(code) => code,
        }
    }

    /// Maps a numeric engine code. Zero is success and yields `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => None,
            1 => Some(Self::Failed),
            5 => Some(Self::Busy),
            7 => Some(Self::InvalidArgs),
            8 => Some(Self::Security),
            13 => Some(Self::InvalidState),
            23 => Some(Self::NotFound),
            other => Some(Self::Other(other)),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field}: expected {expected} hex bytes")]
    HexLength { field: &'static str, expected: usize },
    #[error("{field}: invalid hex digit")]
    HexDigit { field: &'static str },
    #[error("invalid NAT64 CIDR `{0}`")]
    Cidr(String),
}

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("a receive handler is required unless running as a coprocessor")]
    MissingReceiveHandler,
    #[error("engine rejected {what}: {source}")]
    Engine {
        what: &'static str,
        #[source]
        source: EngineError,
    },
    /// Starting the network failed.
    #[error("I/O error: {0}")]
    Io(EngineError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

pub type PlatformResult<T> = Result<T, PlatformError>;
