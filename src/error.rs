use thiserror::Error;

/// The exhaustive fault taxonomy produced by the decoding core.
///
/// `Eof` and `Again` are deliberately absent: they're normal suspension
/// markers threaded through the `BtrOutcome` / `MediumStatus` /
/// `NotifIterStep` result types rather than faults, and never appear
/// wrapped in this type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("corrupt trace: {0}")]
    CorruptTrace(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("callback error: {0}")]
    CallbackError(String),
}

impl Error {
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        Error::CorruptTrace(msg.into())
    }

    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        Error::UnsupportedFeature(msg.into())
    }

    pub fn callback<S: Into<String>>(msg: S) -> Self {
        Error::CallbackError(msg.into())
    }

    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
