use thiserror::Error;

/// Gateway failures, split along the engine's error taxonomy: transient I/O
/// is retried by the calling worker after backoff, rejected orders end the
/// cycle without a retry, and `Halted` means the kill switch has tripped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("gateway call timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    #[error("no market data for symbol {0}")]
    NoMarketData(String),

    #[error("engine is halted; order refused")]
    Halted,
}

impl Error {
    /// Whether the caller should treat this as recoverable and retry after
    /// backoff. Rejections and a tripped kill switch are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
