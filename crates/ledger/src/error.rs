use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("fill rejected: insufficient margin (needs {needed}, cash available {cash})")]
    InsufficientMargin { needed: Decimal, cash: Decimal },

    #[error("fill rejected: size must be positive, got {0}")]
    InvalidSize(Decimal),

    #[error("fill rejected: price must be positive, got {0}")]
    InvalidPrice(Decimal),
}

pub type Result<T> = std::result::Result<T, Error>;
