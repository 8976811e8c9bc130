//! Error types for coding sessions and models.

use thiserror::Error;

/// Error variants for encode/decode operations.
///
/// Model-level logic errors ([`ZeroMass`](Error::ZeroMass),
/// [`UnknownSymbol`](Error::UnknownSymbol)) are kept apart from bit I/O
/// failures so callers can tell a broken model from a broken stream.
/// Internal interval-bookkeeping violations are not represented here;
/// those are bugs and assert.
#[derive(Debug, Error)]
pub enum Error {
    /// A model asked the coder for an empty sub-interval, i.e. tried to
    /// code an event it assigns zero probability.
    #[error("zero-mass region [{low}, {high}) of total {total}")]
    ZeroMass {
        /// Lower end of the requested region.
        low: u64,
        /// Upper end of the requested region.
        high: u64,
        /// Denominator the region was expressed against.
        total: u64,
    },

    /// A model was asked to code a symbol outside its support.
    #[error("symbol {0:#04x} is not in the model's support")]
    UnknownSymbol(u8),

    /// An I/O error surfaced while moving bits. Fatal to the session:
    /// coding state cannot be rolled back mid-symbol.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for coding operations.
pub type Result<T> = std::result::Result<T, Error>;
