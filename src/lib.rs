//! Adaptive arithmetic coding with PPM context-tree models.
//!
//! The [`coder`] module holds the finite-precision arithmetic coder and
//! the [`Encoder`]/[`Decoder`] protocol; [`models`] holds the
//! probability models that drive it, chiefly the [`Ppm`] context-tree
//! predictor over a pluggable base distribution. Models map symbols to
//! `(low, high, total)` regions and the coder turns those into bits and
//! back; for any model, decoding an encoded transcript reproduces the
//! symbols exactly.

pub mod bit_io;
pub mod coder;
pub mod error;
pub mod models;

pub use coder::{ArithmeticDecoder, ArithmeticEncoder, Decoder, Encoder};
pub use error::{Error, Result};
pub use models::{ByteSet, Codable, ExclusionCodable, Ppm, UniformBytes};
