//! Arithmetic coding core and the protocol models use to talk to it.
//!
//! A coding session maintains a finite-precision interval over a
//! `2^62` domain and narrows it once per coded symbol. Models never
//! touch bits: they compute a `(low, high, total)` region from their
//! own statistics and commit it through [`Encoder::store_region`], or
//! ask [`Decoder::target`] which region the hidden decode point fell
//! into and confirm it with [`Decoder::load_region`]. For a round trip
//! the two sides must derive identical regions from identical model
//! state; everything else is the coder's problem.

mod arithmetic;

pub use arithmetic::{ArithmeticDecoder, ArithmeticEncoder};

use crate::error::Result;

/// Bits of coding precision: the word size minus headroom for the
/// scaled region arithmetic.
pub const PRECISION: u32 = u64::BITS - 2; // 62

/// Upper end of the coding domain, 2^62.
pub(crate) const TOP: u64 = 1 << PRECISION;
/// Midpoint of the domain.
pub(crate) const HALF: u64 = 1 << (PRECISION - 1);
/// Quarter of the domain; the renormalization floor.
pub(crate) const QUARTER: u64 = 1 << (PRECISION - 2);
/// Keeps the decode target register inside the domain.
pub(crate) const MASK: u64 = TOP - 1;

/// Encode-side face of a coding session.
pub trait Encoder {
    /// Width of the current coding interval.
    fn range(&self) -> u64;

    /// Narrows the interval to the sub-range `[low/total, high/total)`
    /// of itself.
    ///
    /// `high == total` is the open-ended convention: the region runs to
    /// the exact end of the interval, so no width is lost to integer
    /// truncation. A `low == high` request is a zero-probability event
    /// and fails with [`Error::ZeroMass`](crate::Error::ZeroMass).
    fn store_region(&mut self, low: u64, high: u64, total: u64) -> Result<()>;

    /// Narrows to `[low, high)` expressed directly against the current
    /// range, for models that scale their regions themselves.
    fn store_region_raw(&mut self, low: u64, high: u64) -> Result<()> {
        let total = self.range();
        self.store_region(low, high, total)
    }
}

/// Decode-side face of a coding session.
pub trait Decoder {
    /// Width of the current coding interval.
    fn range(&self) -> u64;

    /// Offset of the decode target within the current interval,
    /// unscaled.
    fn raw_target(&self) -> u64;

    /// The bucket in `[0, total)` the decode target falls into, under
    /// the same scaling [`store_region`](Encoder::store_region) used.
    fn target(&self, total: u64) -> u64;

    /// Consumes the region the model resolved from [`target`], keeping
    /// the interval in lockstep with the encoder.
    ///
    /// [`target`]: Decoder::target
    fn load_region(&mut self, low: u64, high: u64, total: u64) -> Result<()>;

    /// Counterpart of [`store_region_raw`](Encoder::store_region_raw).
    fn load_region_raw(&mut self, low: u64, high: u64) -> Result<()> {
        let total = self.range();
        self.load_region(low, high, total)
    }
}
