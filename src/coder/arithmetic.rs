use std::io::{Read, Write};

use log::trace;

use super::{Decoder, Encoder, HALF, MASK, PRECISION, QUARTER, TOP};
use crate::bit_io::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// Streaming arithmetic encoder over a bit sink.
///
/// Keeps the interval `[low, low + range)` and narrows it per stored
/// region. While renormalizing, a bit whose value depends on a future
/// narrowing decision is deferred (`bits_waiting`) and resolved
/// retroactively by the next committed bit, the usual bit-plus-follow
/// carry propagation.
pub struct ArithmeticEncoder<W> {
    low: u64,
    range: u64,
    bits_waiting: u64,
    io: BitWriter<W>,
}

impl<W: Write> ArithmeticEncoder<W> {
    /// Starts an encoding session that owns `writer` until
    /// [`finish`](ArithmeticEncoder::finish).
    pub fn new(writer: W) -> Self {
        Self { low: 0, range: TOP - 1, bits_waiting: 0, io: BitWriter::new(writer) }
    }

    /// Emits `bit`, then the deferred opposite bits it resolves.
    fn bit_plus_follow(&mut self, bit: u8) -> Result<()> {
        self.io.write_bit(bit)?;
        while self.bits_waiting > 0 {
            self.io.write_bit(bit ^ 1)?;
            self.bits_waiting -= 1;
        }
        Ok(())
    }

    /// Emits the tail bits that pin the final interval, flushes, and
    /// returns the sink.
    ///
    /// Terminates the stream; an encoder dropped without `finish`
    /// leaves the output truncated and undecodable.
    pub fn finish(mut self) -> Result<W> {
        // Commit halves by the midpoint until the all-zeros
        // continuation lands inside the interval (low == 0 over at
        // least a half-domain cell).
        while self.low != 0 || self.range < HALF {
            assert!(self.range > 0, "empty interval in finish");
            let end = self.low + self.range;
            if self.low + self.range / 2 >= HALF {
                self.bit_plus_follow(1)?;
                let cut = self.low.max(HALF);
                self.low = cut - HALF;
                self.range = end - cut;
            } else {
                self.bit_plus_follow(0)?;
                self.range = end.min(HALF) - self.low;
            }
            self.low <<= 1;
            self.range <<= 1;
        }
        Ok(self.io.finish()?)
    }
}

impl<W: Write> Encoder for ArithmeticEncoder<W> {
    fn range(&self) -> u64 {
        self.range
    }

    fn store_region(&mut self, low: u64, high: u64, total: u64) -> Result<()> {
        if low >= high {
            return Err(Error::ZeroMass { low, high, total });
        }
        debug_assert!(high <= total);
        assert!(total <= self.range, "region total exceeds coder precision");
        trace!("store [{low}, {high})/{total} into range {}", self.range);

        let r = self.range / total;
        self.low += r * low;
        self.range = if high < total { r * (high - low) } else { self.range - r * low };

        // Renormalize: zoom until the interval regains a quarter domain.
        while self.range <= QUARTER {
            if self.low + self.range <= HALF {
                self.bit_plus_follow(0)?;
            } else if self.low >= HALF {
                self.bit_plus_follow(1)?;
                self.low -= HALF;
            } else {
                // Straddles the midpoint: defer until a half commits.
                self.bits_waiting += 1;
                self.low -= QUARTER;
            }
            self.low <<= 1;
            self.range <<= 1;
        }
        debug_assert!(self.low + self.range <= TOP);
        Ok(())
    }
}

/// Streaming arithmetic decoder over a bit source.
///
/// Mirrors the encoder's interval bookkeeping exactly and keeps a
/// target register `D` tracking where inside the interval the coded
/// point sits, `low <= D < low + range`.
pub struct ArithmeticDecoder<R> {
    low: u64,
    range: u64,
    target: u64,
    io: BitReader<R>,
}

impl<R: Read> ArithmeticDecoder<R> {
    /// Starts a decoding session, priming the target register with
    /// [`PRECISION`] bits of input.
    pub fn new(reader: R) -> Result<Self> {
        Self::with_pad(reader, false)
    }

    /// Like [`new`](ArithmeticDecoder::new), but with `pad` set the
    /// leading 1-bit of the target is synthesized instead of read, for
    /// streams stored without it.
    pub fn with_pad(reader: R, pad: bool) -> Result<Self> {
        let mut io = BitReader::new(reader);
        let mut target = u64::from(pad);
        let prime_bits = if pad { PRECISION - 1 } else { PRECISION };
        for _ in 0..prime_bits {
            target = (target << 1) | u64::from(io.read_bit()?);
        }
        Ok(Self { low: 0, range: TOP - 1, target, io })
    }

    /// True while the source still supplies genuine bits; once it goes
    /// false every further read is padding and decoding only produces
    /// deterministic garbage.
    pub fn informative(&self) -> bool {
        self.io.informative()
    }

    /// Ends the session and releases the reader. Decoding leaves no
    /// tail state to flush; this exists for symmetry with the encoder.
    pub fn finish(self) -> R {
        self.io.into_inner()
    }
}

impl<R: Read> Decoder for ArithmeticDecoder<R> {
    fn range(&self) -> u64 {
        self.range
    }

    fn raw_target(&self) -> u64 {
        self.target - self.low
    }

    fn target(&self, total: u64) -> u64 {
        let r = self.range / total;
        debug_assert!(r > 0, "region total exceeds coder precision");
        ((self.target - self.low) / r).min(total - 1)
    }

    fn load_region(&mut self, low: u64, high: u64, total: u64) -> Result<()> {
        if low >= high {
            return Err(Error::ZeroMass { low, high, total });
        }
        debug_assert!(high <= total);
        assert!(total <= self.range, "region total exceeds coder precision");
        trace!("load [{low}, {high})/{total} from range {}", self.range);

        let r = self.range / total;
        self.low += r * low;
        self.range = if high < total { r * (high - low) } else { self.range - r * low };

        // Same zoom steps as the encoder, but each one pulls a fresh
        // bit into the target register instead of emitting.
        while self.range <= QUARTER {
            if self.low + self.range <= HALF {
                // lower half, nothing to relocate
            } else if self.low >= HALF {
                self.low -= HALF;
                self.target -= HALF;
            } else {
                self.low -= QUARTER;
                self.target -= QUARTER;
            }
            self.low <<= 1;
            self.range <<= 1;
            self.target = ((self.target << 1) & MASK) | u64::from(self.io.read_bit()?);
        }
        debug_assert!(self.low <= self.target && self.target - self.low < self.range);
        Ok(())
    }
}
