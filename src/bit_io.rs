/*!
Bit-level IO over `std::io` streams.

The coder consumes and produces single bits; these ports pack them
MSB-first into bytes. A reader that runs out of input keeps yielding
0 bits (the stream's padding convention) and drops [`informative`],
so decode loops can stop instead of chewing padding forever.

[`informative`]: BitReader::informative
*/
#![warn(missing_docs)]

use core::slice;
use std::io::{self, ErrorKind, Read, Write};

/// A BitReader reads bits from an internal `std::io::Read` stream.
#[derive(Debug)]
pub struct BitReader<R> {
    queue: BitQueue,
    inner: R,
    informative: bool,
}

impl<R: Read> BitReader<R> {
    /// Initializes a BitReader with a stream.
    pub fn new(inner: R) -> Self {
        Self { queue: BitQueue::new(), inner, informative: true }
    }

    /// Reads the next bit, or 0 once the stream is exhausted.
    ///
    /// Genuine I/O errors still propagate; only a clean EOF turns into
    /// the endless zero tail.
    pub fn read_bit(&mut self) -> io::Result<u8> {
        if let Some(bit) = self.queue.pop() {
            return Ok(bit);
        }

        let mut byte: u8 = 0;
        match self.inner.read_exact(slice::from_mut(&mut byte)) {
            Ok(()) => {
                self.queue.fill(byte);
                Ok(self.queue.pop().unwrap())
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                self.informative = false;
                Ok(0)
            }
            Err(err) => Err(err),
        }
    }

    /// True while reads still come from genuine input rather than the
    /// zero tail.
    pub fn informative(&self) -> bool {
        self.informative
    }

    /// Releases the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

/// A BitWriter writes bits to an internal `std::io::Write` stream.
#[derive(Debug)]
pub struct BitWriter<W> {
    queue: BitQueue,
    inner: W,
}

impl<W: Write> BitWriter<W> {
    /// Initializes a BitWriter with a stream.
    pub fn new(inner: W) -> Self {
        Self { queue: BitQueue::new(), inner }
    }

    /// Writes a single bit, flushing a byte downstream every 8 bits.
    pub fn write_bit(&mut self, bit: u8) -> io::Result<()> {
        debug_assert!(bit <= 1);
        self.queue.push(bit);
        match self.queue.try_flush() {
            Some(byte) => self.inner.write_all(&[byte]),
            None => Ok(()),
        }
    }

    /// Zero-pads the final partial byte, flushes the inner stream and
    /// returns it.
    pub fn finish(mut self) -> io::Result<W> {
        while !self.queue.is_empty() {
            self.write_bit(0)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// An 8 element bit queue (with internal store u8).
///
/// Handling overflow: panics in debug and discards elements in release.
#[derive(Debug)]
struct BitQueue {
    /// Byte buffer
    t: u8,
    /// Number of bits being held
    count: u8,
}

impl BitQueue {
    fn new() -> Self {
        Self { t: 0, count: 0 }
    }

    /// Push a bit in the queue. Do not push elements other than 0 and 1!
    fn push(&mut self, bit: u8) {
        debug_assert!(!self.is_full()); // looses bits
        self.t = (self.t << 1) | bit;
        self.count += 1;
    }

    /// Pop a bit from the queue, `None` if empty.
    fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }

        self.count -= 1;
        Some((self.t >> self.count) & 1)
    }

    /// Tries to flush the queue, only succeeds if full.
    fn try_flush(&mut self) -> Option<u8> {
        if !self.is_full() {
            return None;
        }

        self.count = 0;
        Some(self.t)
    }

    /// Fills the bit queue with a byte.
    fn fill(&mut self, byte: u8) {
        debug_assert!(self.is_empty()); // we shouldn't skip bits
        self.count = 8;
        self.t = byte;
    }

    fn is_full(&self) -> bool {
        self.count == 8
    }

    fn is_empty(&self) -> bool {
        self.count == 0
    }
}
