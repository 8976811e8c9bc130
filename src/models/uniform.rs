//! Uniform base distribution over raw bytes.

use super::{ByteSet, Codable, ExclusionCodable};
use crate::coder::{Decoder, Encoder};
use crate::error::{Error, Result};

/// Flat distribution over all 256 byte values, the usual base case a
/// context model escapes into. Exclusions just shrink the total and
/// shift symbol indices down by their rank.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformBytes;

impl UniformBytes {
    /// Creates the distribution.
    pub fn new() -> Self {
        Self
    }
}

/// The `n`-th byte (in order) not present in `omitted`.
fn nth_allowed(omitted: &ByteSet, mut n: u32) -> u8 {
    for sym in 0..=255u8 {
        if omitted.contains(sym) {
            continue;
        }
        if n == 0 {
            return sym;
        }
        n -= 1;
    }
    unreachable!("index past the allowed symbols")
}

impl Codable for UniformBytes {
    type Symbol = u8;

    fn encode(&mut self, sym: u8, enc: &mut impl Encoder) -> Result<()> {
        self.encode_excluding(sym, &ByteSet::new(), enc)
    }

    fn decode(&mut self, dec: &mut impl Decoder) -> Result<u8> {
        self.decode_excluding(&ByteSet::new(), dec)
    }
}

impl ExclusionCodable for UniformBytes {
    fn encode_excluding(
        &mut self,
        sym: u8,
        omitted: &ByteSet,
        enc: &mut impl Encoder,
    ) -> Result<()> {
        if omitted.contains(sym) {
            return Err(Error::UnknownSymbol(sym));
        }
        let total = u64::from(256 - omitted.len());
        let index = u64::from(sym) - u64::from(omitted.rank(sym));
        enc.store_region(index, index + 1, total)
    }

    fn decode_excluding(&mut self, omitted: &ByteSet, dec: &mut impl Decoder) -> Result<u8> {
        let total = u64::from(256 - omitted.len());
        debug_assert!(total > 0);
        let index = dec.target(total);
        let sym = nth_allowed(omitted, index as u32);
        dec.load_region(index, index + 1, total)?;
        Ok(sym)
    }

    fn sample_excluding(&self, omitted: &ByteSet, draw: &mut impl FnMut(u64) -> u64) -> u8 {
        let total = u64::from(256 - omitted.len());
        nth_allowed(omitted, draw(total) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::{ArithmeticDecoder, ArithmeticEncoder};

    #[test]
    fn roundtrips_all_bytes() {
        let mut model = UniformBytes::new();
        let mut enc = ArithmeticEncoder::new(Vec::new());
        for sym in 0..=255u8 {
            model.encode(sym, &mut enc).unwrap();
        }
        let bytes = enc.finish().unwrap();

        let mut dec = ArithmeticDecoder::new(&bytes[..]).unwrap();
        for sym in 0..=255u8 {
            assert_eq!(model.decode(&mut dec).unwrap(), sym);
        }
    }

    #[test]
    fn exclusions_shift_indices() {
        let mut omitted = ByteSet::new();
        omitted.insert(b'a');
        omitted.insert(b'c');

        let mut model = UniformBytes::new();
        let mut enc = ArithmeticEncoder::new(Vec::new());
        for sym in [b'b', b'd', 0u8, 255u8] {
            model.encode_excluding(sym, &omitted, &mut enc).unwrap();
        }
        let bytes = enc.finish().unwrap();

        let mut dec = ArithmeticDecoder::new(&bytes[..]).unwrap();
        for sym in [b'b', b'd', 0u8, 255u8] {
            assert_eq!(model.decode_excluding(&omitted, &mut dec).unwrap(), sym);
        }
    }

    #[test]
    fn excluded_symbol_is_unknown() {
        let mut omitted = ByteSet::new();
        omitted.insert(42);

        let mut model = UniformBytes::new();
        let mut enc = ArithmeticEncoder::new(Vec::new());
        let err = model.encode_excluding(42, &omitted, &mut enc).unwrap_err();
        assert!(matches!(err, Error::UnknownSymbol(42)));
    }

    #[test]
    fn sampling_skips_exclusions() {
        let mut omitted = ByteSet::new();
        omitted.insert(0);
        omitted.insert(1);

        let model = UniformBytes::new();
        let mut first = |_t: u64| 0;
        assert_eq!(model.sample_excluding(&omitted, &mut first), 2);
        let mut last = |t: u64| t - 1;
        assert_eq!(model.sample_excluding(&omitted, &mut last), 255);
    }
}
