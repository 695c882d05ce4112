//! 128-bit decimal value as stored by the legacy tooling
//!
//! The value is a 96-bit unsigned mantissa, a power-of-ten scale (0-28)
//! and a sign bit, laid out as four 32-bit words: `lo`, `mid`, `hi`, `flags`.

use serde::{Deserialize, Serialize};

const SCALE_SHIFT: u32 = 16;
const SCALE_MASK: u32 = 0x00FF_0000;
const SIGN_MASK: u32 = 0x8000_0000;

/// Largest scale a valid decimal may carry.
pub const MAX_SCALE: u8 = 28;

/// A 128-bit decimal number in its raw four-word form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Decimal128 {
    pub lo: u32,
    pub mid: u32,
    pub hi: u32,
    pub flags: u32,
}

impl Decimal128 {
    /// Build from a mantissa, scale and sign.
    ///
    /// Bits of `mantissa` above 96 are discarded and `scale` is clamped to
    /// [`MAX_SCALE`].
    #[must_use]
    pub fn new(mantissa: u128, scale: u8, negative: bool) -> Self {
        let scale = u32::from(scale.min(MAX_SCALE));
        let mut flags = scale << SCALE_SHIFT;
        if negative {
            flags |= SIGN_MASK;
        }
        Self {
            lo: mantissa as u32,
            mid: (mantissa >> 32) as u32,
            hi: (mantissa >> 64) as u32,
            flags,
        }
    }

    /// Rebuild from the four stored words.
    #[must_use]
    pub fn from_words(lo: u32, mid: u32, hi: u32, flags: u32) -> Self {
        Self { lo, mid, hi, flags }
    }

    /// The four stored words in stream order.
    #[must_use]
    pub fn to_words(self) -> [u32; 4] {
        [self.lo, self.mid, self.hi, self.flags]
    }

    /// The 96-bit unsigned mantissa.
    #[must_use]
    pub fn mantissa(self) -> u128 {
        u128::from(self.lo) | (u128::from(self.mid) << 32) | (u128::from(self.hi) << 64)
    }

    #[must_use]
    pub fn scale(self) -> u8 {
        ((self.flags & SCALE_MASK) >> SCALE_SHIFT) as u8
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.flags & SIGN_MASK != 0
    }

    /// Lossy conversion for display and comparisons.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(self) -> f64 {
        let magnitude = self.mantissa() as f64 / 10f64.powi(i32::from(self.scale()));
        if self.is_negative() { -magnitude } else { magnitude }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parts() {
        let value = Decimal128::new(12345, 2, true);
        assert_eq!(value.mantissa(), 12345);
        assert_eq!(value.scale(), 2);
        assert!(value.is_negative());
        assert!((value.to_f64() + 123.45).abs() < 1e-9);
    }

    #[test]
    fn test_decimal_wide_mantissa() {
        let mantissa = (1u128 << 95) + 7;
        let value = Decimal128::new(mantissa, 0, false);
        assert_eq!(value.mantissa(), mantissa);
        assert_eq!(value.to_words()[3], 0);
    }

    #[test]
    fn test_decimal_scale_clamped() {
        assert_eq!(Decimal128::new(1, 40, false).scale(), MAX_SCALE);
    }
}
