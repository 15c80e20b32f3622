//! Word arithmetic with the instruction set's overflow rules.

use crate::plat::Word;

use super::{EResult, EmuError};

/// Sign-extends the low 16 bits of `imm`.
pub fn sext16(imm: Word) -> Word {
    imm as i16 as Word
}

/// `a + b`, failing when both operands share a sign the sum doesn't.
pub fn add(a: Word, b: Word) -> EResult<Word> {
    match a.overflowing_add(b) {
        (sum, false) => Ok(sum),
        (_, true) => Err(EmuError::ArithmeticOverflow),
    }
}

/// `a - b`, failing when the operands differ in sign and the difference takes `b`'s sign.
pub fn sub(a: Word, b: Word) -> EResult<Word> {
    match a.overflowing_sub(b) {
        (dif, false) => Ok(dif),
        (_, true) => Err(EmuError::ArithmeticOverflow),
    }
}

/// The full 64-bit product of `a` and `b`, split into `(high, low)` words.
pub fn mul_wide(a: Word, b: Word) -> (Word, Word) {
    let product = i64::from(a) * i64::from(b);
    ((product >> 32) as Word, product as Word)
}

/// `(a % b, a / b)` truncating toward zero, or `None` when `b` is zero.
///
/// `Word::MIN / -1` wraps to `(0, Word::MIN)`.
pub fn div_rem(a: Word, b: Word) -> Option<(Word, Word)> {
    (b != 0).then(|| (a.wrapping_rem(b), a.wrapping_div(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sext16() {
        assert_eq!(sext16(0x7fff), 0x7fff);
        assert_eq!(sext16(0x8000), -0x8000);
        assert_eq!(sext16(-100), -100);
        assert_eq!(sext16(0x1_0005), 5);
    }

    #[test]
    fn test_add_overflow_edges() {
        assert_eq!(add(i32::MAX, 1), Err(EmuError::ArithmeticOverflow));
        assert_eq!(add(i32::MIN, -1), Err(EmuError::ArithmeticOverflow));
        assert_eq!(add(i32::MAX, -1), Ok(i32::MAX - 1));
        assert_eq!(add(i32::MIN, i32::MAX), Ok(-1));
    }

    #[test]
    fn test_sub_overflow_edges() {
        assert_eq!(sub(0, i32::MIN), Err(EmuError::ArithmeticOverflow));
        assert_eq!(sub(i32::MIN, 1), Err(EmuError::ArithmeticOverflow));
        assert_eq!(sub(-1, i32::MIN), Ok(i32::MAX));
        assert_eq!(sub(i32::MIN, i32::MIN), Ok(0));
    }

    #[test]
    fn test_mul_wide() {
        assert_eq!(mul_wide(3, 4), (0, 12));
        assert_eq!(mul_wide(-1, 1), (-1, -1));
        assert_eq!(mul_wide(0x1_0000, 0x1_0000), (1, 0));
        assert_eq!(mul_wide(i32::MIN, i32::MIN), (0x4000_0000, 0));
    }

    #[test]
    fn test_div_rem() {
        assert_eq!(div_rem(7, 2), Some((1, 3)));
        assert_eq!(div_rem(-7, 2), Some((-1, -3)));
        assert_eq!(div_rem(7, -2), Some((1, -3)));
        assert_eq!(div_rem(5, 0), None);
        assert_eq!(div_rem(i32::MIN, -1), Some((0, i32::MIN)));
    }
}
