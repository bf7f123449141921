use std::fmt::{Debug, LowerHex};

/// Native width of a hart's integer register file.
///
/// Micro-ops are monomorphized over `u32` (RV32) and `u64` (RV64); arithmetic is
/// carried out on `u64` and narrowed through [`Word::truncate_from`] on writeback.
pub trait Word: Copy + Default + Eq + Debug + LowerHex + Into<u64> + 'static {
    const BITS: u32;

    fn truncate_from(value: u64) -> Self;

    /// Sign extend a value living in the low `Self::BITS` bits to 64 bits.
    #[inline]
    fn sign_extend(value: u64) -> u64 {
        sign_extend(value, Self::BITS)
    }

    /// Keep only the low `Self::BITS` bits.
    #[inline]
    fn narrow(value: u64) -> u64 {
        Self::truncate_from(value).into()
    }
}

impl Word for u32 {
    const BITS: u32 = 32;

    #[inline]
    fn truncate_from(value: u64) -> Self {
        value as u32
    }
}

impl Word for u64 {
    const BITS: u32 = 64;

    #[inline]
    fn truncate_from(value: u64) -> Self {
        value
    }
}

/// Mask covering bits `lsb..=msb`.
#[inline]
pub const fn make_mask(lsb: u32, msb: u32) -> u64 {
    let width = msb - lsb + 1;
    if width >= 64 {
        u64::MAX
    } else {
        ((1u64 << width) - 1) << lsb
    }
}

#[inline]
pub const fn extract_bits(value: u64, lsb: u32, msb: u32) -> u64 {
    (value & make_mask(lsb, msb)) >> lsb
}

pub fn sign_extend(value: u64, from_bits: u32) -> u64 {
    if from_bits >= 64 {
        return value;
    }
    let shift = 64 - from_bits;
    (((value << shift) as i64) >> shift) as u64
}

/// Little-endian bytes to integer, `bytes.len() <= 8`.
pub fn concat_le_bytes(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

// ========================================
//  gen_name_list ["a1", "a2", "a3", ... ]
// ========================================

/// # Examples
/// ```
/// assert_eq!(gen_name_list!("a"; 0, 5), ["a0", "a1", "a2", "a3", "a4", "a5"])
/// ```
#[macro_export]
macro_rules! gen_name_list {
    ($base:literal; $begin: literal, $end: literal) => {
        seq_macro::seq!(N in $begin..= $end {
            [ #(concat!($base, stringify!(N)),) *]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_mask() {
        assert_eq!(make_mask(0, 0), 0x1);
        assert_eq!(make_mask(11, 12), 0x1800);
        assert_eq!(make_mask(0, 63), u64::MAX);
        assert_eq!(make_mask(62, 63), 0xc000_0000_0000_0000);
    }

    #[test]
    fn test_extract_and_extend() {
        assert_eq!(extract_bits(0xdead_beef, 8, 15), 0xbe);
        assert_eq!(sign_extend(0x800, 12), 0xffff_ffff_ffff_f800);
        assert_eq!(sign_extend(0x7ff, 12), 0x7ff);
        assert_eq!(u32::sign_extend(0x8000_0000), 0xffff_ffff_8000_0000);
        assert_eq!(u32::narrow(0x1_2345_6789), 0x2345_6789);
    }

    #[test]
    fn test_concat_le_bytes() {
        assert_eq!(concat_le_bytes(&[0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
        assert_eq!(concat_le_bytes(&[0xff]), 0xff);
    }

    #[test]
    fn test_gen_name_list() {
        let names = gen_name_list!("f"; 0, 3);
        assert_eq!(names, ["f0", "f1", "f2", "f3"]);
    }
}
