//! Packing and unpacking of integer fields at arbitrary bit offsets inside
//! fixed-width unsigned words.
//!
//! `pack` ORs `value << offset` into `word` without masking `value`; the
//! caller guarantees the value fits into its field.  `unpack` shifts right
//! and masks with `(2 << (count - 1)) - 1`.  Both are pure and infallible;
//! the caller guarantees `offset + count` does not exceed the word width.


macro_rules! impl_bitfield {
	($pack:ident, $unpack:ident, $ty:ty) => {
		#[doc = concat!("OR `value << offset` into a `", stringify!($ty), "` word.")]
		#[inline]
		#[must_use]
		pub const fn $pack(word: $ty, value: $ty, offset: u32) -> $ty {
			word | (value << offset)
		}


		#[doc = concat!("Extract a `count`-bit field at `offset` from a `", stringify!($ty), "` word.")]
		#[inline]
		#[must_use]
		pub const fn $unpack(word: $ty, count: u32, offset: u32) -> $ty {
			(word >> offset) & ((2 as $ty).wrapping_shl(count - 1).wrapping_sub(1))
		}
	};
}


impl_bitfield!(pack_u8, unpack_u8, u8);
impl_bitfield!(pack_u16, unpack_u16, u16);
impl_bitfield!(pack_u32, unpack_u32, u32);
impl_bitfield!(pack_u64, unpack_u64, u64);


#[test]
fn test_pack_unpack_identity() {
	for count in 1..=16u32 {
		for offset in 0..=(64 - count) {
			let value = (0xA5A5_A5A5_A5A5_A5A5u64 >> (64 - count)) & ((2u64 << (count - 1)) - 1);
			assert_eq!(unpack_u64(pack_u64(0, value, offset), count, offset), value);
		};
	};

	assert_eq!(pack_u16(0x8000, 0x1F, 10), 0xFC00);
	assert_eq!(unpack_u16(0xFC00, 5, 10), 0x1F);
	assert_eq!(unpack_u8(0x73, 4, 4), 0x7);
	assert_eq!(unpack_u32(0xFFFF_FFFF, 14, 0), 0x3FFF);
}


#[test]
fn test_unpack_full_width() {
	assert_eq!(unpack_u64(u64::MAX, 64, 0), u64::MAX);
	assert_eq!(unpack_u64(u64::MAX, 20, 44), 0xF_FFFF);
}
