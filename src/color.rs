use crate::bitfield::{pack_u16, unpack_u16};

#[cfg(feature = "fuzz")] use arbitrary::Arbitrary;


/// An 8-bit-per-channel RGBA color.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "fuzz", derive(Arbitrary))]
pub struct Color {
	/// Red.
	pub r: u8,
	/// Green.
	pub g: u8,
	/// Blue.
	pub b: u8,
	/// Alpha, 255 fully opaque.
	pub a: u8,
}


impl Color {
	/// The color CLUT padding is filled with.
	pub const TRANSPARENT_BLACK: Color = Color { r: 0, g: 0, b: 0, a: 0 };


	/// Construct a color from its channels.
	pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
		Self { r, g, b, a }
	}


	/// Decode a 16-bit GS color word: alpha in bit 15, then 5 bits each of
	/// blue, green, red down to bit 0.  Channels are expanded by `* 8`.
	pub fn from_rgba16(word: u16) -> Self {
		let r = (unpack_u16(word, 5, 0) * 8) as u8;
		let g = (unpack_u16(word, 5, 5) * 8) as u8;
		let b = (unpack_u16(word, 5, 10) * 8) as u8;
		let a = if unpack_u16(word, 1, 15) != 0 { 255 } else { 0 };
		Self { r, g, b, a }
	}


	/// Quantize back into the 16-bit word.  Lossy: the low 3 bits of each
	/// color channel are truncated (`/ 8`) and alpha collapses to one bit
	/// (`/ 255`), matching the GS storage exactly.
	pub fn to_rgba16(self) -> u16 {
		let mut word = 0u16;
		word = pack_u16(word, u16::from(self.r) / 8, 0);
		word = pack_u16(word, u16::from(self.g) / 8, 5);
		word = pack_u16(word, u16::from(self.b) / 8, 10);
		word = pack_u16(word, u16::from(self.a) / 255, 15);
		word
	}
}


impl From<image::Rgba<u8>> for Color {
	fn from(rgba: image::Rgba<u8>) -> Self {
		Self { r: rgba.0[0], g: rgba.0[1], b: rgba.0[2], a: rgba.0[3] }
	}
}


impl From<Color> for image::Rgba<u8> {
	fn from(color: Color) -> Self {
		image::Rgba::<u8>([color.r, color.g, color.b, color.a])
	}
}


impl std::fmt::Display for Color {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "[{:02X}{:02X}{:02X}{:02X}]", self.r, self.g, self.b, self.a)
	}
}


/// The color encoding of a pixel or CLUT buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "fuzz", derive(Arbitrary))]
pub enum ColorType {
	/// No color payload (e.g. the CLUT of a true-color picture).
	None,
	/// 16-bit true color, one alpha bit (A1B5G5R5).
	Rgba16,
	/// 24-bit true color, no alpha.
	Rgb24,
	/// 32-bit true color with an 8-bit alpha channel.
	Rgba32,
	/// 4-bit palette index, two pixels per byte.
	Indexed4,
	/// 8-bit palette index.
	Indexed8,
}


impl Default for ColorType {
	fn default() -> Self {
		ColorType::Rgba32
	}
}


impl ColorType {
	/// Bytes per color for the true-color encodings; 0 for indexed and
	/// [`None`][ColorType::None], which carry no per-color byte size.
	pub const fn bytes_per_color(self) -> usize {
		use ColorType::*;

		match self {
			Rgba16 => 2,
			Rgb24 => 3,
			Rgba32 => 4,
			None | Indexed4 | Indexed8 => 0,
		}
	}


	/// Whether the type stores palette indices rather than direct colors.
	pub const fn is_indexed(self) -> bool {
		matches!(self, ColorType::Indexed4 | ColorType::Indexed8)
	}


	/// Only the 32-bit true-color type carries a full alpha channel.
	pub const fn has_alpha(self) -> bool {
		matches!(self, ColorType::Rgba32)
	}


	/// The fixed CLUT entry count written for an indexed image; 0 for
	/// true-color types.
	pub const fn clut_color_count(self, compound: bool) -> usize {
		use ColorType::*;

		match self {
			Indexed8 => 256,
			Indexed4 if compound => 32,
			Indexed4 => 16,
			_ => 0,
		}
	}
}


#[test]
fn test_rgba16_codec() {
	// Channels with zero low bits and 1-bit alpha survive the round trip.
	let c = Color::new(0x68, 0x90, 0xF8, 255);
	assert_eq!(Color::from_rgba16(c.to_rgba16()), c);

	let c = Color::new(0, 0, 0, 0);
	assert_eq!(Color::from_rgba16(c.to_rgba16()), c);

	// Arbitrary channels lose exactly the low 3 bits; alpha collapses to 0.
	let c = Color::new(0x6B, 0x97, 0xFF, 0x80);
	let back = Color::from_rgba16(c.to_rgba16());
	assert_eq!(back, Color::new(0x68, 0x90, 0xF8, 0));

	// Bit layout: alpha bit 15, blue 10..15, green 5..10, red 0..5.
	assert_eq!(Color::new(8, 16, 24, 255).to_rgba16(), 0x8C41);
	assert_eq!(Color::from_rgba16(0x8C41), Color::new(8, 16, 24, 255));
}


#[test]
fn test_clut_color_count() {
	assert_eq!(ColorType::Indexed8.clut_color_count(true), 256);
	assert_eq!(ColorType::Indexed8.clut_color_count(false), 256);
	assert_eq!(ColorType::Indexed4.clut_color_count(true), 32);
	assert_eq!(ColorType::Indexed4.clut_color_count(false), 16);
	assert_eq!(ColorType::Rgba32.clut_color_count(false), 0);
}
