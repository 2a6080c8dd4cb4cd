//! Serialization of flat pixel and CLUT buffers, and the CSM1 palette
//! compounding transform.

use byteorder::{LittleEndian, ByteOrder};
use static_assertions::const_assert;

use crate::{Color, ColorType, Tim2Result, ExtendExt};
use crate::gstex::ClutStorageMode;
use crate::Tim2Error::*;

#[cfg(feature = "fuzz")] use arbitrary::Arbitrary;


/// A single texel: the resolved color plus, for indexed color types, the raw
/// palette index.  `index` is −1 when the pixel is not palette-backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "fuzz", derive(Arbitrary))]
pub struct Pixel {
	/// The resolved RGBA color.
	pub color: Color,
	/// Palette index for indexed color types; −1 otherwise.
	pub index: i32,
}


impl Pixel {
	/// A pixel that is not palette-backed.
	pub const fn from_color(color: Color) -> Self {
		Self { color, index: -1 }
	}


	/// Resolve `index` into `palette`.
	///
	/// # Errors
	/// - [`PaletteIndexOutOfRange`]: `index` is not a valid offset into `palette`.
	pub fn from_index(index: u8, palette: &[Color]) -> Tim2Result<Self> {
		let color = *palette.get(index as usize).ok_or(PaletteIndexOutOfRange(u32::from(index)))?;
		Ok(Self { color, index: i32::from(index) })
	}
}


impl Default for Pixel {
	fn default() -> Self {
		Pixel::from_color(Color::TRANSPARENT_BLACK)
	}
}


/// Serialized byte length of `count` pixels of the given color type.
pub(crate) const fn byte_len(color_type: ColorType, count: usize) -> usize {
	use ColorType::*;

	const_assert!(std::mem::size_of::<usize>() >= 4);

	match color_type {
		Indexed4 => (count + 1) / 2,
		Indexed8 => count,
		Rgba16 => count * 2,
		Rgb24 => count * 3,
		Rgba32 => count * 4,
		None => 0,
	}
}


/// Deserialize `count` pixels from `data`.  Indexed types resolve their
/// indices through `palette`; true-color types ignore it.
///
/// # Errors
/// - [`UnexpectedEof`]: `data` is shorter than `count` pixels require.
/// - [`PaletteIndexOutOfRange`]: an index does not resolve into `palette`.
/// - [`InvalidClutColorType`]: `color_type` is [`ColorType::None`].
pub fn decode_pixels(data: &[u8], color_type: ColorType, count: usize, palette: &[Color]) -> Tim2Result<Vec<Pixel>> {
	use ColorType::*;

	if color_type == None {
		return Err(InvalidClutColorType(color_type));
	};

	let data = data.get(..byte_len(color_type, count)).ok_or(UnexpectedEof)?;
	let mut pixels: Vec<Pixel> = Vec::with_capacity(count);

	match color_type {
		Indexed4 => {
			// First pixel of each pair sits in the low nibble.
			for i in 0..count {
				let byte = data[i / 2];
				let index = if i % 2 == 0 { byte & 0x0F } else { byte >> 4 };
				pixels.push(Pixel::from_index(index, palette)?);
			};
		},

		Indexed8 => {
			for &index in data {
				pixels.push(Pixel::from_index(index, palette)?);
			};
		},

		Rgba16 => {
			for chunk in data.chunks_exact(2) {
				let color = Color::from_rgba16(LittleEndian::read_u16(chunk));
				pixels.push(Pixel::from_color(color));
			};
		},

		Rgb24 => {
			for chunk in data.chunks_exact(3) {
				pixels.push(Pixel::from_color(Color::new(chunk[0], chunk[1], chunk[2], 255)));
			};
		},

		Rgba32 => {
			for chunk in data.chunks_exact(4) {
				pixels.push(Pixel::from_color(Color::new(chunk[0], chunk[1], chunk[2], chunk[3])));
			};
		},

		None => unreachable!(),
	};

	Ok(pixels)
}


/// Serialize a flat pixel buffer.  Indexed types write the raw palette
/// index of each pixel; true-color types write the resolved color.
///
/// # Errors
/// - [`MissingPaletteIndex`]: an indexed buffer contains a pixel without a
///   palette index (true-color data routed through the indexed path).
/// - [`PaletteIndexOutOfRange`]: a pixel index does not fit the bit depth.
/// - [`InvalidClutColorType`]: `color_type` is [`ColorType::None`].
pub fn encode_pixels(pixels: &[Pixel], color_type: ColorType) -> Tim2Result<Vec<u8>> {
	use ColorType::*;

	let mut bytes: Vec<u8> = Vec::with_capacity(byte_len(color_type, pixels.len()));

	match color_type {
		Indexed4 => {
			for pair in pixels.chunks(2) {
				let lo = index_within(&pair[0], 0x0F)?;
				// An odd trailing pixel leaves the high nibble zero.
				let hi = match pair.get(1) {
					Some(p) => index_within(p, 0x0F)?,
					Option::None => 0,
				};
				bytes.push((hi << 4) | lo);
			};
		},

		Indexed8 => {
			for pixel in pixels {
				bytes.push(index_within(pixel, 0xFF)?);
			};
		},

		Rgba16 => {
			for pixel in pixels {
				bytes.extend_with_uint::<LittleEndian, _, 2>(pixel.color.to_rgba16());
			};
		},

		Rgb24 => {
			for pixel in pixels {
				bytes.extend([pixel.color.r, pixel.color.g, pixel.color.b]);
			};
		},

		Rgba32 => {
			for pixel in pixels {
				bytes.extend([pixel.color.r, pixel.color.g, pixel.color.b, pixel.color.a]);
			};
		},

		None => return Err(InvalidClutColorType(color_type)),
	};

	Ok(bytes)
}


fn index_within(pixel: &Pixel, max: i32) -> Tim2Result<u8> {
	if pixel.index < 0 {
		return Err(MissingPaletteIndex);
	};

	if pixel.index > max {
		return Err(PaletteIndexOutOfRange(pixel.index as u32));
	};

	Ok(pixel.index as u8)
}


/// Deserialize a CLUT payload.  Color count is `data.len()` divided by the
/// byte size of one color; a trailing remainder is ignored.
///
/// # Errors
/// - [`InvalidClutColorType`]: `clut_type` is indexed or [`ColorType::None`].
pub fn decode_clut(data: &[u8], clut_type: ColorType) -> Tim2Result<Vec<Color>> {
	let bpc = clut_type.bytes_per_color();

	if bpc == 0 {
		return Err(InvalidClutColorType(clut_type));
	};

	let count = data.len() / bpc;
	let pixels = decode_pixels(data, clut_type, count, &[])?;
	Ok(pixels.into_iter().map(|p| p.color).collect())
}


/// Serialize a CLUT payload.
///
/// # Errors
/// - [`InvalidClutColorType`]: `clut_type` is indexed or [`ColorType::None`].
pub fn encode_clut(colors: &[Color], clut_type: ColorType) -> Tim2Result<Vec<u8>> {
	if clut_type.bytes_per_color() == 0 {
		return Err(InvalidClutColorType(clut_type));
	};

	let pixels: Vec<Pixel> = colors.iter().map(|c| Pixel::from_color(*c)).collect();
	encode_pixels(&pixels, clut_type)
}


/// Whether a picture's CLUT is physically stored in compounded order.
///
/// CSM1 palettes are compounded except for the 16-color case: a 4-bit image
/// whose compound flag is off stores its (single 16-entry) palette
/// sequentially.
pub fn clut_is_compounded(image_type: ColorType, storage_mode: ClutStorageMode, compound: bool) -> bool {
	matches!(storage_mode, ClutStorageMode::Csm1)
		&& !(matches!(image_type, ColorType::Indexed4) && !compound)
}


/// Reorder a palette between sequential and compounded CSM1 layouts: within
/// every non-overlapping run of 32 entries, the second and third blocks of 8
/// swap places.  The transform is its own inverse.
pub fn compound_clut(palette: &mut [Color]) {
	for run in 0..palette.len() / 32 {
		let base = run * 32;
		for i in 0..8 {
			palette.swap(base + 8 + i, base + 16 + i);
		};
	};
}


#[test]
fn test_indexed4_packing() {
	let palette: Vec<Color> = (0..16).map(|i| Color::new(i * 16, 0, 0, 255)).collect();

	let pixels = vec![
		Pixel::from_index(3, &palette).unwrap(),
		Pixel::from_index(7, &palette).unwrap(),
	];

	let bytes = encode_pixels(&pixels, ColorType::Indexed4).unwrap();
	assert_eq!(bytes, vec![0x73]);

	let back = decode_pixels(&bytes, ColorType::Indexed4, 2, &palette).unwrap();
	assert_eq!(back[0].index, 3);
	assert_eq!(back[1].index, 7);

	// Odd pixel count: the last pixel takes the low nibble of its own byte.
	let pixels = vec![
		Pixel::from_index(1, &palette).unwrap(),
		Pixel::from_index(2, &palette).unwrap(),
		Pixel::from_index(5, &palette).unwrap(),
	];
	let bytes = encode_pixels(&pixels, ColorType::Indexed4).unwrap();
	assert_eq!(bytes, vec![0x21, 0x05]);
	let back = decode_pixels(&bytes, ColorType::Indexed4, 3, &palette).unwrap();
	assert_eq!(back.iter().map(|p| p.index).collect::<Vec<i32>>(), vec![1, 2, 5]);
}


#[test]
fn test_true_color_through_indexed_path_fails() {
	let pixels = vec![Pixel::from_color(Color::new(1, 2, 3, 4))];
	assert!(matches!(encode_pixels(&pixels, ColorType::Indexed8), Err(MissingPaletteIndex)));
}


#[test]
fn test_compound_is_involution() {
	for runs in 1..=8usize {
		let original: Vec<Color> = (0..32 * runs).map(|i| Color::new((i % 256) as u8, (i / 256) as u8, 0, 255)).collect();

		let mut palette = original.clone();
		compound_clut(&mut palette);
		assert_ne!(palette, original);

		// Blocks 0..8 and 24..32 of each run stay put.
		assert_eq!(palette[0..8], original[0..8]);
		assert_eq!(palette[24..32], original[24..32]);
		assert_eq!(palette[8..16], original[16..24]);
		assert_eq!(palette[16..24], original[8..16]);

		compound_clut(&mut palette);
		assert_eq!(palette, original);
	};

	// A 16-entry palette has no full 32-run and stays untouched.
	let original: Vec<Color> = (0..16).map(|i| Color::new(i as u8, 0, 0, 255)).collect();
	let mut palette = original.clone();
	compound_clut(&mut palette);
	assert_eq!(palette, original);

	// 48 entries: one full run swaps, the trailing 16 stay put.
	let original: Vec<Color> = (0..48).map(|i| Color::new(i as u8, 0, 0, 255)).collect();
	let mut palette = original.clone();
	compound_clut(&mut palette);
	assert_eq!(palette[8..16], original[16..24]);
	assert_eq!(palette[32..], original[32..]);
}


#[test]
fn test_compound_gate() {
	use ClutStorageMode::*;

	assert!(clut_is_compounded(ColorType::Indexed8, Csm1, true));
	assert!(clut_is_compounded(ColorType::Indexed4, Csm1, true));
	assert!(!clut_is_compounded(ColorType::Indexed4, Csm1, false));
	assert!(!clut_is_compounded(ColorType::Indexed8, Csm2, true));
}


#[test]
fn test_clut_codec() {
	let colors: Vec<Color> = (0..4).map(|i| Color::new(i * 8, 0, 248 - i * 8, 255)).collect();

	let bytes = encode_clut(&colors, ColorType::Rgba32).unwrap();
	assert_eq!(bytes.len(), 16);
	assert_eq!(decode_clut(&bytes, ColorType::Rgba32).unwrap(), colors);

	let bytes = encode_clut(&colors, ColorType::Rgba16).unwrap();
	assert_eq!(bytes.len(), 8);
	assert_eq!(decode_clut(&bytes, ColorType::Rgba16).unwrap(), colors);

	assert!(matches!(decode_clut(&[0u8; 4], ColorType::Indexed8), Err(InvalidClutColorType(_))));
}
