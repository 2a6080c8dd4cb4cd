//! The legacy PS1 TIM variant.  Read-only: pictures decode into the common
//! [`Picture`] model, but this variant is never written back.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::{Color, ColorType, Tim2Result, ReadExt};
use crate::gstex::PixelStorageMode;
use crate::picture::Picture;
use crate::raster::{byte_len, decode_pixels};
use crate::macros;
use crate::Tim2Error::*;


/// Legacy TIM magic word.
pub const MAGIC: u32 = 0x10;

/// Bit 3 of the flags word: a CLUT block precedes the image block.
const FLAG_HAS_CLUT: u32 = 1 << 3;


pub(crate) fn detect(data: &[u8]) -> bool {
	data.len() >= 8 && data[0..4] == MAGIC.to_le_bytes()
}


/// `[size:u32][x:u16][y:u16][width:u16][height:u16]`, framing both the CLUT
/// and the image block.  Width counts 16-bit VRAM units, not pixels.
fn read_block_header<R: Read>(input: &mut R) -> Tim2Result<(u16, u16)> {
	let _size = input.read_u32::<LittleEndian>()?;
	let _x = input.read_u16::<LittleEndian>()?;
	let _y = input.read_u16::<LittleEndian>()?;
	let width_units = input.read_u16::<LittleEndian>()?;
	let height = input.read_u16::<LittleEndian>()?;
	Ok((width_units, height))
}


/// Parse a legacy TIM stream into a [`Picture`].
///
/// # Errors
/// - [`UnknownMagic`]: the stream does not start with the TIM magic.
/// - [`UnsupportedTimPixelMode`]: mixed-mode (pmode 4) or reserved pixel
///   modes.
/// - [`PaletteIndexOutOfRange`]: indexed data referencing past the CLUT.
/// - [`UnexpectedEof`], [`UnexpectedIoError`]: underlying stream errors.
pub fn read_from<R: Read>(input: &mut R) -> Tim2Result<Picture> {
	let magic = input.read_u32::<LittleEndian>()?;
	if magic != MAGIC {
		return Err(UnknownMagic(magic));
	};

	let flags = input.read_u32::<LittleEndian>()?;

	let color_type = match flags & 0x07 {
		0 => ColorType::Indexed4,
		1 => ColorType::Indexed8,
		2 => ColorType::Rgba16,
		3 => ColorType::Rgb24,
		mode => return Err(UnsupportedTimPixelMode(mode as u8)),
	};

	let mut palette: Vec<Color> = vec![];

	if flags & FLAG_HAS_CLUT != 0 {
		let (colors_per_clut, clut_count) = read_block_header(input)?;
		let color_count = usize::from(colors_per_clut) * usize::from(clut_count);

		for _ in 0..color_count {
			palette.push(Color::from_rgba16(input.read_u16::<LittleEndian>()?));
		};
	};

	let (width_units, height) = read_block_header(input)?;

	// The stored width is in 16-bit VRAM units; the pixel width depends on
	// the bit depth.
	let width = match color_type {
		ColorType::Indexed4 => u32::from(width_units) * 4,
		ColorType::Indexed8 => u32::from(width_units) * 2,
		ColorType::Rgba16 => u32::from(width_units),
		ColorType::Rgb24 => u32::from(width_units) * 2 / 3,
		_ => unreachable!(),
	};
	let height = u32::from(height);

	macros::log!(trace, "tim::read_from: {}x{} {:?}, {} CLUT colors", width, height, color_type, palette.len());

	let count = width as usize * height as usize;
	let data = input.read_exact_buffered(byte_len(color_type, count))?;
	let pixels = decode_pixels(&data, color_type, count, &palette)?;

	let mut picture = Picture {
		width,
		height,
		image_color_type: color_type,
		clut_color_type: if color_type.is_indexed() { ColorType::Rgba16 } else { ColorType::None },
		pixels,
		palette,
		..Picture::default()
	};

	picture.gstex.pixel_storage_mode = PixelStorageMode::for_color_type(color_type);

	if width.count_ones() == 1 && height.count_ones() == 1 {
		picture.gstex.width_log2 = width.trailing_zeros() as u8;
		picture.gstex.height_log2 = height.trailing_zeros() as u8;
	};

	Ok(picture)
}


#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use byteorder::WriteBytesExt;

	use super::*;


	fn synthetic_tim_8bpp() -> Vec<u8> {
		let mut bytes: Vec<u8> = vec![];
		bytes.write_u32::<LittleEndian>(MAGIC).unwrap();
		bytes.write_u32::<LittleEndian>(1 | FLAG_HAS_CLUT).unwrap();

		// CLUT block: 256 colors, one CLUT row.
		bytes.write_u32::<LittleEndian>(12 + 256 * 2).unwrap();
		bytes.write_u16::<LittleEndian>(0).unwrap();
		bytes.write_u16::<LittleEndian>(480).unwrap();
		bytes.write_u16::<LittleEndian>(256).unwrap();
		bytes.write_u16::<LittleEndian>(1).unwrap();
		for i in 0..256u16 {
			bytes.write_u16::<LittleEndian>(Color::new((i % 32 * 8) as u8, 0, 0, 255).to_rgba16()).unwrap();
		};

		// Image block: 8 VRAM units = 16 pixels wide at 8bpp, 4 rows.
		bytes.write_u32::<LittleEndian>(12 + 8 * 2 * 4).unwrap();
		bytes.write_u16::<LittleEndian>(0).unwrap();
		bytes.write_u16::<LittleEndian>(0).unwrap();
		bytes.write_u16::<LittleEndian>(8).unwrap();
		bytes.write_u16::<LittleEndian>(4).unwrap();
		bytes.extend((0..64).map(|i| i as u8));

		bytes
	}


	#[test]
	fn test_read_indexed8() {
		let bytes = synthetic_tim_8bpp();
		assert!(detect(&bytes));

		let picture = read_from(&mut Cursor::new(&bytes)).unwrap();
		assert_eq!(picture.width, 16);
		assert_eq!(picture.height, 4);
		assert_eq!(picture.image_color_type, ColorType::Indexed8);
		assert_eq!(picture.clut_color_type, ColorType::Rgba16);
		assert_eq!(picture.palette.len(), 256);
		assert_eq!(picture.pixels.len(), 64);
		assert_eq!(picture.pixels[10].index, 10);
		assert_eq!(picture.gstex.width_log2, 4);
	}


	#[test]
	fn test_read_true_color_16() {
		let mut bytes: Vec<u8> = vec![];
		bytes.write_u32::<LittleEndian>(MAGIC).unwrap();
		bytes.write_u32::<LittleEndian>(2).unwrap();
		bytes.write_u32::<LittleEndian>(12 + 4 * 2 * 2).unwrap();
		for _ in 0..2 {
			bytes.write_u16::<LittleEndian>(0).unwrap();
		};
		bytes.write_u16::<LittleEndian>(4).unwrap();
		bytes.write_u16::<LittleEndian>(2).unwrap();
		for i in 0..8u16 {
			bytes.write_u16::<LittleEndian>(Color::new((i * 8) as u8, 0, 248, 255).to_rgba16()).unwrap();
		};

		let picture = read_from(&mut Cursor::new(&bytes)).unwrap();
		assert_eq!(picture.width, 4);
		assert_eq!(picture.height, 2);
		assert_eq!(picture.image_color_type, ColorType::Rgba16);
		assert!(picture.palette.is_empty());
		assert_eq!(picture.pixels[3].color, Color::new(24, 0, 248, 255));
	}


	#[test]
	fn test_rejects_bad_magic() {
		let bytes = [0x11u8, 0, 0, 0, 0, 0, 0, 0];
		assert!(!detect(&bytes));
		assert!(matches!(read_from(&mut Cursor::new(&bytes)), Err(UnknownMagic(0x11))));
	}


	#[test]
	fn test_rejects_mixed_mode() {
		let mut bytes: Vec<u8> = vec![];
		bytes.write_u32::<LittleEndian>(MAGIC).unwrap();
		bytes.write_u32::<LittleEndian>(4).unwrap();
		assert!(matches!(read_from(&mut Cursor::new(&bytes)), Err(UnsupportedTimPixelMode(4))));
	}
}
