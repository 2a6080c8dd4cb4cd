//! The per-picture binary record: sizes, register pair, aligned image and
//! CLUT payloads, and the size back-patching performed on write.

use std::io::{Read, Seek, SeekFrom};

use bstr::BString;
use byteorder::{LittleEndian, ReadBytesExt};
use static_assertions::const_assert;
use tap::prelude::*;

use crate::{Alignment, Color, ColorType, Tim2Result, ReadExt};
use crate::gstex::{ClutPixelStorageMode, GsTex, GsTexAux, PixelStorageMode};
use crate::raster::{Pixel, byte_len, clut_is_compounded, compound_clut, decode_clut, decode_pixels, encode_clut, encode_pixels};
use crate::writer::PatchWriter;
use crate::macros;
use crate::Tim2Error::*;


/// LV0 plus at most six reduced levels.
pub const MAX_MIP_LEVELS: u8 = 7;

/// Fixed base header: totalSize, imageSize, mip count, padding, GsTex pair.
const BASE_HEADER_SIZE: u32 = 32;


/// A decoded texture unit.
///
/// `pixels` holds `width * height` entries; `mipmaps` holds the LV1..LV6
/// buffers, each level half the linear dimensions of the previous.
/// `user_data` and `comment` travel with the picture in memory only; the
/// binary record does not carry them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Picture {
	/// The register pair describing addressing and storage modes.
	pub gstex: GsTex,
	/// Auxiliary register block, meaningful only for mipmapped pictures.
	pub aux: GsTexAux,
	/// Width in pixels, a power of two.
	pub width: u32,
	/// Height in pixels, a power of two.
	pub height: u32,
	/// Pixel buffer encoding.
	pub image_color_type: ColorType,
	/// CLUT entry encoding; [`ColorType::None`] for true-color pictures.
	pub clut_color_type: ColorType,
	/// Whether a 4-bit picture stores a 32-entry compounded CLUT.
	pub clut_compound: bool,
	/// LV0 pixels, row-major, `width * height` entries.
	pub pixels: Vec<Pixel>,
	/// LV1.. pixel buffers.
	pub mipmaps: Vec<Vec<Pixel>>,
	/// CLUT colors in sequential (un-compounded) order.
	pub palette: Vec<Color>,
	/// Free-form application bytes; not serialized.
	pub user_data: BString,
	/// Free-form comment; not serialized.
	pub comment: BString,
}


impl Picture {
	/// Whether the picture stores palette indices.
	pub fn is_indexed(&self) -> bool {
		self.image_color_type.is_indexed()
	}


	/// Alpha semantics follow the CLUT color type for indexed pictures and
	/// the image color type otherwise.
	pub fn has_alpha(&self) -> bool {
		if self.is_indexed() {
			self.clut_color_type.has_alpha()
		}
		else {
			self.image_color_type.has_alpha()
		}
	}


	/// Parse one picture record at the current stream position.
	///
	/// # Errors
	/// - [`InvalidMipmapCount`]: declared mip level count outside 1..=7.
	/// - [`NonzeroPadding`]: reserved header padding is not zero.
	/// - [`SizeMismatch`]: the declared total/image sizes leave a negative
	///   CLUT size.
	/// - [`InvalidRegisterData`] and the storage-mode errors of
	///   [`GsTex::from_words`].
	/// - [`UnexpectedEof`], [`UnexpectedIoError`]: underlying stream errors.
	pub fn read_from<R: Read + Seek>(input: &mut R, alignment: Alignment) -> Tim2Result<Self> {
		let total_size = input.read_u32::<LittleEndian>()?;
		let image_size = input.read_u32::<LittleEndian>()?;

		let mip_count = input.read_u8()?;
		if !(1..=MAX_MIP_LEVELS).contains(&mip_count) {
			return Err(InvalidMipmapCount(mip_count));
		};

		let mut pad = [0u8; 7];
		input.read_exact(&mut pad)?;
		if pad.iter().any(|b| *b != 0) {
			return Err(NonzeroPadding);
		};

		let gstex = GsTex::read_from(input)?;

		let aux = if mip_count > 1 {
			GsTexAux::read_from(input)?
		}
		else {
			GsTexAux::default()
		};

		let header_span = header_span(mip_count);
		let clut_size = total_size
			.checked_sub(image_size)
			.and_then(|v| v.checked_sub(header_span))
			.ok_or(SizeMismatch(total_size, image_size))?;

		let image_color_type = gstex.pixel_storage_mode.color_type();
		let width = 1u32 << gstex.width_log2;
		let height = 1u32 << gstex.height_log2;

		macros::log!(
			trace,
			"Picture::read_from: {}x{} {:?}, imageSize={}, clutSize={}, mipCount={}",
			width, height, image_color_type, image_size, clut_size, mip_count
		);

		skip_to_alignment(input, alignment)?;
		let image_bytes = input.read_exact_buffered(image_size as usize)?;

		// The CLUT trails the image payload; it has to be decoded first so
		// that indexed pixels can resolve their colors.
		let clut_color_type = if image_color_type.is_indexed() {
			gstex.clut_pixel_storage_mode.color_type()
		}
		else {
			ColorType::None
		};

		let mut palette: Vec<Color> = vec![];

		if clut_size > 0 {
			let bytes_per_color = clut_color_type.bytes_per_color();
			let color_count = if bytes_per_color == 0 { 0 } else { clut_size as usize / bytes_per_color };

			if color_count > 0 {
				skip_to_alignment(input, alignment)?;
				let clut_bytes = input.read_exact_buffered(clut_size as usize)?;
				palette = decode_clut(&clut_bytes, clut_color_type)?;
			}
			else {
				input.seek(SeekFrom::Current(i64::from(clut_size)))?;
			};
		};

		let clut_compound = match image_color_type {
			ColorType::Indexed4 => palette.len() == 32,
			ColorType::Indexed8 => true,
			_ => false,
		};

		if clut_is_compounded(image_color_type, gstex.clut_storage_mode, clut_compound) {
			compound_clut(&mut palette);
		};

		const_assert!(std::mem::size_of::<usize>() >= 4);

		let mut offset = 0usize;
		let mut levels: Vec<Vec<Pixel>> = Vec::with_capacity(mip_count as usize);

		for level in 0..u32::from(mip_count) {
			let count = (width >> level).max(1) as usize * (height >> level).max(1) as usize;
			let len = byte_len(image_color_type, count);
			let slice = image_bytes.get(offset..offset + len).ok_or(UnexpectedEof)?;
			levels.push(decode_pixels(slice, image_color_type, count, &palette)?);
			offset += len;
		};

		let pixels = levels.remove(0);

		Ok(Picture {
			gstex,
			aux,
			width,
			height,
			image_color_type,
			clut_color_type,
			clut_compound,
			pixels,
			mipmaps: levels,
			palette,
			user_data: BString::from(vec![]),
			comment: BString::from(vec![]),
		})
	}


	/// Serialize one picture record, back-patching the size fields.
	///
	/// # Errors
	/// - [`InvalidDimensions`]: width or height is not a power of two in
	///   1..=32768.
	/// - [`UnexpectedPixelBufferSize`]: a pixel buffer does not match its
	///   level's dimensions.
	/// - [`PaletteTooLarge`]: the palette exceeds the CLUT entry count
	///   implied by the color type and compound flag.
	/// - [`MissingPaletteIndex`], [`PaletteIndexOutOfRange`]: pixel data
	///   inconsistent with the indexed color type.
	pub(crate) fn write_to(&self, w: &mut PatchWriter, alignment: Alignment) -> Tim2Result<()> {
		let mut gstex = self.gstex;
		gstex.width_log2 = log2_dimension(self.width)?;
		gstex.height_log2 = log2_dimension(self.height)?;

		// Keep a storage-mode variant that already matches the color type
		// (e.g. PSMT4HH), otherwise fall back to the canonical mode.
		if gstex.pixel_storage_mode.color_type() != self.image_color_type {
			gstex.pixel_storage_mode = PixelStorageMode::for_color_type(self.image_color_type);
		};

		if self.is_indexed() && gstex.clut_pixel_storage_mode.color_type() != self.clut_color_type {
			gstex.clut_pixel_storage_mode = ClutPixelStorageMode::for_color_type(self.clut_color_type);
		};

		if self.pixels.len() != self.width as usize * self.height as usize {
			return Err(UnexpectedPixelBufferSize(self.pixels.len(), self.width, self.height));
		};

		let mip_count = (self.mipmaps.len() as u8).saturating_add(1).min(MAX_MIP_LEVELS);
		gstex.mip_level_max = mip_count - 1;

		macros::log!(
			trace,
			"Picture::write_to: {}x{} {:?}, mipCount={}",
			self.width, self.height, self.image_color_type, mip_count
		);

		let total_patch = w.reserve_u32();
		let image_patch = w.reserve_u32();
		w.write_u8(mip_count);
		w.extend(&[0u8; 7]);

		let (word0, word1) = gstex.to_words();
		w.write_u64(word0);
		w.write_u64(word1);

		if mip_count > 1 {
			let mut aux_bytes = Vec::with_capacity(GsTexAux::BLOCK_SIZE as usize);
			self.aux.write_to(&mut aux_bytes);
			w.extend(&aux_bytes);
		};

		w.align_to(alignment.boundary());
		let image_start = w.position();
		w.extend(&encode_pixels(&self.pixels, self.image_color_type)?);

		for (level, mipmap) in self.mipmaps.iter().take(usize::from(mip_count) - 1).enumerate() {
			let level = level as u32 + 1;
			let count = (self.width >> level).max(1) as usize * (self.height >> level).max(1) as usize;

			if mipmap.len() != count {
				return Err(UnexpectedPixelBufferSize(mipmap.len(), (self.width >> level).max(1), (self.height >> level).max(1)));
			};

			w.extend(&encode_pixels(mipmap, self.image_color_type)?);
		};

		w.align_to(alignment.boundary());
		let image_size = (w.position() - image_start) as u32;
		w.patch_u32(image_patch, image_size);

		let mut clut_size = 0u32;

		if self.is_indexed() {
			let color_count = self.image_color_type.clut_color_count(self.clut_compound);

			if self.palette.len() > color_count {
				return Err(PaletteTooLarge);
			};

			let palette = self.palette
				.clone()
				.tap_mut(|p| p.resize(color_count, Color::TRANSPARENT_BLACK))
				.tap_mut(|p| {
					if clut_is_compounded(self.image_color_type, gstex.clut_storage_mode, self.clut_compound) {
						compound_clut(p);
					};
				});

			let clut_bytes = encode_clut(&palette, self.clut_color_type)?;
			clut_size = clut_bytes.len() as u32;
			w.extend(&clut_bytes);
		};

		// totalSize is defined by the CLUT-size arithmetic of the reader,
		// not by the padded file span.
		w.patch_u32(total_patch, header_span(mip_count) + image_size + clut_size);

		Ok(())
	}


	/// Serialize into a standalone byte buffer (one picture, no container
	/// framing).
	///
	/// # Errors
	/// See [`Picture::write_to`].
	pub fn to_bytes(&self, alignment: Alignment) -> Tim2Result<Vec<u8>> {
		let mut w = PatchWriter::new();
		self.write_to(&mut w, alignment)?;
		Ok(w.into_inner())
	}
}


const fn header_span(mip_count: u8) -> u32 {
	if mip_count > 1 {
		BASE_HEADER_SIZE + GsTexAux::BLOCK_SIZE
	}
	else {
		BASE_HEADER_SIZE
	}
}


/// log2 of a power-of-two dimension in 1..=32768.
fn log2_dimension(dimension: u32) -> Tim2Result<u8> {
	if dimension.count_ones() != 1 || dimension > 32768 {
		return Err(InvalidDimensions(dimension, dimension));
	};

	Ok(dimension.trailing_zeros() as u8)
}


/// Seek forward to the next multiple of the container alignment.
pub(crate) fn skip_to_alignment<R: Read + Seek>(input: &mut R, alignment: Alignment) -> Tim2Result<()> {
	let boundary = alignment.boundary() as u64;
	let position = input.stream_position()?;
	let rem = position % boundary;

	if rem != 0 {
		input.seek(SeekFrom::Current((boundary - rem) as i64))?;
	};

	Ok(())
}


#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;
	use crate::gstex::{ClutStorageMode, ColorComponent};


	fn indexed_picture(width: u32, height: u32, color_type: ColorType, compound: bool) -> Picture {
		let color_count = color_type.clut_color_count(compound);
		let palette: Vec<Color> = (0..color_count)
			.map(|i| Color::new((i % 256) as u8, (i / 2 % 256) as u8, ((i * 7) % 256) as u8, 255))
			.collect();

		// 4-bit pixels index only the first 16 entries even of a 32-entry
		// compounded palette.
		let index_span = if color_type == ColorType::Indexed4 { 16 } else { color_count };
		let pixels: Vec<Pixel> = (0..width as usize * height as usize)
			.map(|i| Pixel::from_index((i % index_span) as u8, &palette).unwrap())
			.collect();

		Picture {
			gstex: GsTex {
				pixel_storage_mode: PixelStorageMode::for_color_type(color_type),
				clut_pixel_storage_mode: ClutPixelStorageMode::Psmct32,
				clut_storage_mode: ClutStorageMode::Csm1,
				color_component: ColorComponent::Rgba,
				..GsTex::default()
			},
			width,
			height,
			image_color_type: color_type,
			clut_color_type: ColorType::Rgba32,
			clut_compound: compound,
			pixels,
			palette,
			..Picture::default()
		}
	}


	#[test]
	fn roundtrip_indexed8_with_compounded_clut() {
		// The FromSoftware container scenario: 64x64, 8-bit indexed,
		// 256-entry CSM1 palette.
		let picture = indexed_picture(64, 64, ColorType::Indexed8, true);

		let bytes = picture.to_bytes(Alignment::Align16).unwrap();
		let back = Picture::read_from(&mut Cursor::new(&bytes), Alignment::Align16).unwrap();

		assert_eq!(back.width, 64);
		assert_eq!(back.height, 64);
		assert_eq!(back.image_color_type, ColorType::Indexed8);
		assert_eq!(back.clut_color_type, ColorType::Rgba32);
		assert_eq!(back.palette, picture.palette);
		assert_eq!(
			back.pixels.iter().map(|p| p.index).collect::<Vec<i32>>(),
			picture.pixels.iter().map(|p| p.index).collect::<Vec<i32>>(),
		);
	}


	#[test]
	fn roundtrip_indexed4_sequential_clut() {
		// ClutCompound=false: 16 entries, stored sequentially.
		let picture = indexed_picture(16, 16, ColorType::Indexed4, false);

		let bytes = picture.to_bytes(Alignment::Align16).unwrap();
		let back = Picture::read_from(&mut Cursor::new(&bytes), Alignment::Align16).unwrap();

		assert_eq!(back.palette.len(), 16);
		assert!(!back.clut_compound);
		assert_eq!(back.palette, picture.palette);
		assert_eq!(back.pixels, picture.pixels);
	}


	#[test]
	fn roundtrip_indexed4_compounded_clut() {
		let picture = indexed_picture(32, 32, ColorType::Indexed4, true);

		let bytes = picture.to_bytes(Alignment::Align16).unwrap();
		let back = Picture::read_from(&mut Cursor::new(&bytes), Alignment::Align16).unwrap();

		assert_eq!(back.palette.len(), 32);
		assert!(back.clut_compound);
		assert_eq!(back.palette, picture.palette);
		assert_eq!(back.pixels, picture.pixels);
	}


	#[test]
	fn roundtrip_true_color() {
		let width = 8u32;
		let height = 4u32;

		for color_type in [ColorType::Rgba32, ColorType::Rgb24, ColorType::Rgba16] {
			let pixels: Vec<Pixel> = (0..width * height)
				.map(|i| Pixel::from_color(Color::new((i * 8 % 256) as u8, (i * 16 % 256) as u8, 248, if color_type == ColorType::Rgba16 { 255 } else { (i % 2 * 255) as u8 })))
				.collect();

			let picture = Picture {
				width,
				height,
				image_color_type: color_type,
				clut_color_type: ColorType::None,
				pixels: pixels.clone(),
				..Picture::default()
			};

			let bytes = picture.to_bytes(Alignment::Align16).unwrap();
			let back = Picture::read_from(&mut Cursor::new(&bytes), Alignment::Align16).unwrap();

			assert_eq!(back.width, width);
			assert_eq!(back.height, height);
			assert_eq!(back.image_color_type, color_type);
			assert_eq!(back.palette.len(), 0);

			match color_type {
				// 24-bit drops alpha; it reads back as opaque.
				ColorType::Rgb24 => {
					for (a, b) in back.pixels.iter().zip(&pixels) {
						assert_eq!((a.color.r, a.color.g, a.color.b), (b.color.r, b.color.g, b.color.b));
						assert_eq!(a.color.a, 255);
					};
				},

				_ => assert_eq!(back.pixels, pixels),
			};
		};
	}


	#[test]
	fn roundtrip_mipmapped_picture() {
		let mut picture = indexed_picture(16, 16, ColorType::Indexed4, true);
		picture.mipmaps = vec![
			picture.pixels[..8 * 8].to_vec(),
			picture.pixels[..4 * 4].to_vec(),
		];

		let bytes = picture.to_bytes(Alignment::Align16).unwrap();
		let back = Picture::read_from(&mut Cursor::new(&bytes), Alignment::Align16).unwrap();

		assert_eq!(back.mipmaps.len(), 2);
		assert_eq!(back.mipmaps, picture.mipmaps);
		assert_eq!(back.aux, picture.aux);
	}


	#[test]
	fn roundtrip_alignment_128() {
		let picture = indexed_picture(16, 16, ColorType::Indexed8, true);

		let bytes = picture.to_bytes(Alignment::Align128).unwrap();
		// Header padded to 128, image segment padded to a 128 multiple, then
		// the 1024-byte CLUT.
		assert_eq!(bytes.len(), 128 + 256 + 1024);

		let back = Picture::read_from(&mut Cursor::new(&bytes), Alignment::Align128).unwrap();
		assert_eq!(back.pixels, picture.pixels);
		assert_eq!(back.palette, picture.palette);
	}


	#[test]
	fn rejects_nonzero_padding() {
		let picture = indexed_picture(16, 16, ColorType::Indexed8, true);
		let mut bytes = picture.to_bytes(Alignment::Align16).unwrap();
		bytes[12] = 0xFF;

		assert!(matches!(
			Picture::read_from(&mut Cursor::new(&bytes), Alignment::Align16),
			Err(NonzeroPadding)
		));
	}


	#[test]
	fn rejects_inconsistent_sizes() {
		let picture = indexed_picture(16, 16, ColorType::Indexed8, true);
		let mut bytes = picture.to_bytes(Alignment::Align16).unwrap();
		// Declared image size larger than the total.
		bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());

		assert!(matches!(
			Picture::read_from(&mut Cursor::new(&bytes), Alignment::Align16),
			Err(SizeMismatch(_, _))
		));
	}


	#[test]
	fn rejects_non_power_of_two_dimensions() {
		let mut picture = indexed_picture(16, 16, ColorType::Indexed8, true);
		picture.width = 20;
		picture.pixels.truncate(20 * 16);

		assert!(matches!(picture.to_bytes(Alignment::Align16), Err(InvalidDimensions(20, 20))));
	}
}
