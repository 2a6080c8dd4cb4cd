//! The GsTex register pair describing a texture's VRAM addressing, storage
//! modes, dimensions and mip-mapping parameters, plus the auxiliary
//! byte-oriented register group carried by extended picture headers.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::bitfield::{pack_u64, unpack_u64};
use crate::{ColorType, Tim2Result, ExtendExt};
use crate::Tim2Error::*;


/// GS pixel storage mode (PSM).  The Z-buffer modes are accepted as valid
/// register values; their payloads are stored like the true-color mode of
/// the same width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PixelStorageMode {
	/// 32-bit RGBA.
	Psmct32 = 0,
	/// 24-bit RGB.
	Psmct24 = 1,
	/// 16-bit A1B5G5R5.
	Psmct16 = 2,
	/// 16-bit A1B5G5R5, signed-Z page layout.
	Psmct16s = 10,
	/// 8-bit palette index.
	Psmt8 = 19,
	/// 4-bit palette index.
	Psmt4 = 20,
	/// 8-bit index in the high byte of a 32-bit word.
	Psmt8h = 27,
	/// 4-bit index in bits 24..28 of a 32-bit word.
	Psmt4hl = 36,
	/// 4-bit index in bits 28..32 of a 32-bit word.
	Psmt4hh = 44,
	/// 32-bit Z value.
	Psmz32 = 48,
	/// 24-bit Z value.
	Psmz24 = 49,
	/// 16-bit Z value.
	Psmz16 = 50,
	/// 16-bit Z value, signed page layout.
	Psmz16s = 58,
}


impl Default for PixelStorageMode {
	fn default() -> Self {
		PixelStorageMode::Psmct32
	}
}


impl PixelStorageMode {
	/// # Errors
	/// - [`UnsupportedPixelStorageMode`]: `raw` is not a known PSM value.
	pub fn from_raw(raw: u8) -> Tim2Result<Self> {
		use PixelStorageMode::*;

		Ok(match raw {
			0 => Psmct32,
			1 => Psmct24,
			2 => Psmct16,
			10 => Psmct16s,
			19 => Psmt8,
			20 => Psmt4,
			27 => Psmt8h,
			36 => Psmt4hl,
			44 => Psmt4hh,
			48 => Psmz32,
			49 => Psmz24,
			50 => Psmz16,
			58 => Psmz16s,
			_ => return Err(UnsupportedPixelStorageMode(raw)),
		})
	}


	/// The register field value.
	pub const fn raw(self) -> u8 {
		self as u8
	}


	/// The pixel encoding implied by this storage mode.  Z modes store like
	/// the true-color mode of the same width.
	pub const fn color_type(self) -> ColorType {
		use PixelStorageMode::*;

		match self {
			Psmct32 | Psmz32 => ColorType::Rgba32,
			Psmct24 | Psmz24 => ColorType::Rgb24,
			Psmct16 | Psmct16s | Psmz16 | Psmz16s => ColorType::Rgba16,
			Psmt8 | Psmt8h => ColorType::Indexed8,
			Psmt4 | Psmt4hl | Psmt4hh => ColorType::Indexed4,
		}
	}


	/// The canonical storage mode for a color type, used when building
	/// registers from scratch.
	pub const fn for_color_type(color_type: ColorType) -> Self {
		use PixelStorageMode::*;

		match color_type {
			ColorType::Rgb24 => Psmct24,
			ColorType::Rgba16 => Psmct16,
			ColorType::Indexed8 => Psmt8,
			ColorType::Indexed4 => Psmt4,
			ColorType::Rgba32 | ColorType::None => Psmct32,
		}
	}
}


/// GS CLUT pixel storage mode (CPSM), a 4-bit field restricted to the
/// true-color PSM values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClutPixelStorageMode {
	/// 32-bit RGBA entries.
	Psmct32 = 0,
	/// 24-bit RGB entries.
	Psmct24 = 1,
	/// 16-bit A1B5G5R5 entries.
	Psmct16 = 2,
	/// 16-bit A1B5G5R5 entries, signed page layout.
	Psmct16s = 10,
}


impl Default for ClutPixelStorageMode {
	fn default() -> Self {
		ClutPixelStorageMode::Psmct32
	}
}


impl ClutPixelStorageMode {
	/// # Errors
	/// - [`UnsupportedClutStorageMode`]: `raw` is not a known CPSM value.
	pub fn from_raw(raw: u8) -> Tim2Result<Self> {
		use ClutPixelStorageMode::*;

		Ok(match raw {
			0 => Psmct32,
			1 => Psmct24,
			2 => Psmct16,
			10 => Psmct16s,
			_ => return Err(UnsupportedClutStorageMode(raw)),
		})
	}


	/// The register field value.
	pub const fn raw(self) -> u8 {
		self as u8
	}


	/// The CLUT entry encoding implied by this storage mode.
	pub const fn color_type(self) -> ColorType {
		use ClutPixelStorageMode::*;

		match self {
			Psmct32 => ColorType::Rgba32,
			Psmct24 => ColorType::Rgb24,
			Psmct16 | Psmct16s => ColorType::Rgba16,
		}
	}


	/// The canonical CPSM for a CLUT color type.
	pub const fn for_color_type(color_type: ColorType) -> Self {
		use ClutPixelStorageMode::*;

		match color_type {
			ColorType::Rgb24 => Psmct24,
			ColorType::Rgba16 => Psmct16,
			_ => Psmct32,
		}
	}
}


/// GS CLUT entry-order mode (CSM).  CSM1 palettes are subject to the
/// compounding transform, see [`compound_clut`][crate::compound_clut].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClutStorageMode {
	/// Compounded entry order.
	Csm1,
	/// Sequential entry order.
	Csm2,
}


impl Default for ClutStorageMode {
	fn default() -> Self {
		ClutStorageMode::Csm1
	}
}


/// TCC bit: whether the texture supplies RGB or RGBA to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorComponent {
	/// RGB, alpha ignored.
	Rgb,
	/// RGBA.
	Rgba,
}


impl Default for ColorComponent {
	fn default() -> Self {
		ColorComponent::Rgba
	}
}


/// The two 64-bit GsTex register words, unpacked.
///
/// Field widths (bits) follow the hardware layout; values wider than their
/// field are the caller's contract, as with
/// [`pack`][crate::bitfield::pack_u64] itself.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GsTex {
	/// TBP0, 14 bits: texture base pointer in VRAM allocation units.
	pub base_pointer: u16,
	/// TBW, 6 bits: texture buffer width.
	pub buffer_width: u8,
	/// PSM, 6 bits.
	pub pixel_storage_mode: PixelStorageMode,
	/// TW, 4 bits: log2 of the texture width.
	pub width_log2: u8,
	/// TH, 4 bits: log2 of the texture height.
	pub height_log2: u8,
	/// TCC.
	pub color_component: ColorComponent,
	/// TFX, 2 bits: texture function (semantics opaque to the codec).
	pub texture_function: u8,
	/// CBP, 14 bits: CLUT base pointer.
	pub clut_base_pointer: u16,
	/// CPSM, 4 bits.
	pub clut_pixel_storage_mode: ClutPixelStorageMode,
	/// CSM.
	pub clut_storage_mode: ClutStorageMode,
	/// CSA, 5 bits: CLUT start address.
	pub clut_start_address: u8,
	/// CLD, 3 bits: CLUT load control.
	pub clut_load_control: u8,
	/// LCM, 1 bit: LOD calculation method.
	pub lod_calc_method: u8,
	/// MXL, 3 bits: maximum mip level.
	pub mip_level_max: u8,
	/// MMAG, 1 bit: magnification filter.
	pub mip_mag_filter: u8,
	/// MMIN, 3 bits: minification filter.
	pub mip_min_filter: u8,
	/// MTBA, 1 bit: mip base address is specified automatically.
	pub mip_base_address: u8,
	/// L, 2 bits: LOD parameter.
	pub lod_param_l: u8,
	/// K, 12 bits: LOD parameter.
	pub lod_param_k: u16,
}


impl GsTex {
	/// Unpack the register pair.
	///
	/// # Errors
	/// - [`InvalidRegisterData`]: a reserved bit range of word 1 is nonzero.
	/// - [`UnsupportedPixelStorageMode`], [`UnsupportedClutStorageMode`]:
	///   unknown storage-mode codes.
	pub fn from_words(word0: u64, word1: u64) -> Tim2Result<Self> {
		let reserved = unpack_u64(word1, 1, 1)
			| unpack_u64(word1, 9, 10)
			| unpack_u64(word1, 11, 21)
			| unpack_u64(word1, 20, 44);

		if reserved != 0 {
			return Err(InvalidRegisterData(1));
		};

		Ok(GsTex {
			base_pointer: unpack_u64(word0, 14, 0) as u16,
			buffer_width: unpack_u64(word0, 6, 14) as u8,
			pixel_storage_mode: PixelStorageMode::from_raw(unpack_u64(word0, 6, 20) as u8)?,
			width_log2: unpack_u64(word0, 4, 26) as u8,
			height_log2: unpack_u64(word0, 4, 30) as u8,
			color_component: if unpack_u64(word0, 1, 34) != 0 { ColorComponent::Rgba } else { ColorComponent::Rgb },
			texture_function: unpack_u64(word0, 2, 35) as u8,
			clut_base_pointer: unpack_u64(word0, 14, 37) as u16,
			clut_pixel_storage_mode: ClutPixelStorageMode::from_raw(unpack_u64(word0, 4, 51) as u8)?,
			clut_storage_mode: if unpack_u64(word0, 1, 55) != 0 { ClutStorageMode::Csm2 } else { ClutStorageMode::Csm1 },
			clut_start_address: unpack_u64(word0, 5, 56) as u8,
			clut_load_control: unpack_u64(word0, 3, 61) as u8,
			lod_calc_method: unpack_u64(word1, 1, 0) as u8,
			mip_level_max: unpack_u64(word1, 3, 2) as u8,
			mip_mag_filter: unpack_u64(word1, 1, 5) as u8,
			mip_min_filter: unpack_u64(word1, 3, 6) as u8,
			mip_base_address: unpack_u64(word1, 1, 9) as u8,
			lod_param_l: unpack_u64(word1, 2, 19) as u8,
			lod_param_k: unpack_u64(word1, 12, 32) as u16,
		})
	}


	/// Pack the register pair; reserved ranges are written as zero.
	pub fn to_words(&self) -> (u64, u64) {
		let mut word0 = 0u64;
		word0 = pack_u64(word0, u64::from(self.base_pointer), 0);
		word0 = pack_u64(word0, u64::from(self.buffer_width), 14);
		word0 = pack_u64(word0, u64::from(self.pixel_storage_mode.raw()), 20);
		word0 = pack_u64(word0, u64::from(self.width_log2), 26);
		word0 = pack_u64(word0, u64::from(self.height_log2), 30);
		word0 = pack_u64(word0, u64::from(self.color_component == ColorComponent::Rgba), 34);
		word0 = pack_u64(word0, u64::from(self.texture_function), 35);
		word0 = pack_u64(word0, u64::from(self.clut_base_pointer), 37);
		word0 = pack_u64(word0, u64::from(self.clut_pixel_storage_mode.raw()), 51);
		word0 = pack_u64(word0, u64::from(self.clut_storage_mode == ClutStorageMode::Csm2), 55);
		word0 = pack_u64(word0, u64::from(self.clut_start_address), 56);
		word0 = pack_u64(word0, u64::from(self.clut_load_control), 61);

		let mut word1 = 0u64;
		word1 = pack_u64(word1, u64::from(self.lod_calc_method), 0);
		word1 = pack_u64(word1, u64::from(self.mip_level_max), 2);
		word1 = pack_u64(word1, u64::from(self.mip_mag_filter), 5);
		word1 = pack_u64(word1, u64::from(self.mip_min_filter), 6);
		word1 = pack_u64(word1, u64::from(self.mip_base_address), 9);
		word1 = pack_u64(word1, u64::from(self.lod_param_l), 19);
		word1 = pack_u64(word1, u64::from(self.lod_param_k), 32);

		(word0, word1)
	}


	/// Read and unpack two consecutive little-endian register words.
	///
	/// # Errors
	/// See [`GsTex::from_words`], plus I/O errors from `input`.
	pub fn read_from<R: Read>(input: &mut R) -> Tim2Result<Self> {
		let word0 = input.read_u64::<LittleEndian>()?;
		let word1 = input.read_u64::<LittleEndian>()?;
		Self::from_words(word0, word1)
	}


	/// Pack and append both register words in little-endian order.
	pub fn write_to(&self, bytes: &mut Vec<u8>) {
		let (word0, word1) = self.to_words();
		bytes.extend_with_uint::<LittleEndian, _, 8>(word0);
		bytes.extend_with_uint::<LittleEndian, _, 8>(word1);
	}
}


/// Auxiliary byte-oriented register group present in extended picture
/// headers: texture-alpha registers and the CLUT buffer addressing trio.
///
/// Serialized as a 16-byte block:
/// `[TA0][AEM][TA1][PABE][FBA][pad][CBW][COU][COV:u16][pad:6]`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GsTexAux {
	/// Alpha value used when the pixel alpha bit is 0.
	pub ta0: u8,
	/// Alpha expansion method for 16/24-bit pixels.
	pub aem: u8,
	/// Alpha value used when the pixel alpha bit is 1.
	pub ta1: u8,
	/// Per-pixel alpha blend enable.
	pub pabe: u8,
	/// Alpha correction value.
	pub fba: u8,
	/// CLUT buffer width in VRAM pages.
	pub clut_buffer_width: u8,
	/// CLUT offset U, in texels.
	pub clut_offset_u: u8,
	/// CLUT offset V, in texels.
	pub clut_offset_v: u16,
}


impl GsTexAux {
	pub(crate) const BLOCK_SIZE: u32 = 16;


	/// # Errors
	/// - [`NonzeroPadding`]: a reserved byte of the block is nonzero.
	pub fn read_from<R: Read>(input: &mut R) -> Tim2Result<Self> {
		let mut block = [0u8; Self::BLOCK_SIZE as usize];
		input.read_exact(&mut block)?;

		if block[5] != 0 || block[10..].iter().any(|b| *b != 0) {
			return Err(NonzeroPadding);
		};

		Ok(GsTexAux {
			ta0: block[0],
			aem: block[1],
			ta1: block[2],
			pabe: block[3],
			fba: block[4],
			clut_buffer_width: block[6],
			clut_offset_u: block[7],
			clut_offset_v: u16::from_le_bytes([block[8], block[9]]),
		})
	}


	/// Append the 16-byte block, zeroing the reserved bytes.
	pub fn write_to(&self, bytes: &mut Vec<u8>) {
		bytes.extend([self.ta0, self.aem, self.ta1, self.pabe, self.fba, 0, self.clut_buffer_width, self.clut_offset_u]);
		bytes.extend_with_uint::<LittleEndian, _, 2>(self.clut_offset_v);
		bytes.extend([0u8; 6]);
	}
}


#[cfg(test)]
mod tests {
	use super::*;


	#[test]
	fn gstex_word_roundtrip() {
		let gstex = GsTex {
			base_pointer: 0x1234,
			buffer_width: 4,
			pixel_storage_mode: PixelStorageMode::Psmt8,
			width_log2: 6,
			height_log2: 6,
			color_component: ColorComponent::Rgba,
			texture_function: 1,
			clut_base_pointer: 0x2FF0,
			clut_pixel_storage_mode: ClutPixelStorageMode::Psmct32,
			clut_storage_mode: ClutStorageMode::Csm1,
			clut_start_address: 3,
			clut_load_control: 1,
			lod_calc_method: 1,
			mip_level_max: 2,
			mip_mag_filter: 1,
			mip_min_filter: 4,
			mip_base_address: 1,
			lod_param_l: 2,
			lod_param_k: 0x800,
		};

		let (word0, word1) = gstex.to_words();
		assert_eq!(GsTex::from_words(word0, word1).unwrap(), gstex);
	}


	#[test]
	fn gstex_rejects_reserved_bits() {
		let (word0, word1) = GsTex::default().to_words();
		assert!(GsTex::from_words(word0, word1).is_ok());

		for bit in [1u32, 10, 18, 21, 31, 44, 63] {
			assert!(matches!(
				GsTex::from_words(word0, word1 | (1u64 << bit)),
				Err(InvalidRegisterData(1))
			));
		};
	}


	#[test]
	fn gstex_rejects_unknown_storage_mode() {
		let mut word0 = 0u64;
		word0 = pack_u64(word0, 33, 20); // not a PSM code
		assert!(matches!(GsTex::from_words(word0, 0), Err(UnsupportedPixelStorageMode(33))));
	}


	#[test]
	fn gstex_aux_roundtrip() {
		let aux = GsTexAux {
			ta0: 0x80,
			aem: 1,
			ta1: 0x40,
			pabe: 0,
			fba: 1,
			clut_buffer_width: 1,
			clut_offset_u: 16,
			clut_offset_v: 448,
		};

		let mut bytes = vec![];
		aux.write_to(&mut bytes);
		assert_eq!(bytes.len(), GsTexAux::BLOCK_SIZE as usize);

		let back = GsTexAux::read_from(&mut std::io::Cursor::new(&bytes)).unwrap();
		assert_eq!(back, aux);
	}
}
