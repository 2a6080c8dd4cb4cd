#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, unreachable_pub, clippy::all)]
#![allow(clippy::wildcard_imports, clippy::enum_glob_use)]
#![warn(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]


#![doc = include_str!("../README.md")]


mod macros;
pub mod bitfield;
mod color;
mod raster;
mod gstex;
mod writer;
mod picture;
pub mod tim;
mod normalize;
mod decode;
mod encode;

use picture::skip_to_alignment;

pub use color::*;
pub use raster::*;
pub use gstex::*;
pub use picture::*;
pub use normalize::*;
pub use decode::*;
pub use encode::*;


use std::io::{Read, Seek};
#[cfg(test)] use std::io::Cursor;
use std::iter::Extend;

use byteorder::{LittleEndian, ByteOrder, ReadBytesExt};
#[cfg(test)] use byteorder::BigEndian;
use derive_more::{Display, Error};

use Tim2Error::*;

/// [`std::result::Result`] parameterized with [`Tim2Error`]
pub type Tim2Result<T> = Result<T, Tim2Error>;


/// `ps2_tim2`'s [`std::error::Error`]
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Tim2Error {
	/// A function that reads from [`std::io::Read`] encountered early EOF.
	#[display(fmt = "Unexpected end of input file")]
	UnexpectedEof,

	/// Unexpected I/O error that is not UnexpectedEof.
	#[display(fmt = "Unexpected I/O error: {:?}", _0)]
	UnexpectedIoError(#[error(ignore)] std::io::ErrorKind),

	/// Attempted to read a legacy TIM with incorrect magic bytes.
	#[display(fmt = "Unknown TIM magic: {:#010x}", _0)]
	UnknownMagic(#[error(ignore)] u32),

	/// The input matched none of the supported container variants.
	#[display(fmt = "Input does not match any supported container format")]
	UnknownContainerFormat,

	/// A TIM2 header declared an alignment id other than 0 or 1.
	#[display(fmt = "Unknown alignment id: {}", _0)]
	UnknownAlignmentId(#[error(ignore)] u8),

	/// Reserved padding bytes that must be zero were not.
	#[display(fmt = "Nonzero reserved padding bytes")]
	NonzeroPadding,

	/// A picture header declared a mip level count outside 1..=7.
	#[display(fmt = "Invalid mipmap level count: {}", _0)]
	InvalidMipmapCount(#[error(ignore)] u8),

	/// A reserved bit range of the indicated GsTex word was nonzero.
	#[display(fmt = "Invalid register data in GsTex word {}", _0)]
	InvalidRegisterData(#[error(ignore)] u8),

	/// The register set declared a pixel storage mode this codec does not know.
	#[display(fmt = "Unsupported pixel storage mode: {}", _0)]
	UnsupportedPixelStorageMode(#[error(ignore)] u8),

	/// The register set declared a CLUT pixel storage mode this codec does
	/// not know.
	#[display(fmt = "Unsupported CLUT pixel storage mode: {}", _0)]
	UnsupportedClutStorageMode(#[error(ignore)] u8),

	/// A legacy TIM declared the mixed pixel mode or a reserved one.
	#[display(fmt = "Unsupported TIM pixel mode: {}", _0)]
	UnsupportedTimPixelMode(#[error(ignore)] u8),

	/// totalSize/imageSize arithmetic produced a negative CLUT size.
	#[display(fmt = "Inconsistent picture sizes: totalSize={}, imageSize={}", _0, _1)]
	SizeMismatch(#[error(ignore)] u32, #[error(ignore)] u32),

	/// A CLUT payload was requested with an indexed or
	/// [`None`][ColorType::None] color type.
	#[display(fmt = "Invalid CLUT color type: {:?}", _0)]
	InvalidClutColorType(#[error(ignore)] ColorType),

	/// A palette index did not resolve into the current palette, or did not
	/// fit the target bit depth.
	#[display(fmt = "Palette index out of range: {}", _0)]
	PaletteIndexOutOfRange(#[error(ignore)] u32),

	/// True-color pixel data was routed through the indexed write path.
	#[display(fmt = "Attempted to serialize a pixel without a palette index through an indexed color type")]
	MissingPaletteIndex,

	/// The palette holds more colors than the target color type can index.
	#[display(fmt = "Palette exceeds the CLUT entry count of the target color type")]
	PaletteTooLarge,

	/// Picture dimensions are not powers of two in 1..=32768.
	#[display(fmt = "Invalid picture dimensions: {}x{}", _0, _1)]
	InvalidDimensions(#[error(ignore)] u32, #[error(ignore)] u32),

	/// A pixel buffer length does not match its level's dimensions.
	#[display(fmt = "Pixel buffer of {} entries does not match {}x{}", _0, _1, _2)]
	UnexpectedPixelBufferSize(#[error(ignore)] usize, #[error(ignore)] u32, #[error(ignore)] u32),

	/// A mip level index was outside the picture's mip chain.
	#[display(fmt = "Mipmap index out of range")]
	MipmapIndexOutOfRange,

	/// Writing the legacy TIM variant is not supported.
	#[display(fmt = "Writing the legacy TIM variant is not supported")]
	LegacyTimWriteUnsupported,

	/// A FromSoftware-variant container must hold exactly one picture.
	#[display(fmt = "FromSoftware containers hold exactly one picture, not {}", _0)]
	FsPictureCount(#[error(ignore)] usize),

	/// More pictures than the TIM2 16-bit count field can represent.
	#[display(fmt = "Picture count overflows the header field: {}", _0)]
	PictureCountOverflow(#[error(ignore)] usize),
}


impl From<std::io::Error> for Tim2Error {
	fn from(error: std::io::Error) -> Self {
		match error.kind() {
			std::io::ErrorKind::UnexpectedEof => UnexpectedEof,
			kind => UnexpectedIoError(kind),
		}
	}
}


/// The byte boundary image and CLUT segments are padded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
	/// 16-byte segment alignment (TIM2 format id 0).
	Align16,
	/// 128-byte segment alignment (TIM2 format id 1).
	Align128,
}


impl Default for Alignment {
	fn default() -> Self {
		Alignment::Align16
	}
}


impl Alignment {
	/// The boundary in bytes.
	pub const fn boundary(self) -> usize {
		match self {
			Alignment::Align16 => 16,
			Alignment::Align128 => 128,
		}
	}


	/// Map a TIM2 header format id to an alignment.
	///
	/// # Errors
	/// - [`UnknownAlignmentId`]: `id` is not 0 or 1.
	pub fn from_id(id: u8) -> Tim2Result<Self> {
		match id {
			0 => Ok(Alignment::Align16),
			1 => Ok(Alignment::Align128),
			id => Err(UnknownAlignmentId(id)),
		}
	}


	/// The TIM2 header format id of this alignment.
	pub const fn id(self) -> u8 {
		match self {
			Alignment::Align16 => 0,
			Alignment::Align128 => 1,
		}
	}
}


/// The container variants this codec recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
	/// Plain TIM2, identified by the `TIM2` magic tag.
	Tim2,
	/// The FromSoftware variant: no magic, exactly one picture, version 4,
	/// 16-byte alignment.
	FsTim2,
	/// Legacy PS1 TIM.  Read-only.
	Tim,
}


impl Default for ContainerFormat {
	fn default() -> Self {
		ContainerFormat::Tim2
	}
}


/// TIM2 magic tag.
pub const TIM2_MAGIC: &[u8; 4] = b"TIM2";

/// TIM2 header size before alignment padding.
const TIM2_HEADER_SIZE: usize = 16;


struct FormatEntry {
	format: ContainerFormat,
	detect: fn(&[u8]) -> bool,
}


/// Sniff predicates in priority order.  The FromSoftware variant has no
/// magic and is only ever a fallback.
const FORMATS: &[FormatEntry] = &[
	FormatEntry { format: ContainerFormat::Tim2, detect: detect_tim2 },
	FormatEntry { format: ContainerFormat::Tim, detect: tim::detect },
	FormatEntry { format: ContainerFormat::FsTim2, detect: detect_fs_tim2 },
];


fn detect_tim2(data: &[u8]) -> bool {
	data.len() >= TIM2_HEADER_SIZE && &data[0..4] == TIM2_MAGIC
}


/// A bare picture record: plausible mip count and zeroed header padding.
fn detect_fs_tim2(data: &[u8]) -> bool {
	data.len() >= 32 && (1..=MAX_MIP_LEVELS).contains(&data[8]) && data[9..16].iter().all(|b| *b == 0)
}


/// A single texture container file represented as a struct
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Tim2File {
	/// Container variant the file was read as, or should be written as.
	pub format: ContainerFormat,
	/// Format version byte from the TIM2 header (fixed at 4 for the
	/// FromSoftware variant).
	pub version: u8,
	/// Segment alignment boundary.
	pub alignment: Alignment,
	/// The contained pictures, in file order.
	pub pictures: Vec<Picture>,
}


impl Tim2File {
	/// Identify which container variant `data` holds, without parsing it.
	pub fn sniff(data: &[u8]) -> Option<ContainerFormat> {
		FORMATS.iter().find(|entry| (entry.detect)(data)).map(|entry| entry.format)
	}


	/// Sniff and parse a container from a byte buffer.
	///
	/// # Errors
	/// - [`UnknownContainerFormat`]: `data` matches no supported variant.
	/// - other: errors of the matched variant's reader.
	pub fn from_bytes(data: &[u8]) -> Tim2Result<Self> {
		let format = Self::sniff(data).ok_or(UnknownContainerFormat)?;

		macros::log!(trace, "Tim2File::from_bytes: {} input bytes sniffed as {:?}", data.len(), format);

		let mut input = std::io::Cursor::new(data);

		match format {
			ContainerFormat::Tim2 => Self::read_tim2(&mut input),

			ContainerFormat::Tim => {
				let picture = tim::read_from(&mut input)?;

				Ok(Self {
					format: ContainerFormat::Tim,
					version: 0,
					alignment: Alignment::Align16,
					pictures: vec![picture],
				})
			},

			ContainerFormat::FsTim2 => {
				let picture = Picture::read_from(&mut input, Alignment::Align16)?;

				Ok(Self {
					format: ContainerFormat::FsTim2,
					version: 4,
					alignment: Alignment::Align16,
					pictures: vec![picture],
				})
			},
		}
	}


	/// Read a container from a stream, see [`Tim2File::from_bytes`].
	///
	/// # Errors
	/// See [`Tim2File::from_bytes`].
	pub fn read_from<R: Read + Seek>(input: &mut R) -> Tim2Result<Self> {
		let mut data: Vec<u8> = vec![];
		input.read_to_end(&mut data)?;
		Self::from_bytes(&data)
	}


	fn read_tim2<R: Read + Seek>(input: &mut R) -> Tim2Result<Self> {
		let mut magic = [0u8; 4];
		input.read_exact(&mut magic)?;

		let version = input.read_u8()?;
		let alignment = Alignment::from_id(input.read_u8()?)?;
		let picture_count = input.read_u16::<LittleEndian>()?;

		let mut pad = [0u8; 8];
		input.read_exact(&mut pad)?;
		if pad.iter().any(|b| *b != 0) {
			return Err(NonzeroPadding);
		};

		let mut pictures: Vec<Picture> = Vec::with_capacity(picture_count.into());

		for _ in 0..picture_count {
			skip_to_alignment(input, alignment)?;
			pictures.push(Picture::read_from(input, alignment)?);
		};

		Ok(Self { format: ContainerFormat::Tim2, version, alignment, pictures })
	}


	/// Serialize the container.
	///
	/// # Errors
	/// - [`LegacyTimWriteUnsupported`]: [`ContainerFormat::Tim`] is read-only.
	/// - [`FsPictureCount`]: a FromSoftware container with other than
	///   exactly one picture.
	/// - [`PictureCountOverflow`]: more pictures than the header field holds.
	/// - other: errors of [`Picture`] serialization.
	pub fn to_bytes(&self) -> Tim2Result<Vec<u8>> {
		use crate::writer::PatchWriter;

		let mut w = PatchWriter::new();

		match self.format {
			ContainerFormat::Tim => return Err(LegacyTimWriteUnsupported),

			ContainerFormat::FsTim2 => {
				if self.pictures.len() != 1 {
					return Err(FsPictureCount(self.pictures.len()));
				};

				self.pictures[0].write_to(&mut w, Alignment::Align16)?;
			},

			ContainerFormat::Tim2 => {
				let picture_count = u16::try_from(self.pictures.len())
					.map_err(|_| PictureCountOverflow(self.pictures.len()))?;

				w.extend(TIM2_MAGIC);
				w.write_u8(self.version);
				w.write_u8(self.alignment.id());
				w.write_u16(picture_count);
				w.extend(&[0u8; 8]);

				for picture in &self.pictures {
					w.align_to(self.alignment.boundary());
					picture.write_to(&mut w, self.alignment)?;
				};
			},
		};

		Ok(w.into_inner())
	}
}


trait ExtendExt: Extend<u8> {
	/// Convenience function which extends an [`std::iter::Extend<u8>`] with a
	/// [`byteorder::ByteOrder`]-encoded integer.
	fn extend_with_uint<B: ByteOrder, T: Into<u64>, const N: usize>(&mut self, v: T) {
		let mut buf = vec![0u8; N];
		B::write_uint(&mut buf[..], v.into(), N);
		self.extend(buf.into_iter());
	}
}


impl<T> ExtendExt for T where T: Extend<u8> {}


#[test]
fn test_extend_with_uint() {
	let mut dest: Vec<u8> = vec![];

	dest.extend_with_uint::<LittleEndian, _, 2>(1234u16);
	assert_eq!(dest, vec![0xD2, 0x04]);

	dest.extend_with_uint::<LittleEndian, _, 3>(1234u32);
	assert_eq!(dest, vec![0xD2, 0x04, 0xD2, 0x04, 0x00]);

	dest.extend_with_uint::<BigEndian, _, 4>(5678u32);
	assert_eq!(dest, vec![0xD2, 0x04, 0xD2, 0x04, 0x00, 0x00, 0x00, 0x16, 0x2E]);
}


trait ReadExt: Read {
	const SINGLE_READ_SIZE: usize = 64;

	fn read_exact_buffered(&mut self, len: usize) -> Tim2Result<Vec<u8>> {
		let mut data: Vec<u8> = Vec::with_capacity(len);
		let mut total = 0usize;

		loop {
			if total == len {
				break;
			};

			let bufsize = std::cmp::min(Self::SINGLE_READ_SIZE, len - total);
			let mut buf = vec![0u8; bufsize];
			self.read_exact(&mut buf)?;
			data.extend(&buf[..]);
			total += bufsize;
		};

		Ok(data)
	}
}


impl<T> ReadExt for T where T: Read {}


#[test]
fn test_read_exact_buffered() {
	let mut input = Cursor::new(vec![0x41u8, 0x42, 0x43, 0x44, 0x45, 0x46]);
	assert_eq!(input.read_exact_buffered(1).unwrap(), vec![0x41u8]);
	assert_eq!(input.read_exact_buffered(2).unwrap(), vec![0x42u8, 0x43]);
	assert_eq!(input.read_exact_buffered(3).unwrap(), vec![0x44u8, 0x45, 0x46]);
	assert!(matches!(input.read_exact_buffered(1), Err(UnexpectedEof)));
}


#[cfg(test)]
mod container_tests {
	use super::*;


	fn indexed8_picture() -> Picture {
		let palette: Vec<Color> = (0..256).map(|i| Color::new(i as u8, 0, 0, 255)).collect();
		let pixels: Vec<Pixel> = (0..256).map(|i| Pixel::from_index(i as u8, &palette).unwrap()).collect();

		Picture {
			gstex: GsTex {
				pixel_storage_mode: PixelStorageMode::Psmt8,
				// Kept in sync with width/height below: write_to
				// canonicalizes these and the roundtrip tests compare
				// whole structs.
				width_log2: 4,
				height_log2: 4,
				clut_pixel_storage_mode: ClutPixelStorageMode::Psmct32,
				clut_storage_mode: ClutStorageMode::Csm1,
				..GsTex::default()
			},
			width: 16,
			height: 16,
			image_color_type: ColorType::Indexed8,
			clut_color_type: ColorType::Rgba32,
			clut_compound: true,
			pixels,
			palette,
			..Picture::default()
		}
	}


	#[test]
	fn test_tim2_roundtrip() {
		let file = Tim2File {
			format: ContainerFormat::Tim2,
			version: 4,
			alignment: Alignment::Align16,
			pictures: vec![indexed8_picture(), indexed8_picture()],
		};

		let bytes = file.to_bytes().unwrap();
		assert_eq!(&bytes[0..4], TIM2_MAGIC);
		assert_eq!(Tim2File::sniff(&bytes), Some(ContainerFormat::Tim2));

		let back = Tim2File::from_bytes(&bytes).unwrap();
		assert_eq!(back.version, 4);
		assert_eq!(back.alignment, Alignment::Align16);
		assert_eq!(back.pictures.len(), 2);
		assert_eq!(back.pictures[0].pixels, file.pictures[0].pixels);
		assert_eq!(back.pictures[1].palette, file.pictures[1].palette);
	}


	#[test]
	fn test_tim2_roundtrip_align128() {
		let file = Tim2File {
			format: ContainerFormat::Tim2,
			version: 4,
			alignment: Alignment::Align128,
			pictures: vec![indexed8_picture()],
		};

		let bytes = file.to_bytes().unwrap();
		let back = Tim2File::from_bytes(&bytes).unwrap();
		assert_eq!(back.alignment, Alignment::Align128);
		assert_eq!(back.pictures, file.pictures);
	}


	#[test]
	fn test_fs_fallback_roundtrip() {
		let file = Tim2File {
			format: ContainerFormat::FsTim2,
			version: 4,
			alignment: Alignment::Align16,
			pictures: vec![indexed8_picture()],
		};

		let bytes = file.to_bytes().unwrap();
		// No magic tag: the first field is the picture's total size.
		assert_ne!(&bytes[0..4], TIM2_MAGIC);
		assert_eq!(Tim2File::sniff(&bytes), Some(ContainerFormat::FsTim2));

		let back = Tim2File::from_bytes(&bytes).unwrap();
		assert_eq!(back.format, ContainerFormat::FsTim2);
		assert_eq!(back.version, 4);
		assert_eq!(back.pictures, file.pictures);
	}


	#[test]
	fn test_fs_rejects_multiple_pictures() {
		let file = Tim2File {
			format: ContainerFormat::FsTim2,
			pictures: vec![indexed8_picture(), indexed8_picture()],
			..Tim2File::default()
		};

		assert!(matches!(file.to_bytes(), Err(FsPictureCount(2))));
	}


	#[test]
	fn test_legacy_tim_is_read_only() {
		let file = Tim2File {
			format: ContainerFormat::Tim,
			pictures: vec![indexed8_picture()],
			..Tim2File::default()
		};

		assert!(matches!(file.to_bytes(), Err(LegacyTimWriteUnsupported)));
	}


	#[test]
	fn test_sniff_rejects_garbage() {
		let data = [0xFFu8; 64];
		assert_eq!(Tim2File::sniff(&data), None);
		assert!(matches!(Tim2File::from_bytes(&data), Err(UnknownContainerFormat)));
	}


	#[test]
	fn test_unknown_alignment_id() {
		let mut bytes = Tim2File {
			format: ContainerFormat::Tim2,
			version: 4,
			alignment: Alignment::Align16,
			pictures: vec![],
		}.to_bytes().unwrap();

		bytes[5] = 2;
		assert!(matches!(Tim2File::from_bytes(&bytes), Err(UnknownAlignmentId(2))));
	}
}
