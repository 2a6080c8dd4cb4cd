use crate::macros;

use crate::{Alignment, Color, ColorType, ContainerFormat, Tim2File, Tim2Result};
use crate::gstex::{ClutPixelStorageMode, ClutStorageMode, ColorComponent, GsTex, PixelStorageMode};
use crate::normalize::{self, NeuQuantizer, Quantizer, SourceImage};
use crate::picture::Picture;
use crate::Tim2Error::*;

use image::RgbaImage;


/// Wrapper around [`TextureEncodingSettings`] that encodes an
/// [`image::RgbaImage`] into a [`Tim2File`]
///
/// [`RgbaImage`]: [image::RgbaImage]
#[allow(missing_debug_implementations)]
#[derive(Clone)]
pub struct Tim2Encoder {
	image: RgbaImage,
	settings: TextureEncodingSettings,
}


impl Tim2Encoder {
	/// Creates a new encoder from an [`image::RgbaImage`] and
	/// [`TextureEncodingSettings`].
	pub fn with_image_and_settings(image: RgbaImage, settings: TextureEncodingSettings) -> Self {
		Self { image, settings }
	}


	/// Encode with the default [`NeuQuantizer`], see
	/// [`Tim2Encoder::encode_with_quantizer`].
	///
	/// # Errors
	/// See [`Tim2Encoder::encode_with_quantizer`].
	pub fn encode(&self) -> Tim2Result<Tim2File> {
		self.encode_with_quantizer(&NeuQuantizer::default())
	}


	/// Normalize the input image to the target color type and build a
	/// single-picture container.
	///
	/// # Errors
	/// - [`InvalidDimensions`]: width or height is not a power of two in
	///   1..=32768.
	/// - [`InvalidClutColorType`]: the settings declare an indexed target
	///   with an indexed or [`ColorType::None`] CLUT color type.
	/// - other: errors of the supplied quantizer.
	pub fn encode_with_quantizer(&self, quantizer: &dyn Quantizer) -> Tim2Result<Tim2File> {
		let settings = &self.settings;
		let (width, height) = self.image.dimensions();

		if width.count_ones() != 1 || height.count_ones() != 1 || width > 32768 || height > 32768 {
			return Err(InvalidDimensions(width, height));
		};

		if settings.color_type.is_indexed() && settings.clut_color_type.bytes_per_color() == 0 {
			return Err(InvalidClutColorType(settings.clut_color_type));
		};

		let mut source = SourceImage::from(&self.image);

		// 4-bit pixels can only address 16 entries, so quantization always
		// targets 16 colors; a compounded CLUT pads out to 32 afterwards.
		let target_colors = match settings.color_type {
			ColorType::Indexed4 => 16,
			color_type => color_type.clut_color_count(settings.clut_compound),
		};

		macros::log!(
			trace,
			"Tim2Encoder::encode: {}x{} -> {:?}, {} CLUT colors",
			width, height, settings.color_type, target_colors
		);

		normalize::normalize(&mut source, target_colors, quantizer)?;

		let indexed = settings.color_type.is_indexed();

		if indexed {
			let clut_color_count = settings.color_type.clut_color_count(settings.clut_compound);
			source.palette.resize(clut_color_count, Color::TRANSPARENT_BLACK);
		};
		let clut_color_type = if indexed { settings.clut_color_type } else { ColorType::None };

		let has_alpha = if indexed {
			clut_color_type.has_alpha()
		}
		else {
			settings.color_type.has_alpha()
		};

		let gstex = GsTex {
			pixel_storage_mode: PixelStorageMode::for_color_type(settings.color_type),
			width_log2: width.trailing_zeros() as u8,
			height_log2: height.trailing_zeros() as u8,
			color_component: if has_alpha { ColorComponent::Rgba } else { ColorComponent::Rgb },
			texture_function: settings.texture_function,
			clut_pixel_storage_mode: ClutPixelStorageMode::for_color_type(clut_color_type),
			clut_storage_mode: ClutStorageMode::Csm1,
			clut_load_control: if indexed { 1 } else { 0 },
			..GsTex::default()
		};

		let picture = Picture {
			gstex,
			width,
			height,
			image_color_type: settings.color_type,
			clut_color_type,
			clut_compound: settings.clut_compound,
			pixels: source.pixels,
			palette: source.palette,
			..Picture::default()
		};

		Ok(Tim2File {
			format: settings.format,
			version: settings.version,
			alignment: settings.alignment,
			pictures: vec![picture],
		})
	}
}


/// Steps applied to an RGBA image when converting to TIM2
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TextureEncodingSettings {
	/// Image color type of the output picture.
	pub color_type: ColorType,
	/// CLUT color type for indexed targets; ignored for true-color ones.
	pub clut_color_type: ColorType,
	/// Store a 32-entry compounded CLUT for 4-bit targets.
	pub clut_compound: bool,
	/// Container variant to emit.
	pub format: ContainerFormat,
	/// Container format version byte.
	pub version: u8,
	/// Segment alignment boundary.
	pub alignment: Alignment,
	/// Raw TFX value for the register set; semantics opaque to the codec.
	pub texture_function: u8,
}


impl Default for TextureEncodingSettings {
	fn default() -> Self {
		Self {
			color_type: ColorType::Rgba32,
			clut_color_type: ColorType::Rgba32,
			clut_compound: false,
			format: ContainerFormat::Tim2,
			version: 4,
			alignment: Alignment::Align16,
			texture_function: 0,
		}
	}
}


impl TextureEncodingSettings {
	/// The settings every FromSoftware-variant file uses: version 4, one
	/// picture, 16-byte alignment.
	pub fn fs_with_color_type(color_type: ColorType) -> Self {
		Self {
			color_type,
			clut_compound: color_type == ColorType::Indexed4,
			format: ContainerFormat::FsTim2,
			..Self::default()
		}
	}
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::decode::Tim2Decoder;


	fn gradient_image(width: u32, height: u32) -> RgbaImage {
		RgbaImage::from_fn(width, height, |x, y| {
			image::Rgba([(x * 8 % 256) as u8, (y * 8 % 256) as u8, 0, 255])
		})
	}


	#[test]
	fn test_encode_true_color_roundtrip() {
		let image = gradient_image(16, 16);
		let encoder = Tim2Encoder::with_image_and_settings(image.clone(), TextureEncodingSettings::default());

		let file = encoder.encode().unwrap();
		assert_eq!(file.pictures.len(), 1);
		assert_eq!(file.pictures[0].image_color_type, ColorType::Rgba32);
		assert!(file.pictures[0].palette.is_empty());

		let back = Tim2Decoder::with_picture(file.pictures[0].clone()).decode_first().unwrap();
		assert_eq!(back, image);
	}


	#[test]
	fn test_encode_indexed8() {
		let image = gradient_image(16, 16);
		let settings = TextureEncodingSettings {
			color_type: ColorType::Indexed8,
			..TextureEncodingSettings::default()
		};

		let file = Tim2Encoder::with_image_and_settings(image, settings).encode().unwrap();
		let picture = &file.pictures[0];

		assert_eq!(picture.image_color_type, ColorType::Indexed8);
		assert_eq!(picture.clut_color_type, ColorType::Rgba32);
		assert_eq!(picture.palette.len(), 256);
		assert!(picture.pixels.iter().all(|p| p.index >= 0));
		assert_eq!(picture.gstex.pixel_storage_mode, PixelStorageMode::Psmt8);
	}


	#[test]
	fn test_encode_indexed4_compound_serializes() {
		let image = gradient_image(16, 16);
		let settings = TextureEncodingSettings::fs_with_color_type(ColorType::Indexed4);

		let file = Tim2Encoder::with_image_and_settings(image, settings).encode().unwrap();
		let picture = &file.pictures[0];

		// 4-bit indices address only the first 16 entries of the 32-entry
		// compounded palette.
		assert_eq!(picture.palette.len(), 32);
		assert!(picture.pixels.iter().all(|p| (0..16).contains(&p.index)));
		assert!(picture.palette[16..].iter().all(|c| *c == Color::TRANSPARENT_BLACK));

		let bytes = file.to_bytes().unwrap();
		let back = crate::Tim2File::from_bytes(&bytes).unwrap();
		assert_eq!(back.pictures[0].palette, picture.palette);
		assert_eq!(back.pictures[0].pixels, picture.pixels);
		assert!(back.pictures[0].clut_compound);
	}


	#[test]
	fn test_encode_rejects_non_power_of_two() {
		let image = gradient_image(20, 16);
		let result = Tim2Encoder::with_image_and_settings(image, TextureEncodingSettings::default()).encode();
		assert!(matches!(result, Err(InvalidDimensions(20, 16))));
	}


	#[test]
	fn test_fs_settings() {
		let settings = TextureEncodingSettings::fs_with_color_type(ColorType::Indexed4);
		assert_eq!(settings.format, ContainerFormat::FsTim2);
		assert_eq!(settings.version, 4);
		assert_eq!(settings.alignment, Alignment::Align16);
		assert!(settings.clut_compound);
	}
}
