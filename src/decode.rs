use crate::Tim2Result;
use crate::picture::Picture;
use crate::Tim2Error::*;

use image::RgbaImage;


/// Wrapper around [`Picture`] that decodes mip levels into [`image::RgbaImage`]
#[allow(missing_debug_implementations)]
#[derive(Clone)]
pub struct Tim2Decoder {
	picture: Picture,
}


impl Tim2Decoder {
	/// Create an instance of `Self` from a [`Picture`].
	pub fn with_picture(picture: Picture) -> Self {
		Self { picture }
	}


	/// The wrapped [`Picture`].
	pub fn picture(&self) -> &Picture {
		&self.picture
	}


	/// Decode mip level `level` (LV0 is the full-size image, LV1.. are
	/// [`Picture::mipmaps`]).
	///
	/// # Errors
	/// - [`MipmapIndexOutOfRange`]: `level` is outside of bounds of [`Picture::mipmaps`].
	///
	/// # Panics
	/// - If [`image::RgbaImage::from_vec`] fails.
	pub fn decode_level(&self, level: usize) -> Tim2Result<RgbaImage> {
		let pixels = if level == 0 {
			&self.picture.pixels
		}
		else {
			self.picture.mipmaps.get(level - 1).ok_or(MipmapIndexOutOfRange)?
		};

		let width = (self.picture.width >> level).max(1);
		let height = (self.picture.height >> level).max(1);

		let buffer: Vec<u8> = pixels
			.iter()
			.flat_map(|p| [p.color.r, p.color.g, p.color.b, p.color.a])
			.collect();

		Ok(RgbaImage::from_vec(width, height, buffer).unwrap())
	}


	/// Decode the first (full-size) level, see [`Tim2Decoder::decode_level`].
	///
	/// # Errors
	/// See [`Tim2Decoder::decode_level`].
	pub fn decode_first(&self) -> Tim2Result<RgbaImage> {
		self.decode_level(0)
	}
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Color, ColorType};
	use crate::raster::Pixel;


	#[test]
	fn test_decode_true_color() {
		let pixels: Vec<Pixel> = (0..8u8)
			.map(|i| Pixel::from_color(Color::new(i, i * 2, i * 3, 255)))
			.collect();

		let picture = Picture {
			width: 4,
			height: 2,
			image_color_type: ColorType::Rgba32,
			pixels,
			..Picture::default()
		};

		let decoder = Tim2Decoder::with_picture(picture);
		let image = decoder.decode_first().unwrap();

		assert_eq!(image.dimensions(), (4, 2));
		assert_eq!(image.get_pixel(3, 0).0, [3, 6, 9, 255]);
		assert_eq!(image.get_pixel(3, 1).0, [7, 14, 21, 255]);

		assert!(matches!(decoder.decode_level(1), Err(MipmapIndexOutOfRange)));
	}


	#[test]
	fn test_decode_mip_level() {
		let base: Vec<Pixel> = (0..16).map(|_| Pixel::from_color(Color::new(1, 2, 3, 255))).collect();
		let mip: Vec<Pixel> = (0..4).map(|_| Pixel::from_color(Color::new(9, 8, 7, 255))).collect();

		let picture = Picture {
			width: 4,
			height: 4,
			image_color_type: ColorType::Rgba32,
			pixels: base,
			mipmaps: vec![mip],
			..Picture::default()
		};

		let image = Tim2Decoder::with_picture(picture).decode_level(1).unwrap();
		assert_eq!(image.dimensions(), (2, 2));
		assert_eq!(image.get_pixel(0, 0).0, [9, 8, 7, 255]);
	}
}
