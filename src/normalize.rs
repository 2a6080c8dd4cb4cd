//! Palette normalization for re-encoding edited interchange images.
//!
//! A decoded picture leaves this library as an 8-bit RGBA carrier with an
//! optional index channel.  On the way back in, the edited image rarely
//! matches the target texture's declared bit depth exactly; this layer
//! reuses, zero-extends, or quantizes the palette so that the picture codec
//! invariants hold.  Color reduction itself is delegated through the
//! [`Quantizer`] trait.

use image::RgbaImage;

use crate::{Color, Tim2Result};
use crate::raster::Pixel;
use crate::macros;


/// The interchange-image boundary type: flat RGBA pixels with an optional
/// index channel and palette.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SourceImage {
	/// Width in pixels.
	pub width: u32,
	/// Height in pixels.
	pub height: u32,
	/// Flat pixel buffer, row-major.
	pub pixels: Vec<Pixel>,
	/// Palette the pixel indices resolve into; empty for true-color images.
	pub palette: Vec<Color>,
}


impl SourceImage {
	/// An image is indexed only if every pixel carries a palette index.
	pub fn is_indexed(&self) -> bool {
		!self.palette.is_empty() && self.pixels.iter().all(|p| p.index >= 0)
	}
}


impl From<&RgbaImage> for SourceImage {
	fn from(image: &RgbaImage) -> Self {
		Self {
			width: image.width(),
			height: image.height(),
			pixels: image.pixels().map(|p| Pixel::from_color(Color::from(*p))).collect(),
			palette: vec![],
		}
	}
}


/// Black-box palette reduction.
///
/// Implementations receive the pixel buffer and a maximum color count and
/// must return a palette of EXACTLY `max_colors` entries (padded with
/// transparent black when fewer distinct colors exist) plus one palette
/// index per input pixel.
pub trait Quantizer {
	/// Reduce `pixels` to at most `max_colors` colors.
	///
	/// # Errors
	/// Implementation-defined.
	fn quantize(&self, pixels: &[Pixel], max_colors: usize) -> Tim2Result<(Vec<Color>, Vec<u8>)>;
}


/// Default [`Quantizer`] over the NeuQuant neural network quantizer.
#[derive(Debug, Clone, Copy)]
pub struct NeuQuantizer {
	/// NeuQuant sampling factor, 1 (every pixel, slowest) to 30.
	pub sample_faction: i32,
}


impl Default for NeuQuantizer {
	fn default() -> Self {
		Self { sample_faction: 1 }
	}
}


impl Quantizer for NeuQuantizer {
	fn quantize(&self, pixels: &[Pixel], max_colors: usize) -> Tim2Result<(Vec<Color>, Vec<u8>)> {
		let rgba: Vec<u8> = pixels
			.iter()
			.flat_map(|p| [p.color.r, p.color.g, p.color.b, p.color.a])
			.collect();

		let quant = color_quant::NeuQuant::new(self.sample_faction, max_colors, &rgba);

		let mut palette: Vec<Color> = quant
			.color_map_rgba()
			.chunks_exact(4)
			.map(|c| Color::new(c[0], c[1], c[2], c[3]))
			.collect();
		palette.truncate(max_colors);
		palette.resize(max_colors, Color::TRANSPARENT_BLACK);

		let indices: Vec<u8> = rgba
			.chunks_exact(4)
			.map(|c| quant.index_of(c) as u8)
			.collect();

		Ok((palette, indices))
	}
}


/// Fit `source` to a target palette size.  `target_colors == 0` means the
/// target is true-color and nothing happens.  An indexed source whose
/// palette already has the target size is reused verbatim; a strictly
/// smaller palette is zero-extended with transparent black; anything else
/// goes through `quantizer` and every pixel is remapped.
pub fn normalize(source: &mut SourceImage, target_colors: usize, quantizer: &dyn Quantizer) -> Tim2Result<()> {
	if target_colors == 0 {
		return Ok(());
	};

	if source.is_indexed() {
		if source.palette.len() == target_colors {
			return Ok(());
		};

		if source.palette.len() < target_colors {
			macros::log!(trace, "normalize: zero-extending palette {} -> {}", source.palette.len(), target_colors);
			source.palette.resize(target_colors, Color::TRANSPARENT_BLACK);
			return Ok(());
		};
	};

	macros::log!(trace, "normalize: quantizing {} pixels to {} colors", source.pixels.len(), target_colors);

	let (palette, indices) = quantizer.quantize(&source.pixels, target_colors)?;

	source.pixels = indices
		.iter()
		.map(|&i| Pixel::from_index(i, &palette))
		.collect::<Tim2Result<Vec<Pixel>>>()?;
	source.palette = palette;

	Ok(())
}


#[cfg(test)]
mod tests {
	use super::*;


	fn indexed_source(color_count: usize) -> SourceImage {
		let palette: Vec<Color> = (0..color_count)
			.map(|i| Color::new((i % 256) as u8, ((i * 3) % 256) as u8, 0, 255))
			.collect();

		let pixels: Vec<Pixel> = (0..256)
			.map(|i| Pixel::from_index((i % color_count.min(256)) as u8, &palette).unwrap())
			.collect();

		SourceImage { width: 16, height: 16, pixels, palette }
	}


	#[test]
	fn test_true_color_target_is_noop() {
		let mut source = indexed_source(256);
		let before = source.clone();
		normalize(&mut source, 0, &NeuQuantizer::default()).unwrap();
		assert_eq!(source, before);
	}


	#[test]
	fn test_same_size_palette_reused() {
		let mut source = indexed_source(16);
		let before = source.clone();
		normalize(&mut source, 16, &NeuQuantizer::default()).unwrap();
		assert_eq!(source, before);
	}


	#[test]
	fn test_smaller_palette_zero_extended() {
		let mut source = indexed_source(16);
		let palette_before = source.palette.clone();
		normalize(&mut source, 32, &NeuQuantizer::default()).unwrap();

		assert_eq!(source.palette.len(), 32);
		assert_eq!(source.palette[..16], palette_before[..]);
		assert!(source.palette[16..].iter().all(|c| *c == Color::TRANSPARENT_BLACK));
	}


	#[test]
	fn test_larger_palette_quantized() {
		// A 256-color picture re-encoded into a 16-color target.
		let mut source = indexed_source(256);
		normalize(&mut source, 16, &NeuQuantizer::default()).unwrap();

		assert_eq!(source.palette.len(), 16);
		assert!(source.pixels.iter().all(|p| (0..16).contains(&p.index)));
		for pixel in &source.pixels {
			assert_eq!(pixel.color, source.palette[pixel.index as usize]);
		};
	}


	#[test]
	fn test_true_color_source_quantized() {
		let pixels: Vec<Pixel> = (0..64u8)
			.map(|i| Pixel::from_color(Color::new(i * 4, 255 - i * 4, 0, 255)))
			.collect();
		let mut source = SourceImage { width: 8, height: 8, pixels, palette: vec![] };

		normalize(&mut source, 16, &NeuQuantizer::default()).unwrap();
		assert_eq!(source.palette.len(), 16);
		assert!(source.is_indexed());
	}
}
