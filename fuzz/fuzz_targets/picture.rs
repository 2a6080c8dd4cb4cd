#![no_main]
use libfuzzer_sys::fuzz_target;
use arbitrary::{
	Arbitrary,
	Unstructured,
	Result as ArbitraryResult,
};
use ps2_tim2::{Alignment, Color, ColorType, Picture, Pixel};


#[derive(Debug, Copy, Clone, Arbitrary)]
pub enum ColorTypeFuzzer {
	Rgba16,
	Rgb24,
	Rgba32,
	Indexed4,
	Indexed8,
}

impl From<ColorTypeFuzzer> for ColorType {
	fn from(value: ColorTypeFuzzer) -> Self {
		use ColorTypeFuzzer::*;
		match value {
			Rgba16 => ColorType::Rgba16,
			Rgb24 => ColorType::Rgb24,
			Rgba32 => ColorType::Rgba32,
			Indexed4 => ColorType::Indexed4,
			Indexed8 => ColorType::Indexed8,
		}
	}
}


#[derive(Debug)]
struct PictureFuzzer {
	width: u32,
	height: u32,
	color_type: ColorType,
	clut_compound: bool,
	palette: Vec<Color>,
	pixels: Vec<Pixel>,
}

impl<'a> Arbitrary<'a> for PictureFuzzer {
	fn arbitrary(input: &mut Unstructured) -> ArbitraryResult<Self> {
		let color_type: ColorType = <ColorTypeFuzzer as Arbitrary>::arbitrary(input)?.into();

		// Kept small to avoid slow-unit fuzz artifacts; the format allows up
		// to 2^15.
		let width = 2u32.pow(input.int_in_range(0..=6)?);
		let height = 2u32.pow(input.int_in_range(0..=6)?);

		let clut_compound = match color_type {
			ColorType::Indexed4 => <bool as Arbitrary>::arbitrary(input)?,
			_ => color_type == ColorType::Indexed8,
		};

		let palette: Vec<Color> = if color_type.is_indexed() {
			(0..color_type.clut_color_count(clut_compound))
				.map(|_| <Color as Arbitrary>::arbitrary(input))
				.collect::<ArbitraryResult<_>>()?
		}
		else {
			vec![]
		};

		let index_span = match color_type {
			ColorType::Indexed4 => 16u8,
			ColorType::Indexed8 => 255,
			_ => 0,
		};

		let pixels: Vec<Pixel> = (0..width * height)
			.map(|_| {
				// Pixels are drawn in the normal form their color type
				// round-trips exactly: palette indices for indexed types,
				// the 16-bit lattice for RGBA16, opaque for RGB24.
				Ok(match color_type {
					ColorType::Indexed4 => {
						Pixel::from_index(input.int_in_range(0..=index_span - 1)?, &palette).unwrap()
					},
					ColorType::Indexed8 => {
						Pixel::from_index(input.int_in_range(0..=index_span)?, &palette).unwrap()
					},
					ColorType::Rgba16 => {
						Pixel::from_color(Color::from_rgba16(<u16 as Arbitrary>::arbitrary(input)?))
					},
					ColorType::Rgb24 => {
						let c = <Color as Arbitrary>::arbitrary(input)?;
						Pixel::from_color(Color::new(c.r, c.g, c.b, 255))
					},
					_ => Pixel::from_color(<Color as Arbitrary>::arbitrary(input)?),
				})
			})
			.collect::<ArbitraryResult<_>>()?;

		Ok(Self { width, height, color_type, clut_compound, palette, pixels })
	}
}

impl From<PictureFuzzer> for Picture {
	fn from(value: PictureFuzzer) -> Self {
		Picture {
			width: value.width,
			height: value.height,
			image_color_type: value.color_type,
			clut_color_type: if value.color_type.is_indexed() { ColorType::Rgba32 } else { ColorType::None },
			clut_compound: value.clut_compound,
			pixels: value.pixels,
			palette: value.palette,
			..Picture::default()
		}
	}
}


fuzz_target!(|picture: PictureFuzzer| {
	let picture: Picture = picture.into();
	let bytes = picture.to_bytes(Alignment::Align16).unwrap();
	let mut cursor = std::io::Cursor::new(&bytes);
	let back = Picture::read_from(&mut cursor, Alignment::Align16).unwrap();

	assert_eq!(picture.width, back.width);
	assert_eq!(picture.height, back.height);
	assert_eq!(picture.image_color_type, back.image_color_type);
	assert_eq!(picture.palette, back.palette);
	assert_eq!(picture.pixels, back.pixels);
});
