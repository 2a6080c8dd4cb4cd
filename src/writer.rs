//! Append-only byte buffer with alignment padding and explicit
//! reserve-then-back-patch support for forward-referenced size fields.

use byteorder::{LittleEndian, ByteOrder};


#[derive(Debug, Default)]
pub(crate) struct PatchWriter {
	buf: Vec<u8>,
}


/// Offset of a reserved placeholder, to be filled by [`PatchWriter::patch_u32`].
#[derive(Debug, Clone, Copy)]
#[must_use]
pub(crate) struct Patch(usize);


impl PatchWriter {
	pub fn new() -> Self {
		Self::default()
	}


	pub fn position(&self) -> usize {
		self.buf.len()
	}


	pub fn extend(&mut self, bytes: &[u8]) {
		self.buf.extend_from_slice(bytes);
	}


	pub fn write_u8(&mut self, value: u8) {
		self.buf.push(value);
	}


	pub fn write_u16(&mut self, value: u16) {
		self.buf.extend(value.to_le_bytes());
	}


	pub fn write_u64(&mut self, value: u64) {
		self.buf.extend(value.to_le_bytes());
	}


	/// Zero-fill up to the next multiple of `boundary`.
	pub fn align_to(&mut self, boundary: usize) {
		let rem = self.buf.len() % boundary;

		if rem != 0 {
			self.buf.resize(self.buf.len() + boundary - rem, 0);
		};
	}


	/// Reserve a zeroed 4-byte placeholder and record its offset.
	pub fn reserve_u32(&mut self) -> Patch {
		let patch = Patch(self.buf.len());
		self.buf.extend([0u8; 4]);
		patch
	}


	/// Fill a placeholder previously handed out by [`reserve_u32`][Self::reserve_u32].
	pub fn patch_u32(&mut self, patch: Patch, value: u32) {
		LittleEndian::write_u32(&mut self.buf[patch.0..patch.0 + 4], value);
	}


	pub fn into_inner(self) -> Vec<u8> {
		self.buf
	}
}


#[test]
fn test_patch_writer() {
	let mut w = PatchWriter::new();
	let size = w.reserve_u32();
	w.extend(b"abc");
	w.align_to(8);
	assert_eq!(w.position(), 8);
	w.patch_u32(size, 0xAABBCCDD);

	let bytes = w.into_inner();
	assert_eq!(bytes, vec![0xDD, 0xCC, 0xBB, 0xAA, b'a', b'b', b'c', 0x00]);
}
