use super::{BUFFER_ALIGN, HEADER_SIZE, MAGIC};
use byteorder::{LittleEndian, WriteBytesExt};
use bytemuck::Pod;

/// A recorded relocation site awaiting its pointee.
///
/// Created by [`BlobWriter::promise_pointer`]; consumed exactly once by
/// `commit_buffer` or `commit_null`.
#[must_use]
pub struct Promise {
	site: usize,
}

/// Streaming writer for the blob payload.
///
/// Pointer fields are written as placeholders and patched once the pointee
/// is appended, so structures can be emitted before the buffers they
/// reference. All offsets are relative to the payload start; a zero offset is
/// null (the root record occupies offset zero, so no pointee can land there).
pub struct BlobWriter {
	bytes: Vec<u8>,
}

impl BlobWriter {
	pub fn new() -> Self {
		Self { bytes: Vec::new() }
	}

	/// Pre-reserves capacity, typically summed buffer sizes plus alignment
	/// slack.
	pub fn with_capacity(capacity: usize) -> Self {
		Self { bytes: Vec::with_capacity(capacity) }
	}

	pub fn cursor(&self) -> usize {
		self.bytes.len()
	}

	pub fn write_bytes(&mut self, bytes: &[u8]) {
		self.bytes.extend_from_slice(bytes);
	}

	pub fn write_pod<T: Pod>(&mut self, value: &T) {
		self.bytes.extend_from_slice(bytemuck::bytes_of(value));
	}

	pub fn write_u32(&mut self, value: u32) {
		self.bytes.write_u32::<LittleEndian>(value).unwrap();
	}

	pub fn write_u64(&mut self, value: u64) {
		self.bytes.write_u64::<LittleEndian>(value).unwrap();
	}

	pub fn write_f32(&mut self, value: f32) {
		self.bytes.write_f32::<LittleEndian>(value).unwrap();
	}

	/// Records the current cursor as a relocation site and emits an 8-byte
	/// placeholder.
	pub fn promise_pointer(&mut self) -> Promise {
		let site = self.cursor();
		self.write_u64(0);
		Promise { site }
	}

	/// Pads to `align`, appends the pointee bytes and patches the promised
	/// site with the pointee's offset.
	pub fn commit_buffer(&mut self, promise: Promise, bytes: &[u8], align: usize) {
		debug_assert!(align.is_power_of_two());

		self.pad_to(align);
		let offset = self.cursor() as u64;
		self.bytes.extend_from_slice(bytes);

		self.bytes[promise.site..promise.site + 8].copy_from_slice(&offset.to_le_bytes());
	}

	/// Commits a typed buffer at the default 16-byte alignment.
	pub fn commit_pod_buffer<T: Pod>(&mut self, promise: Promise, values: &[T]) {
		self.commit_buffer(promise, bytemuck::cast_slice(values), BUFFER_ALIGN);
	}

	/// Leaves the promised pointer null.
	pub fn commit_null(&mut self, promise: Promise) {
		let _ = promise;
	}

	fn pad_to(&mut self, align: usize) {
		while self.bytes.len() % align != 0 {
			self.bytes.push(0);
		}
	}

	/// Prepends the header and returns the finished blob bytes.
	pub fn finish(self, type_tag: u64, version: u64, root_offset: u64) -> Vec<u8> {
		let mut out = Vec::with_capacity(HEADER_SIZE + self.bytes.len());
		out.extend_from_slice(&MAGIC);
		out.write_u64::<LittleEndian>(type_tag).unwrap();
		out.write_u64::<LittleEndian>(version).unwrap();
		out.write_u64::<LittleEndian>(self.bytes.len() as u64).unwrap();
		out.write_u64::<LittleEndian>(root_offset).unwrap();
		out.resize(HEADER_SIZE, 0);
		out.extend_from_slice(&self.bytes);
		out
	}
}

impl Default for BlobWriter {
	fn default() -> Self {
		Self::new()
	}
}
