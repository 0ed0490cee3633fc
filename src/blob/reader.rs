use super::{BlobError, BUFFER_ALIGN, HEADER_SIZE, MAGIC};
use byteorder::{ByteOrder, LittleEndian};
use bytemuck::Pod;
use std::path::Path;

// Payload storage backed by u128 so the base address is 16-byte aligned and
// typed views can be materialized with bytemuck.
struct AlignedBytes {
	storage: Vec<u128>,
	len: usize,
}

impl AlignedBytes {
	fn from_slice(bytes: &[u8]) -> Self {
		let mut storage = vec![0u128; bytes.len().div_ceil(16)];
		bytemuck::cast_slice_mut::<u128, u8>(&mut storage)[..bytes.len()].copy_from_slice(bytes);
		Self { storage, len: bytes.len() }
	}

	fn as_slice(&self) -> &[u8] {
		&bytemuck::cast_slice(&self.storage)[..self.len]
	}
}

/// A loaded blob: parsed header plus the payload in aligned storage.
///
/// The payload keeps its offsets relative; dereference goes through
/// [`BlobView`], which validates bounds and alignment per access.
pub struct Blob {
	payload: AlignedBytes,
	type_tag: u64,
	version: u64,
	root_offset: u64,
}

impl Blob {
	pub fn read(path: impl AsRef<Path>) -> Result<Self, BlobError> {
		let bytes = std::fs::read(path)?;
		Self::from_bytes(&bytes)
	}

	pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlobError> {
		if bytes.len() < HEADER_SIZE {
			return Err(BlobError::Corrupt("shorter than header"));
		}
		if bytes[0..4] != MAGIC {
			return Err(BlobError::Corrupt("bad magic"));
		}

		let type_tag = LittleEndian::read_u64(&bytes[4..12]);
		let version = LittleEndian::read_u64(&bytes[12..20]);
		let payload_size = LittleEndian::read_u64(&bytes[20..28]);
		let root_offset = LittleEndian::read_u64(&bytes[28..36]);

		let payload = &bytes[HEADER_SIZE..];
		if payload.len() as u64 != payload_size {
			return Err(BlobError::Corrupt("payload size mismatch"));
		}
		if root_offset > payload_size {
			return Err(BlobError::Corrupt("root offset out of bounds"));
		}

		Ok(Self {
			payload: AlignedBytes::from_slice(payload),
			type_tag,
			version,
			root_offset,
		})
	}

	pub fn type_tag(&self) -> u64 {
		self.type_tag
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn root_offset(&self) -> u64 {
		self.root_offset
	}

	/// Hard gate on data type and version, per-type version tags are part of
	/// the on-disk contract.
	pub fn expect(&self, type_tag: u64, version: u64) -> Result<(), BlobError> {
		if self.type_tag != type_tag {
			return Err(BlobError::TypeMismatch { found: self.type_tag, expected: type_tag });
		}
		if self.version != version {
			return Err(BlobError::VersionMismatch { found: self.version, expected: version });
		}
		Ok(())
	}

	pub fn view(&self) -> BlobView<'_> {
		BlobView { payload: self.payload.as_slice(), root_offset: self.root_offset }
	}
}

/// Borrowed, checked access into a blob payload.
#[derive(Clone, Copy)]
pub struct BlobView<'a> {
	payload: &'a [u8],
	root_offset: u64,
}

impl<'a> BlobView<'a> {
	pub fn len(&self) -> usize {
		self.payload.len()
	}

	pub fn is_empty(&self) -> bool {
		self.payload.is_empty()
	}

	pub fn root<T: Pod>(&self) -> Result<&'a T, BlobError> {
		self.pod(self.root_offset)
	}

	pub fn pod<T: Pod>(&self, offset: u64) -> Result<&'a T, BlobError> {
		let bytes = self.range(offset, std::mem::size_of::<T>() as u64)?;
		self.check_align(offset, std::mem::align_of::<T>())?;
		Ok(bytemuck::from_bytes(bytes))
	}

	/// A typed buffer at an embedded pointer offset. Bulk buffers are
	/// 16-aligned by the writer; violation is a corrupt asset.
	pub fn slice<T: Pod>(&self, offset: u64, count: u64) -> Result<&'a [T], BlobError> {
		if count == 0 {
			return Ok(&[]);
		}
		let bytes = self.range(offset, count * std::mem::size_of::<T>() as u64)?;
		self.check_align(offset, BUFFER_ALIGN)?;
		Ok(bytemuck::cast_slice(bytes))
	}

	pub fn bytes(&self, offset: u64, len: u64) -> Result<&'a [u8], BlobError> {
		self.range(offset, len)
	}

	pub fn str_bytes(&self, offset: u64, len: u64) -> Result<&'a str, BlobError> {
		let bytes = self.range(offset, len)?;
		std::str::from_utf8(bytes).map_err(|_| BlobError::Corrupt("embedded string is not utf-8"))
	}

	fn range(&self, offset: u64, len: u64) -> Result<&'a [u8], BlobError> {
		let end = offset.checked_add(len).ok_or(BlobError::Corrupt("offset overflow"))?;
		if end > self.payload.len() as u64 {
			return Err(BlobError::Corrupt("offset out of bounds"));
		}
		Ok(&self.payload[offset as usize..end as usize])
	}

	fn check_align(&self, offset: u64, align: usize) -> Result<(), BlobError> {
		if offset % align as u64 != 0 {
			return Err(BlobError::Alignment { offset, align });
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::blob::{type_tag, BlobWriter};

	fn sample_blob() -> Vec<u8> {
		let mut writer = BlobWriter::new();
		writer.write_u32(3); // count
		writer.write_u32(0); // pad
		let promise = writer.promise_pointer();
		writer.commit_pod_buffer(promise, &[1.0f32, 2.0, 3.0]);
		writer.finish(type_tag(b"testblob"), 7, 0)
	}

	#[test]
	fn round_trip() {
		let bytes = sample_blob();
		let blob = Blob::from_bytes(&bytes).unwrap();
		blob.expect(type_tag(b"testblob"), 7).unwrap();

		let view = blob.view();
		let count = *view.pod::<u32>(0).unwrap();
		let offset = *view.pod::<u64>(8).unwrap();
		let values = view.slice::<f32>(offset, count as u64).unwrap();
		assert_eq!(values, &[1.0, 2.0, 3.0]);
	}

	#[test]
	fn truncation_is_corrupt() {
		let mut bytes = sample_blob();
		bytes.pop();
		assert!(matches!(Blob::from_bytes(&bytes), Err(BlobError::Corrupt(_))));
	}

	#[test]
	fn version_mismatch_is_hard_error() {
		let bytes = sample_blob();
		let blob = Blob::from_bytes(&bytes).unwrap();
		assert!(matches!(
			blob.expect(type_tag(b"testblob"), 8),
			Err(BlobError::VersionMismatch { found: 7, expected: 8 })
		));
	}

	#[test]
	fn out_of_bounds_offset_is_rejected() {
		let bytes = sample_blob();
		let blob = Blob::from_bytes(&bytes).unwrap();
		assert!(blob.view().slice::<f32>(1 << 40, 4).is_err());
	}

	#[test]
	fn misaligned_slice_is_rejected() {
		let bytes = sample_blob();
		let blob = Blob::from_bytes(&bytes).unwrap();
		assert!(matches!(
			blob.view().slice::<f32>(4, 1),
			Err(BlobError::Alignment { .. })
		));
	}
}
