//! Position-independent binary blobs.
//!
//! A blob is a header followed by a payload in which every non-POD pointer is
//! a little-endian u64 offset relative to the payload start. Offsets stay
//! relative after loading and are resolved through [`BlobView`] accessors,
//! which check bounds and alignment at dereference time. The loaded buffer is
//! therefore relocatable and may be shared between readers.

pub mod reader;
pub mod writer;

pub use reader::{Blob, BlobView};
pub use writer::{BlobWriter, Promise};

use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"BLOB";
/// Bulk buffers start at multiples of this within the payload.
pub const BUFFER_ALIGN: usize = 16;
/// magic(4) + type(8) + version(8) + payload size(8) + root offset(8), padded.
pub const HEADER_SIZE: usize = 48;

#[derive(Debug, Error)]
pub enum BlobError {
	/// IO error while reading or writing a blob file.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// Structurally invalid blob: bad magic, truncation, out-of-bounds offset.
	#[error("corrupt blob: {0}")]
	Corrupt(&'static str),

	/// The stored version tag does not match the reader's.
	#[error("blob version mismatch: found {found}, expected {expected}")]
	VersionMismatch { found: u64, expected: u64 },

	/// An embedded pointer violates its alignment requirement.
	#[error("misaligned blob offset {offset:#x} (requires {align}-byte alignment)")]
	Alignment { offset: u64, align: usize },

	/// The stored type tag names a different data type.
	#[error("blob type mismatch: found {found:#x}, expected {expected:#x}")]
	TypeMismatch { found: u64, expected: u64 },
}

/// Packs an 8-character ASCII tag into the header's type field.
pub const fn type_tag(tag: &[u8; 8]) -> u64 {
	u64::from_le_bytes(*tag)
}

/// Renders a type tag back to its ASCII form for file-system paths.
pub fn type_tag_str(tag: u64) -> String {
	tag.to_le_bytes().iter().map(|&b| b as char).collect()
}

/// FNV-1a over a name. Stable asset/material identity across runs.
pub fn fnv1a64(name: &str) -> u64 {
	let mut hash: u64 = 0xcbf29ce484222325;
	for byte in name.as_bytes() {
		hash ^= *byte as u64;
		hash = hash.wrapping_mul(0x100000001b3);
	}
	hash
}

/// 32-bit fold of [`fnv1a64`], used where metadata stores compact hashes.
pub fn fnv1a32(name: &str) -> u32 {
	let h = fnv1a64(name);
	(h ^ (h >> 32)) as u32
}
