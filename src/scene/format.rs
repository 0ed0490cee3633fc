//! Persisted layout of the scene meta and geometry blobs.
//!
//! All structs are Pod with explicit padding so they can be embedded in
//! blobs directly. Offset fields are payload-relative, written through the
//! blob writer's pointer promises.

use crate::blob::type_tag;
use crate::math::{Aabb, BoundingSphere, Vec3};
use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

pub const META_TYPE_TAG: u64 = type_tag(b"scenemta");
pub const META_VERSION: u64 = 2;

pub const GEOMETRY_TYPE_TAG: u64 = type_tag(b"scenegeo");
pub const GEOMETRY_VERSION: u64 = 2;

pub const INDEX_TYPE_U16: u32 = 0;
pub const INDEX_TYPE_U32: u32 = 1;

bitflags! {
	#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
	pub struct AttributeFlags: u32 {
		const HAS_NORMALS = 1 << 0;
		const HAS_TANGENTS = 1 << 1;
		const HAS_UVS = 1 << 2;
	}
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraMeta {
	pub position: Vec3,
	pub focal_length: f32,
	pub right: Vec3,
	pub sensor_width: f32,
	pub up: Vec3,
	pub sensor_height: f32,
	pub forward: Vec3,
	pub focus_distance: f32,
}

/// Root record of the meta blob, at payload offset zero.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SceneMetaHeader {
	pub materials_offset: u64,
	pub texture_names_offset: u64,
	pub mesh_meta_offset: u64,
	pub curve_meta_offset: u64,
	pub material_count: u32,
	pub texture_count: u32,
	pub mesh_count: u32,
	pub curve_count: u32,
	pub camera: CameraMeta,
	pub aabb: Aabb,
	pub bounding_sphere: BoundingSphere,
	pub environment_radiance: Vec3,
	pub environment_texture: u32,
}

/// Embedded string reference in the texture-name array.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct TextureNameRecord {
	pub offset: u64,
	pub len: u64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MaterialRecord {
	pub base_color: Vec3,
	pub sigma_a: f32,
	pub emission: Vec3,
	pub sigma_s: f32,
	pub scalars: [f32; 12],
	pub shader: u32,
	pub flags: u32,
	pub hash: u32,
	pub albedo_texture: u32,
	pub normal_texture: u32,
	pub roughness_metallic_texture: u32,
	pub displacement_texture: u32,
	pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MeshMeta {
	pub material_hash: u32,
	pub indices_per_face: u32,
	pub index_type: u32,
	pub attribute_flags: u32,
	pub vertex_count: u32,
	pub index_count: u32,
	/// Base into the concatenated vertex buffers; indices are mesh-local.
	pub first_vertex: u32,
	/// Base into the index buffer selected by `index_type`.
	pub first_index: u32,
	pub first_face: u32,
	pub face_count: u32,
	pub aabb: Aabb,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CurveMeta {
	pub material_hash: u32,
	pub first_curve_index: u32,
	pub curve_index_count: u32,
	pub first_curve_vertex: u32,
	pub curve_vertex_count: u32,
	pub _pad: u32,
	pub aabb: Aabb,
}

/// Root record of the geometry blob.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GeometryHeader {
	pub indices16_offset: u64,
	pub indices32_offset: u64,
	pub face_index_counts_offset: u64,
	pub positions_offset: u64,
	pub normals_offset: u64,
	pub tangents_offset: u64,
	pub uvs_offset: u64,
	pub material_indices_offset: u64,
	pub curve_indices_offset: u64,
	pub curve_vertices_offset: u64,
	pub indices16_count: u32,
	pub indices32_count: u32,
	pub face_count: u32,
	pub vertex_count: u32,
	pub material_index_count: u32,
	pub curve_index_count: u32,
	pub curve_vertex_count: u32,
	pub _pad: u32,
}

#[cfg(test)]
mod tests {
	use super::*;

	// Struct sizes are part of the on-disk contract; a change here needs a
	// version bump.
	#[test]
	fn persisted_sizes_are_stable() {
		assert_eq!(std::mem::size_of::<CameraMeta>(), 64);
		assert_eq!(std::mem::size_of::<SceneMetaHeader>(), 168);
		assert_eq!(std::mem::size_of::<MaterialRecord>(), 112);
		assert_eq!(std::mem::size_of::<MeshMeta>(), 64);
		assert_eq!(std::mem::size_of::<CurveMeta>(), 48);
		assert_eq!(std::mem::size_of::<GeometryHeader>(), 112);
	}
}
