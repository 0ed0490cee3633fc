//! Bakes imported scene data into the on-disk meta and geometry blobs.

use crate::blob::{fnv1a32, fnv1a64, type_tag_str, BlobWriter};
use crate::math::{Aabb, Vec2, Vec3, Vec4};
use crate::scene::format::{
	AttributeFlags, CameraMeta, CurveMeta, GeometryHeader, MaterialRecord, MeshMeta,
	SceneMetaHeader, TextureNameRecord, GEOMETRY_TYPE_TAG, GEOMETRY_VERSION, INDEX_TYPE_U16,
	INDEX_TYPE_U32, META_TYPE_TAG, META_VERSION,
};
use crate::scene::{Camera, MaterialFlags, ShaderTag, NO_TEXTURE};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BakeError {
	/// IO failure while persisting baked outputs.
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),

	/// The imported model is internally inconsistent.
	#[error("invalid model: {0}")]
	InvalidModel(&'static str),

	/// Two materials hash to the same 32-bit identity.
	#[error("material hash collision between '{0}' and '{1}'")]
	HashCollision(String, String),
}

pub struct ImportedMaterial {
	pub name: String,
	pub base_color: Vec3,
	pub emission: Vec3,
	pub shader: ShaderTag,
	pub flags: MaterialFlags,
	pub scalars: [f32; 12],
	pub albedo_texture: Option<String>,
	pub normal_texture: Option<String>,
	pub roughness_metallic_texture: Option<String>,
	pub displacement_texture: Option<String>,
	pub sigma_a: f32,
	pub sigma_s: f32,
}

impl Default for ImportedMaterial {
	fn default() -> Self {
		let runtime = crate::scene::Material::default();
		Self {
			name: String::new(),
			base_color: runtime.base_color,
			emission: runtime.emission,
			shader: runtime.shader,
			flags: runtime.flags,
			scalars: runtime.scalars,
			albedo_texture: None,
			normal_texture: None,
			roughness_metallic_texture: None,
			displacement_texture: None,
			sigma_a: 0.0,
			sigma_s: 0.0,
		}
	}
}

pub struct ImportedMesh {
	pub material: String,
	pub positions: Vec<Vec3>,
	/// Empty or one per vertex.
	pub normals: Vec<Vec3>,
	pub tangents: Vec<Vec4>,
	pub uvs: Vec<Vec2>,
	/// Mesh-local indices.
	pub indices: Vec<u32>,
	pub indices_per_face: u32,
	/// Per-face material index into the model's material array.
	pub material_indices: Vec<u32>,
}

pub struct ImportedCurves {
	pub material: String,
	/// xyz + radius control points.
	pub control_points: Vec<Vec4>,
	pub first_vertex_indices: Vec<u32>,
}

pub struct ImportedModel {
	pub name: String,
	pub camera: Camera,
	pub materials: Vec<ImportedMaterial>,
	pub meshes: Vec<ImportedMesh>,
	pub curves: Vec<ImportedCurves>,
	pub environment_radiance: Vec3,
	pub environment_texture: Option<String>,
}

/// One baked artifact, the dependency-tracked unit the build pipeline
/// consumes.
pub struct BakedOutput {
	pub type_tag: u64,
	pub version: u64,
	pub name: String,
	pub bytes: Vec<u8>,
}

// Dedup-preserving texture-name table; slots refer into it by index.
struct TextureTable {
	names: Vec<String>,
	by_name: HashMap<String, u32>,
}

impl TextureTable {
	fn new() -> Self {
		Self { names: Vec::new(), by_name: HashMap::new() }
	}

	fn slot(&mut self, name: &Option<String>) -> u32 {
		let Some(name) = name else { return NO_TEXTURE };
		if let Some(&index) = self.by_name.get(name) {
			return index;
		}
		let index = self.names.len() as u32;
		self.names.push(name.clone());
		self.by_name.insert(name.clone(), index);
		index
	}
}

fn validate_model(model: &ImportedModel) -> Result<(), BakeError> {
	for mesh in &model.meshes {
		let vertex_count = mesh.positions.len();
		if mesh.indices_per_face != 3 && mesh.indices_per_face != 4 {
			return Err(BakeError::InvalidModel("indices per face must be 3 or 4"));
		}
		if mesh.indices.len() % mesh.indices_per_face as usize != 0 {
			return Err(BakeError::InvalidModel("index count not a multiple of face arity"));
		}
		if !mesh.normals.is_empty() && mesh.normals.len() != vertex_count {
			return Err(BakeError::InvalidModel("normal count does not match vertex count"));
		}
		if !mesh.tangents.is_empty() && mesh.tangents.len() != vertex_count {
			return Err(BakeError::InvalidModel("tangent count does not match vertex count"));
		}
		if !mesh.uvs.is_empty() && mesh.uvs.len() != vertex_count {
			return Err(BakeError::InvalidModel("uv count does not match vertex count"));
		}
		if mesh.indices.iter().any(|&i| i as usize >= vertex_count) {
			return Err(BakeError::InvalidModel("index out of vertex range"));
		}
		let face_count = mesh.indices.len() / mesh.indices_per_face as usize;
		if !mesh.material_indices.is_empty() && mesh.material_indices.len() != face_count {
			return Err(BakeError::InvalidModel("material index count does not match face count"));
		}
	}
	for curves in &model.curves {
		if curves.first_vertex_indices.iter().any(|&i| i as usize >= curves.control_points.len()) {
			return Err(BakeError::InvalidModel("curve index out of control-point range"));
		}
	}
	Ok(())
}

fn mesh_aabb(positions: &[Vec3]) -> Aabb {
	Aabb::from_points(positions.iter().copied())
}

/// Produces the meta and geometry blobs for a model.
pub fn bake_model(model: &ImportedModel) -> Result<Vec<BakedOutput>, BakeError> {
	validate_model(model)?;

	let mut textures = TextureTable::new();

	// Materials, hash-sorted so the runtime can binary search.
	let mut records: Vec<(String, MaterialRecord)> = model
		.materials
		.iter()
		.map(|material| {
			let record = MaterialRecord {
				base_color: material.base_color,
				sigma_a: material.sigma_a,
				emission: material.emission,
				sigma_s: material.sigma_s,
				scalars: material.scalars,
				shader: material.shader.to_u32(),
				flags: material.flags.bits(),
				hash: fnv1a32(&material.name),
				albedo_texture: textures.slot(&material.albedo_texture),
				normal_texture: textures.slot(&material.normal_texture),
				roughness_metallic_texture: textures.slot(&material.roughness_metallic_texture),
				displacement_texture: textures.slot(&material.displacement_texture),
				_pad: 0,
			};
			(material.name.clone(), record)
		})
		.collect();
	records.sort_by_key(|(_, record)| record.hash);
	for pair in records.windows(2) {
		if pair[0].1.hash == pair[1].1.hash {
			return Err(BakeError::HashCollision(pair[0].0.clone(), pair[1].0.clone()));
		}
	}

	let environment_texture = textures.slot(&model.environment_texture);

	// Concatenated geometry buffers with per-mesh ranges.
	let mut positions = Vec::new();
	let mut normals = Vec::new();
	let mut tangents = Vec::new();
	let mut uvs = Vec::new();
	let mut indices16: Vec<u16> = Vec::new();
	let mut indices32: Vec<u32> = Vec::new();
	let mut face_counts: Vec<u32> = Vec::new();
	let mut material_indices: Vec<u32> = Vec::new();
	let mut mesh_meta = Vec::with_capacity(model.meshes.len());

	let mut scene_aabb = Aabb::EMPTY;
	let mut any_normals = false;
	let mut any_tangents = false;
	let mut any_uvs = false;

	for mesh in &model.meshes {
		let vertex_count = mesh.positions.len() as u32;
		let face_count = mesh.indices.len() as u32 / mesh.indices_per_face;
		let aabb = mesh_aabb(&mesh.positions);
		scene_aabb = scene_aabb.union(aabb);

		let mut flags = AttributeFlags::empty();
		flags.set(AttributeFlags::HAS_NORMALS, !mesh.normals.is_empty());
		flags.set(AttributeFlags::HAS_TANGENTS, !mesh.tangents.is_empty());
		flags.set(AttributeFlags::HAS_UVS, !mesh.uvs.is_empty());
		any_normals |= !mesh.normals.is_empty();
		any_tangents |= !mesh.tangents.is_empty();
		any_uvs |= !mesh.uvs.is_empty();

		// Narrow indices where the mesh's vertex range allows it.
		let (index_type, first_index) = if vertex_count <= u16::MAX as u32 + 1 {
			let first = indices16.len() as u32;
			indices16.extend(mesh.indices.iter().map(|&i| i as u16));
			(INDEX_TYPE_U16, first)
		} else {
			let first = indices32.len() as u32;
			indices32.extend_from_slice(&mesh.indices);
			(INDEX_TYPE_U32, first)
		};

		mesh_meta.push(MeshMeta {
			material_hash: fnv1a32(&mesh.material),
			indices_per_face: mesh.indices_per_face,
			index_type,
			attribute_flags: flags.bits(),
			vertex_count,
			index_count: mesh.indices.len() as u32,
			first_vertex: positions.len() as u32,
			first_index,
			first_face: face_counts.len() as u32,
			face_count,
			aabb,
		});

		positions.extend_from_slice(&mesh.positions);
		if mesh.normals.is_empty() {
			normals.extend(std::iter::repeat(Vec3::ZERO).take(vertex_count as usize));
		} else {
			normals.extend_from_slice(&mesh.normals);
		}
		if mesh.tangents.is_empty() {
			tangents.extend(std::iter::repeat(Vec4::ZERO).take(vertex_count as usize));
		} else {
			tangents.extend_from_slice(&mesh.tangents);
		}
		if mesh.uvs.is_empty() {
			uvs.extend(std::iter::repeat(Vec2::ZERO).take(vertex_count as usize));
		} else {
			uvs.extend_from_slice(&mesh.uvs);
		}

		face_counts.extend(std::iter::repeat(mesh.indices_per_face).take(face_count as usize));
		if mesh.material_indices.is_empty() {
			material_indices.extend(std::iter::repeat(0).take(face_count as usize));
		} else {
			material_indices.extend_from_slice(&mesh.material_indices);
		}
	}

	let mut curve_indices: Vec<u32> = Vec::new();
	let mut curve_vertices: Vec<Vec4> = Vec::new();
	let mut curve_meta = Vec::with_capacity(model.curves.len());

	for curves in &model.curves {
		let aabb = Aabb::from_points(curves.control_points.iter().map(|cp| cp.truncate()));
		scene_aabb = scene_aabb.union(aabb);

		curve_meta.push(CurveMeta {
			material_hash: fnv1a32(&curves.material),
			first_curve_index: curve_indices.len() as u32,
			curve_index_count: curves.first_vertex_indices.len() as u32,
			first_curve_vertex: curve_vertices.len() as u32,
			curve_vertex_count: curves.control_points.len() as u32,
			_pad: 0,
			aabb,
		});

		curve_indices.extend_from_slice(&curves.first_vertex_indices);
		curve_vertices.extend_from_slice(&curves.control_points);
	}

	// Geometry-free models still need finite bounds.
	if scene_aabb.is_empty() {
		scene_aabb = Aabb::new(Vec3::ZERO, Vec3::ZERO);
	}

	// Geometry blob. Capacity is the summed buffer sizes plus alignment
	// slack per committed buffer.
	let geometry_bytes = std::mem::size_of::<GeometryHeader>()
		+ indices16.len() * 2
		+ indices32.len() * 4
		+ face_counts.len() * 4
		+ positions.len() * 12
		+ normals.len() * 12
		+ tangents.len() * 16
		+ uvs.len() * 8
		+ material_indices.len() * 4
		+ curve_indices.len() * 4
		+ curve_vertices.len() * 16
		+ 10 * 16;
	let mut writer = BlobWriter::with_capacity(geometry_bytes);

	let p_indices16 = writer.promise_pointer();
	let p_indices32 = writer.promise_pointer();
	let p_face_counts = writer.promise_pointer();
	let p_positions = writer.promise_pointer();
	let p_normals = writer.promise_pointer();
	let p_tangents = writer.promise_pointer();
	let p_uvs = writer.promise_pointer();
	let p_material_indices = writer.promise_pointer();
	let p_curve_indices = writer.promise_pointer();
	let p_curve_vertices = writer.promise_pointer();
	writer.write_u32(indices16.len() as u32);
	writer.write_u32(indices32.len() as u32);
	writer.write_u32(face_counts.len() as u32);
	writer.write_u32(positions.len() as u32);
	writer.write_u32(material_indices.len() as u32);
	writer.write_u32(curve_indices.len() as u32);
	writer.write_u32(curve_vertices.len() as u32);
	writer.write_u32(0);

	writer.commit_pod_buffer(p_indices16, &indices16);
	writer.commit_pod_buffer(p_indices32, &indices32);
	writer.commit_pod_buffer(p_face_counts, &face_counts);
	writer.commit_pod_buffer(p_positions, &positions);
	if any_normals {
		writer.commit_pod_buffer(p_normals, &normals);
	} else {
		writer.commit_null(p_normals);
	}
	if any_tangents {
		writer.commit_pod_buffer(p_tangents, &tangents);
	} else {
		writer.commit_null(p_tangents);
	}
	if any_uvs {
		writer.commit_pod_buffer(p_uvs, &uvs);
	} else {
		writer.commit_null(p_uvs);
	}
	writer.commit_pod_buffer(p_material_indices, &material_indices);
	writer.commit_pod_buffer(p_curve_indices, &curve_indices);
	writer.commit_pod_buffer(p_curve_vertices, &curve_vertices);

	let geometry_blob = writer.finish(GEOMETRY_TYPE_TAG, GEOMETRY_VERSION, 0);

	// Meta blob.
	let name_bytes: usize = textures.names.iter().map(|n| n.len()).sum();
	let meta_bytes = std::mem::size_of::<SceneMetaHeader>()
		+ records.len() * std::mem::size_of::<MaterialRecord>()
		+ textures.names.len() * std::mem::size_of::<TextureNameRecord>()
		+ name_bytes
		+ mesh_meta.len() * std::mem::size_of::<MeshMeta>()
		+ curve_meta.len() * std::mem::size_of::<CurveMeta>()
		+ 4 * 16;
	let mut writer = BlobWriter::with_capacity(meta_bytes);

	let p_materials = writer.promise_pointer();
	let p_texture_names = writer.promise_pointer();
	let p_mesh_meta = writer.promise_pointer();
	let p_curve_meta = writer.promise_pointer();
	writer.write_u32(records.len() as u32);
	writer.write_u32(textures.names.len() as u32);
	writer.write_u32(mesh_meta.len() as u32);
	writer.write_u32(curve_meta.len() as u32);
	writer.write_pod(&CameraMeta {
		position: model.camera.position,
		focal_length: model.camera.focal_length,
		right: model.camera.right,
		sensor_width: model.camera.sensor_width,
		up: model.camera.up,
		sensor_height: model.camera.sensor_height,
		forward: model.camera.forward,
		focus_distance: model.camera.focus_distance,
	});
	writer.write_pod(&scene_aabb);
	writer.write_pod(&scene_aabb.bounding_sphere());
	writer.write_pod(&model.environment_radiance);
	writer.write_u32(environment_texture);

	// Name bytes first so the records can reference them.
	let name_records: Vec<TextureNameRecord> = textures
		.names
		.iter()
		.map(|name| {
			let offset = writer.cursor() as u64;
			writer.write_bytes(name.as_bytes());
			TextureNameRecord { offset, len: name.len() as u64 }
		})
		.collect();

	let material_records: Vec<MaterialRecord> = records.into_iter().map(|(_, r)| r).collect();
	writer.commit_pod_buffer(p_materials, &material_records);
	writer.commit_pod_buffer(p_texture_names, &name_records);
	writer.commit_pod_buffer(p_mesh_meta, &mesh_meta);
	writer.commit_pod_buffer(p_curve_meta, &curve_meta);

	let meta_blob = writer.finish(META_TYPE_TAG, META_VERSION, 0);

	log::info!(
		target: "bake",
		"baked '{}': meta {} bytes, geometry {} bytes",
		model.name, meta_blob.len(), geometry_blob.len()
	);

	Ok(vec![
		BakedOutput {
			type_tag: META_TYPE_TAG,
			version: META_VERSION,
			name: model.name.clone(),
			bytes: meta_blob,
		},
		BakedOutput {
			type_tag: GEOMETRY_TYPE_TAG,
			version: GEOMETRY_VERSION,
			name: model.name.clone(),
			bytes: geometry_blob,
		},
	])
}

/// Persists baked outputs under `<root>/<type-tag>_<version>/<hash>.bin`.
/// Files appear atomically via a temporary sibling and rename, so a failed
/// bake never leaves a partial blob behind.
pub fn write_outputs(outputs: &[BakedOutput], root: &Path) -> Result<(), BakeError> {
	for output in outputs {
		let dir = root.join(format!("{}_{}", type_tag_str(output.type_tag), output.version));
		std::fs::create_dir_all(&dir)?;

		let file = dir.join(format!("{:016x}.bin", fnv1a64(&output.name)));
		let tmp = dir.join(format!("{:016x}.bin.tmp", fnv1a64(&output.name)));
		std::fs::write(&tmp, &output.bytes)?;
		std::fs::rename(&tmp, &file)?;

		log::info!(target: "bake", "wrote {} ({} bytes)", file.display(), output.bytes.len());
	}
	Ok(())
}
