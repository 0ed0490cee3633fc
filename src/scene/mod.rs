pub mod camera;
pub mod format;
pub mod light;
pub mod material;

pub use camera::{Camera, CameraRay};
pub use format::AttributeFlags;
pub use light::{AreaLight, Environment, Light, LightSample, LightSampler};
pub use material::{Material, MaterialFlags, ScalarAttribute, ShaderTag, NO_TEXTURE};

use crate::blob::{fnv1a64, type_tag_str, Blob, BlobError};
use crate::math::{Aabb, BoundingSphere, Mat4, Vec2, Vec3, Vec4};
use crate::texture::{TextureError, TextureLoader, TextureResource};
use crate::traversal::{
	BackendError, CandidateHit, CurveDesc, GeometryId, IntersectFilter, MeshDesc,
	SubdivisionMeshDesc, TraversalBackend, TraversalScene,
};
use format::{
	CurveMeta, GeometryHeader, MaterialRecord, MeshMeta, SceneMetaHeader, TextureNameRecord,
	GEOMETRY_TYPE_TAG, GEOMETRY_VERSION, INDEX_TYPE_U16, INDEX_TYPE_U32, META_TYPE_TAG,
	META_VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Alpha below this rejects the candidate hit.
pub const ALPHA_TEST_THRESHOLD: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ResourceError {
	/// The asset's files are not present under the resource root.
	#[error("missing asset '{0}'")]
	Missing(String),

	/// Structural blob failure: truncation, bad offsets, bad ranges.
	#[error("corrupt asset: {0}")]
	Corrupt(BlobError),

	/// Type or version tag mismatch between asset and reader.
	#[error("asset version mismatch: {0}")]
	Version(BlobError),

	/// A referenced texture failed to load.
	#[error("texture error: {0}")]
	Texture(#[from] TextureError),

	/// The traversal backend rejected the geometry.
	#[error("{0}")]
	Backend(#[from] BackendError),
}

impl From<BlobError> for ResourceError {
	fn from(error: BlobError) -> Self {
		match error {
			BlobError::VersionMismatch { .. } | BlobError::TypeMismatch { .. } => Self::Version(error),
			other => Self::Corrupt(other),
		}
	}
}

/// Options consumed at traversal-bind time.
#[derive(Clone, Copy, Debug)]
pub struct BindOptions {
	/// Build-time gate for promoting displaced materials to subdivision
	/// geometry.
	pub enable_displacement: bool,
	pub tessellation_rate: f32,
}

impl Default for BindOptions {
	fn default() -> Self {
		Self { enable_displacement: false, tessellation_rate: 4.0 }
	}
}

/// `<root>/<type-tag>_<version>/<name-hash>.bin`
pub fn asset_path(root: &Path, type_tag: u64, version: u64, name: &str) -> PathBuf {
	root.join(format!("{}_{}", type_tag_str(type_tag), version))
		.join(format!("{:016x}.bin", fnv1a64(name)))
}

/// Per-mesh vertex and index data, extracted from the geometry blob at bind
/// time. Indices are mesh-local u32 regardless of the stored index type.
pub struct MeshBuffers {
	pub positions: Vec<Vec3>,
	pub normals: Vec<Vec3>,
	pub tangents: Vec<Vec4>,
	pub uvs: Vec<Vec2>,
	pub indices: Vec<u32>,
	pub indices_per_face: u32,
}

impl MeshBuffers {
	pub fn face_count(&self) -> u32 {
		self.indices.len() as u32 / self.indices_per_face
	}

	pub fn face_vertex(&self, primitive: u32, corner: u32) -> u32 {
		self.indices[(primitive * self.indices_per_face + corner) as usize]
	}

	/// Interpolates a vertex attribute at the hit parameters: barycentric
	/// for triangles, bilinear patch coordinates for quads.
	fn interpolate<T, F>(&self, primitive: u32, u: f32, v: f32, fetch: F) -> T
	where
		T: Copy + std::ops::Add<Output = T> + std::ops::Mul<f32, Output = T>,
		F: Fn(u32) -> T,
	{
		if self.indices_per_face == 3 {
			let a = fetch(self.face_vertex(primitive, 0));
			let b = fetch(self.face_vertex(primitive, 1));
			let c = fetch(self.face_vertex(primitive, 2));
			a * (1.0 - u - v) + b * u + c * v
		} else {
			let a = fetch(self.face_vertex(primitive, 0));
			let b = fetch(self.face_vertex(primitive, 1));
			let c = fetch(self.face_vertex(primitive, 2));
			let d = fetch(self.face_vertex(primitive, 3));
			a * ((1.0 - u) * (1.0 - v)) + b * (u * (1.0 - v)) + c * (u * v) + d * ((1.0 - u) * v)
		}
	}

	pub fn interpolate_position(&self, primitive: u32, u: f32, v: f32) -> Vec3 {
		self.interpolate(primitive, u, v, |i| self.positions[i as usize])
	}

	pub fn interpolate_normal(&self, primitive: u32, u: f32, v: f32) -> Option<Vec3> {
		if self.normals.is_empty() {
			return None;
		}
		Some(self.interpolate(primitive, u, v, |i| self.normals[i as usize]))
	}

	pub fn interpolate_tangent(&self, primitive: u32, u: f32, v: f32) -> Option<Vec4> {
		if self.tangents.is_empty() {
			return None;
		}
		Some(self.interpolate(primitive, u, v, |i| self.tangents[i as usize]))
	}

	pub fn interpolate_uv(&self, primitive: u32, u: f32, v: f32) -> Option<Vec2> {
		if self.uvs.is_empty() {
			return None;
		}
		Some(self.interpolate(primitive, u, v, |i| self.uvs[i as usize]))
	}

	/// World-space triangles of the mesh; quads are split along (0, 2).
	pub fn triangles(&self) -> Vec<[Vec3; 3]> {
		let mut triangles = Vec::new();
		for face in 0..self.face_count() {
			let p = |corner| self.positions[self.face_vertex(face, corner) as usize];
			triangles.push([p(0), p(1), p(2)]);
			if self.indices_per_face == 4 {
				triangles.push([p(0), p(2), p(3)]);
			}
		}
		triangles
	}
}

/// Per-geometry user data recorded at bind time, mirrored by the traversal
/// backend's geometry ids.
pub struct GeometryRecord {
	pub flags: AttributeFlags,
	pub material: Arc<Material>,
	pub transform: Mat4,
	pub aabb: Aabb,
	/// None for curve geometry.
	pub mesh: Option<Arc<MeshBuffers>>,
}

/// Immutable render-ready scene. Shared read-only by all workers once
/// `bind_traversal` has committed; the backend handle is reference-counted.
pub struct Scene {
	pub traversal: Arc<dyn TraversalScene>,
	pub camera: Camera,
	pub geometry: Vec<GeometryRecord>,
	pub lights: LightSampler,
	pub environment: Option<Arc<Environment>>,
	pub textures: Vec<Arc<TextureResource>>,
}

impl Scene {
	pub fn record(&self, id: GeometryId) -> &GeometryRecord {
		&self.geometry[id as usize]
	}

	pub fn texture(&self, slot: u32) -> Option<&Arc<TextureResource>> {
		self.textures.get(slot as usize)
	}
}

/// A loaded model asset: attached meta and geometry blobs plus the resolved
/// runtime tables.
pub struct ModelResource {
	pub name: String,
	pub camera: Camera,
	pub aabb: Aabb,
	pub bounding_sphere: BoundingSphere,

	geometry_blob: Blob,
	geometry_header: GeometryHeader,

	/// Sorted ascending by hash for binary-search lookup.
	materials: Vec<Arc<Material>>,
	default_material: Arc<Material>,
	texture_names: Vec<String>,
	textures: Vec<Arc<TextureResource>>,
	mesh_meta: Vec<MeshMeta>,
	curve_meta: Vec<CurveMeta>,
	environment_radiance: Vec3,
	environment_texture: u32,
}

impl ModelResource {
	/// Loads and attaches the meta and geometry blobs for an asset.
	pub fn read(root: &Path, name: &str) -> Result<Self, ResourceError> {
		let meta_path = asset_path(root, META_TYPE_TAG, META_VERSION, name);
		let geometry_path = asset_path(root, GEOMETRY_TYPE_TAG, GEOMETRY_VERSION, name);
		if !meta_path.exists() || !geometry_path.exists() {
			return Err(ResourceError::Missing(name.to_string()));
		}

		let meta = Blob::read(&meta_path)?;
		meta.expect(META_TYPE_TAG, META_VERSION)?;
		let geometry_blob = Blob::read(&geometry_path)?;
		geometry_blob.expect(GEOMETRY_TYPE_TAG, GEOMETRY_VERSION)?;

		let view = meta.view();
		let header: SceneMetaHeader = *view.root()?;

		let mut materials = Vec::with_capacity(header.material_count as usize);
		for record in view.slice::<MaterialRecord>(header.materials_offset, header.material_count as u64)? {
			materials.push(Arc::new(Self::material_from_record(record)?));
		}
		materials.sort_by_key(|material| material.hash);

		let mut texture_names = Vec::with_capacity(header.texture_count as usize);
		for record in view.slice::<TextureNameRecord>(header.texture_names_offset, header.texture_count as u64)? {
			texture_names.push(view.str_bytes(record.offset, record.len)?.to_string());
		}

		let mesh_meta =
			view.slice::<MeshMeta>(header.mesh_meta_offset, header.mesh_count as u64)?.to_vec();
		let curve_meta =
			view.slice::<CurveMeta>(header.curve_meta_offset, header.curve_count as u64)?.to_vec();

		let geometry_header: GeometryHeader = *geometry_blob.view().root()?;
		Self::validate_ranges(&mesh_meta, &curve_meta, &geometry_header)?;

		let camera_meta = header.camera;
		let camera = Camera {
			position: camera_meta.position,
			right: camera_meta.right,
			up: camera_meta.up,
			forward: camera_meta.forward,
			focal_length: camera_meta.focal_length,
			focus_distance: camera_meta.focus_distance,
			sensor_width: camera_meta.sensor_width,
			sensor_height: camera_meta.sensor_height,
		};

		log::info!(
			target: "scene",
			"read '{}': {} materials, {} meshes, {} curves, {} textures",
			name, materials.len(), mesh_meta.len(), curve_meta.len(), texture_names.len()
		);

		Ok(Self {
			name: name.to_string(),
			camera,
			aabb: header.aabb,
			bounding_sphere: header.bounding_sphere,
			geometry_blob,
			geometry_header,
			materials,
			default_material: Arc::new(Material::default()),
			texture_names,
			textures: Vec::new(),
			mesh_meta,
			curve_meta,
			environment_radiance: header.environment_radiance,
			environment_texture: header.environment_texture,
		})
	}

	fn material_from_record(record: &MaterialRecord) -> Result<Material, ResourceError> {
		let shader = ShaderTag::from_u32(record.shader)
			.ok_or(ResourceError::Corrupt(BlobError::Corrupt("unknown shader tag")))?;
		let flags = MaterialFlags::from_bits(record.flags)
			.ok_or(ResourceError::Corrupt(BlobError::Corrupt("unknown material flag bits")))?;

		Ok(Material {
			hash: record.hash,
			base_color: record.base_color,
			emission: record.emission,
			shader,
			flags,
			scalars: record.scalars,
			albedo_texture: record.albedo_texture,
			normal_texture: record.normal_texture,
			roughness_metallic_texture: record.roughness_metallic_texture,
			displacement_texture: record.displacement_texture,
			sigma_a: record.sigma_a,
			sigma_s: record.sigma_s,
		})
	}

	fn validate_ranges(
		mesh_meta: &[MeshMeta],
		curve_meta: &[CurveMeta],
		header: &GeometryHeader,
	) -> Result<(), ResourceError> {
		let corrupt = |what: &'static str| ResourceError::Corrupt(BlobError::Corrupt(what));
		let in_range = |first: u32, count: u32, total: u32| {
			(first as u64 + count as u64) <= total as u64
		};

		for mesh in mesh_meta {
			if mesh.indices_per_face != 3 && mesh.indices_per_face != 4 {
				return Err(corrupt("indices per face must be 3 or 4"));
			}
			let index_total = match mesh.index_type {
				INDEX_TYPE_U16 => header.indices16_count,
				INDEX_TYPE_U32 => header.indices32_count,
				_ => return Err(corrupt("unknown index type")),
			};
			if !in_range(mesh.first_index, mesh.index_count, index_total)
				|| !in_range(mesh.first_vertex, mesh.vertex_count, header.vertex_count)
				|| !in_range(mesh.first_face, mesh.face_count, header.face_count)
				|| mesh.index_count % mesh.indices_per_face != 0
			{
				return Err(corrupt("mesh meta range out of bounds"));
			}
		}

		for curve in curve_meta {
			if !in_range(curve.first_curve_index, curve.curve_index_count, header.curve_index_count)
				|| !in_range(curve.first_curve_vertex, curve.curve_vertex_count, header.curve_vertex_count)
			{
				return Err(corrupt("curve meta range out of bounds"));
			}
		}

		// A null embedded pointer with a nonzero element count would alias
		// the header record at payload offset zero.
		let buffers = [
			(header.indices16_offset, header.indices16_count),
			(header.indices32_offset, header.indices32_count),
			(header.face_index_counts_offset, header.face_count),
			(header.positions_offset, header.vertex_count),
			(header.material_indices_offset, header.material_index_count),
			(header.curve_indices_offset, header.curve_index_count),
			(header.curve_vertices_offset, header.curve_vertex_count),
		];
		if buffers.iter().any(|&(offset, count)| offset == 0 && count > 0) {
			return Err(corrupt("null buffer pointer with nonzero count"));
		}

		Ok(())
	}

	/// Binary search over the hash-sorted material array; the default
	/// material covers misses.
	pub fn find_material(&self, hash: u32) -> Arc<Material> {
		match self.materials.binary_search_by_key(&hash, |material| material.hash) {
			Ok(index) => self.materials[index].clone(),
			Err(_) => {
				log::warn!(target: "scene", "no material with hash {hash:#010x}, using default");
				self.default_material.clone()
			}
		}
	}

	pub fn texture_names(&self) -> &[String] {
		&self.texture_names
	}

	/// Resolves the referenced texture resources through the loader.
	pub fn initialize(&mut self, loader: &dyn TextureLoader) -> Result<(), ResourceError> {
		let mut textures = Vec::with_capacity(self.texture_names.len());
		for name in &self.texture_names {
			textures.push(Arc::new(loader.read_texture_resource(name)?));
		}
		self.textures = textures;

		log::info!(target: "scene", "initialized '{}' with {} textures", self.name, self.textures.len());
		Ok(())
	}

	fn extract_mesh(&self, mesh: &MeshMeta) -> Result<MeshBuffers, ResourceError> {
		let view = self.geometry_blob.view();
		let header = &self.geometry_header;
		let flags = AttributeFlags::from_bits_truncate(mesh.attribute_flags);

		let indices: Vec<u32> = match mesh.index_type {
			INDEX_TYPE_U16 => {
				let all = view.slice::<u16>(header.indices16_offset, header.indices16_count as u64)?;
				all[mesh.first_index as usize..][..mesh.index_count as usize]
					.iter().map(|&i| i as u32).collect()
			}
			_ => {
				let all = view.slice::<u32>(header.indices32_offset, header.indices32_count as u64)?;
				all[mesh.first_index as usize..][..mesh.index_count as usize].to_vec()
			}
		};

		let range = mesh.first_vertex as usize..(mesh.first_vertex + mesh.vertex_count) as usize;
		let positions =
			view.slice::<Vec3>(header.positions_offset, header.vertex_count as u64)?[range.clone()].to_vec();

		let attribute = |offset: u64| {
			if offset == 0 {
				Err(ResourceError::Corrupt(BlobError::Corrupt("attribute flagged but buffer pointer is null")))
			} else {
				Ok(offset)
			}
		};
		let normals = if flags.contains(AttributeFlags::HAS_NORMALS) {
			view.slice::<Vec3>(attribute(header.normals_offset)?, header.vertex_count as u64)?[range.clone()].to_vec()
		} else {
			Vec::new()
		};
		let tangents = if flags.contains(AttributeFlags::HAS_TANGENTS) {
			view.slice::<Vec4>(attribute(header.tangents_offset)?, header.vertex_count as u64)?[range.clone()].to_vec()
		} else {
			Vec::new()
		};
		let uvs = if flags.contains(AttributeFlags::HAS_UVS) {
			view.slice::<Vec2>(attribute(header.uvs_offset)?, header.vertex_count as u64)?[range].to_vec()
		} else {
			Vec::new()
		};

		Ok(MeshBuffers {
			positions,
			normals,
			tangents,
			uvs,
			indices,
			indices_per_face: mesh.indices_per_face,
		})
	}

	fn alpha_filter(&self, mesh: &Arc<MeshBuffers>, material: &Material) -> Option<IntersectFilter> {
		if !material.flags.contains(MaterialFlags::ALPHA_TESTED) {
			return None;
		}
		let texture = self.textures.get(material.albedo_texture as usize)?.clone();
		let mesh = mesh.clone();

		Some(Arc::new(move |candidate: &CandidateHit| {
			match mesh.interpolate_uv(candidate.primitive, candidate.u, candidate.v) {
				Some(uv) => texture.alpha(uv) >= ALPHA_TEST_THRESHOLD,
				None => true,
			}
		}))
	}

	/// Registers all geometry with the traversal backend and returns the
	/// committed, render-ready scene.
	pub fn bind_traversal(
		&self,
		backend: &dyn TraversalBackend,
		options: &BindOptions,
	) -> Result<Scene, ResourceError> {
		let mut builder = backend.new_scene();
		let mut records = Vec::new();
		let mut lights = Vec::new();

		for mesh_meta in &self.mesh_meta {
			let id = records.len() as GeometryId;
			let material = self.find_material(mesh_meta.material_hash);
			let mesh = Arc::new(self.extract_mesh(mesh_meta)?);
			let filter = self.alpha_filter(&mesh, &material);

			let displaced = material.flags.contains(MaterialFlags::DISPLACEMENT_ENABLED)
				&& options.enable_displacement
				&& material.displacement_texture != NO_TEXTURE;

			if displaced {
				let texture = self
					.textures
					.get(material.displacement_texture as usize)
					.ok_or(ResourceError::Corrupt(BlobError::Corrupt("displacement texture slot out of range")))?
					.clone();
				let displacement = Arc::new(move |_position: Vec3, uv: Vec2| texture.sample(uv).x);

				builder.attach_subdivision_mesh(id, &SubdivisionMeshDesc {
					positions: &mesh.positions,
					indices: &mesh.indices,
					indices_per_face: mesh.indices_per_face,
					tessellation_rate: options.tessellation_rate,
					displacement,
					filter,
				})?;
			} else {
				builder.attach_mesh(id, &MeshDesc {
					positions: &mesh.positions,
					indices: &mesh.indices,
					indices_per_face: mesh.indices_per_face,
					filter,
				})?;
			}

			if material.is_emissive() {
				if let Some(light) = AreaLight::from_triangles(id, material.emission, mesh.triangles()) {
					lights.push(Light::Area(light));
				}
			}

			records.push(GeometryRecord {
				flags: AttributeFlags::from_bits_truncate(mesh_meta.attribute_flags),
				material,
				transform: Mat4::IDENTITY,
				aabb: mesh_meta.aabb,
				mesh: Some(mesh),
			});
		}

		let view = self.geometry_blob.view();
		let header = &self.geometry_header;
		for curve_meta in &self.curve_meta {
			let id = records.len() as GeometryId;
			let material = self.find_material(curve_meta.material_hash);

			let control_points = view
				.slice::<Vec4>(header.curve_vertices_offset, header.curve_vertex_count as u64)?
				[curve_meta.first_curve_vertex as usize..][..curve_meta.curve_vertex_count as usize]
				.to_vec();
			let first_vertex_indices = view
				.slice::<u32>(header.curve_indices_offset, header.curve_index_count as u64)?
				[curve_meta.first_curve_index as usize..][..curve_meta.curve_index_count as usize]
				.to_vec();

			builder.attach_curves(id, &CurveDesc {
				control_points: &control_points,
				first_vertex_indices: &first_vertex_indices,
			})?;

			records.push(GeometryRecord {
				flags: AttributeFlags::empty(),
				material,
				transform: Mat4::IDENTITY,
				aabb: curve_meta.aabb,
				mesh: None,
			});
		}

		let environment = self.environment()?;
		if let Some(environment) = &environment {
			lights.push(Light::Dome(environment.clone()));
		}

		let traversal = builder.commit()?;

		log::info!(
			target: "scene",
			"bound '{}': {} geometries, {} lights",
			self.name, records.len(), lights.len()
		);

		Ok(Scene {
			traversal,
			camera: self.camera,
			geometry: records,
			lights: LightSampler::new(lights),
			environment,
			textures: self.textures.clone(),
		})
	}

	fn environment(&self) -> Result<Option<Arc<Environment>>, ResourceError> {
		let has_texture = self.environment_texture != NO_TEXTURE;
		if self.environment_radiance == Vec3::ZERO && !has_texture {
			return Ok(None);
		}

		let texture = if has_texture {
			Some(
				self.textures
					.get(self.environment_texture as usize)
					.ok_or(ResourceError::Corrupt(BlobError::Corrupt("environment texture slot out of range")))?
					.clone(),
			)
		} else {
			None
		};

		// A textured dome with zero tint would be black; treat the tint as
		// white unless explicitly colored.
		let radiance = if has_texture && self.environment_radiance == Vec3::ZERO {
			Vec3::ONE
		} else {
			self.environment_radiance
		};

		Ok(Some(Arc::new(Environment { radiance, texture })))
	}

	/// Releases the resource. Blob storage and textures drop here; traversal
	/// scenes released by dropping the `Scene`s bound from this model.
	pub fn shutdown(self) {
		log::info!(target: "scene", "shutdown '{}'", self.name);
	}
}
