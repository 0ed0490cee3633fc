//! Shared test scaffolding: a linear software intersector standing in for
//! the external traversal kernel, an in-memory texture loader and a few
//! mesh generators.

#![allow(dead_code)]

use pathtracer::math::{Vec2, Vec3};
use pathtracer::texture::{TextureError, TextureLoader, TextureResource};
use pathtracer::traversal::{
	BackendError, CandidateHit, CurveDesc, GeometryHit, GeometryId, IntersectFilter, MeshDesc,
	SceneBuilder, SubdivisionMeshDesc, TraversalBackend, TraversalRay, TraversalScene,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const INTERSECT_EPSILON: f32 = 1e-7;

struct SoftTriangle {
	p0: Vec3,
	p1: Vec3,
	p2: Vec3,
	geometry: GeometryId,
	primitive: u32,
	/// For triangulated quads: which half, so barycentrics can be remapped
	/// to bilinear patch coordinates.
	quad_half: Option<u8>,
}

impl SoftTriangle {
	// Moller-Trumbore. Returns (t, u, v) barycentrics toward p1/p2.
	fn intersect(&self, ray: &TraversalRay) -> Option<(f32, f32, f32)> {
		let e1 = self.p1 - self.p0;
		let e2 = self.p2 - self.p0;

		let p = ray.direction.cross(e2);
		let det = e1.dot(p);
		if det.abs() < INTERSECT_EPSILON {
			return None;
		}
		let inv_det = 1.0 / det;

		let s = ray.origin - self.p0;
		let u = s.dot(p) * inv_det;
		if !(0.0..=1.0).contains(&u) {
			return None;
		}

		let q = s.cross(e1);
		let v = ray.direction.dot(q) * inv_det;
		if v < 0.0 || u + v > 1.0 {
			return None;
		}

		let t = e2.dot(q) * inv_det;
		if t <= ray.t_min || t >= ray.t_max {
			return None;
		}

		Some((t, u, v))
	}

	fn normal(&self) -> Vec3 {
		(self.p1 - self.p0).cross(self.p2 - self.p0)
	}

	// Barycentric (u, v) to the hit parameterization the core expects:
	// unchanged for plain triangles, bilinear patch coordinates for quads.
	fn hit_uv(&self, u: f32, v: f32) -> (f32, f32) {
		match self.quad_half {
			None => (u, v),
			Some(0) => (u + v, v),
			_ => (u, u + v),
		}
	}
}

#[derive(Default)]
struct SoftwareSceneData {
	triangles: Vec<SoftTriangle>,
	filters: HashMap<GeometryId, IntersectFilter>,
	subdivision_geometries: Vec<GeometryId>,
	curve_geometries: Vec<GeometryId>,
}

impl SoftwareSceneData {
	fn add_mesh(&mut self, id: GeometryId, positions: &[Vec3], indices: &[u32], indices_per_face: u32) {
		let faces = indices.len() as u32 / indices_per_face;
		for face in 0..faces {
			let corner = |k: u32| positions[indices[(face * indices_per_face + k) as usize] as usize];
			if indices_per_face == 3 {
				self.triangles.push(SoftTriangle {
					p0: corner(0),
					p1: corner(1),
					p2: corner(2),
					geometry: id,
					primitive: face,
					quad_half: None,
				});
			} else {
				self.triangles.push(SoftTriangle {
					p0: corner(0),
					p1: corner(1),
					p2: corner(2),
					geometry: id,
					primitive: face,
					quad_half: Some(0),
				});
				self.triangles.push(SoftTriangle {
					p0: corner(0),
					p1: corner(2),
					p2: corner(3),
					geometry: id,
					primitive: face,
					quad_half: Some(1),
				});
			}
		}
	}
}

pub struct SoftwareBackend {
	/// Geometry ids that were promoted to subdivision surfaces, recorded so
	/// tests can assert on the binding path.
	pub subdivision_log: Arc<Mutex<Vec<GeometryId>>>,
}

impl SoftwareBackend {
	pub fn new() -> Self {
		Self { subdivision_log: Arc::new(Mutex::new(Vec::new())) }
	}
}

impl TraversalBackend for SoftwareBackend {
	fn new_scene(&self) -> Box<dyn SceneBuilder> {
		Box::new(SoftwareSceneBuilder {
			data: SoftwareSceneData::default(),
			subdivision_log: self.subdivision_log.clone(),
		})
	}
}

struct SoftwareSceneBuilder {
	data: SoftwareSceneData,
	subdivision_log: Arc<Mutex<Vec<GeometryId>>>,
}

impl SceneBuilder for SoftwareSceneBuilder {
	fn attach_mesh(&mut self, id: GeometryId, desc: &MeshDesc<'_>) -> Result<(), BackendError> {
		self.data.add_mesh(id, desc.positions, desc.indices, desc.indices_per_face);
		if let Some(filter) = &desc.filter {
			self.data.filters.insert(id, filter.clone());
		}
		Ok(())
	}

	fn attach_subdivision_mesh(
		&mut self,
		id: GeometryId,
		desc: &SubdivisionMeshDesc<'_>,
	) -> Result<(), BackendError> {
		// The software stand-in does not tessellate; the control cage is
		// intersected directly and the promotion is only recorded.
		self.data.add_mesh(id, desc.positions, desc.indices, desc.indices_per_face);
		if let Some(filter) = &desc.filter {
			self.data.filters.insert(id, filter.clone());
		}
		self.data.subdivision_geometries.push(id);
		self.subdivision_log.lock().unwrap().push(id);
		Ok(())
	}

	fn attach_curves(&mut self, id: GeometryId, _desc: &CurveDesc<'_>) -> Result<(), BackendError> {
		// Curves are registered but not intersected by the stand-in.
		self.data.curve_geometries.push(id);
		Ok(())
	}

	fn commit(self: Box<Self>) -> Result<Arc<dyn TraversalScene>, BackendError> {
		Ok(Arc::new(SoftwareScene { data: self.data }))
	}
}

struct SoftwareScene {
	data: SoftwareSceneData,
}

impl SoftwareScene {
	fn closest(&self, ray: &TraversalRay) -> Option<GeometryHit> {
		let mut best: Option<GeometryHit> = None;
		let mut t_max = ray.t_max;

		for triangle in &self.data.triangles {
			let clipped = TraversalRay { t_max, ..*ray };
			let Some((t, bu, bv)) = triangle.intersect(&clipped) else {
				continue;
			};
			let (u, v) = triangle.hit_uv(bu, bv);

			if let Some(filter) = self.data.filters.get(&triangle.geometry) {
				let candidate = CandidateHit {
					geometry: triangle.geometry,
					primitive: triangle.primitive,
					u,
					v,
				};
				if !filter(&candidate) {
					continue;
				}
			}

			t_max = t;
			best = Some(GeometryHit {
				geometry: triangle.geometry,
				primitive: triangle.primitive,
				t,
				u,
				v,
				geometric_normal: triangle.normal(),
			});
		}

		best
	}
}

impl TraversalScene for SoftwareScene {
	fn intersect1(&self, ray: &TraversalRay) -> Option<GeometryHit> {
		self.closest(ray)
	}

	fn occluded1(&self, ray: &TraversalRay) -> bool {
		self.closest(ray).is_some()
	}
}

/// Texture loader over an in-memory name map.
pub struct MemoryTextureLoader {
	textures: HashMap<String, TextureResource>,
}

impl MemoryTextureLoader {
	pub fn new() -> Self {
		Self { textures: HashMap::new() }
	}

	pub fn insert(&mut self, name: &str, width: u32, height: u32, channels: u32, texels: Vec<f32>) {
		self.textures.insert(
			name.to_string(),
			TextureResource::new(name.to_string(), width, height, channels, texels),
		);
	}
}

impl TextureLoader for MemoryTextureLoader {
	fn read_texture_resource(&self, name: &str) -> Result<TextureResource, TextureError> {
		let source = self
			.textures
			.get(name)
			.ok_or_else(|| TextureError::Missing(name.to_string()))?;
		Ok(TextureResource::new(
			source.name.clone(),
			source.width,
			source.height,
			source.channels,
			source.texels.clone(),
		))
	}
}

// Mesh generators used by the scenario tests.

/// Axis-aligned rectangle in the xz plane at a fixed height, normal +y or -y.
pub fn horizontal_quad(material: &str, center: Vec3, half: f32, normal_up: bool) -> pathtracer::bake::ImportedMesh {
	// Corner order (-,-), (+,-), (+,+), (-,+) in xz winds downward; reverse
	// it for an upward-facing quad.
	let (i0, i1, i2, i3) = if normal_up { (3, 2, 1, 0) } else { (0, 1, 2, 3) };
	let corners = [
		center + Vec3::new(-half, 0.0, -half),
		center + Vec3::new(half, 0.0, -half),
		center + Vec3::new(half, 0.0, half),
		center + Vec3::new(-half, 0.0, half),
	];
	let normal = if normal_up { Vec3::Y } else { -Vec3::Y };

	pathtracer::bake::ImportedMesh {
		material: material.to_string(),
		positions: vec![corners[i0], corners[i1], corners[i2], corners[i3]],
		normals: vec![normal; 4],
		tangents: Vec::new(),
		uvs: vec![
			Vec2::new(0.0, 0.0),
			Vec2::new(1.0, 0.0),
			Vec2::new(1.0, 1.0),
			Vec2::new(0.0, 1.0),
		],
		indices: vec![0, 1, 2, 0, 2, 3],
		indices_per_face: 3,
		material_indices: Vec::new(),
	}
}

/// Rectangle in the xy plane facing +z, spanning [-half, half]^2.
pub fn facing_quad(material: &str, center: Vec3, half: f32) -> pathtracer::bake::ImportedMesh {
	pathtracer::bake::ImportedMesh {
		material: material.to_string(),
		positions: vec![
			center + Vec3::new(-half, -half, 0.0),
			center + Vec3::new(half, -half, 0.0),
			center + Vec3::new(half, half, 0.0),
			center + Vec3::new(-half, half, 0.0),
		],
		normals: vec![Vec3::Z; 4],
		tangents: Vec::new(),
		uvs: vec![
			Vec2::new(0.0, 0.0),
			Vec2::new(1.0, 0.0),
			Vec2::new(1.0, 1.0),
			Vec2::new(0.0, 1.0),
		],
		indices: vec![0, 1, 2, 0, 2, 3],
		indices_per_face: 3,
		material_indices: Vec::new(),
	}
}

/// Latitude-longitude sphere with outward normals.
pub fn uv_sphere(material: &str, center: Vec3, radius: f32, rings: u32, segments: u32) -> pathtracer::bake::ImportedMesh {
	let mut positions = Vec::new();
	let mut normals = Vec::new();
	let mut uvs = Vec::new();
	let mut indices = Vec::new();

	for ring in 0..=rings {
		let theta = std::f32::consts::PI * ring as f32 / rings as f32;
		let (sin_t, cos_t) = theta.sin_cos();
		for segment in 0..=segments {
			let phi = 2.0 * std::f32::consts::PI * segment as f32 / segments as f32;
			let (sin_p, cos_p) = phi.sin_cos();
			let normal = Vec3::new(sin_t * cos_p, cos_t, sin_t * sin_p);
			positions.push(center + normal * radius);
			normals.push(normal);
			uvs.push(Vec2::new(
				segment as f32 / segments as f32,
				ring as f32 / rings as f32,
			));
		}
	}

	let stride = segments + 1;
	for ring in 0..rings {
		for segment in 0..segments {
			let a = ring * stride + segment;
			let b = a + stride;
			indices.extend_from_slice(&[a, b, a + 1]);
			indices.extend_from_slice(&[a + 1, b, b + 1]);
		}
	}

	pathtracer::bake::ImportedMesh {
		material: material.to_string(),
		positions,
		normals,
		tangents: Vec::new(),
		uvs,
		indices,
		indices_per_face: 3,
		material_indices: Vec::new(),
	}
}

/// Regular grid of quads in the xz plane, useful for bulk geometry.
pub fn grid_mesh(material: &str, cells: u32, extent: f32) -> pathtracer::bake::ImportedMesh {
	let mut positions = Vec::new();
	let mut normals = Vec::new();
	let mut uvs = Vec::new();
	let mut indices = Vec::new();

	let stride = cells + 1;
	for row in 0..stride {
		for col in 0..stride {
			let u = col as f32 / cells as f32;
			let v = row as f32 / cells as f32;
			positions.push(Vec3::new((u - 0.5) * extent, 0.0, (v - 0.5) * extent));
			normals.push(Vec3::Y);
			uvs.push(Vec2::new(u, v));
		}
	}
	for row in 0..cells {
		for col in 0..cells {
			let a = row * stride + col;
			let b = a + stride;
			indices.extend_from_slice(&[a, a + 1, b + 1, b]);
		}
	}

	pathtracer::bake::ImportedMesh {
		material: material.to_string(),
		positions,
		normals,
		tangents: Vec::new(),
		uvs,
		indices,
		indices_per_face: 4,
		material_indices: Vec::new(),
	}
}

/// Bakes, writes, reads and binds a model through the full resource path.
pub fn build_scene(
	model: &pathtracer::bake::ImportedModel,
	loader: &dyn TextureLoader,
	options: &pathtracer::scene::BindOptions,
) -> pathtracer::scene::Scene {
	let dir = tempfile::tempdir().unwrap();
	let outputs = pathtracer::bake::bake_model(model).unwrap();
	pathtracer::bake::write_outputs(&outputs, dir.path()).unwrap();

	let mut resource = pathtracer::ModelResource::read(dir.path(), &model.name).unwrap();
	resource.initialize(loader).unwrap();

	let backend = SoftwareBackend::new();
	resource.bind_traversal(&backend, options).unwrap()
}
