//! Asset pipeline scenarios: blob integrity, alignment, displacement
//! promotion and texture failure handling.

mod support;

use pathtracer::bake::{self, ImportedMaterial, ImportedModel};
use pathtracer::blob::Blob;
use pathtracer::math::Vec3;
use pathtracer::scene::format::{GeometryHeader, GEOMETRY_TYPE_TAG, GEOMETRY_VERSION};
use pathtracer::scene::{Camera, MaterialFlags, ModelResource, ResourceError};
use support::{MemoryTextureLoader, SoftwareBackend};

fn model_with_grid(name: &str, cells: u32) -> ImportedModel {
	ImportedModel {
		name: name.to_string(),
		camera: Camera::default(),
		materials: vec![ImportedMaterial {
			name: "ground".to_string(),
			base_color: Vec3::splat(0.7),
			..Default::default()
		}],
		meshes: vec![support::grid_mesh("ground", cells, 10.0)],
		curves: Vec::new(),
		environment_radiance: Vec3::ZERO,
		environment_texture: None,
	}
}

#[test]
fn truncating_a_large_geometry_blob_is_detected() {
	// A dense grid pushes the geometry blob past 10 MiB; losing the last
	// byte must surface as corruption, not as a short read.
	let model = model_with_grid("big", 500);
	let mut outputs = bake::bake_model(&model).unwrap();
	assert!(outputs[1].bytes.len() > 10 << 20, "blob only {} bytes", outputs[1].bytes.len());

	let len = outputs[1].bytes.len();
	outputs[1].bytes.truncate(len - 1);

	let dir = tempfile::tempdir().unwrap();
	bake::write_outputs(&outputs, dir.path()).unwrap();
	assert!(matches!(
		ModelResource::read(dir.path(), "big"),
		Err(ResourceError::Corrupt(_))
	));
}

#[test]
fn every_embedded_buffer_is_sixteen_aligned() {
	let model = model_with_grid("aligned", 8);
	let outputs = bake::bake_model(&model).unwrap();

	let geometry = Blob::from_bytes(&outputs[1].bytes).unwrap();
	geometry.expect(GEOMETRY_TYPE_TAG, GEOMETRY_VERSION).unwrap();
	let header: GeometryHeader = *geometry.view().root().unwrap();

	for offset in [
		header.indices16_offset,
		header.indices32_offset,
		header.face_index_counts_offset,
		header.positions_offset,
		header.normals_offset,
		header.tangents_offset,
		header.uvs_offset,
		header.material_indices_offset,
		header.curve_indices_offset,
		header.curve_vertices_offset,
	] {
		assert_eq!(offset % 16, 0, "offset {offset:#x} not aligned");
	}
}

#[test]
fn tampered_version_tag_is_a_version_error() {
	let model = model_with_grid("versioned", 4);
	let mut outputs = bake::bake_model(&model).unwrap();
	// Flip a byte inside the header's version field.
	outputs[1].bytes[12] ^= 0xff;

	let dir = tempfile::tempdir().unwrap();
	bake::write_outputs(&outputs, dir.path()).unwrap();
	assert!(matches!(
		ModelResource::read(dir.path(), "versioned"),
		Err(ResourceError::Version(_))
	));
}

#[test]
fn missing_asset_is_reported_as_missing() {
	let dir = tempfile::tempdir().unwrap();
	assert!(matches!(
		ModelResource::read(dir.path(), "nothing_here"),
		Err(ResourceError::Missing(_))
	));
}

#[test]
fn missing_texture_fails_initialization() {
	let mut model = model_with_grid("textured", 2);
	model.materials[0].albedo_texture = Some("not_loaded".to_string());

	let dir = tempfile::tempdir().unwrap();
	let outputs = bake::bake_model(&model).unwrap();
	bake::write_outputs(&outputs, dir.path()).unwrap();

	let mut resource = ModelResource::read(dir.path(), "textured").unwrap();
	assert!(matches!(
		resource.initialize(&MemoryTextureLoader::new()),
		Err(ResourceError::Texture(_))
	));
}

#[test]
fn displacement_gate_controls_subdivision_promotion() {
	let mut loader = MemoryTextureLoader::new();
	loader.insert("height", 1, 1, 1, vec![0.1]);

	let mut model = model_with_grid("displaced", 2);
	model.materials[0].flags |= MaterialFlags::DISPLACEMENT_ENABLED;
	model.materials[0].displacement_texture = Some("height".to_string());

	let dir = tempfile::tempdir().unwrap();
	let outputs = bake::bake_model(&model).unwrap();
	bake::write_outputs(&outputs, dir.path()).unwrap();

	let mut resource = ModelResource::read(dir.path(), "displaced").unwrap();
	resource.initialize(&loader).unwrap();

	let gated_on = SoftwareBackend::new();
	let options = pathtracer::scene::BindOptions { enable_displacement: true, tessellation_rate: 4.0 };
	resource.bind_traversal(&gated_on, &options).unwrap();
	assert_eq!(gated_on.subdivision_log.lock().unwrap().as_slice(), &[0]);

	let gated_off = SoftwareBackend::new();
	resource.bind_traversal(&gated_off, &Default::default()).unwrap();
	assert!(gated_off.subdivision_log.lock().unwrap().is_empty());
}

#[test]
fn curves_register_with_the_backend() {
	let mut model = model_with_grid("hairy", 2);
	model.curves.push(pathtracer::bake::ImportedCurves {
		material: "ground".to_string(),
		control_points: vec![
			pathtracer::math::Vec4::new(0.0, 0.0, 0.0, 0.01),
			pathtracer::math::Vec4::new(0.0, 0.2, 0.0, 0.01),
			pathtracer::math::Vec4::new(0.1, 0.4, 0.0, 0.008),
			pathtracer::math::Vec4::new(0.1, 0.6, 0.0, 0.005),
		],
		first_vertex_indices: vec![0],
	});

	let scene = support::build_scene(&model, &MemoryTextureLoader::new(), &Default::default());
	// Grid plus one curve geometry, curves carry their material binding.
	assert_eq!(scene.geometry.len(), 2);
	assert!(scene.geometry[1].mesh.is_none());
	assert_eq!(scene.geometry[1].material.base_color, Vec3::splat(0.7));
}
