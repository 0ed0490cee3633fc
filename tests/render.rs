//! End-to-end rendering scenarios over the software traversal backend.

mod support;

use pathtracer::bake::{ImportedMaterial, ImportedModel};
use pathtracer::kernel::{self, RenderSettings};
use pathtracer::math::Vec3;
use pathtracer::scene::{Camera, MaterialFlags, ScalarAttribute, ShaderTag};
use std::sync::atomic::AtomicBool;
use support::MemoryTextureLoader;

fn small_settings() -> RenderSettings {
	RenderSettings {
		width: 16,
		height: 16,
		samples_per_pixel: 32,
		max_path_length: 6,
		ray_stack_capacity: 16,
		roulette_start: 3,
		tile_size: 8,
		..Default::default()
	}
}

fn empty_model(name: &str) -> ImportedModel {
	ImportedModel {
		name: name.to_string(),
		camera: Camera::default(),
		materials: Vec::new(),
		meshes: Vec::new(),
		curves: Vec::new(),
		environment_radiance: Vec3::ZERO,
		environment_texture: None,
	}
}

fn diffuse_material(name: &str, albedo: f32) -> ImportedMaterial {
	ImportedMaterial {
		name: name.to_string(),
		base_color: Vec3::splat(albedo),
		..Default::default()
	}
}

fn emissive_material(name: &str, radiance: f32) -> ImportedMaterial {
	ImportedMaterial {
		name: name.to_string(),
		base_color: Vec3::ZERO,
		emission: Vec3::splat(radiance),
		..Default::default()
	}
}

#[test]
fn environment_only_furnace_is_exact() {
	let mut model = empty_model("furnace");
	model.environment_radiance = Vec3::ONE;

	let scene = support::build_scene(&model, &MemoryTextureLoader::new(), &Default::default());
	let settings = small_settings();
	let (film, summary) = kernel::render(&scene, &settings, &AtomicBool::new(false)).unwrap();

	assert!(!summary.cancelled());
	for pixel in film.pixels() {
		assert!((*pixel - Vec3::ONE).length() < 1e-5, "pixel {pixel:?}");
	}
}

#[test]
fn lambertian_floor_under_uniform_dome() {
	// A diffuse floor under a radiance-one dome reflects close to its
	// albedo; the Burley retro term only nudges it slightly.
	let mut model = empty_model("floor");
	model.environment_radiance = Vec3::ONE;
	model.camera = Camera::look_at(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, Vec3::Z);
	model.materials.push(diffuse_material("white", 0.8));
	model.meshes.push(support::horizontal_quad("white", Vec3::ZERO, 50.0, true));

	let scene = support::build_scene(&model, &MemoryTextureLoader::new(), &Default::default());
	let settings = small_settings();
	let (film, _) = kernel::render(&scene, &settings, &AtomicBool::new(false)).unwrap();

	let mean = film.mean_luminance();
	assert!((0.70..0.86).contains(&mean), "mean {mean}");
}

#[test]
fn glass_sphere_furnace_stays_white() {
	// A clean dielectric in a uniform furnace neither adds nor removes
	// energy; refraction in and out cancels the radiance scaling.
	let mut model = empty_model("glass_furnace");
	model.environment_radiance = Vec3::ONE;
	model.camera = Camera::look_at(Vec3::new(0.0, 0.0, 3.0), Vec3::ZERO, Vec3::Y);

	let mut glass = ImportedMaterial {
		name: "glass".to_string(),
		base_color: Vec3::ONE,
		shader: ShaderTag::TransparentGgx,
		flags: MaterialFlags::PRESERVE_RAY_DIFFERENTIALS,
		..Default::default()
	};
	glass.scalars[ScalarAttribute::Roughness as usize] = 0.0;
	glass.scalars[ScalarAttribute::Ior as usize] = 1.5;
	model.materials.push(glass);
	model.meshes.push(support::uv_sphere("glass", Vec3::ZERO, 1.0, 12, 20));

	let scene = support::build_scene(&model, &MemoryTextureLoader::new(), &Default::default());
	let settings = RenderSettings {
		width: 16,
		height: 16,
		samples_per_pixel: 64,
		max_path_length: 12,
		ray_stack_capacity: 16,
		// Keep roulette out of the picture for the tightest mean.
		roulette_start: 12,
		tile_size: 8,
		..Default::default()
	};
	let (film, _) = kernel::render(&scene, &settings, &AtomicBool::new(false)).unwrap();

	let mean = film.mean_luminance();
	assert!((mean - 1.0).abs() < 0.03, "furnace mean {mean}");
}

#[test]
fn area_light_matches_analytic_direct_term() {
	// Small light of area A at unit height over a lambertian floor: the
	// point below it sees rho/pi * L * A within the small-solid-angle
	// approximation.
	let mut model = empty_model("area_light");
	model.camera = Camera::look_at(Vec3::new(0.0, 0.6, 0.6), Vec3::ZERO, Vec3::Y);
	model.materials.push(diffuse_material("white", 0.8));
	model.materials.push(emissive_material("lamp", 10.0));
	model.meshes.push(support::horizontal_quad("white", Vec3::ZERO, 5.0, true));
	model.meshes.push(support::horizontal_quad("lamp", Vec3::new(0.0, 1.0, 0.0), 0.1, false));

	let scene = support::build_scene(&model, &MemoryTextureLoader::new(), &Default::default());
	let settings = RenderSettings {
		width: 8,
		height: 8,
		samples_per_pixel: 128,
		max_path_length: 4,
		ray_stack_capacity: 8,
		roulette_start: 4,
		tile_size: 8,
		..Default::default()
	};
	let (film, _) = kernel::render(&scene, &settings, &AtomicBool::new(false)).unwrap();

	// Average the central pixels, which look at the floor near the origin.
	let mut sum = 0.0;
	for y in 3..5 {
		for x in 3..5 {
			sum += film.pixel(x, y).luminance_avg();
		}
	}
	let mean = sum / 4.0;

	let expected = 0.8 / std::f32::consts::PI * 10.0 * 0.04;
	assert!(
		(mean - expected).abs() < expected * 0.12,
		"mean {mean}, expected {expected}"
	);
}

#[test]
fn mirror_reflects_what_is_behind_the_camera() {
	let mut model = empty_model("mirror");
	model.camera = Camera::look_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::Y);

	let mut mirror = ImportedMaterial {
		name: "mirror".to_string(),
		base_color: Vec3::splat(0.9),
		..Default::default()
	};
	mirror.scalars[ScalarAttribute::Metallic as usize] = 1.0;
	mirror.scalars[ScalarAttribute::Roughness as usize] = 0.0;
	model.materials.push(mirror);
	model.materials.push(emissive_material("backdrop", 3.0));

	// Mirror ahead of the camera, emitter behind it facing the mirror.
	model.meshes.push(support::facing_quad("mirror", Vec3::ZERO, 2.0));
	let mut backdrop = support::facing_quad("backdrop", Vec3::new(0.0, 0.0, 4.0), 4.0);
	// Flip the winding so the emitter faces -z, toward the mirror.
	backdrop.indices = vec![0, 2, 1, 0, 3, 2];
	backdrop.normals = vec![-Vec3::Z; 4];
	model.meshes.push(backdrop);

	let scene = support::build_scene(&model, &MemoryTextureLoader::new(), &Default::default());
	let settings = small_settings();
	let (film, _) = kernel::render(&scene, &settings, &AtomicBool::new(false)).unwrap();

	// Near-normal incidence on a conductor with F0 = 0.9.
	let center = film.pixel(8, 8).luminance_avg();
	assert!((2.2..3.0).contains(&center), "center {center}");
}

#[test]
fn alpha_tested_quad_shows_the_backdrop_through_holes() {
	let mut loader = MemoryTextureLoader::new();
	// Diagonal alpha checker: opaque at (0,0) and (1,1).
	loader.insert("leaf", 2, 2, 4, vec![
		1.0, 1.0, 1.0, 1.0,  1.0, 1.0, 1.0, 0.0,
		1.0, 1.0, 1.0, 0.0,  1.0, 1.0, 1.0, 1.0,
	]);

	let mut model = empty_model("leaf");
	model.camera = Camera::look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);

	let mut leaf = ImportedMaterial {
		name: "leaf".to_string(),
		base_color: Vec3::splat(0.5),
		flags: MaterialFlags::ALPHA_TESTED,
		albedo_texture: Some("leaf".to_string()),
		..Default::default()
	};
	leaf.scalars[ScalarAttribute::Roughness as usize] = 0.8;
	model.materials.push(leaf);
	model.materials.push(emissive_material("backdrop", 2.0));

	model.meshes.push(support::facing_quad("leaf", Vec3::new(0.0, 0.0, -1.0), 0.4));
	model.meshes.push(support::facing_quad("backdrop", Vec3::new(0.0, 0.0, -2.0), 4.0));

	let scene = support::build_scene(&model, &loader, &Default::default());
	let settings = small_settings();
	let (film, _) = kernel::render(&scene, &settings, &AtomicBool::new(false)).unwrap();

	// Both probes look through the leaf quad; the alpha checker makes one
	// of them see the emissive backdrop.
	let a = film.pixel(4, 4).luminance_avg();
	let b = film.pixel(12, 4).luminance_avg();
	let (lit, dark) = if a > b { (a, b) } else { (b, a) };
	assert!(lit > 1.5, "lit probe {lit}");
	assert!(dark < 0.2, "dark probe {dark}");
}

#[test]
fn russian_roulette_is_unbiased() {
	let mut model = empty_model("roulette");
	model.environment_radiance = Vec3::ONE;
	model.camera = Camera::look_at(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, Vec3::Z);
	model.materials.push(diffuse_material("white", 0.8));
	model.meshes.push(support::horizontal_quad("white", Vec3::ZERO, 50.0, true));

	let scene = support::build_scene(&model, &MemoryTextureLoader::new(), &Default::default());

	let mut aggressive = small_settings();
	aggressive.samples_per_pixel = 64;
	aggressive.roulette_start = 1;
	let mut disabled = aggressive;
	disabled.roulette_start = aggressive.max_path_length;

	let (film_a, _) = kernel::render(&scene, &aggressive, &AtomicBool::new(false)).unwrap();
	let (film_b, _) = kernel::render(&scene, &disabled, &AtomicBool::new(false)).unwrap();

	let mean_a = film_a.mean_luminance();
	let mean_b = film_b.mean_luminance();
	assert!(
		(mean_a - mean_b).abs() < 0.04 * mean_b.max(1e-3),
		"roulette {mean_a} vs disabled {mean_b}"
	);
}

#[test]
fn fixed_seed_renders_are_identical() {
	let mut model = empty_model("determinism");
	model.environment_radiance = Vec3::ONE;
	model.camera = Camera::look_at(Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO, Vec3::Z);
	model.materials.push(diffuse_material("white", 0.6));
	model.meshes.push(support::horizontal_quad("white", Vec3::ZERO, 50.0, true));

	let scene = support::build_scene(&model, &MemoryTextureLoader::new(), &Default::default());
	let settings = small_settings();

	let (film_a, _) = kernel::render(&scene, &settings, &AtomicBool::new(false)).unwrap();
	let (film_b, _) = kernel::render(&scene, &settings, &AtomicBool::new(false)).unwrap();

	// Seeding is by (tile, sample, pixel), so worker interleaving cannot
	// change a single sample.
	assert_eq!(film_a.pixels(), film_b.pixels());
}

#[test]
fn film_writes_exr_atomically() {
	let mut model = empty_model("exr");
	model.environment_radiance = Vec3::splat(0.5);
	let scene = support::build_scene(&model, &MemoryTextureLoader::new(), &Default::default());

	let mut settings = small_settings();
	settings.samples_per_pixel = 1;
	let (film, _) = kernel::render(&scene, &settings, &AtomicBool::new(false)).unwrap();

	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("out.exr");
	film.write_exr(&path).unwrap();
	assert!(path.exists());
	assert!(!dir.path().join("out.exr.tmp").exists());
}
