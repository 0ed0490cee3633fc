use super::film::Tile;
use super::RenderSettings;
use crate::math::{clamp, Vec2, Vec3};
use crate::sampling::{QuasiRandom, SamplerSession};
use crate::scene::{MaterialFlags, Scene};
use crate::shading::{
	self, reflect_differentials, refract_differentials, resolve_surface, LobeFlags,
	MediumParameters, SurfaceParameters,
};
use crate::traversal::TraversalRay;
use std::sync::atomic::{AtomicBool, Ordering};

/// Minimum roulette survival probability; keeps low-throughput paths from
/// spinning forever at tiny weights.
const ROULETTE_Q_MIN: f32 = 0.05;

// Shadow rays stop just short of the light sample to dodge self-hits.
const SHADOW_EPSILON: f32 = 1e-3;

/// A path segment on the kernel's ray stack. Immutable once enqueued.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
	pub origin: Vec3,
	pub direction: Vec3,
	pub rx_direction: Option<Vec3>,
	pub ry_direction: Option<Vec3>,
	pub throughput: Vec3,
	pub pixel_index: u32,
	pub bounce_count: u32,
	pub medium: Option<MediumParameters>,
	/// Solid-angle pdf of the BSDF sample that spawned this ray; the MIS
	/// partner when the ray finds a light.
	pub prev_pdf: f32,
	/// True for camera rays, delta-lobe bounces and medium scatter rays:
	/// emission found by this ray is not MIS-discounted.
	pub prev_delta: bool,
}

/// Post-intersection state handed to accumulation.
#[derive(Clone, Copy, Debug)]
pub struct HitParameters {
	pub position: Vec3,
	pub view: Vec3,
	pub throughput: Vec3,
	pub pixel_index: u32,
	pub bounce_count: u32,
	pub geometry: u32,
	pub primitive: u32,
	pub barys: Vec2,
}

/// Anything that can be the source of a pixel contribution.
pub trait EnergySource {
	fn throughput(&self) -> Vec3;
	fn pixel_index(&self) -> u32;
}

impl EnergySource for Ray {
	fn throughput(&self) -> Vec3 {
		self.throughput
	}

	fn pixel_index(&self) -> u32 {
		self.pixel_index
	}
}

impl EnergySource for HitParameters {
	fn throughput(&self) -> Vec3 {
		self.throughput
	}

	fn pixel_index(&self) -> u32 {
		self.pixel_index
	}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct KernelStats {
	pub paths: u64,
	pub rays: u64,
	pub nee_samples: u64,
	pub dropped_non_finite: u64,
	pub discarded_rays: u64,
}

impl KernelStats {
	pub fn merge(&mut self, other: &KernelStats) {
		self.paths += other.paths;
		self.rays += other.rays;
		self.nee_samples += other.nee_samples;
		self.dropped_non_finite += other.dropped_non_finite;
		self.discarded_rays += other.discarded_rays;
	}
}

fn balance_heuristic(pdf_a: f32, pdf_b: f32) -> f32 {
	if pdf_a <= 0.0 {
		return 0.0;
	}
	pdf_a / (pdf_a + pdf_b)
}

// Per-pixel Cranley-Patterson rotation of the shared R2 jitter sequence.
fn pixel_rotation(pixel_index: u32) -> Vec2 {
	let mut x = pixel_index as u64 ^ 0x5bf03635;
	x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
	x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
	x ^= x >> 31;
	Vec2::new(
		(x & 0xffff_ffff) as f32 / 4294967296.0,
		(x >> 32) as f32 / 4294967296.0,
	)
}

/// Per-worker transient state: the tile accumulator, the bounded ray stack
/// and the statistics counters. Exclusively owned by one worker.
pub struct KernelContext<'a> {
	scene: &'a Scene,
	settings: &'a RenderSettings,
	ray_stack: Vec<Ray>,
	pub tile: Tile,
	pub stats: KernelStats,
}

impl<'a> KernelContext<'a> {
	pub fn new(scene: &'a Scene, settings: &'a RenderSettings, tile: Tile) -> Self {
		Self {
			scene,
			settings,
			ray_stack: Vec::with_capacity(settings.ray_stack_capacity as usize),
			tile,
			stats: KernelStats::default(),
		}
	}

	/// Sole mutator of the ray stack. Rays at the path-length bound are
	/// discarded here; overflowing the stack is a configuration bug.
	pub fn insert_ray(&mut self, ray: Ray) {
		if ray.bounce_count >= self.settings.max_path_length {
			self.stats.discarded_rays += 1;
			return;
		}
		assert!(
			self.ray_stack.len() < self.settings.ray_stack_capacity as usize,
			"ray stack overflow: {} rays, capacity {}, pixel {}",
			self.ray_stack.len(),
			self.settings.ray_stack_capacity,
			ray.pixel_index,
		);
		self.ray_stack.push(ray);
	}

	pub fn ray_stack_len(&self) -> usize {
		self.ray_stack.len()
	}

	/// Adds `throughput * value` into the source's pixel. Non-finite or
	/// negative contributions are dropped and counted.
	pub fn accumulate_pixel_energy<S: EnergySource>(&mut self, source: &S, value: Vec3) {
		let contribution = source.throughput().cmul(value);
		if !contribution.is_finite()
			|| contribution.x < 0.0
			|| contribution.y < 0.0
			|| contribution.z < 0.0
		{
			self.stats.dropped_non_finite += 1;
			return;
		}

		let local = source.pixel_index() - (self.tile.y * self.settings.width + self.tile.x);
		let local_y = local / self.settings.width;
		let local_x = local % self.settings.width;
		self.tile.add(local_y * self.tile.width + local_x, contribution);
	}

	/// Renders the tile. Cancellation is polled between pixels; a cancelled
	/// tile is returned marked incomplete with whatever it accumulated.
	pub fn run(&mut self, cancel: &AtomicBool) {
		for local_y in 0..self.tile.height {
			for local_x in 0..self.tile.width {
				if cancel.load(Ordering::Relaxed) {
					self.tile.incomplete = true;
					return;
				}

				let pixel_x = self.tile.x + local_x;
				let pixel_y = self.tile.y + local_y;
				let pixel_index = pixel_y * self.settings.width + pixel_x;

				for sample in 0..self.settings.samples_per_pixel {
					let mut sampler = SamplerSession::new(self.tile.index, sample);
					sampler.begin_pixel(pixel_index);
					self.trace_path(pixel_x, pixel_y, pixel_index, sample, &mut sampler);
				}
			}
		}
	}

	fn trace_path(
		&mut self,
		pixel_x: u32,
		pixel_y: u32,
		pixel_index: u32,
		sample: u32,
		sampler: &mut SamplerSession,
	) {
		self.stats.paths += 1;

		let rotation = pixel_rotation(pixel_index);
		let r2 = QuasiRandom::point(sample as u64);
		let jitter = Vec2::new((r2.x + rotation.x).fract(), (r2.y + rotation.y).fract());

		let camera_ray = self.scene.camera.generate_ray(
			pixel_x,
			pixel_y,
			self.settings.width,
			self.settings.height,
			jitter,
		);

		self.insert_ray(Ray {
			origin: camera_ray.origin,
			direction: camera_ray.direction,
			rx_direction: Some(camera_ray.rx_direction),
			ry_direction: Some(camera_ray.ry_direction),
			throughput: Vec3::ONE,
			pixel_index,
			bounce_count: 0,
			medium: None,
			prev_pdf: 0.0,
			prev_delta: true,
		});

		while let Some(ray) = self.ray_stack.pop() {
			self.integrate(ray, sampler);
		}
	}

	fn integrate(&mut self, ray: Ray, sampler: &mut SamplerSession) {
		self.stats.rays += 1;

		let traversal_ray = TraversalRay {
			origin: ray.origin,
			direction: ray.direction,
			t_min: 0.0,
			t_max: f32::INFINITY,
		};
		let hit = self.scene.traversal.intersect1(&traversal_ray);

		// Free flight through a participating medium; a collision before the
		// surface turns into absorption or an isotropic scatter ray.
		if let Some(medium) = ray.medium.filter(|m| !m.is_vacuum()) {
			let distance = medium.sample_distance(sampler.next_1d());
			let surface_t = hit.map_or(f32::INFINITY, |h| h.t);

			if distance < surface_t {
				let albedo = medium.scattering_albedo();
				if albedo <= 0.0 {
					return;
				}

				let direction = medium.sample_scatter_direction(sampler.next_2d());
				self.insert_ray(Ray {
					origin: ray.origin + ray.direction * distance,
					direction,
					rx_direction: None,
					ry_direction: None,
					throughput: ray.throughput * albedo,
					pixel_index: ray.pixel_index,
					bounce_count: ray.bounce_count + 1,
					medium: Some(medium),
					prev_pdf: medium.phase_pdf(),
					prev_delta: true,
				});
				return;
			}
		}

		let Some(hit) = hit else {
			// Environment contribution, MIS-weighted against next-event
			// sampling of the dome unless a delta event led here.
			if let Some(environment) = &self.scene.environment {
				let radiance = environment.radiance(ray.direction);
				let weight = if ray.prev_delta {
					1.0
				} else {
					balance_heuristic(ray.prev_pdf, self.scene.lights.pdf_environment())
				};
				self.accumulate_pixel_energy(&ray, radiance * weight);
			}
			return;
		};

		let surface = resolve_surface(
			self.scene,
			&hit,
			ray.origin,
			ray.direction,
			ray.rx_direction,
			ray.ry_direction,
		);

		let hit_parameters = HitParameters {
			position: surface.position,
			view: surface.view,
			throughput: ray.throughput,
			pixel_index: ray.pixel_index,
			bounce_count: ray.bounce_count,
			geometry: hit.geometry,
			primitive: hit.primitive,
			barys: Vec2::new(hit.u, hit.v),
		};

		// Emission at the hit, one-sided along the primitive's winding
		// normal and MIS-weighted against area-light next-event sampling.
		if surface.is_emissive() {
			let winding_normal = hit.geometric_normal.normalize_or(Vec3::Z);
			if surface.view.dot(winding_normal) > 0.0 {
				let weight = if ray.prev_delta {
					1.0
				} else {
					let light_pdf = self.scene.lights.pdf_area_hit(
						hit.geometry,
						ray.origin,
						surface.position,
						winding_normal,
					);
					balance_heuristic(ray.prev_pdf, light_pdf)
				};
				self.accumulate_pixel_energy(&hit_parameters, surface.emission * weight);
			}
		}

		self.next_event_estimation(&hit_parameters, &surface, ray.medium, sampler);
		self.continue_path(&ray, &surface, sampler);
	}

	fn next_event_estimation(
		&mut self,
		hit_parameters: &HitParameters,
		surface: &SurfaceParameters,
		medium: Option<MediumParameters>,
		sampler: &mut SamplerSession,
	) {
		if self.scene.lights.is_empty() {
			return;
		}

		let u_pick = sampler.next_1d();
		let u = sampler.next_2d();
		let Some(light) = self.scene.lights.sample(surface.position, u_pick, u) else {
			return;
		};
		if light.pdf <= 0.0 {
			return;
		}

		// Delta lobes, wrong-side directions and vanishing-pdf samples are
		// rejected by the analytic pdf before the shadow ray is paid for.
		let bsdf_pdf = shading::pdf(surface, surface.view, light.direction);
		if bsdf_pdf <= 0.0 {
			return;
		}

		// A shadow ray leaving a vertex inside a participating medium
		// attenuates over its whole length; dome lights are out of reach.
		let mut radiance = light.radiance;
		if let Some(medium) = medium.filter(|m| !m.is_vacuum()) {
			let transmission = medium.transmission(light.distance);
			if transmission == Vec3::ZERO {
				return;
			}
			radiance = radiance.cmul(transmission);
		}

		let shadow_ray = TraversalRay {
			origin: surface.offset_origin(light.direction),
			direction: light.direction,
			t_min: 0.0,
			t_max: if light.distance.is_finite() {
				light.distance * (1.0 - SHADOW_EPSILON)
			} else {
				f32::INFINITY
			},
		};
		if self.scene.traversal.occluded1(&shadow_ray) {
			return;
		}

		let (f, _) = shading::evaluate(surface, surface.view, light.direction);
		if f == Vec3::ZERO {
			return;
		}

		self.stats.nee_samples += 1;

		let cos_theta = light.direction.dot(surface.shading_normal).abs();
		let weight = balance_heuristic(light.pdf, bsdf_pdf);
		let value = f.cmul(radiance) * (cos_theta * weight / light.pdf);
		self.accumulate_pixel_energy(hit_parameters, value);
	}

	fn continue_path(
		&mut self,
		ray: &Ray,
		surface: &SurfaceParameters,
		sampler: &mut SamplerSession,
	) {
		let Some(bsdf_sample) = shading::sample(surface, surface.view, sampler) else {
			return;
		};

		let mut throughput = ray.throughput.cmul(bsdf_sample.throughput);
		if throughput == Vec3::ZERO || !throughput.is_finite() {
			return;
		}

		// Russian roulette: survival scaled by the remaining throughput.
		if ray.bounce_count >= self.settings.roulette_start {
			let q = clamp(throughput.max_element(), ROULETTE_Q_MIN, 1.0);
			if sampler.next_1d() > q {
				return;
			}
			throughput /= q;
		}

		let transmitted = bsdf_sample.lobe.contains(LobeFlags::TRANSMISSION);

		let (rx_direction, ry_direction) = if self.settings.preserve_ray_differentials
			&& surface.flags.contains(MaterialFlags::PRESERVE_RAY_DIFFERENTIALS)
		{
			if transmitted {
				let entering = surface.view.dot(surface.geometric_normal) > 0.0;
				let ior = surface.ior.max(1.0001);
				let eta = if entering { 1.0 / ior } else { ior };
				refract_differentials(surface, bsdf_sample.wi, eta)
			} else {
				reflect_differentials(surface, bsdf_sample.wi)
			}
		} else {
			(None, None)
		};

		// Crossing a solid transparent boundary swaps the interior medium;
		// thin sheets have no interior.
		let medium = if transmitted && !surface.flags.contains(MaterialFlags::THIN_SURFACE) {
			let entering = surface.view.dot(surface.geometric_normal) > 0.0;
			if entering && surface.sigma_a + surface.sigma_s > 0.0 {
				Some(MediumParameters::new(surface.sigma_a, surface.sigma_s))
			} else {
				None
			}
		} else {
			ray.medium
		};

		self.insert_ray(Ray {
			origin: surface.offset_origin(bsdf_sample.wi),
			direction: bsdf_sample.wi,
			rx_direction,
			ry_direction,
			throughput,
			pixel_index: ray.pixel_index,
			bounce_count: ray.bounce_count + 1,
			medium,
			prev_pdf: bsdf_sample.pdf,
			prev_delta: bsdf_sample.lobe.contains(LobeFlags::DELTA),
		});
	}
}
