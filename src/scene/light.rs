use crate::math::{clamp, Vec2, Vec3, INV_PI, PI};
use crate::sampling::{sample_uniform_sphere, sample_uniform_triangle, uniform_sphere_pdf};
use crate::texture::TextureResource;
use crate::traversal::GeometryId;
use std::collections::HashMap;
use std::sync::Arc;

/// One-sided diffuse area light built from an emissive mesh at bind time.
/// Triangles are stored world-space with a prefix-sum area table for uniform
/// sampling by area.
pub struct AreaLight {
	pub geometry: GeometryId,
	pub emission: Vec3,
	triangles: Vec<[Vec3; 3]>,
	cumulative_areas: Vec<f32>,
	total_area: f32,
}

impl AreaLight {
	pub fn from_triangles(geometry: GeometryId, emission: Vec3, triangles: Vec<[Vec3; 3]>) -> Option<Self> {
		let mut cumulative_areas = Vec::with_capacity(triangles.len());
		let mut total_area = 0.0;
		for [a, b, c] in &triangles {
			total_area += 0.5 * (*b - *a).cross(*c - *a).length();
			cumulative_areas.push(total_area);
		}

		if total_area <= 0.0 {
			return None;
		}

		Some(Self { geometry, emission, triangles, cumulative_areas, total_area })
	}

	pub fn total_area(&self) -> f32 {
		self.total_area
	}

	/// Uniform-by-area point on the light with its unit geometric normal.
	fn sample_point(&self, u_pick: f32, u: Vec2) -> (Vec3, Vec3) {
		let target = u_pick * self.total_area;
		let index = self.cumulative_areas.partition_point(|&area| area < target)
			.min(self.triangles.len() - 1);

		let [a, b, c] = self.triangles[index];
		let (alpha, beta) = sample_uniform_triangle(u);
		let point = a + (b - a) * alpha + (c - a) * beta;
		let normal = (b - a).cross(c - a).normalize_or(Vec3::Z);

		(point, normal)
	}
}

/// Dome light over the whole sphere. Constant radiance, optionally modulated
/// by an equirectangular texture.
pub struct Environment {
	pub radiance: Vec3,
	pub texture: Option<Arc<TextureResource>>,
}

impl Environment {
	pub fn constant(radiance: Vec3) -> Self {
		Self { radiance, texture: None }
	}

	pub fn radiance(&self, direction: Vec3) -> Vec3 {
		match &self.texture {
			None => self.radiance,
			Some(texture) => {
				let u = 0.5 + direction.z.atan2(direction.x) / (2.0 * PI);
				let v = (clamp(direction.y, -1.0, 1.0).asin() * INV_PI + 0.5).min(1.0);
				let texel = texture.sample(Vec2::new(u, 1.0 - v)).truncate();
				texel.cmul(self.radiance)
			}
		}
	}
}

pub enum Light {
	Area(AreaLight),
	Dome(Arc<Environment>),
}

/// Next-event sample toward a light.
#[derive(Clone, Copy, Debug)]
pub struct LightSample {
	/// Unit direction from the shading point.
	pub direction: Vec3,
	/// Distance to the sampled point; infinite for dome lights.
	pub distance: f32,
	pub radiance: Vec3,
	/// Solid-angle pdf, light pick probability included.
	pub pdf: f32,
}

/// Uniformly picks among the scene's lights for next-event estimation and
/// answers the pdf queries MIS needs for the reverse direction.
pub struct LightSampler {
	lights: Vec<Light>,
	area_by_geometry: HashMap<GeometryId, usize>,
}

impl LightSampler {
	pub fn new(lights: Vec<Light>) -> Self {
		let mut area_by_geometry = HashMap::new();
		for (index, light) in lights.iter().enumerate() {
			if let Light::Area(area) = light {
				area_by_geometry.insert(area.geometry, index);
			}
		}
		Self { lights, area_by_geometry }
	}

	pub fn is_empty(&self) -> bool {
		self.lights.is_empty()
	}

	pub fn len(&self) -> usize {
		self.lights.len()
	}

	fn pick_pdf(&self) -> f32 {
		1.0 / self.lights.len() as f32
	}

	pub fn sample(&self, point: Vec3, u_pick: f32, u: Vec2) -> Option<LightSample> {
		if self.lights.is_empty() {
			return None;
		}

		let count = self.lights.len();
		let index = ((u_pick * count as f32) as usize).min(count - 1);
		// Reuse the pick variable's remainder inside the chosen light.
		let u_light = u_pick * count as f32 - index as f32;

		match &self.lights[index] {
			Light::Dome(environment) => {
				let direction = sample_uniform_sphere(u);
				Some(LightSample {
					direction,
					distance: f32::INFINITY,
					radiance: environment.radiance(direction),
					pdf: uniform_sphere_pdf() * self.pick_pdf(),
				})
			}
			Light::Area(area) => {
				let (light_point, light_normal) = area.sample_point(u_light, u);
				let to_light = light_point - point;
				let distance_sq = to_light.length_sq();
				if distance_sq <= 0.0 {
					return None;
				}
				let distance = distance_sq.sqrt();
				let direction = to_light / distance;

				// One-sided: no emission behind the light's surface.
				let cos_light = -direction.dot(light_normal);
				if cos_light <= 1e-6 {
					return None;
				}

				Some(LightSample {
					direction,
					distance,
					radiance: area.emission,
					pdf: distance_sq / (cos_light * area.total_area) * self.pick_pdf(),
				})
			}
		}
	}

	/// Solid-angle pdf of next-event sampling reaching `point` on the given
	/// emissive geometry from `origin`. Zero when the geometry is not a
	/// registered light, which excludes it from MIS.
	pub fn pdf_area_hit(&self, geometry: GeometryId, origin: Vec3, point: Vec3, light_normal: Vec3) -> f32 {
		let Some(&index) = self.area_by_geometry.get(&geometry) else {
			return 0.0;
		};
		let Light::Area(area) = &self.lights[index] else {
			return 0.0;
		};

		let to_light = point - origin;
		let distance_sq = to_light.length_sq();
		if distance_sq <= 0.0 {
			return 0.0;
		}
		let cos_light = -(to_light / distance_sq.sqrt()).dot(light_normal);
		if cos_light <= 1e-6 {
			return 0.0;
		}

		distance_sq / (cos_light * area.total_area()) * self.pick_pdf()
	}

	/// Solid-angle pdf of next-event sampling choosing the environment
	/// direction that a miss ray took.
	pub fn pdf_environment(&self) -> f32 {
		let has_dome = self.lights.iter().any(|light| matches!(light, Light::Dome(_)));
		if has_dome {
			uniform_sphere_pdf() * self.pick_pdf()
		} else {
			0.0
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn unit_quad_light() -> AreaLight {
		// Unit square in the xz plane at y = 1 facing down.
		let a = Vec3::new(0.0, 1.0, 0.0);
		let b = Vec3::new(1.0, 1.0, 0.0);
		let c = Vec3::new(1.0, 1.0, 1.0);
		let d = Vec3::new(0.0, 1.0, 1.0);
		AreaLight::from_triangles(0, Vec3::ONE, vec![[a, c, b], [a, d, c]]).unwrap()
	}

	#[test]
	fn quad_area_is_one() {
		assert!((unit_quad_light().total_area() - 1.0).abs() < 1e-6);
	}

	#[test]
	fn degenerate_light_is_rejected() {
		let p = Vec3::ZERO;
		assert!(AreaLight::from_triangles(0, Vec3::ONE, vec![[p, p, p]]).is_none());
	}

	#[test]
	fn samples_see_the_light_from_below() {
		let sampler = LightSampler::new(vec![Light::Area(unit_quad_light())]);
		let point = Vec3::new(0.5, 0.0, 0.5);

		let sample = sampler.sample(point, 0.3, Vec2::new(0.4, 0.6)).unwrap();
		assert!(sample.direction.y > 0.0);
		assert!(sample.pdf > 0.0);
		assert_eq!(sample.radiance, Vec3::ONE);
	}

	#[test]
	fn backside_samples_are_rejected() {
		let sampler = LightSampler::new(vec![Light::Area(unit_quad_light())]);
		let above = Vec3::new(0.5, 2.0, 0.5);
		assert!(sampler.sample(above, 0.3, Vec2::new(0.4, 0.6)).is_none());
	}

	#[test]
	fn nee_and_hit_pdfs_agree() {
		let sampler = LightSampler::new(vec![Light::Area(unit_quad_light())]);
		let origin = Vec3::new(0.5, 0.0, 0.5);

		let sample = sampler.sample(origin, 0.3, Vec2::new(0.4, 0.6)).unwrap();
		let hit_point = origin + sample.direction * sample.distance;
		let pdf = sampler.pdf_area_hit(0, origin, hit_point, -Vec3::Y);
		assert!((pdf - sample.pdf).abs() / sample.pdf < 1e-3);
	}

	#[test]
	fn textured_environment_modulates_radiance() {
		let texture = Arc::new(TextureResource::constant("sky".into(), crate::math::Vec4::new(0.5, 0.5, 0.5, 1.0)));
		let environment = Environment { radiance: Vec3::splat(2.0), texture: Some(texture) };
		let radiance = environment.radiance(Vec3::Y);
		assert!((radiance - Vec3::ONE).length() < 1e-5);
	}
}
